//! secref - Security Reference Store
//!
//! Modes:
//!
//! ```text
//! --ingest <file>     bulk load a JSON-lines file into the persistent index
//! --serve [--memory]  serve POST /query from the persistent (or in-memory) engine
//! --stats             print row counts per key space
//! --compact           reclaim free space in the database file
//! ```
//!
//! `--env <name>` selects `config/<name>.yaml`, `--port` overrides the gateway port.

use std::sync::Arc;

use anyhow::{Context, Result};

use secref::config::AppConfig;
use secref::gateway::{self, AppState};
use secref::persistent::PersistentIndex;
use secref::source::JsonLinesSource;
use secref::storage::Getter;
use secref::{MemoryIndex, run_ingestion};

// ============================================================
// ARGUMENTS
// ============================================================

fn arg_value(names: &[&str]) -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if names.contains(&args[i].as_str()) && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

fn has_flag(name: &str) -> bool {
    std::env::args().any(|a| a == name)
}

fn get_env() -> String {
    arg_value(&["--env", "-e"]).unwrap_or_else(|| "dev".to_string())
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    arg_value(&["--port"]).and_then(|p| p.parse().ok())
}

// ============================================================
// MODES
// ============================================================

fn open_index(config: &AppConfig) -> Result<PersistentIndex> {
    let path = &config.storage.db_path;
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    PersistentIndex::open_with_timeout(path, config.storage.open_timeout())
        .with_context(|| format!("Failed to open index at {}", path))
}

fn ingest(config: &AppConfig, file: &str) -> Result<()> {
    let index = Arc::new(open_index(config)?);
    let source =
        JsonLinesSource::open(file).with_context(|| format!("Failed to open {}", file))?;
    let source_stats = source.stats();

    let report = run_ingestion(index.clone(), source, &config.ingest)?;
    tracing::info!(
        %report,
        malformed = source_stats.malformed(),
        "Ingestion complete"
    );
    println!("{}", report);

    if source_stats.read_errors() > 0 {
        anyhow::bail!("Source {} ended on a read error", file);
    }
    println!("{}", index.stats()?);
    Ok(())
}

fn sanity_check(getter: &dyn Getter, key: &str) {
    if key.is_empty() {
        return;
    }
    match getter.get(&[key]) {
        Ok(found) if found.first().is_some_and(|r| !r.is_empty()) => {
            tracing::info!(key, cusip = found[0].cusip(), "Sanity lookup resolved");
        }
        Ok(_) => tracing::warn!(key, "Sanity lookup missed"),
        Err(e) => tracing::error!(key, error = %e, "Sanity lookup failed"),
    }
}

fn serve(config: &AppConfig, in_memory: bool) -> Result<()> {
    let index = open_index(config)?;
    let state = if in_memory {
        let memory = MemoryIndex::from_persistent(&index)?;
        // The in-memory engine does not need the file once built
        drop(index);
        AppState {
            getter: Arc::new(memory),
            engine: "memory",
        }
    } else {
        AppState {
            getter: Arc::new(index),
            engine: "persistent",
        }
    };

    sanity_check(state.getter.as_ref(), &config.gateway.sanity_key);

    let port = get_port_override().unwrap_or(config.gateway.port);
    let rt = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    rt.block_on(gateway::serve(state, &config.gateway.host, port))
}

fn run(env: &str, config: &AppConfig) -> Result<()> {
    tracing::info!("Starting secref in {} mode", env);

    if let Some(file) = arg_value(&["--ingest"]) {
        return ingest(config, &file);
    }
    if has_flag("--compact") {
        let mut index = open_index(config)?;
        index.compact()?;
        println!("{}: {}", index.path().display(), index.stats()?);
        return Ok(());
    }
    if has_flag("--stats") {
        let index = open_index(config)?;
        println!("{}: {}", index.path().display(), index.stats()?);
        return Ok(());
    }
    if has_flag("--serve") {
        return serve(config, has_flag("--memory"));
    }

    anyhow::bail!(
        "usage: secref [--env <name>] (--ingest <file> | --serve [--memory] [--port <n>] | --stats | --compact)"
    )
}

fn main() {
    let env = get_env();
    let config = match AppConfig::load(&env) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    let log_guard = secref::logging::init_logging(&config);

    if let Err(e) = run(&env, &config) {
        tracing::error!(error = %e, "Fatal");
        eprintln!("Error: {:#}", e);
        // exit skips destructors; flush the file writer first
        drop(log_guard);
        std::process::exit(1);
    }
}
