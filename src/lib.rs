//! secref - Security Reference Store
//!
//! Resolves CUSIP, ISIN or SEDOL identifiers to a canonical security record.
//!
//! # Modules
//!
//! - [`core_types`] - Identifier kinds and the length dispatch rule
//! - [`issue_type`] - Issue type labels and description derivation
//! - [`security`] - SecurityRecord and the raw ingest row
//! - [`codec`] - Checksummed, compressed record encoding
//! - [`storage`] - Getter / Storer engine seams
//! - [`persistent`] - redb-backed persistent index
//! - [`memory`] - Read-only FST-backed in-memory index
//! - [`pipeline`] - Parallel batched bulk load
//! - [`source`] - JSON-lines record source
//! - [`query`] - Batch query envelopes
//! - [`gateway`] - HTTP query service

// Core types - must be first!
pub mod core_types;

pub mod codec;
pub mod error;
pub mod issue_type;
pub mod security;

// Engines
pub mod memory;
pub mod persistent;
pub mod storage;

// Ingest
pub mod pipeline;
pub mod source;

// Serving
pub mod gateway;
pub mod query;

pub mod config;
pub mod logging;

// Convenient re-exports at crate root
pub use core_types::IdentifierKind;
pub use error::{CodecError, IndexError, IndexResult};
pub use memory::{MemoryIndex, MemoryIndexBuilder};
pub use persistent::{IndexStats, PersistentIndex};
pub use pipeline::{IngestReport, PipelineError, PipelineStatsSnapshot, run_ingestion};
pub use query::{QueryError, QueryRequest, QueryResponse};
pub use security::{RawSecurityRow, SecurityRecord};
pub use source::JsonLinesSource;
pub use storage::{Getter, Storer};
