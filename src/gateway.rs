//! HTTP gateway - serves batch lookups over either engine
//!
//! Routes:
//! - `POST /query` - body `{"Keys": [...]}`, returns `{"Results": [...]}`
//! - `GET /health`
//!
//! Engine calls are synchronous and run on the blocking pool.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tokio::net::TcpListener;

use crate::query;
use crate::storage::Getter;

/// Shared gateway state
#[derive(Clone)]
pub struct AppState {
    /// Persistent or in-memory engine
    pub getter: Arc<dyn Getter>,
    /// Engine name reported by /health
    pub engine: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    engine: &'static str,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/query", post(query_handler))
        .route("/health", get(health_check))
        .with_state(Arc::new(state))
}

pub async fn query_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let getter = state.getter.clone();
    let outcome =
        tokio::task::spawn_blocking(move || query::handle(getter.as_ref(), &body)).await;

    match outcome {
        Ok(Ok(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(Err(e)) if e.is_validation() => {
            tracing::debug!(error = %e, "[QUERY] Rejected request");
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "[QUERY] Lookup failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "[QUERY] Lookup task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "lookup task failed").into_response()
        }
    }
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        engine: state.engine,
    })
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, engine = state.engine, "Gateway listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryIndex;
    use crate::security::SecurityRecord;

    fn state() -> Arc<AppState> {
        let index = MemoryIndex::from_records(vec![SecurityRecord::new(
            "037833100",
            "US0378331005",
            "",
            "AAPL",
            "",
            "EQ",
            "",
            "",
        )])
        .unwrap();
        Arc::new(AppState {
            getter: Arc::new(index),
            engine: "memory",
        })
    }

    #[tokio::test]
    async fn test_query_ok() {
        let body = Bytes::from_static(br#"{"Keys": ["US0378331005", "000000000"]}"#);
        let response = query_handler(State(state()), body).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_body_is_bad_request() {
        let response = query_handler(State(state()), Bytes::new()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let response = query_handler(State(state()), Bytes::from_static(b"[1,2")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
