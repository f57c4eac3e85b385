//! Query boundary - batch lookup request/response envelopes
//!
//! Wire shape:
//!
//! ```text
//! request:  {"Keys": ["US0378331005", "2046251", "000000000"]}
//! response: {"Results": [{"Cusip": "037833100", ...}, {"Cusip": "594918104", ...}, {}]}
//! ```
//!
//! `Results` has one entry per requested key, in request order. A miss is `{}`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::IndexError;
use crate::security::SecurityRecord;
use crate::storage::Getter;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(rename = "Keys", default)]
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(rename = "Results")]
    pub results: Vec<SecurityRecord>,
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("This method expects a JSON body containing a request. This request had a body of length 0.")]
    EmptyBody,

    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error("Lookup failed: {0}")]
    Engine(#[from] IndexError),
}

impl QueryError {
    /// Rejected before reaching the engine
    pub fn is_validation(&self) -> bool {
        matches!(self, QueryError::EmptyBody | QueryError::Malformed(_))
    }
}

pub fn parse_request(body: &[u8]) -> Result<QueryRequest, QueryError> {
    if body.is_empty() {
        return Err(QueryError::EmptyBody);
    }
    serde_json::from_slice(body).map_err(|e| QueryError::Malformed(e.to_string()))
}

pub fn execute(getter: &dyn Getter, request: &QueryRequest) -> Result<QueryResponse, QueryError> {
    let keys: Vec<&str> = request.keys.iter().map(String::as_str).collect();
    let results = getter.get(&keys)?;
    Ok(QueryResponse { results })
}

/// Validate, resolve and wrap one raw request body.
pub fn handle(getter: &dyn Getter, body: &[u8]) -> Result<QueryResponse, QueryError> {
    let request = parse_request(body)?;
    execute(getter, &request)
}
