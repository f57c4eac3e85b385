//! Error types for the codec and the index engines
//!
//! A lookup miss is NOT an error: engines return
//! [`SecurityRecord::placeholder`](crate::security::SecurityRecord::placeholder)
//! for that position instead.

use thiserror::Error;

/// Codec failures
#[derive(Error, Debug)]
pub enum CodecError {
    /// Stored bytes failed the integrity check, decompression or shape decode.
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// Record could not be serialized.
    #[error("Record encoding failed: {0}")]
    Encode(String),
}

/// Index engine failures
#[derive(Error, Debug)]
pub enum IndexError {
    /// Underlying byte-store I/O or transaction failure
    #[error("Storage engine error: {0}")]
    Engine(#[from] redb::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Another handle kept the database locked for longer than the open timeout
    #[error("Timed out after {waited_ms}ms waiting to open database at {path}")]
    OpenTimeout { path: String, waited_ms: u64 },

    /// In-memory build input was not sorted ascending by CUSIP
    #[error("CUSIP {key:?} arrived after {previous:?}; input must be sorted ascending")]
    OutOfOrder { previous: String, key: String },

    /// Automaton construction or finalization failed
    #[error("Automaton error: {0}")]
    Automaton(#[from] fst::Error),
}

macro_rules! engine_error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for IndexError {
                fn from(e: $ty) -> Self {
                    IndexError::Engine(e.into())
                }
            }
        )*
    };
}

engine_error_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
    redb::CompactionError,
);

pub type IndexResult<T> = Result<T, IndexError>;
