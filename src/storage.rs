//! Engine seams
//!
//! Both engines implement [`Getter`] with the same miss contract, so the query
//! service cannot tell them apart. Only the persistent engine is a [`Storer`].

use crate::error::IndexResult;
use crate::security::SecurityRecord;

/// Batch lookup by CUSIP, ISIN or SEDOL (inferred from key length).
pub trait Getter: Send + Sync {
    /// Resolve every key independently.
    ///
    /// The result has the same length and order as `keys`. Unknown keys map to
    /// [`SecurityRecord::placeholder`]. Errors are per call, never per key.
    fn get(&self, keys: &[&str]) -> IndexResult<Vec<SecurityRecord>>;
}

/// Atomic batch writes.
pub trait Storer: Send + Sync {
    /// Write the whole batch in one transaction: all of it becomes visible or none.
    fn store(&self, batch: &[SecurityRecord]) -> IndexResult<()>;
}

impl<T: Getter + ?Sized> Getter for std::sync::Arc<T> {
    fn get(&self, keys: &[&str]) -> IndexResult<Vec<SecurityRecord>> {
        (**self).get(keys)
    }
}

impl<T: Storer + ?Sized> Storer for std::sync::Arc<T> {
    fn store(&self, batch: &[SecurityRecord]) -> IndexResult<()> {
        (**self).store(batch)
    }
}
