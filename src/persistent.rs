//! Persistent Index Engine - CUSIP/ISIN/SEDOL index triple on an embedded store
//!
//! # Layout
//!
//! ```text
//! ┌──────────────┬──────────────────────────────────────────┐
//! │ details      │ CUSIP → codec-encoded SecurityRecord     │
//! │ isin_index   │ ISIN  → CUSIP   (only 12-char ISINs)     │
//! │ sedol_index  │ SEDOL → CUSIP   (only 7-char SEDOLs)     │
//! └──────────────┴──────────────────────────────────────────┘
//! ```
//!
//! # Consistency
//!
//! Each `store` call is one write transaction: the batch is all-or-nothing.
//! Batches from different callers commit in whatever order the store
//! serializes them; on key collision the last commit wins. Readers see some
//! prefix of committed batches, never a partial batch.
//!
//! The store's own transactions are the only synchronization. The handle is
//! shared (`Arc`) between ingestion workers and query readers.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use redb::{
    Database, ReadOnlyTable, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};

use crate::codec;
use crate::core_types::{IdentifierKind, is_indexable_isin, is_indexable_sedol};
use crate::error::{IndexError, IndexResult};
use crate::security::SecurityRecord;
use crate::storage::{Getter, Storer};

const DETAILS: TableDefinition<&str, &[u8]> = TableDefinition::new("details");
const ISIN_INDEX: TableDefinition<&str, &str> = TableDefinition::new("isin_index");
const SEDOL_INDEX: TableDefinition<&str, &str> = TableDefinition::new("sedol_index");

/// Default wait for another handle to release the database file lock
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(1);

const OPEN_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Row counts per key space
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub details: u64,
    pub isins: u64,
    pub sedols: u64,
}

impl std::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "details={}, isin_index={}, sedol_index={}",
            self.details, self.isins, self.sedols
        )
    }
}

/// Disk-backed security index
pub struct PersistentIndex {
    db: Database,
    path: PathBuf,
}

impl PersistentIndex {
    /// Open (or create) the index with [`DEFAULT_OPEN_TIMEOUT`].
    pub fn open(path: impl AsRef<Path>) -> IndexResult<Self> {
        Self::open_with_timeout(path, DEFAULT_OPEN_TIMEOUT)
    }

    /// Open (or create) the index, waiting at most `timeout` for the file lock.
    ///
    /// Creates the three key spaces if they are missing. Idempotent.
    pub fn open_with_timeout(path: impl AsRef<Path>, timeout: Duration) -> IndexResult<Self> {
        let path = path.as_ref().to_path_buf();
        let started = Instant::now();

        let db = loop {
            match Database::create(&path) {
                Ok(db) => break db,
                Err(redb::DatabaseError::DatabaseAlreadyOpen) => {
                    if started.elapsed() >= timeout {
                        return Err(IndexError::OpenTimeout {
                            path: path.display().to_string(),
                            waited_ms: started.elapsed().as_millis() as u64,
                        });
                    }
                    thread::sleep(OPEN_RETRY_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        };

        let txn = db.begin_write()?;
        {
            txn.open_table(DETAILS)?;
            txn.open_table(ISIN_INDEX)?;
            txn.open_table(SEDOL_INDEX)?;
        }
        txn.commit()?;

        tracing::info!(path = %path.display(), "Opened security index");
        Ok(Self { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Row counts of the three key spaces.
    pub fn stats(&self) -> IndexResult<IndexStats> {
        let txn = self.db.begin_read()?;
        Ok(IndexStats {
            details: txn.open_table(DETAILS)?.len()?,
            isins: txn.open_table(ISIN_INDEX)?.len()?,
            sedols: txn.open_table(SEDOL_INDEX)?.len()?,
        })
    }

    /// Visit every stored record in ascending CUSIP order.
    ///
    /// Runs inside one read transaction, so the visit sees a single snapshot.
    /// Returns the number of records visited.
    pub fn for_each_record<F>(&self, mut visit: F) -> IndexResult<u64>
    where
        F: FnMut(SecurityRecord) -> IndexResult<()>,
    {
        let txn = self.db.begin_read()?;
        let details = txn.open_table(DETAILS)?;
        let mut visited = 0u64;
        for entry in details.iter()? {
            let (_cusip, value) = entry?;
            visit(codec::decode(value.value())?)?;
            visited += 1;
        }
        Ok(visited)
    }

    /// Reclaim free pages in the database file.
    ///
    /// Requires exclusive access; returns `false` if nothing was compacted.
    pub fn compact(&mut self) -> IndexResult<bool> {
        let compacted = self.db.compact()?;
        tracing::info!(path = %self.path.display(), compacted, "Compaction finished");
        Ok(compacted)
    }
}

/// Write one batch into an open transaction. Returns the number of records written.
fn write_batch(txn: &WriteTransaction, batch: &[SecurityRecord]) -> IndexResult<usize> {
    let mut details = txn.open_table(DETAILS)?;
    let mut isins = txn.open_table(ISIN_INDEX)?;
    let mut sedols = txn.open_table(SEDOL_INDEX)?;

    let mut written = 0;
    for sec in batch {
        let cusip = sec.cusip();
        if cusip.is_empty() {
            tracing::warn!(isin = sec.isin(), sedol = sec.sedol(), "Skipping record without CUSIP");
            continue;
        }

        let encoded = codec::encode(sec)?;
        details.insert(cusip, encoded.as_slice())?;

        if is_indexable_isin(sec.isin()) {
            isins.insert(sec.isin(), cusip)?;
        }
        if is_indexable_sedol(sec.sedol()) {
            sedols.insert(sec.sedol(), cusip)?;
        }
        written += 1;
    }
    Ok(written)
}

/// Resolve a single key against one read snapshot.
fn resolve(
    details: &ReadOnlyTable<&'static str, &'static [u8]>,
    isins: &ReadOnlyTable<&'static str, &'static str>,
    sedols: &ReadOnlyTable<&'static str, &'static str>,
    key: &str,
) -> IndexResult<SecurityRecord> {
    let cusip: Option<Cow<'_, str>> = match IdentifierKind::classify(key) {
        IdentifierKind::Isin => isins.get(key)?.map(|g| Cow::Owned(g.value().to_string())),
        IdentifierKind::Sedol => sedols.get(key)?.map(|g| Cow::Owned(g.value().to_string())),
        IdentifierKind::Cusip => Some(Cow::Borrowed(key)),
    };

    let Some(cusip) = cusip else {
        return Ok(SecurityRecord::placeholder());
    };

    // A secondary pointer whose detail row is missing is a miss, not an error
    match details.get(cusip.as_ref())? {
        Some(stored) => Ok(codec::decode(stored.value())?),
        None => Ok(SecurityRecord::placeholder()),
    }
}

impl PersistentIndex {
    /// Run `write` in one write transaction; commit on success, abort on error.
    fn commit_batch<F>(&self, batch: &[SecurityRecord], write: F) -> IndexResult<()>
    where
        F: FnOnce(&WriteTransaction, &[SecurityRecord]) -> IndexResult<usize>,
    {
        let txn = self.db.begin_write()?;
        match write(&txn, batch) {
            Ok(written) => {
                txn.commit()?;
                tracing::debug!(batch = batch.len(), written, "Committed batch");
                Ok(())
            }
            Err(e) => {
                if let Err(abort_err) = txn.abort() {
                    tracing::error!(error = %abort_err, "Abort after failed batch also failed");
                }
                Err(e)
            }
        }
    }
}

impl Storer for PersistentIndex {
    fn store(&self, batch: &[SecurityRecord]) -> IndexResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.commit_batch(batch, write_batch)
    }
}

impl Getter for PersistentIndex {
    fn get(&self, keys: &[&str]) -> IndexResult<Vec<SecurityRecord>> {
        let txn = self.db.begin_read()?;
        let details = txn.open_table(DETAILS)?;
        let isins = txn.open_table(ISIN_INDEX)?;
        let sedols = txn.open_table(SEDOL_INDEX)?;

        // Walk the B-tree in key order, write results back in request order
        let mut order: Vec<usize> = (0..keys.len()).collect();
        order.sort_unstable_by_key(|&i| keys[i]);

        let mut results = vec![SecurityRecord::placeholder(); keys.len()];
        for i in order {
            results[i] = resolve(&details, &isins, &sedols, keys[i])?;
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, PersistentIndex) {
        let dir = tempfile::tempdir().unwrap();
        let index = PersistentIndex::open(dir.path().join("secref.redb")).unwrap();
        (dir, index)
    }

    fn apple() -> SecurityRecord {
        SecurityRecord::new(
            "037833100",
            "US0378331005",
            "",
            "AAPL",
            "000C7F-E",
            "EQ",
            "",
            "",
        )
    }

    fn microsoft() -> SecurityRecord {
        SecurityRecord::new("594918104", "", "2046251", "MSFT", "000KYX-E", "EQ", "", "")
    }

    #[test]
    fn test_open_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secref.redb");
        {
            let index = PersistentIndex::open(&path).unwrap();
            index.store(&[apple()]).unwrap();
        }
        let index = PersistentIndex::open(&path).unwrap();
        assert_eq!(index.get(&["037833100"]).unwrap()[0], apple());
    }

    #[test]
    fn test_store_then_get_by_cusip() {
        let (_dir, index) = open_temp();
        index.store(&[apple()]).unwrap();
        assert_eq!(index.get(&["037833100"]).unwrap(), vec![apple()]);
    }

    #[test]
    fn test_secondary_resolution() {
        let (_dir, index) = open_temp();
        index.store(&[apple(), microsoft()]).unwrap();

        let got = index.get(&["US0378331005", "2046251"]).unwrap();
        assert_eq!(got, vec![apple(), microsoft()]);
    }

    #[test]
    fn test_miss_returns_placeholder() {
        let (_dir, index) = open_temp();
        index.store(&[apple()]).unwrap();

        let got = index.get(&["000000000", "XS0000000000", "0000000", ""]).unwrap();
        assert_eq!(got.len(), 4);
        assert!(got.iter().all(SecurityRecord::is_empty));
    }

    #[test]
    fn test_results_follow_request_order_with_duplicates() {
        let (_dir, index) = open_temp();
        index.store(&[apple(), microsoft()]).unwrap();

        let got = index
            .get(&["594918104", "nope", "037833100", "594918104"])
            .unwrap();
        assert_eq!(got[0], microsoft());
        assert!(got[1].is_empty());
        assert_eq!(got[2], apple());
        assert_eq!(got[3], microsoft());
    }

    #[test]
    fn test_wrong_length_secondary_ids_not_indexed() {
        let (_dir, index) = open_temp();
        // 11-char ISIN and 6-char SEDOL are stored on the record but not indexed
        let odd = SecurityRecord::new("123456789", "US123456789", "123456", "", "", "EQ", "", "");
        index.store(&[odd.clone()]).unwrap();

        let stats = index.stats().unwrap();
        assert_eq!(stats.details, 1);
        assert_eq!(stats.isins, 0);
        assert_eq!(stats.sedols, 0);

        // The 11-char key is looked up as a CUSIP only
        assert!(index.get(&["US123456789"]).unwrap()[0].is_empty());
        assert_eq!(index.get(&["123456789"]).unwrap()[0], odd);
    }

    #[test]
    fn test_restore_replaces_wholesale() {
        let (_dir, index) = open_temp();
        index.store(&[apple()]).unwrap();

        let replacement =
            SecurityRecord::new("037833100", "", "", "AAPL2", "", "EQ", "", "");
        index.store(&[replacement.clone()]).unwrap();

        assert_eq!(index.get(&["037833100"]).unwrap()[0], replacement);
        // Old ISIN pointer still resolves to the CUSIP, which now holds the new record
        assert_eq!(index.get(&["US0378331005"]).unwrap()[0], replacement);
    }

    #[test]
    fn test_isin_last_write_wins() {
        let (_dir, index) = open_temp();
        let first = SecurityRecord::new("111111111", "US1111111111", "", "", "", "EQ", "", "");
        let second = SecurityRecord::new("222222222", "US1111111111", "", "", "", "EQ", "", "");
        index.store(&[first]).unwrap();
        index.store(&[second.clone()]).unwrap();

        assert_eq!(index.get(&["US1111111111"]).unwrap()[0], second);
    }

    #[test]
    fn test_record_without_cusip_is_skipped() {
        let (_dir, index) = open_temp();
        let orphan = SecurityRecord::new("", "US9999999999", "9999999", "", "", "EQ", "", "");
        index.store(&[orphan, apple()]).unwrap();

        let stats = index.stats().unwrap();
        assert_eq!(stats.details, 1);
        assert_eq!(stats.isins, 1);
        assert_eq!(stats.sedols, 0);
        assert!(index.get(&["US9999999999"]).unwrap()[0].is_empty());
    }

    #[test]
    fn test_for_each_record_is_sorted() {
        let (_dir, index) = open_temp();
        index.store(&[microsoft(), apple()]).unwrap();

        let mut seen = Vec::new();
        let count = index
            .for_each_record(|sec| {
                seen.push(sec.cusip().to_string());
                Ok(())
            })
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(seen, vec!["037833100", "594918104"]);
    }

    #[test]
    fn test_second_open_times_out_while_locked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secref.redb");
        let _held = PersistentIndex::open(&path).unwrap();

        let err = PersistentIndex::open_with_timeout(&path, Duration::from_millis(50))
            .err()
            .expect("second open should fail while the first handle is alive");
        assert!(matches!(err, IndexError::OpenTimeout { .. }));
    }

    fn numbered_batch(count: usize) -> Vec<SecurityRecord> {
        (0..count)
            .map(|i| {
                let cusip = format!("{:09}", i);
                let isin = format!("US{:010}", i);
                SecurityRecord::new(cusip, isin, "", "", "", "EQ", "", "")
            })
            .collect()
    }

    #[test]
    fn test_failed_batch_is_rolled_back() {
        let (_dir, index) = open_temp();
        index.store(&[apple()]).unwrap();
        let before = index.stats().unwrap();

        // Every record is written into the transaction before the failure
        let err = index
            .commit_batch(&numbered_batch(50), |txn, batch| {
                write_batch(txn, batch)?;
                Err(CodecError::Encode("disk full".to_string()).into())
            })
            .unwrap_err();
        assert!(matches!(err, IndexError::Codec(_)));

        assert_eq!(index.stats().unwrap(), before);
        let got = index.get(&["000000000", "US0000000049", "037833100"]).unwrap();
        assert!(got[0].is_empty());
        assert!(got[1].is_empty());
        assert_eq!(got[2], apple());

        // The handle stays usable after the abort
        index.store(&numbered_batch(50)).unwrap();
        assert_eq!(index.stats().unwrap().details, 51);
    }

    #[test]
    fn test_readers_never_see_part_of_a_batch() {
        const BATCH: usize = 500;
        let (_dir, index) = open_temp();
        let index = std::sync::Arc::new(index);
        let batch = numbered_batch(BATCH);
        let keys: Vec<String> = batch.iter().map(|r| r.cusip().to_string()).collect();

        let writer = {
            let index = index.clone();
            thread::spawn(move || index.store(&batch))
        };

        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        for _ in 0..300 {
            let hits = index
                .get(&key_refs)
                .unwrap()
                .iter()
                .filter(|r| !r.is_empty())
                .count();
            assert!(hits == 0 || hits == BATCH, "saw {} of {} records", hits, BATCH);
        }

        writer.join().unwrap().unwrap();
        assert_eq!(index.stats().unwrap().details, BATCH as u64);
    }

    #[test]
    fn test_compact_keeps_data() {
        let (_dir, mut index) = open_temp();
        index.store(&[apple(), microsoft()]).unwrap();
        index.compact().unwrap();
        assert_eq!(index.get(&["2046251"]).unwrap()[0], microsoft());
    }
}
