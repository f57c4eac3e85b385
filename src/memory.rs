//! In-Memory Index Engine - read-only, rebuilt from a sorted snapshot
//!
//! # Structure
//!
//! ```text
//!   CUSIP ──▶ [minimal FST] ──▶ position ─┐
//!   ISIN  ──▶ [FxHashMap]   ──▶ position ─┼──▶ records[position]
//!   SEDOL ──▶ [FxHashMap]   ──▶ position ─┘
//! ```
//!
//! The CUSIP automaton is built incrementally and requires keys in ascending
//! byte order. Out-of-order input fails fast with [`IndexError::OutOfOrder`].
//! After the last insert the builder's serialized form is loaded back as an
//! immutable [`fst::Map`], which is what lookups traverse.
//!
//! Once built the index is never mutated, so it can be shared across threads
//! (`Arc<MemoryIndex>`) without locking.

use std::cmp::Ordering;

use fst::{Map, MapBuilder};
use rustc_hash::FxHashMap;

use crate::core_types::{IdentifierKind, is_indexable_isin, is_indexable_sedol};
use crate::error::{IndexError, IndexResult};
use crate::persistent::PersistentIndex;
use crate::security::SecurityRecord;
use crate::storage::Getter;

/// Immutable in-memory security index
pub struct MemoryIndex {
    cusips: Map<Vec<u8>>,
    records: Vec<SecurityRecord>,
    isins: FxHashMap<String, usize>,
    sedols: FxHashMap<String, usize>,
}

/// Incremental builder for [`MemoryIndex`]
///
/// Records must arrive sorted ascending by CUSIP. A record whose CUSIP equals
/// the previous one replaces it (last write wins).
pub struct MemoryIndexBuilder {
    cusips: MapBuilder<Vec<u8>>,
    records: Vec<SecurityRecord>,
    isins: FxHashMap<String, usize>,
    sedols: FxHashMap<String, usize>,
    skipped: u64,
}

impl MemoryIndexBuilder {
    pub fn new() -> Self {
        Self {
            cusips: MapBuilder::memory(),
            records: Vec::new(),
            isins: FxHashMap::default(),
            sedols: FxHashMap::default(),
            skipped: 0,
        }
    }

    /// Add the next record of the sorted stream.
    pub fn insert(&mut self, sec: SecurityRecord) -> IndexResult<()> {
        if sec.cusip().is_empty() {
            self.skipped += 1;
            tracing::warn!(isin = sec.isin(), sedol = sec.sedol(), "Skipping record without CUSIP");
            return Ok(());
        }

        let ordering = self
            .records
            .last()
            .map(|prev| sec.cusip().cmp(prev.cusip()));

        let position = match ordering {
            Some(Ordering::Less) => {
                let previous = self
                    .records
                    .last()
                    .map(|prev| prev.cusip().to_string())
                    .unwrap_or_default();
                return Err(IndexError::OutOfOrder {
                    previous,
                    key: sec.cusip().to_string(),
                });
            }
            Some(Ordering::Equal) => self.records.len() - 1,
            Some(Ordering::Greater) | None => {
                let position = self.records.len();
                self.cusips.insert(sec.cusip(), position as u64)?;
                position
            }
        };

        if is_indexable_isin(sec.isin()) {
            self.isins.insert(sec.isin().to_string(), position);
        }
        if is_indexable_sedol(sec.sedol()) {
            self.sedols.insert(sec.sedol().to_string(), position);
        }

        if position == self.records.len() {
            self.records.push(sec);
        } else {
            self.records[position] = sec;
        }
        Ok(())
    }

    /// Minimize and freeze the automaton.
    pub fn finish(self) -> IndexResult<MemoryIndex> {
        let bytes = self.cusips.into_inner()?;
        let cusips = Map::new(bytes)?;

        tracing::info!(
            records = self.records.len(),
            isins = self.isins.len(),
            sedols = self.sedols.len(),
            skipped = self.skipped,
            automaton_bytes = cusips.as_fst().size(),
            "Built in-memory index"
        );

        Ok(MemoryIndex {
            cusips,
            records: self.records,
            isins: self.isins,
            sedols: self.sedols,
        })
    }
}

impl Default for MemoryIndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIndex {
    /// Build from a stream sorted ascending by CUSIP.
    pub fn from_records<I>(records: I) -> IndexResult<Self>
    where
        I: IntoIterator<Item = SecurityRecord>,
    {
        let mut builder = MemoryIndexBuilder::new();
        for sec in records {
            builder.insert(sec)?;
        }
        builder.finish()
    }

    /// Build from a snapshot of the persistent index.
    ///
    /// The persistent index yields records in CUSIP order, which satisfies the
    /// builder's ordering requirement.
    pub fn from_persistent(index: &PersistentIndex) -> IndexResult<Self> {
        let mut builder = MemoryIndexBuilder::new();
        index.for_each_record(|sec| builder.insert(sec))?;
        builder.finish()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn lookup(&self, key: &str) -> Option<&SecurityRecord> {
        let position = match IdentifierKind::classify(key) {
            IdentifierKind::Isin => self.isins.get(key).copied(),
            IdentifierKind::Sedol => self.sedols.get(key).copied(),
            IdentifierKind::Cusip => self.cusips.get(key).map(|p| p as usize),
        }?;
        self.records.get(position)
    }
}

impl Getter for MemoryIndex {
    fn get(&self, keys: &[&str]) -> IndexResult<Vec<SecurityRecord>> {
        Ok(keys
            .iter()
            .map(|key| self.lookup(key).cloned().unwrap_or_default())
            .collect())
    }
}
