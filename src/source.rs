//! Normalized record source - newline-delimited JSON rows
//!
//! Each non-blank line is one [`RawSecurityRow`] object as produced by the
//! upstream normalizer (charset decoding and quote repair already applied).
//! Malformed lines (bad JSON or bad UTF-8) are logged and skipped; an I/O
//! error ends the stream.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::security::{RawSecurityRow, SecurityRecord};

/// Counters shared with the caller while the source is owned by the pipeline
#[derive(Debug, Default)]
pub struct SourceStats {
    pub lines_read: AtomicU64,
    pub malformed: AtomicU64,
    pub read_errors: AtomicU64,
}

impl SourceStats {
    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    pub fn read_errors(&self) -> u64 {
        self.read_errors.load(Ordering::Relaxed)
    }
}

/// Iterator of [`SecurityRecord`]s over a JSON-lines reader
pub struct JsonLinesSource<R: BufRead> {
    reader: R,
    buf: Vec<u8>,
    line_no: u64,
    stats: Arc<SourceStats>,
}

impl JsonLinesSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(512),
            line_no: 0,
            stats: Arc::new(SourceStats::default()),
        }
    }

    /// Handle to the counters; stays valid after the source is consumed.
    pub fn stats(&self) -> Arc<SourceStats> {
        self.stats.clone()
    }
}

impl<R: BufRead> Iterator for JsonLinesSource<R> {
    type Item = SecurityRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    self.stats.read_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(line = self.line_no + 1, error = %e, "Read failed, ending source");
                    return None;
                }
            }
            self.line_no += 1;
            self.stats.lines_read.fetch_add(1, Ordering::Relaxed);

            let trimmed = self.buf.trim_ascii();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_slice::<RawSecurityRow>(trimmed) {
                Ok(row) => return Some(SecurityRecord::from(row)),
                Err(e) => {
                    self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(line = self.line_no, error = %e, "Skipping malformed row");
                }
            }
        }
    }
}
