//! Record Codec - compact on-disk encoding for [`SecurityRecord`]
//!
//! # Layout
//!
//! ```text
//! ┌────────────┬─────────┬──────────────────────────────────────┐
//! │ checksum   │ 4 bytes │ CRC32 (LE) of the compressed body     │
//! │ body       │ N bytes │ snappy(bincode(fields))              │
//! └────────────┴─────────┴──────────────────────────────────────┘
//! ```
//!
//! Fields are written in a fixed order without the JSON omission rules, so
//! every record (including empty fields) round-trips exactly.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::security::SecurityRecord;

/// Checksum prefix size in bytes
pub const CHECKSUM_SIZE: usize = 4;

#[derive(Serialize)]
struct FieldsRef<'a> {
    cusip: &'a str,
    isin: &'a str,
    sedol: &'a str,
    ticker: &'a str,
    legal_entity_id: &'a str,
    description: &'a str,
}

#[derive(Deserialize)]
struct Fields {
    cusip: String,
    isin: String,
    sedol: String,
    ticker: String,
    legal_entity_id: String,
    description: String,
}

#[inline]
fn crc32_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Encode a record for storage. Deterministic: equal records give equal bytes.
pub fn encode(record: &SecurityRecord) -> Result<Vec<u8>, CodecError> {
    let fields = FieldsRef {
        cusip: record.cusip(),
        isin: record.isin(),
        sedol: record.sedol(),
        ticker: record.ticker(),
        legal_entity_id: record.legal_entity_id(),
        description: record.description(),
    };
    let raw = bincode::serialize(&fields).map_err(|e| CodecError::Encode(e.to_string()))?;
    let body = snap::raw::Encoder::new()
        .compress_vec(&raw)
        .map_err(|e| CodecError::Encode(e.to_string()))?;

    let mut out = Vec::with_capacity(CHECKSUM_SIZE + body.len());
    out.extend_from_slice(&crc32_checksum(&body).to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode stored bytes. Either the whole record decodes or the call fails.
pub fn decode(bytes: &[u8]) -> Result<SecurityRecord, CodecError> {
    if bytes.len() < CHECKSUM_SIZE {
        return Err(CodecError::CorruptRecord(format!(
            "truncated: {} bytes",
            bytes.len()
        )));
    }
    let (prefix, body) = bytes.split_at(CHECKSUM_SIZE);
    let expected = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
    let actual = crc32_checksum(body);
    if expected != actual {
        return Err(CodecError::CorruptRecord(format!(
            "CRC32 checksum mismatch, expected={}, got={}",
            expected, actual
        )));
    }

    let raw = snap::raw::Decoder::new()
        .decompress_vec(body)
        .map_err(|e| CodecError::CorruptRecord(format!("decompression failed: {}", e)))?;

    let fields: Fields = bincode::deserialize(&raw)
        .map_err(|e| CodecError::CorruptRecord(format!("decode failed: {}", e)))?;

    Ok(SecurityRecord::from_parts(
        fields.cusip,
        fields.isin,
        fields.sedol,
        fields.ticker,
        fields.legal_entity_id,
        fields.description,
    ))
}
