//! Core identifier types used throughout the system
//!
//! Lookup keys carry no explicit scheme tag. The scheme is inferred from the
//! key length exactly once, at the boundary, via [`IdentifierKind::classify`].

/// ISIN length (ISO 6166)
pub const ISIN_LEN: usize = 12;

/// SEDOL length
pub const SEDOL_LEN: usize = 7;

/// CUSIP / CINS length
pub const CUSIP_LEN: usize = 9;

/// Identifier scheme of a lookup key.
///
/// # Dispatch rule
/// - length 12 → [`IdentifierKind::Isin`]
/// - length 7  → [`IdentifierKind::Sedol`]
/// - anything else → [`IdentifierKind::Cusip`]
///
/// A 9-character CUSIP is the common case, but any other length also falls
/// through to a primary-key lookup; the engines do not validate CUSIP length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierKind {
    Cusip,
    Isin,
    Sedol,
}

impl IdentifierKind {
    /// Infer the identifier scheme from the key length (in bytes).
    #[inline]
    pub fn classify(key: &str) -> Self {
        match key.len() {
            ISIN_LEN => IdentifierKind::Isin,
            SEDOL_LEN => IdentifierKind::Sedol,
            _ => IdentifierKind::Cusip,
        }
    }
}

/// True when `isin` is of the length the ISIN index accepts.
#[inline]
pub fn is_indexable_isin(isin: &str) -> bool {
    isin.len() == ISIN_LEN
}

/// True when `sedol` is of the length the SEDOL index accepts.
#[inline]
pub fn is_indexable_sedol(sedol: &str) -> bool {
    sedol.len() == SEDOL_LEN
}
