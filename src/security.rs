// security.rs - Security reference record and the normalizer row it is built from

use serde::{Deserialize, Serialize};

use crate::issue_type::describe_or_fallback;

/// One row as delivered by the upstream record normalizer.
///
/// All fields are already decoded to UTF-8 and unquoted. Empty string means
/// "absent". `coupon_rate` is a decimal string, `maturity_date` an ISO date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSecurityRow {
    pub cusip: String,
    pub isin: String,
    pub sedol: String,
    pub ticker: String,
    pub entity_id: String,
    pub issue_type_code: String,
    pub coupon_rate: String,
    pub maturity_date: String,
}

/// Security reference record
///
/// Immutable once constructed: the only way to change a stored record is to
/// store a replacement under the same CUSIP.
///
/// The JSON shape matches the query wire format: empty fields are omitted,
/// so the miss placeholder serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecurityRecord {
    #[serde(rename = "LegalEntityId", default, skip_serializing_if = "String::is_empty")]
    legal_entity_id: String,
    #[serde(rename = "Cusip", default, skip_serializing_if = "String::is_empty")]
    cusip: String,
    #[serde(rename = "ISIN", default, skip_serializing_if = "String::is_empty")]
    isin: String,
    #[serde(rename = "Sedol", default, skip_serializing_if = "String::is_empty")]
    sedol: String,
    #[serde(rename = "Ticker", default, skip_serializing_if = "String::is_empty")]
    ticker: String,
    #[serde(rename = "Description", default, skip_serializing_if = "String::is_empty")]
    description: String,
}

impl SecurityRecord {
    /// Build a record from normalized fields, deriving the description.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cusip: impl Into<String>,
        isin: impl Into<String>,
        sedol: impl Into<String>,
        ticker: impl Into<String>,
        legal_entity_id: impl Into<String>,
        issue_type_code: &str,
        coupon_rate: &str,
        maturity_date: &str,
    ) -> Self {
        let ticker = ticker.into();
        let description =
            describe_or_fallback(issue_type_code, &ticker, coupon_rate, maturity_date);
        Self {
            legal_entity_id: legal_entity_id.into(),
            cusip: cusip.into(),
            isin: isin.into(),
            sedol: sedol.into(),
            ticker,
            description,
        }
    }

    /// Reassemble a record from already-derived parts (codec path).
    pub(crate) fn from_parts(
        cusip: String,
        isin: String,
        sedol: String,
        ticker: String,
        legal_entity_id: String,
        description: String,
    ) -> Self {
        Self {
            legal_entity_id,
            cusip,
            isin,
            sedol,
            ticker,
            description,
        }
    }

    /// The empty placeholder returned for a lookup miss.
    pub fn placeholder() -> Self {
        Self::default()
    }

    /// True for the miss placeholder (all fields empty).
    pub fn is_empty(&self) -> bool {
        self.cusip.is_empty()
            && self.isin.is_empty()
            && self.sedol.is_empty()
            && self.ticker.is_empty()
            && self.legal_entity_id.is_empty()
            && self.description.is_empty()
    }

    pub fn cusip(&self) -> &str {
        &self.cusip
    }

    pub fn isin(&self) -> &str {
        &self.isin
    }

    pub fn sedol(&self) -> &str {
        &self.sedol
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn legal_entity_id(&self) -> &str {
        &self.legal_entity_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl From<RawSecurityRow> for SecurityRecord {
    fn from(row: RawSecurityRow) -> Self {
        SecurityRecord::new(
            row.cusip,
            row.isin,
            row.sedol,
            row.ticker,
            row.entity_id,
            &row.issue_type_code,
            &row.coupon_rate,
            &row.maturity_date,
        )
    }
}
