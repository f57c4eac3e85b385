// issue_type.rs - Issue type codes and security description derivation

/// Description used when the issue type is unknown or the coupon does not parse.
pub const DESCRIPTION_UNAVAILABLE: &str = "Description not available";

/// Map a two-character issue type code to its display label.
///
/// Returns `None` for codes outside the reference table.
pub fn issue_type_label(code: &str) -> Option<&'static str> {
    let label = match code {
        "99" => "N/A",
        "AB" => "Asset-Backed",
        "AD" => "ADR/GDR",
        "AG" => "Agency Bond",
        "AI" => "Alternative Invt",
        "BC" => "Convertible Bond",
        "BD" => "Bond",
        "CA" => "Cash/Repo/MM",
        "CE" => "Closed-End Mutual Fund",
        "CP" => "Convertible Preferred",
        "DB" => "Debenture",
        "DL" => "Dual Listing",
        "DR" => "Derivative",
        "EP" => "Equity (Pre-IPO)",
        "EQ" => "Equity",
        "ET" => "Exchange Traded Fund",
        "FM" => "First Mortgage",
        "FU" => "Future Agreement",
        "FX" => "Fixed Income/Unclassified",
        "ID" => "Index",
        "LN" => "Loan",
        "MB" => "Mortgage-Backed",
        "MT" => "Medium Term Note",
        "MU" => "Municipal Bonds",
        "NT" => "Note",
        "OE" => "Open-End Mutual Fund",
        "OP" => "Stock Option",
        "PF" => "Preferred",
        "PQ" => "Private Equity",
        "PV" => "Private Placement",
        "SH" => "Short Position",
        "UI" => "Unit Invt Trust",
        "UL" => "Treasury/Long-Term",
        "US" => "Treasury/Short-Term",
        "WT" => "Warrant/Right",
        _ => return None,
    };
    Some(label)
}

/// Build a human readable description.
///
/// Format: `<label>  <ticker> <coupon>% <maturity>` where each detail is only
/// present when its input is non-empty. Coupon is rendered with two decimals,
/// maturity has `-` replaced by `/`.
///
/// Returns `None` when the issue type is unknown or the coupon is not a number.
pub fn describe(code: &str, ticker: &str, coupon: &str, maturity: &str) -> Option<String> {
    let label = issue_type_label(code)?;

    let mut details: Vec<String> = Vec::with_capacity(3);
    if !ticker.is_empty() {
        details.push(ticker.to_string());
    }
    if !coupon.is_empty() {
        let rate: f64 = coupon.parse().ok()?;
        details.push(format!("{}%", format_rate(rate)));
    }
    if !maturity.is_empty() {
        details.push(maturity.replace('-', "/"));
    }

    if details.is_empty() {
        Some(label.to_string())
    } else {
        Some(format!("{}  {}", label, details.join(" ")))
    }
}

/// Two decimals; non-finite rates render as `+Inf`, `-Inf` or `NaN`.
fn format_rate(rate: f64) -> String {
    if rate.is_nan() {
        "NaN".to_string()
    } else if rate.is_infinite() {
        let sign = if rate > 0.0 { "+" } else { "-" };
        format!("{}Inf", sign)
    } else {
        format!("{:.2}", rate)
    }
}

/// Same as [`describe`], but never fails: falls back to [`DESCRIPTION_UNAVAILABLE`].
pub fn describe_or_fallback(code: &str, ticker: &str, coupon: &str, maturity: &str) -> String {
    describe(code, ticker, coupon, maturity)
        .unwrap_or_else(|| DESCRIPTION_UNAVAILABLE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_only() {
        assert_eq!(describe("EQ", "", "", "").as_deref(), Some("Equity"));
        assert_eq!(describe("99", "", "", "").as_deref(), Some("N/A"));
    }

    #[test]
    fn test_full_bond_description() {
        let desc = describe("BD", "AAPL", "3.45", "2045-02-09");
        assert_eq!(desc.as_deref(), Some("Bond  AAPL 3.45% 2045/02/09"));
    }

    #[test]
    fn test_coupon_rounds_to_two_decimals() {
        assert_eq!(
            describe("NT", "", "4.126", "").as_deref(),
            Some("Note  4.13%")
        );
        assert_eq!(describe("NT", "", "5", "").as_deref(), Some("Note  5.00%"));
    }

    #[test]
    fn test_unknown_issue_type_falls_back() {
        assert_eq!(describe("ZZ", "IBM", "", ""), None);
        assert_eq!(
            describe_or_fallback("ZZ", "IBM", "", ""),
            DESCRIPTION_UNAVAILABLE
        );
    }

    #[test]
    fn test_unparseable_coupon_falls_back() {
        assert_eq!(describe("BD", "", "n/a", "2030-01-01"), None);
        assert_eq!(
            describe_or_fallback("BD", "", "n/a", "2030-01-01"),
            DESCRIPTION_UNAVAILABLE
        );
    }

    #[test]
    fn test_non_finite_coupon() {
        assert_eq!(describe("BD", "", "inf", "").as_deref(), Some("Bond  +Inf%"));
        assert_eq!(describe("BD", "", "-Infinity", "").as_deref(), Some("Bond  -Inf%"));
        assert_eq!(describe("BD", "", "NaN", "").as_deref(), Some("Bond  NaN%"));
    }

    #[test]
    fn test_deterministic() {
        let a = describe_or_fallback("MU", "NYC", "2.5", "2031-06-30");
        let b = describe_or_fallback("MU", "NYC", "2.5", "2031-06-30");
        assert_eq!(a, b);
    }
}
