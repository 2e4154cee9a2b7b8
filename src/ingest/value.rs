//! Typed coercion of raw string cells
//!
//! Unparsable values become missing, never zero: zero is a valid data value
//! and must not be conflated with absence.

/// Tokens that mean "not reported" in the source tables.
const MISSING_TOKENS: [&str; 6] = ["", "NA", "N/A", "NONE", "NULL", "NAN"];

fn is_missing(trimmed: &str) -> bool {
    MISSING_TOKENS.contains(&trimmed.to_uppercase().as_str())
}

/// Strip thousands separators, currency symbols and surrounding whitespace.
fn clean_numeric(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| *c != ',' && *c != '$')
        .collect()
}

/// Parse a non-negative count. Integral-valued decimals ("120.0") are
/// accepted since some sources export counts as floats. Negative or
/// fractional values are malformed and become missing.
pub fn parse_count(raw: &str) -> Option<i64> {
    let cleaned = clean_numeric(raw);
    if is_missing(&cleaned) {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    if value < 0.0 || value.fract() != 0.0 || value > i64::MAX as f64 {
        return None;
    }
    Some(value as i64)
}

/// Parse a non-negative currency amount.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned = clean_numeric(raw);
    if is_missing(&cleaned) {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(value)
}

/// Parse an allocation fraction. Sources report either fractions in [0, 1]
/// or percentage points; values above 1 are treated as points and divided
/// by 100. Anything outside [0, 100] is malformed.
pub fn parse_fraction(raw: &str) -> Option<f64> {
    let value = parse_amount(raw)?;
    if value <= 1.0 {
        Some(value)
    } else if value <= 100.0 {
        Some(value / 100.0)
    } else {
        None
    }
}

/// Parse a four-digit filing year.
pub fn parse_year(raw: &str) -> Option<i32> {
    let cleaned = clean_numeric(raw);
    if is_missing(&cleaned) {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    if value.fract() != 0.0 {
        return None;
    }
    let year = value as i32;
    (1900..=2200).contains(&year).then_some(year)
}

/// Trimmed text, with missing tokens mapped to `None`.
pub fn parse_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if is_missing(trimmed) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thousands_separators_stripped() {
        assert_eq!(parse_count("1,234"), Some(1234));
        assert_eq!(parse_amount("$2,500,000.75"), Some(2_500_000.75));
    }

    #[test]
    fn test_missing_is_not_zero() {
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("N/A"), None);
        assert_eq!(parse_amount("none"), None);
        assert_eq!(parse_count("0"), Some(0));
        assert_eq!(parse_amount("0"), Some(0.0));
    }

    #[test]
    fn test_malformed_becomes_missing() {
        assert_eq!(parse_count("-5"), None);
        assert_eq!(parse_count("12.5"), None);
        assert_eq!(parse_count("abc"), None);
        assert_eq!(parse_amount("-100"), None);
    }

    #[test]
    fn test_float_exported_counts() {
        assert_eq!(parse_count("120.0"), Some(120));
    }

    #[test]
    fn test_fraction_units() {
        assert_eq!(parse_fraction("0.35"), Some(0.35));
        assert_eq!(parse_fraction("35"), Some(0.35));
        assert_eq!(parse_fraction("1.0"), Some(1.0));
        assert_eq!(parse_fraction("250"), None);
    }

    #[test]
    fn test_year_bounds() {
        assert_eq!(parse_year("2021"), Some(2021));
        assert_eq!(parse_year("2021.0"), Some(2021));
        assert_eq!(parse_year("21"), None);
    }
}
