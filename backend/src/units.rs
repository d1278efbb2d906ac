//! Fixed-point conversions between decimal strings and integer base units.

use crate::models::Wei;

pub const ETHER_DECIMALS: u8 = 18;

/// Fixed USD price of one property token.
pub const TOKEN_PRICE_USD: u128 = 50;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitsError {
    #[error("Invalid decimal amount: {0}")]
    Invalid(String),
    #[error("Too many fractional digits in {0}")]
    Precision(String),
    #[error("Amount out of range: {0}")]
    Overflow(String),
}

pub fn pow10(decimals: u8) -> Option<Wei> {
    Wei::from(10u8).checked_pow(u32::from(decimals))
}

/// Parses a non-negative decimal string into base units with `decimals` places.
pub fn parse_units(raw: &str, decimals: u8) -> Result<Wei, UnitsError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(UnitsError::Invalid(raw.to_string()));
    }
    let (whole, fraction) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(UnitsError::Invalid(raw.to_string()));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(UnitsError::Invalid(raw.to_string()));
    }

    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > usize::from(decimals) {
        return Err(UnitsError::Precision(raw.to_string()));
    }

    let overflow = || UnitsError::Overflow(raw.to_string());
    let scale = pow10(decimals).ok_or_else(overflow)?;
    let whole_value: Wei = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };
    let mut value = whole_value.checked_mul(scale).ok_or_else(overflow)?;
    if !fraction.is_empty() {
        let padded = format!("{:0<width$}", fraction, width = usize::from(decimals));
        let fraction_value: Wei = padded.parse().map_err(|_| overflow())?;
        value = value.checked_add(fraction_value).ok_or_else(overflow)?;
    }
    Ok(value)
}

/// Formats base units as a decimal string without trailing zeros.
pub fn format_units(value: Wei, decimals: u8) -> String {
    let scale = match pow10(decimals) {
        Some(scale) => scale,
        None => return value.to_string(),
    };
    let whole = value / scale;
    let fraction = value % scale;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0>width$}", fraction, width = usize::from(decimals));
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

pub fn parse_ether(raw: &str) -> Result<Wei, UnitsError> {
    parse_units(raw, ETHER_DECIMALS)
}

pub fn format_ether(value: Wei) -> String {
    format_units(value, ETHER_DECIMALS)
}

/// Converts a USD amount to wei at `eth_usd` dollars per ether.
pub fn usd_to_wei(usd: f64, eth_usd: f64) -> Result<Wei, UnitsError> {
    if !usd.is_finite() || !eth_usd.is_finite() || usd < 0.0 || eth_usd <= 0.0 {
        return Err(UnitsError::Invalid(format!("{} USD at {} USD/ETH", usd, eth_usd)));
    }
    // Shortest round-trip form, truncated to wei precision.
    let eth = (usd / eth_usd).to_string();
    let truncated = match eth.split_once('.') {
        Some((whole, fraction)) if fraction.len() > usize::from(ETHER_DECIMALS) => {
            format!("{}.{}", whole, &fraction[..usize::from(ETHER_DECIMALS)])
        }
        _ => eth,
    };
    parse_ether(&truncated)
}

/// Serializes wei as a decimal string; JSON numbers cannot hold the full range.
pub mod wei_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    use crate::models::Wei;

    pub fn serialize<S: Serializer>(value: &Wei, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Wei, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_and_fractional_amounts() {
        assert_eq!(parse_ether("1").unwrap(), 1_000_000_000_000_000_000);
        assert_eq!(parse_ether("0.01").unwrap(), 10_000_000_000_000_000);
        assert_eq!(parse_ether(".5").unwrap(), 500_000_000_000_000_000);
        assert_eq!(parse_units("500000", 18).unwrap(), 500_000 * 10u128.pow(18));
        assert_eq!(parse_units("12", 0).unwrap(), 12);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(parse_ether(""), Err(UnitsError::Invalid(_))));
        assert!(matches!(parse_ether("-1"), Err(UnitsError::Invalid(_))));
        assert!(matches!(parse_ether("1.2.3"), Err(UnitsError::Invalid(_))));
        assert!(matches!(parse_units("0.001", 2), Err(UnitsError::Precision(_))));
        assert!(matches!(
            parse_ether("999999999999999999999999999999"),
            Err(UnitsError::Overflow(_))
        ));
    }

    #[test]
    fn formats_without_trailing_zeros() {
        assert_eq!(format_units(500_000 * 10u128.pow(18), 18), "500000");
        assert_eq!(format_ether(50_000_000_000_000_000), "0.05");
        assert_eq!(format_ether(0), "0");
        assert_eq!(format_units(1234, 2), "12.34");
    }

    #[test]
    fn converts_usd_at_rate() {
        assert_eq!(usd_to_wei(60.0, 2000.0).unwrap(), parse_ether("0.03").unwrap());
        assert!(usd_to_wei(10.0, 0.0).is_err());
    }
}
