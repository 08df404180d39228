// Stablecoin amount codec
// Converts between human decimal strings and raw integer units with checked
// math. No floats anywhere near balances.

use alloy_primitives::U256;

use crate::errors::BridgeError;

/// Parse a human decimal string ("100", "0.5", "1.000001") into raw units of a
/// token with the given number of decimals. Rejects more fractional digits
/// than the token can represent rather than rounding.
pub fn parse_stablecoin_amount(amount: &str, decimals: u8) -> Result<U256, BridgeError> {
    let invalid = |reason: &str| BridgeError::InvalidAmount {
        amount: amount.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty string"));
    }

    let (whole, frac) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid("no digits"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("non-digit character"));
    }
    if frac.len() > decimals as usize {
        return Err(invalid("more fractional digits than the token's decimals"));
    }

    let scale = U256::from(10u64).pow(U256::from(decimals as u64));
    let whole_units = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10).map_err(|_| invalid("whole part out of range"))?
    };
    let frac_units = if frac.is_empty() {
        U256::ZERO
    } else {
        let padded = U256::from_str_radix(frac, 10).map_err(|_| invalid("fraction out of range"))?;
        padded * U256::from(10u64).pow(U256::from((decimals as usize - frac.len()) as u64))
    };

    whole_units
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(|| invalid("amount overflows"))
}

/// Lossy conversion for USD display math only; never used for balances.
pub fn approx_f64(value: U256) -> f64 {
    value.to_string().parse().unwrap_or(f64::MAX)
}

/// Format raw units back into a canonical decimal string: no trailing
/// fractional zeros, no trailing dot.
pub fn format_stablecoin_amount(raw: U256, decimals: u8) -> String {
    let scale = U256::from(10u64).pow(U256::from(decimals as u64));
    let whole = raw / scale;
    let frac = raw % scale;
    if frac.is_zero() {
        return whole.to_string();
    }
    let digits = frac.to_string();
    let padded = format!("{}{digits}", "0".repeat(decimals as usize - digits.len()));
    format!("{whole}.{}", padded.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_and_fractional_amounts() {
        assert_eq!(parse_stablecoin_amount("100", 6).unwrap(), U256::from(100_000_000u64));
        assert_eq!(parse_stablecoin_amount("0.5", 6).unwrap(), U256::from(500_000u64));
        assert_eq!(parse_stablecoin_amount("1.000001", 6).unwrap(), U256::from(1_000_001u64));
        assert_eq!(parse_stablecoin_amount(".25", 6).unwrap(), U256::from(250_000u64));
    }

    #[test]
    fn rejects_excess_precision_and_garbage() {
        assert!(parse_stablecoin_amount("1.0000001", 6).is_err());
        assert!(parse_stablecoin_amount("", 6).is_err());
        assert!(parse_stablecoin_amount(".", 6).is_err());
        assert!(parse_stablecoin_amount("1,5", 6).is_err());
        assert!(parse_stablecoin_amount("-1", 6).is_err());
        assert!(parse_stablecoin_amount("1e6", 6).is_err());
    }

    #[test]
    fn format_then_parse_round_trips() {
        for raw in [0u64, 1, 999_999, 1_000_000, 123_456_789] {
            let raw = U256::from(raw);
            let text = format_stablecoin_amount(raw, 6);
            assert_eq!(parse_stablecoin_amount(&text, 6).unwrap(), raw);
        }
    }

    #[test]
    fn parse_then_format_round_trips_canonical_strings() {
        for text in ["100", "0.5", "1.000001", "42.1", "0.000001"] {
            let raw = parse_stablecoin_amount(text, 6).unwrap();
            assert_eq!(format_stablecoin_amount(raw, 6), text);
        }
    }
}
