//! Command argument parsing.
//!
//! All numeric command tokens must be fully consumed; trailing junk is
//! a usage error, never silently truncated. Flash offsets and lengths
//! are hexadecimal (an optional `0x` prefix is accepted). Probe
//! addressing and clock speed use auto-radix: `0x` means hexadecimal,
//! anything else decimal.

use crate::error::{Error, Result};

/// Parse a fully-consumed unsigned hexadecimal token.
pub fn parse_hex(token: &str) -> Result<u32> {
    const BAD: Error = Error::Usage("expected a hexadecimal value");

    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(BAD);
    }
    u32::from_str_radix(digits, 16).map_err(|_| BAD)
}

/// Parse a fully-consumed unsigned token, hexadecimal with a `0x`
/// prefix and decimal otherwise.
pub fn parse_uint(token: &str) -> Result<u32> {
    const BAD: Error = Error::Usage("expected an unsigned number");

    if token.starts_with("0x") || token.starts_with("0X") {
        return parse_hex(token);
    }
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BAD);
    }
    token.parse::<u32>().map_err(|_| BAD)
}

/// Parse a probe addressing token: a plain chip-select index on the
/// default bus, or `bus:cs`.
pub fn parse_probe_target(token: &str, default_bus: u32) -> Result<(u32, u32)> {
    match token.split_once(':') {
        Some((bus, cs)) => Ok((parse_uint(bus)?, parse_uint(cs)?)),
        None => Ok((default_bus, parse_uint(token)?)),
    }
}

/// A parsed length argument for erase-style commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthSpec {
    /// Byte count, already rounded when round-up was requested.
    pub bytes: u32,
    /// Whether the token carried the `+` round-up marker.
    pub rounded_up: bool,
}

impl LengthSpec {
    /// Parse an erase length token. The value is hexadecimal with a
    /// `0x` prefix, decimal otherwise.
    ///
    /// A leading `+` requests rounding up to the next erase-block
    /// boundary; without it the raw value is used. Round-up with a zero
    /// block size falls back to the raw value. A value that rounds past
    /// `u32::MAX` is a usage error, not a wrap.
    pub fn parse(token: &str, erase_block_size: u32) -> Result<LengthSpec> {
        let (rounded_up, digits) = match token.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, token),
        };

        let raw = parse_uint(digits)?;
        let bytes = if rounded_up && erase_block_size > 0 {
            raw.checked_next_multiple_of(erase_block_size)
                .ok_or(Error::Usage("length rounds up past the addressable range"))?
        } else {
            raw
        };

        Ok(LengthSpec { bytes, rounded_up })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_tokens() {
        assert_eq!(parse_hex("1000"), Ok(0x1000));
        assert_eq!(parse_hex("0x1000"), Ok(0x1000));
        assert_eq!(parse_hex("dEaD"), Ok(0xdead));
        assert_eq!(parse_hex("0"), Ok(0));
    }

    #[test]
    fn hex_rejects_partial_tokens() {
        for bad in ["", "0x", "0x10xyz", "10q", "+10", "-1", " 10", "xyz"] {
            assert!(parse_hex(bad).unwrap_err().is_usage(), "{bad:?}");
        }
    }

    #[test]
    fn uint_auto_radix() {
        assert_eq!(parse_uint("10"), Ok(10));
        assert_eq!(parse_uint("0x10"), Ok(0x10));
        assert!(parse_uint("10x").is_err());
        assert!(parse_uint("").is_err());
    }

    #[test]
    fn probe_target_forms() {
        assert_eq!(parse_probe_target("3", 0), Ok((0, 3)));
        assert_eq!(parse_probe_target("2:1", 0), Ok((2, 1)));
        assert_eq!(parse_probe_target("0x10:2", 7), Ok((0x10, 2)));
        assert!(parse_probe_target("3:", 0).is_err());
        assert!(parse_probe_target(":3", 0).is_err());
        assert!(parse_probe_target("", 0).is_err());
        assert!(parse_probe_target("1:2:3", 0).is_err());
    }

    #[test]
    fn length_round_up() {
        let spec = LengthSpec::parse("+0x1000", 0x1000).unwrap();
        assert_eq!(spec.bytes, 0x1000);
        assert!(spec.rounded_up);

        let spec = LengthSpec::parse("+0x1001", 0x1000).unwrap();
        assert_eq!(spec.bytes, 0x2000);

        let spec = LengthSpec::parse("+1", 0x1000).unwrap();
        assert_eq!(spec.bytes, 0x1000);
    }

    #[test]
    fn length_without_marker_is_raw() {
        let spec = LengthSpec::parse("0x1001", 0x1000).unwrap();
        assert_eq!(spec.bytes, 0x1001);
        assert!(!spec.rounded_up);
    }

    #[test]
    fn length_round_up_past_capacity_is_a_usage_error() {
        let err = LengthSpec::parse("+0xFFFFF001", 0x1000).unwrap_err();
        assert!(err.is_usage());

        // The largest value that still rounds cleanly is fine.
        let spec = LengthSpec::parse("+0xFFFFF000", 0x1000).unwrap();
        assert_eq!(spec.bytes, 0xFFFF_F000);
    }

    // A device reporting a zero block size cannot round; the raw value
    // is kept.
    #[test]
    fn length_round_up_with_zero_block_size_falls_back_to_raw() {
        let spec = LengthSpec::parse("+0x1001", 0).unwrap();
        assert_eq!(spec.bytes, 0x1001);
        assert!(spec.rounded_up);
    }

    #[test]
    fn length_bad_formats() {
        for bad in ["abc", "", "0x10xyz", "+", "++1", "+0x"] {
            assert!(LengthSpec::parse(bad, 0x1000).is_err(), "{bad:?}");
        }
    }
}
