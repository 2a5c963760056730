use std::num::NonZeroU64;
use std::str::FromStr;

use memchr::{memchr, memchr2};
use thiserror::Error;

use crate::limiter::BandwidthLimiter;

/// Smallest non-zero rate accepted, in bytes per second.
const MIN_RATE: u128 = 512;

/// Parsed `--bwlimit` value: an optional rate and an optional burst size.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BandwidthLimitComponents {
    rate: Option<NonZeroU64>,
    burst: Option<NonZeroU64>,
}

impl BandwidthLimitComponents {
    /// Constructs a component set. A burst without a rate is discarded.
    #[must_use]
    pub const fn new(rate: Option<NonZeroU64>, burst: Option<NonZeroU64>) -> Self {
        let burst = if rate.is_some() { burst } else { None };
        Self { rate, burst }
    }

    /// A component set that disables throttling.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self::new(None, None)
    }

    /// Returns the byte-per-second rate, if any.
    #[must_use]
    pub const fn rate(&self) -> Option<NonZeroU64> {
        self.rate
    }

    /// Returns the burst size in bytes, if any.
    #[must_use]
    pub const fn burst(&self) -> Option<NonZeroU64> {
        self.burst
    }

    /// Indicates whether the limit disables throttling.
    #[must_use]
    pub const fn is_unlimited(&self) -> bool {
        self.rate.is_none()
    }

    /// Builds a [`BandwidthLimiter`], or `None` when unlimited.
    #[must_use]
    pub fn into_limiter(self) -> Option<BandwidthLimiter> {
        self.rate
            .map(|rate| BandwidthLimiter::with_burst(rate, self.burst))
    }
}

impl FromStr for BandwidthLimitComponents {
    type Err = BandwidthParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        parse_bandwidth_limit(text)
    }
}

/// Errors returned when parsing a bandwidth limit fails.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum BandwidthParseError {
    /// The argument did not follow the recognised syntax.
    #[error("invalid bandwidth limit syntax")]
    Invalid,
    /// The requested rate was below 512 bytes per second.
    #[error("bandwidth limit is below the minimum of 512 bytes per second")]
    TooSmall,
    /// The requested rate overflowed the supported range.
    #[error("bandwidth limit exceeds the supported range")]
    TooLarge,
}

/// Parses a `--bwlimit` rate into bytes per second.
///
/// A bare number is read as KiB/s. Suffixes `B`, `K`, `M`, `G`, `T` and `P`
/// (case-insensitive) select the unit; a trailing `B` (`KB`, `MB`) switches to
/// powers of 1000 and `iB` (`KiB`) states powers of 1024 explicitly. A
/// fractional part may use `.` or `,`. Surrounding ASCII whitespace is
/// ignored. `Ok(None)` means unlimited and is returned for any zero value.
#[doc(alias = "--bwlimit")]
pub fn parse_bandwidth_argument(text: &str) -> Result<Option<NonZeroU64>, BandwidthParseError> {
    let bytes = parse_quantity(text, b'K')?;
    if bytes == 0 {
        return Ok(None);
    }
    if bytes < MIN_RATE {
        return Err(BandwidthParseError::TooSmall);
    }
    to_non_zero(bytes).map(Some)
}

/// Parses `RATE[:BURST]`.
///
/// The burst is a plain byte count unless it carries a unit suffix, and a
/// zero burst means "no explicit burst".
#[doc(alias = "--bwlimit")]
pub fn parse_bandwidth_limit(text: &str) -> Result<BandwidthLimitComponents, BandwidthParseError> {
    let (rate_text, burst_text) = match memchr(b':', text.as_bytes()) {
        Some(colon) => (&text[..colon], Some(&text[colon + 1..])),
        None => (text, None),
    };

    let rate = parse_bandwidth_argument(rate_text)?;
    let burst = match burst_text {
        Some(burst) => {
            let bytes = parse_quantity(burst, b'B')?;
            if bytes == 0 {
                None
            } else {
                Some(to_non_zero(bytes)?)
            }
        }
        None => None,
    };

    Ok(BandwidthLimitComponents::new(rate, burst))
}

fn to_non_zero(bytes: u128) -> Result<NonZeroU64, BandwidthParseError> {
    u64::try_from(bytes)
        .ok()
        .and_then(NonZeroU64::new)
        .ok_or(BandwidthParseError::TooLarge)
}

/// Parses `NUMBER[UNIT[B|iB]]` into a byte count, rounding fractions to the
/// nearest byte.
fn parse_quantity(text: &str, default_unit: u8) -> Result<u128, BandwidthParseError> {
    let trimmed = text.trim_matches(|ch: char| ch.is_ascii_whitespace());
    let bytes = trimmed.as_bytes();

    let numeric_end = bytes
        .iter()
        .position(|&byte| !(byte.is_ascii_digit() || byte == b'.' || byte == b','))
        .unwrap_or(bytes.len());
    let (numeric, suffix) = bytes.split_at(numeric_end);
    let (integer, fraction, denominator) = parse_decimal(numeric)?;

    let (unit, tail) = match suffix.split_first() {
        Some((&unit, tail)) => (unit, tail),
        None => (default_unit, suffix),
    };
    let exponent = match unit.to_ascii_lowercase() {
        b'b' if tail.is_empty() => 0,
        b'k' => 1,
        b'm' => 2,
        b'g' => 3,
        b't' => 4,
        b'p' => 5,
        _ => return Err(BandwidthParseError::Invalid),
    };
    let base: u128 = match tail {
        [] => 1024,
        [b'b' | b'B'] => 1000,
        [b'i' | b'I', b'b' | b'B'] => 1024,
        _ => return Err(BandwidthParseError::Invalid),
    };

    let multiplier = base
        .checked_pow(exponent)
        .ok_or(BandwidthParseError::TooLarge)?;
    let whole = integer
        .checked_mul(multiplier)
        .ok_or(BandwidthParseError::TooLarge)?;
    let scaled_fraction = fraction
        .checked_mul(multiplier)
        .ok_or(BandwidthParseError::TooLarge)?;
    let rounded = (scaled_fraction + denominator / 2) / denominator;
    whole
        .checked_add(rounded)
        .ok_or(BandwidthParseError::TooLarge)
}

/// Splits `digits[.digits]` into integer part, fractional numerator and
/// fractional denominator.
fn parse_decimal(text: &[u8]) -> Result<(u128, u128, u128), BandwidthParseError> {
    let (integer_text, fraction_text) = match memchr2(b'.', b',', text) {
        Some(separator) => (&text[..separator], &text[separator + 1..]),
        None => (text, &[][..]),
    };

    if integer_text.is_empty() && fraction_text.is_empty() {
        return Err(BandwidthParseError::Invalid);
    }

    let integer = parse_digits(integer_text)?;
    let mut fraction = 0u128;
    let mut denominator = 1u128;
    for &byte in fraction_text {
        if !byte.is_ascii_digit() {
            return Err(BandwidthParseError::Invalid);
        }
        // Digits past 1e-18 cannot change the rounded byte count.
        if denominator >= 10u128.pow(18) {
            continue;
        }
        denominator *= 10;
        fraction = fraction * 10 + u128::from(byte - b'0');
    }
    Ok((integer, fraction, denominator))
}

fn parse_digits(text: &[u8]) -> Result<u128, BandwidthParseError> {
    text.iter().try_fold(0u128, |value, &byte| {
        if !byte.is_ascii_digit() {
            return Err(BandwidthParseError::Invalid);
        }
        value
            .checked_mul(10)
            .and_then(|value| value.checked_add(u128::from(byte - b'0')))
            .ok_or(BandwidthParseError::TooLarge)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rate(text: &str) -> Option<u64> {
        parse_bandwidth_argument(text)
            .expect("valid rate")
            .map(NonZeroU64::get)
    }

    #[test]
    fn bare_number_is_kibibytes() {
        assert_eq!(rate("1"), Some(1024));
        assert_eq!(rate("100"), Some(102_400));
    }

    #[test]
    fn suffixes_select_units() {
        assert_eq!(rate("2K"), Some(2048));
        assert_eq!(rate("1m"), Some(1_048_576));
        assert_eq!(rate("1G"), Some(1 << 30));
        assert_eq!(rate("1000b"), Some(1000));
    }

    #[test]
    fn decimal_and_binary_forms() {
        assert_eq!(rate("1KB"), Some(1000));
        assert_eq!(rate("1MB"), Some(1_000_000));
        assert_eq!(rate("1KiB"), Some(1024));
        assert_eq!(rate("1MiB"), Some(1_048_576));
    }

    #[test]
    fn fractions_round_to_nearest_byte() {
        assert_eq!(rate("1.5K"), Some(1536));
        assert_eq!(rate("0,5M"), Some(524_288));
        assert_eq!(rate(".5K"), Some(512));
    }

    #[test]
    fn zero_is_unlimited() {
        assert_eq!(rate("0"), None);
        assert_eq!(rate("0.0M"), None);
    }

    #[test]
    fn whitespace_is_trimmed() {
        assert_eq!(rate("  4K\t"), Some(4096));
    }

    #[test]
    fn small_rates_are_rejected() {
        assert_eq!(
            parse_bandwidth_argument("100B"),
            Err(BandwidthParseError::TooSmall)
        );
        assert_eq!(
            parse_bandwidth_argument("0.1"),
            Err(BandwidthParseError::TooSmall)
        );
    }

    #[test]
    fn malformed_input_is_invalid() {
        for text in ["", " ", "abc", "1X", "1.2.3", "-1", "1KBx", "1Bb", "."] {
            assert_eq!(
                parse_bandwidth_argument(text),
                Err(BandwidthParseError::Invalid),
                "{text:?}"
            );
        }
    }

    #[test]
    fn overflow_is_too_large() {
        assert_eq!(
            parse_bandwidth_argument("99999999999P"),
            Err(BandwidthParseError::TooLarge)
        );
    }

    #[test]
    fn limit_with_burst() {
        let components = parse_bandwidth_limit("1M:64K").expect("valid limit");
        assert_eq!(components.rate().map(NonZeroU64::get), Some(1_048_576));
        assert_eq!(components.burst().map(NonZeroU64::get), Some(65_536));
        assert!(!components.is_unlimited());
    }

    #[test]
    fn burst_defaults_to_bytes() {
        let components: BandwidthLimitComponents = "1M:4096".parse().expect("valid limit");
        assert_eq!(components.burst().map(NonZeroU64::get), Some(4096));
    }

    #[test]
    fn unlimited_rate_discards_burst() {
        let components = parse_bandwidth_limit("0:64K").expect("valid limit");
        assert!(components.is_unlimited());
        assert_eq!(components.burst(), None);
        assert!(components.into_limiter().is_none());
    }

    #[test]
    fn into_limiter_carries_configuration() {
        let limiter = parse_bandwidth_limit("100K:8K")
            .expect("valid limit")
            .into_limiter()
            .expect("limited");
        assert_eq!(limiter.limit_bytes().get(), 102_400);
        assert_eq!(limiter.write_max_bytes(), 8192);
    }

    proptest! {
        #[test]
        fn whole_kibibyte_rates_parse_exactly(value in 1u64..1_000_000) {
            prop_assert_eq!(rate(&value.to_string()), Some(value * 1024));
        }

        #[test]
        fn parser_never_panics(text in "\\PC{0,16}") {
            let _ = parse_bandwidth_limit(&text);
        }
    }
}
