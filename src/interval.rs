//! Interval string parsing.

use crate::error::DatasourceError;

/// Mean Gregorian month, in milliseconds (30.436875 days).
const MS_PER_MONTH: u64 = 2_629_746_000;

/// Mean Gregorian year, in milliseconds (365.2425 days).
const MS_PER_YEAR: u64 = 31_556_952_000;

/// Parse an interval of the form `<integer><unit>` into whole seconds,
/// rounding up, with a floor of one second.
///
/// Units: `ms`, `s`, `m`, `h`, `d`, `w`, `M`, `y`. Anything that does not
/// match the pattern is a [`DatasourceError::MalformedInterval`]; there is
/// no fallback value.
pub fn parse_interval(interval: &str) -> Result<u64, DatasourceError> {
    let malformed = || DatasourceError::MalformedInterval(interval.to_string());

    let digits = interval.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return Err(malformed());
    }
    let (number, unit) = interval.split_at(digits);
    let count: u64 = number.parse().map_err(|_| malformed())?;

    let millis = match unit {
        "ms" => count,
        "s" => count.saturating_mul(1_000),
        "m" => count.saturating_mul(60_000),
        "h" => count.saturating_mul(3_600_000),
        "d" => count.saturating_mul(86_400_000),
        "w" => count.saturating_mul(604_800_000),
        "M" => count.saturating_mul(MS_PER_MONTH),
        "y" => count.saturating_mul(MS_PER_YEAR),
        _ => return Err(malformed()),
    };

    Ok(millis.div_ceil(1_000).max(1))
}
