//! Go-style duration strings (`3m`, `1h30m`, `250ms`, `0`).

use std::fmt::Write;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serializer};

use super::{ConfigError, ConfigResult};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// One `<number><unit>` component at the start of the input.
static COMPONENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d*)(?:\.(\d*))?(ns|us|µs|μs|ms|s|m|h)").expect("valid duration pattern")
});

fn unit_nanos(unit: &str) -> u128 {
    match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => NANOS_PER_SEC,
        "m" => 60 * NANOS_PER_SEC,
        // "h" is the only other unit the pattern accepts
        _ => 3_600 * NANOS_PER_SEC,
    }
}

/// Parses a duration written as a sequence of `<number><unit>` pairs.
///
/// Units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`; numbers may carry
/// a decimal fraction (`1.5h`). A bare `0` is zero. Negative durations are
/// rejected.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use junit2alertmanager::config::parse_duration;
///
/// assert_eq!(parse_duration("1h30m")?, Duration::from_secs(5400));
/// assert_eq!(parse_duration("0")?, Duration::ZERO);
/// # Ok::<(), junit2alertmanager::config::ConfigError>(())
/// ```
pub fn parse_duration(input: &str) -> ConfigResult<Duration> {
    let invalid = |reason: &str| ConfigError::InvalidDuration {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if trimmed.starts_with('-') {
        return Err(invalid("negative durations are not allowed"));
    }
    if trimmed == "0" {
        return Ok(Duration::ZERO);
    }
    if trimmed.is_empty() {
        return Err(invalid("empty duration"));
    }

    let mut rest = trimmed;
    let mut total: u128 = 0;
    while !rest.is_empty() {
        let caps = COMPONENT
            .captures(rest)
            .ok_or_else(|| invalid("expected <number><unit>, e.g. 3m or 1h30m"))?;
        let whole = caps.get(1).map_or("", |m| m.as_str());
        let frac = caps.get(2).map_or("", |m| m.as_str());
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid("missing number before unit"));
        }
        let unit = unit_nanos(&caps[3]);

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("number too large"))?
        };
        let mut nanos = whole
            .checked_mul(unit)
            .ok_or_else(|| invalid("duration overflows"))?;

        if !frac.is_empty() {
            let digits = &frac[..frac.len().min(18)];
            let scale = 10u128.pow(digits.len() as u32);
            let fraction: u128 = digits.parse().map_err(|_| invalid("bad fraction"))?;
            nanos += fraction * unit / scale;
        }

        total = total
            .checked_add(nanos)
            .ok_or_else(|| invalid("duration overflows"))?;
        rest = &rest[caps[0].len()..];
    }

    let secs = u64::try_from(total / NANOS_PER_SEC).map_err(|_| invalid("duration overflows"))?;
    Ok(Duration::new(secs, (total % NANOS_PER_SEC) as u32))
}

/// Formats a duration in the syntax accepted by [`parse_duration`].
pub fn format_duration(duration: Duration) -> String {
    if duration.is_zero() {
        return "0s".to_string();
    }

    let secs = duration.as_secs();
    let nanos = duration.subsec_nanos();

    if secs == 0 {
        return if nanos % 1_000_000 == 0 {
            format!("{}ms", nanos / 1_000_000)
        } else if nanos % 1_000 == 0 {
            format!("{}us", nanos / 1_000)
        } else {
            format!("{}ns", nanos)
        };
    }

    let mut out = String::new();
    let (hours, minutes, seconds) = (secs / 3600, secs / 60 % 60, secs % 60);
    if hours > 0 {
        let _ = write!(out, "{}h", hours);
    }
    if minutes > 0 {
        let _ = write!(out, "{}m", minutes);
    }
    if nanos > 0 {
        let fraction = format!("{:09}", nanos);
        let _ = write!(out, "{}.{}s", seconds, fraction.trim_end_matches('0'));
    } else if seconds > 0 {
        let _ = write!(out, "{}s", seconds);
    }
    out
}

pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

pub(super) fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_duration(*duration))
}
