//! Fixed-interval literals
//!
//! Supported forms: `250ms`, `5s`, `2m`, `1h`, `@every 5s`, and a bare
//! integer which is read as milliseconds.

use super::ScheduleError;
use std::time::Duration;

const EVERY_PREFIX: &str = "@every";

/// Returns `None` when `input` does not look like an interval literal at all,
/// so the caller can try it as a cron expression instead.
pub(super) fn try_parse_interval(input: &str) -> Option<Result<Duration, ScheduleError>> {
    let input = input.trim();

    if let Some(rest) = input.strip_prefix(EVERY_PREFIX) {
        let rest = rest.trim();
        return Some(parse_literal(rest).unwrap_or_else(|| {
            Err(ScheduleError::InvalidInterval {
                input: input.to_string(),
                reason: "expected a duration like 500ms, 5s, 2m or 1h".to_string(),
            })
        }));
    }

    if input.contains(char::is_whitespace) {
        return None;
    }

    parse_literal(input)
}

fn parse_literal(input: &str) -> Option<Result<Duration, ScheduleError>> {
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (number, unit) = input.split_at(split);
    if number.is_empty() {
        return None;
    }

    let to_duration: fn(u64) -> Duration = match unit {
        "" | "ms" => Duration::from_millis,
        "s" => Duration::from_secs,
        "m" => |n| Duration::from_secs(n.saturating_mul(60)),
        "h" => |n| Duration::from_secs(n.saturating_mul(3600)),
        _ => return None,
    };

    let invalid = |reason: &str| ScheduleError::InvalidInterval {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let value = match number.parse::<u64>() {
        Ok(value) => value,
        Err(_) => return Some(Err(invalid("number out of range"))),
    };
    if value == 0 {
        return Some(Err(invalid("interval must be greater than zero")));
    }

    Some(Ok(to_duration(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Duration {
        try_parse_interval(input).unwrap().unwrap()
    }

    #[test]
    fn test_units() {
        assert_eq!(parse("250ms"), Duration::from_millis(250));
        assert_eq!(parse("5s"), Duration::from_secs(5));
        assert_eq!(parse("2m"), Duration::from_secs(120));
        assert_eq!(parse("1h"), Duration::from_secs(3600));
    }

    #[test]
    fn test_bare_integer_is_milliseconds() {
        assert_eq!(parse("1000"), Duration::from_millis(1000));
    }

    #[test]
    fn test_every_prefix() {
        assert_eq!(parse("@every 100ms"), Duration::from_millis(100));
        assert_eq!(parse("  @every   3s "), Duration::from_secs(3));
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(try_parse_interval("0s").unwrap().is_err());
        assert!(try_parse_interval("0").unwrap().is_err());
    }

    #[test]
    fn test_bad_every_rejected() {
        assert!(try_parse_interval("@every soon").unwrap().is_err());
        assert!(try_parse_interval("@every 5 fortnights").unwrap().is_err());
    }

    #[test]
    fn test_non_interval_falls_through() {
        assert!(try_parse_interval("*/5 * * * * *").is_none());
        assert!(try_parse_interval("5d").is_none());
        assert!(try_parse_interval("ms").is_none());
    }
}
