//! Cron expressions evaluated in UTC
//!
//! Six fields `sec min hour day-of-month month day-of-week`, or five fields
//! with seconds fixed at zero. Each field accepts `*`, `?`, single values,
//! ranges `a-b`, steps `*/n`, `a/n`, `a-b/n` and comma-separated lists.
//! Months and weekdays also accept three-letter names. When both day fields
//! are restricted a day matching either one fires.

use super::ScheduleError;
use chrono::{
    DateTime, Datelike, Duration as TimeDelta, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc,
};
use std::fmt;
use std::str::FromStr;

/// How far ahead `next_after` searches before giving up
const SEARCH_HORIZON_DAYS: i64 = 366 * 5;

const MONTH_NAMES: &[&str] = &[
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const WEEKDAY_NAMES: &[&str] = &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    /// Value that `names[0]` maps to
    names_base: u32,
}

const SECONDS: FieldSpec = FieldSpec {
    name: "seconds",
    min: 0,
    max: 59,
    names: &[],
    names_base: 0,
};
const MINUTES: FieldSpec = FieldSpec {
    name: "minutes",
    min: 0,
    max: 59,
    names: &[],
    names_base: 0,
};
const HOURS: FieldSpec = FieldSpec {
    name: "hours",
    min: 0,
    max: 23,
    names: &[],
    names_base: 0,
};
const DAYS_OF_MONTH: FieldSpec = FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: &[],
    names_base: 0,
};
const MONTHS: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    names: MONTH_NAMES,
    names_base: 1,
};
// 7 is accepted as an alias for Sunday
const DAYS_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: WEEKDAY_NAMES,
    names_base: 0,
};

/// Parsed field: bit `n` set when value `n` matches.
///
/// A field written with a leading `*` (including `*/n`) is unrestricted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSet {
    bits: u64,
    restricted: bool,
}

impl FieldSet {
    fn contains(&self, value: u32) -> bool {
        self.bits & (1u64 << value) != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    source: String,
    seconds: FieldSet,
    minutes: FieldSet,
    hours: FieldSet,
    days_of_month: FieldSet,
    months: FieldSet,
    days_of_week: FieldSet,
}

impl CronExpr {
    /// First matching instant strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = now.naive_utc().with_nanosecond(0)? + TimeDelta::seconds(1);
        let limit = start + TimeDelta::days(SEARCH_HORIZON_DAYS);
        let mut t = start;

        while t <= limit {
            if !self.months.contains(t.month()) {
                t = first_of_next_month(t)?;
                continue;
            }
            if !self.day_matches(t) {
                t = t.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !self.hours.contains(t.hour()) {
                t = t.with_minute(0)?.with_second(0)? + TimeDelta::hours(1);
                continue;
            }
            if !self.minutes.contains(t.minute()) {
                t = t.with_second(0)? + TimeDelta::minutes(1);
                continue;
            }
            if !self.seconds.contains(t.second()) {
                t += TimeDelta::seconds(1);
                continue;
            }
            return Some(Utc.from_utc_datetime(&t));
        }

        None
    }

    fn day_matches(&self, t: NaiveDateTime) -> bool {
        let dom = self.days_of_month.contains(t.day());
        let dow = self
            .days_of_week
            .contains(t.weekday().num_days_from_sunday());

        if self.days_of_month.restricted && self.days_of_week.restricted {
            dom || dow
        } else {
            dom && dow
        }
    }
}

impl FromStr for CronExpr {
    type Err = ScheduleError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = input.split_whitespace().collect();
        let fields: Vec<&str> = match fields.len() {
            5 => std::iter::once("0").chain(fields).collect(),
            6 => fields,
            n => {
                return Err(ScheduleError::InvalidCron {
                    input: input.to_string(),
                    reason: format!("expected 5 or 6 fields, found {n}"),
                })
            }
        };

        let parse = |text: &str, spec: &FieldSpec| {
            parse_field(text, spec).map_err(|reason| ScheduleError::InvalidCron {
                input: input.to_string(),
                reason: format!("{} field '{}': {}", spec.name, text, reason),
            })
        };

        let mut days_of_week = parse(fields[5], &DAYS_OF_WEEK)?;
        if days_of_week.contains(7) {
            days_of_week.bits = (days_of_week.bits & !(1 << 7)) | 1;
        }

        let expr = CronExpr {
            source: input.trim().to_string(),
            seconds: parse(fields[0], &SECONDS)?,
            minutes: parse(fields[1], &MINUTES)?,
            hours: parse(fields[2], &HOURS)?,
            days_of_month: parse(fields[3], &DAYS_OF_MONTH)?,
            months: parse(fields[4], &MONTHS)?,
            days_of_week,
        };

        if expr.next_after(Utc::now()).is_none() {
            return Err(ScheduleError::InvalidCron {
                input: input.to_string(),
                reason: "expression never matches a calendar date".to_string(),
            });
        }

        Ok(expr)
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_field(text: &str, spec: &FieldSpec) -> Result<FieldSet, String> {
    let mut bits = 0u64;
    let mut restricted = false;

    for part in text.split(',') {
        if part.is_empty() {
            return Err("empty list element".to_string());
        }

        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("invalid step '{step}'"))?;
                if step == 0 {
                    return Err("step must be positive".to_string());
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (lo, hi) = if range == "*" || range == "?" {
            (spec.min, spec.max)
        } else if let Some((lo, hi)) = range.split_once('-') {
            restricted = true;
            (parse_value(lo, spec)?, parse_value(hi, spec)?)
        } else {
            restricted = true;
            let value = parse_value(range, spec)?;
            // `a/n` runs from `a` to the end of the field
            (value, if step.is_some() { spec.max } else { value })
        };

        if lo > hi {
            return Err(format!("range {lo}-{hi} is reversed"));
        }

        for value in (lo..=hi).step_by(step.unwrap_or(1) as usize) {
            bits |= 1u64 << value;
        }
    }

    Ok(FieldSet { bits, restricted })
}

fn parse_value(text: &str, spec: &FieldSpec) -> Result<u32, String> {
    let value = match text.parse::<u32>() {
        Ok(value) => value,
        Err(_) => spec
            .names
            .iter()
            .position(|name| name.eq_ignore_ascii_case(text))
            .map(|index| index as u32 + spec.names_base)
            .ok_or_else(|| format!("invalid value '{text}'"))?,
    };

    if value < spec.min || value > spec.max {
        return Err(format!("value {value} outside {}-{}", spec.min, spec.max));
    }
    Ok(value)
}

fn first_of_next_month(t: NaiveDateTime) -> Option<NaiveDateTime> {
    let (year, month) = if t.month() == 12 {
        (t.year() + 1, 1)
    } else {
        (t.year(), t.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)
}
