//! Cron Schedules
//!
//! Quartz-style expressions: `sec min hour day-of-month month day-of-week
//! [year]`. Supported per field: `*`, single values, `a-b` ranges, `/step`,
//! comma lists, `JAN`-`DEC` and `SUN`-`SAT` names. Day-of-week runs 1-7
//! with 1 = Sunday.
//!
//! Exactly one of day-of-month and day-of-week must be `?`, as in Quartz:
//! `0 0 0 * * ?` is valid, `0 0 0 * * *` and `0 0 0 ? * ?` are not.
//!
//! The Quartz specials `L` (last day), `W` (nearest weekday) and `#` (nth
//! weekday) are not supported and are rejected. Schedules such as
//! `0 0 0 L * ?` or `0 0 9 ? * 2#1` need rewriting as explicit day lists
//! before they can be used here.

use chrono::{DateTime, Datelike, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike};

use crate::error::{Error, Result};

/// Fields an expression needs at minimum
pub const MIN_FIELDS: usize = 6;

/// Fields an expression may have at most (with the optional year)
pub const MAX_FIELDS: usize = 7;

/// Daily at midnight
pub const DEFAULT_CRON_EXPRESSION: &str = "0 0 0 * * ?";

/// How far ahead to look for an open-ended schedule
const MAX_SEARCH_YEARS: i32 = 8;

const MIN_YEAR: u32 = 1970;
const MAX_YEAR: u32 = 2099;

const MONTH_NAMES: &[&str] = &[
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const DAY_NAMES: &[&str] = &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Number of whitespace-separated fields in `expression`
pub fn field_count(expression: &str) -> usize {
    expression.split_whitespace().count()
}

/// Whether `expression` has at least [`MIN_FIELDS`] fields
pub fn has_min_fields(expression: &str) -> bool {
    field_count(expression) >= MIN_FIELDS
}

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    allows_question: bool,
}

const SECONDS: FieldSpec = FieldSpec {
    name: "seconds",
    min: 0,
    max: 59,
    names: &[],
    allows_question: false,
};
const MINUTES: FieldSpec = FieldSpec {
    name: "minutes",
    min: 0,
    max: 59,
    names: &[],
    allows_question: false,
};
const HOURS: FieldSpec = FieldSpec {
    name: "hours",
    min: 0,
    max: 23,
    names: &[],
    allows_question: false,
};
const DAY_OF_MONTH: FieldSpec = FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: &[],
    allows_question: true,
};
const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    names: MONTH_NAMES,
    allows_question: false,
};
const DAY_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 1,
    max: 7,
    names: DAY_NAMES,
    allows_question: true,
};
const YEAR: FieldSpec = FieldSpec {
    name: "year",
    min: MIN_YEAR,
    max: MAX_YEAR,
    names: &[],
    allows_question: false,
};

/// Parsed field: matching values plus whether the field restricts anything
struct Field {
    values: Vec<u32>,
    restricted: bool,
}

impl Field {
    fn mask(&self) -> u64 {
        self.values.iter().fold(0u64, |mask, v| mask | (1u64 << v))
    }
}

/// A parsed schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    seconds: u64,
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    /// Sorted; `None` for any year
    years: Option<Vec<i32>>,
}

impl CronSchedule {
    /// Parse `expression`
    pub fn parse(expression: &str) -> Result<Self> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() < MIN_FIELDS || fields.len() > MAX_FIELDS {
            return Err(Error::invalid_schedule(
                expression,
                format!(
                    "expected {} or {} fields, found {}",
                    MIN_FIELDS,
                    MAX_FIELDS,
                    fields.len()
                ),
            ));
        }

        let parse = |raw: &str, spec: &FieldSpec| {
            parse_field(raw, spec).map_err(|reason| Error::invalid_schedule(expression, reason))
        };

        let seconds = parse(fields[0], &SECONDS)?;
        let minutes = parse(fields[1], &MINUTES)?;
        let hours = parse(fields[2], &HOURS)?;
        let dom = parse(fields[3], &DAY_OF_MONTH)?;
        let months = parse(fields[4], &MONTH)?;
        let dow = parse(fields[5], &DAY_OF_WEEK)?;

        match (fields[3] == "?", fields[5] == "?") {
            (true, false) | (false, true) => {}
            (true, true) => {
                return Err(Error::invalid_schedule(
                    expression,
                    "'?' can only be used in one of day-of-month and day-of-week",
                ))
            }
            (false, false) => {
                return Err(Error::invalid_schedule(
                    expression,
                    "one of day-of-month and day-of-week must be '?'",
                ))
            }
        }

        let years = match fields.get(6) {
            Some(raw) => {
                let field = parse(raw, &YEAR)?;
                field
                    .restricted
                    .then(|| field.values.iter().map(|&y| y as i32).collect())
            }
            None => None,
        };

        Ok(Self {
            expression: fields.join(" "),
            seconds: seconds.mask(),
            minutes: minutes.mask(),
            hours: hours.mask(),
            days_of_month: dom.mask(),
            months: months.mask(),
            days_of_week: dow.mask(),
            years,
        })
    }

    /// Normalised expression text
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First firing strictly after `after`, in the same time zone.
    ///
    /// Wall-clock times skipped by a DST change never fire; a repeated
    /// wall-clock time fires once, at its first occurrence after `after`.
    /// Returns `None` when nothing matches within the search horizon.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = after.timezone();
        let base = after.naive_local().with_nanosecond(0)?;
        let horizon = match &self.years {
            Some(years) => *years.last()?,
            None => base.year() + MAX_SEARCH_YEARS,
        };

        let mut t = base.checked_add_signed(chrono::Duration::seconds(1))?;

        loop {
            if t.year() > horizon {
                return None;
            }

            if !self.year_matches(t.year()) {
                t = self.next_year_start(t.year())?;
                continue;
            }

            if !has_bit(self.months, t.month()) {
                t = first_of_next_month(t.date())?;
                continue;
            }

            if !self.day_matches(t.date()) {
                t = start_of_day(t.date().succ_opt()?)?;
                continue;
            }

            if !has_bit(self.hours, t.hour()) {
                t = match next_bit(self.hours, t.hour()) {
                    Some(hour) => t.date().and_hms_opt(hour, 0, 0)?,
                    None => start_of_day(t.date().succ_opt()?)?,
                };
                continue;
            }

            if !has_bit(self.minutes, t.minute()) {
                t = match next_bit(self.minutes, t.minute()) {
                    Some(minute) => t.date().and_hms_opt(t.hour(), minute, 0)?,
                    None => t
                        .date()
                        .and_hms_opt(t.hour(), 0, 0)?
                        .checked_add_signed(chrono::Duration::hours(1))?,
                };
                continue;
            }

            if !has_bit(self.seconds, t.second()) {
                t = match next_bit(self.seconds, t.second()) {
                    Some(second) => t.with_second(second)?,
                    None => t
                        .with_second(0)?
                        .checked_add_signed(chrono::Duration::minutes(1))?,
                };
                continue;
            }

            match tz.from_local_datetime(&t) {
                LocalResult::Single(dt) if dt > *after => return Some(dt),
                LocalResult::Ambiguous(earlier, later) => {
                    if earlier > *after {
                        return Some(earlier);
                    }
                    if later > *after {
                        return Some(later);
                    }
                }
                _ => {}
            }

            t = t.checked_add_signed(chrono::Duration::seconds(1))?;
        }
    }

    fn year_matches(&self, year: i32) -> bool {
        self.years
            .as_ref()
            .map_or(true, |years| years.binary_search(&year).is_ok())
    }

    fn next_year_start(&self, year: i32) -> Option<NaiveDateTime> {
        let next = match &self.years {
            Some(years) => *years.iter().find(|&&y| y > year)?,
            None => year + 1,
        };
        start_of_day(NaiveDate::from_ymd_opt(next, 1, 1)?)
    }

    /// The `?` side holds every value, so both masks must match
    fn day_matches(&self, date: NaiveDate) -> bool {
        has_bit(self.days_of_month, date.day())
            && has_bit(self.days_of_week, date.weekday().number_from_sunday())
    }
}

impl std::str::FromStr for CronSchedule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.expression)
    }
}

// =============================================================================
// Field Parsing
// =============================================================================

fn parse_field(raw: &str, spec: &FieldSpec) -> std::result::Result<Field, String> {
    if raw == "?" {
        if !spec.allows_question {
            return Err(format!("'?' is not allowed in the {} field", spec.name));
        }
        return Ok(Field {
            values: (spec.min..=spec.max).collect(),
            restricted: false,
        });
    }

    let mut values = Vec::new();
    for part in raw.split(',') {
        if part.is_empty() {
            return Err(format!("empty list entry in the {} field", spec.name));
        }
        check_unsupported(part, spec)?;

        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("invalid step '{}' in the {} field", step, spec.name))?;
                if step == 0 {
                    return Err(format!("step must be positive in the {} field", spec.name));
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (lo, hi) = if range == "*" {
            (spec.min, spec.max)
        } else if let Some((lo, hi)) = range.split_once('-') {
            (parse_value(lo, spec)?, parse_value(hi, spec)?)
        } else {
            let value = parse_value(range, spec)?;
            if step.is_some() {
                (value, spec.max)
            } else {
                (value, value)
            }
        };

        if lo > hi {
            return Err(format!(
                "range {}-{} is reversed in the {} field",
                lo, hi, spec.name
            ));
        }

        values.extend((lo..=hi).step_by(step.unwrap_or(1) as usize));
    }

    values.sort_unstable();
    values.dedup();

    Ok(Field {
        values,
        restricted: raw != "*",
    })
}

fn check_unsupported(part: &str, spec: &FieldSpec) -> std::result::Result<(), String> {
    let upper = part.to_ascii_uppercase();
    let numeric_suffixed = upper.len() > 1
        && upper.starts_with(|c: char| c.is_ascii_digit())
        && upper.ends_with(['L', 'W']);

    if upper.contains('#') || upper == "L" || upper == "LW" || numeric_suffixed {
        return Err(format!(
            "'{}' uses an unsupported special character in the {} field",
            part, spec.name
        ));
    }
    Ok(())
}

fn parse_value(token: &str, spec: &FieldSpec) -> std::result::Result<u32, String> {
    let value = if token.chars().all(|c| c.is_ascii_digit()) && !token.is_empty() {
        token
            .parse::<u32>()
            .map_err(|_| format!("invalid value '{}' in the {} field", token, spec.name))?
    } else {
        spec.names
            .iter()
            .position(|name| name.eq_ignore_ascii_case(token))
            .map(|index| index as u32 + spec.min)
            .ok_or_else(|| format!("invalid value '{}' in the {} field", token, spec.name))?
    };

    if value < spec.min || value > spec.max {
        return Err(format!(
            "value {} is outside {}-{} in the {} field",
            value, spec.min, spec.max, spec.name
        ));
    }
    Ok(value)
}

// =============================================================================
// Calendar Helpers
// =============================================================================

fn has_bit(mask: u64, value: u32) -> bool {
    mask & (1u64 << value) != 0
}

/// Smallest set bit strictly above `value`
fn next_bit(mask: u64, value: u32) -> Option<u32> {
    let from = value + 1;
    if from >= 64 {
        return None;
    }
    let shifted = mask >> from;
    (shifted != 0).then(|| from + shifted.trailing_zeros())
}

fn start_of_day(date: NaiveDate) -> Option<NaiveDateTime> {
    date.and_hms_opt(0, 0, 0)
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDateTime> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    start_of_day(NaiveDate::from_ymd_opt(year, month, 1)?)
}

// =============================================================================
// Tests
// =============================================================================
