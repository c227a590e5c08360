//! Human-readable relative timestamps, e.g. "5 minutes ago" or "tomorrow".

use chrono::{DateTime, Utc};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Unit {
    /// Pick the largest unit whose threshold the absolute difference stays below.
    fn for_seconds(abs_seconds: u64) -> (Self, i64) {
        const UNITS: [(i64, Unit, i64); 6] = [
            (MINUTE, Unit::Second, 1),
            (HOUR, Unit::Minute, MINUTE),
            (DAY, Unit::Hour, HOUR),
            (WEEK, Unit::Day, DAY),
            (MONTH, Unit::Week, WEEK),
            (YEAR, Unit::Month, MONTH),
        ];

        UNITS
            .iter()
            .find(|(threshold, _, _)| abs_seconds < threshold.unsigned_abs())
            .map_or((Self::Year, YEAR), |&(_, unit, divisor)| (unit, divisor))
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// Phrases English uses instead of a number for -1, 0 and 1.
    fn idiom(self, value: i64) -> Option<String> {
        let idiom = match (self, value) {
            (Self::Second, 0) => "now".to_owned(),
            (Self::Day, -1) => "yesterday".to_owned(),
            (Self::Day, 0) => "today".to_owned(),
            (Self::Day, 1) => "tomorrow".to_owned(),
            (Self::Week | Self::Month | Self::Year, -1) => format!("last {}", self.name()),
            (Self::Week | Self::Month | Self::Year, 1) => format!("next {}", self.name()),
            (_, 0) => format!("this {}", self.name()),
            _ => return None,
        };
        Some(idiom)
    }
}

/// Describe `then` relative to `now` in English.
///
/// The difference is truncated to whole seconds (towards the past), expressed in the
/// largest fitting unit (a month counts as 30 days, a year as 365) and rounded to the
/// nearest integer with halves rounded up. Where English has a word for the result it
/// is used instead of a number: "now", "yesterday", "next week", "last year".
///
/// ```
/// use chrono::{Duration, Utc};
/// use docstream::time::format_relative_time;
///
/// let now = Utc::now();
/// assert_eq!(format_relative_time(now - Duration::minutes(5), now), "5 minutes ago");
/// assert_eq!(format_relative_time(now + Duration::days(1), now), "tomorrow");
/// ```
#[must_use]
pub fn format_relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff_seconds = (then - now).num_milliseconds().div_euclid(1000);
    let (unit, divisor) = Unit::for_seconds(diff_seconds.unsigned_abs());
    let value = round_half_up(diff_seconds, divisor);

    if let Some(idiom) = unit.idiom(value) {
        return idiom;
    }

    let magnitude = value.unsigned_abs();
    let plural = if magnitude == 1 { "" } else { "s" };
    if value < 0 {
        format!("{magnitude} {}{plural} ago", unit.name())
    } else {
        format!("in {magnitude} {}{plural}", unit.name())
    }
}

/// `round(numerator / denominator)` for a positive denominator, with .5 rounded up.
fn round_half_up(numerator: i64, denominator: i64) -> i64 {
    numerator
        .saturating_mul(2)
        .saturating_add(denominator)
        .div_euclid(denominator.saturating_mul(2))
}
