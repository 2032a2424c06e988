//! Time expressions and recurrence intervals
//!
//! Resolves phrases such as "tomorrow at 3pm", "in 10 minutes" or
//! "next friday" to a concrete instant. Nothing here waits; callers get the
//! instant and decide what to do with it.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveTime, TimeZone, Utc,
    Weekday,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

const WEEKDAYS: &str = "monday|tuesday|wednesday|thursday|friday|saturday|sunday";
const UNITS: &str = r"seconds?|secs?|minutes?|mins?|hours?|hrs?|days?|weeks?|months?";

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant, for deterministic scheduling.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl IntervalUnit {
    fn from_word(word: &str) -> Option<Self> {
        match word.trim_end_matches('s') {
            "minute" | "min" => Some(Self::Minute),
            "hour" | "hr" => Some(Self::Hour),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            _ => None,
        }
    }
}

/// A recurrence period such as "every 2 hours"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub every: u32,
    pub unit: IntervalUnit,
}

impl Interval {
    /// Period length. A month counts as 30 days.
    pub fn period(&self) -> Duration {
        let n = i64::from(self.every);
        match self.unit {
            IntervalUnit::Minute => Duration::minutes(n),
            IntervalUnit::Hour => Duration::hours(n),
            IntervalUnit::Day => Duration::days(n),
            IntervalUnit::Week => Duration::weeks(n),
            IntervalUnit::Month => Duration::days(30 * n),
        }
    }

    pub fn period_seconds(&self) -> i64 {
        self.period().num_seconds()
    }
}

/// Resolves time expressions relative to a supplied "now".
pub struct TimeParser {
    offset: FixedOffset,
    default_hour: u32,
    hint: Regex,
    relative: Regex,
    time_of_day: Regex,
    interval_head: Regex,
}

impl TimeParser {
    /// `utc_offset_minutes` is the user's wall-clock offset; `default_hour`
    /// is used when only a date is given ("tomorrow").
    pub fn new(utc_offset_minutes: i32, default_hour: u32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
        Self {
            offset,
            default_hour: default_hour.min(23),
            hint: Regex::new(&format!(
                r"\b(?:\d{{1,2}}(?::\d{{2}})?\s*(?:am|pm)|\d{{1,2}}:\d{{2}}|noon|midnight|today|tonight|tomorrow|next\s+(?:week|month|{w})|{w}|\d{{4}}-\d{{2}}-\d{{2}}|in\s+(?:\d+|an?|one)\s+(?:{u}))\b",
                w = WEEKDAYS,
                u = UNITS
            ))
            .expect("Invalid regex pattern"),
            relative: Regex::new(&format!(r"^in\s+(\d+|an?|one)\s+({})$", UNITS))
                .expect("Invalid regex pattern"),
            time_of_day: Regex::new(
                r"(?:\bat\s+)?\b(?:(\d{1,2})(?::(\d{2}))?\s*(am|pm)|(\d{1,2}):(\d{2})|(noon|midnight))\b",
            )
            .expect("Invalid regex pattern"),
            interval_head: Regex::new(&format!(r"^(?:(\d+)\s+)?({})\b\s*(.*)$", UNITS))
                .expect("Invalid regex pattern"),
        }
    }

    /// Whether the text contains anything time-like.
    pub fn looks_like_time(&self, text: &str) -> bool {
        self.hint.is_match(text)
    }

    /// Resolve a time expression to a future instant. Returns `None` for
    /// unrecognized text and for instants not after `now`.
    pub fn resolve(&self, text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let text = text.trim().to_ascii_lowercase();

        if let Some(caps) = self.relative.captures(&text) {
            let count = match &caps[1] {
                "a" | "an" | "one" => 1,
                digits => digits.parse::<i64>().ok()?,
            };
            let delta = match caps[2].trim_end_matches('s') {
                "second" | "sec" => Duration::seconds(count),
                "minute" | "min" => Duration::minutes(count),
                "hour" | "hr" => Duration::hours(count),
                "day" => Duration::days(count),
                "week" => Duration::weeks(count),
                "month" => Duration::days(30 * count),
                _ => return None,
            };
            return (count > 0).then(|| now + delta);
        }

        let local_now = now.with_timezone(&self.offset);
        let today = local_now.date_naive();

        let (time, rest) = match self.time_of_day.captures(&text) {
            Some(caps) => {
                let span = caps.get(0)?;
                let time = parse_time_of_day(&caps)?;
                let rest = format!("{} {}", &text[..span.start()], &text[span.end()..]);
                (Some(time), rest)
            }
            None => (None, text.clone()),
        };

        let rest = rest.split_whitespace().collect::<Vec<_>>().join(" ");
        let rest = rest
            .strip_prefix("on ")
            .or_else(|| rest.strip_prefix("this "))
            .unwrap_or(&rest)
            .to_string();

        let (date, default_time) = match rest.as_str() {
            "" => match time {
                Some(t) => {
                    let candidate = today;
                    if today.and_time(t) <= local_now.naive_local() {
                        (candidate.succ_opt()?, None)
                    } else {
                        (candidate, None)
                    }
                }
                None => return None,
            },
            "today" => (today, None),
            "tonight" => (today, NaiveTime::from_hms_opt(20, 0, 0)),
            "tomorrow" => (today.succ_opt()?, None),
            "next week" => (today + Duration::days(7), Some(local_now.time())),
            "next month" => (today.checked_add_months(Months::new(1))?, Some(local_now.time())),
            other => {
                let other = other.strip_prefix("next ").unwrap_or(other);
                if let Some(weekday) = parse_weekday(other) {
                    (next_weekday(today, weekday), None)
                } else {
                    (NaiveDate::parse_from_str(other, "%Y-%m-%d").ok()?, None)
                }
            }
        };

        let time = time
            .or(default_time)
            .or_else(|| NaiveTime::from_hms_opt(self.default_hour, 0, 0))?;
        let resolved = self
            .offset
            .from_local_datetime(&date.and_time(time))
            .single()?
            .with_timezone(&Utc);

        (resolved > now).then_some(resolved)
    }

    /// Split "2 hours swap ..." into an interval and the remaining text.
    pub fn split_interval<'a>(&self, text: &'a str) -> Option<(Interval, &'a str)> {
        let caps = self.interval_head.captures(text)?;
        let every = match caps.get(1) {
            Some(m) => m.as_str().parse::<u32>().ok()?,
            None => 1,
        };
        let unit = IntervalUnit::from_word(&caps[2])?;
        let rest = caps.get(3).map(|m| m.as_str()).unwrap_or("");
        (every > 0).then_some((Interval { every, unit }, rest))
    }
}

fn parse_time_of_day(caps: &regex::Captures<'_>) -> Option<NaiveTime> {
    if let Some(word) = caps.get(6) {
        return match word.as_str() {
            "noon" => NaiveTime::from_hms_opt(12, 0, 0),
            _ => NaiveTime::from_hms_opt(0, 0, 0),
        };
    }
    if let (Some(hour), Some(minute)) = (caps.get(4), caps.get(5)) {
        let hour: u32 = hour.as_str().parse().ok()?;
        let minute: u32 = minute.as_str().parse().ok()?;
        return NaiveTime::from_hms_opt(hour, minute, 0);
    }
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    if !(1..=12).contains(&hour) {
        return None;
    }
    let hour = match (caps.get(3)?.as_str(), hour) {
        ("am", 12) => 0,
        ("am", h) => h,
        ("pm", 12) => 12,
        (_, h) => h + 12,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn parse_weekday(word: &str) -> Option<Weekday> {
    match word {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

// Next occurrence strictly after `today` (1..=7 days ahead).
fn next_weekday(today: NaiveDate, target: Weekday) -> NaiveDate {
    let current = today.weekday().num_days_from_monday();
    let wanted = target.num_days_from_monday();
    let mut delta = (wanted + 7 - current) % 7;
    if delta == 0 {
        delta = 7;
    }
    today + Duration::days(i64::from(delta))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Monday 2024-06-10 10:00 UTC
    fn monday_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_tomorrow_at_3pm() {
        let parser = TimeParser::new(0, 9);
        let at = parser.resolve("tomorrow at 3pm", monday_morning()).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 6, 11, 15, 0, 0).unwrap());
    }

    #[test]
    fn test_relative_minutes() {
        let parser = TimeParser::new(0, 9);
        let at = parser.resolve("in 10 minutes", monday_morning()).unwrap();
        assert_eq!(at - monday_morning(), Duration::minutes(10));
        assert!(parser.resolve("in 0 minutes", monday_morning()).is_none());
    }

    #[test]
    fn test_time_only_rolls_to_next_day_when_past() {
        let parser = TimeParser::new(0, 9);
        let at = parser.resolve("at 8am", monday_morning()).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 6, 11, 8, 0, 0).unwrap());
        let at = parser.resolve("at 15:30", monday_morning()).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 6, 10, 15, 30, 0).unwrap());
    }

    #[test]
    fn test_weekdays() {
        let parser = TimeParser::new(0, 9);
        let at = parser.resolve("next friday", monday_morning()).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 6, 14, 9, 0, 0).unwrap());
        let at = parser.resolve("on monday at noon", monday_morning()).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 6, 17, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_offset_applies_to_wall_clock() {
        let parser = TimeParser::new(120, 9);
        let at = parser.resolve("tomorrow at 3pm", monday_morning()).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 6, 11, 13, 0, 0).unwrap());
    }

    #[test]
    fn test_absolute_and_past() {
        let parser = TimeParser::new(0, 9);
        assert!(parser.resolve("on 2024-07-01 at 10:00", monday_morning()).is_some());
        assert!(parser.resolve("on 2023-01-01", monday_morning()).is_none());
        assert!(parser.resolve("whenever", monday_morning()).is_none());
    }

    #[test]
    fn test_split_interval() {
        let parser = TimeParser::new(0, 9);
        let (interval, rest) = parser.split_interval("2 hours swap 1 sol for bonk").unwrap();
        assert_eq!(interval.unit, IntervalUnit::Hour);
        assert_eq!(interval.period_seconds(), 7200);
        assert_eq!(rest, "swap 1 sol for bonk");

        let (interval, _) = parser.split_interval("week stake 1 sol").unwrap();
        assert_eq!(interval.period(), Duration::weeks(1));
        assert!(parser.split_interval("fortnight buy bonk").is_none());
        assert!(parser.split_interval("0 days send 1 sol to bob").is_none());
    }

    #[test]
    fn test_looks_like_time() {
        let parser = TimeParser::new(0, 9);
        assert!(parser.looks_like_time("tomorrow at 3pm"));
        assert!(parser.looks_like_time("in 5 minutes"));
        assert!(!parser.looks_like_time("swap 1 sol for bonk"));
    }
}
