/*!
# Time

Model time advances in discrete ticks. A tick may additionally carry a
calendar duration, so that the model knows which date each tick stands for.
The time driver is configured from the `time` section of the settings:

| key | meaning |
|-----|---------|
| `start` | start date, `"2000"`, `"2000-01"`, `"2000-01-01"` or with a time of day |
| `end` | either an end date, or an integer number of ticks |
| `years`, `months`, `days`, `hours`, `minutes`, `seconds` | the duration of one tick |
| `irregular` | allow each call to `go_by` to use its own duration |

Without a duration, the driver only counts ticks. Without a start date, the
calendar starts at the current time.
 */

use crate::error::{AbsesError, Result};
use crate::settings::Params;
use chrono::{Datelike, Local, Months, NaiveDate, NaiveDateTime, Timelike};
use serde_derive::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::cmp::Ordering;
use std::fmt;
use tracing::{debug, warn};

const DURATION_KEYS: [&str; 6] = ["years", "months", "days", "hours", "minutes", "seconds"];

/**
Parse the date formats accepted in settings.

```rust
# use abses::time::parse_datetime;
let dt = parse_datetime("2000-07").unwrap();
assert_eq!(dt.to_string(), "2000-07-01 00:00:00");
assert!(parse_datetime("invalid").is_err());
```
 */
pub fn parse_datetime(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    // Partial dates are padded to the first day of the period.
    let candidates = [s.to_string(), format!("{}-01", s), format!("{}-01-01", s)];
    for candidate in candidates.iter() {
        if let Ok(date) = NaiveDate::parse_from_str(candidate, "%Y-%m-%d") {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return Ok(dt);
            }
        }
    }
    Err(AbsesError::Time(format!("Unparsable datetime '{}'.", s)))
}

/// The calendar length of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duration {
    pub years: u32,
    pub months: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl Duration {
    pub fn years(n: u32) -> Duration {
        Duration {
            years: n,
            ..Default::default()
        }
    }

    pub fn months(n: u32) -> Duration {
        Duration {
            months: n,
            ..Default::default()
        }
    }

    pub fn days(n: u32) -> Duration {
        Duration {
            days: n,
            ..Default::default()
        }
    }

    pub fn hours(n: u32) -> Duration {
        Duration {
            hours: n,
            ..Default::default()
        }
    }

    pub fn minutes(n: u32) -> Duration {
        Duration {
            minutes: n,
            ..Default::default()
        }
    }

    pub fn seconds(n: u32) -> Duration {
        Duration {
            seconds: n,
            ..Default::default()
        }
    }

    pub fn is_zero(&self) -> bool {
        self.total_months() == 0 && self.fixed_part().is_zero()
    }

    fn total_months(&self) -> u32 {
        self.years * 12 + self.months
    }

    /// The part of the duration that has a fixed length in seconds.
    fn fixed_part(&self) -> chrono::Duration {
        chrono::Duration::days(self.days as i64)
            + chrono::Duration::hours(self.hours as i64)
            + chrono::Duration::minutes(self.minutes as i64)
            + chrono::Duration::seconds(self.seconds as i64)
    }

    /// Add this duration to `dt`, calendar months first.
    pub fn add_to(&self, dt: NaiveDateTime) -> Result<NaiveDateTime> {
        let overflow = || AbsesError::Time(format!("Adding {:?} to {} overflows.", self, dt));
        let shifted = match self.total_months() {
            0 => dt,
            m => dt.checked_add_months(Months::new(m)).ok_or_else(overflow)?,
        };
        shifted.checked_add_signed(self.fixed_part()).ok_or_else(overflow)
    }

    /// Read the duration keys of a `time` section. `None` if no key is set
    /// or all are zero.
    pub fn from_params(params: &Params) -> Result<Option<Duration>> {
        let mut d = Duration::default();
        for key in DURATION_KEYS {
            let v = match params.get(key) {
                None => continue,
                Some(v) => v,
            };
            let n = v.as_i64().ok_or_else(|| {
                AbsesError::Type(format!("Duration '{}' must be an integer, got {}.", key, v))
            })?;
            if n < 0 {
                return Err(AbsesError::Time(format!(
                    "Duration '{}' must be non-negative, got {}.",
                    key, n
                )));
            }
            let n = u32::try_from(n)
                .map_err(|_| AbsesError::Time(format!("Duration '{}' is too large: {}.", key, n)))?;
            match key {
                "years" => d.years = n,
                "months" => d.months = n,
                "days" => d.days = n,
                "hours" => d.hours = n,
                "minutes" => d.minutes = n,
                _ => d.seconds = n,
            }
        }
        Ok(if d.is_zero() { None } else { Some(d) })
    }
}

/// When a run should stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum End {
    Tick(u64),
    Date(NaiveDateTime),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeDriver {
    tick: u64,
    dt: NaiveDateTime,
    start: NaiveDateTime,
    end: Option<End>,
    duration: Option<Duration>,
    irregular: bool,
    history: Vec<NaiveDateTime>,
}

impl Default for TimeDriver {
    fn default() -> Self {
        let now = Local::now().naive_local();
        TimeDriver {
            tick: 0,
            dt: now,
            start: now,
            end: None,
            duration: None,
            irregular: false,
            history: vec![now],
        }
    }
}

impl TimeDriver {
    pub fn from_params(params: &Params) -> Result<TimeDriver> {
        let start = match params.get("start") {
            None | Some(Json::Null) => {
                warn!("Start time is not set, using the current time.");
                Local::now().naive_local()
            }
            Some(Json::String(s)) => parse_datetime(s)?,
            Some(other) => {
                return Err(AbsesError::Type(format!(
                    "Start time must be a string, got {}.",
                    other
                )))
            }
        };
        let end = match params.get("end") {
            None | Some(Json::Null) => None,
            Some(Json::String(s)) => Some(End::Date(parse_datetime(s)?)),
            Some(Json::Number(n)) => match n.as_u64() {
                Some(t) => Some(End::Tick(t)),
                None => {
                    return Err(AbsesError::Time(format!(
                        "End tick must be a non-negative integer, got {}.",
                        n
                    )))
                }
            },
            Some(other) => {
                return Err(AbsesError::Type(format!(
                    "End must be a date string or a tick count, got {}.",
                    other
                )))
            }
        };
        let duration = Duration::from_params(params)?;
        let irregular = params.get_bool("irregular")?.unwrap_or(false);
        Ok(TimeDriver {
            tick: 0,
            dt: start,
            start,
            end,
            duration,
            irregular,
            history: vec![start],
        })
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// The current date and time.
    pub fn dt(&self) -> NaiveDateTime {
        self.dt
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> Option<End> {
        self.end
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn irregular(&self) -> bool {
        self.irregular
    }

    pub fn history(&self) -> &[NaiveDateTime] {
        &self.history
    }

    /// Advance by `ticks` ticks of the configured duration.
    pub fn go(&mut self, ticks: u64) -> Result<()> {
        for _ in 0..ticks {
            self.advance(self.duration)?;
        }
        Ok(())
    }

    /// Advance by `ticks` ticks of a custom duration. Only allowed in
    /// irregular mode.
    pub fn go_by(&mut self, ticks: u64, duration: Duration) -> Result<()> {
        if !self.irregular {
            return Err(AbsesError::Time(
                "Cannot go by a custom duration in regular mode, set 'irregular' to true."
                    .to_string(),
            ));
        }
        for _ in 0..ticks {
            self.advance(Some(duration))?;
        }
        Ok(())
    }

    fn advance(&mut self, duration: Option<Duration>) -> Result<()> {
        if let Some(d) = duration {
            self.dt = d.add_to(self.dt)?;
        }
        self.tick += 1;
        self.history.push(self.dt);
        debug!(tick = self.tick, dt = %self.dt, "time goes");
        Ok(())
    }

    /// Jump to a date. The history restarts there, the tick count is kept.
    pub fn to(&mut self, target: &str) -> Result<()> {
        self.to_datetime(parse_datetime(target)?);
        Ok(())
    }

    pub fn to_datetime(&mut self, dt: NaiveDateTime) {
        self.dt = dt;
        self.history = vec![dt];
    }

    pub fn reached_end(&self) -> bool {
        match self.end {
            None => false,
            Some(End::Tick(n)) => self.tick >= n,
            Some(End::Date(end)) => self.dt >= end,
        }
    }

    /**
    How many ticks are left until the end is reached.

    ```rust
    # use abses::settings::Settings;
    # use abses::time::TimeDriver;
    let settings = Settings::from(serde_json::json!({
        "time": {"start": "2000", "end": "2020", "years": 1}
    }));
    let mut time = TimeDriver::from_params(&settings.params("time")).unwrap();
    assert_eq!(time.expected_ticks(), Some(20));
    time.to("2019").unwrap();
    assert_eq!(time.expected_ticks(), Some(1));
    ```
     */
    pub fn expected_ticks(&self) -> Option<u64> {
        match (self.end, self.duration) {
            (Some(End::Tick(n)), _) => Some(n.saturating_sub(self.tick)),
            (Some(End::Date(end)), Some(d)) => {
                if self.dt >= end {
                    return Some(0);
                }
                if d.total_months() == 0 {
                    let step = d.fixed_part().num_seconds();
                    let span = (end - self.dt).num_seconds();
                    return Some(((span + step - 1) / step) as u64);
                }
                let mut n = 0;
                let mut cur = self.dt;
                while cur < end {
                    cur = d.add_to(cur).ok()?;
                    n += 1;
                }
                Some(n)
            }
            _ => None,
        }
    }

    pub fn year(&self) -> i32 {
        self.dt.year()
    }

    pub fn month(&self) -> u32 {
        self.dt.month()
    }

    pub fn day(&self) -> u32 {
        self.dt.day()
    }

    pub fn hour(&self) -> u32 {
        self.dt.hour()
    }

    pub fn minute(&self) -> u32 {
        self.dt.minute()
    }

    pub fn second(&self) -> u32 {
        self.dt.second()
    }

    /// Monday is 0.
    pub fn weekday(&self) -> u32 {
        self.dt.weekday().num_days_from_monday()
    }

    pub fn day_of_year(&self) -> u32 {
        self.dt.ordinal()
    }

    pub fn quarter(&self) -> u32 {
        (self.dt.month() - 1) / 3 + 1
    }

    pub fn is_leap_year(&self) -> bool {
        NaiveDate::from_ymd_opt(self.dt.year(), 2, 29).is_some()
    }

    pub fn strftime(&self, fmt: &str) -> String {
        self.dt.format(fmt).to_string()
    }
}

impl fmt::Display for TimeDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.duration {
            Some(_) => write!(f, "{}", self.dt.format("%Y-%m-%d %H:%M:%S")),
            None => write!(f, "tick {}", self.tick),
        }
    }
}

impl PartialEq<NaiveDateTime> for TimeDriver {
    fn eq(&self, other: &NaiveDateTime) -> bool {
        self.dt == *other
    }
}

impl PartialOrd<NaiveDateTime> for TimeDriver {
    fn partial_cmp(&self, other: &NaiveDateTime) -> Option<Ordering> {
        self.dt.partial_cmp(other)
    }
}

/// Calendar fields a tick has to match. Unset fields match anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeCondition {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub weekday: Option<u32>,
    pub hour: Option<u32>,
}

impl TimeCondition {
    pub fn satisfied(&self, time: &TimeDriver) -> bool {
        self.year.map_or(true, |y| y == time.year())
            && self.month.map_or(true, |m| m == time.month())
            && self.day.map_or(true, |d| d == time.day())
            && self.weekday.map_or(true, |w| w == time.weekday())
            && self.hour.map_or(true, |h| h == time.hour())
    }
}

/**
Run `f` only when the condition's satisfaction equals `when_run`.

```rust
# use abses::time::{time_condition, TimeCondition, TimeDriver};
# use abses::settings::Settings;
let settings = Settings::from(serde_json::json!({"time": {"start": "2023-09"}}));
let time = TimeDriver::from_params(&settings.params("time")).unwrap();
let september = TimeCondition { month: Some(9), ..Default::default() };
assert_eq!(time_condition(&september, true, &time, || "harvest"), Some("harvest"));
assert_eq!(time_condition(&september, false, &time, || "harvest"), None);
```
 */
pub fn time_condition<R, F: FnOnce() -> R>(
    condition: &TimeCondition,
    when_run: bool,
    time: &TimeDriver,
    f: F,
) -> Option<R> {
    if condition.satisfied(time) == when_run {
        Some(f())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use serde_json::json;

    fn driver(params: serde_json::Value) -> Result<TimeDriver> {
        TimeDriver::from_params(&Settings::from(json!({ "time": params })).params("time"))
    }

    #[test]
    fn test_default_initialization() {
        let time = driver(json!({})).unwrap();
        let now = Local::now().naive_local();
        assert_eq!(time.dt().year(), now.year());
        assert_eq!(time.tick(), 0);
        assert_eq!(time.duration(), None);
        assert_eq!(time.history().len(), 1);
    }

    #[test]
    fn test_start_time_formats() {
        for start in ["2000", "2000-01", "2000-01-01", "2000-01-01 00:00:00"] {
            assert_eq!(driver(json!({ "start": start })).unwrap().year(), 2000);
        }
        assert!(matches!(driver(json!({"start": "invalid"})), Err(AbsesError::Time(_))));
        assert!(matches!(driver(json!({"start": 123})), Err(AbsesError::Type(_))));
    }

    #[test]
    fn test_year_durations() {
        for years in [1, 5, 10] {
            let mut time = driver(json!({"start": "2000", "years": years})).unwrap();
            time.go(1).unwrap();
            assert_eq!(time.year(), 2000 + years);
            assert_eq!(time.history().len(), 2);
        }
    }

    #[test]
    fn test_negative_duration_is_rejected() {
        assert!(driver(json!({"years": -1})).is_err());
        assert!(driver(json!({"months": -1})).is_err());
    }

    #[test]
    fn test_progression_to_end() {
        let mut time = driver(json!({"start": "2000", "end": "2020", "years": 1})).unwrap();
        time.go(1).unwrap();
        assert_eq!((time.year(), time.tick()), (2001, 1));
        time.go(18).unwrap();
        assert_eq!(time.year(), 2019);
        assert!(!time.reached_end());
        time.go(1).unwrap();
        assert_eq!(time.year(), 2020);
        assert!(time.reached_end());
    }

    #[test]
    fn test_tick_end() {
        let mut time = driver(json!({"end": 3})).unwrap();
        assert_eq!(time.expected_ticks(), Some(3));
        time.go(3).unwrap();
        assert!(time.reached_end());
        assert_eq!(time.expected_ticks(), Some(0));
    }

    #[test]
    fn test_time_to_resets_history() {
        for (target, year) in [("2010", 2010), ("2020", 2020), ("1900", 1900)] {
            let mut time = driver(json!({"start": "2000", "years": 1})).unwrap();
            time.go(2).unwrap();
            time.to(target).unwrap();
            assert_eq!(time.year(), year);
            assert_eq!(time.history().len(), 1);
            assert_eq!(time.tick(), 2);
        }
        let mut time = driver(json!({"start": "2000"})).unwrap();
        assert!(time.to("invalid").is_err());
    }

    #[test]
    fn test_comparison_with_datetimes() {
        let time = driver(json!({"start": "2000"})).unwrap();
        assert!(time > parse_datetime("1999").unwrap());
        assert!(!(time > parse_datetime("2000").unwrap()));
        assert!(time == parse_datetime("2000").unwrap());
        assert!(time < parse_datetime("2001").unwrap());
    }

    #[test]
    fn test_irregular_progression() {
        let cases = [
            (Duration::years(1), "2001"),
            (Duration::months(6), "2000-07-01"),
            (Duration::days(15), "2000-01-16"),
            (Duration::hours(12), "2000-01-01 12:00:00"),
        ];
        for (duration, expected) in cases {
            let mut time = driver(json!({"irregular": true, "start": "2000"})).unwrap();
            time.go_by(1, duration).unwrap();
            assert_eq!(time.dt(), parse_datetime(expected).unwrap());
        }
    }

    #[test]
    fn test_regular_mode_refuses_custom_durations() {
        let mut time = driver(json!({"start": "2000", "years": 1})).unwrap();
        assert!(time.go_by(1, Duration::days(1)).is_err());
    }

    #[test]
    fn test_calendar_getters() {
        let time = driver(json!({"start": "2024-02-29 13:45:10"})).unwrap();
        assert_eq!((time.month(), time.day(), time.hour()), (2, 29, 13));
        assert_eq!((time.minute(), time.second()), (45, 10));
        assert_eq!(time.quarter(), 1);
        assert!(time.is_leap_year());
        assert_eq!(time.day_of_year(), 60);
        assert_eq!(time.weekday(), 3);
        assert_eq!(time.strftime("%Y/%m"), "2024/02");
    }

    #[test]
    fn test_month_arithmetic_clamps_to_month_end() {
        let mut time = driver(json!({"start": "2000-01-31", "months": 1})).unwrap();
        time.go(1).unwrap();
        assert_eq!(time.dt(), parse_datetime("2000-02-29").unwrap());
    }
}
