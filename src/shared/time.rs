use std::{
    fmt::Display,
    ops::{Add, AddAssign, Sub},
};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

const HOUR_TO_SEC: u32 = 60 * 60;
const MINUTE_TO_SEC: u32 = 60;

/// Time of day as seconds past the service day's midnight.
///
/// Schedules express trips that run past midnight with offsets beyond
/// `24:00:00`, so a `Time` is not bounded to a single day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(u32);

impl From<u32> for Time {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Saturates at zero when `rhs` is later than `self`.
impl Sub<Time> for Time {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        Duration(self.0.saturating_sub(rhs.0))
    }
}

impl Add<Duration> for Time {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign<Duration> for Time {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs.0
    }
}

impl Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hms_string())
    }
}

impl Time {
    pub const fn from_seconds(secs: u32) -> Self {
        Self(secs)
    }

    pub const fn from_hms_parts(hours: u32, minutes: u32, seconds: u32) -> Self {
        Self(hours * HOUR_TO_SEC + minutes * MINUTE_TO_SEC + seconds)
    }

    pub const fn as_seconds(&self) -> u32 {
        self.0
    }

    pub fn to_hms_string(&self) -> String {
        hms(self.0)
    }

    /// Parses `H:MM:SS` or `HH:MM:SS`. Hours may exceed 23.
    pub fn from_hms(time: &str) -> Option<Self> {
        let mut split = time.trim().split(':');
        let hours: u32 = split.next()?.parse().ok()?;
        let minutes: u32 = split.next()?.parse().ok()?;
        let seconds: u32 = split.next()?.parse().ok()?;
        if split.next().is_some() || minutes > 59 || seconds > 59 {
            return None;
        }
        hours
            .checked_mul(HOUR_TO_SEC)?
            .checked_add(minutes * MINUTE_TO_SEC + seconds)
            .map(Self)
    }

    /// The absolute timestamp of this offset on the given service date.
    pub fn on(&self, date: NaiveDate) -> NaiveDateTime {
        midnight(date) + TimeDelta::seconds(self.0 as i64)
    }
}

/// Seconds elapsed between the midnight of `date` and `timestamp`.
/// Negative when the timestamp lies before that date.
pub fn seconds_since_midnight(date: NaiveDate, timestamp: NaiveDateTime) -> i64 {
    (timestamp - midnight(date)).num_seconds()
}

pub fn midnight(date: NaiveDate) -> NaiveDateTime {
    NaiveDateTime::new(date, NaiveTime::MIN)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration(u32);

impl From<u32> for Duration {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl Display for Duration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hms(self.0))
    }
}

impl Duration {
    pub const fn from_seconds(secs: u32) -> Self {
        Self(secs)
    }

    pub const fn from_minutes(minutes: u32) -> Self {
        Self(minutes * MINUTE_TO_SEC)
    }

    pub const fn from_hours(hours: u32) -> Self {
        Self(hours * HOUR_TO_SEC)
    }

    pub const fn as_seconds(&self) -> u32 {
        self.0
    }

    pub fn to_time_delta(&self) -> TimeDelta {
        TimeDelta::seconds(self.0 as i64)
    }
}

impl Add for Duration {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0
    }
}

fn hms(secs: u32) -> String {
    let h = secs / HOUR_TO_SEC;
    let m = (secs % HOUR_TO_SEC) / MINUTE_TO_SEC;
    let s = secs % MINUTE_TO_SEC;
    format!("{:02}:{:02}:{:02}", h, m, s)
}

#[test]
fn parse_unparse_1() {
    let time = "00:00:00";
    let stime = Time::from_hms(time).unwrap();
    assert_eq!(time, stime.to_hms_string())
}

#[test]
fn parse_unparse_2() {
    let time = "12:30:30";
    let stime = Time::from_hms(time).unwrap();
    assert_eq!(time, stime.to_hms_string())
}

#[test]
fn parse_past_midnight() {
    let time = "25:10:00";
    let stime = Time::from_hms(time).unwrap();
    assert_eq!(stime.as_seconds(), 25 * 3600 + 600);
    assert_eq!(time, stime.to_hms_string())
}

#[test]
fn parse_single_digit_hour() {
    let stime = Time::from_hms("7:05:00").unwrap();
    assert_eq!(stime, Time::from_hms_parts(7, 5, 0));
}

#[test]
fn time_on_date_rolls_over() {
    let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let timestamp = Time::from_hms_parts(24, 20, 0).on(date);
    let expected = NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 20, 0)
        .unwrap();
    assert_eq!(timestamp, expected);
    assert_eq!(seconds_since_midnight(date, timestamp), 24 * 3600 + 1200);
}

#[test]
fn reject_overflowing_hours() {
    assert!(Time::from_hms("4000000:00:00").is_none());
    assert!(Time::from_hms("1193046:28:15").is_some());
    assert!(Time::from_hms("1193046:28:16").is_none());
}

#[test]
fn sub_saturates() {
    let early = Time::from_hms_parts(8, 0, 0);
    let late = Time::from_hms_parts(9, 0, 0);
    assert_eq!(late - early, Duration::from_hours(1));
    assert_eq!(early - late, Duration::from_seconds(0));
}
