use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::ops::{Add, Sub};

/// Seconds since local midnight of the service day. Values past 24h are valid
/// (trips running after midnight).
#[derive(PartialOrd, PartialEq, Copy, Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Time(pub f64);

impl Ord for Time {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Eq for Time {}

impl Time {
    pub fn from_hms(hours: u32, minutes: u32, seconds: u32) -> Self {
        Time((hours * 3600 + minutes * 60 + seconds) as f64)
    }

    pub fn as_u32(&self) -> u32 {
        self.0.max(0.0) as u32
    }

    pub fn clock(&self) -> ClockFormatter {
        ClockFormatter { secs: *self }
    }
}

impl Sub for Time {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Time(self.0 - rhs.0)
    }
}

impl Add<f64> for Time {
    type Output = Self;

    fn add(self, rhs: f64) -> Self::Output {
        Time(self.0 + rhs)
    }
}

/// `5:40 PM` style wall clock.
pub struct ClockFormatter {
    secs: Time,
}

impl Display for ClockFormatter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let secs = self.secs.as_u32() % 86_400;
        match NaiveTime::from_num_seconds_from_midnight_opt(secs, 0) {
            Some(t) => write!(f, "{}", t.format("%-I:%M %p")),
            None => write!(f, "--:--"),
        }
    }
}

/// `1 hr 5 min`, `12 min`, `40 sec`.
pub struct DurationFormatter(pub f64);

impl Display for DurationFormatter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let total = self.0.max(0.0).round() as u64;
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;

        if hours > 0 {
            write!(f, "{hours} hr {minutes} min")
        } else if minutes > 0 {
            write!(f, "{minutes} min")
        } else {
            write!(f, "{total} sec")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock() {
        assert_eq!(Time::from_hms(17, 40, 0).clock().to_string(), "5:40 PM");
        assert_eq!(Time::from_hms(9, 5, 59).clock().to_string(), "9:05 AM");
        // past midnight on the same service day
        assert_eq!(Time::from_hms(25, 10, 0).clock().to_string(), "1:10 AM");
    }

    #[test]
    fn durations() {
        assert_eq!(DurationFormatter(40.0).to_string(), "40 sec");
        assert_eq!(DurationFormatter(540.0).to_string(), "9 min");
        assert_eq!(DurationFormatter(3900.0).to_string(), "1 hr 5 min");
    }

    #[test]
    fn ordering() {
        let mut times = vec![Time(30.0), Time(-1.0), Time(5.5)];
        times.sort();
        assert_eq!(times, vec![Time(-1.0), Time(5.5), Time(30.0)]);
    }
}
