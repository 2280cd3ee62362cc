//! Millisecond timestamps from a counter that wraps after about 49.7 days.
//! Durations go through [`diff`], exact below 2^31 ms.

use serde::{Deserialize, Serialize};

use crate::schedule::DayOfWeek;

const HALF_WRAP: u32 = u32::MAX / 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Millis(u32);

impl Millis {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Milliseconds elapsed from `earlier` to `self`.
    pub const fn since(self, earlier: Millis) -> u32 {
        diff(earlier, self)
    }

    pub const fn add(self, ms: u32) -> Self {
        Self(self.0.wrapping_add(ms))
    }

    pub const fn sub(self, ms: u32) -> Self {
        Self(self.0.wrapping_sub(ms))
    }
}

/// `next - prev` with unsigned wraparound.
pub const fn diff(prev: Millis, next: Millis) -> u32 {
    next.0.wrapping_sub(prev.0)
}

/// `next - prev` as a signed value: negative when `next` lies before `prev`.
pub const fn signed_diff(prev: Millis, next: Millis) -> i32 {
    let forward = diff(prev, next);
    if forward > HALF_WRAP {
        // The complement is at most 2^31, whose negation is exactly i32::MIN.
        (diff(next, prev) as i32).wrapping_neg()
    } else {
        forward as i32
    }
}

pub const fn seconds(n: u32) -> u32 {
    n * 1_000
}

pub const fn minutes(n: u32) -> u32 {
    seconds(n * 60)
}

pub const fn hours(n: u32) -> u32 {
    minutes(n * 60)
}

pub const fn days(n: u32) -> u32 {
    hours(n * 24)
}

/// Wall-clock time of day as reported by the real-time clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Date {
    pub hour: u8,
    pub minute: u8,
    pub day: DayOfWeek,
}

impl Date {
    pub fn new(hour: u8, minute: u8, day: DayOfWeek) -> Self {
        Self { hour, minute, day }
    }

    pub fn minutes_of_day(&self) -> u16 {
        u16::from(self.hour) * 60 + u16::from(self.minute)
    }
}

impl Default for Date {
    fn default() -> Self {
        Self::new(0, 0, DayOfWeek::Sun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_survives_counter_wrap() {
        let before = Millis::new(u32::MAX - 999);
        let after = before.add(minutes(5));

        assert!(after.raw() < before.raw());
        assert_eq!(diff(before, after), minutes(5));
        assert_eq!(after.since(before), minutes(5));
    }

    #[test]
    fn signed_diff_is_negative_for_future_boundary() {
        let start = Millis::new(10_000);
        let boundary = start.add(minutes(3));

        assert_eq!(signed_diff(start, boundary), minutes(3) as i32);
        assert_eq!(signed_diff(boundary, start), -(minutes(3) as i32));
    }

    #[test]
    fn signed_diff_across_wrap() {
        let boundary = Millis::new(u32::MAX - 500);
        let start = Millis::new(1_500);

        assert_eq!(signed_diff(boundary, start), 2_001);
        assert_eq!(signed_diff(start, boundary), -2_001);
    }

    #[test]
    fn signed_diff_at_half_range() {
        let a = Millis::new(0);
        let b = Millis::new(1 << 31);

        assert_eq!(signed_diff(a, b), i32::MIN);
        assert_eq!(signed_diff(a, Millis::new(HALF_WRAP)), i32::MAX);
    }

    #[test]
    fn unit_conversions() {
        assert_eq!(seconds(1), 1_000);
        assert_eq!(minutes(10), 600_000);
        assert_eq!(hours(2), 7_200_000);
        assert_eq!(days(24), 2_073_600_000);
    }

    #[test]
    fn minutes_of_day() {
        assert_eq!(Date::new(21, 15, DayOfWeek::Fri).minutes_of_day(), 21 * 60 + 15);
    }
}
