use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::clock::Date;

pub const MIN_SETPOINT_X10: i32 = 400;
pub const MAX_SETPOINT_X10: i32 = 999;

const MINUTES_PER_DAY: u16 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl DayOfWeek {
    pub fn index(self) -> usize {
        match self {
            Self::Mon => 0,
            Self::Tue => 1,
            Self::Wed => 2,
            Self::Thu => 3,
            Self::Fri => 4,
            Self::Sat => 5,
            Self::Sun => 6,
        }
    }

    pub fn from_chrono(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => Self::Mon,
            Weekday::Tue => Self::Tue,
            Weekday::Wed => Self::Wed,
            Weekday::Thu => Self::Thu,
            Weekday::Fri => Self::Fri,
            Weekday::Sat => Self::Sat,
            Weekday::Sun => Self::Sun,
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Self::Mon => "Mo",
            Self::Tue => "Tu",
            Self::Wed => "We",
            Self::Thu => "Th",
            Self::Fri => "Fr",
            Self::Sat => "Sa",
            Self::Sun => "Su",
        }
    }
}

/// Which side of the schedule a lookup applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    Heat,
    Cool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setpoint {
    pub hour: u8,
    pub minute: u8,
    #[serde(rename = "temperatureX10")]
    pub temperature_x10: i32,
}

impl Setpoint {
    pub const fn new(hour: u8, minute: u8, temperature_x10: i32) -> Self {
        Self {
            hour,
            minute,
            temperature_x10,
        }
    }

    pub fn minutes_of_day(&self) -> u16 {
        u16::from(self.hour) * 60 + u16::from(self.minute)
    }

    pub fn sanitize(&mut self) {
        self.hour = self.hour.min(23);
        self.minute = self.minute.min(59);
        self.temperature_x10 = clamp_setpoint(self.temperature_x10);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpcomingSetpoint {
    pub minutes_until: u16,
    pub temperature_x10: i32,
}

pub fn clamp_setpoint(temperature_x10: i32) -> i32 {
    temperature_x10.clamp(MIN_SETPOINT_X10, MAX_SETPOINT_X10)
}

/// Temperature of the setpoint most recently reached at `date`, wrapping to
/// the previous day when every setpoint lies later in the day.
pub fn active_setpoint(setpoints: &[Setpoint], date: &Date) -> i32 {
    let clock = date.minutes_of_day();

    let best = setpoints
        .iter()
        .min_by_key(|setpoint| minutes_between(setpoint.minutes_of_day(), clock));

    clamp_setpoint(best.map(|setpoint| setpoint.temperature_x10).unwrap_or(0))
}

/// The next setpoint strictly after `date`, wrapping into tomorrow.
pub fn next_setpoint(setpoints: &[Setpoint], date: &Date) -> Option<UpcomingSetpoint> {
    let clock = date.minutes_of_day();

    setpoints
        .iter()
        .map(|setpoint| {
            let until = match minutes_between(clock, setpoint.minutes_of_day()) {
                0 => MINUTES_PER_DAY,
                until => until,
            };
            UpcomingSetpoint {
                minutes_until: until,
                temperature_x10: clamp_setpoint(setpoint.temperature_x10),
            }
        })
        .min_by_key(|upcoming| upcoming.minutes_until)
}

fn minutes_between(from: u16, to: u16) -> u16 {
    let from = from % MINUTES_PER_DAY;
    let to = to % MINUTES_PER_DAY;
    (to + MINUTES_PER_DAY - from) % MINUTES_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u8, minute: u8) -> Date {
        Date::new(hour, minute, DayOfWeek::Mon)
    }

    fn day_and_night() -> [Setpoint; 2] {
        [Setpoint::new(7, 0, 700), Setpoint::new(21, 0, 690)]
    }

    #[test]
    fn picks_most_recent_setpoint() {
        let setpoints = day_and_night();

        assert_eq!(active_setpoint(&setpoints, &at(12, 30)), 700);
        assert_eq!(active_setpoint(&setpoints, &at(22, 0)), 690);
    }

    #[test]
    fn wraps_to_previous_day_before_first_setpoint() {
        let setpoints = day_and_night();

        assert_eq!(active_setpoint(&setpoints, &at(3, 15)), 690);
    }

    #[test]
    fn setpoint_applies_on_its_exact_minute() {
        let setpoints = day_and_night();

        assert_eq!(active_setpoint(&setpoints, &at(7, 0)), 700);
        assert_eq!(active_setpoint(&setpoints, &at(6, 59)), 690);
    }

    #[test]
    fn active_setpoint_is_clamped() {
        let setpoints = [Setpoint::new(0, 0, 1_200)];
        assert_eq!(active_setpoint(&setpoints, &at(8, 0)), MAX_SETPOINT_X10);

        assert_eq!(active_setpoint(&[], &at(8, 0)), MIN_SETPOINT_X10);
    }

    #[test]
    fn next_setpoint_wraps_into_tomorrow() {
        let setpoints = day_and_night();

        let next = next_setpoint(&setpoints, &at(18, 0)).unwrap();
        assert_eq!(next.minutes_until, 180);
        assert_eq!(next.temperature_x10, 690);

        let next = next_setpoint(&setpoints, &at(23, 0)).unwrap();
        assert_eq!(next.minutes_until, 8 * 60);
        assert_eq!(next.temperature_x10, 700);
    }

    #[test]
    fn next_setpoint_skips_the_current_minute() {
        let setpoints = day_and_night();

        let next = next_setpoint(&setpoints, &at(7, 0)).unwrap();
        assert_eq!(next.minutes_until, 14 * 60);
    }

    #[test]
    fn sanitize_bounds_fields() {
        let mut setpoint = Setpoint::new(30, 75, 100);
        setpoint.sanitize();

        assert_eq!(setpoint, Setpoint::new(23, 59, MIN_SETPOINT_X10));
    }
}
