use std::fmt;

use serde::Serialize;

use crate::{
    state::CycleState,
    types::{FanMode, HvacMode, Status},
};

const SPINNER: [char; 4] = ['/', '-', '\\', '|'];

/// The values behind the one-line status readout refreshed every cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatusLine {
    pub mean_temp_x10: i32,
    pub humidity: f32,
    pub override_active: bool,
    pub fan: FanMode,
    pub hvac: HvacMode,
    pub heat_high: bool,
    pub status: char,
}

impl StatusLine {
    pub fn from_state(state: &CycleState, status: char) -> Self {
        Self {
            mean_temp_x10: state.mean_temp_x10,
            humidity: state.humidity,
            override_active: state.override_active(),
            fan: state.fan(),
            hvac: state.hvac(),
            heat_high: state.heat_high,
            status,
        }
    }

    pub fn override_indicator(&self) -> char {
        if self.override_active {
            'o'
        } else {
            ' '
        }
    }

    pub fn fan_indicator(&self) -> char {
        match self.fan {
            FanMode::On => 'F',
            FanMode::Off => '_',
        }
    }

    pub fn hvac_indicator(&self) -> char {
        match self.hvac {
            HvacMode::Heat if self.heat_high => '#',
            HvacMode::Heat => 'H',
            HvacMode::Cool => 'C',
            HvacMode::HeatLockout => 'h',
            HvacMode::CoolLockout => 'c',
            HvacMode::Idle => '_',
        }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1}\u{b0} {:.1}% {}{}{}{}",
            self.mean_temp_x10 as f32 / 10.0,
            self.humidity,
            self.override_indicator(),
            self.fan_indicator(),
            self.hvac_indicator(),
            self.status
        )
    }
}

/// Status character: a spinner while healthy, the latched status letter
/// otherwise.
#[derive(Debug, Clone, Default)]
pub struct StatusIndicator {
    counter: usize,
}

impl StatusIndicator {
    pub fn next(&mut self, latched: Status) -> char {
        if latched != Status::Ok {
            return latched.indicator();
        }
        self.counter = (self.counter + 1) % SPINNER.len();
        SPINNER[self.counter]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(hvac: HvacMode, heat_high: bool) -> StatusLine {
        StatusLine {
            mean_temp_x10: 705,
            humidity: 41.3,
            override_active: true,
            fan: FanMode::On,
            hvac,
            heat_high,
            status: '|',
        }
    }

    #[test]
    fn renders_fixed_layout() {
        assert_eq!(line(HvacMode::Heat, false).to_string(), "70.5\u{b0} 41.3% oFH|");
    }

    #[test]
    fn hvac_indicators() {
        assert_eq!(line(HvacMode::Heat, true).hvac_indicator(), '#');
        assert_eq!(line(HvacMode::Cool, false).hvac_indicator(), 'C');
        assert_eq!(line(HvacMode::HeatLockout, false).hvac_indicator(), 'h');
        assert_eq!(line(HvacMode::CoolLockout, false).hvac_indicator(), 'c');
        assert_eq!(line(HvacMode::Idle, true).hvac_indicator(), '_');
    }

    #[test]
    fn spinner_rotates_until_failure_latched() {
        let mut indicator = StatusIndicator::default();

        assert_eq!(indicator.next(Status::Ok), '-');
        assert_eq!(indicator.next(Status::Ok), '\\');
        assert_eq!(indicator.next(Status::SensorFail), 'C');
        assert_eq!(indicator.next(Status::Ok), '|');
    }
}
