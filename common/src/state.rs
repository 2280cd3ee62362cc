use crate::{
    clock::{diff, hours, Date, Millis},
    config::PersistedSettings,
    events::EventHistory,
    schedule::{active_setpoint, clamp_setpoint, Mode},
    types::{FanMode, HvacMode},
};

pub const OVERRIDE_DURATION_MS: u32 = hours(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Override {
    pub temperature_x10: i32,
    pub started_at: Millis,
}

/// Everything one pass of the pipeline reads and writes.
///
/// `hvac` is written only by the mode decision and `fan` only by the fan
/// controller; everyone else goes through the getters.
#[derive(Debug, Clone)]
pub struct CycleState {
    pub now: Millis,
    pub(crate) hvac: HvacMode,
    pub(crate) fan: FanMode,
    pub current_temp_x10: i32,
    pub mean_temp_x10: i32,
    pub secondary_temp_x10: i32,
    pub humidity: f32,
    pub air_quality_score: Option<f32>,
    pub override_temp: Option<Override>,
    pub heat_high: bool,
    pub within_tolerance: bool,
    pub changed: bool,
    pub events: EventHistory,
    pub persisted: PersistedSettings,
}

impl CycleState {
    pub fn new(persisted: PersistedSettings, now: Millis) -> Self {
        Self {
            now,
            hvac: HvacMode::Idle,
            fan: FanMode::Off,
            current_temp_x10: 0,
            mean_temp_x10: 0,
            secondary_temp_x10: 0,
            humidity: 0.0,
            air_quality_score: None,
            override_temp: None,
            heat_high: false,
            within_tolerance: true,
            changed: false,
            events: EventHistory::new(),
            persisted,
        }
    }

    pub fn hvac(&self) -> HvacMode {
        self.hvac
    }

    pub fn fan(&self) -> FanMode {
        self.fan
    }

    pub fn override_active(&self) -> bool {
        self.override_temp.is_some()
    }

    pub fn override_or_mean_x10(&self) -> i32 {
        match self.override_temp {
            Some(active) => clamp_setpoint(active.temperature_x10),
            None => self.mean_temp_x10,
        }
    }

    pub fn set_override(&mut self, delta_x10: i32, now: Millis) {
        self.override_temp = Some(Override {
            temperature_x10: clamp_setpoint(self.override_or_mean_x10() + delta_x10),
            started_at: now,
        });
        self.changed = true;
    }

    pub fn clear_override(&mut self) {
        if self.override_temp.take().is_some() {
            self.changed = true;
        }
    }

    /// Returns true if the override expired.
    pub fn expire_override(&mut self) -> bool {
        match self.override_temp {
            Some(active) if diff(active.started_at, self.now) > OVERRIDE_DURATION_MS => {
                self.override_temp = None;
                true
            }
            _ => false,
        }
    }

    pub fn override_remaining_ms(&self, now: Millis) -> u32 {
        self.override_temp.map_or(0, |active| {
            OVERRIDE_DURATION_MS.saturating_sub(diff(active.started_at, now))
        })
    }

    pub fn setpoint_x10(&self, mode: Mode, date: &Date) -> i32 {
        if self.override_active() {
            return self.override_or_mean_x10();
        }
        active_setpoint(self.persisted.setpoints(mode), date)
    }
}
