use serde::{Deserialize, Serialize};

use crate::events::EventView;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HvacMode {
    #[default]
    Idle,
    Heat,
    Cool,
    HeatLockout,
    CoolLockout,
}

impl HvacMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Heat => "HEAT",
            Self::Cool => "COOL",
            Self::HeatLockout => "HEAT_LOCKOUT",
            Self::CoolLockout => "COOL_LOCKOUT",
        }
    }

    /// Equipment is actually running (lockouts only want to run).
    pub fn is_running(self) -> bool {
        matches!(self, Self::Heat | Self::Cool)
    }

    /// Collapses lockout states to `Idle` for history bookkeeping.
    pub fn sanitized(self) -> Self {
        match self {
            Self::Heat | Self::Cool => self,
            _ => Self::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FanMode {
    On,
    #[default]
    Off,
}

impl FanMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
        }
    }

    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            Self::On
        } else {
            Self::Off
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Relay {
    Heat,
    Cool,
    Fan,
    HeatHigh,
}

impl Relay {
    pub const ALL: [Relay; 4] = [Relay::Heat, Relay::Cool, Relay::Fan, Relay::HeatHigh];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelayState {
    On,
    #[default]
    Off,
}

impl From<bool> for RelayState {
    fn from(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }
}

/// Outcome of one pass through the cycle pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Ok,
    Skipped,
    SensorFail,
    HeatAndCool,
    Error,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Skipped => "SKIPPED",
            Self::SensorFail => "SENSOR_FAIL",
            Self::HeatAndCool => "HEAT_AND_COOL",
            Self::Error => "ERROR",
        }
    }

    /// Letter shown on the status line while this status is latched.
    pub fn indicator(self) -> char {
        match self {
            Self::Ok => 'A',
            Self::Skipped => 'B',
            Self::SensorFail => 'C',
            Self::HeatAndCool => 'D',
            Self::Error => 'E',
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayOutputs {
    pub heat: bool,
    pub cool: bool,
    pub fan: bool,
    pub heat_high: bool,
}

impl RelayOutputs {
    pub const OFF: RelayOutputs = RelayOutputs {
        heat: false,
        cool: false,
        fan: false,
        heat_high: false,
    };

    pub fn get(&self, relay: Relay) -> bool {
        match relay {
            Relay::Heat => self.heat,
            Relay::Cool => self.cool,
            Relay::Fan => self.fan,
            Relay::HeatHigh => self.heat_high,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    #[serde(rename = "currentTemp")]
    pub current_temp: f32,
    #[serde(rename = "meanTemp")]
    pub mean_temp: f32,
    #[serde(rename = "secondaryTemp")]
    pub secondary_temp: f32,
    pub humidity: f32,
    #[serde(rename = "airQuality")]
    pub air_quality: Option<f32>,
    pub hvac: &'static str,
    pub fan: &'static str,
    #[serde(rename = "heatHigh")]
    pub heat_high: bool,
    #[serde(rename = "withinTolerance")]
    pub within_tolerance: bool,
    #[serde(rename = "heatSetpoint")]
    pub heat_setpoint: f32,
    #[serde(rename = "coolSetpoint")]
    pub cool_setpoint: f32,
    #[serde(rename = "overrideTemp")]
    pub override_temp: Option<f32>,
    #[serde(rename = "overrideRemainingMin")]
    pub override_remaining_min: u32,
    #[serde(rename = "nextSetpointInMin")]
    pub next_setpoint_in_min: Option<u16>,
    #[serde(rename = "lastStatus")]
    pub last_status: &'static str,
    #[serde(rename = "latchedStatus")]
    pub latched_status: &'static str,
    pub relays: RelayOutputs,
    #[serde(rename = "statusLine")]
    pub status_line: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatePayload {
    pub temp: f32,
    pub humidity: f32,
    pub hvac: &'static str,
    pub fan: &'static str,
    #[serde(rename = "heatHigh")]
    pub heat_high: bool,
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryReport {
    pub events: Vec<EventView>,
    #[serde(rename = "heatSeconds24h")]
    pub heat_seconds_24h: u32,
    #[serde(rename = "coolSeconds24h")]
    pub cool_seconds_24h: u32,
    #[serde(rename = "fanSeconds24h")]
    pub fan_seconds_24h: u32,
    #[serde(rename = "heatRiseTenMin")]
    pub heat_rise_ten_min: Option<f32>,
    #[serde(rename = "heatDegreesPerMin")]
    pub heat_degrees_per_min: Option<f32>,
    #[serde(rename = "outdoorEstimate")]
    pub outdoor_estimate: Option<f32>,
}

/// Tenths of a degree to degrees.
pub fn from_x10(value: i32) -> f32 {
    value as f32 / 10.0
}
