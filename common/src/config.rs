use serde::{Deserialize, Serialize};

use crate::{
    error::StoreError,
    schedule::{Mode, Setpoint},
};

/// Bumped whenever the persisted layout changes; stored data with another
/// version is discarded in favour of the defaults.
pub const SETTINGS_VERSION: u16 = 34807;

pub const SETPOINTS_PER_MODE: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermostatConfig {
    pub run_every_ms: u32,
    pub gas_sample_every_cycles: u32,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            run_every_ms: 1_500,
            gas_sample_every_cycles: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSettings {
    pub version: u16,
    #[serde(rename = "heatEnabled")]
    pub heat_enabled: bool,
    #[serde(rename = "coolEnabled")]
    pub cool_enabled: bool,
    #[serde(rename = "fanAlwaysOn")]
    pub fan_always_on: bool,
    pub humidity: u8,
    #[serde(rename = "heatSetpoints")]
    pub heat_setpoints: [Setpoint; SETPOINTS_PER_MODE],
    #[serde(rename = "coolSetpoints")]
    pub cool_setpoints: [Setpoint; SETPOINTS_PER_MODE],
    #[serde(rename = "toleranceX10")]
    pub tolerance_x10: i32,
    #[serde(rename = "fanExtendMins")]
    pub fan_extend_mins: u16,
    #[serde(rename = "fanOnMinPeriod")]
    pub fan_on_min_period: u16,
    #[serde(rename = "fanOnDuty")]
    pub fan_on_duty: u8,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            heat_enabled: true,
            cool_enabled: false,
            fan_always_on: false,
            humidity: 30,
            heat_setpoints: [Setpoint::new(7, 0, 695), Setpoint::new(21, 0, 685)],
            cool_setpoints: [Setpoint::new(7, 0, 770), Setpoint::new(21, 0, 750)],
            // Setpoint 70.0 heats from 69.9 up to 71.1.
            tolerance_x10: 11,
            fan_extend_mins: 0,
            fan_on_min_period: 180,
            fan_on_duty: 0,
        }
    }
}

impl PersistedSettings {
    pub fn sanitize(&mut self) {
        self.humidity = self.humidity.min(100);
        for setpoint in self
            .heat_setpoints
            .iter_mut()
            .chain(self.cool_setpoints.iter_mut())
        {
            setpoint.sanitize();
        }
        self.tolerance_x10 = self.tolerance_x10.clamp(5, 50);
        self.fan_extend_mins = self.fan_extend_mins.min(120);
        self.fan_on_min_period = self.fan_on_min_period.min(999);
        self.fan_on_duty = self.fan_on_duty.min(99);
    }

    pub fn setpoints(&self, mode: Mode) -> &[Setpoint] {
        match mode {
            Mode::Heat => &self.heat_setpoints,
            Mode::Cool => &self.cool_setpoints,
        }
    }

    pub fn enabled(&self, mode: Mode) -> bool {
        match mode {
            Mode::Heat => self.heat_enabled,
            Mode::Cool => self.cool_enabled,
        }
    }

    pub fn has_current_version(&self) -> bool {
        self.version == SETTINGS_VERSION
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn set_setpoint(&mut self, mode: Mode, index: usize, setpoint: Setpoint) -> bool {
        let slots = match mode {
            Mode::Heat => &mut self.heat_setpoints,
            Mode::Cool => &mut self.cool_setpoints,
        };
        let Some(slot) = slots.get_mut(index) else {
            return false;
        };
        let mut setpoint = setpoint;
        setpoint.sanitize();
        if *slot == setpoint {
            return false;
        }
        *slot = setpoint;
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "192.168.1.100".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub thermostat: ThermostatConfig,
    pub timezone: String,
    pub network: NetworkConfig,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_sensor_stale_timeout_ms")]
    pub sensor_stale_timeout_ms: u64,
    #[serde(default = "default_state_publish_interval_ms")]
    pub state_publish_interval_ms: u64,
}

fn default_http_port() -> u16 {
    8080
}

fn default_sensor_stale_timeout_ms() -> u64 {
    300_000
}

fn default_state_publish_interval_ms() -> u64 {
    10_000
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            thermostat: ThermostatConfig::default(),
            timezone: "America/Los_Angeles".to_string(),
            network: NetworkConfig::default(),
            http_port: default_http_port(),
            sensor_stale_timeout_ms: default_sensor_stale_timeout_ms(),
            state_publish_interval_ms: default_state_publish_interval_ms(),
        }
    }
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.thermostat.run_every_ms = self.thermostat.run_every_ms.clamp(250, 60_000);
        self.thermostat.gas_sample_every_cycles = self.thermostat.gas_sample_every_cycles.max(1);
        self.sensor_stale_timeout_ms = self.sensor_stale_timeout_ms.max(1_000);
        self.state_publish_interval_ms = self.state_publish_interval_ms.max(1_000);
    }
}
