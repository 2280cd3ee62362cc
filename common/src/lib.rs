pub mod clock;
pub mod config;
pub mod display;
pub mod error;
pub mod events;
pub mod fan;
pub mod hvac;
pub mod iaq;
pub mod ports;
pub mod relays;
pub mod schedule;
pub mod sensing;
pub mod state;
pub mod thermostat;
pub mod topics;
pub mod types;

pub use clock::{diff, signed_diff, Date, Millis};
pub use config::{
    NetworkConfig, PersistedSettings, RuntimeConfig, ThermostatConfig, SETTINGS_VERSION,
};
pub use display::StatusLine;
pub use error::{CycleError, SensorFault, StoreError};
pub use events::{Event, EventHistory, EventView, EVENT_CAPACITY};
pub use ports::{load_or_default, Clock, Display, MemoryStore, Relays, Sensor, SettingsStore};
pub use schedule::{DayOfWeek, Mode, Setpoint};
pub use state::CycleState;
pub use thermostat::{Stage, Thermostat, PIPELINE};
pub use topics::*;
pub use types::{
    ControllerStatePayload, ControllerStatus, FanMode, HistoryReport, HvacMode, Relay,
    RelayOutputs, RelayState, Status,
};
