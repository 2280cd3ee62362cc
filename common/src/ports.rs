use tracing::warn;

use crate::{
    clock::{Date, Millis},
    config::PersistedSettings,
    display::StatusLine,
    error::StoreError,
    types::{Relay, RelayState},
};

pub trait Clock {
    /// Millisecond counter. Wraps after about 49.7 days.
    fn millis(&self) -> Millis;

    fn now_date(&self) -> Date;

    fn set_date(&mut self, date: Date);
}

/// Non-blocking: a request started on one cycle is collected on a later one.
pub trait Sensor {
    fn start_request_async(&mut self);

    fn end_reading(&mut self) -> bool;

    /// Degrees Fahrenheit.
    fn temperature(&self) -> f32;

    /// Percent relative humidity.
    fn humidity(&self) -> f32 {
        0.0
    }

    fn gas_resistance(&self) -> u32 {
        0
    }

    fn enable_gas_heater(&mut self, _enabled: bool) {}
}

pub trait Relays {
    fn set(&mut self, relay: Relay, state: RelayState);
}

pub trait Display {
    fn show(&mut self, line: &StatusLine);
}

pub trait SettingsStore {
    fn read(&mut self) -> Result<PersistedSettings, StoreError>;

    fn write(&mut self, settings: &PersistedSettings) -> Result<(), StoreError>;
}

pub fn load_or_default<S: SettingsStore + ?Sized>(store: &mut S) -> PersistedSettings {
    match store.read() {
        Ok(mut settings) if settings.has_current_version() => {
            settings.sanitize();
            return settings;
        }
        Ok(settings) => warn!(
            "stored settings version {} is not current; using defaults",
            settings.version
        ),
        Err(err) => warn!("stored settings unavailable; using defaults: {err}"),
    }

    let defaults = PersistedSettings::default();
    if let Err(err) = store.write(&defaults) {
        warn!("failed to persist default settings: {err}");
    }
    defaults
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    bytes: Option<Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes: Some(bytes) }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }
}

impl SettingsStore for MemoryStore {
    fn read(&mut self) -> Result<PersistedSettings, StoreError> {
        let bytes = self.bytes.as_deref().ok_or(StoreError::Missing)?;
        PersistedSettings::from_bytes(bytes)
    }

    fn write(&mut self, settings: &PersistedSettings) -> Result<(), StoreError> {
        self.bytes = Some(settings.to_bytes()?);
        Ok(())
    }
}
