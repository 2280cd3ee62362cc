use std::{
    io::ErrorKind,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use chrono::{DateTime, Datelike, TimeDelta, Timelike, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use hvac_common::{
    Clock, Date, DayOfWeek, Display, Millis, PersistedSettings, Relay, RelayState, Relays, Sensor,
    SettingsStore, StatusLine, StoreError,
};

const WEEK_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Clone)]
pub struct HostClock {
    started: Instant,
    timezone: Tz,
    offset_minutes: i64,
}

impl HostClock {
    pub fn new(timezone: &str) -> Self {
        let timezone = timezone.parse::<Tz>().unwrap_or_else(|_| {
            warn!("unknown timezone {timezone:?}; using UTC");
            Tz::UTC
        });

        Self {
            started: Instant::now(),
            timezone,
            offset_minutes: 0,
        }
    }

    fn local_now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.timezone)
    }
}

impl Clock for HostClock {
    fn millis(&self) -> Millis {
        // Truncated to 32 bits so it wraps like the embedded counter.
        Millis::new(self.started.elapsed().as_millis() as u32)
    }

    fn now_date(&self) -> Date {
        date_of(&(self.local_now() + TimeDelta::minutes(self.offset_minutes)))
    }

    fn set_date(&mut self, date: Date) {
        let actual = minutes_of_week(&date_of(&self.local_now()));
        self.offset_minutes = (minutes_of_week(&date) - actual).rem_euclid(WEEK_MINUTES);
        info!(
            "clock set to {} {:02}:{:02}",
            date.day.short_name(),
            date.hour,
            date.minute
        );
    }
}

fn date_of(local: &DateTime<Tz>) -> Date {
    Date::new(
        local.hour() as u8,
        local.minute() as u8,
        DayOfWeek::from_chrono(local.weekday()),
    )
}

fn minutes_of_week(date: &Date) -> i64 {
    date.day.index() as i64 * 24 * 60 + i64::from(date.minutes_of_day())
}

#[derive(Debug, Clone, Copy)]
struct Sample<T> {
    value: T,
    at: Instant,
}

impl<T: Copy> Sample<T> {
    fn fresh(sample: Option<Self>, now: Instant, stale_after: Duration) -> Option<T> {
        sample
            .filter(|sample| now.saturating_duration_since(sample.at) < stale_after)
            .map(|sample| sample.value)
    }
}

#[derive(Debug, Default)]
pub struct SensorFeed {
    temperature: Option<Sample<f32>>,
    humidity: Option<Sample<f32>>,
    gas_resistance: Option<Sample<u32>>,
}

impl SensorFeed {
    pub fn push_temperature(&mut self, value: f32, at: Instant) {
        self.temperature = Some(Sample { value, at });
    }

    pub fn push_humidity(&mut self, value: f32, at: Instant) {
        self.humidity = Some(Sample { value, at });
    }

    pub fn push_gas_resistance(&mut self, value: u32, at: Instant) {
        self.gas_resistance = Some(Sample { value, at });
    }
}

pub type SharedFeed = Arc<Mutex<SensorFeed>>;

pub fn lock_feed(feed: &SharedFeed) -> MutexGuard<'_, SensorFeed> {
    feed.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedRole {
    Probe,
    Climate,
}

#[derive(Debug)]
pub struct FeedSensor {
    feed: SharedFeed,
    role: FeedRole,
    stale_after: Duration,
    requested: bool,
    heater: bool,
    temperature: f32,
    humidity: f32,
    gas_resistance: u32,
}

impl FeedSensor {
    pub fn new(feed: SharedFeed, role: FeedRole, stale_after: Duration) -> Self {
        Self {
            feed,
            role,
            stale_after,
            requested: false,
            heater: false,
            temperature: f32::NAN,
            humidity: f32::NAN,
            gas_resistance: 0,
        }
    }
}

impl Sensor for FeedSensor {
    fn start_request_async(&mut self) {
        self.requested = true;
    }

    fn end_reading(&mut self) -> bool {
        if !self.requested {
            return false;
        }

        let now = Instant::now();
        let feed = lock_feed(&self.feed);
        let temperature = Sample::fresh(feed.temperature, now, self.stale_after);
        let ready = match self.role {
            FeedRole::Probe => {
                let Some(temperature) = temperature else {
                    return false;
                };
                self.temperature = temperature;
                true
            }
            FeedRole::Climate => {
                let Some(humidity) = Sample::fresh(feed.humidity, now, self.stale_after) else {
                    return false;
                };
                self.humidity = humidity;
                self.temperature = temperature.unwrap_or(f32::NAN);
                if let Some(gas) = Sample::fresh(feed.gas_resistance, now, self.stale_after) {
                    self.gas_resistance = gas;
                }
                true
            }
        };

        self.requested = !ready;
        ready
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn humidity(&self) -> f32 {
        self.humidity
    }

    fn gas_resistance(&self) -> u32 {
        if self.heater {
            self.gas_resistance
        } else {
            0
        }
    }

    fn enable_gas_heater(&mut self, enabled: bool) {
        if self.role == FeedRole::Climate && self.heater != enabled {
            debug!("gas heater {}", if enabled { "on" } else { "off" });
        }
        self.heater = enabled;
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoggingRelays {
    states: [RelayState; Relay::ALL.len()],
}

impl LoggingRelays {
    pub fn state(&self, relay: Relay) -> RelayState {
        self.states[slot(relay)]
    }
}

fn slot(relay: Relay) -> usize {
    Relay::ALL
        .iter()
        .position(|candidate| *candidate == relay)
        .unwrap_or(0)
}

impl Relays for LoggingRelays {
    fn set(&mut self, relay: Relay, state: RelayState) {
        let current = &mut self.states[slot(relay)];
        if *current != state {
            debug!("relay {relay:?} -> {state:?}");
            *current = state;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    last: String,
}

impl StatusBoard {
    pub fn last(&self) -> &str {
        &self.last
    }
}

impl Display for StatusBoard {
    fn show(&mut self, line: &StatusLine) {
        self.last = line.to_string();
    }
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SettingsStore for JsonFileStore {
    fn read(&mut self) -> Result<PersistedSettings, StoreError> {
        match std::fs::read(&self.path) {
            Ok(raw) => PersistedSettings::from_bytes(&raw),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StoreError::Missing),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&mut self, settings: &PersistedSettings) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, settings.to_bytes()?)?;
        Ok(())
    }
}
