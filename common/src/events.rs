//! Ring buffer of (hvac, fan) spans. The slot after the newest span is always
//! empty; a span ends where the next one starts, or at `now`.

use serde::Serialize;
use tracing::debug;

use crate::{
    clock::{diff, days, hours, minutes, signed_diff, Millis},
    schedule::Mode,
    types::{from_x10, FanMode, HvacMode},
};

pub const EVENT_CAPACITY: usize = 24;

pub const LOCKOUT_MS: u32 = minutes(5);
pub const EVENT_HORIZON_MS: u32 = days(24);
pub const HEAT_SAMPLE_AFTER_MS: u32 = minutes(10);

const HEAT_RATE_HORIZON_MS: u32 = hours(48);
// A burner needs about 30 s to warm up, so a 10 minute sample covers 9.5
// minutes of heating.
const EFFECTIVE_HEATING_MINUTES: f32 = 9.5;
const OUTDOOR_WINDOW_MS: u32 = hours(24);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub hvac: HvacMode,
    pub fan: FanMode,
    pub start_time: Millis,
    pub temperature_x10: i32,
    pub temperature_10min_x10: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventView {
    pub hvac: &'static str,
    pub fan: &'static str,
    #[serde(rename = "ageSeconds")]
    pub age_seconds: u32,
    #[serde(rename = "durationSeconds")]
    pub duration_seconds: u32,
    pub temperature: f32,
    #[serde(rename = "temperatureTenMin")]
    pub temperature_10min: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct EventHistory<const N: usize = EVENT_CAPACITY> {
    events: [Option<Event>; N],
    index: usize,
}

impl<const N: usize> Default for EventHistory<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> EventHistory<N> {
    pub const fn new() -> Self {
        assert!(N >= 2, "history needs room for a span and the empty marker");
        Self {
            events: [None; N],
            index: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&Event> {
        self.events[self.index].as_ref()
    }

    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index).and_then(Option::as_ref)
    }

    pub fn is_empty(&self) -> bool {
        self.events.iter().all(Option::is_none)
    }

    pub fn newest_first(&self) -> impl Iterator<Item = (usize, &Event)> + '_ {
        (0..N)
            .map(move |back| (self.index + N - back) % N)
            .map_while(move |index| self.events[index].as_ref().map(|event| (index, event)))
    }

    /// Returns true when a new span was opened.
    pub fn update(&mut self, hvac: HvacMode, fan: FanMode, now: Millis, mean_x10: i32) -> bool {
        self.prune(now);
        self.sample_heat_rise(now, mean_x10);
        self.record(hvac, fan, now, mean_x10)
    }

    pub fn prune(&mut self, now: Millis) {
        for slot in self.events.iter_mut() {
            if slot.is_some_and(|event| diff(event.start_time, now) > EVENT_HORIZON_MS) {
                *slot = None;
            }
        }
    }

    pub fn sample_heat_rise(&mut self, now: Millis, mean_x10: i32) {
        let Some(event) = self.events[self.index].as_mut() else {
            return;
        };
        if event.hvac == HvacMode::Heat
            && event.temperature_10min_x10.is_none()
            && diff(event.start_time, now) >= HEAT_SAMPLE_AFTER_MS
        {
            event.temperature_10min_x10 = Some(mean_x10);
        }
    }

    pub fn record(&mut self, hvac: HvacMode, fan: FanMode, now: Millis, mean_x10: i32) -> bool {
        let hvac = hvac.sanitized();
        if self
            .current()
            .is_some_and(|event| event.hvac == hvac && event.fan == fan)
        {
            return false;
        }

        self.index = (self.index + 1) % N;
        self.events[self.index] = Some(Event {
            hvac,
            fan,
            start_time: now,
            temperature_x10: mean_x10,
            temperature_10min_x10: None,
        });
        self.events[(self.index + 1) % N] = None;

        debug!(
            "history span {} opened: hvac={} fan={} temp={}",
            self.index,
            hvac.as_str(),
            fan.as_str(),
            mean_x10
        );
        true
    }

    pub fn duration(&self, index: usize, now: Millis) -> u32 {
        let Some(event) = self.get(index) else {
            return 0;
        };
        match &self.events[(index + 1) % N] {
            Some(next) => diff(event.start_time, next.start_time),
            None => diff(event.start_time, now),
        }
    }

    /// True while the opposing mode is running or stopped less than
    /// [`LOCKOUT_MS`] ago.
    pub fn is_locked_out(&self, mode: Mode, now: Millis) -> bool {
        let opposing = match mode {
            Mode::Heat => HvacMode::Cool,
            Mode::Cool => HvacMode::Heat,
        };

        let mut end = now;
        for (_, event) in self.newest_first() {
            if diff(end, now) >= LOCKOUT_MS {
                return false;
            }
            if event.hvac == opposing {
                return true;
            }
            end = event.start_time;
        }
        false
    }

    pub fn seconds_in_hvac(&self, hvac: HvacMode, window_ms: u32, now: Millis) -> u32 {
        self.seconds_matching(window_ms, now, |event| event.hvac == hvac)
    }

    pub fn seconds_with_fan(&self, fan: FanMode, window_ms: u32, now: Millis) -> u32 {
        self.seconds_matching(window_ms, now, |event| event.fan == fan)
    }

    fn seconds_matching(
        &self,
        window_ms: u32,
        now: Millis,
        matches: impl Fn(&Event) -> bool,
    ) -> u32 {
        let window_start = now.sub(window_ms);
        let mut total_ms: u64 = 0;

        for (index, slot) in self.events.iter().enumerate() {
            let Some(event) = slot else {
                continue;
            };
            if !matches(event) {
                continue;
            }
            let duration = self.duration(index, now);
            let end = event.start_time.add(duration);

            if signed_diff(window_start, end) <= 0 {
                continue;
            }
            let clipped = if signed_diff(window_start, event.start_time) < 0 {
                diff(window_start, end)
            } else {
                duration
            };
            total_ms += u64::from(clipped);
        }

        (total_ms / 1_000) as u32
    }

    pub fn heat_rise_x10(&self, now: Millis) -> Option<i32> {
        let mut sum = 0;
        let mut count = 0;

        for (_, event) in self.newest_first() {
            if diff(event.start_time, now) > EVENT_HORIZON_MS {
                break;
            }
            if event.hvac != HvacMode::Heat {
                continue;
            }
            let Some(sample) = event.temperature_10min_x10 else {
                continue;
            };
            let rise = sample - event.temperature_x10;
            if rise > 0 {
                sum += rise;
                count += 1;
            }
            if count >= 2 {
                break;
            }
        }

        (count > 0).then(|| sum / count)
    }

    pub fn heat_degrees_per_minute(&self, now: Millis) -> Option<f32> {
        let rises: (i32, i32) = self
            .events
            .iter()
            .flatten()
            .filter(|event| event.hvac == HvacMode::Heat)
            .filter(|event| diff(event.start_time, now) <= HEAT_RATE_HORIZON_MS)
            .filter_map(|event| {
                event
                    .temperature_10min_x10
                    .map(|sample| sample - event.temperature_x10)
            })
            .fold((0, 0), |(sum, count), rise| (sum + rise, count + 1));

        match rises {
            (_, 0) => None,
            (sum, count) => Some(sum as f32 / 10.0 / count as f32 / EFFECTIVE_HEATING_MINUTES),
        }
    }

    /// Rough outdoor temperature from the share of the last day spent
    /// heating. Only 20F down to -20F is resolved.
    pub fn outdoor_temperature_estimate_x10(&self, now: Millis) -> Option<i32> {
        let oldest_age = self
            .events
            .iter()
            .flatten()
            .map(|event| diff(event.start_time, now))
            .max()?;
        let window_ms = oldest_age.min(OUTDOOR_WINDOW_MS);
        let window_seconds = window_ms / 1_000;
        if window_seconds == 0 {
            return None;
        }

        let heat_seconds = self.seconds_in_hvac(HvacMode::Heat, window_ms, now);
        let heat_percent = u64::from(heat_seconds) * 100 / u64::from(window_seconds);

        Some(match heat_percent {
            0..=19 => 200,
            20..=24 => 100,
            25..=31 => 0,
            32..=39 => -100,
            _ => -200,
        })
    }

    pub fn views(&self, now: Millis) -> Vec<EventView> {
        self.newest_first()
            .map(|(index, event)| EventView {
                hvac: event.hvac.as_str(),
                fan: event.fan.as_str(),
                age_seconds: diff(event.start_time, now) / 1_000,
                duration_seconds: self.duration(index, now) / 1_000,
                temperature: from_x10(event.temperature_x10),
                temperature_10min: event.temperature_10min_x10.map(from_x10),
            })
            .collect()
    }
}
