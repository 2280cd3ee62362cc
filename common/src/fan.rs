use tracing::info;

use crate::{
    clock::{days, diff, minutes, Millis},
    state::CycleState,
    types::FanMode,
};

/// The furnace runs its own fan this long after every heat/cool span.
pub const FURNACE_FAN_OVERRUN_MS: u32 = minutes(5);

// Beyond this the last-HVAC timestamp can no longer be trusted to not have
// wrapped around.
const HVAC_MEMORY_MS: u32 = days(24);

/// Fan duty cycling plus the fan-extend window after heating or cooling.
///
/// The bucket fills with every millisecond the fan is idle and drains at
/// `100 / duty` times real time while air is moving. A full bucket forces the
/// fan on until it is empty again, so over one period the fan runs roughly
/// `duty` percent of the time.
#[derive(Debug, Clone, Default)]
pub struct FanController {
    bucket_ms: i64,
    last_maintain: Option<Millis>,
    last_hvac_on: Option<Millis>,
}

impl FanController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket_ms(&self) -> i64 {
        self.bucket_ms
    }

    pub fn run(&mut self, state: &mut CycleState) {
        let now = state.now;
        let settings = &state.persisted;

        let elapsed = self.last_maintain.map_or(0, |last| diff(last, now));
        let hvac_running = state.hvac.is_running();
        let fan_was_on = state.fan == FanMode::On;

        if self
            .last_hvac_on
            .is_some_and(|last| diff(last, now) > HVAC_MEMORY_MS)
        {
            self.last_hvac_on = None;
        }
        let since_hvac = self.last_hvac_on.map(|last| diff(last, now));

        let extend_ms = minutes(u32::from(settings.fan_extend_mins));
        let mut enable = settings.fan_always_on
            || hvac_running
            || since_hvac.is_some_and(|since| since < extend_ms);

        let furnace_fan_running =
            hvac_running || since_hvac.is_some_and(|since| since < FURNACE_FAN_OVERRUN_MS);
        let period_ms = i64::from(minutes(u32::from(settings.fan_on_min_period)));
        let duty = i64::from(settings.fan_on_duty);

        if duty == 0 || period_ms == 0 {
            self.bucket_ms = 0;
        } else {
            if fan_was_on || furnace_fan_running {
                self.bucket_ms -= i64::from(elapsed) * 100 / duty;
            } else {
                self.bucket_ms += i64::from(elapsed);
            }
            self.bucket_ms = self.bucket_ms.clamp(0, period_ms);

            if self.bucket_ms >= period_ms {
                if !fan_was_on {
                    info!("fan forced on after {} idle minutes", settings.fan_on_min_period);
                }
                enable = true;
            }
            if fan_was_on && self.bucket_ms > 0 {
                enable = true;
            }
        }

        state.fan = FanMode::from_enabled(enable);

        self.last_maintain = Some(now);
        if hvac_running {
            self.last_hvac_on = Some(now);
        }
    }
}
