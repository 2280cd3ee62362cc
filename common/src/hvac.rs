use tracing::{debug, info};

use crate::{
    clock::{diff, minutes, Date, Millis},
    schedule::Mode,
    state::CycleState,
    types::HvacMode,
};

pub const HEAT_ESCALATE_AFTER_MS: u32 = minutes(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeDecision {
    pub hvac: HvacMode,
    pub within_tolerance: Option<bool>,
}

pub fn decide_mode(state: &CycleState, mode: Mode, current: HvacMode, date: &Date) -> ModeDecision {
    let (active, lockout) = match mode {
        Mode::Heat => (HvacMode::Heat, HvacMode::HeatLockout),
        Mode::Cool => (HvacMode::Cool, HvacMode::CoolLockout),
    };
    // A lockout is re-evaluated every cycle.
    let current = if current == lockout {
        HvacMode::Idle
    } else {
        current
    };
    let running = current == active;

    if !state.persisted.enabled(mode) {
        let hvac = if running { HvacMode::Idle } else { current };
        return ModeDecision {
            hvac,
            within_tolerance: None,
        };
    }

    let setpoint = state.setpoint_x10(mode, date);
    let tolerance = state.persisted.tolerance_x10;
    let mean = state.mean_temp_x10;
    let (within, satisfied) = match mode {
        Mode::Heat => (mean >= setpoint, mean >= setpoint + tolerance),
        Mode::Cool => (mean <= setpoint, mean <= setpoint - tolerance),
    };

    let hvac = if running {
        if satisfied {
            HvacMode::Idle
        } else {
            active
        }
    } else if !within {
        if state.events.is_locked_out(mode, state.now) {
            lockout
        } else {
            active
        }
    } else {
        current
    };

    ModeDecision {
        hvac,
        within_tolerance: Some(within),
    }
}

// Cool is only considered when heat does not want to run.
pub fn decide_hvac(state: &mut CycleState, date: &Date) {
    if state.expire_override() {
        info!("temperature override expired");
    }

    let previous = state.hvac;

    let heat = decide_mode(state, Mode::Heat, previous, date);
    let mut within_tolerance = heat.within_tolerance.unwrap_or(true);
    let mut hvac = heat.hvac;

    if !matches!(hvac, HvacMode::Heat | HvacMode::HeatLockout) {
        let cool = decide_mode(state, Mode::Cool, hvac, date);
        if cool.within_tolerance == Some(false) {
            within_tolerance = false;
        }
        hvac = cool.hvac;
    }

    state.within_tolerance = within_tolerance;
    state.hvac = hvac;

    if hvac != previous {
        match hvac {
            HvacMode::HeatLockout | HvacMode::CoolLockout => {
                debug!("{} blocked by lockout", hvac.as_str())
            }
            _ => info!(
                "hvac {} -> {} (mean {} tolerance {})",
                previous.as_str(),
                hvac.as_str(),
                state.mean_temp_x10,
                state.persisted.tolerance_x10
            ),
        }
    }
}

/// Sticky high-stage heat after [`HEAT_ESCALATE_AFTER_MS`] of unsatisfied heat.
#[derive(Debug, Clone, Default)]
pub struct HeatEscalation {
    heat_started: Option<Millis>,
}

impl HeatEscalation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(&mut self, state: &mut CycleState) {
        if state.hvac != HvacMode::Heat {
            self.heat_started = None;
            state.heat_high = false;
            return;
        }

        let started = *self.heat_started.get_or_insert(state.now);
        if !state.heat_high
            && !state.within_tolerance
            && diff(started, state.now) >= HEAT_ESCALATE_AFTER_MS
        {
            state.heat_high = true;
            info!("escalating to high heat");
        }
    }
}
