use crate::{
    error::CycleError,
    ports::Relays,
    types::{FanMode, HvacMode, Relay, RelayOutputs, Status},
};

/// Maps the decided modes to relay outputs. Anything other than a healthy
/// latched status switches every relay off.
pub fn relay_outputs(latched: Status, hvac: HvacMode, fan: FanMode, heat_high: bool) -> RelayOutputs {
    if latched != Status::Ok {
        return RelayOutputs::OFF;
    }

    let heat = hvac == HvacMode::Heat;
    RelayOutputs {
        heat,
        cool: hvac == HvacMode::Cool,
        fan: fan == FanMode::On,
        heat_high: heat && heat_high,
    }
}

pub fn check_exclusive(outputs: &RelayOutputs) -> Result<(), CycleError> {
    if outputs.heat && outputs.cool {
        return Err(CycleError::HeatAndCool);
    }
    Ok(())
}

pub fn apply<R: Relays>(relays: &mut R, outputs: &RelayOutputs) {
    for relay in Relay::ALL {
        relays.set(relay, outputs.get(relay).into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RelayState;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct RecordingRelays {
        calls: Vec<(Relay, RelayState)>,
    }

    impl Relays for RecordingRelays {
        fn set(&mut self, relay: Relay, state: RelayState) {
            self.calls.push((relay, state));
        }
    }

    #[test]
    fn heat_maps_to_heat_relay() {
        let outputs = relay_outputs(Status::Ok, HvacMode::Heat, FanMode::Off, false);

        assert_eq!(
            outputs,
            RelayOutputs {
                heat: true,
                ..RelayOutputs::OFF
            }
        );
    }

    #[test]
    fn high_heat_only_while_heating() {
        let high = relay_outputs(Status::Ok, HvacMode::Heat, FanMode::On, true);
        assert!(high.heat && high.heat_high && high.fan);

        let idle = relay_outputs(Status::Ok, HvacMode::Idle, FanMode::Off, true);
        assert_eq!(idle, RelayOutputs::OFF);
    }

    #[test]
    fn lockout_runs_nothing() {
        let outputs = relay_outputs(Status::Ok, HvacMode::CoolLockout, FanMode::Off, false);
        assert_eq!(outputs, RelayOutputs::OFF);
    }

    #[test]
    fn latched_failure_forces_everything_off() {
        for status in [Status::SensorFail, Status::HeatAndCool, Status::Error] {
            let outputs = relay_outputs(status, HvacMode::Cool, FanMode::On, false);
            assert_eq!(outputs, RelayOutputs::OFF);
        }
    }

    #[test]
    fn rejects_heat_with_cool() {
        let both = RelayOutputs {
            heat: true,
            cool: true,
            ..RelayOutputs::OFF
        };
        assert_eq!(check_exclusive(&both), Err(CycleError::HeatAndCool));
    }

    #[test]
    fn apply_sets_every_relay() {
        let mut relays = RecordingRelays::default();
        let outputs = relay_outputs(Status::Ok, HvacMode::Cool, FanMode::On, false);

        apply(&mut relays, &outputs);

        assert_eq!(
            relays.calls,
            vec![
                (Relay::Heat, RelayState::Off),
                (Relay::Cool, RelayState::On),
                (Relay::Fan, RelayState::On),
                (Relay::HeatHigh, RelayState::Off),
            ]
        );
    }
}
