use tracing::{info, warn};

use crate::{
    clock::{diff, hours, Date},
    config::{PersistedSettings, ThermostatConfig, SETTINGS_VERSION},
    display::{StatusIndicator, StatusLine},
    error::CycleError,
    fan::FanController,
    hvac::{decide_hvac, HeatEscalation},
    ports::{Clock, Display, Relays, Sensor},
    relays::{self, check_exclusive, relay_outputs},
    schedule::{next_setpoint, Mode},
    sensing::SensorStage,
    state::CycleState,
    types::{
        from_x10, ControllerStatePayload, ControllerStatus, FanMode, HistoryReport, HvacMode,
        RelayOutputs, Status,
    },
};

const REPORT_WINDOW_MS: u32 = hours(24);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Sense,
    DecideHvac,
    EscalateHeat,
    ControlFan,
    RecordHistory,
    LatchStatus,
    SetRelays,
    UpdateDisplay,
}

impl Stage {
    /// Bookkeeping and fail-safe stages still run on a failed cycle; control
    /// decisions do not.
    pub fn runs_after_failure(self) -> bool {
        matches!(
            self,
            Self::RecordHistory | Self::LatchStatus | Self::SetRelays | Self::UpdateDisplay
        )
    }
}

pub const PIPELINE: [Stage; 8] = [
    Stage::Sense,
    Stage::DecideHvac,
    Stage::EscalateHeat,
    Stage::ControlFan,
    Stage::RecordHistory,
    Stage::LatchStatus,
    Stage::SetRelays,
    Stage::UpdateDisplay,
];

pub struct Thermostat<C, P, E, R, D> {
    clock: C,
    probe: P,
    climate: E,
    relays: R,
    display: D,

    config: ThermostatConfig,
    state: CycleState,

    sensors: SensorStage,
    escalation: HeatEscalation,
    fan: FanController,
    indicator: StatusIndicator,

    latched: Status,
    last_status: Status,
    outputs: RelayOutputs,
    line: StatusLine,
}

impl<C, P, E, R, D> Thermostat<C, P, E, R, D>
where
    C: Clock,
    P: Sensor,
    E: Sensor,
    R: Relays,
    D: Display,
{
    pub fn new(
        clock: C,
        mut probe: P,
        mut climate: E,
        relays: R,
        display: D,
        config: ThermostatConfig,
        mut settings: PersistedSettings,
    ) -> Self {
        settings.sanitize();
        let state = CycleState::new(settings, clock.millis());
        let mut sensors = SensorStage::new(&config);
        sensors.prime(&mut probe, &mut climate);

        Self {
            clock,
            probe,
            climate,
            relays,
            display,
            config,
            state,
            sensors,
            escalation: HeatEscalation::new(),
            fan: FanController::new(),
            indicator: StatusIndicator::default(),
            latched: Status::Ok,
            last_status: Status::Ok,
            outputs: RelayOutputs::OFF,
            line: StatusLine::default(),
        }
    }

    /// Runs the pipeline if it is due, otherwise returns `Skipped` without
    /// touching any state.
    pub fn run_once(&mut self) -> Status {
        let now = self.clock.millis();
        if !self.state.changed && diff(self.state.now, now) <= self.config.run_every_ms {
            return Status::Skipped;
        }

        self.state.now = now;
        let date = self.clock.now_date();

        let mut outcome = Ok(());
        for stage in PIPELINE {
            if outcome.is_err() && !stage.runs_after_failure() {
                continue;
            }
            let result = self.run_stage(stage, &date, outcome);
            if outcome.is_ok() {
                outcome = result;
            }
        }

        self.state.changed = false;

        let status = match outcome {
            Ok(()) => Status::Ok,
            Err(err) => err.status(),
        };
        self.last_status = status;
        status
    }

    fn run_stage(
        &mut self,
        stage: Stage,
        date: &Date,
        outcome: Result<(), CycleError>,
    ) -> Result<(), CycleError> {
        match stage {
            Stage::Sense => self
                .sensors
                .run(&mut self.state, &mut self.probe, &mut self.climate)?,
            Stage::DecideHvac => decide_hvac(&mut self.state, date),
            Stage::EscalateHeat => self.escalation.run(&mut self.state),
            Stage::ControlFan => self.fan.run(&mut self.state),
            Stage::RecordHistory => {
                let (hvac, fan) = (self.state.hvac(), self.state.fan());
                let (now, mean) = (self.state.now, self.state.mean_temp_x10);
                self.state.events.update(hvac, fan, now, mean);
            }
            Stage::LatchStatus => {
                if let Err(err) = outcome {
                    if self.last_status != err.status() {
                        warn!("cycle failed: {err}");
                    }
                    self.latch(err.status());
                }
            }
            Stage::SetRelays => {
                let outputs = relay_outputs(
                    self.latched,
                    self.state.hvac(),
                    self.state.fan(),
                    self.state.heat_high,
                );
                if let Err(err) = check_exclusive(&outputs) {
                    self.latch(err.status());
                    self.set_outputs(RelayOutputs::OFF);
                    return Err(err);
                }
                self.set_outputs(outputs);
            }
            Stage::UpdateDisplay => {
                let status = self.indicator.next(self.latched);
                self.line = StatusLine::from_state(&self.state, status);
                self.display.show(&self.line);
            }
        }
        Ok(())
    }

    fn latch(&mut self, status: Status) {
        if self.latched != status {
            warn!("latched status {}", status.as_str());
        }
        self.latched = status;
    }

    fn set_outputs(&mut self, outputs: RelayOutputs) {
        if outputs != self.outputs {
            info!(
                "relays heat={} cool={} fan={} heat_high={}",
                outputs.heat, outputs.cool, outputs.fan, outputs.heat_high
            );
        }
        relays::apply(&mut self.relays, &outputs);
        self.outputs = outputs;
    }

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    pub fn config(&self) -> &ThermostatConfig {
        &self.config
    }

    pub fn settings(&self) -> &PersistedSettings {
        &self.state.persisted
    }

    pub fn latched_status(&self) -> Status {
        self.latched
    }

    pub fn last_status(&self) -> Status {
        self.last_status
    }

    pub fn outputs(&self) -> RelayOutputs {
        self.outputs
    }

    pub fn status_line(&self) -> &StatusLine {
        &self.line
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn probe_mut(&mut self) -> &mut P {
        &mut self.probe
    }

    pub fn climate_mut(&mut self) -> &mut E {
        &mut self.climate
    }

    pub fn relays(&self) -> &R {
        &self.relays
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    /// Clears the latched failure (the reset button).
    pub fn clear_status(&mut self) {
        if self.latched != Status::Ok {
            info!("latched status {} cleared", self.latched.as_str());
        }
        self.latched = Status::Ok;
        self.state.changed = true;
    }

    pub fn set_date(&mut self, date: Date) {
        self.clock.set_date(date);
        self.state.changed = true;
    }

    pub fn set_override(&mut self, delta_x10: i32) {
        let now = self.clock.millis();
        self.state.set_override(delta_x10, now);
        info!(
            "temperature override set to {}",
            self.state.override_or_mean_x10()
        );
    }

    pub fn clear_override(&mut self) {
        self.state.clear_override();
    }

    /// The caller persists the settings when this returns true.
    pub fn update_settings(&mut self, mut settings: PersistedSettings) -> bool {
        settings.version = SETTINGS_VERSION;
        settings.sanitize();
        if settings == self.state.persisted {
            return false;
        }
        self.state.persisted = settings;
        self.state.changed = true;
        info!("settings updated");
        true
    }

    pub fn snapshot(&self) -> ControllerStatus {
        let state = &self.state;
        let date = self.clock.now_date();
        let now = self.clock.millis();

        let schedule_mode = if state.persisted.heat_enabled || !state.persisted.cool_enabled {
            Mode::Heat
        } else {
            Mode::Cool
        };
        let next = next_setpoint(state.persisted.setpoints(schedule_mode), &date);

        ControllerStatus {
            current_temp: from_x10(state.current_temp_x10),
            mean_temp: from_x10(state.mean_temp_x10),
            secondary_temp: from_x10(state.secondary_temp_x10),
            humidity: state.humidity,
            air_quality: state.air_quality_score,
            hvac: state.hvac().as_str(),
            fan: state.fan().as_str(),
            heat_high: state.heat_high,
            within_tolerance: state.within_tolerance,
            heat_setpoint: from_x10(state.setpoint_x10(Mode::Heat, &date)),
            cool_setpoint: from_x10(state.setpoint_x10(Mode::Cool, &date)),
            override_temp: state
                .override_temp
                .map(|active| from_x10(active.temperature_x10)),
            override_remaining_min: state.override_remaining_ms(now) / 60_000,
            next_setpoint_in_min: next.map(|upcoming| upcoming.minutes_until),
            last_status: self.last_status.as_str(),
            latched_status: self.latched.as_str(),
            relays: self.outputs,
            status_line: self.line.to_string(),
        }
    }

    pub fn state_payload(&self) -> ControllerStatePayload {
        ControllerStatePayload {
            temp: from_x10(self.state.mean_temp_x10),
            humidity: self.state.humidity,
            hvac: self.state.hvac().as_str(),
            fan: self.state.fan().as_str(),
            heat_high: self.state.heat_high,
            status: self.latched.as_str(),
        }
    }

    pub fn history_report(&self) -> HistoryReport {
        let events = &self.state.events;
        let now = self.clock.millis();

        HistoryReport {
            events: events.views(now),
            heat_seconds_24h: events.seconds_in_hvac(HvacMode::Heat, REPORT_WINDOW_MS, now),
            cool_seconds_24h: events.seconds_in_hvac(HvacMode::Cool, REPORT_WINDOW_MS, now),
            fan_seconds_24h: events.seconds_with_fan(FanMode::On, REPORT_WINDOW_MS, now),
            heat_rise_ten_min: events.heat_rise_x10(now).map(from_x10),
            heat_degrees_per_min: events.heat_degrees_per_minute(now),
            outdoor_estimate: events.outdoor_temperature_estimate_x10(now).map(from_x10),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{
        clock::{minutes, Millis},
        schedule::DayOfWeek,
        types::{Relay, RelayState},
    };
    use pretty_assertions::assert_eq;

    struct FakeClock {
        millis: u32,
        date: Date,
    }

    impl FakeClock {
        fn advance(&mut self, ms: u32) {
            self.millis = self.millis.wrapping_add(ms);
        }
    }

    impl Clock for FakeClock {
        fn millis(&self) -> Millis {
            Millis::new(self.millis)
        }

        fn now_date(&self) -> Date {
            self.date
        }

        fn set_date(&mut self, date: Date) {
            self.date = date;
        }
    }

    struct FakeSensor {
        ready: bool,
        temperature: f32,
        humidity: f32,
    }

    impl Sensor for FakeSensor {
        fn start_request_async(&mut self) {}

        fn end_reading(&mut self) -> bool {
            self.ready
        }

        fn temperature(&self) -> f32 {
            self.temperature
        }

        fn humidity(&self) -> f32 {
            self.humidity
        }
    }

    #[derive(Default)]
    struct FakeRelays {
        states: HashMap<Relay, RelayState>,
    }

    impl FakeRelays {
        fn is_on(&self, relay: Relay) -> bool {
            self.states.get(&relay) == Some(&RelayState::On)
        }
    }

    impl Relays for FakeRelays {
        fn set(&mut self, relay: Relay, state: RelayState) {
            self.states.insert(relay, state);
        }
    }

    #[derive(Default)]
    struct FakeDisplay {
        lines: Vec<String>,
    }

    impl Display for FakeDisplay {
        fn show(&mut self, line: &StatusLine) {
            self.lines.push(line.to_string());
        }
    }

    type TestThermostat = Thermostat<FakeClock, FakeSensor, FakeSensor, FakeRelays, FakeDisplay>;

    fn thermostat(start_ms: u32, temperature: f32) -> TestThermostat {
        let settings = PersistedSettings {
            heat_enabled: true,
            cool_enabled: true,
            fan_on_duty: 0,
            ..PersistedSettings::default()
        };
        Thermostat::new(
            FakeClock {
                millis: start_ms,
                date: Date::new(12, 0, DayOfWeek::Wed),
            },
            FakeSensor {
                ready: true,
                temperature,
                humidity: 0.0,
            },
            FakeSensor {
                ready: true,
                temperature: 70.0,
                humidity: 40.0,
            },
            FakeRelays::default(),
            FakeDisplay::default(),
            ThermostatConfig::default(),
            settings,
        )
    }

    fn tick(thermostat: &mut TestThermostat, ms: u32) -> Status {
        thermostat.clock_mut().advance(ms);
        thermostat.run_once()
    }

    #[test]
    fn paces_cycles_from_boot() {
        let mut thermostat = thermostat(0, 70.0);

        assert_eq!(tick(&mut thermostat, 1_000), Status::Skipped);
        assert_eq!(tick(&mut thermostat, 500), Status::Skipped);
        assert_eq!(tick(&mut thermostat, 1), Status::Ok);
        assert_eq!(tick(&mut thermostat, 1_000), Status::Skipped);
        assert!(thermostat.display().lines.len() == 1);
    }

    #[test]
    fn skipped_cycle_leaves_state_alone() {
        let mut thermostat = thermostat(0, 70.0);
        tick(&mut thermostat, 2_000);
        let now = thermostat.state().now;

        thermostat.probe_mut().temperature = 60.0;
        assert_eq!(tick(&mut thermostat, 100), Status::Skipped);

        assert_eq!(thermostat.state().now, now);
        assert_eq!(thermostat.state().current_temp_x10, 700);
    }

    #[test]
    fn changed_flag_forces_a_cycle() {
        let mut thermostat = thermostat(0, 70.0);
        tick(&mut thermostat, 2_000);

        thermostat.set_override(-10);
        assert_eq!(tick(&mut thermostat, 10), Status::Ok);
        assert!(!thermostat.state().changed);
        assert_eq!(tick(&mut thermostat, 10), Status::Skipped);
    }

    #[test]
    fn cold_room_runs_heat_and_fan() {
        let mut thermostat = thermostat(0, 65.0);

        assert_eq!(tick(&mut thermostat, 2_000), Status::Ok);

        assert_eq!(thermostat.state().hvac(), HvacMode::Heat);
        assert!(thermostat.relays().is_on(Relay::Heat));
        assert!(thermostat.relays().is_on(Relay::Fan));
        assert!(!thermostat.relays().is_on(Relay::Cool));
        assert!(!thermostat.relays().is_on(Relay::HeatHigh));
        assert_eq!(thermostat.state().events.current().unwrap().hvac, HvacMode::Heat);
    }

    #[test]
    fn heat_escalates_through_pipeline() {
        let mut thermostat = thermostat(0, 65.0);
        tick(&mut thermostat, 2_000);

        for _ in 0..10 {
            tick(&mut thermostat, minutes(1));
        }

        assert!(thermostat.state().heat_high);
        assert!(thermostat.relays().is_on(Relay::HeatHigh));
        assert!(thermostat.status_line().to_string().contains('#'));
    }

    #[test]
    fn sensor_failure_latches_and_fails_safe() {
        let mut thermostat = thermostat(0, 65.0);
        tick(&mut thermostat, 2_000);
        assert!(thermostat.relays().is_on(Relay::Heat));

        thermostat.climate_mut().ready = false;
        assert_eq!(tick(&mut thermostat, 2_000), Status::SensorFail);

        // Decisions are preserved, outputs are forced off.
        assert_eq!(thermostat.state().hvac(), HvacMode::Heat);
        assert_eq!(thermostat.latched_status(), Status::SensorFail);
        assert_eq!(thermostat.outputs(), RelayOutputs::OFF);
        assert!(!thermostat.relays().is_on(Relay::Heat));
        assert!(thermostat.status_line().to_string().ends_with('C'));

        // Recovery keeps the latch until it is cleared.
        thermostat.climate_mut().ready = true;
        assert_eq!(tick(&mut thermostat, 2_000), Status::Ok);
        assert_eq!(thermostat.latched_status(), Status::SensorFail);
        assert!(!thermostat.relays().is_on(Relay::Heat));

        thermostat.clear_status();
        assert_eq!(tick(&mut thermostat, 10), Status::Ok);
        assert!(thermostat.relays().is_on(Relay::Heat));
        assert_eq!(thermostat.latched_status(), Status::Ok);
    }

    #[test]
    fn sensor_failure_skips_decisions() {
        let mut thermostat = thermostat(0, 70.0);
        tick(&mut thermostat, 2_000);
        assert_eq!(thermostat.state().hvac(), HvacMode::Idle);

        thermostat.probe_mut().temperature = 60.0;
        thermostat.probe_mut().ready = false;
        tick(&mut thermostat, 2_000);

        assert_eq!(thermostat.state().hvac(), HvacMode::Idle);
        assert_eq!(thermostat.state().current_temp_x10, 700);
    }

    #[test]
    fn settings_update_applies_immediately() {
        let mut thermostat = thermostat(0, 69.0);
        tick(&mut thermostat, 2_000);
        assert_eq!(thermostat.state().hvac(), HvacMode::Heat);

        let mut settings = thermostat.settings().clone();
        settings.heat_enabled = false;
        assert!(thermostat.update_settings(settings.clone()));
        assert!(!thermostat.update_settings(settings));

        assert_eq!(tick(&mut thermostat, 10), Status::Ok);
        assert_eq!(thermostat.state().hvac(), HvacMode::Idle);
    }

    #[test]
    fn counter_wrap_does_not_stall_pacing() {
        let mut thermostat = thermostat(u32::MAX - 1_000, 70.0);

        assert_eq!(tick(&mut thermostat, 1_200), Status::Skipped);
        assert_eq!(tick(&mut thermostat, 400), Status::Ok);
        assert_eq!(tick(&mut thermostat, 1_501), Status::Ok);
    }

    #[test]
    fn snapshot_reports_cycle_values() {
        let mut thermostat = thermostat(0, 65.0);
        tick(&mut thermostat, 2_000);

        let status = thermostat.snapshot();
        assert_eq!(status.hvac, "HEAT");
        assert_eq!(status.fan, FanMode::On.as_str());
        assert_eq!(status.mean_temp, 65.0);
        assert_eq!(status.heat_setpoint, 69.5);
        assert_eq!(status.latched_status, "OK");
        assert_eq!(status.next_setpoint_in_min, Some(9 * 60));
        assert!(status.relays.heat);

        let history = thermostat.history_report();
        assert_eq!(history.events.len(), 1);
        assert_eq!(thermostat.state_payload().hvac, "HEAT");
    }
}
