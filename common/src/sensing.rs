use tracing::debug;

use crate::{
    config::ThermostatConfig,
    error::SensorFault,
    iaq::iaq_score,
    ports::Sensor,
    schedule::MAX_SETPOINT_X10,
    state::CycleState,
};

pub const TEMPERATURE_WINDOW: usize = 8;

/// Running mean over the last `N` samples. Until the window fills, the mean
/// covers only the samples seen so far.
#[derive(Debug, Clone)]
pub struct MovingAverage<const N: usize> {
    window: [i32; N],
    sum: i32,
    index: usize,
    filled: bool,
}

impl<const N: usize> Default for MovingAverage<N> {
    fn default() -> Self {
        Self {
            window: [0; N],
            sum: 0,
            index: 0,
            filled: false,
        }
    }
}

impl<const N: usize> MovingAverage<N> {
    pub fn push(&mut self, sample: i32) -> i32 {
        if self.filled {
            self.sum -= self.window[self.index];
        }
        self.window[self.index] = sample;
        self.sum += sample;
        if self.index == N - 1 {
            self.filled = true;
        }
        self.index = (self.index + 1) % N;

        self.mean().unwrap_or(sample)
    }

    pub fn mean(&self) -> Option<i32> {
        let count = if self.filled { N } else { self.index };
        (count > 0).then(|| self.sum / count as i32)
    }
}

/// Sensor acquisition stage: collects the readings requested on the previous
/// cycle, smooths the probe temperature and starts the next requests.
#[derive(Debug, Clone)]
pub struct SensorStage {
    average: MovingAverage<TEMPERATURE_WINDOW>,
    gas_sample_every_cycles: u32,
    cycles: u32,
    gas_heater_on: bool,
}

impl SensorStage {
    pub fn new(config: &ThermostatConfig) -> Self {
        Self {
            average: MovingAverage::default(),
            gas_sample_every_cycles: config.gas_sample_every_cycles.max(1),
            cycles: 0,
            gas_heater_on: false,
        }
    }

    /// Issues the first requests so a reading is ready by the first cycle.
    pub fn prime<P: Sensor, E: Sensor>(&mut self, probe: &mut P, climate: &mut E) {
        probe.start_request_async();
        climate.start_request_async();
    }

    pub fn run<P: Sensor, E: Sensor>(
        &mut self,
        state: &mut CycleState,
        probe: &mut P,
        climate: &mut E,
    ) -> Result<(), SensorFault> {
        let probe_ready = probe.end_reading();
        let climate_ready = climate.end_reading();
        if !(probe_ready && climate_ready) {
            // A pending request stays outstanding; a collected one is renewed.
            if probe_ready {
                probe.start_request_async();
            }
            if climate_ready {
                climate.start_request_async();
            }
            return Err(if probe_ready {
                SensorFault::ClimateNotReady
            } else {
                SensorFault::ProbeNotReady
            });
        }

        let temperature = probe.temperature();
        let humidity = climate.humidity();
        let secondary = climate.temperature();

        if self.gas_heater_on {
            let resistance = climate.gas_resistance();
            let score = iaq_score(humidity, resistance);
            debug!("gas resistance {resistance} ohm, air quality {score:.1}");
            state.air_quality_score = Some(score);
            climate.enable_gas_heater(false);
            self.gas_heater_on = false;
        } else if self.cycles % self.gas_sample_every_cycles == 0 {
            climate.enable_gas_heater(true);
            self.gas_heater_on = true;
        }
        self.cycles = self.cycles.wrapping_add(1);

        probe.start_request_async();
        climate.start_request_async();

        if !temperature.is_finite() {
            return Err(SensorFault::InvalidTemperature);
        }

        let current = to_x10(temperature);
        state.current_temp_x10 = current;
        if secondary.is_finite() {
            state.secondary_temp_x10 = to_x10(secondary);
        }
        if humidity.is_finite() {
            state.humidity = humidity.clamp(0.0, 100.0);
        }
        state.mean_temp_x10 = self.average.push(current);

        Ok(())
    }
}

/// Degrees to tenths, limited to +/-99.9.
fn to_x10(degrees: f32) -> i32 {
    ((degrees * 10.0).round() as i32).clamp(-MAX_SETPOINT_X10, MAX_SETPOINT_X10)
}
