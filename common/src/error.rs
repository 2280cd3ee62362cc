use thiserror::Error;

use crate::types::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SensorFault {
    #[error("temperature probe has no completed reading")]
    ProbeNotReady,
    #[error("climate sensor has no completed reading")]
    ClimateNotReady,
    #[error("temperature probe returned a non-finite value")]
    InvalidTemperature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CycleError {
    #[error("sensor failure: {0}")]
    SensorFail(#[from] SensorFault),
    #[error("heat and cool requested together")]
    HeatAndCool,
}

impl CycleError {
    pub fn status(&self) -> Status {
        match self {
            Self::SensorFail(_) => Status::SensorFail,
            Self::HeatAndCool => Status::HeatAndCool,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings could not be encoded or decoded: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("no settings have been stored")]
    Missing,
}
