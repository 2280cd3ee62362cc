pub const TOPIC_SENSOR_TEMP: &str = "thermostat/sensor/temperature";
pub const TOPIC_SENSOR_HUMIDITY: &str = "thermostat/sensor/humidity";
pub const TOPIC_SENSOR_GAS: &str = "thermostat/sensor/gas";
pub const TOPIC_SENSOR_STATUS: &str = "thermostat/sensor/status";

pub const TOPIC_CONTROLLER_STATE: &str = "thermostat/controller/state";
pub const TOPIC_CONTROLLER_STATUS_LINE: &str = "thermostat/controller/status_line";
