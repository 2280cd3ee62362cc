use std::time::Duration;

use anyhow::Context;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use tracing::{debug, info, warn};

use hvac_common::{TOPIC_SENSOR_GAS, TOPIC_SENSOR_HUMIDITY, TOPIC_SENSOR_STATUS, TOPIC_SENSOR_TEMP};

const PUBLISH_EVERY: Duration = Duration::from_secs(30);

/// One simulated sample set.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Reading {
    temperature_f: f32,
    humidity: f32,
    gas_resistance: u32,
}

impl Reading {
    /// Slow triangle-wave drift so the controller sees the temperature cross
    /// its tolerance band in both directions.
    fn simulated(tick: u64) -> Self {
        let phase = (tick % 40) as f32;
        let swing = if phase < 20.0 { phase } else { 40.0 - phase };

        Self {
            temperature_f: 67.0 + swing * 0.2,
            humidity: 42.0 + ((tick % 6) as f32 * 0.5),
            gas_resistance: 45_000 + (tick % 10) as u32 * 1_000,
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(1883);

    let mut mqtt_options = MqttOptions::new("hvac-sensor", mqtt_host, mqtt_port);

    if let Ok(user) = std::env::var("MQTT_USER") {
        let pass = std::env::var("MQTT_PASS").unwrap_or_default();
        mqtt_options.set_credentials(user, pass);
    }

    let (mqtt, mut eventloop) = AsyncClient::new(mqtt_options, 32);

    mqtt.publish(TOPIC_SENSOR_STATUS, QoS::AtLeastOnce, true, "online")
        .await
        .context("failed to publish sensor online status")?;

    tokio::spawn(async move {
        loop {
            if let Err(err) = eventloop.poll().await {
                warn!("sensor mqtt poll error: {err}");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    });

    info!("sensor publisher started");

    let mut tick: u64 = 0;
    let mut interval = tokio::time::interval(PUBLISH_EVERY);

    loop {
        interval.tick().await;
        tick = tick.saturating_add(1);

        let reading = Reading::simulated(tick);
        debug!("publishing {reading:?}");

        let samples = [
            (TOPIC_SENSOR_TEMP, format!("{:.1}", reading.temperature_f)),
            (TOPIC_SENSOR_HUMIDITY, format!("{:.1}", reading.humidity)),
            (TOPIC_SENSOR_GAS, reading.gas_resistance.to_string()),
        ];
        for (topic, payload) in samples {
            mqtt.publish(topic, QoS::AtLeastOnce, true, payload)
                .await
                .with_context(|| format!("failed to publish {topic}"))?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn drift_rises_then_falls() {
        let start = Reading::simulated(0);
        let peak = Reading::simulated(20);

        assert_eq!(start.temperature_f, 67.0);
        assert!((peak.temperature_f - 71.0).abs() < 0.01);
        assert_eq!(Reading::simulated(40).temperature_f, start.temperature_f);
        assert!(Reading::simulated(30).temperature_f < peak.temperature_f);
    }

    #[test]
    fn readings_stay_plausible() {
        for tick in 0..200 {
            let reading = Reading::simulated(tick);
            assert!((60.0..=75.0).contains(&reading.temperature_f));
            assert!((0.0..=100.0).contains(&reading.humidity));
            assert!(reading.gas_resistance >= 45_000);
        }
    }
}
