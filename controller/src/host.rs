use std::{
    collections::HashMap,
    io::ErrorKind,
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, Mutex as StdMutex},
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Serialize;
use tokio::{net::TcpListener, sync::Mutex};
use tracing::{info, warn};

use hvac_common::{
    load_or_default, Date, PersistedSettings, RuntimeConfig, SettingsStore, Status, Thermostat,
    TOPIC_CONTROLLER_STATE, TOPIC_CONTROLLER_STATUS_LINE, TOPIC_SENSOR_GAS, TOPIC_SENSOR_HUMIDITY,
    TOPIC_SENSOR_TEMP,
};

use crate::devices::{
    lock_feed, FeedRole, FeedSensor, HostClock, JsonFileStore, LoggingRelays, SensorFeed,
    SharedFeed, StatusBoard,
};

const MAX_MQTT_PAYLOAD_BYTES: usize = 512;
const CONTROL_TICK: Duration = Duration::from_millis(250);
const MAX_OVERRIDE_STEP_X10: i32 = 100;

type Controller = Thermostat<HostClock, FeedSensor, FeedSensor, LoggingRelays, StatusBoard>;

#[derive(Clone)]
struct AppState {
    thermostat: Arc<Mutex<Controller>>,
    feed: SharedFeed,
    mqtt: AsyncClient,
    store: AppStore,
}

#[derive(Clone)]
struct AppStore {
    runtime_path: Arc<PathBuf>,
    settings: JsonFileStore,
    lock: Arc<Mutex<()>>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SensorReading {
    Temperature(f32),
    Humidity(f32),
    GasResistance(u32),
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::new();
    let mut runtime = store.load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });
    apply_env_overrides(&mut runtime);
    runtime.sanitize();

    let settings = store.load_settings().await;

    let feed: SharedFeed = Arc::new(StdMutex::new(SensorFeed::default()));
    let stale_after = Duration::from_millis(runtime.sensor_stale_timeout_ms);
    let thermostat = Thermostat::new(
        HostClock::new(&runtime.timezone),
        FeedSensor::new(feed.clone(), FeedRole::Probe, stale_after),
        FeedSensor::new(feed.clone(), FeedRole::Climate, stale_after),
        LoggingRelays::default(),
        StatusBoard::default(),
        runtime.thermostat.clone(),
        settings,
    );

    let network = &runtime.network;
    let mut mqtt_options =
        MqttOptions::new("hvac-controller", network.mqtt_host.clone(), network.mqtt_port);
    if !network.mqtt_user.is_empty() {
        mqtt_options.set_credentials(network.mqtt_user.clone(), network.mqtt_pass.clone());
    }

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);

    let app_state = AppState {
        thermostat: Arc::new(Mutex::new(thermostat)),
        feed,
        mqtt,
        store,
    };

    subscribe_topics(&app_state.mqtt).await?;
    spawn_mqtt_loop(app_state.clone(), eventloop);
    spawn_control_loop(app_state.clone());
    spawn_state_publish_loop(
        app_state.clone(),
        Duration::from_millis(runtime.state_publish_interval_ms),
    );

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/status/reset", post(handle_reset_status))
        .route("/api/history", get(handle_get_history))
        .route(
            "/api/settings",
            get(handle_get_settings).put(handle_put_settings),
        )
        .route(
            "/api/override",
            post(handle_set_override).delete(handle_clear_override),
        )
        .route("/api/clock", put(handle_put_clock))
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], runtime.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn apply_env_overrides(runtime: &mut RuntimeConfig) {
    if let Ok(host) = std::env::var("MQTT_HOST") {
        runtime.network.mqtt_host = host;
    }
    if let Some(port) = env_parse::<u16>("MQTT_PORT") {
        runtime.network.mqtt_port = port;
    }
    if let Ok(user) = std::env::var("MQTT_USER") {
        runtime.network.mqtt_user = user;
    }
    if let Ok(pass) = std::env::var("MQTT_PASS") {
        runtime.network.mqtt_pass = pass;
    }
    if let Some(port) = env_parse::<u16>("CONTROLLER_HTTP_PORT") {
        runtime.http_port = port;
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|value| value.parse::<T>().ok())
}

async fn subscribe_topics(mqtt: &AsyncClient) -> anyhow::Result<()> {
    let topics = [TOPIC_SENSOR_TEMP, TOPIC_SENSOR_HUMIDITY, TOPIC_SENSOR_GAS];

    for topic in topics {
        mqtt.subscribe(topic, QoS::AtMostOnce).await?;
    }
    Ok(())
}

fn spawn_mqtt_loop(app_state: AppState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) =
                        handle_mqtt_message(&app_state, &message.topic, &message.payload)
                    {
                        warn!("mqtt message handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

fn spawn_control_loop(app_state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CONTROL_TICK);
        let mut previous = Status::Ok;

        loop {
            interval.tick().await;
            let status = app_state.thermostat.lock().await.run_once();

            if status != Status::Skipped && status != previous {
                info!("cycle status {}", status.as_str());
                previous = status;
            }
        }
    });
}

fn spawn_state_publish_loop(app_state: AppState, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;

            let (payload, status_line) = {
                let thermostat = app_state.thermostat.lock().await;
                (
                    serde_json::to_vec(&thermostat.state_payload()),
                    thermostat.display().last().to_string(),
                )
            };

            match payload {
                Ok(body) => {
                    if let Err(err) = app_state
                        .mqtt
                        .publish(TOPIC_CONTROLLER_STATE, QoS::AtLeastOnce, true, body)
                        .await
                    {
                        warn!("controller state publish failed: {err}");
                    }
                }
                Err(err) => warn!("controller state serialization failed: {err}"),
            }

            if status_line.is_empty() {
                continue;
            }
            if let Err(err) = app_state
                .mqtt
                .publish(
                    TOPIC_CONTROLLER_STATUS_LINE,
                    QoS::AtMostOnce,
                    false,
                    status_line,
                )
                .await
            {
                warn!("status line publish failed: {err}");
            }
        }
    });
}

fn handle_mqtt_message(app_state: &AppState, topic: &str, payload: &[u8]) -> anyhow::Result<()> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return Ok(());
    }

    let message = std::str::from_utf8(payload).context("non utf8 mqtt payload")?;
    let Some(reading) = parse_reading(topic, message) else {
        warn!("ignoring unusable reading {message:?} on topic {topic}");
        return Ok(());
    };

    let now = Instant::now();
    let mut feed = lock_feed(&app_state.feed);
    match reading {
        SensorReading::Temperature(value) => feed.push_temperature(value, now),
        SensorReading::Humidity(value) => feed.push_humidity(value, now),
        SensorReading::GasResistance(value) => feed.push_gas_resistance(value, now),
    }
    Ok(())
}

fn parse_reading(topic: &str, message: &str) -> Option<SensorReading> {
    let message = message.trim();
    match topic {
        TOPIC_SENSOR_TEMP => message
            .parse::<f32>()
            .ok()
            .filter(|temp| temp.is_finite() && (-40.0..=150.0).contains(temp))
            .map(SensorReading::Temperature),
        TOPIC_SENSOR_HUMIDITY => message
            .parse::<f32>()
            .ok()
            .filter(|humidity| humidity.is_finite() && (0.0..=100.0).contains(humidity))
            .map(SensorReading::Humidity),
        TOPIC_SENSOR_GAS => message
            .parse::<u32>()
            .ok()
            .map(SensorReading::GasResistance),
        _ => None,
    }
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let thermostat = state.thermostat.lock().await;
    Json(thermostat.snapshot())
}

async fn handle_get_history(State(state): State<AppState>) -> impl IntoResponse {
    let thermostat = state.thermostat.lock().await;
    Json(thermostat.history_report())
}

async fn handle_reset_status(State(state): State<AppState>) -> impl IntoResponse {
    state.thermostat.lock().await.clear_status();
    handle_get_status(State(state)).await
}

async fn handle_get_settings(State(state): State<AppState>) -> impl IntoResponse {
    let thermostat = state.thermostat.lock().await;
    Json(thermostat.settings().clone())
}

async fn handle_put_settings(
    State(state): State<AppState>,
    Json(settings): Json<PersistedSettings>,
) -> axum::response::Response {
    let (changed, applied) = {
        let mut thermostat = state.thermostat.lock().await;
        let changed = thermostat.update_settings(settings);
        (changed, thermostat.settings().clone())
    };

    if changed {
        if let Err(err) = state.store.save_settings(&applied).await {
            warn!("failed to persist settings update: {err:#}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to persist settings");
        }
    }

    Json(applied).into_response()
}

async fn handle_set_override(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let Some(value) = params.get("delta") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'delta' parameter");
    };
    let Some(delta) = parse_override_delta(value) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Invalid delta (tenths of a degree, -100 to 100)",
        );
    };

    state.thermostat.lock().await.set_override(delta);
    handle_get_status(State(state)).await.into_response()
}

fn parse_override_delta(value: &str) -> Option<i32> {
    value
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|delta| (-MAX_OVERRIDE_STEP_X10..=MAX_OVERRIDE_STEP_X10).contains(delta))
}

async fn handle_clear_override(State(state): State<AppState>) -> impl IntoResponse {
    state.thermostat.lock().await.clear_override();
    handle_get_status(State(state)).await
}

async fn handle_put_clock(
    State(state): State<AppState>,
    Json(date): Json<Date>,
) -> axum::response::Response {
    if date.hour > 23 || date.minute > 59 {
        return error_response(StatusCode::BAD_REQUEST, "Invalid time of day");
    }

    state.thermostat.lock().await.set_date(date);
    handle_get_status(State(state)).await.into_response()
}

impl AppStore {
    fn new() -> Self {
        let data_dir = std::env::var("THERMOSTAT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.thermostat"));
        Self::at(data_dir)
    }

    fn at(data_dir: PathBuf) -> Self {
        Self {
            runtime_path: Arc::new(data_dir.join("runtime.json")),
            settings: JsonFileStore::new(data_dir.join("settings.json")),
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.runtime_path.as_ref()).await {
            Ok(raw) => Ok(serde_json::from_slice::<RuntimeConfig>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn load_settings(&self) -> PersistedSettings {
        let _guard = self.lock.lock().await;
        let mut store = self.settings.clone();
        match tokio::task::spawn_blocking(move || load_or_default(&mut store)).await {
            Ok(settings) => settings,
            Err(err) => {
                warn!("settings load task failed: {err}");
                PersistedSettings::default()
            }
        }
    }

    async fn save_settings(&self, settings: &PersistedSettings) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut store = self.settings.clone();
        let settings = settings.clone();
        tokio::task::spawn_blocking(move || store.write(&settings))
            .await
            .context("settings write task failed")?
            .context("failed to write settings")
    }
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
