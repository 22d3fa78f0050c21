use std::{sync::Arc, time::Duration};

use anyhow::Context;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hestia_common::{
    Clock, MonotonicClock, Publisher, RuntimeConfig, Step, ThermostatConfig, ThermostatController,
    Topics,
};

use crate::{
    api,
    publisher::{qos_from_level, MqttPublisher},
};

const MAX_MQTT_PAYLOAD_BYTES: usize = 512;
const MIN_SETTLE_INTERVAL_MS: u64 = 100;
const DEFAULT_LOG_FILTER: &str = "info";

type Controller = ThermostatController<MonotonicClock, MqttPublisher>;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(
            std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(),
        ))
        .init();

    let config = RuntimeConfig::from_env().context("invalid hestia configuration")?;
    let topics = Topics::new(&config.mqtt, &config.heater);

    info!(
        "homebridge mqttthing configuration for this heater:\n{}",
        serde_json::to_string_pretty(&homebridge_accessory(
            &config.heater.name,
            &topics,
            &config.thermostat
        ))?
    );

    let mut mqtt_options = MqttOptions::new(
        config.mqtt.client_id.clone(),
        config.mqtt.host.clone(),
        config.mqtt.port,
    );
    mqtt_options.set_keep_alive(Duration::from_secs(config.mqtt.keep_alive_secs.max(5)));
    if !config.mqtt.user.is_empty() {
        mqtt_options.set_credentials(config.mqtt.user.clone(), config.mqtt.pass.clone());
    }

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);
    let publisher = MqttPublisher::new(mqtt.clone(), topics.clone(), config.mqtt.qos);
    let controller: Arc<Controller> = Arc::new(ThermostatController::new(
        &config.thermostat,
        MonotonicClock::new(),
        publisher,
    ));

    info!(
        "controlling {} from {}: target {}, variance {}, dedupe {} ms",
        config.heater.name,
        topics.temp_probe,
        config.thermostat.target,
        config.thermostat.variance,
        config.thermostat.dedupe_window_ms
    );

    spawn_mqtt_loop(
        Arc::clone(&controller),
        topics,
        mqtt,
        config.mqtt.qos,
        eventloop,
    );
    if config.thermostat.settle_on_idle {
        spawn_settle_loop(Arc::clone(&controller));
    }

    match config.http_port {
        Some(port) => api::serve(controller, port).await?,
        None => tokio::signal::ctrl_c()
            .await
            .context("failed to listen for shutdown signal")?,
    }

    info!("hestia shutting down");
    Ok(())
}

/// `RUST_LOG` directives, or info level when unset or unparsable.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn spawn_mqtt_loop(
    controller: Arc<Controller>,
    topics: Topics,
    mqtt: AsyncClient,
    qos: u8,
    mut eventloop: rumqttc::EventLoop,
) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    handle_mqtt_message(&controller, &topics, &message.topic, &message.payload);
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                    // The event loop drains this queue, so never await on it here.
                    for topic in topics.subscriptions() {
                        if let Err(err) = mqtt.try_subscribe(topic.as_str(), qos_from_level(qos)) {
                            warn!("failed to subscribe to {topic}: {err}");
                        }
                    }
                    log_step("announce", &controller.announce());
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

/// Finalizes bursts that went quiet without waiting for the next reading.
fn spawn_settle_loop(controller: Arc<Controller>) {
    let period = settle_interval(controller.dedupe_window_ms());
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            log_step("idle settle", &controller.poll());
        }
    });
}

fn settle_interval(dedupe_window_ms: u64) -> Duration {
    Duration::from_millis((dedupe_window_ms / 4).max(MIN_SETTLE_INTERVAL_MS))
}

fn handle_mqtt_message<C: Clock, P: Publisher>(
    controller: &ThermostatController<C, P>,
    topics: &Topics,
    topic: &str,
    payload: &[u8],
) {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return;
    }
    let Ok(message) = std::str::from_utf8(payload) else {
        warn!("dropping non utf8 MQTT payload on topic {topic}");
        return;
    };
    let Some(event) = topics.route(topic, message) else {
        return;
    };

    match controller.handle(event) {
        Ok(step) => log_step(topic, &step),
        Err(err) => warn!("ignoring message on {topic}: {err}"),
    }
}

fn log_step(source: &str, step: &Step) {
    if let Some(decision) = step.decision {
        info!("{source}: heater decision {}", decision.as_str());
    }
    if !step.is_clean() {
        warn!(
            "{source}: {} notifications failed to publish",
            step.publish_failures.len()
        );
    }
}

/// Accessory block for the Homebridge `mqttthing` plugin.
fn homebridge_accessory(
    name: &str,
    topics: &Topics,
    thermostat: &ThermostatConfig,
) -> serde_json::Value {
    json!({
        "accessory": "mqttthing",
        "type": "thermostat",
        "name": name,
        "topics": {
            "getCurrentHeatingCoolingState": topics.state,
            "setTargetHeatingCoolingState": topics.state_set(),
            "getTargetHeatingCoolingState": topics.state,
            "getCurrentTemperature": topics.current_temp,
            "setTargetTemperature": topics.target_temp_set(),
            "getTargetTemperature": topics.target_temp,
            "setTemperatureDisplayUnits": topics.display_units_set(),
            "getTemperatureDisplayUnits": topics.display_units,
            "getCurrentRelativeHumidity": topics.current_humidity,
        },
        "minTemperature": thermostat.min_target,
        "maxTemperature": thermostat.max_target,
        "restrictHeatingCoolingState": [0, 1],
    })
}
