use std::time::Duration;

use anyhow::Context;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use tracing::{info, warn};

use hestia_common::RuntimeConfig;

use crate::sweep::{humidity_for, SweepConfig};

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = RuntimeConfig::from_env().context("invalid hestia configuration")?;
    let dedupe_window = Duration::from_millis(config.thermostat.dedupe_window_ms);
    let sweep = SweepConfig::from_env(dedupe_window)?;
    if sweep.sample_interval <= dedupe_window {
        warn!(
            "sample interval {:?} does not exceed the {:?} dedupe window, bursts will merge",
            sweep.sample_interval, dedupe_window
        );
    }

    let mut mqtt_options = MqttOptions::new(
        format!("{}-sensor", config.mqtt.client_id),
        config.mqtt.host.clone(),
        config.mqtt.port,
    );
    if !config.mqtt.user.is_empty() {
        mqtt_options.set_credentials(config.mqtt.user.clone(), config.mqtt.pass.clone());
    }

    let (mqtt, mut eventloop) = AsyncClient::new(mqtt_options, 32);

    tokio::spawn(async move {
        loop {
            if let Err(err) = eventloop.poll().await {
                warn!("sensor mqtt poll error: {err}");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    });

    info!(
        "sensor publishing to {} in bursts of {}",
        config.heater.topic_temp_probe, sweep.burst_repeats
    );

    let mut tick: u64 = 0;
    loop {
        for temperature in sweep.temperatures() {
            tick = tick.saturating_add(1);
            let temp_payload = format!("{temperature:.1}");

            for repeat in 0..sweep.burst_repeats {
                if repeat > 0 {
                    tokio::time::sleep(sweep.burst_spacing).await;
                }
                mqtt.publish(
                    config.heater.topic_temp_probe.as_str(),
                    QoS::AtLeastOnce,
                    false,
                    temp_payload.clone(),
                )
                .await
                .context("failed to publish sensor temperature")?;
            }

            mqtt.publish(
                config.heater.topic_humidity_probe.as_str(),
                QoS::AtLeastOnce,
                false,
                format!("{:.1}", humidity_for(tick)),
            )
            .await
            .context("failed to publish sensor humidity")?;

            info!("sent temperature {temp_payload}");
            tokio::time::sleep(sweep.sample_interval).await;
        }
    }
}
