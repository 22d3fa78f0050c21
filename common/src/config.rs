use std::{path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    types::{DisplayUnits, ThermostatMode},
};

pub const CONFIG_PATH_ENV: &str = "HESTIA_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermostatConfig {
    pub mode: ThermostatMode,
    /// Setpoint in the probe's units; the heater switches off above it.
    pub target: f32,
    /// Swing below the setpoint before the heater switches back on.
    pub variance: f32,
    pub dedupe_window_ms: u64,
    pub min_target: f32,
    pub max_target: f32,
    pub display_units: DisplayUnits,
    pub payload_heater_on: String,
    pub payload_heater_off: String,
    pub settle_on_idle: bool,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            mode: ThermostatMode::Heat,
            target: 20.0,
            variance: 1.0,
            dedupe_window_ms: 5_000,
            min_target: 2.0,
            max_target: 30.0,
            display_units: DisplayUnits::Celsius,
            payload_heater_on: "true".to_string(),
            payload_heater_off: "false".to_string(),
            settle_on_idle: true,
        }
    }
}

impl ThermostatConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.variance.is_finite() || self.variance < 0.0 {
            return Err(ConfigError::NegativeVariance(self.variance));
        }
        if self.min_target.is_nan() || self.max_target.is_nan() || self.min_target > self.max_target {
            return Err(ConfigError::EmptyTargetRange {
                min: self.min_target,
                max: self.max_target,
            });
        }
        if !(self.min_target..=self.max_target).contains(&self.target) {
            return Err(ConfigError::TargetOutOfRange {
                target: self.target,
                min: self.min_target,
                max: self.max_target,
            });
        }
        if self.dedupe_window_ms == 0 {
            return Err(ConfigError::ZeroDedupeWindow);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub client_id: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub qos: u8,
    pub keep_alive_secs: u64,
    pub base_topic: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            client_id: "hestia".to_string(),
            host: "localhost".to_string(),
            port: 1883,
            user: String::new(),
            pass: String::new(),
            qos: 1,
            keep_alive_secs: 30,
            base_topic: "hestia".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaterConfig {
    pub name: String,
    pub topic_temp_probe: String,
    pub topic_humidity_probe: String,
    pub topic_heater_switch: String,
}

impl Default for HeaterConfig {
    fn default() -> Self {
        Self {
            name: "office_heater".to_string(),
            topic_temp_probe: "office_sensor/sensor/office_temperature/state".to_string(),
            topic_humidity_probe: "office_sensor/sensor/office_humidity/state".to_string(),
            topic_heater_switch: "zwave/Office/OfficeTubPlugs/37/2/targetValue/set".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub thermostat: ThermostatConfig,
    pub mqtt: MqttConfig,
    pub heater: HeaterConfig,
    pub http_port: Option<u16>,
}

impl RuntimeConfig {
    /// Loads the optional JSON file named by `HESTIA_CONFIG`, then applies
    /// environment overrides and validates the result.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match lookup(CONFIG_PATH_ENV) {
            Some(path) if !path.is_empty() => Self::from_file(Path::new(&path))?,
            _ => Self::default(),
        };
        config.apply_env(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file_error = |reason: String| ConfigError::File {
            path: path.display().to_string(),
            reason,
        };
        let raw = std::fs::read(path).map_err(|err| file_error(err.to_string()))?;
        serde_json::from_slice(&raw).map_err(|err| file_error(err.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thermostat.validate()?;
        if self.mqtt.qos > 2 {
            return Err(ConfigError::InvalidQos(self.mqtt.qos));
        }
        Ok(())
    }

    fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let mqtt = &mut self.mqtt;
        override_string(lookup, "MQTT_CLIENT_ID", &mut mqtt.client_id);
        override_string(lookup, "MQTT_USER", &mut mqtt.user);
        override_string(lookup, "MQTT_PASSWD", &mut mqtt.pass);
        override_string(lookup, "MQTT_HOST", &mut mqtt.host);
        override_parsed(lookup, "MQTT_PORT", &mut mqtt.port)?;
        override_parsed(lookup, "MQTT_QOS", &mut mqtt.qos)?;
        override_parsed(lookup, "MQTT_TIMEOUT", &mut mqtt.keep_alive_secs)?;
        override_string(lookup, "MQTT_BASE_TOPIC", &mut mqtt.base_topic);

        let thermostat = &mut self.thermostat;
        if let Some(seconds) = parsed::<f64>(lookup, "DEDUPE_TIME")? {
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(ConfigError::InvalidEnv {
                    key: "DEDUPE_TIME",
                    value: seconds.to_string(),
                    reason: "expected a non-negative number of seconds".to_string(),
                });
            }
            thermostat.dedupe_window_ms = (seconds * 1_000.0).round() as u64;
        }
        override_parsed(lookup, "TEMP_DESIRED", &mut thermostat.target)?;
        override_parsed(lookup, "TEMP_VARIANCE", &mut thermostat.variance)?;
        override_parsed(lookup, "TEMP_MIN", &mut thermostat.min_target)?;
        override_parsed(lookup, "TEMP_MAX", &mut thermostat.max_target)?;
        override_parsed(lookup, "HEATER_MODE", &mut thermostat.mode)?;
        override_parsed(lookup, "DISPLAY_UNITS", &mut thermostat.display_units)?;
        override_parsed(lookup, "SETTLE_ON_IDLE", &mut thermostat.settle_on_idle)?;
        override_string(lookup, "PAYLOAD_HEATER_ON", &mut thermostat.payload_heater_on);
        override_string(lookup, "PAYLOAD_HEATER_OFF", &mut thermostat.payload_heater_off);

        let heater = &mut self.heater;
        override_string(lookup, "HEATER_NAME", &mut heater.name);
        override_string(lookup, "TOPIC_TEMP_PROBE", &mut heater.topic_temp_probe);
        override_string(lookup, "TOPIC_HUMIDITY_PROBE", &mut heater.topic_humidity_probe);
        override_string(lookup, "TOPIC_HEATER_SWITCH", &mut heater.topic_heater_switch);

        if let Some(port) = parsed::<u16>(lookup, "HTTP_PORT")? {
            self.http_port = Some(port);
        }
        Ok(())
    }
}

fn override_string(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut String) {
    if let Some(value) = lookup(key) {
        *slot = value;
    }
}

fn override_parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    slot: &mut T,
) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    if let Some(value) = parsed(lookup, key)? {
        *slot = value;
    }
    Ok(())
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|err| ConfigError::InvalidEnv {
            key,
            value: raw.clone(),
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = RuntimeConfig::load_with(env(&[])).unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn env_overrides_apply() {
        let config = RuntimeConfig::load_with(env(&[
            ("DEDUPE_TIME", "0.5"),
            ("HEATER_NAME", "test_heater"),
            ("MQTT_BASE_TOPIC", "test_hestia"),
            ("MQTT_PORT", "3883"),
            ("PAYLOAD_HEATER_ON", "HEATER_TURNS_ON"),
            ("TEMP_DESIRED", "20"),
            ("TEMP_MIN", "15"),
            ("TEMP_MAX", "25"),
            ("HEATER_MODE", "off"),
            ("TOPIC_TEMP_PROBE", "probe/temp"),
        ]))
        .unwrap();

        assert_eq!(config.thermostat.dedupe_window_ms, 500);
        assert_eq!(config.thermostat.mode, ThermostatMode::Off);
        assert_eq!(config.thermostat.min_target, 15.0);
        assert_eq!(config.thermostat.payload_heater_on, "HEATER_TURNS_ON");
        assert_eq!(config.heater.name, "test_heater");
        assert_eq!(config.heater.topic_temp_probe, "probe/temp");
        assert_eq!(config.mqtt.base_topic, "test_hestia");
        assert_eq!(config.mqtt.port, 3883);
    }

    #[test]
    fn negative_variance_is_rejected() {
        let err = RuntimeConfig::load_with(env(&[("TEMP_VARIANCE", "-0.5")])).unwrap_err();
        assert_eq!(err, ConfigError::NegativeVariance(-0.5));
    }

    #[test]
    fn unparsable_values_name_the_key() {
        let err = RuntimeConfig::load_with(env(&[("MQTT_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { key: "MQTT_PORT", .. }));
    }

    #[test]
    fn target_must_sit_inside_the_range() {
        let err = RuntimeConfig::load_with(env(&[("TEMP_DESIRED", "40")])).unwrap_err();
        assert!(matches!(err, ConfigError::TargetOutOfRange { .. }));
    }

    #[test]
    fn zero_dedupe_window_is_rejected() {
        let err = RuntimeConfig::load_with(env(&[("DEDUPE_TIME", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::ZeroDedupeWindow);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let parsed: RuntimeConfig =
            serde_json::from_str(r#"{"thermostat": {"target": 18.5}, "http_port": 8080}"#)
                .unwrap();

        assert_eq!(parsed.thermostat.target, 18.5);
        assert_eq!(parsed.thermostat.variance, 1.0);
        assert_eq!(parsed.http_port, Some(8080));
        assert_eq!(parsed.mqtt, MqttConfig::default());
    }

    #[test]
    fn file_is_loaded_before_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hestia.json");
        std::fs::write(
            &path,
            r#"{"thermostat": {"target": 18.5, "variance": 0.5}, "mqtt": {"port": 2883}}"#,
        )
        .unwrap();

        let config = RuntimeConfig::load_with(env(&[
            (CONFIG_PATH_ENV, path.to_str().unwrap()),
            ("TEMP_VARIANCE", "1.5"),
        ]))
        .unwrap();

        assert_eq!(config.thermostat.target, 18.5);
        assert_eq!(config.thermostat.variance, 1.5);
        assert_eq!(config.mqtt.port, 2883);
        assert_eq!(config.heater, HeaterConfig::default());
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let err = RuntimeConfig::load_with(env(&[(CONFIG_PATH_ENV, path.to_str().unwrap())]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::File { .. }));
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hestia.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = RuntimeConfig::from_file(&path).unwrap_err();
        let ConfigError::File { path: reported, .. } = &err else {
            panic!("expected a file error, got {err:?}");
        };
        assert_eq!(reported, &path.display().to_string());
    }

    #[test]
    fn file_values_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hestia.json");
        std::fs::write(&path, r#"{"thermostat": {"dedupe_window_ms": 0}}"#).unwrap();

        let err = RuntimeConfig::load_with(env(&[(CONFIG_PATH_ENV, path.to_str().unwrap())]))
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroDedupeWindow);
    }
}
