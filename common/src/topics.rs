use crate::{
    config::{HeaterConfig, MqttConfig},
    thermostat::InboundEvent,
};

pub const SET_SUFFIX: &str = "/set";

/// Every topic one heater instance reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub heater: String,
    /// Mode, `OFF` or `HEAT`.
    pub state: String,
    pub target_temp: String,
    pub current_temp: String,
    pub current_humidity: String,
    pub display_units: String,
    pub temp_probe: String,
    pub humidity_probe: String,
    pub heater_switch: String,
}

impl Topics {
    pub fn new(mqtt: &MqttConfig, heater: &HeaterConfig) -> Self {
        let base = format!(
            "{}/{}",
            mqtt.base_topic.trim_end_matches('/'),
            heater.name
        );
        Self {
            state: format!("{base}/state"),
            target_temp: format!("{base}/target_C"),
            current_temp: format!("{base}/current_C"),
            current_humidity: format!("{base}/humidity"),
            display_units: format!("{base}/display_units"),
            temp_probe: heater.topic_temp_probe.clone(),
            humidity_probe: heater.topic_humidity_probe.clone(),
            heater_switch: heater.topic_heater_switch.clone(),
            heater: base,
        }
    }

    pub fn state_set(&self) -> String {
        format!("{}{SET_SUFFIX}", self.state)
    }

    pub fn target_temp_set(&self) -> String {
        format!("{}{SET_SUFFIX}", self.target_temp)
    }

    pub fn display_units_set(&self) -> String {
        format!("{}{SET_SUFFIX}", self.display_units)
    }

    /// Topics the host has to subscribe to.
    pub fn subscriptions(&self) -> Vec<String> {
        vec![
            self.temp_probe.clone(),
            self.humidity_probe.clone(),
            self.state_set(),
            self.target_temp_set(),
            self.display_units_set(),
        ]
    }

    /// Maps an incoming message onto the controller event it carries, if any.
    pub fn route(&self, topic: &str, payload: &str) -> Option<InboundEvent> {
        let payload = payload.to_string();
        if topic == self.temp_probe {
            return Some(InboundEvent::ReadingArrived(payload));
        }
        if topic == self.humidity_probe {
            return Some(InboundEvent::HumidityArrived(payload));
        }

        let command = topic.strip_suffix(SET_SUFFIX)?;
        if command == self.state {
            Some(InboundEvent::SetMode(payload))
        } else if command == self.target_temp {
            Some(InboundEvent::SetTarget(payload))
        } else if command == self.display_units {
            Some(InboundEvent::SetDisplayUnits(payload))
        } else {
            None
        }
    }
}
