use rumqttc::{AsyncClient, QoS};

use hestia_common::{Notification, PublishError, Publisher, Topics};

/// Publishes controller notifications on the heater's MQTT topics.
///
/// Uses the client's non-blocking queue; a full queue or a dead event loop is
/// reported back as a [`PublishError`].
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
    topics: Topics,
    qos: QoS,
}

impl MqttPublisher {
    pub fn new(client: AsyncClient, topics: Topics, qos: u8) -> Self {
        Self {
            client,
            topics,
            qos: qos_from_level(qos),
        }
    }

    fn topic_for(&self, notification: &Notification) -> &str {
        match notification {
            Notification::Temperature(_) => &self.topics.current_temp,
            Notification::Humidity(_) => &self.topics.current_humidity,
            Notification::Mode(_) => &self.topics.state,
            Notification::Target(_) => &self.topics.target_temp,
            Notification::DisplayUnits(_) => &self.topics.display_units,
            Notification::Heater { .. } => &self.topics.heater_switch,
        }
    }
}

impl Publisher for MqttPublisher {
    fn publish(&self, notification: &Notification) -> Result<(), PublishError> {
        let topic = self.topic_for(notification);
        // Switch commands are one-shot; everything else is status and retained.
        let retain = !matches!(notification, Notification::Heater { .. });
        self.client
            .try_publish(topic, self.qos, retain, notification.payload())
            .map_err(|err| PublishError::new(notification.channel(), format!("{topic}: {err}")))
    }
}

pub fn qos_from_level(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

#[cfg(test)]
mod tests {
    use hestia_common::{DisplayUnits, HeaterCommand, HeaterConfig, MqttConfig};
    use rumqttc::MqttOptions;

    use super::*;

    fn topics() -> Topics {
        Topics::new(&MqttConfig::default(), &HeaterConfig::default())
    }

    #[tokio::test]
    async fn maps_notifications_to_topics() {
        let (client, _eventloop) =
            AsyncClient::new(MqttOptions::new("test", "localhost", 1883), 8);
        let publisher = MqttPublisher::new(client, topics(), 1);

        assert_eq!(
            publisher.topic_for(&Notification::Temperature(19.5)),
            "hestia/office_heater/current_C"
        );
        assert_eq!(
            publisher.topic_for(&Notification::DisplayUnits(DisplayUnits::Celsius)),
            "hestia/office_heater/display_units"
        );
        assert_eq!(
            publisher.topic_for(&Notification::Heater {
                command: HeaterCommand::On,
                payload: "true".to_string(),
            }),
            "zwave/Office/OfficeTubPlugs/37/2/targetValue/set"
        );
    }

    #[tokio::test]
    async fn full_queue_is_reported() {
        let (client, _eventloop) =
            AsyncClient::new(MqttOptions::new("test", "localhost", 1883), 1);
        let publisher = MqttPublisher::new(client, topics(), 0);

        assert!(publisher.publish(&Notification::Target(20.0)).is_ok());
        let err = publisher
            .publish(&Notification::Target(21.0))
            .unwrap_err();
        assert_eq!(err.channel, "target");
        assert!(err.reason.starts_with("hestia/office_heater/target_C: "));
    }

    #[test]
    fn qos_levels_map_to_rumqttc() {
        assert_eq!(qos_from_level(0), QoS::AtMostOnce);
        assert_eq!(qos_from_level(1), QoS::AtLeastOnce);
        assert_eq!(qos_from_level(2), QoS::ExactlyOnce);
    }
}
