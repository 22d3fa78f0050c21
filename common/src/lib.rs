pub mod config;
pub mod error;
pub mod thermostat;
pub mod topics;
pub mod types;

pub use config::{HeaterConfig, MqttConfig, RuntimeConfig, ThermostatConfig};
pub use error::{ConfigError, ControllerError, PublishError};
pub use thermostat::{
    Clock, InboundEvent, MonotonicClock, Notification, Publisher, Step, ThermostatController,
};
pub use topics::Topics;
pub use types::{ControllerSnapshot, Decision, DisplayUnits, HeaterCommand, ThermostatMode};
