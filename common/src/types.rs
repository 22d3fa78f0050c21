use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ControllerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThermostatMode {
    Off,
    Heat,
}

impl ThermostatMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Heat => "HEAT",
        }
    }
}

impl FromStr for ThermostatMode {
    type Err = ControllerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "HEAT" => Ok(Self::Heat),
            "OFF" => Ok(Self::Off),
            _ => Err(ControllerError::InvalidEnumValue {
                field: "mode",
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for ThermostatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Units observers should render temperatures in. Control always runs on the
/// raw probe values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DisplayUnits {
    Celsius,
    Fahrenheit,
}

impl DisplayUnits {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Celsius => "CELSIUS",
            Self::Fahrenheit => "FAHRENHEIT",
        }
    }
}

impl FromStr for DisplayUnits {
    type Err = ControllerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "CELSIUS" => Ok(Self::Celsius),
            "FAHRENHEIT" => Ok(Self::Fahrenheit),
            _ => Err(ControllerError::InvalidEnumValue {
                field: "display units",
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for DisplayUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tri-state outcome of a settled burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    TurnOn,
    TurnOff,
    NoChange,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TurnOn => "TURN_ON",
            Self::TurnOff => "TURN_OFF",
            Self::NoChange => "NO_CHANGE",
        }
    }

    pub fn command(self) -> Option<HeaterCommand> {
        match self {
            Self::TurnOn => Some(HeaterCommand::On),
            Self::TurnOff => Some(HeaterCommand::Off),
            Self::NoChange => None,
        }
    }
}

/// Command sent to the heater switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HeaterCommand {
    On,
    Off,
}

/// Consistent view of everything the controller exposes to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerSnapshot {
    pub mode: ThermostatMode,
    pub target: f32,
    pub variance: f32,
    #[serde(rename = "turnOnBelow")]
    pub turn_on_below: f32,
    #[serde(rename = "currentTemp")]
    pub current_temp: Option<f32>,
    #[serde(rename = "currentHumidity")]
    pub current_humidity: Option<f32>,
    #[serde(rename = "displayUnits")]
    pub display_units: DisplayUnits,
    #[serde(rename = "pendingReadings")]
    pub pending_readings: usize,
    #[serde(rename = "lastAction")]
    pub last_action: Option<Decision>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("heat".parse::<ThermostatMode>(), Ok(ThermostatMode::Heat));
        assert_eq!(" OFF\n".parse::<ThermostatMode>(), Ok(ThermostatMode::Off));
    }

    #[test]
    fn unknown_mode_is_reported() {
        assert_eq!(
            "COOL".parse::<ThermostatMode>(),
            Err(ControllerError::InvalidEnumValue {
                field: "mode",
                value: "COOL".to_string(),
            })
        );
    }

    #[test]
    fn units_round_trip_through_display() {
        for units in [DisplayUnits::Celsius, DisplayUnits::Fahrenheit] {
            assert_eq!(units.to_string().parse::<DisplayUnits>(), Ok(units));
        }
        assert!("KELVIN".parse::<DisplayUnits>().is_err());
    }

    #[test]
    fn only_switching_decisions_map_to_commands() {
        assert_eq!(Decision::TurnOn.command(), Some(HeaterCommand::On));
        assert_eq!(Decision::TurnOff.command(), Some(HeaterCommand::Off));
        assert_eq!(Decision::NoChange.command(), None);
    }
}
