use thiserror::Error;

/// Rejected input. The controller state is left untouched whenever one of
/// these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControllerError {
    #[error("invalid temperature payload: {0:?}")]
    InvalidTemperaturePayload(String),
    #[error("invalid humidity payload: {0:?}")]
    InvalidHumidityPayload(String),
    #[error("invalid {field} value: {value:?}")]
    InvalidEnumValue { field: &'static str, value: String },
    #[error("invalid target payload: {0:?}")]
    InvalidTargetPayload(String),
    #[error("target {value} outside {min}..={max}")]
    TargetOutOfRange { value: f32, min: f32, max: f32 },
}

/// A best-effort notification that did not make it out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("publish to {channel} failed: {reason}")]
pub struct PublishError {
    pub channel: String,
    pub reason: String,
}

impl PublishError {
    pub fn new(channel: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            channel: channel.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{key}={value:?} is not valid: {reason}")]
    InvalidEnv {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("failed to read config file {path}: {reason}")]
    File { path: String, reason: String },
    #[error("variance must be finite and non-negative, got {0}")]
    NegativeVariance(f32),
    #[error("target range {min}..={max} is empty")]
    EmptyTargetRange { min: f32, max: f32 },
    #[error("initial target {target} outside {min}..={max}")]
    TargetOutOfRange { target: f32, min: f32, max: f32 },
    #[error("dedupe window must be greater than zero")]
    ZeroDedupeWindow,
    #[error("mqtt qos must be 0, 1 or 2, got {0}")]
    InvalidQos(u8),
}
