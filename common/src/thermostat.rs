use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Instant,
};

use tracing::{debug, info, warn};

use crate::{
    config::ThermostatConfig,
    error::{ControllerError, PublishError},
    types::{ControllerSnapshot, Decision, DisplayUnits, HeaterCommand, ThermostatMode},
};

const MIN_VALID_TEMP: f32 = -40.0;
const MAX_VALID_TEMP: f32 = 150.0;
/// Burst size that is reported, and again at every multiple of it.
pub const LONG_BURST_READINGS: usize = 256;

/// Monotonic time source, in milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.start
            .elapsed()
            .as_millis()
            .try_into()
            .unwrap_or(u64::MAX)
    }
}

/// Outbound status channel.
///
/// Called while the controller state is locked, so implementations must only
/// enqueue and never wait on the transport.
pub trait Publisher: Send + Sync {
    fn publish(&self, notification: &Notification) -> Result<(), PublishError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Temperature(f32),
    Humidity(f32),
    Mode(ThermostatMode),
    Target(f32),
    DisplayUnits(DisplayUnits),
    Heater {
        command: HeaterCommand,
        payload: String,
    },
}

impl Notification {
    pub fn channel(&self) -> &'static str {
        match self {
            Self::Temperature(_) => "temperature",
            Self::Humidity(_) => "humidity",
            Self::Mode(_) => "mode",
            Self::Target(_) => "target",
            Self::DisplayUnits(_) => "display units",
            Self::Heater { .. } => "heater switch",
        }
    }

    /// Wire payload, as observers expect to read it.
    pub fn payload(&self) -> String {
        match self {
            Self::Temperature(value) | Self::Humidity(value) | Self::Target(value) => {
                value.to_string()
            }
            Self::Mode(mode) => mode.as_str().to_string(),
            Self::DisplayUnits(units) => units.as_str().to_string(),
            Self::Heater { payload, .. } => payload.clone(),
        }
    }
}

/// Raw events decoded by the host from its transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    ReadingArrived(String),
    HumidityArrived(String),
    SetMode(String),
    SetTarget(String),
    SetDisplayUnits(String),
}

/// What one controller operation did besides mutating state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Step {
    /// Set when a burst settled while heating was active.
    pub decision: Option<Decision>,
    /// Notifications that failed to go out. State was committed regardless.
    pub publish_failures: Vec<PublishError>,
}

impl Step {
    pub fn is_clean(&self) -> bool {
        self.publish_failures.is_empty()
    }
}

#[derive(Debug, Clone)]
struct ControllerState {
    mode: ThermostatMode,
    target: f32,
    variance: f32,
    // Always target - variance, updated together with target.
    turn_on_below: f32,
    pending: Vec<f32>,
    last_received_ms: Option<u64>,
    latest_temp: Option<f32>,
    humidity: Option<f32>,
    display_units: DisplayUnits,
    last_action: Option<Decision>,
}

/// Two-point hysteresis controller for a single heater.
///
/// Probe readings are buffered into bursts; a burst settles once no reading
/// has arrived for longer than the dedupe window, and each settled burst is
/// reduced to its mean and yields exactly one [`Decision`]. Settling happens
/// lazily when the next reading arrives, or eagerly through [`Self::poll`]
/// when the host runs an idle timer.
///
/// A burst has no size limit: a probe that never goes quiet for longer than
/// the window keeps growing the current burst. That is logged every
/// [`LONG_BURST_READINGS`] samples.
///
/// All state lives behind one mutex. Notifications are published while that
/// lock is held so observers never see a view that mixes two mutations.
pub struct ThermostatController<C, P> {
    dedupe_window_ms: u64,
    min_target: f32,
    max_target: f32,
    payload_heater_on: String,
    payload_heater_off: String,
    clock: C,
    publisher: P,
    state: Mutex<ControllerState>,
}

impl<C: Clock, P: Publisher> ThermostatController<C, P> {
    pub fn new(config: &ThermostatConfig, clock: C, publisher: P) -> Self {
        let variance = config.variance.max(0.0);
        Self {
            dedupe_window_ms: config.dedupe_window_ms,
            min_target: config.min_target,
            max_target: config.max_target,
            payload_heater_on: config.payload_heater_on.clone(),
            payload_heater_off: config.payload_heater_off.clone(),
            clock,
            publisher,
            state: Mutex::new(ControllerState {
                mode: config.mode,
                target: config.target,
                variance,
                turn_on_below: config.target - variance,
                pending: Vec::new(),
                last_received_ms: None,
                latest_temp: None,
                humidity: None,
                display_units: config.display_units,
                last_action: None,
            }),
        }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn dedupe_window_ms(&self) -> u64 {
        self.dedupe_window_ms
    }

    /// Decodes and applies a raw inbound event.
    pub fn handle(&self, event: InboundEvent) -> Result<Step, ControllerError> {
        match event {
            InboundEvent::ReadingArrived(raw) => {
                let sample = parse_temperature(&raw)?;
                self.on_reading_arrived(sample, self.clock.now_ms())
            }
            InboundEvent::HumidityArrived(raw) => {
                let humidity = parse_humidity(&raw)?;
                Ok(self.on_humidity_arrived(humidity))
            }
            InboundEvent::SetMode(raw) => Ok(self.set_mode(raw.parse()?)),
            InboundEvent::SetTarget(raw) => {
                let target = raw
                    .trim()
                    .parse::<f32>()
                    .map_err(|_| ControllerError::InvalidTargetPayload(raw.clone()))?;
                self.set_target(target)
            }
            InboundEvent::SetDisplayUnits(raw) => Ok(self.set_display_units(raw.parse()?)),
        }
    }

    /// Records one probe sample. If the previous burst has settled by `now_ms`
    /// it is finalized first, so the returned decision belongs to that burst.
    pub fn on_reading_arrived(&self, sample: f32, now_ms: u64) -> Result<Step, ControllerError> {
        if !is_plausible_temperature(sample) {
            return Err(ControllerError::InvalidTemperaturePayload(sample.to_string()));
        }

        let mut step = Step::default();
        let mut state = self.lock();
        self.settle_locked(&mut state, now_ms, &mut step);
        state.pending.push(sample);
        state.last_received_ms = Some(now_ms);
        debug!(sample, pending = state.pending.len(), "recorded reading");
        if state.pending.len() % LONG_BURST_READINGS == 0 {
            warn!(
                "burst holds {} readings, probe publishes faster than the {} ms window",
                state.pending.len(),
                self.dedupe_window_ms
            );
        }
        Ok(step)
    }

    pub fn on_humidity_arrived(&self, humidity: f32) -> Step {
        let mut step = Step::default();
        let mut state = self.lock();
        state.humidity = Some(humidity);
        self.publish(Notification::Humidity(humidity), &mut step);
        step
    }

    /// Finalizes the pending burst if it has settled by `now_ms`.
    pub fn settle(&self, now_ms: u64) -> Step {
        let mut step = Step::default();
        let mut state = self.lock();
        self.settle_locked(&mut state, now_ms, &mut step);
        step
    }

    pub fn poll(&self) -> Step {
        self.settle(self.clock.now_ms())
    }

    pub fn set_mode(&self, mode: ThermostatMode) -> Step {
        let mut step = Step::default();
        let mut state = self.lock();
        if state.mode != mode {
            info!("mode {} -> {}", state.mode, mode);
        }
        state.mode = mode;
        if mode == ThermostatMode::Off {
            state.last_action = None;
        }
        self.publish(Notification::Mode(mode), &mut step);
        step
    }

    pub fn set_target(&self, target: f32) -> Result<Step, ControllerError> {
        if !target.is_finite() || !(self.min_target..=self.max_target).contains(&target) {
            return Err(ControllerError::TargetOutOfRange {
                value: target,
                min: self.min_target,
                max: self.max_target,
            });
        }

        let mut step = Step::default();
        let mut state = self.lock();
        state.target = target;
        state.turn_on_below = target - state.variance;
        info!(
            "target {target}, heater on below {}, off above {target}",
            state.turn_on_below
        );
        self.publish(Notification::Target(target), &mut step);
        Ok(step)
    }

    pub fn set_display_units(&self, units: DisplayUnits) -> Step {
        let mut step = Step::default();
        let mut state = self.lock();
        state.display_units = units;
        self.publish(Notification::DisplayUnits(units), &mut step);
        step
    }

    /// Publishes the full status so late observers can catch up.
    pub fn announce(&self) -> Step {
        let mut step = Step::default();
        let state = self.lock();
        self.publish_status(&state, &mut step);
        if let Some(humidity) = state.humidity {
            self.publish(Notification::Humidity(humidity), &mut step);
        }
        step
    }

    /// Decision taken for the most recently settled burst.
    pub fn action(&self) -> Option<Decision> {
        self.lock().last_action
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        let state = self.lock();
        ControllerSnapshot {
            mode: state.mode,
            target: state.target,
            variance: state.variance,
            turn_on_below: state.turn_on_below,
            current_temp: state.latest_temp,
            current_humidity: state.humidity,
            display_units: state.display_units,
            pending_readings: state.pending.len(),
            last_action: state.last_action,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle_locked(&self, state: &mut ControllerState, now_ms: u64, step: &mut Step) {
        let Some(last_received_ms) = state.last_received_ms else {
            return;
        };
        if state.pending.is_empty()
            || now_ms.saturating_sub(last_received_ms) <= self.dedupe_window_ms
        {
            return;
        }

        let sum: f64 = state.pending.iter().map(|&sample| f64::from(sample)).sum();
        let temperature = (sum / state.pending.len() as f64) as f32;
        debug!(samples = state.pending.len(), temperature, "burst settled");
        state.pending.clear();
        state.latest_temp = Some(temperature);
        self.publish_status(state, step);

        let decision = decide(state);
        state.last_action = decision;
        step.decision = decision;

        let Some(decision) = decision else {
            return;
        };
        debug!(
            "{}: temp {temperature}, on < {}, off > {}",
            decision.as_str(),
            state.turn_on_below,
            state.target
        );
        if let Some(command) = decision.command() {
            let payload = match command {
                HeaterCommand::On => self.payload_heater_on.clone(),
                HeaterCommand::Off => self.payload_heater_off.clone(),
            };
            self.publish(Notification::Heater { command, payload }, step);
        }
    }

    fn publish_status(&self, state: &ControllerState, step: &mut Step) {
        if let Some(temperature) = state.latest_temp {
            self.publish(Notification::Temperature(temperature), step);
        }
        self.publish(Notification::Mode(state.mode), step);
        self.publish(Notification::Target(state.target), step);
        self.publish(Notification::DisplayUnits(state.display_units), step);
    }

    fn publish(&self, notification: Notification, step: &mut Step) {
        if let Err(err) = self.publisher.publish(&notification) {
            warn!("{err}");
            step.publish_failures.push(err);
        }
    }
}

fn decide(state: &ControllerState) -> Option<Decision> {
    if state.mode != ThermostatMode::Heat {
        return None;
    }
    let temperature = state.latest_temp?;

    Some(if temperature < state.turn_on_below {
        Decision::TurnOn
    } else if temperature > state.target {
        Decision::TurnOff
    } else {
        Decision::NoChange
    })
}

fn is_plausible_temperature(sample: f32) -> bool {
    sample.is_finite() && (MIN_VALID_TEMP..=MAX_VALID_TEMP).contains(&sample)
}

pub fn parse_temperature(raw: &str) -> Result<f32, ControllerError> {
    raw.trim()
        .parse::<f32>()
        .ok()
        .filter(|sample| is_plausible_temperature(*sample))
        .ok_or_else(|| ControllerError::InvalidTemperaturePayload(raw.to_string()))
}

pub fn parse_humidity(raw: &str) -> Result<f32, ControllerError> {
    raw.trim()
        .parse::<f32>()
        .ok()
        .filter(|humidity| humidity.is_finite() && (0.0..=100.0).contains(humidity))
        .ok_or_else(|| ControllerError::InvalidHumidityPayload(raw.to_string()))
}
