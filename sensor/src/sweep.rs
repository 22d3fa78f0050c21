use std::time::Duration;

use anyhow::Context;

/// Quiet time added on top of the dedupe window between two samples.
const SETTLE_MARGIN: Duration = Duration::from_millis(500);

/// How the simulated probe sweeps through temperatures and how it repeats each
/// sample the way lossy radio probes do.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub low_tenths: i32,
    pub high_tenths: i32,
    pub burst_repeats: u32,
    pub burst_spacing: Duration,
    pub sample_interval: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            low_tenths: 188,
            high_tenths: 202,
            burst_repeats: 3,
            burst_spacing: Duration::from_millis(50),
            sample_interval: Duration::from_millis(600),
        }
    }
}

impl SweepConfig {
    /// Default sweep, spaced so each burst settles under the given dedupe window.
    pub fn paced_for(dedupe_window: Duration) -> Self {
        Self {
            sample_interval: dedupe_window + SETTLE_MARGIN,
            ..Self::default()
        }
    }

    pub fn from_env(dedupe_window: Duration) -> anyhow::Result<Self> {
        let mut config = Self::paced_for(dedupe_window);
        if let Some(low) = env_parsed::<f32>("SWEEP_LOW")? {
            config.low_tenths = (low * 10.0).round() as i32;
        }
        if let Some(high) = env_parsed::<f32>("SWEEP_HIGH")? {
            config.high_tenths = (high * 10.0).round() as i32;
        }
        if let Some(repeats) = env_parsed::<u32>("BURST_REPEATS")? {
            config.burst_repeats = repeats.max(1);
        }
        if let Some(ms) = env_parsed::<u64>("BURST_SPACING_MS")? {
            config.burst_spacing = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parsed::<u64>("SAMPLE_INTERVAL_MS")? {
            config.sample_interval = Duration::from_millis(ms);
        }
        anyhow::ensure!(
            config.low_tenths <= config.high_tenths,
            "SWEEP_LOW must not exceed SWEEP_HIGH"
        );
        Ok(config)
    }

    /// One full cycle: up from the low end to the high end, then back down.
    pub fn temperatures(&self) -> Vec<f32> {
        let up = self.low_tenths..=self.high_tenths;
        let down = (self.low_tenths..=self.high_tenths).rev();
        up.chain(down).map(|tenths| tenths as f32 / 10.0).collect()
    }
}

fn env_parsed<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("invalid {key}={raw:?}")),
        Err(_) => Ok(None),
    }
}

/// Humidity drifts slowly alongside the sweep.
pub fn humidity_for(tick: u64) -> f32 {
    42.0 + ((tick % 6) as f32 * 0.5)
}
