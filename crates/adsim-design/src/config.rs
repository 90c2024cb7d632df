//! Run configuration
//!
//! A [`RunConfig`] is the full, explicit input of one simulation run:
//! generation parameters, per-channel transforms with a shared window length,
//! and the outcome composition. Validation happens up front, before any
//! series is simulated.

use std::collections::HashSet;
use std::path::Path;

use adsim_series::{ArmaSpec, Calendar, Channel, ChannelSpec};
use adsim_transforms::{CarryoverParams, ShapeParams};
use serde::{Deserialize, Serialize};

use crate::{DesignError, Result};

/// Series generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Number of simulated periods n
    pub periods: usize,
    /// Run seed; every random stream is derived from it
    pub seed: u64,
    /// Start date and period spacing
    pub calendar: Calendar,
    /// Exposure generation per channel
    pub channels: Vec<ChannelSpec>,
    /// Control series, simulated as ARMA processes (price first)
    pub controls: Vec<ArmaSpec>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            periods: 104,
            seed: 42,
            calendar: Calendar::default(),
            channels: vec![
                ChannelSpec::new(Channel::Tv, 1.0, 0.15, 0.3),
                ChannelSpec::new(Channel::Radio, 0.8, 0.3, 0.2),
                ChannelSpec::new(Channel::Online, 1.2, 0.08, 0.4),
            ],
            controls: vec![ArmaSpec::default()],
        }
    }
}

/// Ground-truth transform parameters of one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelTransform {
    /// Channel the parameters belong to
    pub channel: Channel,
    /// Carryover parameters
    pub carryover: CarryoverParams,
    /// Saturation parameters
    pub shape: ShapeParams,
}

/// Transform settings with a window length shared across channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Shared trailing window length L
    pub window: usize,
    /// Per-channel parameters
    pub channels: Vec<ChannelTransform>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        let window = 13;
        Self {
            window,
            channels: vec![
                ChannelTransform {
                    channel: Channel::Tv,
                    carryover: CarryoverParams::delayed(0.7, 2.0, window),
                    shape: ShapeParams::with_fixed_slope(0.5, 1.5),
                },
                ChannelTransform {
                    channel: Channel::Radio,
                    carryover: CarryoverParams::geometric(0.5, window),
                    shape: ShapeParams::with_fixed_slope(0.4, 0.8),
                },
                ChannelTransform {
                    channel: Channel::Online,
                    carryover: CarryoverParams::geometric(0.3, window),
                    shape: ShapeParams::with_fixed_slope(0.6, 1.0),
                },
            ],
        }
    }
}

/// Outcome noise distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NoiseSpec {
    /// No noise
    None,
    /// Independent N(0, std_dev^2) draws per period
    Gaussian {
        /// Standard deviation
        std_dev: f64,
    },
}

impl NoiseSpec {
    /// Standard deviation of the noise (0 for `None`).
    pub const fn std_dev(&self) -> f64 {
        match self {
            Self::None => 0.0,
            Self::Gaussian { std_dev } => *std_dev,
        }
    }
}

/// Outcome composition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    /// Intercept τ
    pub intercept: f64,
    /// Coefficient γ_k per control series
    pub control_coefficients: Vec<f64>,
    /// Outcome noise
    pub noise: NoiseSpec,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            intercept: 2.0,
            control_coefficients: vec![-0.3],
            noise: NoiseSpec::Gaussian { std_dev: 0.05 },
        }
    }
}

/// Complete configuration of one run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Series generation
    pub generation: GenerationConfig,
    /// Carryover and saturation
    pub transform: TransformConfig,
    /// Outcome composition
    pub composition: CompositionConfig,
}

impl RunConfig {
    /// Parse a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Pretty JSON representation.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Replace the run seed.
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.generation.seed = seed;
        self
    }

    /// Replace the number of periods.
    pub const fn with_periods(mut self, periods: usize) -> Self {
        self.generation.periods = periods;
        self
    }

    /// Replace the shared window length on every channel.
    pub fn with_window(mut self, window: usize) -> Self {
        self.transform.window = window;
        for t in &mut self.transform.channels {
            t.carryover.window = window;
        }
        self
    }

    /// Channels in generation order.
    pub fn channels(&self) -> Vec<Channel> {
        self.generation.channels.iter().map(|c| c.channel).collect()
    }

    /// Transform parameters of `channel`.
    pub fn transform_for(&self, channel: Channel) -> Option<&ChannelTransform> {
        self.transform
            .channels
            .iter()
            .find(|t| t.channel == channel)
    }

    /// Validate every section. Fails before anything is simulated.
    pub fn validate(&self) -> Result<()> {
        let generation = &self.generation;
        if generation.periods == 0 {
            return Err(DesignError::Config(
                "Number of periods must be >= 1".to_string(),
            ));
        }
        if generation.channels.is_empty() {
            return Err(DesignError::Config(
                "At least one channel is required".to_string(),
            ));
        }
        for spec in &generation.channels {
            spec.validate()?;
        }
        for control in &generation.controls {
            control.validate()?;
        }

        let generated = unique_channels(generation.channels.iter().map(|c| c.channel))?;
        let transformed = unique_channels(self.transform.channels.iter().map(|t| t.channel))?;
        if generated != transformed {
            return Err(DesignError::Config(format!(
                "Generated channels {:?} do not match transformed channels {:?}",
                sorted(&generated),
                sorted(&transformed)
            )));
        }

        if self.transform.window == 0 {
            return Err(DesignError::Config(
                "Window length must be >= 1".to_string(),
            ));
        }
        for t in &self.transform.channels {
            t.carryover.validate()?;
            t.shape.validate()?;
            if t.carryover.window != self.transform.window {
                return Err(DesignError::Config(format!(
                    "{}: window {} differs from shared window {}",
                    t.channel, t.carryover.window, self.transform.window
                )));
            }
        }

        let composition = &self.composition;
        if composition.control_coefficients.len() != generation.controls.len() {
            return Err(DesignError::shape(
                "control coefficients",
                generation.controls.len(),
                composition.control_coefficients.len(),
            ));
        }
        if !composition.intercept.is_finite()
            || composition.control_coefficients.iter().any(|g| !g.is_finite())
        {
            return Err(DesignError::Config(
                "Intercept and control coefficients must be finite".to_string(),
            ));
        }
        let sd = composition.noise.std_dev();
        if !sd.is_finite() || sd < 0.0 {
            return Err(DesignError::Config(format!(
                "Noise standard deviation must be finite and >= 0, got {sd}"
            )));
        }
        Ok(())
    }
}

fn unique_channels(channels: impl Iterator<Item = Channel>) -> Result<HashSet<Channel>> {
    let mut seen = HashSet::new();
    for channel in channels {
        if !seen.insert(channel) {
            return Err(DesignError::Config(format!("Duplicate channel: {channel}")));
        }
    }
    Ok(seen)
}

fn sorted(channels: &HashSet<Channel>) -> Vec<Channel> {
    let mut out: Vec<_> = channels.iter().copied().collect();
    out.sort();
    out
}
