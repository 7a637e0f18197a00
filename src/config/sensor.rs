// src/config/sensor.rs
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;
use crate::generator::WalkBounds;

fn default_frequency_hz() -> u32 {
    5
}
fn default_min() -> f64 {
    1.0
}
fn default_max() -> f64 {
    5.0
}
fn default_step() -> f64 {
    0.1
}

/// One simulated sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Unique identifier; also the name of the sensor's data queue.
    pub name: String,
    /// Readings per second.
    #[serde(default = "default_frequency_hz")]
    pub frequency_hz: u32,
    #[serde(default = "default_min")]
    pub min: f64,
    #[serde(default = "default_max")]
    pub max: f64,
    /// Largest change allowed per reading.
    #[serde(default = "default_step")]
    pub step: f64,
    /// Fixed RNG seed for reproducible walks; random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self::named("sensor")
    }
}

impl SensorConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frequency_hz: default_frequency_hz(),
            min: default_min(),
            max: default_max(),
            step: default_step(),
            seed: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        // The name is used verbatim as identifier and queue name.
        if self.name.trim() != self.name {
            return Err(ConfigError::PaddedName(self.name.clone()));
        }
        if self.frequency_hz == 0 {
            return Err(ConfigError::InvalidFrequency(self.frequency_hz));
        }
        self.bounds().validate()
    }

    pub fn bounds(&self) -> WalkBounds {
        WalkBounds {
            min: self.min,
            max: self.max,
            step_size: self.step,
        }
    }

    /// Tick period: `1000 / frequency` whole milliseconds, at least 1 ms.
    pub fn period(&self) -> Duration {
        let ms = 1000 / u64::from(self.frequency_hz.max(1));
        Duration::from_millis(ms.max(1))
    }
}
