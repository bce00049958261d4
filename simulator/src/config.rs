use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use controller::ConfigError;
use prelude::*;

/// Full run configuration: simulation-level fields plus the controller's
/// own section. Loaded once, validated, then immutable for the run.
#[derive(Clone, Debug, Deserialize)]
pub struct RunConfig {
    /// Total simulation steps.
    pub sim_time: u32,
    /// Sampling period [s].
    pub Ts: float,
    /// Initial pose (x, y, θ).
    pub x0: [float; 3],
    /// Standard deviation of additive process noise; 0 disables it.
    #[serde(default)]
    pub process_noise: float,
    #[serde(default = "default_seed")]
    pub seed: u64,
    pub controller: controller::Config,
}

fn default_seed() -> u64 {
    99
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unable to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to deserialise config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<RunConfig, LoadError> {
        let mut config_str = String::new();
        File::open(path)?.read_to_string(&mut config_str)?;
        let config: RunConfig = toml::from_str(&config_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sim_time == 0 {
            return Err(ConfigError::ZeroSimTime);
        }
        if self.Ts <= 0.0 {
            return Err(ConfigError::ZeroSamplingPeriod(self.Ts));
        }
        if self.process_noise < 0.0 {
            return Err(ConfigError::BadProcessNoise(self.process_noise));
        }
        self.controller.validate()
    }

    pub fn initial_state(&self) -> Vector3 {
        Vector3::new(self.x0[0], self.x0[1], self.x0[2])
    }
}
