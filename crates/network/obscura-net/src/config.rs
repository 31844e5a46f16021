//! Overlay configuration

use crate::error::{ObscuraError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Most decoys a DTN batch may carry per real fragment.
pub const MAX_DUMMY_RATIO: f64 = 10.0;

/// Top-level configuration for a node and its routers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObscuraConfig {
    pub admission: AdmissionConfig,
    pub routing: RoutingConfig,
    /// Default `tracing` directive when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for ObscuraConfig {
    fn default() -> Self {
        Self {
            admission: AdmissionConfig::default(),
            routing: RoutingConfig::default(),
            log_filter: "info".to_string(),
        }
    }
}

/// Adaptive puzzle parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    pub initial_difficulty: u32,
    pub min_difficulty: u32,
    pub max_difficulty: u32,
    /// Ceiling applied when raising difficulty for congestion alone
    pub congested_cap: u32,
    pub attack_step: u32,
    pub congestion_step: u32,
    /// Length of the random seed mixed into each puzzle
    pub seed_length: usize,
    /// Challenge text a relay issues before forwarding
    pub relay_challenge: String,
    /// Upper bound on a background solve before it is cancelled
    #[serde(with = "duration_secs")]
    pub solve_timeout: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            initial_difficulty: 4,
            min_difficulty: 2,
            max_difficulty: 10,
            congested_cap: 8,
            attack_step: 2,
            congestion_step: 1,
            seed_length: 8,
            relay_challenge: "forward packet".to_string(),
            solve_timeout: Duration::from_secs(30),
        }
    }
}

/// Routing strategy parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub low_latency_max_bytes: usize,
    pub dtn_fragment_size: usize,
    pub dtn_dummy_ratio: f64,
    pub dummy_min_bytes: usize,
    pub dummy_max_bytes: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            low_latency_max_bytes: 512,
            dtn_fragment_size: 256,
            dtn_dummy_ratio: 0.3,
            dummy_min_bytes: 128,
            dummy_max_bytes: 256,
        }
    }
}

impl ObscuraConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: ObscuraConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_initial_difficulty(mut self, difficulty: u32) -> Self {
        self.admission.initial_difficulty = difficulty;
        self
    }

    pub fn with_solve_timeout(mut self, timeout: Duration) -> Self {
        self.admission.solve_timeout = timeout;
        self
    }

    pub fn with_fragment_size(mut self, size: usize) -> Self {
        self.routing.dtn_fragment_size = size;
        self
    }

    pub fn with_dummy_ratio(mut self, ratio: f64) -> Self {
        self.routing.dtn_dummy_ratio = ratio;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.admission.validate()?;
        self.routing.validate()
    }
}

impl AdmissionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_difficulty > self.max_difficulty {
            return Err(ObscuraError::Configuration(format!(
                "min_difficulty {} exceeds max_difficulty {}",
                self.min_difficulty, self.max_difficulty
            )));
        }
        if !(self.min_difficulty..=self.max_difficulty).contains(&self.initial_difficulty) {
            return Err(ObscuraError::Configuration(format!(
                "initial_difficulty {} outside [{}, {}]",
                self.initial_difficulty, self.min_difficulty, self.max_difficulty
            )));
        }
        if !(self.min_difficulty..=self.max_difficulty).contains(&self.congested_cap) {
            return Err(ObscuraError::Configuration(format!(
                "congested_cap {} outside [{}, {}]",
                self.congested_cap, self.min_difficulty, self.max_difficulty
            )));
        }
        // sha3-256 hex digests are 64 characters long
        if self.max_difficulty > 64 {
            return Err(ObscuraError::Configuration(
                "max_difficulty cannot exceed the 64 hex digits of a digest".to_string(),
            ));
        }
        if self.seed_length == 0 {
            return Err(ObscuraError::Configuration("seed_length must be positive".to_string()));
        }
        Ok(())
    }
}

impl RoutingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dtn_fragment_size == 0 {
            return Err(ObscuraError::Configuration(
                "dtn_fragment_size must be positive".to_string(),
            ));
        }
        check_dummy_ratio(self.dtn_dummy_ratio)?;
        if self.dummy_min_bytes > self.dummy_max_bytes {
            return Err(ObscuraError::Configuration(format!(
                "dummy_min_bytes {} exceeds dummy_max_bytes {}",
                self.dummy_min_bytes, self.dummy_max_bytes
            )));
        }
        Ok(())
    }
}

pub(crate) fn check_dummy_ratio(ratio: f64) -> Result<()> {
    if !(0.0..=MAX_DUMMY_RATIO).contains(&ratio) {
        return Err(ObscuraError::Configuration(format!(
            "dtn_dummy_ratio {} outside [0, {}]",
            ratio, MAX_DUMMY_RATIO
        )));
    }
    Ok(())
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
