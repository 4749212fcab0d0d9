//! Evaluator configuration
//!
//! ```toml
//! max_iterations = 20
//! max_custom_depth = 16
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hard cap on event-driven rounds per cycle
pub const MAX_ITERATIONS_CAP: u32 = 10_000;

/// Configuration for the hybrid evaluator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvaluatorConfig {
    /// Event-driven rounds before a cyclic subcircuit is declared oscillating
    pub max_iterations: u32,
    /// Maximum CUSTOM gate nesting depth
    pub max_custom_depth: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            max_custom_depth: 16,
        }
    }
}

impl EvaluatorConfig {
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_max_custom_depth(mut self, depth: usize) -> Self {
        self.max_custom_depth = depth;
        self
    }

    /// Parse a TOML config and validate it
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML config file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// The iteration bound is the only termination guarantee for cyclic
    /// evaluation, so it must be positive and capped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 || self.max_iterations > MAX_ITERATIONS_CAP {
            return Err(ConfigError::Invalid(format!(
                "max_iterations must be in 1..={}, got {}",
                MAX_ITERATIONS_CAP, self.max_iterations
            )));
        }
        if self.max_custom_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_custom_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
