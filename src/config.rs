// src/config.rs

use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::constants::{EXPLORER_RESTART_ATTEMPTS, EXPLORER_RESTART_DELAY_MS};

/// Runtime knobs for the engine. Every field has a default, so an empty JSON
/// object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Whether reads go through the compatibility-filtered view.
    pub filter_enabled: bool,
    /// How many times to poll for the shell after killing it.
    pub explorer_restart_attempts: u32,
    /// Delay between shell respawn polls, in milliseconds.
    pub explorer_restart_delay_ms: u64,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `tweak_engine=debug`.
    pub level: String,
    pub with_target: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            filter_enabled: true,
            explorer_restart_attempts: EXPLORER_RESTART_ATTEMPTS,
            explorer_restart_delay_ms: EXPLORER_RESTART_DELAY_MS,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: false,
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from JSON text.
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("Failed to parse engine configuration")
    }

    pub fn explorer_restart_delay(&self) -> Duration {
        Duration::from_millis(self.explorer_restart_delay_ms)
    }
}
