//! Engine configuration

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::runtime::{DEFAULT_STARTUP_QUEUE_CAPACITY, DEFAULT_STOP_TIMEOUT, DEFAULT_TICK_INTERVAL};
use crate::stores::DEFAULT_INBOX_CAPACITY;

/// Engine configuration loaded from environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Pause between two ticks of an NPC unit
    pub tick_interval: Duration,
    /// Maximum pending actions per NPC inbox
    pub inbox_capacity: usize,
    /// Maximum spawn requests held before the engine is ready
    pub startup_queue_capacity: usize,
    /// How long a stop waits for a unit before aborting it
    pub stop_timeout: Duration,
    /// How long the demo binary runs before shutting down (0 = until Ctrl+C)
    pub demo_run_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            startup_queue_capacity: DEFAULT_STARTUP_QUEUE_CAPACITY,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            demo_run_seconds: 10,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`; missing keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let parse_u64 = |key: &str, default: u64| -> Result<u64> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{key} must be a non-negative integer")),
                None => Ok(default),
            }
        };

        let tick_interval_ms = parse_u64(
            "NPC_TICK_INTERVAL_MS",
            defaults.tick_interval.as_millis() as u64,
        )?;
        if tick_interval_ms == 0 {
            anyhow::bail!("NPC_TICK_INTERVAL_MS must be greater than zero");
        }

        Ok(Self {
            tick_interval: Duration::from_millis(tick_interval_ms),
            inbox_capacity: parse_u64("NPC_INBOX_CAPACITY", defaults.inbox_capacity as u64)?
                .max(1) as usize,
            startup_queue_capacity: parse_u64(
                "NPC_STARTUP_QUEUE_CAPACITY",
                defaults.startup_queue_capacity as u64,
            )?
            .max(1) as usize,
            stop_timeout: Duration::from_millis(parse_u64(
                "NPC_STOP_TIMEOUT_MS",
                defaults.stop_timeout.as_millis() as u64,
            )?),
            demo_run_seconds: parse_u64("NPC_DEMO_RUN_SECONDS", defaults.demo_run_seconds)?,
        })
    }
}
