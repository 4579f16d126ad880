use std::time::Duration;

use chrono::TimeDelta;

use crate::engine::SearchOptions;
use crate::limits::{HOLD_DURATION_MINUTES, MAX_SUGGESTED_ALTERNATIVES, MAX_TENANTS};

/// Process configuration, read from `SLOTWISE_*` environment variables.
/// Unset or unparsable values fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub metrics_port: Option<u16>,
    pub sweep_interval: Duration,
    pub max_tenants: usize,
    pub max_alternatives: usize,
    pub hold: TimeDelta,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            metrics_port: None,
            sweep_interval: Duration::from_secs(30),
            max_tenants: MAX_TENANTS,
            max_alternatives: MAX_SUGGESTED_ALTERNATIVES,
            hold: TimeDelta::minutes(HOLD_DURATION_MINUTES),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());
        let defaults = Self::default();

        Self {
            metrics_port: lookup("SLOTWISE_METRICS_PORT").and_then(|s| s.trim().parse().ok()),
            sweep_interval: parse("SLOTWISE_SWEEP_INTERVAL_SECS")
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            max_tenants: parse("SLOTWISE_MAX_TENANTS")
                .map(|n| n as usize)
                .unwrap_or(defaults.max_tenants),
            max_alternatives: parse("SLOTWISE_MAX_ALTERNATIVES")
                .map(|n| n as usize)
                .unwrap_or(defaults.max_alternatives),
            hold: parse("SLOTWISE_HOLD_MINUTES")
                .filter(|m| *m > 0)
                .and_then(|m| i64::try_from(m).ok())
                .and_then(TimeDelta::try_minutes)
                .unwrap_or(defaults.hold),
        }
    }

    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            max_alternatives: self.max_alternatives,
            step: None,
        }
    }
}
