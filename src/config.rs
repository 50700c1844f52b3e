use std::str::FromStr;
use std::time::Duration;

use crate::model::Ms;

/// How a reservation's duration is turned into billable hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BillingMode {
    /// Exact duration in hours, rounded to cents.
    #[default]
    Fractional,
    /// Whole hours only; partial hours are dropped.
    WholeHours,
}

impl FromStr for BillingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fractional" => Ok(BillingMode::Fractional),
            "whole_hours" | "truncate" => Ok(BillingMode::WholeHours),
            other => Err(format!("unknown billing mode: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub billing: BillingMode,
    /// How long a `Held` reservation waits for payment. `None` keeps holds forever.
    pub hold_ttl_ms: Option<Ms>,
    /// Bound on optimistic commit attempts inside one `reserve`.
    pub max_commit_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            billing: BillingMode::Fractional,
            hold_ttl_ms: Some(15 * 60_000),
            max_commit_attempts: 8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub max_connections: usize,
    pub metrics_port: Option<u16>,
    pub reaper_interval: Duration,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 5480,
            max_connections: 256,
            metrics_port: None,
            reaper_interval: Duration::from_secs(5),
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read `PARKLINE_*` variables. Unset or unparseable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());
        let defaults = ServerConfig::default();

        let hold_ttl_ms = match parsed("PARKLINE_HOLD_TTL_SECS") {
            Some(0) => None,
            Some(secs) => Ms::try_from(secs)
                .ok()
                .and_then(|s| s.checked_mul(1000))
                .or(defaults.engine.hold_ttl_ms),
            None => defaults.engine.hold_ttl_ms,
        };
        let billing = lookup("PARKLINE_BILLING")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.engine.billing);

        Self {
            bind: lookup("PARKLINE_BIND").unwrap_or(defaults.bind),
            port: lookup("PARKLINE_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            max_connections: parsed("PARKLINE_MAX_CONNECTIONS")
                .map(|n| n as usize)
                .unwrap_or(defaults.max_connections),
            metrics_port: lookup("PARKLINE_METRICS_PORT").and_then(|s| s.parse().ok()),
            reaper_interval: parsed("PARKLINE_REAPER_INTERVAL_SECS")
                .filter(|&secs| secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.reaper_interval),
            engine: EngineConfig {
                billing,
                hold_ttl_ms,
                ..defaults.engine
            },
        }
    }
}
