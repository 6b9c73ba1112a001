//! Engine configuration.

use std::time::Duration;

use tracing::warn;

use stockhold_inventory::ReorderPolicy;

/// Longest hold a reservation may be given.
pub const MAX_RESERVATION_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Tunables for the engine and its sweeper runner.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// How long a new hold lives before the sweeper may expire it.
    pub reservation_ttl: Duration,
    pub sweep_interval: Duration,
    pub sweep_max_retries: u32,
    pub sweep_base_backoff: Duration,
    pub velocity_window_days: i64,
    pub cover_days: i64,
    pub reorder_trigger_ratio: f64,
    pub high_priority_ratio: f64,
    pub medium_priority_ratio: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let policy = ReorderPolicy::default();
        Self {
            reservation_ttl: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
            sweep_max_retries: 5,
            sweep_base_backoff: Duration::from_millis(250),
            velocity_window_days: policy.velocity_window_days,
            cover_days: policy.cover_days,
            reorder_trigger_ratio: policy.trigger_ratio,
            high_priority_ratio: policy.high_priority_ratio,
            medium_priority_ratio: policy.medium_priority_ratio,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `STOCKHOLD_*` environment variables.
    ///
    /// Unparsable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`EngineConfig::from_env`] with an injectable lookup (tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(secs) = parse_var::<u64>(&lookup, "STOCKHOLD_RESERVATION_TTL_SECS") {
            cfg = cfg.with_reservation_ttl(Duration::from_secs(secs));
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "STOCKHOLD_SWEEP_INTERVAL_SECS") {
            cfg = cfg.with_sweep_interval(Duration::from_secs(secs));
        }
        if let Some(n) = parse_var::<u32>(&lookup, "STOCKHOLD_SWEEP_MAX_RETRIES") {
            cfg.sweep_max_retries = n;
        }
        if let Some(days) = parse_var::<i64>(&lookup, "STOCKHOLD_VELOCITY_WINDOW_DAYS") {
            cfg.velocity_window_days = days;
        }

        cfg
    }

    /// Zero or anything above [`MAX_RESERVATION_TTL`] is logged and ignored.
    pub fn with_reservation_ttl(mut self, ttl: Duration) -> Self {
        if ttl.is_zero() || ttl > MAX_RESERVATION_TTL {
            warn!(
                ttl_secs = ttl.as_secs(),
                max_secs = MAX_RESERVATION_TTL.as_secs(),
                "ignoring out-of-range reservation ttl"
            );
        } else {
            self.reservation_ttl = ttl;
        }
        self
    }

    /// A zero interval is logged and ignored.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        if interval.is_zero() {
            warn!("ignoring zero sweep interval");
        } else {
            self.sweep_interval = interval;
        }
        self
    }

    pub fn with_sweep_retries(mut self, max_retries: u32, base_backoff: Duration) -> Self {
        self.sweep_max_retries = max_retries;
        self.sweep_base_backoff = base_backoff;
        self
    }

    pub fn with_velocity_window_days(mut self, days: i64) -> Self {
        self.velocity_window_days = days;
        self
    }

    /// TTL as a chrono duration (saturating).
    pub fn reservation_ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.reservation_ttl).unwrap_or(chrono::Duration::MAX)
    }

    pub fn reorder_policy(&self) -> ReorderPolicy {
        ReorderPolicy {
            velocity_window_days: self.velocity_window_days,
            cover_days: self.cover_days,
            trigger_ratio: self.reorder_trigger_ratio,
            high_priority_ratio: self.high_priority_ratio,
            medium_priority_ratio: self.medium_priority_ratio,
        }
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable configuration value");
            None
        }
    }
}
