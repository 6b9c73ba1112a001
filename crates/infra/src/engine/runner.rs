use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use super::sweeper::{ExpirySweeper, SweepReport};
use crate::config::EngineConfig;

/// Config for the background expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpirySweeperRunner {
    pub interval: Duration,
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for ExpirySweeperRunner {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Runner statistics, readable while it runs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweeperStats {
    pub runs: u64,
    pub total_expired: u64,
    pub failed_runs: u64,
    pub last_report: Option<SweepReport>,
    pub last_error: Option<String>,
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Handle for the running sweeper (shutdown + trigger hook).
#[derive(Debug)]
pub struct ExpirySweeperHandle {
    shutdown: mpsc::Sender<()>,
    trigger: mpsc::SyncSender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<SweeperStats>>,
}

impl ExpirySweeperHandle {
    /// Request a sweep now. Triggers coalesce: if one is already pending this
    /// is a no-op.
    pub fn trigger(&self) {
        let _ = self.trigger.try_send(());
    }

    pub fn stats(&self) -> SweeperStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Gracefully stop the runner thread.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

impl ExpirySweeperRunner {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            interval: config.sweep_interval,
            max_retries: config.sweep_max_retries,
            base_backoff: config.sweep_base_backoff,
        }
    }

    /// Spawn the sweeper thread.
    ///
    /// - Schedule: sweeps every `interval` on a stable cadence, plus once at startup
    /// - Trigger: `handle.trigger()` requests an immediate sweep
    /// - Failures: retried with bounded exponential backoff; after
    ///   `max_retries` the failure is logged at error level and the runner
    ///   waits for the next tick
    pub fn spawn(&self, sweeper: ExpirySweeper) -> std::io::Result<ExpirySweeperHandle> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let (trigger_tx, trigger_rx) = mpsc::sync_channel::<()>(1);
        let stats = Arc::new(Mutex::new(SweeperStats::default()));

        let cfg = self.clone();
        let thread_stats = stats.clone();
        let join = thread::Builder::new()
            .name("expiry-sweeper".to_string())
            .spawn(move || runner_loop(cfg, sweeper, shutdown_rx, trigger_rx, thread_stats))?;

        Ok(ExpirySweeperHandle {
            shutdown: shutdown_tx,
            trigger: trigger_tx,
            join: Some(join),
            stats,
        })
    }
}

fn runner_loop(
    cfg: ExpirySweeperRunner,
    sweeper: ExpirySweeper,
    shutdown_rx: mpsc::Receiver<()>,
    trigger_rx: mpsc::Receiver<()>,
    stats: Arc<Mutex<SweeperStats>>,
) {
    info!(interval_secs = cfg.interval.as_secs(), "expiry sweeper started");

    let mut next_tick = Instant::now() + cfg.interval;
    let mut pending = true; // run once on startup
    let mut failures: u32 = 0;
    let mut backoff_until: Option<Instant> = None;

    loop {
        // Shutdown has priority.
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        let now = Instant::now();
        if now >= next_tick {
            pending = true;
            // Keep a stable cadence even if we were delayed.
            while next_tick <= now {
                next_tick += cfg.interval;
            }
        }

        while trigger_rx.try_recv().is_ok() {
            pending = true;
        }

        if let Some(until) = backoff_until {
            if Instant::now() < until {
                thread::sleep(Duration::from_millis(50));
                continue;
            }
            backoff_until = None;
        }

        if !pending {
            let sleep_for = next_tick
                .saturating_duration_since(Instant::now())
                .min(Duration::from_millis(250));
            thread::sleep(sleep_for);
            continue;
        }

        pending = false;

        let result = sweeper.sweep();
        let mut s = stats.lock().unwrap_or_else(PoisonError::into_inner);
        s.runs += 1;
        s.last_run_at = Some(Utc::now());

        match result {
            Ok(report) => {
                failures = 0;
                s.total_expired += report.expired as u64;
                s.last_report = Some(report);
                s.last_error = None;
            }
            Err(e) => {
                s.failed_runs += 1;
                s.last_error = Some(e.to_string());
                failures += 1;
                if failures <= cfg.max_retries {
                    warn!(attempt = failures, error = %e, "expiry sweep failed; retrying");
                    pending = true;
                    backoff_until = Some(Instant::now() + backoff(cfg.base_backoff, failures));
                } else {
                    error!(attempts = failures, error = %e, "expiry sweep keeps failing; waiting for next tick");
                    failures = 0;
                }
            }
        }
    }

    info!("expiry sweeper stopped");
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    // Exponential backoff: base * 2^(attempt-1), capped.
    let pow = 1u32 << attempt.saturating_sub(1).min(10);
    let ms = base.as_millis().saturating_mul(pow as u128);
    Duration::from_millis(ms.min(10_000) as u64)
}
