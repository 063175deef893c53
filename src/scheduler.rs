use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::MonitorConfig;
use crate::models::{CycleOutcome, MonitorEvent, StockStatus};
use crate::plugins::traits::{ProgressReporter, StockChecker};

/// Time source for the pauses between cycles.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    Polling,
    Success,
    RateLimited,
    Error,
    Sleeping,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorStats {
    pub id: Uuid,
    pub url: String,
    pub state: LoopState,
    pub started_at: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub rate_limited_count: u64,
    pub last_status: Option<StockStatus>,
    pub last_error: Option<String>,
    pub total_check_time_ms: u64,
}

impl MonitorStats {
    fn new(id: Uuid, url: String) -> Self {
        Self {
            id,
            url,
            state: LoopState::Idle,
            started_at: Utc::now(),
            last_run: None,
            run_count: 0,
            success_count: 0,
            error_count: 0,
            rate_limited_count: 0,
            last_status: None,
            last_error: None,
            total_check_time_ms: 0,
        }
    }

    /// Mean page-load time over successful cycles.
    pub fn average_check_time_ms(&self) -> f64 {
        if self.success_count == 0 {
            0.0
        } else {
            self.total_check_time_ms as f64 / self.success_count as f64
        }
    }

    fn record(&mut self, outcome: &CycleOutcome) {
        self.last_run = Some(Utc::now());
        self.run_count += 1;

        match outcome {
            CycleOutcome::Checked { status, elapsed } => {
                self.success_count += 1;
                self.last_status = Some(*status);
                self.last_error = None;
                self.total_check_time_ms += elapsed.as_millis() as u64;
                self.state = LoopState::Success;
            }
            CycleOutcome::RateLimited { .. } => {
                self.rate_limited_count += 1;
                self.state = LoopState::RateLimited;
            }
            CycleOutcome::Fault(err) => {
                self.error_count += 1;
                self.last_error = Some(err.to_string());
                self.state = LoopState::Error;
            }
        }
    }
}

/// How long to wait after `outcome` before polling again.
pub fn delay_for(config: &MonitorConfig, outcome: &CycleOutcome) -> Duration {
    match outcome {
        CycleOutcome::RateLimited {
            retry_after: Some(retry_after),
        } if config.respect_retry_after => (*retry_after).max(config.poll_interval),
        CycleOutcome::RateLimited { .. } => config.rate_limit_cooldown,
        _ => config.poll_interval,
    }
}

/// Polls one URL sequentially until cancelled. Faults are reported and the
/// loop carries on; only the cancellation token ends it.
pub struct RunLoop {
    id: Uuid,
    config: MonitorConfig,
    checker: Box<dyn StockChecker>,
    reporter: Arc<dyn ProgressReporter>,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancellationToken,
    stats: MonitorStats,
}

impl RunLoop {
    pub fn new(
        config: MonitorConfig,
        checker: Box<dyn StockChecker>,
        reporter: Arc<dyn ProgressReporter>,
        cancel: CancellationToken,
    ) -> Self {
        let id = Uuid::new_v4();
        let stats = MonitorStats::new(id, config.url.to_string());
        Self {
            id,
            config,
            checker,
            reporter,
            sleeper: Arc::new(TokioSleeper),
            cancel,
            stats,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> LoopState {
        self.stats.state
    }

    /// Drive the loop to completion and return its statistics.
    pub async fn run(self) -> MonitorStats {
        let span = tracing::info_span!("monitor", run_id = %self.id, url = %self.config.url);
        self.run_until_cancelled().instrument(span).await
    }

    async fn run_until_cancelled(mut self) -> MonitorStats {
        tracing::info!(
            "Monitoring with {} every {:?}",
            self.checker.name(),
            self.config.poll_interval
        );

        while !self.cancel.is_cancelled() {
            let outcome = self.poll_once().await;
            let delay = delay_for(&self.config, &outcome);

            self.stats.state = LoopState::Sleeping;
            if !self.pause(delay).await {
                break;
            }
        }

        self.stop().await
    }

    async fn poll_once(&mut self) -> CycleOutcome {
        self.stats.state = LoopState::Polling;
        self.reporter.report(&MonitorEvent::Checking).await;

        let outcome = self.checker.check(&self.config.url).await;
        self.stats.record(&outcome);
        self.record_metrics(&outcome);

        match &outcome {
            CycleOutcome::Checked { status, elapsed } => {
                tracing::debug!("Page checked in {:?}: {}", elapsed, status);
            }
            CycleOutcome::RateLimited { retry_after } => {
                tracing::warn!("Rate limited (retry after: {:?})", retry_after);
            }
            CycleOutcome::Fault(err) => {
                tracing::warn!("Check failed: {}", err);
            }
        }

        self.reporter.report(&MonitorEvent::from_outcome(&outcome)).await;
        outcome
    }

    fn record_metrics(&self, outcome: &CycleOutcome) {
        metrics::counter!("stock_watcher_checks_total", "outcome" => outcome.label()).increment(1);

        if let Some(status) = outcome.status() {
            let in_stock = if status.is_in_stock() { 1.0 } else { 0.0 };
            metrics::gauge!("stock_watcher_in_stock", "url" => self.config.url.to_string())
                .set(in_stock);
        }
    }

    /// Returns false if cancelled before the delay elapsed.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = self.sleeper.sleep(delay) => true,
        }
    }

    async fn stop(mut self) -> MonitorStats {
        self.stats.state = LoopState::Stopped;
        self.reporter.report(&MonitorEvent::ShuttingDown).await;

        if let Err(e) = self.checker.shutdown().await {
            tracing::warn!("Error releasing session: {}", e);
        }

        tracing::info!(
            "Stopped after {} checks ({} ok, {} errors, {} rate limited)",
            self.stats.run_count,
            self.stats.success_count,
            self.stats.error_count,
            self.stats.rate_limited_count
        );

        self.stats
    }
}
