// Integration tests for Stock Watcher
// These tests drive whole run loops against scripted checkers, a mock HTTP
// server, a fake browser engine and, when opted in, a real Chrome.

pub mod http_checker_tests;
pub mod run_loop_tests;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stock_watcher::models::{ExtractionOutcome, FetchResult, MonitorEvent, PageBody, Strategy};
use stock_watcher::plugins::traits::StockChecker;
use stock_watcher::scheduler::Sleeper;
use stock_watcher::{AppError, CheckError, MonitorConfig, StructuredDataExtractor};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const COOLDOWN: Duration = Duration::from_secs(60);

/// Monitor config with the default one second interval and 60 second cooldown
pub fn test_monitor_config(url: &str, strategy: Strategy) -> MonitorConfig {
    MonitorConfig::new(url, strategy)
        .expect("test URL is valid")
        .with_poll_interval(POLL_INTERVAL)
        .with_rate_limit_cooldown(COOLDOWN)
}

/// A product page carrying one JSON-LD block with the given availability
pub fn product_page(availability: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>Test Product</title>
  <script type="application/ld+json">
    {{"@context": "https://schema.org", "@type": "Product", "name": "Test Product",
      "offers": {{"@type": "Offer", "price": "499.99", "availability": "{}"}}}}
  </script>
</head>
<body><h1>Test Product</h1></body>
</html>"#,
        availability
    )
}

/// Collect everything a channel reporter has received so far
pub fn drain_events(receiver: &mut UnboundedReceiver<MonitorEvent>) -> Vec<MonitorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

/// Records requested pauses without waiting. Once `cancel_after` pauses have
/// been requested it cancels the token and blocks, so cancellation always
/// lands during a sleep.
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
    cancel_after: usize,
    cancel: CancellationToken,
}

impl RecordingSleeper {
    pub fn new(cancel_after: usize, cancel: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            sleeps: Mutex::new(Vec::new()),
            cancel_after,
            cancel,
        })
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        let count = {
            let mut sleeps = self.sleeps.lock().unwrap();
            sleeps.push(duration);
            sleeps.len()
        };

        if count >= self.cancel_after {
            self.cancel.cancel();
            std::future::pending::<()>().await;
        }
    }
}

/// One scripted cycle: markup to hand to the extractor, or a fault
pub type Step = Result<String, CheckError>;

/// Checker that replays a fixed script and tracks overlap and shutdowns.
pub struct ScriptedChecker {
    steps: Mutex<VecDeque<Step>>,
    extractor: StructuredDataExtractor,
    in_flight: AtomicUsize,
    pub max_in_flight: Arc<AtomicUsize>,
    pub fetches: Arc<AtomicUsize>,
    pub shutdowns: Arc<AtomicUsize>,
    cancel_on_fetch: Option<CancellationToken>,
}

impl ScriptedChecker {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            extractor: StructuredDataExtractor::default(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            fetches: Arc::new(AtomicUsize::new(0)),
            shutdowns: Arc::new(AtomicUsize::new(0)),
            cancel_on_fetch: None,
        }
    }

    /// Cancel `token` from inside the first fetch, as a Ctrl-C mid-request would
    pub fn cancelling_during_fetch(mut self, token: CancellationToken) -> Self {
        self.cancel_on_fetch = Some(token);
        self
    }

    fn finish_cycle(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StockChecker for ScriptedChecker {
    fn name(&self) -> &str {
        "Scripted Checker"
    }

    fn strategy(&self) -> Strategy {
        Strategy::Http
    }

    async fn fetch(&self, _url: &url::Url) -> Result<FetchResult, CheckError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if let Some(token) = &self.cancel_on_fetch {
            token.cancel();
        }
        tokio::task::yield_now().await;

        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CheckError::CheckFailed("script exhausted".to_string())));

        match step {
            Ok(markup) => Ok(FetchResult {
                status_code: 200,
                body: PageBody::Markup(markup),
                elapsed: Duration::from_millis(25),
            }),
            Err(e) => {
                self.finish_cycle();
                Err(e)
            }
        }
    }

    async fn extract(&self, fetched: FetchResult) -> Result<ExtractionOutcome, CheckError> {
        tokio::task::yield_now().await;
        let outcome = match fetched.body {
            PageBody::Markup(text) => Ok(self.extractor.extract(&text)),
            PageBody::Page(_) => Err(CheckError::CheckFailed("unexpected live page".to_string())),
        };
        self.finish_cycle();
        outcome
    }

    async fn shutdown(&self) -> Result<(), AppError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
