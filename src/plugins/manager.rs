use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::checkers::{BrowserStockChecker, ChromeEngine, HttpStockChecker};
use super::reporters::{ConsoleReporter, DiscordReporter};
use super::traits::{ProgressReporter, StockChecker};
use crate::config::{AppConfig, MonitorConfig};
use crate::extractor::StructuredDataExtractor;
use crate::models::{MonitorEvent, Strategy};
use crate::utils::error::AppError;

pub type StockCheckerBox = Box<dyn StockChecker>;
pub type ReporterArc = Arc<dyn ProgressReporter>;

/// Builds checkers and fans events out to every registered reporter.
#[derive(Clone)]
pub struct PluginManager {
    reporters: Arc<RwLock<Vec<ReporterArc>>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            reporters: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a reporter, replacing any previous one with the same name
    pub async fn register_reporter(&self, reporter: ReporterArc) {
        let mut reporters = self.reporters.write().await;
        reporters.retain(|existing| existing.name() != reporter.name());
        reporters.push(reporter);
    }

    pub async fn has_reporter(&self, name: &str) -> bool {
        let reporters = self.reporters.read().await;
        reporters.iter().any(|reporter| reporter.name() == name)
    }

    pub async fn list_reporter_names(&self) -> Vec<String> {
        let reporters = self.reporters.read().await;
        reporters.iter().map(|reporter| reporter.name().to_string()).collect()
    }

    /// Console output plus the Discord webhook when one is configured
    pub async fn initialize_default_reporters(
        &self,
        app: &AppConfig,
        target: &MonitorConfig,
    ) -> Result<(), AppError> {
        self.register_reporter(Arc::new(ConsoleReporter::new(target.url.as_str()))).await;

        let discord = &app.notifications.discord;
        if let Some(discord) = DiscordReporter::from_config(discord, target.url.as_str())? {
            self.register_reporter(Arc::new(discord)).await;
        }

        Ok(())
    }

    /// Construct the checker for the configured strategy. Launching a browser
    /// blocks, so it happens on the blocking pool.
    pub async fn build_checker(
        target: &MonitorConfig,
        app: &AppConfig,
    ) -> Result<StockCheckerBox, AppError> {
        let extractor = StructuredDataExtractor::new(&app.monitor.structured_data_selectors)?;
        let user_agent = app.monitor.user_agent.clone();

        match target.strategy {
            Strategy::Http => {
                let checker = HttpStockChecker::new(&user_agent, &app.http, extractor)?;
                Ok(Box::new(checker))
            }
            Strategy::Browser => {
                let navigation_timeout = Duration::from_millis(app.browser.navigation_timeout_ms);
                let idle_timeout = browser_idle_timeout(target, navigation_timeout)?;
                let browser_config = app.browser.clone();
                let headless = target.headless;

                let engine = tokio::task::spawn_blocking(move || {
                    ChromeEngine::launch(&browser_config, headless, idle_timeout)
                })
                .await
                .map_err(|e| AppError::Internal(format!("browser launch task failed: {}", e)))?
                .map_err(|e| AppError::FatalStartup(e.to_string()))?;

                Ok(Box::new(BrowserStockChecker::new(
                    Arc::new(engine),
                    user_agent,
                    navigation_timeout,
                    extractor,
                )))
            }
        }
    }
}

/// Chrome drops the DevTools connection after this long without traffic, so it
/// must outlast the longest pause plus one navigation.
fn browser_idle_timeout(
    target: &MonitorConfig,
    navigation_timeout: Duration,
) -> Result<Duration, AppError> {
    target
        .poll_interval
        .max(target.rate_limit_cooldown)
        .checked_add(navigation_timeout)
        .and_then(|timeout| timeout.checked_add(Duration::from_secs(60)))
        .ok_or_else(|| AppError::Validation("Browser idle timeout overflows".into()))
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgressReporter for PluginManager {
    fn name(&self) -> &str {
        "plugin manager"
    }

    async fn report(&self, event: &MonitorEvent) {
        let reporters = self.reporters.read().await.clone();
        join_all(reporters.iter().map(|reporter| reporter.report(event))).await;
    }
}
