use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use url::Url;

use crate::extractor::StructuredDataExtractor;
use crate::models::{
    ExtractionFailure, ExtractionOutcome, FetchResult, PageBody, PageHandle, Strategy,
};
use crate::plugins::traits::{BrowserEngine, StockChecker};
use crate::utils::error::{AppError, BrowserError, CheckError};

static RATE_LIMIT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b429\b|too many requests|rate[ -]?limit")
        .expect("rate limit pattern is valid")
});

/// Renders the page in a real browser so script-injected structured data is
/// visible. Each cycle gets a fresh isolated context that is disposed before
/// the cycle ends.
pub struct BrowserStockChecker {
    engine: RwLock<Option<Arc<dyn BrowserEngine>>>,
    extractor: StructuredDataExtractor,
    script: String,
    user_agent: String,
    navigation_timeout: Duration,
}

impl BrowserStockChecker {
    pub fn new(
        engine: Arc<dyn BrowserEngine>,
        user_agent: impl Into<String>,
        navigation_timeout: Duration,
        extractor: StructuredDataExtractor,
    ) -> Self {
        let script = extractor.candidate_script();
        Self {
            engine: RwLock::new(Some(engine)),
            extractor,
            script,
            user_agent: user_agent.into(),
            navigation_timeout,
        }
    }

    async fn session(&self) -> Result<Arc<dyn BrowserEngine>, CheckError> {
        self.engine.read().await.clone().ok_or(CheckError::SessionClosed)
    }
}

#[async_trait]
impl StockChecker for BrowserStockChecker {
    fn name(&self) -> &str {
        "Browser Stock Checker"
    }

    fn strategy(&self) -> Strategy {
        Strategy::Browser
    }

    async fn fetch(&self, url: &Url) -> Result<FetchResult, CheckError> {
        let engine = self.session().await?;
        let user_agent = self.user_agent.clone();
        let target = url.to_string();
        let timeout = self.navigation_timeout;
        let start_time = Instant::now();

        // If this future is dropped the task still finishes and the handle's Drop
        // closes the context
        let (page, status) = tokio::task::spawn_blocking(move || {
            let mut page = PageHandle::new(engine.new_context(&user_agent)?);
            let status = page.navigate(&target, timeout)?;
            Ok::<_, BrowserError>((page, status))
        })
        .await
        .map_err(|e| CheckError::CheckFailed(format!("browser task failed: {}", e)))?
        .map_err(classify_browser_error)?;

        if status == Some(429) {
            if let Err(e) = page.close() {
                tracing::warn!("Failed to close browsing context: {}", e);
            }
            return Err(CheckError::RateLimited { retry_after: None });
        }

        Ok(FetchResult {
            status_code: status.unwrap_or(200),
            body: PageBody::Page(page),
            elapsed: start_time.elapsed(),
        })
    }

    async fn extract(&self, fetched: FetchResult) -> Result<ExtractionOutcome, CheckError> {
        let mut page = match fetched.body {
            PageBody::Page(page) => page,
            PageBody::Markup(text) => return Ok(self.extractor.extract(&text)),
        };

        let script = self.script.clone();
        let (candidate, closed) = tokio::task::spawn_blocking(move || {
            let candidate = page.evaluate(&script);
            let closed = page.close();
            (candidate, closed)
        })
        .await
        .map_err(|e| CheckError::CheckFailed(format!("browser task failed: {}", e)))?;

        if let Err(e) = closed {
            tracing::warn!("Failed to close browsing context: {}", e);
        }

        match candidate.map_err(classify_browser_error)? {
            Some(text) => Ok(self.extractor.extract(&text)),
            None => Ok(ExtractionOutcome::Failure(ExtractionFailure::NoStructuredData)),
        }
    }

    async fn shutdown(&self) -> Result<(), AppError> {
        let engine = self.engine.write().await.take();
        if let Some(engine) = engine {
            tokio::task::spawn_blocking(move || engine.shutdown())
                .await
                .map_err(|e| AppError::Internal(format!("browser shutdown task failed: {}", e)))?;
        }
        Ok(())
    }
}

fn classify_browser_error(err: BrowserError) -> CheckError {
    match err {
        BrowserError::NavigationTimeout(_) => CheckError::Timeout(err.to_string()),
        other => {
            let message = other.to_string();
            if RATE_LIMIT_PATTERN.is_match(&message) {
                CheckError::RateLimited { retry_after: None }
            } else {
                CheckError::CheckFailed(message)
            }
        }
    }
}
