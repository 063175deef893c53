use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONNECTION, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use url::Url;

use crate::config::HttpConfig;
use crate::extractor::StructuredDataExtractor;
use crate::models::{ExtractionOutcome, FetchResult, PageBody, Strategy};
use crate::plugins::traits::StockChecker;
use crate::utils::error::{AppError, CheckError};

/// Fetches server-rendered markup with a single GET. Scripts never run, so
/// only structured data present in the initial HTML is seen.
pub struct HttpStockChecker {
    client: RwLock<Option<Client>>,
    extractor: StructuredDataExtractor,
}

impl HttpStockChecker {
    pub fn new(
        user_agent: &str,
        config: &HttpConfig,
        extractor: StructuredDataExtractor,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(browser_headers(config)?)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client: RwLock::new(Some(client)),
            extractor,
        })
    }

    async fn session(&self) -> Result<Client, CheckError> {
        self.client.read().await.clone().ok_or(CheckError::SessionClosed)
    }
}

fn browser_headers(config: &HttpConfig) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::new();
    for (name, value) in [(ACCEPT, &config.accept), (ACCEPT_LANGUAGE, &config.accept_language)] {
        let value = HeaderValue::from_str(value)
            .map_err(|e| AppError::Validation(format!("Invalid {} header: {}", name, e)))?;
        headers.insert(name, value);
    }
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    Ok(headers)
}

#[async_trait]
impl StockChecker for HttpStockChecker {
    fn name(&self) -> &str {
        "HTTP Stock Checker"
    }

    fn strategy(&self) -> Strategy {
        Strategy::Http
    }

    async fn fetch(&self, url: &Url) -> Result<FetchResult, CheckError> {
        let client = self.session().await?;
        let start_time = Instant::now();

        let response = client
            .get(url.clone())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(response.headers(), Utc::now());
            return Err(CheckError::RateLimited { retry_after });
        }
        if status != StatusCode::OK {
            return Err(CheckError::UnexpectedStatus(status.as_u16()));
        }

        let text = response.text().await.map_err(map_reqwest_error)?;

        Ok(FetchResult {
            status_code: status.as_u16(),
            body: PageBody::Markup(text),
            elapsed: start_time.elapsed(),
        })
    }

    async fn extract(&self, fetched: FetchResult) -> Result<ExtractionOutcome, CheckError> {
        match fetched.body {
            PageBody::Markup(text) => Ok(self.extractor.extract(&text)),
            PageBody::Page(_) => Err(CheckError::CheckFailed(
                "HTTP checker cannot inspect a live page".to_string(),
            )),
        }
    }

    async fn shutdown(&self) -> Result<(), AppError> {
        if self.client.write().await.take().is_some() {
            tracing::debug!("HTTP session closed");
        }
        Ok(())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> CheckError {
    if err.is_timeout() {
        CheckError::Timeout(err.to_string())
    } else if err.is_decode() || err.is_body() {
        CheckError::CheckFailed(err.to_string())
    } else {
        CheckError::Network(err.to_string())
    }
}

/// `Retry-After` is either delay-seconds or an HTTP date.
fn parse_retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    let secs = at.signed_duration_since(now).num_seconds().max(0);
    Some(Duration::from_secs(secs as u64))
}
