use async_trait::async_trait;
use url::Url;

use crate::models::{CycleOutcome, ExtractionOutcome, FetchResult, Strategy};
use crate::utils::error::{AppError, CheckError};

/// Trait for implementing stock acquisition strategies (plain HTTP, browser)
#[async_trait]
pub trait StockChecker: Send + Sync {
    /// Plugin metadata
    fn name(&self) -> &str;
    fn strategy(&self) -> Strategy;

    /// Acquire the page for one cycle.
    async fn fetch(&self, url: &Url) -> Result<FetchResult, CheckError>;

    /// Turn a fetched page into an availability signal. Consumes the fetch
    /// result so per-cycle resources are released before this returns.
    async fn extract(&self, fetched: FetchResult) -> Result<ExtractionOutcome, CheckError>;

    /// One full fetch + extract cycle.
    async fn check(&self, url: &Url) -> CycleOutcome {
        let fetched = match self.fetch(url).await {
            Ok(fetched) => fetched,
            Err(e) => return CycleOutcome::from_check(Err(e)),
        };

        let elapsed = fetched.elapsed;
        let result = self.extract(fetched).await.map(|outcome| {
            if let Some(reason) = outcome.failure() {
                tracing::debug!("No availability signal from {}: {:?}", url, reason);
            }
            (outcome.status(), elapsed)
        });

        CycleOutcome::from_check(result)
    }

    /// Release the long-lived session (HTTP client, browser process).
    async fn shutdown(&self) -> Result<(), AppError>;
}
