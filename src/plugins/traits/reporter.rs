use async_trait::async_trait;

use crate::models::MonitorEvent;

/// Trait for anything that consumes monitor events (console, webhooks, channels).
///
/// Reporters swallow their own failures; the run loop never waits on a result.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    fn name(&self) -> &str;

    async fn report(&self, event: &MonitorEvent);
}
