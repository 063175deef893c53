use std::fmt;
use std::time::Duration;

use crate::plugins::traits::BrowsingContext;
use crate::utils::error::BrowserError;

#[derive(Debug)]
pub struct FetchResult {
    pub status_code: u16,
    pub body: PageBody,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub enum PageBody {
    /// Raw markup from a plain HTTP fetch.
    Markup(String),
    /// Live page inside a per-cycle browsing context.
    Page(PageHandle),
}

/// Owns a browsing context for the duration of one cycle.
///
/// The context is closed exactly once: by `close()`, or on drop if the
/// handle is abandoned (extraction error, panic, early return).
pub struct PageHandle {
    context: Option<Box<dyn BrowsingContext>>,
}

impl PageHandle {
    pub fn new(context: Box<dyn BrowsingContext>) -> Self {
        Self {
            context: Some(context),
        }
    }

    pub fn navigate(&mut self, url: &str, timeout: Duration) -> Result<Option<u16>, BrowserError> {
        match self.context.as_mut() {
            Some(context) => context.navigate(url, timeout),
            None => Err(BrowserError::Context("page already closed".to_string())),
        }
    }

    pub fn evaluate(&mut self, script: &str) -> Result<Option<String>, BrowserError> {
        match self.context.as_mut() {
            Some(context) => context.evaluate(script),
            None => Err(BrowserError::Context("page already closed".to_string())),
        }
    }

    pub fn close(mut self) -> Result<(), BrowserError> {
        match self.context.take() {
            Some(mut context) => context.close(),
            None => Ok(()),
        }
    }
}

impl Drop for PageHandle {
    fn drop(&mut self) {
        if let Some(mut context) = self.context.take() {
            if let Err(e) = context.close() {
                tracing::warn!("Failed to close browsing context: {}", e);
            }
        }
    }
}

impl fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageHandle")
            .field("open", &self.context.is_some())
            .finish()
    }
}
