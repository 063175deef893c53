use std::time::Duration;

use crate::utils::error::BrowserError;

/// A running browser process. Calls block; callers run them on the blocking pool.
pub trait BrowserEngine: Send + Sync {
    /// Open an isolated context (own cookies and storage) with one page in it.
    fn new_context(&self, user_agent: &str) -> Result<Box<dyn BrowsingContext>, BrowserError>;

    /// Terminate the browser process. Called once when the run loop stops.
    fn shutdown(&self);
}

/// One page inside an isolated browser context.
pub trait BrowsingContext: Send {
    /// Navigate and wait until the DOM has been parsed. Returns the main
    /// document's HTTP status when the engine can tell.
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<Option<u16>, BrowserError>;

    /// Evaluate a script that yields a string or null.
    fn evaluate(&mut self, script: &str) -> Result<Option<String>, BrowserError>;

    fn close(&mut self) -> Result<(), BrowserError>;
}
