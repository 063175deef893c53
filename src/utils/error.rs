use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid selector: {selector}")]
    InvalidSelector { selector: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Startup failed: {0}")]
    FatalStartup(String),

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Faults raised by a single poll cycle. None of these stop the run loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Unexpected status code: {0}")]
    UnexpectedStatus(u16),

    #[error("Check failed: {0}")]
    CheckFailed(String),

    #[error("Session already closed")]
    SessionClosed,
}

/// Faults raised by the browser engine while driving a page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Browser context error: {0}")]
    Context(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Navigation timed out after {0:?}")]
    NavigationTimeout(Duration),

    #[error("Script evaluation failed: {0}")]
    Evaluation(String),
}
