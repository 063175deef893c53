use serde::{Deserialize, Serialize};
use std::fmt;

use super::{CycleOutcome, StockStatus};
use crate::utils::error::CheckError;

/// Discrete status events handed to reporters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum MonitorEvent {
    Checking,
    InStock,
    OutOfStock,
    Unknown,
    RateLimited,
    NetworkError(String),
    Timeout,
    UnexpectedStatus(u16),
    CheckFailed(String),
    FatalError(String),
    ShuttingDown,
}

impl MonitorEvent {
    pub fn from_status(status: StockStatus) -> Self {
        match status {
            StockStatus::InStock => MonitorEvent::InStock,
            StockStatus::OutOfStock => MonitorEvent::OutOfStock,
            StockStatus::Unknown => MonitorEvent::Unknown,
        }
    }

    pub fn from_outcome(outcome: &CycleOutcome) -> Self {
        match outcome {
            CycleOutcome::Checked { status, .. } => Self::from_status(*status),
            CycleOutcome::RateLimited { .. } => MonitorEvent::RateLimited,
            CycleOutcome::Fault(err) => Self::from_error(err),
        }
    }

    pub fn from_error(err: &CheckError) -> Self {
        match err {
            CheckError::Network(message) => MonitorEvent::NetworkError(message.clone()),
            CheckError::Timeout(_) => MonitorEvent::Timeout,
            CheckError::RateLimited { .. } => MonitorEvent::RateLimited,
            CheckError::UnexpectedStatus(code) => MonitorEvent::UnexpectedStatus(*code),
            CheckError::CheckFailed(message) => MonitorEvent::CheckFailed(message.clone()),
            CheckError::SessionClosed => MonitorEvent::CheckFailed(err.to_string()),
        }
    }

    /// The availability this event carries, if it is a status event.
    pub fn stock_status(&self) -> Option<StockStatus> {
        match self {
            MonitorEvent::InStock => Some(StockStatus::InStock),
            MonitorEvent::OutOfStock => Some(StockStatus::OutOfStock),
            MonitorEvent::Unknown => Some(StockStatus::Unknown),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            MonitorEvent::RateLimited
                | MonitorEvent::NetworkError(_)
                | MonitorEvent::Timeout
                | MonitorEvent::UnexpectedStatus(_)
                | MonitorEvent::CheckFailed(_)
                | MonitorEvent::FatalError(_)
        )
    }
}

impl fmt::Display for MonitorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorEvent::Checking => write!(f, "Checking stock..."),
            MonitorEvent::InStock => write!(f, "Item is in stock!"),
            MonitorEvent::OutOfStock => write!(f, "Out of stock"),
            MonitorEvent::Unknown => write!(f, "Could not determine stock status"),
            MonitorEvent::RateLimited => write!(f, "Rate limited. Waiting before retry..."),
            MonitorEvent::NetworkError(message) => write!(f, "Network error: {}", message),
            MonitorEvent::Timeout => write!(f, "Page load timeout. Retrying..."),
            MonitorEvent::UnexpectedStatus(code) => write!(f, "Unexpected status code: {}", code),
            MonitorEvent::CheckFailed(message) => write!(f, "Error checking stock: {}", message),
            MonitorEvent::FatalError(message) => write!(f, "Fatal error: {}", message),
            MonitorEvent::ShuttingDown => write!(f, "Shutting down..."),
        }
    }
}
