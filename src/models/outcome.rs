use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::StockStatus;
use crate::utils::error::CheckError;

/// Why structured data could not produce an availability signal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExtractionFailure {
    NoStructuredData,
    MalformedJson(String),
    MissingOffers,
    MissingAvailability,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Status(StockStatus),
    Failure(ExtractionFailure),
}

impl ExtractionOutcome {
    /// Failures collapse to `Unknown`.
    pub fn status(&self) -> StockStatus {
        match self {
            ExtractionOutcome::Status(status) => *status,
            ExtractionOutcome::Failure(_) => StockStatus::Unknown,
        }
    }

    pub fn failure(&self) -> Option<&ExtractionFailure> {
        match self {
            ExtractionOutcome::Status(_) => None,
            ExtractionOutcome::Failure(reason) => Some(reason),
        }
    }
}

/// Result of one full fetch + extract cycle, as seen by the run loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Checked { status: StockStatus, elapsed: Duration },
    RateLimited { retry_after: Option<Duration> },
    Fault(CheckError),
}

impl CycleOutcome {
    pub fn from_check(result: Result<(StockStatus, Duration), CheckError>) -> Self {
        match result {
            Ok((status, elapsed)) => CycleOutcome::Checked { status, elapsed },
            Err(CheckError::RateLimited { retry_after }) => {
                CycleOutcome::RateLimited { retry_after }
            }
            Err(err) => CycleOutcome::Fault(err),
        }
    }

    pub fn status(&self) -> Option<StockStatus> {
        match self {
            CycleOutcome::Checked { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Checked { status: StockStatus::InStock, .. } => "in_stock",
            CycleOutcome::Checked { status: StockStatus::OutOfStock, .. } => "out_of_stock",
            CycleOutcome::Checked { status: StockStatus::Unknown, .. } => "unknown",
            CycleOutcome::RateLimited { .. } => "rate_limited",
            CycleOutcome::Fault(CheckError::Network(_)) => "network_error",
            CycleOutcome::Fault(CheckError::Timeout(_)) => "timeout",
            CycleOutcome::Fault(CheckError::UnexpectedStatus(_)) => "unexpected_status",
            CycleOutcome::Fault(_) => "check_failed",
        }
    }
}
