use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod event;
pub mod fetch;
pub mod outcome;

// Re-exports for convenience
pub use event::*;
pub use fetch::*;
pub use outcome::*;

/// Normalized availability signal for one poll cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    OutOfStock,
    Unknown,
}

impl StockStatus {
    pub fn is_in_stock(&self) -> bool {
        matches!(self, StockStatus::InStock)
    }

    pub fn label(&self) -> &'static str {
        match self {
            StockStatus::InStock => "in stock",
            StockStatus::OutOfStock => "out of stock",
            StockStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Http,
    Browser,
}

impl Strategy {
    pub const ALL: [Strategy; 2] = [Strategy::Http, Strategy::Browser];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Http => "http",
            Strategy::Browser => "browser",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Strategy::Http),
            "browser" => Ok(Strategy::Browser),
            other => Err(format!("unknown strategy '{}', expected 'http' or 'browser'", other)),
        }
    }
}

/// When a notifying reporter should fire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotifyOn {
    /// Only when the item moves into stock.
    #[default]
    InStock,
    AnyChange,
}
