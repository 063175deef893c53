pub mod checker;
pub mod engine;
pub mod reporter;

pub use checker::StockChecker;
pub use engine::{BrowserEngine, BrowsingContext};
#[cfg(test)]
pub use reporter::MockProgressReporter;
pub use reporter::ProgressReporter;
