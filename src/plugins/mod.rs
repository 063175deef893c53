pub mod checkers;
pub mod manager;
pub mod reporters;
pub mod traits;

pub use manager::PluginManager;
pub use traits::{BrowserEngine, BrowsingContext, ProgressReporter, StockChecker};
