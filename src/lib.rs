pub mod cli;
pub mod config;
pub mod extractor;
pub mod models;
pub mod plugins;
pub mod scheduler;
pub mod utils;

// Re-export commonly used types
pub use config::{AppConfig, MonitorConfig};
pub use extractor::StructuredDataExtractor;
pub use models::{MonitorEvent, StockStatus, Strategy};
pub use plugins::PluginManager;
pub use scheduler::{MonitorStats, RunLoop};
pub use utils::error::{AppError, CheckError};

pub type Result<T> = std::result::Result<T, AppError>;
