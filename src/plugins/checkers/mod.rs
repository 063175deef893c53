pub mod browser;
pub mod chrome;
pub mod http;

pub use browser::BrowserStockChecker;
pub use chrome::ChromeEngine;
pub use http::HttpStockChecker;
