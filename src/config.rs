use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;
use url::Url;
use validator::Validate;

use crate::extractor::DEFAULT_SELECTORS;
use crate::models::{NotifyOn, Strategy};
use crate::utils::error::AppError;

pub const DEFAULT_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 ",
    "(KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
);

/// Longest accepted pause between polls: one day.
pub const MAX_POLL_INTERVAL_SECS: f64 = 86_400.0;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct AppConfig {
    #[validate(nested)]
    pub monitor: MonitorSettings,
    pub http: HttpConfig,
    pub browser: BrowserConfig,
    #[validate(nested)]
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MonitorSettings {
    pub urls: Vec<String>,
    pub poll_interval_secs: f64,
    pub strategy: Option<Strategy>,
    pub headless: bool,
    #[validate(range(min = 1, max = 86400))]
    pub rate_limit_cooldown_secs: u64,
    pub respect_retry_after: bool,
    #[validate(length(min = 1))]
    pub user_agent: String,
    #[validate(length(min = 1))]
    pub structured_data_selectors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub accept: String,
    pub accept_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub navigation_timeout_ms: u64,
    pub chrome_path: Option<String>,
    pub sandbox: bool,
    pub launch_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct NotificationsConfig {
    #[validate(nested)]
    pub discord: DiscordConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DiscordConfig {
    #[validate(url)]
    pub webhook_url: Option<String>,
    pub username: String,
    #[validate(url)]
    pub avatar_url: Option<String>,
    pub mention_role: Option<String>,
    pub notify_on: NotifyOn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<String>,
    pub file_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            poll_interval_secs: 1.0,
            strategy: None,
            headless: true,
            rate_limit_cooldown_secs: 60,
            respect_retry_after: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            structured_data_selectors: DEFAULT_SELECTORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            accept_language: "en-US,en;q=0.5".to_string(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 30_000,
            chrome_path: None,
            sandbox: false,
            launch_args: vec![
                "--disable-gpu".to_string(),
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
            ],
        }
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            username: "Stock Watcher".to_string(),
            avatar_url: None,
            mention_role: None,
            notify_on: NotifyOn::InStock,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "stock_watcher=info".to_string(),
            directory: None,
            file_prefix: "stock-watcher.log".to_string(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9001,
        }
    }
}

/// Values supplied on the command line. They win over every other source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub urls: Vec<String>,
    pub poll_interval_secs: Option<f64>,
    pub strategy: Option<Strategy>,
    pub headless: Option<bool>,
    pub rate_limit_cooldown_secs: Option<u64>,
    pub respect_retry_after: Option<bool>,
}

impl AppConfig {
    pub fn load(explicit: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, AppError> {
        let mut builder = Config::builder()
            // Start with built-in defaults
            .add_source(Config::try_from(&AppConfig::default())?)
            // Add project config files if present
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }

        // Add environment variables with prefix "STOCK_WATCHER"
        builder = builder.add_source(
            Environment::with_prefix("STOCK_WATCHER")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("monitor.urls")
                .with_list_parse_key("monitor.structured_data_selectors")
                .with_list_parse_key("browser.launch_args")
                .try_parsing(true),
        );

        if !overrides.urls.is_empty() {
            builder = builder.set_override("monitor.urls", overrides.urls.clone())?;
        }
        builder = builder
            .set_override_option("monitor.poll_interval_secs", overrides.poll_interval_secs)?
            .set_override_option(
                "monitor.strategy",
                overrides.strategy.map(|s| s.as_str().to_string()),
            )?
            .set_override_option("monitor.headless", overrides.headless)?
            .set_override_option(
                "monitor.rate_limit_cooldown_secs",
                overrides.rate_limit_cooldown_secs,
            )?
            .set_override_option("monitor.respect_retry_after", overrides.respect_retry_after)?;

        let mut config: AppConfig = builder.build()?.try_deserialize()?;

        // Add Chrome path from environment if not set
        if config.browser.chrome_path.is_none() {
            config.browser.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate_all()?;
        Ok(config)
    }

    pub fn validate_all(&self) -> Result<(), AppError> {
        self.validate()?;

        if !(self.monitor.poll_interval_secs.is_finite() && self.monitor.poll_interval_secs > 0.0) {
            return Err(AppError::Validation(
                "Monitor poll_interval_secs must be greater than 0".into(),
            ));
        }

        if self.monitor.poll_interval_secs > MAX_POLL_INTERVAL_SECS {
            return Err(AppError::Validation(format!(
                "Monitor poll_interval_secs must be at most {}",
                MAX_POLL_INTERVAL_SECS
            )));
        }

        for url in &self.monitor.urls {
            parse_target_url(url)?;
        }

        if self.http.request_timeout_secs == 0 {
            return Err(AppError::Validation(
                "HTTP request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.browser.navigation_timeout_ms == 0 {
            return Err(AppError::Validation(
                "Browser navigation_timeout_ms must be greater than 0".into(),
            ));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(AppError::Validation(
                "Metrics port must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// One immutable config per monitored URL.
    pub fn monitor_configs(&self, strategy: Strategy) -> Result<Vec<MonitorConfig>, AppError> {
        if self.monitor.urls.is_empty() {
            return Err(AppError::Validation("At least one URL must be given".into()));
        }

        self.monitor
            .urls
            .iter()
            .map(|url| {
                let poll_interval = Duration::try_from_secs_f64(self.monitor.poll_interval_secs)
                    .map_err(|e| AppError::Validation(format!("Invalid poll interval: {}", e)))?;
                let config = MonitorConfig {
                    url: parse_target_url(url)?,
                    poll_interval,
                    strategy,
                    headless: self.monitor.headless,
                    rate_limit_cooldown: Duration::from_secs(self.monitor.rate_limit_cooldown_secs),
                    respect_retry_after: self.monitor.respect_retry_after,
                };
                config.validate()?;
                Ok(config)
            })
            .collect()
    }
}

/// Settings for a single run loop. Immutable once the loop starts.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub url: Url,
    pub poll_interval: Duration,
    pub strategy: Strategy,
    pub headless: bool,
    pub rate_limit_cooldown: Duration,
    pub respect_retry_after: bool,
}

impl MonitorConfig {
    pub fn new(url: &str, strategy: Strategy) -> Result<Self, AppError> {
        Ok(Self {
            url: parse_target_url(url)?,
            poll_interval: Duration::from_secs(1),
            strategy,
            headless: true,
            rate_limit_cooldown: Duration::from_secs(60),
            respect_retry_after: false,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_rate_limit_cooldown(mut self, cooldown: Duration) -> Self {
        self.rate_limit_cooldown = cooldown;
        self
    }

    pub fn with_respect_retry_after(mut self, enabled: bool) -> Self {
        self.respect_retry_after = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.poll_interval.is_zero() {
            return Err(AppError::Validation("Poll interval must be greater than 0".into()));
        }

        if self.poll_interval.as_secs_f64() > MAX_POLL_INTERVAL_SECS {
            return Err(AppError::Validation(format!(
                "Poll interval must be at most {} seconds",
                MAX_POLL_INTERVAL_SECS
            )));
        }

        if self.rate_limit_cooldown.is_zero() {
            return Err(AppError::Validation(
                "Rate limit cooldown must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

fn parse_target_url(raw: &str) -> Result<Url, AppError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| AppError::Validation(format!("Invalid URL '{}': {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(AppError::Validation(format!(
            "Invalid URL '{}': expected an http(s) address",
            raw
        ))),
    }
}
