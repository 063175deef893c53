use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::config::ConfigOverrides;
use crate::models::Strategy;
use crate::utils::error::AppError;

#[derive(Debug, Parser)]
#[command(
    name = "stock-watcher",
    version,
    about = "Poll product pages until the item is back in stock"
)]
pub struct Cli {
    /// Product page URL(s) to monitor
    pub urls: Vec<String>,

    /// Seconds between checks
    #[arg(short, long, value_name = "SECONDS")]
    pub interval: Option<f64>,

    /// How to fetch the page; prompted for when omitted
    #[arg(short, long, value_enum)]
    pub method: Option<Strategy>,

    /// Show the browser window (browser method only)
    #[arg(long)]
    pub headed: bool,

    /// Seconds to back off after a rate limit response
    #[arg(long, value_name = "SECONDS")]
    pub cooldown: Option<u64>,

    /// Honor the server's Retry-After header instead of the fixed cooldown
    #[arg(long)]
    pub respect_retry_after: bool,

    /// Extra configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            urls: self.urls.clone(),
            poll_interval_secs: self.interval,
            strategy: self.method,
            headless: self.headed.then_some(false),
            rate_limit_cooldown_secs: self.cooldown,
            respect_retry_after: self.respect_retry_after.then_some(true),
        }
    }
}

/// Ask which strategy to use until a valid answer arrives.
pub fn prompt_strategy<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
) -> Result<Strategy, AppError> {
    loop {
        writeln!(output, "Select check method:")?;
        writeln!(output, "  1) http    - fast, server-rendered pages only")?;
        writeln!(output, "  2) browser - renders JavaScript, slower")?;
        write!(output, "> ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(AppError::Validation("No check method selected".into()));
        }

        match line.trim().to_lowercase().as_str() {
            "1" | "http" => return Ok(Strategy::Http),
            "2" | "browser" => return Ok(Strategy::Browser),
            other => writeln!(output, "Unknown choice '{}'", other)?,
        }
    }
}
