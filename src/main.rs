use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

use stock_watcher::cli::{Cli, prompt_strategy};
use stock_watcher::config::LoggingConfig;
use stock_watcher::plugins::reporters::ConsoleReporter;
use stock_watcher::plugins::traits::{ProgressReporter, StockChecker};
use stock_watcher::utils::telemetry;
use stock_watcher::{AppConfig, MonitorConfig, MonitorEvent, PluginManager, RunLoop, Strategy};

struct Monitor {
    config: MonitorConfig,
    checker: Box<dyn StockChecker>,
    reporter: PluginManager,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref(), &cli.overrides()) {
        Ok(config) => config,
        Err(e) => {
            if let Err(log_err) = telemetry::init_logging(&LoggingConfig::default()) {
                eprintln!("Failed to initialize logging: {}", log_err);
            }
            let console = ConsoleReporter::new("stock-watcher");
            return fatal(&console, &anyhow::Error::new(e).context("loading configuration")).await;
        }
    };

    // Hold the guard so buffered file logs are flushed on exit
    let _log_guard = match telemetry::init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    info!("Starting Stock Watcher...");

    let monitors = match start_monitors(&config).await {
        Ok(monitors) => monitors,
        Err(e) => {
            let console = ConsoleReporter::new("stock-watcher");
            return fatal(&console, &e).await;
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_ctrl_c(cancel.clone()));

    let mut loops = JoinSet::new();
    for monitor in monitors {
        let run_loop = RunLoop::new(
            monitor.config,
            monitor.checker,
            Arc::new(monitor.reporter),
            cancel.child_token(),
        );
        loops.spawn(run_loop.run());
    }

    while let Some(joined) = loops.join_next().await {
        match joined {
            Ok(stats) => info!(
                "{}: {} checks, last status {:?}, average load {:.0} ms",
                stats.url,
                stats.run_count,
                stats.last_status,
                stats.average_check_time_ms()
            ),
            Err(e) => tracing::error!("Monitor task failed: {}", e),
        }
    }

    info!("Stock Watcher stopped");
    ExitCode::SUCCESS
}

/// Everything that can fail before polling starts: telemetry, strategy
/// selection, URL validation, and checker construction.
async fn start_monitors(config: &AppConfig) -> Result<Vec<Monitor>> {
    telemetry::init_metrics(&config.metrics).context("starting metrics exporter")?;

    let strategy = resolve_strategy(config.monitor.strategy)?;
    let targets = config.monitor_configs(strategy).context("validating monitor targets")?;

    let mut monitors: Vec<Monitor> = Vec::with_capacity(targets.len());
    for target in targets {
        let reporter = PluginManager::new();
        reporter
            .initialize_default_reporters(config, &target)
            .await
            .context("setting up reporters")?;

        let checker = match PluginManager::build_checker(&target, config).await {
            Ok(checker) => checker,
            Err(e) => {
                // Release sessions already acquired for earlier URLs
                for monitor in &monitors {
                    if let Err(shutdown_err) = monitor.checker.shutdown().await {
                        tracing::warn!("Error releasing session: {}", shutdown_err);
                    }
                }
                return Err(anyhow::Error::new(e).context(format!("starting {} checker", strategy)));
            }
        };

        info!("Watching {} with the {} method", target.url, strategy);
        monitors.push(Monitor {
            config: target,
            checker,
            reporter,
        });
    }

    Ok(monitors)
}

fn resolve_strategy(configured: Option<Strategy>) -> Result<Strategy> {
    if let Some(strategy) = configured {
        return Ok(strategy);
    }

    if std::io::stdin().is_terminal() {
        let stdin = std::io::stdin();
        let strategy =
            prompt_strategy(stdin.lock(), std::io::stdout()).context("reading check method")?;
        Ok(strategy)
    } else {
        info!("No check method given and stdin is not a terminal; using http");
        Ok(Strategy::Http)
    }
}

async fn shutdown_on_ctrl_c(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        return;
    }
    info!("Interrupt received, stopping monitors");
    cancel.cancel();
}

async fn fatal(reporter: &dyn ProgressReporter, err: &anyhow::Error) -> ExitCode {
    tracing::error!("{:#}", err);
    reporter.report(&MonitorEvent::FatalError(format!("{:#}", err))).await;
    reporter.report(&MonitorEvent::ShuttingDown).await;
    ExitCode::FAILURE
}
