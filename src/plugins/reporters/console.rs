use async_trait::async_trait;
use chrono::Local;
use std::sync::Mutex;

use crate::models::{MonitorEvent, StockStatus};
use crate::plugins::traits::ProgressReporter;

/// Prints one timestamped line per event and flags availability transitions.
pub struct ConsoleReporter {
    label: String,
    last_status: Mutex<Option<StockStatus>>,
}

impl ConsoleReporter {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            last_status: Mutex::new(None),
        }
    }

    /// Format the line for `event`, updating the remembered status.
    pub fn render(&self, event: &MonitorEvent) -> String {
        let mut line = format!("[{}] {}: {}", Local::now().format("%H:%M:%S"), self.label, event);

        if let Some(status) = event.stock_status() {
            let previous = match self.last_status.lock() {
                Ok(mut guard) => guard.replace(status),
                Err(poisoned) => poisoned.into_inner().replace(status),
            };
            if let Some(note) = transition_note(previous, status) {
                line.push_str(" (");
                line.push_str(note);
                line.push(')');
            }
        }

        line
    }
}

fn transition_note(previous: Option<StockStatus>, current: StockStatus) -> Option<&'static str> {
    match (previous?, current) {
        (StockStatus::InStock, StockStatus::InStock) => None,
        (_, StockStatus::InStock) => Some("back in stock"),
        (StockStatus::InStock, StockStatus::OutOfStock) => Some("sold out"),
        _ => None,
    }
}

#[async_trait]
impl ProgressReporter for ConsoleReporter {
    fn name(&self) -> &str {
        "console"
    }

    async fn report(&self, event: &MonitorEvent) {
        let line = self.render(event);
        if event.is_error() {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}
