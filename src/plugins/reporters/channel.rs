use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::models::MonitorEvent;
use crate::plugins::traits::ProgressReporter;

/// Forwards events to an mpsc receiver. Events are dropped silently once the
/// receiver is gone.
pub struct ChannelReporter {
    sender: mpsc::UnboundedSender<MonitorEvent>,
}

impl ChannelReporter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MonitorEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl ProgressReporter for ChannelReporter {
    fn name(&self) -> &str {
        "channel"
    }

    async fn report(&self, event: &MonitorEvent) {
        if self.sender.send(event.clone()).is_err() {
            tracing::trace!("Event receiver dropped");
        }
    }
}
