//! Defines an abstraction over the event sending mechanism.

use super::events::RunEvent;
use tokio::sync::mpsc::UnboundedSender;

/// A trait that abstracts the sending of run events.
/// This is "fire-and-forget" and doesn't return a result, simplifying its use.
pub trait EventProxy: Send + Sync + Clone + 'static {
    fn send_event(&self, event: RunEvent);
}

impl EventProxy for UnboundedSender<RunEvent> {
    fn send_event(&self, event: RunEvent) {
        // A dropped receiver only means nobody is listening any more.
        if let Err(e) = self.send(event) {
            tracing::warn!("Failed to deliver run event: {}", e);
        }
    }
}
