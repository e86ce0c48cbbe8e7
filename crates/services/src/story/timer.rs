use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::debug;

use super::events::FeedbackTicket;

/// Delivers a feedback ticket after its delay on the tokio runtime.
///
/// Scheduling replaces any pending ticket; cancelling or dropping the timer
/// aborts the wait so nothing is delivered.
#[derive(Debug, Default)]
pub struct FeedbackTimer {
    pending: Option<(FeedbackTicket, JoinHandle<()>)>,
}

impl FeedbackTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Must be called from within a tokio runtime.
    pub fn schedule(
        &mut self,
        ticket: FeedbackTicket,
        delay: Duration,
        fired: UnboundedSender<FeedbackTicket>,
    ) {
        self.cancel();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = fired.send(ticket);
        });
        self.pending = Some((ticket, handle));
    }

    /// Abort the pending wait. Returns the ticket that will no longer fire.
    pub fn cancel(&mut self) -> Option<FeedbackTicket> {
        let (ticket, handle) = self.pending.take()?;
        if handle.is_finished() {
            return None;
        }
        handle.abort();
        debug!(ticket = ticket.generation(), "feedback advance cancelled");
        Some(ticket)
    }

    #[must_use]
    pub fn pending(&self) -> Option<FeedbackTicket> {
        self.pending
            .as_ref()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(ticket, _)| *ticket)
    }
}

impl Drop for FeedbackTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
