//! Background completion gate.
//!
//! When the host process is woken only to finish pending transfers, it arms
//! the gate with an acknowledgment it expects back exactly once, after the
//! subsystem drains its batch and the resulting state refresh has been
//! applied. The gate also remembers the first item that reached `Completed`
//! during the batch, so the presentation layer can be told which item is
//! ready to present; that bookkeeping is cleared when consumed.

use tokio::sync::oneshot;
use tracing::{debug, warn};

/// One-shot acknowledgment back to the host.
pub(crate) type BatchAck = oneshot::Sender<()>;

/// Tracks the pending background acknowledgment and per-batch bookkeeping.
#[derive(Default)]
pub(crate) struct CompletionGate {
    ack: Option<BatchAck>,
    first_completed: Option<usize>,
}

impl CompletionGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Arm the gate with a new acknowledgment.
    ///
    /// If an ack is already pending (a second wake-up before the first
    /// drain), the displaced ack is fired immediately rather than dropped:
    /// its waker only needs to know it may proceed, and losing it would
    /// strand that waker forever.
    pub(crate) fn arm(&mut self, ack: BatchAck) {
        if let Some(previous) = self.ack.replace(ack) {
            warn!("second background wake-up before drain; releasing the earlier acknowledgment");
            let _ = previous.send(());
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.ack.is_some()
    }

    /// Remember the first item that reached `Completed` in this batch.
    pub(crate) fn record_completed(&mut self, index: usize) {
        if self.first_completed.is_none() {
            self.first_completed = Some(index);
        }
    }

    /// Consume the first-completed bookkeeping.
    pub(crate) fn take_first_completed(&mut self) -> Option<usize> {
        self.first_completed.take()
    }

    /// Fire the pending acknowledgment, if armed. No-op otherwise.
    pub(crate) fn fire(&mut self) {
        match self.ack.take() {
            Some(ack) => {
                debug!("releasing background completion acknowledgment");
                let _ = ack.send(());
            }
            None => debug!("batch drained with no acknowledgment armed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_without_arming_is_noop() {
        let mut gate = CompletionGate::new();
        assert!(!gate.is_armed());
        gate.fire(); // must not panic
    }

    #[tokio::test]
    async fn test_ack_fires_exactly_once() {
        let mut gate = CompletionGate::new();
        let (tx, rx) = oneshot::channel();
        gate.arm(tx);

        gate.fire();
        assert!(!gate.is_armed());
        rx.await.expect("ack should fire");

        // A second drain is a no-op.
        gate.fire();
    }

    #[tokio::test]
    async fn test_second_wake_releases_first_ack() {
        let mut gate = CompletionGate::new();
        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();

        gate.arm(tx1);
        gate.arm(tx2);

        // The displaced ack fired at replacement time.
        rx1.await.expect("first ack should be released");

        gate.fire();
        rx2.await.expect("second ack should fire on drain");
    }

    #[test]
    fn test_first_completed_consumed_once() {
        let mut gate = CompletionGate::new();

        gate.record_completed(2);
        gate.record_completed(0); // later completions do not overwrite

        assert_eq!(gate.take_first_completed(), Some(2));
        assert_eq!(gate.take_first_completed(), None);
    }
}
