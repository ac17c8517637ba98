use tokio::sync::mpsc;

use super::Outcome;

/// Handle for emitting outcomes to the aggregator
///
/// This is cheaply cloneable and can be shared across device tasks.
/// The aggregator stops once every clone has been dropped.
#[derive(Clone)]
pub struct OutcomeHandle {
    tx: mpsc::Sender<Outcome>,
}

impl OutcomeHandle {
    /// Create a new outcome handle from a channel sender
    pub fn new(tx: mpsc::Sender<Outcome>) -> Self {
        Self { tx }
    }

    /// Emit an outcome, waiting for channel capacity.
    ///
    /// If the aggregator is gone the outcome is logged and dropped; the
    /// device task is never failed because of it.
    pub async fn emit(&self, outcome: Outcome) {
        if let Err(e) = self.tx.send(outcome).await {
            tracing::error!(
                kind = %e.0.kind,
                device = %e.0.device_id,
                "Failed to emit outcome: aggregator closed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use crate::report::OperationKind;

    #[tokio::test]
    async fn test_emit_outcome() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = OutcomeHandle::new(tx);

        handle
            .emit(fixtures::outcome(OperationKind::FetchManifest, "d1", 200))
            .await;

        let outcome = rx.recv().await.expect("Should receive outcome");
        assert_eq!(outcome.kind, OperationKind::FetchManifest);
        assert_eq!(outcome.device_id, "d1");
    }

    #[tokio::test]
    async fn test_emit_closed_channel() {
        let (tx, rx) = mpsc::channel::<Outcome>(10);
        let handle = OutcomeHandle::new(tx);
        drop(rx);

        // Logged, not panicking
        handle
            .emit(fixtures::outcome(OperationKind::UpdateStatus, "d1", 200))
            .await;
    }
}
