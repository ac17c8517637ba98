use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::metrics;

use super::{OutcomeHandle, Outcome, Report, StreamingSink};

/// Background task that drains the outcome channel into the report.
///
/// There is exactly one aggregator per run and it is the only writer of the
/// [`Report`], so classification and append need no lock.
pub struct ResultAggregator {
    rx: mpsc::Receiver<Outcome>,
    report: Report,
    stream: Option<StreamingSink>,
}

impl ResultAggregator {
    /// Create a new aggregator filling `report`.
    pub fn new(rx: mpsc::Receiver<Outcome>, report: Report) -> Self {
        Self {
            rx,
            report,
            stream: None,
        }
    }

    /// Also append every outcome to per-category files as it arrives.
    pub fn with_stream(mut self, stream: StreamingSink) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Run the aggregator, consuming outcomes until the channel is closed
    ///
    /// Spawn this with `tokio::spawn(aggregator.run())`; the join handle
    /// yields the filled report once every `OutcomeHandle` is dropped.
    pub async fn run(mut self) -> Report {
        info!("Result aggregator started");

        while let Some(outcome) = self.rx.recv().await {
            metrics::observe_outcome(&outcome);

            if let Some(stream) = self.stream.as_mut() {
                if let Err(e) = stream.append(&outcome).await {
                    warn!("Failed to stream outcome: {}", e);
                }
            }

            self.report.record(outcome);
        }

        if let Some(stream) = self.stream.as_mut() {
            if let Err(e) = stream.flush().await {
                warn!("Failed to flush outcome stream: {}", e);
            }
        }

        info!(
            fetch = self.report.fetch_results.len(),
            update = self.report.update_results.len(),
            other = self.report.other_results.len(),
            "Result aggregator shutting down"
        );
        self.report
    }
}

/// Create the outcome channel and its single consumer
///
/// Returns:
/// - `OutcomeHandle` - clone into every device task
/// - `ResultAggregator` - spawn as a background task
pub fn create_outcome_pipeline(report: Report, buffer_size: usize) -> (OutcomeHandle, ResultAggregator) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (OutcomeHandle::new(tx), ResultAggregator::new(rx, report))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::report::OperationKind;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_aggregator_classifies_outcomes() {
        let (handle, aggregator) = create_outcome_pipeline(Report::new(Utc::now()), 10);
        let task = tokio::spawn(aggregator.run());

        handle
            .emit(fixtures::outcome(OperationKind::FetchManifest, "d1", 200))
            .await;
        handle
            .emit(fixtures::outcome(OperationKind::UpdateStatus, "d1", 200))
            .await;
        handle
            .emit(fixtures::outcome(OperationKind::Other, "d2", 0))
            .await;
        drop(handle);

        let report = task.await.unwrap();
        assert_eq!(report.fetch_results.len(), 1);
        assert_eq!(report.update_results.len(), 1);
        assert_eq!(report.other_results.len(), 1);
    }

    #[tokio::test]
    async fn test_aggregator_waits_for_all_handles() {
        let (handle, aggregator) = create_outcome_pipeline(Report::new(Utc::now()), 10);
        let device_handle = handle.clone();
        let task = tokio::spawn(aggregator.run());

        device_handle
            .emit(fixtures::outcome(OperationKind::FetchManifest, "d1", 200))
            .await;
        drop(handle);

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        assert!(
            !task.is_finished(),
            "Aggregator should still be running with a handle alive"
        );

        device_handle
            .emit(fixtures::outcome(OperationKind::UpdateStatus, "d1", 200))
            .await;
        drop(device_handle);

        let report = tokio::time::timeout(tokio::time::Duration::from_secs(1), task)
            .await
            .expect("Aggregator should exit after all handles dropped")
            .unwrap();
        assert_eq!(report.total(), 2);
    }

    #[tokio::test]
    async fn test_arrival_order_kept_within_category() {
        let (handle, aggregator) = create_outcome_pipeline(Report::new(Utc::now()), 2);
        let task = tokio::spawn(aggregator.run());

        for device in ["a", "b", "c", "d", "e"] {
            handle
                .emit(fixtures::outcome(OperationKind::UpdateStatus, device, 200))
                .await;
        }
        drop(handle);

        let report = task.await.unwrap();
        let order: Vec<_> = report
            .update_results
            .iter()
            .map(|o| o.device_id.as_str())
            .collect();
        assert_eq!(order, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_concurrent_producers_lose_nothing() {
        let (handle, aggregator) = create_outcome_pipeline(Report::new(Utc::now()), 4);
        let task = tokio::spawn(aggregator.run());

        let producers: Vec<_> = (0..20)
            .map(|i| {
                let handle = handle.clone();
                tokio::spawn(async move {
                    let device = format!("d{}", i);
                    handle
                        .emit(fixtures::outcome(OperationKind::FetchManifest, &device, 200))
                        .await;
                    for _ in 0..3 {
                        handle
                            .emit(fixtures::outcome(OperationKind::UpdateStatus, &device, 200))
                            .await;
                    }
                })
            })
            .collect();
        drop(handle);
        futures::future::join_all(producers).await;

        let report = task.await.unwrap();
        assert_eq!(report.fetch_results.len(), 20);
        assert_eq!(report.update_results.len(), 60);
        assert_eq!(report.total(), 80);
    }

    #[tokio::test]
    async fn test_aggregator_streams_outcomes() {
        let dir = TempDir::new().unwrap();
        let stream = StreamingSink::create(dir.path()).await.unwrap();
        let (handle, aggregator) = create_outcome_pipeline(Report::new(Utc::now()), 10);
        let task = tokio::spawn(aggregator.with_stream(stream).run());

        handle
            .emit(fixtures::outcome(OperationKind::FetchManifest, "d1", 200))
            .await;
        handle
            .emit(fixtures::outcome(OperationKind::FetchManifest, "d2", 404))
            .await;
        drop(handle);
        task.await.unwrap();

        let fetch = std::fs::read_to_string(dir.path().join("fetch_results.jsonl")).unwrap();
        assert_eq!(fetch.lines().count(), 2);
        let update = std::fs::read_to_string(dir.path().join("update_results.jsonl")).unwrap();
        assert!(update.is_empty());
    }
}
