//! Fleet orchestrator implementation.
//!
//! Drives one run through both phases:
//! - Phase A: every device fetches its manifest (concurrent, bounded)
//! - Work extraction: single-threaded, after the Phase A barrier
//! - Phase B: every device with work updates its items (devices concurrent,
//!   items of one device sequential)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::config::{Endpoint, HiveConfig};
use crate::device::{Device, DeviceClient, Transport};
use crate::identity::DeviceIdentity;
use crate::metrics;
use crate::report::{
    create_outcome_pipeline, write_report, OperationKind, Outcome, OutcomeHandle, Report,
    StreamingSink,
};

use super::extract::extract_work;
use super::types::{FleetPhase, OrchestratorError, WorkAssignment};

/// Short SHA-256 of the serialized config, stamped into the report.
pub fn config_hash(config: &HiveConfig) -> String {
    let json = serde_json::to_string(config).unwrap_or_default();
    let hash = format!("{:x}", Sha256::digest(json.as_bytes()));
    hash[..16].to_string()
}

/// The fleet orchestrator - owns every device and runs both phases.
pub struct FleetOrchestrator {
    config: HiveConfig,
    fetch: Endpoint,
    update: Endpoint,
    client: DeviceClient,
    devices: Vec<Device>,
    assignments: Vec<WorkAssignment>,
    phase: FleetPhase,
    persist: bool,
}

impl FleetOrchestrator {
    /// Create an orchestrator with one device per identity.
    pub fn new(
        config: HiveConfig,
        identities: Vec<DeviceIdentity>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, OrchestratorError> {
        let fetch = config.fetch()?;
        let update = config.update()?;
        let client = DeviceClient::new(transport, config.server.clone());
        let devices = identities.into_iter().map(Device::new).collect();

        Ok(Self {
            config,
            fetch,
            update,
            client,
            devices,
            assignments: Vec::new(),
            phase: FleetPhase::Init,
            persist: true,
        })
    }

    /// Skip the report file and streaming files; the report is only returned.
    pub fn without_persistence(mut self) -> Self {
        self.persist = false;
        self
    }

    pub fn phase(&self) -> FleetPhase {
        self.phase
    }

    /// Devices in identity order; after Phase A they carry their fetch result.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Work extracted after Phase A.
    pub fn assignments(&self) -> &[WorkAssignment] {
        &self.assignments
    }

    fn transition(&mut self, next: FleetPhase) {
        info!(from = %self.phase, to = %next, "Fleet phase changed");
        self.phase = next;
    }

    fn semaphore(&self, tasks: usize) -> Arc<Semaphore> {
        let permits = match self.config.max_concurrency {
            0 => tasks.max(1),
            limit => limit,
        };
        Arc::new(Semaphore::new(permits.min(Semaphore::MAX_PERMITS)))
    }

    /// Run both phases and return the aggregated report.
    ///
    /// Unless persistence is disabled, the report is written to
    /// `report.path` and, with `report.stream_dir`, outcomes are streamed to
    /// per-category files while the run is in progress.
    pub async fn run(&mut self) -> Result<Report, OrchestratorError> {
        if self.phase != FleetPhase::Init {
            return Err(OrchestratorError::AlreadyRun(self.phase));
        }

        let started = Instant::now();
        let mut report = Report::new(Utc::now());
        report.config_hash = Some(config_hash(&self.config));
        metrics::FLEET_DEVICES.set(self.devices.len() as i64);
        info!(
            run_id = %report.run_id,
            devices = self.devices.len(),
            max_concurrency = self.config.max_concurrency,
            "Starting fleet run"
        );

        let (outcomes, mut aggregator) =
            create_outcome_pipeline(report, self.config.outcome_buffer.max(1));
        if self.persist {
            if let Some(dir) = &self.config.report.stream_dir {
                aggregator = aggregator.with_stream(StreamingSink::create(dir).await?);
            }
        }
        let aggregator_task = tokio::spawn(aggregator.run());

        self.transition(FleetPhase::PhaseARunning);
        self.run_fetch_phase(&outcomes).await;
        self.transition(FleetPhase::PhaseADone);

        self.transition(FleetPhase::WorkExtraction);
        self.assignments = extract_work(&self.devices, self.config.extraction_policy);
        let items: usize = self.assignments.iter().map(|a| a.items.len()).sum();
        metrics::DEVICES_WITH_WORK.set(self.assignments.len() as i64);
        metrics::WORK_ITEMS.set(items as i64);
        info!(
            devices_with_work = self.assignments.len(),
            items,
            policy = ?self.config.extraction_policy,
            "Work extracted"
        );

        self.transition(FleetPhase::PhaseBRunning);
        self.run_update_phase(&outcomes).await;
        self.transition(FleetPhase::PhaseBDone);

        // Last sender: dropping it ends the aggregator's stream.
        drop(outcomes);
        let mut report = aggregator_task
            .await
            .map_err(|e| OrchestratorError::Aggregator(e.to_string()))?;
        report.elapsed_time = started.elapsed().as_secs_f64();

        if self.persist {
            write_report(&report, &self.config.report.path).await?;
        }
        self.transition(FleetPhase::Finalized);

        info!(
            elapsed = format!("{:.5}s", report.elapsed_time),
            outcomes = report.total(),
            transport_failures = report.transport_failures(),
            "Fleet run finished"
        );
        Ok(report)
    }

    async fn run_fetch_phase(&mut self, outcomes: &OutcomeHandle) {
        let devices = std::mem::take(&mut self.devices);
        let semaphore = self.semaphore(devices.len());

        let mut identities = Vec::with_capacity(devices.len());
        let mut tasks = Vec::with_capacity(devices.len());
        for mut device in devices {
            identities.push(device.identity().clone());
            let client = self.client.clone();
            let endpoint = self.fetch.clone();
            let outcomes = outcomes.clone();
            let semaphore = Arc::clone(&semaphore);

            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.ok();
                let outcome = client.fetch_manifest(&mut device, &endpoint).await;
                outcomes.emit(outcome).await;
                device
            }));
        }

        // Barrier: every fetch has finished before extraction starts.
        let results = join_all(tasks).await;
        for (identity, result) in identities.into_iter().zip(results) {
            match result {
                Ok(device) => self.devices.push(device),
                Err(e) => {
                    error!(device = %identity.id, "Fetch task failed: {}", e);
                    let url = self.client.url_for(&self.fetch, &identity.id);
                    outcomes
                        .emit(task_failure(OperationKind::FetchManifest, &identity, url, &e))
                        .await;
                    self.devices.push(Device::new(identity));
                }
            }
        }
    }

    async fn run_update_phase(&mut self, outcomes: &OutcomeHandle) {
        let semaphore = self.semaphore(self.assignments.len());

        let mut progress = Vec::with_capacity(self.assignments.len());
        let mut tasks = Vec::with_capacity(self.assignments.len());
        for assignment in self.assignments.iter().cloned() {
            let client = self.client.clone();
            let endpoint = self.update.clone();
            let outcomes = outcomes.clone();
            let semaphore = Arc::clone(&semaphore);
            let sent = Arc::new(AtomicUsize::new(0));
            progress.push(Arc::clone(&sent));

            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.ok();
                for item in &assignment.items {
                    let outcome = client
                        .update_status(&assignment.identity, item, &endpoint)
                        .await;
                    outcomes.emit(outcome).await;
                    sent.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }

        // Barrier: every device sequence has finished.
        let results = join_all(tasks).await;
        for ((assignment, sent), result) in self.assignments.iter().zip(progress).zip(results) {
            let Err(e) = result else {
                continue;
            };
            let sent = sent.load(Ordering::SeqCst);
            error!(
                device = %assignment.identity.id,
                sent,
                items = assignment.items.len(),
                "Update task failed: {}",
                e
            );
            // Items the task never reported on, including the one it died on.
            for item in assignment.items.iter().skip(sent) {
                let target = item.addressable_id().map(|id| id.to_string()).unwrap_or_default();
                let url = self.client.url_for(&self.update, &target);
                outcomes
                    .emit(task_failure(OperationKind::UpdateStatus, &assignment.identity, url, &e))
                    .await;
            }
        }
    }
}

/// Outcome standing in for a call whose task panicked before reporting.
fn task_failure(
    kind: OperationKind,
    identity: &DeviceIdentity,
    url: String,
    error: &tokio::task::JoinError,
) -> Outcome {
    Outcome::failed(
        kind,
        identity,
        url,
        format!("{} task failed: {}", kind, error),
        Duration::ZERO,
    )
}
