//! Types for the fleet orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::DeviceIdentity;
use crate::wire::WorkItem;

/// Errors that can occur while driving a run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Endpoint resolution failed.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Report persistence failed.
    #[error("report error: {0}")]
    Report(#[from] crate::report::ReportError),

    /// `run` was called on an orchestrator that already left `Init`.
    #[error("fleet already run (phase: {0})")]
    AlreadyRun(FleetPhase),

    /// The aggregator task did not return a report.
    #[error("aggregator failed: {0}")]
    Aggregator(String),
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FleetPhase {
    Init,
    PhaseARunning,
    PhaseADone,
    WorkExtraction,
    PhaseBRunning,
    PhaseBDone,
    Finalized,
}

impl std::fmt::Display for FleetPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::PhaseARunning => "phase_a_running",
            Self::PhaseADone => "phase_a_done",
            Self::WorkExtraction => "work_extraction",
            Self::PhaseBRunning => "phase_b_running",
            Self::PhaseBDone => "phase_b_done",
            Self::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

/// Work items one device will move to "departure", in order.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkAssignment {
    pub identity: DeviceIdentity,
    pub items: Vec<WorkItem>,
}
