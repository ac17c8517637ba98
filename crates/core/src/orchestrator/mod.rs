//! Fleet orchestrator for the two-phase simulation.
//!
//! The orchestrator drives a run through its phases:
//! - **Phase A**: concurrent manifest fetch, one task per device
//! - **Work extraction**: single-threaded, pure function of device state
//! - **Phase B**: concurrent per-device status updates, sequential per device

mod extract;
mod runner;
mod types;

pub use extract::extract_work;
pub use runner::{config_hash, FleetOrchestrator};
pub use types::{FleetPhase, OrchestratorError, WorkAssignment};
