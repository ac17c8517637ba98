pub mod config;
pub mod device;
pub mod identity;
pub mod metrics;
pub mod orchestrator;
pub mod report;
pub mod testing;
pub mod wire;

pub use config::{
    load_config, load_config_from_str, validate_config, ConfigError, ExtractionPolicy, HiveConfig,
};
pub use device::{Device, DeviceClient, HttpTransport, Transport, TransportError};
pub use identity::{load_identities, DeviceIdentity, IdentityError, TokenIssuer};
pub use orchestrator::{FleetOrchestrator, FleetPhase, OrchestratorError};
pub use report::{write_report, OperationKind, Outcome, Report, ReportError};
