pub mod config;
pub mod error;
pub mod escalation;
pub mod executor;
pub mod framework;
#[cfg(feature = "gstreamer")]
pub mod gstreamer;
pub mod harness;
pub mod init;
pub mod input;
pub mod oracle;
pub mod plugins;
pub mod source;
pub mod triage;

#[cfg(test)]
mod testing;

pub use config::{HarnessConfig, MediafuzzConfig, TriageSettings};
pub use error::{HarnessError, SETUP_FAILURE_EXIT_CODE};
pub use escalation::{Action, EscalationPolicy, FaultEscalation, Severity};
pub use executor::{
    CommandExecutor, CommandExecutorConfig, Execution, ExecutionStatus, Executor, InputDelivery,
    ProcessOutput,
};
pub use framework::Framework;
pub use harness::FuzzTarget;
pub use harness::discoverer::DiscovererHarness;
pub use harness::typefind::TypefindHarness;
pub use input::{FuzzInput, Input};
pub use oracle::{BugReport, CrashOracle, FindingKind, Oracle};
pub use plugins::Registration;
pub use source::{ByteSource, Chunk, DeliveryMode, RequestLength};
pub use triage::{Triage, TriageSummary, collect_inputs};
