use crate::framework::PipelineState;
use thiserror::Error;

/// Failures relayed from the media framework or from harness setup.
///
/// None of these is a finding. Entry points absorb them, except the setup
/// class (see [`HarnessError::is_fatal_setup`]) which ends the process with
/// status 1.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HarnessError {
    #[error("framework bootstrap failed: {0}")]
    Bootstrap(String),
    #[error("plugin '{name}' could not be registered: {reason}")]
    PluginRegistration { name: String, reason: String },
    #[error("element setup failed: {0}")]
    Element(String),
    #[error("state change to {0:?} failed")]
    StateChange(PipelineState),
    #[error("discoverer could not be created: {0}")]
    Discoverer(String),
    #[error("discovery failed: {0}")]
    Discovery(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl HarnessError {
    /// Environment problems that must not be reported as fuzz findings.
    pub fn is_fatal_setup(&self) -> bool {
        matches!(
            self,
            HarnessError::Bootstrap(_)
                | HarnessError::PluginRegistration { .. }
                | HarnessError::Element(_)
                | HarnessError::Discoverer(_)
                | HarnessError::Config(_)
        )
    }
}

/// Exit status for fatal setup errors, distinct from crashes.
pub const SETUP_FAILURE_EXIT_CODE: i32 = 1;

/// Reports a fatal setup error and exits without unwinding.
pub fn fatal_setup_error(err: &HarnessError) -> ! {
    eprintln!("Error initializing: {err}");
    std::process::exit(SETUP_FAILURE_EXIT_CODE)
}
