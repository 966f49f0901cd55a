use crate::executor::{ExecutionStatus, ProcessOutput};
use crate::input::Input;

const DEFAULT_CRASH_SEVERITY: u8 = 10;
const DEFAULT_HANG_SEVERITY: u8 = 5;

/// Prefix the escalation sink puts on the line it writes before aborting.
const CRITICAL_PREFIX: &str = "CRITICAL ERROR : ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingKind {
    Crash,
    Hang,
}

impl FindingKind {
    /// Artifact prefix, the same one libFuzzer uses for these findings.
    pub fn artifact_prefix(self) -> &'static str {
        match self {
            FindingKind::Crash => "crash",
            FindingKind::Hang => "timeout",
        }
    }
}

#[derive(Debug)]
pub struct BugReport<I: Input> {
    pub input: I,
    pub description: String,
    /// Hex MD5 of the input.
    pub input_hash: String,
    pub severity: u8,
    pub kind: FindingKind,
}

impl<I: Input> BugReport<I> {
    pub fn artifact_name(&self) -> String {
        format!("{}-{}", self.kind.artifact_prefix(), self.input_hash)
    }
}

/// Decides whether one replay revealed a bug.
pub trait Oracle<I: Input>: Send + Sync {
    fn examine(
        &self,
        input: &I,
        status: &ExecutionStatus,
        target_output: Option<&ProcessOutput>,
    ) -> Option<BugReport<I>>;
}

/// Reports crashes and hangs. A crash is described by the critical message
/// that caused the abort when the harness printed one.
#[derive(Debug, Default)]
pub struct CrashOracle;

impl CrashOracle {
    pub fn new() -> Self {
        CrashOracle
    }
}

fn critical_message(output: &ProcessOutput) -> Option<String> {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .find_map(|line| line.strip_prefix(CRITICAL_PREFIX))
        .map(|message| message.trim_end().to_string())
}

impl<I> Oracle<I> for CrashOracle
where
    I: Input + Clone,
{
    fn examine(
        &self,
        input: &I,
        status: &ExecutionStatus,
        target_output: Option<&ProcessOutput>,
    ) -> Option<BugReport<I>> {
        let (kind, severity, description) = match status {
            ExecutionStatus::Crash(description) => {
                let description = match target_output.and_then(critical_message) {
                    Some(message) => format!("{message} ({description})"),
                    None => description.clone(),
                };
                (FindingKind::Crash, DEFAULT_CRASH_SEVERITY, description)
            }
            ExecutionStatus::Timeout => (
                FindingKind::Hang,
                DEFAULT_HANG_SEVERITY,
                "Timed out".to_string(),
            ),
            ExecutionStatus::Ok | ExecutionStatus::SetupFailure(_) | ExecutionStatus::Other(_) => {
                return None;
            }
        };

        let input_digest = md5::compute(input.as_bytes());
        Some(BugReport {
            input: input.clone(),
            description,
            input_hash: format!("{input_digest:x}"),
            severity,
            kind,
        })
    }
}
