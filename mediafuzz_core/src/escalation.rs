//! Fault escalation: turns framework log severity into process fate.
//!
//! Media parsers often log a warning or critical and carry on in a half-broken
//! state. Aborting on criticals makes the fuzzing engine record the input as a
//! crash instead of letting the condition pass unnoticed.

use log::{Level, LevelFilter, Log, Metadata, Record};
use serde::Deserialize;
use std::io::{self, Write};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Critical,
    Warning,
    Message,
    Info,
    Debug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Report, then abort without unwinding or cleanup.
    Abort,
    Report,
    Ignore,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct EscalationPolicy {
    /// Treat warnings like criticals.
    #[serde(default)]
    pub fatal_warnings: bool,
}

impl EscalationPolicy {
    pub fn action_for(&self, severity: Severity) -> Action {
        match severity {
            Severity::Error | Severity::Critical => Action::Abort,
            Severity::Warning if self.fatal_warnings => Action::Abort,
            Severity::Warning => Action::Report,
            Severity::Message | Severity::Info | Severity::Debug => Action::Ignore,
        }
    }
}

/// The single process-wide log sink.
#[derive(Debug)]
pub struct FaultEscalation {
    policy: EscalationPolicy,
}

static INSTALLED: OnceLock<FaultEscalation> = OnceLock::new();

impl FaultEscalation {
    pub fn new(policy: EscalationPolicy) -> Self {
        Self { policy }
    }

    /// Installs the sink as the `log` backend on first use and returns it.
    ///
    /// Later calls return the sink installed first, whatever `policy` they
    /// pass. If another `log` backend got there before us, only framework
    /// records reach the sink.
    pub fn install(policy: EscalationPolicy) -> &'static FaultEscalation {
        let mut fresh = false;
        let sink = INSTALLED.get_or_init(|| {
            fresh = true;
            FaultEscalation::new(policy)
        });
        if fresh {
            match log::set_logger(sink) {
                Ok(()) => log::set_max_level(LevelFilter::Warn),
                Err(_) => {
                    let _ = writeln!(
                        io::stderr(),
                        "WARNING : a logger was already installed, harness diagnostics bypass escalation"
                    );
                }
            }
        }
        sink
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    /// Writes the record to `out` when the policy calls for it and returns
    /// the action to take. Never terminates by itself.
    pub fn report<W: Write>(&self, out: &mut W, severity: Severity, message: &str) -> Action {
        let action = self.policy.action_for(severity);
        let prefix = match action {
            Action::Abort => "CRITICAL ERROR",
            Action::Report => "WARNING",
            Action::Ignore => return action,
        };
        // stderr going away must not change what happens next
        let _ = writeln!(out, "{prefix} : {message}");
        let _ = out.flush();
        action
    }

    /// Handles one record, aborting the process on [`Action::Abort`].
    pub fn handle(&self, severity: Severity, _domain: Option<&str>, message: &str) {
        if self.report(&mut io::stderr().lock(), severity, message) == Action::Abort {
            std::process::abort();
        }
    }
}

impl Log for FaultEscalation {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record) {
        let severity = match record.level() {
            Level::Error => Severity::Critical,
            Level::Warn => Severity::Warning,
            Level::Info => Severity::Info,
            Level::Debug | Level::Trace => Severity::Debug,
        };
        self.handle(severity, Some(record.target()), &record.args().to_string());
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}
