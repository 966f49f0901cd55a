//! Fuzz entry points. Each owns its framework handle and configuration; the
//! framework itself is brought up once per process, whichever entry point
//! gets there first.

pub mod discoverer;
pub mod typefind;

use crate::HarnessError;
use crate::config::HarnessConfig;
use crate::escalation::FaultEscalation;
use crate::framework::Framework;
use crate::init::InitGuard;
use log::debug;
use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

/// A capability under test, driven one input at a time.
pub trait FuzzTarget {
    fn name(&self) -> &'static str;
    /// Runs one input to completion. Always returns 0; findings surface as
    /// process aborts, never as return values.
    fn test_one_input(&self, data: &[u8]) -> i32;
}

/// Process-global setup: log routing and framework bootstrap happen at most
/// once, and each plugin is registered at most once.
#[derive(Debug)]
pub(crate) struct ProcessSetup {
    framework: InitGuard,
    plugins: Mutex<BTreeSet<String>>,
}

pub(crate) static PROCESS_SETUP: ProcessSetup = ProcessSetup::new();

impl ProcessSetup {
    pub(crate) const fn new() -> Self {
        Self {
            framework: InitGuard::new(),
            plugins: Mutex::new(BTreeSet::new()),
        }
    }

    /// Escalation first, so that anything the bootstrap logs is already
    /// covered. Then registers whichever of `plugins` no earlier entry point
    /// registered.
    pub(crate) fn ensure<F: Framework>(
        &self,
        framework: &F,
        plugins: &[&str],
        config: &HarnessConfig,
    ) -> Result<(), HarnessError> {
        self.framework.ensure(|| {
            let sink = FaultEscalation::install(config.escalation.clone());
            framework.route_logs(sink);
            framework.bootstrap()
        })?;

        let mut registered = self.plugins.lock().unwrap_or_else(PoisonError::into_inner);
        for plugin in plugins {
            if registered.contains(*plugin) {
                continue;
            }
            framework.register_plugin(plugin, config.registration)?;
            registered.insert(plugin.to_string());
        }
        debug!(
            "framework ready, {} plugins via {:?}",
            registered.len(),
            config.registration
        );
        Ok(())
    }
}
