//! Container discovery entry point: one discoverer per input, fed through the
//! source it creates for a fixed pseudo-URI.

use super::{FuzzTarget, PROCESS_SETUP, ProcessSetup};
use crate::HarnessError;
use crate::config::HarnessConfig;
use crate::error::fatal_setup_error;
use crate::framework::{AppSource, Discovery, Framework};
use crate::init::InitGuard;
use crate::input::FuzzInput;
use crate::plugins::{self, DISCOVERER_PLUGINS};
use crate::source;
use log::debug;

/// Routes discovery to the application source configured in `source-setup`.
pub const DISCOVERY_URI: &str = "appsrc://";

pub struct DiscovererHarness<F: Framework> {
    framework: F,
    config: HarnessConfig,
    pub(super) setup: &'static ProcessSetup,
    /// This entry point's plugin set is in place.
    ready: InitGuard,
}

impl<F: Framework> DiscovererHarness<F> {
    pub fn new(framework: F, config: HarnessConfig) -> Self {
        Self::with_setup(framework, config, &PROCESS_SETUP)
    }

    pub(crate) fn with_setup(
        framework: F,
        config: HarnessConfig,
        setup: &'static ProcessSetup,
    ) -> Self {
        Self {
            framework,
            config,
            setup,
            ready: InitGuard::new(),
        }
    }

    fn initialize(&self) -> Result<(), HarnessError> {
        let plugins = plugins::resolve(self.config.discoverer_plugins.as_deref(), DISCOVERER_PLUGINS);
        self.setup.ensure(&self.framework, &plugins, &self.config)
    }
}

impl<F: Framework> FuzzTarget for DiscovererHarness<F> {
    fn name(&self) -> &'static str {
        "discoverer"
    }

    fn test_one_input(&self, data: &[u8]) -> i32 {
        if let Err(e) = self.ready.ensure(|| self.initialize()) {
            fatal_setup_error(&e);
        }

        let discoverer = match self.framework.discoverer(self.config.discovery_timeout()) {
            Ok(discoverer) => discoverer,
            Err(e) => fatal_setup_error(&e),
        };

        // SAFETY: only the source-setup callback holds `input`, and it is
        // dropped with the discoverer below, before `data` goes away.
        let input = unsafe { FuzzInput::wrap(data) };
        let delivery = self.config.delivery;
        discoverer.on_source_setup(Box::new(move |appsrc: &dyn AppSource| {
            source::attach(input.clone(), delivery, appsrc);
        }));

        // Metadata and errors alike are irrelevant here; only crashes count.
        match discoverer.discover_uri(DISCOVERY_URI) {
            Ok(report) => debug!("discovery finished: {:?}", report.result),
            Err(e) => debug!("{e}"),
        }
        drop(discoverer);
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::DiscoveryResult;
    use crate::plugins::Registration;
    use crate::source::DeliveryMode;
    use crate::testing::{Event, FakeFramework, OGG_MAGIC, fresh_setup, run_in_child};
    use std::time::Duration;

    fn harness(
        framework: &FakeFramework,
        delivery: DeliveryMode,
    ) -> DiscovererHarness<FakeFramework> {
        DiscovererHarness::with_setup(
            framework.clone(),
            HarnessConfig {
                delivery,
                registration: Registration::Registry,
                ..HarnessConfig::default()
            },
            fresh_setup(),
        )
    }

    #[test]
    fn single_zero_byte_fails_discovery_quietly() {
        for delivery in [DeliveryMode::Push, DeliveryMode::Pull] {
            let framework = FakeFramework::default();
            assert_eq!(harness(&framework, delivery).test_one_input(&[0x00]), 0);
            assert_eq!(
                framework.count(&Event::Discovered(DiscoveryResult::Error)),
                1,
                "{delivery:?}"
            );
            assert_eq!(framework.consumed(), vec![vec![0x00]]);
        }
    }

    #[test]
    fn discoverer_is_built_with_timeout_and_released_per_input() {
        let framework = FakeFramework::default();
        let harness = harness(&framework, DeliveryMode::Pull);

        harness.test_one_input(b"OggS");
        harness.test_one_input(b"junk");

        let lifecycle: Vec<_> = framework
            .events()
            .into_iter()
            .filter(|e| {
                matches!(
                    e,
                    Event::DiscovererBuilt(_) | Event::Discovered(_) | Event::DiscovererDropped
                )
            })
            .collect();
        assert_eq!(
            lifecycle,
            vec![
                Event::DiscovererBuilt(Duration::from_secs(10)),
                Event::Discovered(DiscoveryResult::Ok),
                Event::DiscovererDropped,
                Event::DiscovererBuilt(Duration::from_secs(10)),
                Event::Discovered(DiscoveryResult::Error),
                Event::DiscovererDropped,
            ]
        );
    }

    #[test]
    fn registers_the_discovery_plugin_set_once() {
        let framework = FakeFramework::default();
        let harness = harness(&framework, DeliveryMode::Push);
        for _ in 0..3 {
            harness.test_one_input(OGG_MAGIC);
        }
        assert_eq!(framework.count(&Event::Bootstrap), 1);
        for plugin in DISCOVERER_PLUGINS {
            assert_eq!(
                framework.count(&Event::Register(plugin.to_string(), Registration::Registry)),
                1,
                "{plugin}"
            );
        }
    }

    #[test]
    fn each_input_reaches_its_own_source() {
        let framework = FakeFramework::default();
        let harness = harness(&framework, DeliveryMode::Pull);
        let inputs: [&[u8]; 3] = [b"OggS\x00\x02", b"", b"OggS\x00\x02"];
        for input in inputs {
            harness.test_one_input(input);
        }
        let consumed = framework.consumed();
        assert_eq!(consumed, inputs.iter().map(|i| i.to_vec()).collect::<Vec<_>>());
    }

    #[test]
    fn discoverer_construction_failure_exits_with_status_one() {
        let Some(output) = run_in_child(
            "harness::discoverer::tests::discoverer_construction_failure_exits_with_status_one",
            || {
                let framework = FakeFramework {
                    fail_discoverer: true,
                    ..FakeFramework::default()
                };
                harness(&framework, DeliveryMode::Push).test_one_input(b"x");
            },
        ) else {
            return;
        };

        assert_eq!(output.status.code(), Some(1), "setup errors are not crashes");
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(
            stderr.contains("Error initializing: discoverer could not be created"),
            "unexpected stderr: {stderr}"
        );
    }
}
