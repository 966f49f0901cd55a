//! Type detection entry point: `appsrc -> typefind -> fakesink`, prerolled
//! once per input.

use super::{FuzzTarget, PROCESS_SETUP, ProcessSetup};
use crate::HarnessError;
use crate::config::HarnessConfig;
use crate::error::fatal_setup_error;
use crate::framework::{Framework, PipelineState, SettleOutcome, TypefindPipeline};
use crate::init::InitGuard;
use crate::input::FuzzInput;
use crate::plugins::{self, TYPEFIND_PLUGINS};
use crate::source;
use log::debug;

pub struct TypefindHarness<F: Framework> {
    framework: F,
    config: HarnessConfig,
    pub(super) setup: &'static ProcessSetup,
    /// This entry point's plugin set is in place.
    ready: InitGuard,
}

impl<F: Framework> TypefindHarness<F> {
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
        let plugins = plugins::resolve(self.config.typefind_plugins.as_deref(), TYPEFIND_PLUGINS);
        self.setup.ensure(&self.framework, &plugins, &self.config)
    }

    /// Builds a fresh pipeline, prerolls it on `data` and tears it down again,
    /// whatever happened in between.
    fn run(&self, data: &[u8]) -> Result<SettleOutcome, HarnessError> {
        let pipeline = self.framework.typefind_pipeline()?;
        // SAFETY: only the pipeline's source holds `input` or slices of it,
        // and the pipeline is stopped and dropped before `data` goes away.
        let input = unsafe { FuzzInput::wrap(data) };
        let outcome = self.preroll(&pipeline, input);
        let teardown = pipeline.set_state(PipelineState::Null);
        drop(pipeline);
        teardown?;
        Ok(outcome)
    }

    fn preroll(&self, pipeline: &F::Pipeline, input: FuzzInput) -> SettleOutcome {
        // A refused READY or PAUSED resurfaces in the wait, so both are
        // only traced.
        if let Err(e) = pipeline.set_state(PipelineState::Ready) {
            debug!("{e}");
        }
        source::attach(input, self.config.delivery, pipeline.source());
        if let Err(e) = pipeline.set_state(PipelineState::Paused) {
            debug!("{e}");
        }
        pipeline.wait_settled()
    }
}

impl<F: Framework> FuzzTarget for TypefindHarness<F> {
    fn name(&self) -> &'static str {
        "typefind"
    }

    fn test_one_input(&self, data: &[u8]) -> i32 {
        if let Err(e) = self.ready.ensure(|| self.initialize()) {
            fatal_setup_error(&e);
        }
        match self.run(data) {
            Ok(outcome) => debug!("typefind settled: {outcome:?}"),
            Err(e) if e.is_fatal_setup() => fatal_setup_error(&e),
            Err(e) => debug!("typefind run ended early: {e}"),
        }
        0
    }
}
