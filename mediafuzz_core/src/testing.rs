//! In-memory stand-in for the media framework, plus a helper for tests whose
//! subject ends the process.

use crate::HarnessError;
use crate::escalation::FaultEscalation;
use crate::framework::{
    AppSource, Discovery, DiscoveryReport, DiscoveryResult, FlowError, Framework, PipelineState,
    SettleOutcome, SourceSetup, StreamType, TypefindPipeline,
};
use crate::harness::ProcessSetup;
use crate::harness::discoverer::DISCOVERY_URI;
use crate::input::InputSlice;
use crate::plugins::Registration;
use crate::source::{PullHandler, RequestLength};
use std::cell::RefCell;
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CHILD_ENV: &str = "MEDIAFUZZ_TEST_CHILD";

/// In the parent test process, re-runs the test named `test_path` in a child
/// and returns its output. Inside that child, runs `body` and returns `None`.
pub(crate) fn run_in_child(test_path: &str, body: impl FnOnce()) -> Option<Output> {
    if std::env::var(CHILD_ENV).as_deref() == Ok(test_path) {
        body();
        return None;
    }
    let exe = std::env::current_exe().expect("test binary path");
    let output = Command::new(exe)
        .args([test_path, "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, test_path)
        .output()
        .expect("failed to spawn child test process");
    Some(output)
}

/// Setup state private to one test, standing in for the process-wide one.
pub(crate) fn fresh_setup() -> &'static ProcessSetup {
    Box::leak(Box::new(ProcessSetup::new()))
}

/// Magic a fake type detector recognises.
pub(crate) const OGG_MAGIC: &[u8] = b"OggS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SourceEvent {
    Size(u64),
    StreamType(StreamType),
    Push { offset: u64, bytes: Vec<u8> },
    EndOfStream,
    PullHandlerInstalled,
}

#[derive(Debug, Default)]
pub(crate) struct FakeAppSource {
    events: RefCell<Vec<SourceEvent>>,
    handler: RefCell<Option<PullHandler>>,
    refuse_pushes: bool,
}

impl FakeAppSource {
    pub(crate) fn refusing() -> Self {
        Self {
            refuse_pushes: true,
            ..Self::default()
        }
    }

    pub(crate) fn events(&self) -> Vec<SourceEvent> {
        self.events.borrow().clone()
    }

    pub(crate) fn has_pull_handler(&self) -> bool {
        self.handler.borrow().is_some()
    }

    fn handler(&self) -> Option<PullHandler> {
        self.handler.borrow().clone()
    }

    /// Issues one need-data request. False when nothing is subscribed.
    pub(crate) fn pull(&self, length: RequestLength) -> bool {
        match self.handler() {
            Some(handler) => {
                handler.need_data(self, length);
                true
            }
            None => false,
        }
    }

    pub(crate) fn seek(&self, offset: u64) -> Option<bool> {
        self.handler().map(|handler| handler.seek_data(offset))
    }

    pub(crate) fn pull_offset(&self) -> Option<u64> {
        self.handler().map(|handler| handler.offset())
    }

    pub(crate) fn saw_end_of_stream(&self) -> bool {
        self.events.borrow().contains(&SourceEvent::EndOfStream)
    }

    /// Pulls `chunk`-sized pieces until end-of-stream, like a streaming
    /// thread would.
    pub(crate) fn drain(&self, chunk: u64) {
        let mut requests = 0;
        while !self.saw_end_of_stream() {
            assert!(self.pull(RequestLength::Exact(chunk)), "no pull handler");
            requests += 1;
            assert!(requests < 1 << 20, "source never reached end-of-stream");
        }
    }

    pub(crate) fn received(&self) -> Vec<u8> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                SourceEvent::Push { bytes, .. } => Some(bytes.as_slice()),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    /// Consumes whatever the source offers and returns it.
    fn consume(&self) -> Vec<u8> {
        if self.has_pull_handler() {
            self.drain(4096);
        }
        self.received()
    }
}

impl AppSource for FakeAppSource {
    fn set_size(&self, size: u64) {
        self.events.borrow_mut().push(SourceEvent::Size(size));
    }

    fn set_stream_type(&self, stream_type: StreamType) {
        self.events
            .borrow_mut()
            .push(SourceEvent::StreamType(stream_type));
    }

    fn push_chunk(&self, chunk: InputSlice) -> Result<(), FlowError> {
        if self.refuse_pushes {
            return Err(FlowError("flushing"));
        }
        self.events.borrow_mut().push(SourceEvent::Push {
            offset: chunk.offset(),
            bytes: chunk.to_vec(),
        });
        Ok(())
    }

    fn end_of_stream(&self) {
        self.events.borrow_mut().push(SourceEvent::EndOfStream);
    }

    fn install_pull_handler(&self, handler: PullHandler) {
        *self.handler.borrow_mut() = Some(handler);
        self.events
            .borrow_mut()
            .push(SourceEvent::PullHandlerInstalled);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    RouteLogs,
    Bootstrap,
    Register(String, Registration),
    PipelineBuilt,
    State(PipelineState),
    Settled(SettleOutcome),
    PipelineDropped,
    DiscovererBuilt(Duration),
    Discovered(DiscoveryResult),
    DiscovererDropped,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeFramework {
    pub(crate) events: Arc<Mutex<Vec<Event>>>,
    pub(crate) consumed: Arc<Mutex<Vec<Vec<u8>>>>,
    pub(crate) fail_bootstrap: bool,
    pub(crate) fail_discoverer: bool,
    pub(crate) fail_state: Option<PipelineState>,
}

impl FakeFramework {
    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, wanted: &Event) -> usize {
        self.events().iter().filter(|e| *e == wanted).count()
    }

    /// Bytes each pipeline or discovery run read, in run order.
    pub(crate) fn consumed(&self) -> Vec<Vec<u8>> {
        self.consumed.lock().unwrap().clone()
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl Framework for FakeFramework {
    type Pipeline = FakePipeline;
    type Discoverer = FakeDiscoverer;

    fn route_logs(&self, _sink: &'static FaultEscalation) {
        self.record(Event::RouteLogs);
    }

    fn bootstrap(&self) -> Result<(), HarnessError> {
        self.record(Event::Bootstrap);
        if self.fail_bootstrap {
            return Err(HarnessError::Bootstrap("no plugin registry".into()));
        }
        Ok(())
    }

    fn register_plugin(
        &self,
        name: &str,
        registration: Registration,
    ) -> Result<(), HarnessError> {
        self.record(Event::Register(name.to_string(), registration));
        Ok(())
    }

    fn typefind_pipeline(&self) -> Result<FakePipeline, HarnessError> {
        self.record(Event::PipelineBuilt);
        Ok(FakePipeline {
            framework: self.clone(),
            source: FakeAppSource::default(),
            outcome: RefCell::new(SettleOutcome::Failure),
        })
    }

    fn discoverer(&self, timeout: Duration) -> Result<FakeDiscoverer, HarnessError> {
        if self.fail_discoverer {
            return Err(HarnessError::Discoverer("playback plugin missing".into()));
        }
        self.record(Event::DiscovererBuilt(timeout));
        Ok(FakeDiscoverer {
            framework: self.clone(),
            setup: Mutex::new(None),
        })
    }
}

pub(crate) struct FakePipeline {
    framework: FakeFramework,
    source: FakeAppSource,
    outcome: RefCell<SettleOutcome>,
}

impl TypefindPipeline for FakePipeline {
    type Source = FakeAppSource;

    fn source(&self) -> &FakeAppSource {
        &self.source
    }

    fn set_state(&self, state: PipelineState) -> Result<(), HarnessError> {
        self.framework.record(Event::State(state));
        if self.framework.fail_state == Some(state) {
            return Err(HarnessError::StateChange(state));
        }
        if state == PipelineState::Paused {
            // Prerolling is where the type detector reads its input.
            let bytes = self.source.consume();
            *self.outcome.borrow_mut() = if bytes.starts_with(OGG_MAGIC) {
                SettleOutcome::Success
            } else {
                SettleOutcome::Failure
            };
            self.framework.consumed.lock().unwrap().push(bytes);
        }
        Ok(())
    }

    fn wait_settled(&self) -> SettleOutcome {
        let outcome = *self.outcome.borrow();
        self.framework.record(Event::Settled(outcome));
        outcome
    }
}

impl Drop for FakePipeline {
    fn drop(&mut self) {
        self.framework.record(Event::PipelineDropped);
    }
}

pub(crate) struct FakeDiscoverer {
    framework: FakeFramework,
    setup: Mutex<Option<SourceSetup>>,
}

impl Discovery for FakeDiscoverer {
    fn on_source_setup(&self, setup: SourceSetup) {
        *self.setup.lock().unwrap() = Some(setup);
    }

    fn discover_uri(&self, uri: &str) -> Result<DiscoveryReport, HarnessError> {
        if uri != DISCOVERY_URI {
            let report = DiscoveryReport {
                result: DiscoveryResult::UriInvalid,
            };
            self.framework.record(Event::Discovered(report.result));
            return Ok(report);
        }

        let source = FakeAppSource::default();
        if let Some(setup) = self.setup.lock().unwrap().as_ref() {
            setup(&source);
        }
        let bytes = source.consume();
        let result = if bytes.starts_with(OGG_MAGIC) {
            DiscoveryResult::Ok
        } else {
            DiscoveryResult::Error
        };
        self.framework.consumed.lock().unwrap().push(bytes);
        self.framework.record(Event::Discovered(result));
        if result == DiscoveryResult::Error {
            return Err(HarnessError::Discovery(
                "Could not determine type of stream".into(),
            ));
        }
        Ok(DiscoveryReport { result })
    }
}

impl Drop for FakeDiscoverer {
    fn drop(&mut self) {
        self.framework.record(Event::DiscovererDropped);
    }
}
