//! The media framework as seen from the harness.
//!
//! Pipeline construction, linking, state handling and discovery are owned by
//! the framework under test. The harness only drives them, so it talks to the
//! framework through these traits; the `gst` module provides the real
//! implementation.

use crate::HarnessError;
use crate::escalation::FaultEscalation;
use crate::input::InputSlice;
use crate::plugins::Registration;
use crate::source::PullHandler;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Null,
    Ready,
    Paused,
    Playing,
}

/// How the source element presents its data downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    /// Pushed buffers only, no seeking.
    Stream,
    Seekable,
    /// Downstream pulls arbitrary ranges on demand.
    RandomAccess,
}

/// Terminal outcome of a blocking wait on a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    Success,
    NoPreroll,
    Failure,
}

/// Downstream refused a buffer. Routine during shutdown or after a parse
/// error, so it is only traced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowError(pub &'static str);

/// The application source element that receives fuzz bytes.
pub trait AppSource {
    fn set_size(&self, size: u64);
    fn set_stream_type(&self, stream_type: StreamType);
    fn push_chunk(&self, chunk: InputSlice) -> Result<(), FlowError>;
    fn end_of_stream(&self);
    /// Subscribes `handler` to the source's need-data and seek-data requests.
    fn install_pull_handler(&self, handler: PullHandler);
}

/// A linked `source -> typefind -> fakesink` chain inside a pipeline.
pub trait TypefindPipeline {
    type Source: AppSource;

    fn source(&self) -> &Self::Source;
    fn set_state(&self, state: PipelineState) -> Result<(), HarnessError>;
    /// Blocks until the pending state change has succeeded or failed.
    fn wait_settled(&self) -> SettleOutcome;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryResult {
    Ok,
    UriInvalid,
    Error,
    Timeout,
    Busy,
    MissingPlugins,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub result: DiscoveryResult,
}

pub type SourceSetup = Box<dyn Fn(&dyn AppSource) + Send + Sync + 'static>;

pub trait Discovery {
    /// Registers the callback run when discovery creates its source element.
    fn on_source_setup(&self, setup: SourceSetup);
    /// Runs discovery to completion or error.
    fn discover_uri(&self, uri: &str) -> Result<DiscoveryReport, HarnessError>;
}

pub trait Framework {
    type Pipeline: TypefindPipeline;
    type Discoverer: Discovery;

    /// Sends the framework's own log records through `sink` and makes
    /// criticals fatal on the framework side as well.
    fn route_logs(&self, sink: &'static FaultEscalation);
    fn bootstrap(&self) -> Result<(), HarnessError>;
    fn register_plugin(&self, name: &str, registration: Registration)
    -> Result<(), HarnessError>;
    fn typefind_pipeline(&self) -> Result<Self::Pipeline, HarnessError>;
    fn discoverer(&self, timeout: Duration) -> Result<Self::Discoverer, HarnessError>;
}
