//! GStreamer implementation of the framework seam.

mod appsrc;
mod static_plugins;

pub use appsrc::GstAppSource;

use crate::HarnessError;
use crate::escalation::{FaultEscalation, Severity};
use crate::framework::{
    Discovery, DiscoveryReport, DiscoveryResult, Framework, PipelineState, SettleOutcome,
    SourceSetup, TypefindPipeline,
};
use crate::plugins::Registration;
use gst::glib;
use gst::prelude::*;
use log::warn;
use std::time::Duration;

#[derive(Debug, Default, Clone, Copy)]
pub struct GstFramework;

impl GstFramework {
    pub fn new() -> Self {
        GstFramework
    }
}

fn severity_of(level: glib::LogLevel) -> Severity {
    match level {
        glib::LogLevel::Error => Severity::Error,
        glib::LogLevel::Critical => Severity::Critical,
        glib::LogLevel::Warning => Severity::Warning,
        glib::LogLevel::Message => Severity::Message,
        glib::LogLevel::Info => Severity::Info,
        glib::LogLevel::Debug => Severity::Debug,
    }
}

fn make_element(factory: &str, name: &str) -> Result<gst::Element, HarnessError> {
    gst::ElementFactory::make(factory)
        .name(name)
        .build()
        .map_err(|e| HarnessError::Element(format!("{factory}: {e}")))
}

impl Framework for GstFramework {
    type Pipeline = GstTypefindPipeline;
    type Discoverer = GstDiscoverer;

    fn route_logs(&self, sink: &'static FaultEscalation) {
        glib::log_set_always_fatal(glib::LogLevels::LEVEL_CRITICAL);
        glib::log_set_default_handler(move |domain, level, message| {
            sink.handle(severity_of(level), domain, message);
        });
    }

    fn bootstrap(&self) -> Result<(), HarnessError> {
        gst::init().map_err(|e| HarnessError::Bootstrap(e.to_string()))
    }

    fn register_plugin(
        &self,
        name: &str,
        registration: Registration,
    ) -> Result<(), HarnessError> {
        match registration {
            Registration::Static => static_plugins::register(name),
            Registration::Registry => {
                if gst::Registry::get().find_plugin(name).is_none() {
                    warn!("plugin '{name}' is not in the registry, coverage will be reduced");
                }
                Ok(())
            }
        }
    }

    fn typefind_pipeline(&self) -> Result<GstTypefindPipeline, HarnessError> {
        let pipeline = gst::Pipeline::with_name("pipeline");
        let source = make_element("appsrc", "source")?;
        let typefind = make_element("typefind", "typefind")?;
        let fakesink = make_element("fakesink", "fakesink")?;

        pipeline
            .add_many([&source, &typefind, &fakesink])
            .map_err(|e| HarnessError::Element(e.to_string()))?;
        gst::Element::link_many([&source, &typefind, &fakesink])
            .map_err(|e| HarnessError::Element(e.to_string()))?;

        let appsrc = source
            .dynamic_cast::<gst_app::AppSrc>()
            .map_err(|_| HarnessError::Element("appsrc factory did not build an AppSrc".into()))?;
        Ok(GstTypefindPipeline {
            pipeline,
            source: GstAppSource::new(appsrc),
        })
    }

    fn discoverer(&self, timeout: Duration) -> Result<GstDiscoverer, HarnessError> {
        gst_pbutils::Discoverer::new(gst::ClockTime::from_seconds(timeout.as_secs()))
            .map(|inner| GstDiscoverer { inner })
            .map_err(|e| HarnessError::Discoverer(e.to_string()))
    }
}

pub struct GstTypefindPipeline {
    pipeline: gst::Pipeline,
    source: GstAppSource,
}

fn gst_state(state: PipelineState) -> gst::State {
    match state {
        PipelineState::Null => gst::State::Null,
        PipelineState::Ready => gst::State::Ready,
        PipelineState::Paused => gst::State::Paused,
        PipelineState::Playing => gst::State::Playing,
    }
}

impl TypefindPipeline for GstTypefindPipeline {
    type Source = GstAppSource;

    fn source(&self) -> &GstAppSource {
        &self.source
    }

    fn set_state(&self, state: PipelineState) -> Result<(), HarnessError> {
        self.pipeline
            .set_state(gst_state(state))
            .map(|_| ())
            .map_err(|_| HarnessError::StateChange(state))
    }

    fn wait_settled(&self) -> SettleOutcome {
        let (result, _current, _pending) = self.pipeline.state(gst::ClockTime::NONE);
        match result {
            Ok(gst::StateChangeSuccess::NoPreroll) => SettleOutcome::NoPreroll,
            Ok(_) => SettleOutcome::Success,
            Err(_) => SettleOutcome::Failure,
        }
    }
}

pub struct GstDiscoverer {
    inner: gst_pbutils::Discoverer,
}

fn discovery_result(result: gst_pbutils::DiscovererResult) -> DiscoveryResult {
    match result {
        gst_pbutils::DiscovererResult::Ok => DiscoveryResult::Ok,
        gst_pbutils::DiscovererResult::UriInvalid => DiscoveryResult::UriInvalid,
        gst_pbutils::DiscovererResult::Timeout => DiscoveryResult::Timeout,
        gst_pbutils::DiscovererResult::Busy => DiscoveryResult::Busy,
        gst_pbutils::DiscovererResult::MissingPlugins => DiscoveryResult::MissingPlugins,
        _ => DiscoveryResult::Error,
    }
}

impl Discovery for GstDiscoverer {
    fn on_source_setup(&self, setup: SourceSetup) {
        self.inner.connect_source_setup(move |_discoverer, source| {
            match source.clone().dynamic_cast::<gst_app::AppSrc>() {
                Ok(appsrc) => setup(&GstAppSource::new(appsrc)),
                Err(other) => warn!("source-setup produced {} instead of an appsrc", other.name()),
            }
        });
    }

    fn discover_uri(&self, uri: &str) -> Result<DiscoveryReport, HarnessError> {
        self.inner
            .discover_uri(uri)
            .map(|info| DiscoveryReport {
                result: discovery_result(info.result()),
            })
            .map_err(|e| HarnessError::Discovery(e.to_string()))
    }
}
