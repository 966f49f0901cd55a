use crate::framework::{AppSource, FlowError, StreamType};
use crate::input::InputSlice;
use crate::source::{PullHandler, RequestLength};

/// `appsrc` element behind the [`AppSource`] seam.
#[derive(Debug, Clone)]
pub struct GstAppSource {
    appsrc: gst_app::AppSrc,
}

impl GstAppSource {
    pub fn new(appsrc: gst_app::AppSrc) -> Self {
        Self { appsrc }
    }
}

fn flow_name(err: gst::FlowError) -> &'static str {
    match err {
        gst::FlowError::Flushing => "flushing",
        gst::FlowError::Eos => "eos",
        gst::FlowError::NotLinked => "not-linked",
        gst::FlowError::NotNegotiated => "not-negotiated",
        gst::FlowError::NotSupported => "not-supported",
        gst::FlowError::Error => "error",
        _ => "custom",
    }
}

impl AppSource for GstAppSource {
    fn set_size(&self, size: u64) {
        self.appsrc.set_size(i64::try_from(size).unwrap_or(i64::MAX));
    }

    fn set_stream_type(&self, stream_type: StreamType) {
        self.appsrc.set_stream_type(match stream_type {
            StreamType::Stream => gst_app::AppStreamType::Stream,
            StreamType::Seekable => gst_app::AppStreamType::Seekable,
            StreamType::RandomAccess => gst_app::AppStreamType::RandomAccess,
        });
    }

    fn push_chunk(&self, chunk: InputSlice) -> Result<(), FlowError> {
        self.appsrc
            .push_buffer(gst::Buffer::from_slice(chunk))
            .map(|_| ())
            .map_err(|e| FlowError(flow_name(e)))
    }

    fn end_of_stream(&self) {
        // Refused only while flushing, when nobody waits for the EOS anyway.
        let _ = self.appsrc.end_of_stream();
    }

    fn install_pull_handler(&self, handler: PullHandler) {
        let seek = handler.clone();
        self.appsrc.set_callbacks(
            gst_app::AppSrcCallbacks::builder()
                .need_data(move |appsrc, length| {
                    handler.need_data(
                        &GstAppSource::new(appsrc.clone()),
                        RequestLength::from_raw(length),
                    );
                })
                .seek_data(move |_appsrc, offset| seek.seek_data(offset))
                .build(),
        );
    }
}
