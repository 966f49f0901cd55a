//! Byte source adapter: exposes one fuzz input to an application source
//! element, either as a single eager push or through a seekable
//! request/response protocol.

use crate::framework::{AppSource, StreamType};
use crate::input::{FuzzInput, InputSlice};
use log::debug;
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryMode {
    /// The whole input is delivered as one block before streaming starts.
    Push,
    /// Downstream requests ranges and may seek.
    Pull,
}

impl DeliveryMode {
    /// Mode selected by the `pull-mode` feature.
    pub const fn from_build() -> Self {
        if cfg!(feature = "pull-mode") {
            DeliveryMode::Pull
        } else {
            DeliveryMode::Push
        }
    }

    pub fn stream_type(self) -> StreamType {
        match self {
            DeliveryMode::Push => StreamType::Stream,
            DeliveryMode::Pull => StreamType::RandomAccess,
        }
    }
}

impl Default for DeliveryMode {
    fn default() -> Self {
        Self::from_build()
    }
}

/// Length of a single data request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestLength {
    Exact(u64),
    /// Whatever is left after the cursor.
    Remaining,
}

impl RequestLength {
    /// Decodes the framework's need-data length, where all bits set means
    /// "unspecified".
    pub fn from_raw(raw: u32) -> Self {
        if raw == u32::MAX {
            RequestLength::Remaining
        } else {
            RequestLength::Exact(u64::from(raw))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Data(InputSlice),
    EndOfStream,
}

/// A fuzz input plus a read cursor. `offset` never exceeds the input length.
#[derive(Debug)]
pub struct ByteSource {
    input: FuzzInput,
    offset: u64,
}

impl ByteSource {
    pub fn new(input: FuzzInput) -> Self {
        Self { input, offset: 0 }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn total_size(&self) -> u64 {
        self.input.total_size()
    }

    /// Serves `min(length, remaining)` bytes from the cursor and advances it,
    /// or reports end-of-stream once the cursor sits at the end.
    pub fn request(&mut self, length: RequestLength) -> Chunk {
        let total = self.total_size();
        debug!("need-data length:{length:?} offset:{} size:{total}", self.offset);
        if self.offset >= total {
            return Chunk::EndOfStream;
        }

        let remaining = total - self.offset;
        let length = match length {
            RequestLength::Exact(requested) => requested.min(remaining),
            RequestLength::Remaining => remaining,
        };
        // Both bounds are <= total, which came from a usize.
        let start = self.offset as usize;
        let end = (self.offset + length) as usize;
        self.offset += length;
        Chunk::Data(self.input.slice(start..end))
    }

    /// Moves the cursor to `offset`. Targets at or past the end are refused
    /// and leave the cursor where it was.
    pub fn seek(&mut self, offset: u64) -> bool {
        debug!("seek-data reqoffset:{offset} size:{}", self.total_size());
        if offset >= self.total_size() {
            return false;
        }
        self.offset = offset;
        true
    }
}

/// Shared handle subscribed to a source's demand-driven callbacks.
///
/// Callbacks arrive on the framework's streaming thread, hence the mutex; they
/// never overlap in practice.
#[derive(Debug, Clone)]
pub struct PullHandler {
    source: Arc<Mutex<ByteSource>>,
}

impl PullHandler {
    pub fn new(source: ByteSource) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ByteSource> {
        self.source.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn offset(&self) -> u64 {
        self.lock().offset()
    }

    /// Answers one need-data request on `appsrc`.
    pub fn need_data(&self, appsrc: &dyn AppSource, length: RequestLength) {
        let chunk = self.lock().request(length);
        match chunk {
            Chunk::Data(slice) => {
                if let Err(e) = appsrc.push_chunk(slice) {
                    debug!("push refused: {}", e.0);
                }
            }
            Chunk::EndOfStream => appsrc.end_of_stream(),
        }
    }

    pub fn seek_data(&self, offset: u64) -> bool {
        self.lock().seek(offset)
    }
}

/// Configures `appsrc` to serve `input` in `mode`.
///
/// Push mode delivers everything immediately, then marks end-of-stream so the
/// consumer does not wait for more. Pull mode only subscribes a
/// [`PullHandler`]; data flows when the consumer asks for it.
pub fn attach(input: FuzzInput, mode: DeliveryMode, appsrc: &dyn AppSource) {
    appsrc.set_size(input.total_size());
    appsrc.set_stream_type(mode.stream_type());

    let mut source = ByteSource::new(input);
    match mode {
        DeliveryMode::Push => {
            if let Chunk::Data(all) = source.request(RequestLength::Remaining) {
                if let Err(e) = appsrc.push_chunk(all) {
                    debug!("eager push refused: {}", e.0);
                }
            }
            appsrc.end_of_stream();
        }
        DeliveryMode::Pull => appsrc.install_pull_handler(PullHandler::new(source)),
    }
}
