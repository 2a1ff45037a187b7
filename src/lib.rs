// Copyright 2025 LiveKit, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Offline noise suppression over exact 10ms PCM frames.
//!
//! The suppression engine itself is opaque behind [`SuppressionEngine`];
//! this crate owns the format negotiation, frame accumulation and channel
//! topology work needed to feed it 16-bit mono/stereo narrowband audio.

use thiserror::Error;

pub mod channel_codec;
pub mod engine;
pub mod format;
pub mod frame_buffer;
#[cfg(feature = "webrtc-nsx")]
pub mod nsx;
pub mod pipeline;
pub mod stream;
pub mod wav;

pub use engine::{EngineFactory, SuppressionEngine, SuppressionLevel};
pub use format::AudioFormat;
pub use frame_buffer::FrameBuffer;
pub use pipeline::{process, AudioSink, AudioSource, ProcessOptions};
pub use stream::StreamSuppressor;
pub use wav::{process_file, process_file_async, WavSink, WavSource};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NsErrorKind {
    /// The source cannot be opened or described.
    FormatRead,
    /// The negotiated client PCM format was rejected by the source reader.
    FormatConvert,
    /// Engine creation, init or policy configuration failed.
    EngineInit,
    /// A read call failed or returned a short frame not aligned with
    /// end-of-stream.
    FrameRead,
    /// A write call failed.
    FrameWrite,
    /// The source position query failed.
    OffsetQuery,
    /// The output cannot be opened for the negotiated format.
    SinkCreate,
}

#[derive(Error, Debug)]
#[error("an NsError occured: {kind:?} - {message}")]
pub struct NsError {
    pub kind: NsErrorKind,
    pub message: String,
}

impl NsError {
    pub fn new(kind: NsErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}
