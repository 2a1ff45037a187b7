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

use crate::channel_codec::ChannelCodec;
use crate::engine::{EngineFactory, SuppressionEngine, SuppressionLevel};
use crate::format::AudioFormat;
use crate::frame_buffer::FrameBuffer;
use crate::NsError;

/// Suppresses a raw PCM byte stream chunk by chunk, without any file I/O.
///
/// Chunks are accumulated into exact 10ms frames; output covers every whole
/// frame completed so far and the sub-frame remainder stays buffered for the
/// next push. The remainder is private to one stream and must not be reused
/// across unrelated audio.
pub struct StreamSuppressor {
    codec: ChannelCodec,
    engines: Vec<Box<dyn SuppressionEngine>>,
    buffer: FrameBuffer,
}

impl StreamSuppressor {
    /// One shared engine instance, the historical behavior.
    pub fn new(
        format: &AudioFormat,
        level: SuppressionLevel,
        factory: &dyn EngineFactory,
    ) -> Result<Self, NsError> {
        Self::with_engine_policy(format, level, factory, false)
    }

    /// `engine_per_channel` gives the (2, 32 kHz) path one engine instance
    /// per real channel instead of sharing adaptive state across both.
    pub fn with_engine_policy(
        format: &AudioFormat,
        level: SuppressionLevel,
        factory: &dyn EngineFactory,
        engine_per_channel: bool,
    ) -> Result<Self, NsError> {
        let codec = ChannelCodec::new(format);

        let mut engines = Vec::new();
        if let Some(engine_rate) = codec.engine_sample_rate() {
            let count = if engine_per_channel { codec.engine_calls_per_frame() } else { 1 };
            for _ in 0..count {
                engines.push(factory.create(engine_rate, level)?);
            }
        }

        Ok(Self { codec, engines, buffer: FrameBuffer::new(format.bytes_10ms()) })
    }

    /// Pushes a chunk and returns the suppressed bytes of every whole frame
    /// it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(chunk.len());
        for frame in self.buffer.push_frames(chunk) {
            out.extend_from_slice(&self.codec.process(&mut self.engines, &frame));
        }
        out
    }

    /// Bytes waiting for the next push, always less than one frame.
    pub fn buffered_len(&self) -> usize {
        self.buffer.buffered_len()
    }
}
