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

/// Accumulates arbitrary-length byte chunks into exact-size frames.
///
/// Leftover bytes shorter than one frame are carried over to the next push;
/// a partial frame is never emitted. This is a pure chunking state machine
/// with no engine or I/O calls.
pub struct FrameBuffer {
    buf: Vec<u8>,
    frame_len: usize,
}

impl FrameBuffer {
    /// `frame_len` is fixed for the lifetime of the buffer.
    pub fn new(frame_len: usize) -> Self {
        assert!(frame_len > 0, "frame length must be non-zero");
        Self { buf: Vec::new(), frame_len }
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Bytes currently buffered, always less than one frame after the last
    /// `pop_frame` returned `None`.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Appends a chunk without extracting frames.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Drains one exact-size frame, or `None` if less than a frame is
    /// buffered.
    pub fn pop_frame(&mut self) -> Option<Vec<u8>> {
        if self.buf.len() < self.frame_len {
            return None;
        }

        let rest = self.buf.split_off(self.frame_len);
        Some(std::mem::replace(&mut self.buf, rest))
    }

    /// Appends a chunk and drains every whole frame it completes, in order.
    pub fn push_frames(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.push(chunk);

        let mut frames = Vec::with_capacity(self.buf.len() / self.frame_len);
        while let Some(frame) = self.pop_frame() {
            frames.push(frame);
        }
        frames
    }
}
