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

/// Sample rates the suppression pipeline accepts. 8 and 16 kHz are native
/// engine rates, 32 kHz is serviced by phase decomposition.
pub const SUPPORTED_SAMPLE_RATES: [u32; 4] = [8000, 16000, 32000, 48000];

/// Fallback rate when the source rate is zero or unrecognized.
pub const DEFAULT_SAMPLE_RATE: f64 = 16000.0;

/// Description of an audio stream, analogous to an AudioStreamBasicDescription.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFormat {
    /// Sample rate in Hz. Zero means unknown.
    pub sample_rate: f64,

    /// Bits per sample. Zero means unknown.
    pub bits_per_sample: u32,

    /// Number of interleaved channels. Zero means unknown.
    pub num_channels: u32,

    /// Whether the stream is already linear PCM.
    pub pcm: bool,
}

impl AudioFormat {
    /// A signed-integer packed linear PCM format.
    pub fn pcm(sample_rate: f64, bits_per_sample: u32, num_channels: u32) -> Self {
        Self { sample_rate, bits_per_sample, num_channels, pcm: true }
    }

    /// Audio frames per 10ms call (the engine's fixed frame duration).
    pub fn frames_10ms(&self) -> usize {
        self.sample_rate as usize / 100
    }

    /// Bytes per interleaved audio frame.
    pub fn bytes_per_frame(&self) -> usize {
        (self.bits_per_sample / 8 * self.num_channels) as usize
    }

    /// Bytes in one 10ms call.
    pub fn bytes_10ms(&self) -> usize {
        self.frames_10ms() * self.bytes_per_frame()
    }

    pub fn is_supported_rate(&self) -> bool {
        SUPPORTED_SAMPLE_RATES.iter().any(|&rate| self.sample_rate == rate as f64)
    }

    /// Derives the PCM target format the engine can consume.
    ///
    /// Already-PCM sources pass through unchanged. Anything else becomes
    /// signed-integer packed linear PCM: the rate is kept when supported and
    /// defaulted to 16 kHz otherwise (including unknown), channels default to
    /// mono when unknown, and the depth is forced to 16 bits since the engine
    /// operates on 16-bit signed samples.
    pub fn negotiate(&self) -> AudioFormat {
        if self.pcm {
            return *self;
        }

        let sample_rate =
            if self.is_supported_rate() { self.sample_rate } else { DEFAULT_SAMPLE_RATE };
        let num_channels = if self.num_channels == 0 { 1 } else { self.num_channels };

        AudioFormat { sample_rate, bits_per_sample: 16, num_channels, pcm: true }
    }
}
