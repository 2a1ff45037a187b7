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

use crate::engine::SuppressionEngine;
use crate::format::AudioFormat;

/// How one 10ms frame maps onto engine calls for a given format.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Topology {
    /// (1, 8k|16k): one mono engine call, frame shape unchanged.
    Mono,
    /// (2, 8k|16k): de-interleave, one stereo engine call, re-interleave.
    Stereo,
    /// (1, 32k): phase-split into two 16 kHz streams, one synthetic-stereo
    /// engine call, inverse merge.
    MonoPhaseSplit,
    /// (2, 32k): phase-split each real channel, one synthetic-stereo engine
    /// call per real channel.
    StereoPhaseSplit,
    /// Anything else is a defined no-op, not an error.
    Passthrough,
}

/// Reshapes frames into the mono/stereo narrowband sub-streams the engine
/// accepts and reassembles the engine output into the original frame layout.
pub struct ChannelCodec {
    topology: Topology,
    frame_len: usize,
    sample_rate: f64,
}

impl ChannelCodec {
    pub fn new(format: &AudioFormat) -> Self {
        let topology = if !format.pcm || format.bits_per_sample != 16 {
            Topology::Passthrough
        } else {
            match (format.num_channels, format.sample_rate as u32) {
                (1, 8000 | 16000) => Topology::Mono,
                (2, 8000 | 16000) => Topology::Stereo,
                (1, 32000) => Topology::MonoPhaseSplit,
                (2, 32000) => Topology::StereoPhaseSplit,
                _ => Topology::Passthrough,
            }
        };

        Self { topology, frame_len: format.bytes_10ms(), sample_rate: format.sample_rate }
    }

    /// Rate the engine must be initialized with, or `None` when no engine
    /// call will ever happen for this format.
    pub fn engine_sample_rate(&self) -> Option<u32> {
        match self.topology {
            Topology::Mono | Topology::Stereo => Some(self.sample_rate as u32),
            // 32 kHz rides the engine's 16 kHz stereo path.
            Topology::MonoPhaseSplit | Topology::StereoPhaseSplit => Some(16000),
            Topology::Passthrough => None,
        }
    }

    /// Sequential engine calls needed per frame.
    pub fn engine_calls_per_frame(&self) -> usize {
        match self.topology {
            Topology::StereoPhaseSplit => 2,
            Topology::Passthrough => 0,
            _ => 1,
        }
    }

    /// Runs one frame through the engine(s) and returns the frame-shaped
    /// output.
    ///
    /// `engines` holds either one shared instance or one per real channel;
    /// with a single instance the two calls of the (2, 32 kHz) path share
    /// its adaptive state, matching the historical behavior.
    pub fn process(&self, engines: &mut [Box<dyn SuppressionEngine>], frame: &[u8]) -> Vec<u8> {
        assert_eq!(frame.len(), self.frame_len, "frame must hold 10ms worth of samples");

        if self.topology == Topology::Passthrough {
            return frame.to_vec();
        }

        let samples = frame_to_samples(frame);
        let out = match self.topology {
            Topology::Mono => {
                let mut output = vec![Vec::new()];
                engines[0].process(&[&samples], &mut output);
                output.swap_remove(0)
            }
            Topology::Stereo => {
                let (left, right) = split_groups(&samples, 1);
                let mut output = vec![Vec::new(), Vec::new()];
                engines[0].process(&[&left, &right], &mut output);
                merge_groups(&output[0], &output[1], 1)
            }
            Topology::MonoPhaseSplit => {
                let (even, odd) = split_groups(&samples, 2);
                let mut output = vec![Vec::new(), Vec::new()];
                engines[0].process(&[&even, &odd], &mut output);
                merge_groups(&output[0], &output[1], 2)
            }
            Topology::StereoPhaseSplit => {
                let (left, right) = split_groups(&samples, 1);
                // One engine shared sequentially across both real channels,
                // or one each under the per-channel policy.
                let last = engines.len() - 1;
                let left = self.process_phase_pair(engines, 0, &left);
                let right = self.process_phase_pair(engines, last, &right);
                merge_groups(&left, &right, 1)
            }
            Topology::Passthrough => unreachable!(),
        };

        samples_to_frame(&out)
    }

    fn process_phase_pair(
        &self,
        engines: &mut [Box<dyn SuppressionEngine>],
        index: usize,
        channel: &[i16],
    ) -> Vec<i16> {
        let (even, odd) = split_groups(channel, 2);
        let mut output = vec![Vec::new(), Vec::new()];
        engines[index].process(&[&even, &odd], &mut output);
        merge_groups(&output[0], &output[1], 2)
    }
}

/// Alternates consecutive `group`-sample runs into two sub-streams.
///
/// `group == 1` de-interleaves a stereo stream into its channels;
/// `group == 2` splits a 32 kHz stream into its two 16 kHz phase-streams
/// (blocks of 4 samples, positions {0,1} to A and {2,3} to B). This is a
/// block-interleave decomposition, not a downsample; no filtering applies.
pub fn split_groups(samples: &[i16], group: usize) -> (Vec<i16>, Vec<i16>) {
    debug_assert_eq!(samples.len() % (group * 2), 0, "samples must cover whole blocks");

    let half = samples.len() / 2;
    let mut a = Vec::with_capacity(half);
    let mut b = Vec::with_capacity(half);
    for block in samples.chunks_exact(group * 2) {
        a.extend_from_slice(&block[..group]);
        b.extend_from_slice(&block[group..]);
    }
    (a, b)
}

/// Exact inverse of [`split_groups`].
pub fn merge_groups(a: &[i16], b: &[i16], group: usize) -> Vec<i16> {
    debug_assert_eq!(a.len(), b.len(), "sub-streams must be equal length");

    let mut out = Vec::with_capacity(a.len() + b.len());
    for (run_a, run_b) in a.chunks_exact(group).zip(b.chunks_exact(group)) {
        out.extend_from_slice(run_a);
        out.extend_from_slice(run_b);
    }
    out
}

/// Builds an owned sample array from little-endian frame bytes. The engine
/// never sees the frame's byte buffer directly, so input and output never
/// alias.
fn frame_to_samples(frame: &[u8]) -> Vec<i16> {
    frame.chunks_exact(2).map(|pair| i16::from_le_bytes([pair[0], pair[1]])).collect()
}

fn samples_to_frame(samples: &[i16]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        frame.extend_from_slice(&sample.to_le_bytes());
    }
    frame
}
