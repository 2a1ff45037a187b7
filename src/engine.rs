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

use crate::NsError;

/// Suppression aggressiveness, mapped to the engine's policy values.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(i32)]
pub enum SuppressionLevel {
    Low = 0,
    Medium,
    High,
    VeryHigh,
}

/// One instance of the opaque fixed-point noise suppressor.
///
/// An instance is scoped to one (sample rate, level) pair, carries adaptive
/// state across calls, and is never shared between concurrent operations.
/// Releasing the underlying engine happens on drop.
pub trait SuppressionEngine: Send {
    /// Suppresses exactly one 10ms call.
    ///
    /// `input` holds one mono 16-bit sample array per channel (1 or 2);
    /// `output` holds the same number of arrays and is resized to match the
    /// input lengths.
    fn process(&mut self, input: &[&[i16]], output: &mut [Vec<i16>]);
}

/// Creates engine instances for one file or stream operation.
///
/// Covers the engine's create/init/set_policy sequence; a failure at any of
/// those steps surfaces as [`crate::NsErrorKind::EngineInit`].
pub trait EngineFactory {
    fn create(
        &self,
        sample_rate: u32,
        level: SuppressionLevel,
    ) -> Result<Box<dyn SuppressionEngine>, NsError>;
}
