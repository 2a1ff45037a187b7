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

//! Binding to the native WebRtcNsx fixed-point noise suppressor. Linking
//! the library is the embedder's responsibility.

use std::ffi::{c_int, c_void};

use crate::engine::{EngineFactory, SuppressionEngine, SuppressionLevel};
use crate::{NsError, NsErrorKind};

mod ffi {
    use super::{c_int, c_void};

    extern "C" {
        pub fn WebRtcNsx_Create() -> *mut c_void;
        pub fn WebRtcNsx_Init(handle: *mut c_void, sample_rate: u32) -> c_int;
        pub fn WebRtcNsx_set_policy(handle: *mut c_void, mode: c_int) -> c_int;
        pub fn WebRtcNsx_Process(
            handle: *mut c_void,
            speech_frame: *const *const i16,
            num_channels: c_int,
            out_frame: *const *mut i16,
        );
        pub fn WebRtcNsx_Free(handle: *mut c_void) -> c_int;
    }
}

/// Owning handle over one native suppressor instance.
pub struct NsxEngine {
    handle: *mut c_void,
}

impl NsxEngine {
    pub fn new(sample_rate: u32, level: SuppressionLevel) -> Result<Self, NsError> {
        unsafe {
            let handle = ffi::WebRtcNsx_Create();
            if handle.is_null() {
                return Err(NsError::new(NsErrorKind::EngineInit, "WebRtcNsx_Create failed"));
            }

            if ffi::WebRtcNsx_Init(handle, sample_rate) != 0 {
                ffi::WebRtcNsx_Free(handle);
                return Err(NsError::new(
                    NsErrorKind::EngineInit,
                    format!("WebRtcNsx_Init failed for {sample_rate} Hz"),
                ));
            }

            if ffi::WebRtcNsx_set_policy(handle, level as c_int) != 0 {
                ffi::WebRtcNsx_Free(handle);
                return Err(NsError::new(
                    NsErrorKind::EngineInit,
                    format!("WebRtcNsx_set_policy failed for {level:?}"),
                ));
            }

            Ok(Self { handle })
        }
    }
}

impl SuppressionEngine for NsxEngine {
    fn process(&mut self, input: &[&[i16]], output: &mut [Vec<i16>]) {
        assert!(matches!(input.len(), 1 | 2), "engine accepts 1 or 2 channels");
        assert_eq!(input.len(), output.len());

        for (channel, out) in input.iter().zip(output.iter_mut()) {
            out.resize(channel.len(), 0);
        }

        let in_ptrs: Vec<*const i16> = input.iter().map(|channel| channel.as_ptr()).collect();
        let out_ptrs: Vec<*mut i16> =
            output.iter_mut().map(|channel| channel.as_mut_ptr()).collect();

        unsafe {
            ffi::WebRtcNsx_Process(
                self.handle,
                in_ptrs.as_ptr(),
                input.len() as c_int,
                out_ptrs.as_ptr(),
            );
        }
    }
}

unsafe impl Send for NsxEngine {}

impl Drop for NsxEngine {
    fn drop(&mut self) {
        unsafe {
            ffi::WebRtcNsx_Free(self.handle);
        }
    }
}

#[derive(Default)]
pub struct NsxEngineFactory;

impl EngineFactory for NsxEngineFactory {
    fn create(
        &self,
        sample_rate: u32,
        level: SuppressionLevel,
    ) -> Result<Box<dyn SuppressionEngine>, NsError> {
        Ok(Box::new(NsxEngine::new(sample_rate, level)?))
    }
}
