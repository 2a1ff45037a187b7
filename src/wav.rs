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

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::engine::EngineFactory;
use crate::format::AudioFormat;
use crate::pipeline::{self, AudioSink, AudioSource, ProcessOptions};
use crate::{NsError, NsErrorKind};

/// WAV-backed source reader.
///
/// Presents every file as 16-bit signed PCM at the file's own rate and
/// channel count, converting 8/24/32-bit integer and float samples on read.
/// Rate or channel changes are rejected; this collaborator converts sample
/// depth, not topology.
pub struct WavSource {
    reader: WavReader<BufReader<File>>,
    file_spec: WavSpec,
    frames_read: i64,
}

impl WavSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, NsError> {
        let path = path.as_ref();
        let reader = WavReader::open(path).map_err(|err| {
            NsError::new(NsErrorKind::FormatRead, format!("{}: {err}", path.display()))
        })?;
        let file_spec = reader.spec();
        Ok(Self { reader, file_spec, frames_read: 0 })
    }
}

impl AudioSource for WavSource {
    fn basic_format(&self) -> Result<AudioFormat, NsError> {
        Ok(AudioFormat::pcm(
            self.file_spec.sample_rate as f64,
            16,
            self.file_spec.channels as u32,
        ))
    }

    fn set_client_format(&mut self, format: &AudioFormat) -> Result<(), NsError> {
        let matches = format.pcm
            && format.bits_per_sample == 16
            && format.sample_rate == self.file_spec.sample_rate as f64
            && format.num_channels == self.file_spec.channels as u32;
        if !matches {
            return Err(NsError::new(
                NsErrorKind::FormatConvert,
                format!("cannot convert {:?} to {format:?}", self.file_spec),
            ));
        }
        Ok(())
    }

    fn read_frames(&mut self, frames: u64, buf: &mut [u8]) -> Result<u64, NsError> {
        let channels = self.file_spec.channels as usize;
        let wanted = frames as usize * channels;

        let read_err =
            |err: hound::Error| NsError::new(NsErrorKind::FrameRead, err.to_string());

        let mut samples = Vec::with_capacity(wanted);
        match (self.file_spec.sample_format, self.file_spec.bits_per_sample) {
            (SampleFormat::Int, bits @ ..=16) => {
                for sample in self.reader.samples::<i16>().take(wanted) {
                    let sample = sample.map_err(read_err)?;
                    samples.push(if bits == 8 { sample << 8 } else { sample });
                }
            }
            (SampleFormat::Int, bits) => {
                let shift = bits - 16;
                for sample in self.reader.samples::<i32>().take(wanted) {
                    samples.push((sample.map_err(read_err)? >> shift) as i16);
                }
            }
            (SampleFormat::Float, _) => {
                for sample in self.reader.samples::<f32>().take(wanted) {
                    let scaled = (sample.map_err(read_err)? * 32767.0).clamp(-32768.0, 32767.0);
                    samples.push(scaled as i16);
                }
            }
        }

        // Only hand out whole audio frames.
        let read = samples.len() / channels;
        for (i, sample) in samples[..read * channels].iter().enumerate() {
            buf[i * 2..i * 2 + 2].copy_from_slice(&sample.to_le_bytes());
        }
        self.frames_read += read as i64;
        Ok(read as u64)
    }

    fn frame_offset(&mut self) -> Result<i64, NsError> {
        Ok(self.frames_read)
    }

    fn total_frames(&self) -> Result<i64, NsError> {
        Ok(self.reader.duration() as i64)
    }
}

/// WAV-backed sink writer; the header is finalized on drop.
pub struct WavSink {
    writer: WavWriter<BufWriter<File>>,
}

impl WavSink {
    pub fn create(path: impl AsRef<Path>, format: &AudioFormat) -> Result<Self, NsError> {
        if format.bits_per_sample != 16 {
            return Err(NsError::new(
                NsErrorKind::SinkCreate,
                format!("output requires 16-bit PCM, got {format:?}"),
            ));
        }

        let spec = WavSpec {
            channels: format.num_channels as u16,
            sample_rate: format.sample_rate as u32,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let path = path.as_ref();
        let writer = WavWriter::create(path, spec).map_err(|err| {
            NsError::new(NsErrorKind::SinkCreate, format!("{}: {err}", path.display()))
        })?;
        Ok(Self { writer })
    }
}

impl AudioSink for WavSink {
    fn write_frames(&mut self, _frames: u64, data: &[u8]) -> Result<(), NsError> {
        for pair in data.chunks_exact(2) {
            self.writer
                .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                .map_err(|err| NsError::new(NsErrorKind::FrameWrite, err.to_string()))?;
        }
        Ok(())
    }
}

/// Suppresses one WAV file into another, synchronously.
///
/// `on_progress` receives a non-decreasing fraction reaching 1.0 on success;
/// `on_complete` fires once on every exit path with the overall outcome.
pub fn process_file(
    in_path: impl AsRef<Path>,
    out_path: impl AsRef<Path>,
    factory: &dyn EngineFactory,
    options: &ProcessOptions,
    on_progress: impl FnMut(f32),
    on_complete: impl FnOnce(bool),
) -> Result<(), NsError> {
    let source = match WavSource::open(in_path) {
        Ok(source) => source,
        Err(err) => {
            log::error!("suppression operation failed: {err}");
            on_complete(false);
            return Err(err);
        }
    };

    let out_path = out_path.as_ref();
    pipeline::process(
        source,
        |format| WavSink::create(out_path, format),
        factory,
        options,
        on_progress,
        on_complete,
    )
}

/// [`process_file`] on a blocking task, so the caller's executor is never
/// stalled by file I/O.
pub async fn process_file_async<F>(
    in_path: impl Into<PathBuf>,
    out_path: impl Into<PathBuf>,
    factory: F,
    options: ProcessOptions,
    on_progress: impl FnMut(f32) + Send + 'static,
    on_complete: impl FnOnce(bool) + Send + 'static,
) -> Result<(), NsError>
where
    F: EngineFactory + Send + 'static,
{
    let in_path = in_path.into();
    let out_path = out_path.into();
    tokio::task::spawn_blocking(move || {
        process_file(&in_path, &out_path, &factory, &options, on_progress, on_complete)
    })
    .await
    .expect("suppression task panicked")
}
