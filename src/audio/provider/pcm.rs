// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use hound::WavReader;
use parking_lot::Mutex;

use super::error::ProviderError;
use super::traits::AudioProvider;
use crate::audio::{AudioFormat, SampleFormat};

/// How samples of the file are laid out in native bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PcmLayout {
    U8,
    I16,
    /// 24-bit samples widened to 32 bits.
    I24,
    I32,
    F32,
}

/// Fast path for RIFF/WAVE files. The file's own sample format is exposed
/// unchanged; reads seek the reader directly to the requested frame.
pub struct PcmProvider {
    reader: Mutex<WavReader<BufReader<File>>>,
    layout: PcmLayout,
    format: AudioFormat,
    num_samples: u64,
    source_name: String,
}

impl PcmProvider {
    pub fn open(path: &Path) -> Result<PcmProvider, ProviderError> {
        let reader = WavReader::open(path)?;
        let spec = reader.spec();

        let (layout, bytes, sample_format) = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 8) => (PcmLayout::U8, 1, SampleFormat::Int),
            (hound::SampleFormat::Int, 16) => (PcmLayout::I16, 2, SampleFormat::Int),
            (hound::SampleFormat::Int, 24) => (PcmLayout::I24, 4, SampleFormat::Int),
            (hound::SampleFormat::Int, 32) => (PcmLayout::I32, 4, SampleFormat::Int),
            (hound::SampleFormat::Float, 32) => (PcmLayout::F32, 4, SampleFormat::Float),
            (format, bits) => {
                return Err(ProviderError::UnsupportedFormat(format!(
                    "{}-bit {:?} WAV",
                    bits, format
                )))
            }
        };
        let format = AudioFormat::new(spec.sample_rate, spec.channels, bytes, sample_format)?;

        Ok(PcmProvider {
            num_samples: u64::from(reader.duration()),
            reader: Mutex::new(reader),
            layout,
            format,
            source_name: path.to_string_lossy().to_string(),
        })
    }
}

/// Decodes samples from the reader into fixed-width native chunks. Returns
/// the number of bytes written.
fn read_into<S, const N: usize>(
    reader: &mut WavReader<BufReader<File>>,
    out: &mut [u8],
    encode: impl Fn(S) -> [u8; N],
) -> Result<usize, ProviderError>
where
    S: hound::Sample,
{
    let mut written = 0;
    for (chunk, sample) in out.chunks_exact_mut(N).zip(reader.samples::<S>()) {
        chunk.copy_from_slice(&encode(sample?));
        written += N;
    }
    Ok(written)
}

impl AudioProvider for PcmProvider {
    fn fill_buffer(&self, buf: &mut [u8], start: u64, count: usize) -> Result<(), ProviderError> {
        let buf = &mut buf[..count * self.format.bytes_per_frame()];
        let frame = u32::try_from(start).map_err(|_| {
            ProviderError::SampleConversionFailed(format!("frame {} beyond WAV range", start))
        })?;

        let mut reader = self.reader.lock();
        reader.seek(frame)?;
        let written = match self.layout {
            PcmLayout::U8 => read_into(&mut reader, buf, |s: i8| [(s as i16 + 128) as u8])?,
            PcmLayout::I16 => read_into(&mut reader, buf, |s: i16| s.to_le_bytes())?,
            PcmLayout::I24 => read_into(&mut reader, buf, |s: i32| (s << 8).to_le_bytes())?,
            PcmLayout::I32 => read_into(&mut reader, buf, |s: i32| s.to_le_bytes())?,
            PcmLayout::F32 => read_into(&mut reader, buf, |s: f32| s.to_le_bytes())?,
        };

        // A truncated data chunk reads short.
        buf[written..].fill(self.format.silence_byte());
        Ok(())
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    fn num_samples(&self) -> u64 {
        self.num_samples
    }

    fn source_name(&self) -> &str {
        &self.source_name
    }

    fn name(&self) -> &'static str {
        "pcm"
    }
}
