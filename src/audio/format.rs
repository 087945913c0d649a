// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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

use std::fmt;

use super::provider::ProviderError;

/// Lowest sample rate a canonical stream may have.
pub const CANONICAL_MIN_SAMPLE_RATE: u32 = 32000;

/// Sample format enumeration for audio processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Integer samples (8-bit unsigned, 16-bit or 32-bit signed)
    Int,
    /// 32-bit floating point samples in [-1, 1]
    Float,
}

impl SampleFormat {
    /// Convert to string representation
    pub fn as_str(self) -> &'static str {
        match self {
            SampleFormat::Float => "float",
            SampleFormat::Int => "int",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The native layout of the samples a provider produces. Samples are
/// interleaved and little-endian; 8-bit samples are unsigned with 0x80 as
/// silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Bytes per sample (1, 2 or 4)
    pub bytes_per_sample: u16,
    /// Sample format (integer or float)
    pub sample_format: SampleFormat,
}

impl AudioFormat {
    /// Creates a new AudioFormat, rejecting layouts no provider can produce.
    pub fn new(
        sample_rate: u32,
        channels: u16,
        bytes_per_sample: u16,
        sample_format: SampleFormat,
    ) -> Result<Self, ProviderError> {
        if sample_rate == 0 {
            return Err(ProviderError::UnsupportedFormat(
                "sample rate must be greater than 0".to_string(),
            ));
        }
        if channels == 0 {
            return Err(ProviderError::UnsupportedFormat(
                "channel count must be greater than 0".to_string(),
            ));
        }
        match (sample_format, bytes_per_sample) {
            (SampleFormat::Int, 1 | 2 | 4) | (SampleFormat::Float, 4) => {}
            (format, bytes) => {
                return Err(ProviderError::UnsupportedFormat(format!(
                    "{}-bit {} samples",
                    bytes * 8,
                    format
                )))
            }
        }

        Ok(AudioFormat {
            sample_rate,
            channels,
            bytes_per_sample,
            sample_format,
        })
    }

    /// Mono 16-bit integer samples at the given rate.
    pub fn canonical(sample_rate: u32) -> Self {
        AudioFormat {
            sample_rate,
            channels: 1,
            bytes_per_sample: 2,
            sample_format: SampleFormat::Int,
        }
    }

    /// True when the format is mono, 16-bit integer and at least 32 kHz.
    pub fn is_canonical(&self) -> bool {
        self.channels == 1
            && self.bytes_per_sample == 2
            && self.sample_format == SampleFormat::Int
            && self.sample_rate >= CANONICAL_MIN_SAMPLE_RATE
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bytes_per_sample * 8
    }

    /// Bytes in one interleaved frame (one sample per channel).
    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample as usize * self.channels as usize
    }

    /// The byte value that encodes silence in this format.
    pub fn silence_byte(&self) -> u8 {
        if self.bytes_per_sample == 1 {
            0x80
        } else {
            0
        }
    }

    /// Converts milliseconds to a sample count, rounding to the nearest sample.
    pub fn samples_from_ms(&self, ms: u64) -> u64 {
        (ms * self.sample_rate as u64 + 500) / 1000
    }

    /// Converts a sample count to milliseconds, truncating.
    pub fn ms_from_samples(&self, samples: u64) -> u64 {
        samples * 1000 / self.sample_rate as u64
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}-bit {}",
            self.sample_rate,
            self.channels,
            self.bits_per_sample(),
            self.sample_format
        )
    }
}
