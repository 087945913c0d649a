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
use std::f64::consts::TAU;

use rand::{rngs::StdRng, Rng, SeedableRng};

use super::error::{OpenError, ProviderError};
use super::traits::AudioProvider;
use crate::audio::{AudioFormat, SampleFormat};

pub const URI_PREFIX: &str = "dummy-audio:";

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_BITS: u16 = 16;
const DEFAULT_CHANNELS: u16 = 1;
const DEFAULT_LENGTH_SECONDS: u64 = 30 * 60;
const DEFAULT_SINE_FREQUENCY: f64 = 440.0;

/// Noise is generated in fixed blocks, each seeded from its block index, so
/// any frame always gets the same value no matter where a read starts.
const NOISE_BLOCK_FRAMES: u64 = 4096;

/// The signal a dummy provider synthesizes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DummySignal {
    Silence,
    Noise,
    Sine { frequency: f64 },
}

/// Synthetic audio used for tests and as placeholder audio.
pub struct DummyProvider {
    signal: DummySignal,
    format: AudioFormat,
    num_samples: u64,
    source_name: String,
}

impl DummyProvider {
    pub fn new(signal: DummySignal, format: AudioFormat, num_samples: u64) -> DummyProvider {
        let source_name = match signal {
            DummySignal::Silence => format!("{}silence", URI_PREFIX),
            DummySignal::Noise => format!("{}noise", URI_PREFIX),
            DummySignal::Sine { frequency } => format!("{}sine/{}", URI_PREFIX, frequency),
        };
        DummyProvider {
            signal,
            format,
            num_samples,
            source_name,
        }
    }

    /// Parses `dummy-audio:<signal>?sr=<Hz>&bd=<bits>&ch=<n>&ln=<samples>`.
    pub fn from_uri(uri: &str) -> Result<DummyProvider, OpenError> {
        let invalid = |reason: String| OpenError::InvalidSource {
            name: uri.to_string(),
            reason,
        };

        let rest = uri
            .strip_prefix(URI_PREFIX)
            .ok_or_else(|| invalid(format!("expected prefix {}", URI_PREFIX)))?;
        let (kind, query) = rest.split_once('?').unwrap_or((rest, ""));

        let signal = match kind {
            "silence" => DummySignal::Silence,
            "noise" => DummySignal::Noise,
            "sine" => DummySignal::Sine {
                frequency: DEFAULT_SINE_FREQUENCY,
            },
            _ => match kind.strip_prefix("sine/") {
                Some(freq) => DummySignal::Sine {
                    frequency: freq
                        .parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite() && *f > 0.0)
                        .ok_or_else(|| invalid(format!("bad sine frequency {}", freq)))?,
                },
                None => return Err(invalid(format!("unknown signal {}", kind))),
            },
        };

        let mut sample_rate = DEFAULT_SAMPLE_RATE;
        let mut bits = DEFAULT_BITS;
        let mut channels = DEFAULT_CHANNELS;
        let mut length = None;
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| invalid(format!("malformed parameter {}", pair)))?;
            let bad_value = || invalid(format!("bad value for {}: {}", key, value));
            match key {
                "sr" => sample_rate = value.parse().map_err(|_| bad_value())?,
                "bd" => bits = value.parse().map_err(|_| bad_value())?,
                "ch" => channels = value.parse().map_err(|_| bad_value())?,
                "ln" => length = Some(value.parse::<u64>().map_err(|_| bad_value())?),
                _ => return Err(invalid(format!("unknown parameter {}", key))),
            }
        }

        if !matches!(bits, 8 | 16 | 32) {
            return Err(invalid(format!("unsupported bit depth {}", bits)));
        }
        let format = AudioFormat::new(sample_rate, channels, bits / 8, SampleFormat::Int)
            .map_err(|e| invalid(e.to_string()))?;
        let num_samples = length.unwrap_or(DEFAULT_LENGTH_SECONDS * sample_rate as u64);

        let mut provider = DummyProvider::new(signal, format, num_samples);
        provider.source_name = uri.to_string();
        Ok(provider)
    }

    pub fn signal(&self) -> DummySignal {
        self.signal
    }

    fn fill_noise(&self, buf: &mut [u8], start: u64, count: usize) {
        let channels = self.format.channels as u64;
        let sample_bytes = self.format.bytes_per_sample as usize;
        let mut samples = buf.chunks_exact_mut(sample_bytes);

        let mut frame = start;
        let end = start + count as u64;
        while frame < end {
            let block = frame / NOISE_BLOCK_FRAMES;
            let block_end = ((block + 1) * NOISE_BLOCK_FRAMES).min(end);
            let mut rng = StdRng::seed_from_u64(block);
            for _ in 0..(frame - block * NOISE_BLOCK_FRAMES) * channels {
                rng.gen::<f64>();
            }
            for _ in 0..(block_end - frame) * channels {
                let value = rng.gen::<f64>() * 2.0 - 1.0;
                if let Some(out) = samples.next() {
                    self.encode(value, out);
                }
            }
            frame = block_end;
        }
    }

    fn fill_sine(&self, buf: &mut [u8], start: u64, frequency: f64) {
        let channels = self.format.channels as usize;
        let frame_bytes = self.format.bytes_per_frame();
        let sample_bytes = self.format.bytes_per_sample as usize;
        let step = TAU * frequency / self.format.sample_rate as f64;
        for (i, frame) in buf.chunks_exact_mut(frame_bytes).enumerate() {
            let value = (step * (start + i as u64) as f64).sin();
            for out in frame.chunks_exact_mut(sample_bytes).take(channels) {
                self.encode(value, out);
            }
        }
    }

    /// Writes a value in [-1, 1] as one native sample.
    fn encode(&self, value: f64, out: &mut [u8]) {
        let value = value.clamp(-1.0, 1.0);
        match (self.format.sample_format, self.format.bytes_per_sample) {
            (SampleFormat::Float, _) => out.copy_from_slice(&(value as f32).to_le_bytes()),
            (_, 1) => out[0] = ((value * 127.0).round() as i16 + 128) as u8,
            (_, 2) => out.copy_from_slice(&((value * i16::MAX as f64).round() as i16).to_le_bytes()),
            _ => out.copy_from_slice(&((value * i32::MAX as f64).round() as i32).to_le_bytes()),
        }
    }
}

impl AudioProvider for DummyProvider {
    fn fill_buffer(&self, buf: &mut [u8], start: u64, count: usize) -> Result<(), ProviderError> {
        let buf = &mut buf[..count * self.format.bytes_per_frame()];
        match self.signal {
            DummySignal::Silence => buf.fill(self.format.silence_byte()),
            DummySignal::Noise => self.fill_noise(buf, start, count),
            DummySignal::Sine { frequency } => self.fill_sine(buf, start, frequency),
        }
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
        "dummy"
    }
}
