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
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

use super::error::ProviderError;
use crate::audio::{AudioFormat, SampleFormat};

/// Bytes of native samples converted per pass in `get_int16`.
const INT16_CHUNK_BYTES: usize = 8192;

/// Reads that failed and were answered with silence instead.
static SILENCED_READS: AtomicU64 = AtomicU64::new(0);

/// Number of reads, process wide, that were replaced by silence because the
/// provider returned an error.
pub fn silenced_read_count() -> u64 {
    SILENCED_READS.load(Ordering::Relaxed)
}

/// A random-access source of audio samples.
///
/// Samples are addressed by frame index (one sample per channel) and written
/// interleaved, little-endian, in the provider's native format. Metadata never
/// changes after construction.
pub trait AudioProvider: Send + Sync {
    /// Fills `count` frames starting at `start` into `buf`. Callers guarantee
    /// the whole range lies inside `0..num_samples()` and that `buf` holds
    /// exactly `count` frames.
    fn fill_buffer(&self, buf: &mut [u8], start: u64, count: usize) -> Result<(), ProviderError>;

    /// The native format of the samples this provider produces.
    fn format(&self) -> AudioFormat;

    /// Total number of frames.
    fn num_samples(&self) -> u64;

    /// The name the source was opened with.
    fn source_name(&self) -> &str;

    /// Short name of this provider kind, used when describing a chain.
    fn name(&self) -> &'static str;

    /// The provider this one wraps, if any.
    fn inner(&self) -> Option<&dyn AudioProvider> {
        None
    }

    /// True if the provider must sit behind a decode-once cache tier.
    fn needs_cache(&self) -> bool {
        self.inner().is_some_and(|inner| inner.needs_cache())
    }

    /// False if seeking may land somewhere other than the requested frame.
    fn reliable_seek(&self) -> bool {
        self.inner().map_or(true, |inner| inner.reliable_seek())
    }

    /// Reads `count` frames starting at `start`. Frames past the end of the
    /// provider are returned as silence.
    fn get_audio(&self, buf: &mut [u8], start: u64, count: usize) -> Result<(), ProviderError> {
        let format = self.format();
        let frame_bytes = format.bytes_per_frame();
        let needed = count * frame_bytes;
        if buf.len() < needed {
            return Err(ProviderError::BufferSize {
                expected: needed,
                actual: buf.len(),
            });
        }

        let buf = &mut buf[..needed];
        let total = self.num_samples();
        let valid = if start >= total {
            0
        } else {
            (total - start).min(count as u64) as usize
        };

        if valid < count {
            buf[valid * frame_bytes..].fill(format.silence_byte());
        }
        if valid > 0 {
            self.fill_buffer(&mut buf[..valid * frame_bytes], start, valid)?;
        }
        Ok(())
    }

    /// Reads `count` frames as signed 16-bit samples. Only valid for mono
    /// 16-bit integer providers.
    fn get_int16(&self, out: &mut [i16], start: u64, count: usize) -> Result<(), ProviderError> {
        let format = self.format();
        if format.channels != 1
            || format.bytes_per_sample != 2
            || format.sample_format != SampleFormat::Int
        {
            return Err(ProviderError::UnsupportedFormat(format!(
                "16-bit mono reads from {}",
                format
            )));
        }
        if out.len() < count {
            return Err(ProviderError::BufferSize {
                expected: count * 2,
                actual: out.len() * 2,
            });
        }

        let mut chunk = [0u8; INT16_CHUNK_BYTES];
        let per_chunk = INT16_CHUNK_BYTES / 2;
        let mut done = 0;
        while done < count {
            let n = (count - done).min(per_chunk);
            self.get_audio(&mut chunk[..n * 2], start + done as u64, n)?;
            for (sample, bytes) in out[done..done + n].iter_mut().zip(chunk.chunks_exact(2)) {
                *sample = i16::from_le_bytes([bytes[0], bytes[1]]);
            }
            done += n;
        }
        Ok(())
    }

    /// Reads `count` canonical samples scaled by `volume`. Read failures are
    /// answered with silence and counted; see [silenced_read_count].
    fn get_audio_with_volume(&self, out: &mut [i16], start: u64, count: usize, volume: f64) {
        let count = count.min(out.len());
        let out = &mut out[..count];
        if let Err(e) = self.get_int16(out, start, count) {
            warn!(
                err = %e,
                source = self.source_name(),
                start,
                count,
                "Audio read failed, substituting silence."
            );
            out.fill(0);
            SILENCED_READS.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if volume != 1.0 {
            for sample in out.iter_mut() {
                *sample = scale_with_saturation(*sample, volume);
            }
        }
    }
}

/// Scales a sample, clipping to the signed 16-bit range instead of wrapping.
pub fn scale_with_saturation(sample: i16, volume: f64) -> i16 {
    (sample as f64 * volume)
        .round()
        .clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Describes a provider chain from the outermost wrapper inwards, e.g.
/// `ram-cache <- downmix <- pcm`.
pub fn describe_chain(provider: &dyn AudioProvider) -> String {
    let mut names = vec![provider.name()];
    let mut current = provider.inner();
    while let Some(inner) = current {
        names.push(inner.name());
        current = inner.inner();
    }
    names.join(" <- ")
}
