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
use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use super::error::ProviderError;
use super::traits::AudioProvider;
use crate::audio::{AudioFormat, SampleFormat};

/// Reads further ahead than this many seconds trigger a seek instead of
/// decoding forward.
const MAX_FORWARD_DECODE_SECONDS: u64 = 1;

/// Decoder position and the most recently decoded packet.
struct DecodeState {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    /// Interleaved samples of the last decoded packet.
    pending: Vec<f32>,
    /// Frame index of the first frame in `pending`.
    pending_start: u64,
    eof: bool,
}

impl DecodeState {
    fn pending_end(&self, channels: usize) -> u64 {
        self.pending_start + (self.pending.len() / channels) as u64
    }
}

/// A provider that decodes any container and codec symphonia understands
/// (WAV, FLAC, MP3, Ogg, MP4 audio, ...). Samples are exposed as interleaved
/// 32-bit floats. Random reads seek the demuxer accurately and decode forward
/// from there.
pub struct FileProvider {
    state: Mutex<DecodeState>,
    track_id: u32,
    time_base: Option<TimeBase>,
    format: AudioFormat,
    num_samples: u64,
    source_name: String,
}

impl FileProvider {
    /// Opens the first audio track of the file.
    pub fn open(path: &Path) -> Result<FileProvider, ProviderError> {
        let file = File::open(path).map_err(|e| {
            ProviderError::IoError(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint to help the format registry guess the format
        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let source_name = path.to_string_lossy().to_string();
        let fmt_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };
        let detected = get_probe()
            .format(&hint, mss, &fmt_opts, &MetadataOptions::default())
            .map_err(|e| {
                ProviderError::SampleConversionFailed(format!("'{}': {}", source_name, e))
            })?;
        let mut format_reader = detected.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
            .ok_or_else(|| {
                ProviderError::SampleConversionFailed(format!("'{}': no audio track", source_name))
            })?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params.sample_rate.ok_or_else(|| {
            ProviderError::SampleConversionFailed("Sample rate not specified".to_string())
        })?;
        let mut decoder = get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| {
                ProviderError::SampleConversionFailed(format!("'{}': {}", source_name, e))
            })?;

        // Containers that leave the channel layout out get it from the first
        // decoded packet, which is kept so it isn't decoded twice.
        let mut pending = Vec::new();
        let mut pending_start = 0;
        let channels = match params.channels {
            Some(channels) => channels.count() as u16,
            None => {
                match read_and_decode_next_packet(
                    format_reader.as_mut(),
                    decoder.as_mut(),
                    track_id,
                )? {
                    Some((ts, samples, channels)) => {
                        pending = samples;
                        pending_start = ts_to_frame(ts, params.time_base, sample_rate);
                        channels as u16
                    }
                    None => {
                        return Err(ProviderError::SampleConversionFailed(
                            "Channels not specified".to_string(),
                        ))
                    }
                }
            }
        };
        let format = AudioFormat::new(sample_rate, channels, 4, SampleFormat::Float)?;

        let mut state = DecodeState {
            format_reader,
            decoder,
            pending,
            pending_start,
            eof: false,
        };

        let num_samples = match params.n_frames {
            Some(n_frames) => n_frames,
            None => {
                let counted = count_frames(&mut state, track_id, channels as usize)?;
                debug!(source = source_name, frames = counted, "Counted frames.");
                counted
            }
        };

        Ok(FileProvider {
            state: Mutex::new(state),
            track_id,
            time_base: params.time_base,
            format,
            num_samples,
            source_name,
        })
    }

    fn seek(&self, state: &mut DecodeState, frame: u64) -> Result<(), ProviderError> {
        let duration = Duration::from_secs_f64(frame as f64 / self.format.sample_rate as f64);
        state.format_reader.seek(
            SeekMode::Accurate,
            SeekTo::Time {
                time: Time::from(duration),
                track_id: Some(self.track_id),
            },
        )?;
        state.decoder.reset();
        state.pending.clear();
        state.pending_start = frame;
        state.eof = false;
        Ok(())
    }

    /// Decodes the next packet into `pending`. Returns false at end of stream.
    fn decode_next(&self, state: &mut DecodeState) -> Result<bool, ProviderError> {
        match read_and_decode_next_packet(
            state.format_reader.as_mut(),
            state.decoder.as_mut(),
            self.track_id,
        )? {
            Some((ts, samples, _)) => {
                state.pending_start = ts_to_frame(ts, self.time_base, self.format.sample_rate);
                state.pending = samples;
                Ok(true)
            }
            None => {
                state.eof = true;
                Ok(false)
            }
        }
    }
}

impl AudioProvider for FileProvider {
    fn fill_buffer(&self, buf: &mut [u8], start: u64, count: usize) -> Result<(), ProviderError> {
        let channels = self.format.channels as usize;
        let frame_bytes = self.format.bytes_per_frame();
        let buf = &mut buf[..count * frame_bytes];
        let end = start + count as u64;

        let mut state = self.state.lock();
        let max_forward = MAX_FORWARD_DECODE_SECONDS * self.format.sample_rate as u64;
        let pending_end = state.pending_end(channels);
        if start < state.pending_start || start > pending_end + max_forward {
            self.seek(&mut state, start)?;
        }

        let mut frame = start;
        while frame < end {
            let pending_end = state.pending_end(channels);
            let offset = (frame - start) as usize * frame_bytes;

            if frame >= state.pending_start && frame < pending_end {
                let from = (frame - state.pending_start) as usize * channels;
                let n = (end.min(pending_end) - frame) as usize;
                let out = &mut buf[offset..offset + n * frame_bytes];
                for (bytes, sample) in out
                    .chunks_exact_mut(4)
                    .zip(&state.pending[from..from + n * channels])
                {
                    bytes.copy_from_slice(&sample.to_le_bytes());
                }
                frame += n as u64;
            } else if !state.pending.is_empty() && frame < state.pending_start {
                // The decoder resumed past the requested frame.
                let n = (end.min(state.pending_start) - frame) as usize;
                buf[offset..offset + n * frame_bytes].fill(0);
                frame += n as u64;
            } else if state.eof || !self.decode_next(&mut state)? {
                buf[offset..].fill(0);
                break;
            }
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
        "symphonia"
    }
}

fn ts_to_frame(ts: u64, time_base: Option<TimeBase>, sample_rate: u32) -> u64 {
    match time_base {
        Some(tb) if tb.numer == 1 && tb.denom == sample_rate => ts,
        Some(tb) => {
            let time = tb.calc_time(ts);
            time.seconds * sample_rate as u64 + (time.frac * sample_rate as f64).round() as u64
        }
        None => ts,
    }
}

/// Counts frames by walking every packet of the track, then rewinds.
fn count_frames(
    state: &mut DecodeState,
    track_id: u32,
    channels: usize,
) -> Result<u64, ProviderError> {
    let mut frames = (state.pending.len() / channels) as u64;
    let mut packets = 0u64;
    while let Some(packet) = read_next_packet(state.format_reader.as_mut())? {
        if packet.track_id() == track_id {
            frames += packet.dur();
            packets += 1;
        }
    }

    if packets > 0 || !state.pending.is_empty() {
        state.format_reader.seek(
            SeekMode::Accurate,
            SeekTo::TimeStamp {
                ts: 0,
                track_id,
            },
        )?;
        state.decoder.reset();
        state.pending.clear();
        state.pending_start = 0;
    }
    Ok(frames)
}

/// Reads the next packet. End of stream reads as `Ok(None)`; symphonia
/// reports it as an unexpected EOF, and some decoders as a decode error.
fn read_next_packet(format_reader: &mut dyn FormatReader) -> Result<Option<Packet>, ProviderError> {
    match format_reader.next_packet() {
        Ok(packet) => Ok(Some(packet)),
        Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Ok(None)
        }
        Err(SymphoniaError::DecodeError(_)) => Ok(None),
        Err(e) => Err(ProviderError::AudioError(e)),
    }
}

/// Reads and decodes packets until one of the track yields samples. Returns
/// the packet timestamp, interleaved samples and the channel count, or
/// `Ok(None)` at end of stream.
fn read_and_decode_next_packet(
    format_reader: &mut dyn FormatReader,
    decoder: &mut dyn Decoder,
    track_id: u32,
) -> Result<Option<(u64, Vec<f32>, usize)>, ProviderError> {
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None)
            }
            Err(SymphoniaError::DecodeError(_)) => return Ok(None),
            Err(e) => return Err(ProviderError::AudioError(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                decoder.decode(&packet)?
            }
            // A corrupt packet is skipped rather than ending the stream.
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(err = e, ts = packet.ts(), "Skipping undecodable packet.");
                continue;
            }
            Err(e) => return Err(ProviderError::AudioError(e)),
        };
        let (samples, channels) = decode_buffer_to_f32(decoded);
        if channels > 0 && !samples.is_empty() {
            return Ok(Some((packet.ts(), samples, channels)));
        }
    }
}

/// Converts a decoded buffer to interleaved f32 samples and returns the
/// channel count observed in the buffer.
fn decode_buffer_to_f32(decoded: AudioBufferRef) -> (Vec<f32>, usize) {
    match decoded {
        AudioBufferRef::F32(buf) => interleave_planar_samples(&buf, |sample| sample),
        AudioBufferRef::F64(buf) => interleave_planar_samples(&buf, |sample| sample as f32),
        AudioBufferRef::S8(buf) => interleave_planar_samples(&buf, scale_s8),
        AudioBufferRef::S16(buf) => interleave_planar_samples(&buf, scale_s16),
        AudioBufferRef::S24(buf) => interleave_planar_samples(&buf, |s| scale_s24(s.inner())),
        AudioBufferRef::S32(buf) => interleave_planar_samples(&buf, scale_s32),
        AudioBufferRef::U8(buf) => interleave_planar_samples(&buf, scale_u8),
        AudioBufferRef::U16(buf) => interleave_planar_samples(&buf, scale_u16),
        AudioBufferRef::U24(buf) => interleave_planar_samples(&buf, |s| scale_u24(s.inner())),
        AudioBufferRef::U32(buf) => interleave_planar_samples(&buf, scale_u32),
    }
}

fn interleave_planar_samples<T, F>(buf: &AudioBuffer<T>, convert: F) -> (Vec<f32>, usize)
where
    T: symphonia::core::sample::Sample,
    F: Fn(T) -> f32,
{
    let frames = buf.frames();
    let channels = buf.spec().channels.count();
    let planes = buf.planes();
    let planes = planes.planes();
    let mut samples = Vec::with_capacity(frames * channels);
    for frame_idx in 0..frames {
        for plane in planes.iter().take(channels) {
            samples.push(convert(plane[frame_idx]));
        }
    }
    (samples, channels)
}

// Scaling helpers for all integer formats.

#[inline]
pub(crate) fn scale_s8(sample: i8) -> f32 {
    sample as f32 / (1i64 << 7) as f32
}

#[inline]
pub(crate) fn scale_s16(sample: i16) -> f32 {
    sample as f32 / (1i64 << 15) as f32
}

#[inline]
pub(crate) fn scale_s24(sample: i32) -> f32 {
    sample as f32 / (1i64 << 23) as f32
}

#[inline]
pub(crate) fn scale_s32(sample: i32) -> f32 {
    sample as f32 / (1i64 << 31) as f32
}

#[inline]
pub(crate) fn scale_u8(sample: u8) -> f32 {
    (sample as f32 / u8::MAX as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u16(sample: u16) -> f32 {
    (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u24(sample: u32) -> f32 {
    let max = (1u32 << 24) - 1;
    (sample as f32 / max as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u32(sample: u32) -> f32 {
    (sample as f32 / u32::MAX as f32) * 2.0 - 1.0
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::write_wav;

    fn read_f32(provider: &FileProvider, start: u64, count: usize) -> Vec<f32> {
        let mut buf = vec![0u8; count * provider.format().bytes_per_frame()];
        provider.get_audio(&mut buf, start, count).unwrap();
        buf.chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    #[test]
    fn test_scale_signed() {
        assert_eq!(scale_s8(0), 0.0);
        assert_eq!(scale_s8(-128), -1.0);
        assert_eq!(scale_s16(i16::MIN), -1.0);
        assert_eq!(scale_s16(16384), 0.5);
        assert_eq!(scale_s24(-(1 << 23)), -1.0);
        assert_eq!(scale_s32(i32::MIN), -1.0);
    }

    #[test]
    fn test_scale_unsigned() {
        assert_eq!(scale_u8(0), -1.0);
        assert_eq!(scale_u8(u8::MAX), 1.0);
        assert_eq!(scale_u16(u16::MAX), 1.0);
        assert_eq!(scale_u24((1 << 24) - 1), 1.0);
        assert_eq!(scale_u32(0), -1.0);
    }

    #[test]
    fn test_ts_to_frame() {
        assert_eq!(ts_to_frame(1234, Some(TimeBase::new(1, 44100)), 44100), 1234);
        assert_eq!(ts_to_frame(500, Some(TimeBase::new(1, 1000)), 48000), 24000);
        assert_eq!(ts_to_frame(77, None, 48000), 77);
    }

    #[test]
    fn decodes_wav_with_random_access() -> Result<(), Box<dyn std::error::Error>> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("ramp.wav");
        let frames = 100_000;
        let left: Vec<i32> = (0..frames).map(|i| (i % 30000) - 15000).collect();
        let right: Vec<i32> = left.iter().map(|s| -s).collect();
        write_wav(path.clone(), vec![left.clone(), right], 44100)?;

        let provider = FileProvider::open(&path)?;
        assert_eq!(provider.name(), "symphonia");
        assert_eq!(provider.num_samples(), frames as u64);
        let format = provider.format();
        assert_eq!(format.channels, 2);
        assert_eq!(format.sample_format, SampleFormat::Float);

        // Forward, far forward, backward.
        for start in [10u64, 90_000, 5, 44_000] {
            let samples = read_f32(&provider, start, 64);
            for (i, pair) in samples.chunks_exact(2).enumerate() {
                let expected = scale_s16(left[start as usize + i] as i16);
                assert_eq!(pair[0], expected, "frame {}", start as usize + i);
                assert_eq!(pair[1], -expected);
            }
        }
        Ok(())
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            FileProvider::open(Path::new("/definitely/not/here.flac")),
            Err(ProviderError::IoError(_))
        ));
    }
}
