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
//! Stages that bring any provider to the canonical format: mono, 16-bit
//! integer, at least 32 kHz. Each stage wraps the previous one and is only
//! inserted when its conversion is needed.

use parking_lot::Mutex;
use rubato::{
    SincFixedIn, SincInterpolationParameters, SincInterpolationType, VecResampler, WindowFunction,
};
use tracing::debug;

use super::error::ProviderError;
use super::traits::AudioProvider;
use crate::audio::format::CANONICAL_MIN_SAMPLE_RATE;
use crate::audio::{AudioFormat, SampleFormat};

/// Input block size for the sinc resampler.
const INPUT_BLOCK_SIZE: usize = 1024;

/// Length of the sinc filter.
const SINC_LEN: usize = 256;

/// Source frames fed ahead of a seek target so the filter has settled by the
/// time the requested output starts.
const RESAMPLE_PRIMING_FRAMES: u64 = SINC_LEN as u64;

/// Lowest input rate the upsampler accepts.
pub const MIN_UPSAMPLE_RATE: u32 = 4000;

/// Applies the conversions needed to make `provider` canonical. A provider
/// that is already canonical is returned untouched.
pub fn convert_to_canonical(
    provider: Box<dyn AudioProvider>,
) -> Result<Box<dyn AudioProvider>, ProviderError> {
    let mut provider = provider;
    let format = provider.format();
    if format.sample_format == SampleFormat::Float {
        provider = Box::new(FloatToInt16::new(provider)?);
    }
    if provider.format().bytes_per_sample != 2 {
        provider = Box::new(BitDepthToInt16::new(provider)?);
    }
    if provider.format().channels > 1 {
        provider = Box::new(DownmixToMono::new(provider)?);
    }
    if provider.format().sample_rate < CANONICAL_MIN_SAMPLE_RATE {
        provider = Box::new(Upsampler::new(provider)?);
    }
    Ok(provider)
}

/// Reads `count` frames of the source into a fresh byte buffer.
fn read_source(
    source: &dyn AudioProvider,
    start: u64,
    count: usize,
) -> Result<Vec<u8>, ProviderError> {
    let mut raw = vec![0u8; count * source.format().bytes_per_frame()];
    source.fill_buffer(&mut raw, start, count)?;
    Ok(raw)
}

/// 32-bit float to 16-bit integer, keeping the channel layout.
pub struct FloatToInt16 {
    source: Box<dyn AudioProvider>,
    format: AudioFormat,
}

impl FloatToInt16 {
    pub fn new(source: Box<dyn AudioProvider>) -> Result<Self, ProviderError> {
        let src = source.format();
        if src.sample_format != SampleFormat::Float {
            return Err(ProviderError::UnsupportedFormat(format!(
                "float conversion of {}",
                src
            )));
        }
        let format = AudioFormat::new(src.sample_rate, src.channels, 2, SampleFormat::Int)?;
        Ok(FloatToInt16 { source, format })
    }
}

impl AudioProvider for FloatToInt16 {
    fn fill_buffer(&self, buf: &mut [u8], start: u64, count: usize) -> Result<(), ProviderError> {
        let raw = read_source(self.source.as_ref(), start, count)?;
        for (out, bytes) in buf.chunks_exact_mut(2).zip(raw.chunks_exact(4)) {
            let value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            let sample = (value as f64 * 32768.0)
                .round()
                .clamp(i16::MIN as f64, i16::MAX as f64) as i16;
            out.copy_from_slice(&sample.to_le_bytes());
        }
        Ok(())
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    fn num_samples(&self) -> u64 {
        self.source.num_samples()
    }

    fn source_name(&self) -> &str {
        self.source.source_name()
    }

    fn name(&self) -> &'static str {
        "float-to-int"
    }

    fn inner(&self) -> Option<&dyn AudioProvider> {
        Some(self.source.as_ref())
    }
}

/// 8-bit unsigned or 32-bit signed integer to 16-bit signed.
pub struct BitDepthToInt16 {
    source: Box<dyn AudioProvider>,
    format: AudioFormat,
}

impl BitDepthToInt16 {
    pub fn new(source: Box<dyn AudioProvider>) -> Result<Self, ProviderError> {
        let src = source.format();
        if src.sample_format != SampleFormat::Int || src.bytes_per_sample == 2 {
            return Err(ProviderError::UnsupportedFormat(format!(
                "bit depth conversion of {}",
                src
            )));
        }
        let format = AudioFormat::new(src.sample_rate, src.channels, 2, SampleFormat::Int)?;
        Ok(BitDepthToInt16 { source, format })
    }
}

impl AudioProvider for BitDepthToInt16 {
    fn fill_buffer(&self, buf: &mut [u8], start: u64, count: usize) -> Result<(), ProviderError> {
        let raw = read_source(self.source.as_ref(), start, count)?;
        let width = self.source.format().bytes_per_sample as usize;
        for (out, bytes) in buf.chunks_exact_mut(2).zip(raw.chunks_exact(width)) {
            let sample = match width {
                1 => ((bytes[0] as i16) - 128) << 8,
                _ => (i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) >> 16) as i16,
            };
            out.copy_from_slice(&sample.to_le_bytes());
        }
        Ok(())
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    fn num_samples(&self) -> u64 {
        self.source.num_samples()
    }

    fn source_name(&self) -> &str {
        self.source.source_name()
    }

    fn name(&self) -> &'static str {
        "bitdepth"
    }

    fn inner(&self) -> Option<&dyn AudioProvider> {
        Some(self.source.as_ref())
    }
}

/// Averages all channels of 16-bit audio into one.
pub struct DownmixToMono {
    source: Box<dyn AudioProvider>,
    format: AudioFormat,
}

impl DownmixToMono {
    pub fn new(source: Box<dyn AudioProvider>) -> Result<Self, ProviderError> {
        let src = source.format();
        if src.sample_format != SampleFormat::Int || src.bytes_per_sample != 2 {
            return Err(ProviderError::UnsupportedFormat(format!(
                "downmix of {}",
                src
            )));
        }
        Ok(DownmixToMono {
            source,
            format: AudioFormat::canonical(src.sample_rate),
        })
    }
}

impl AudioProvider for DownmixToMono {
    fn fill_buffer(&self, buf: &mut [u8], start: u64, count: usize) -> Result<(), ProviderError> {
        let raw = read_source(self.source.as_ref(), start, count)?;
        let channels = self.source.format().channels as usize;
        for (out, frame) in buf.chunks_exact_mut(2).zip(raw.chunks_exact(channels * 2)) {
            let sum: i32 = frame
                .chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]]) as i32)
                .sum();
            out.copy_from_slice(&((sum / channels as i32) as i16).to_le_bytes());
        }
        Ok(())
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    fn num_samples(&self) -> u64 {
        self.source.num_samples()
    }

    fn source_name(&self) -> &str {
        self.source.source_name()
    }

    fn name(&self) -> &'static str {
        "downmix"
    }

    fn inner(&self) -> Option<&dyn AudioProvider> {
        Some(self.source.as_ref())
    }
}

/// Smallest power of two that brings `rate` to the canonical minimum.
fn upsample_factor(rate: u32) -> u32 {
    let mut factor = 1;
    while rate * factor < CANONICAL_MIN_SAMPLE_RATE {
        factor *= 2;
    }
    factor
}

/// Resampler and the window of output it has produced so far.
struct ResampleState {
    resampler: SincFixedIn<f32>,
    input: Vec<Vec<f32>>,
    output: Vec<Vec<f32>>,
    input_int: Vec<i16>,
    /// Produced output, starting at output frame `fifo_start`.
    fifo: Vec<f32>,
    fifo_start: u64,
    /// Next source frame to feed to the resampler.
    next_input: u64,
    /// Output frames still to discard for the filter delay.
    delay: usize,
}

/// Raises the sample rate of mono 16-bit audio by a power of two with a sinc
/// resampler. Sequential reads stream through the filter; a read outside the
/// produced window restarts the filter just ahead of the target.
pub struct Upsampler {
    source: Box<dyn AudioProvider>,
    format: AudioFormat,
    factor: u32,
    state: Mutex<ResampleState>,
}

impl Upsampler {
    pub fn new(source: Box<dyn AudioProvider>) -> Result<Self, ProviderError> {
        let src = source.format();
        if src.channels != 1 || src.bytes_per_sample != 2 || src.sample_format != SampleFormat::Int
        {
            return Err(ProviderError::UnsupportedFormat(format!(
                "upsampling of {}",
                src
            )));
        }
        if src.sample_rate < MIN_UPSAMPLE_RATE {
            return Err(ProviderError::UnsupportedFormat(format!(
                "sample rate {} Hz is below {} Hz",
                src.sample_rate, MIN_UPSAMPLE_RATE
            )));
        }
        let factor = upsample_factor(src.sample_rate);
        let format = AudioFormat::canonical(src.sample_rate * factor);
        let state = ResampleState::new(src.sample_rate, format.sample_rate, factor, 0)?;
        debug!(
            from = src.sample_rate,
            to = format.sample_rate,
            "Upsampling audio."
        );
        Ok(Upsampler {
            source,
            format,
            factor,
            state: Mutex::new(state),
        })
    }

    /// Restarts the filter so its output covers `out_pos`.
    fn reset_at(&self, state: &mut ResampleState, out_pos: u64) -> Result<(), ProviderError> {
        let in_pos = (out_pos / self.factor as u64).saturating_sub(RESAMPLE_PRIMING_FRAMES);
        *state = ResampleState::new(
            self.source.format().sample_rate,
            self.format.sample_rate,
            self.factor,
            in_pos,
        )?;
        Ok(())
    }

    /// Feeds one input block through the filter, appending to the fifo.
    fn produce(&self, state: &mut ResampleState) -> Result<(), ProviderError> {
        let needed = state.resampler.input_frames_next();
        state.input_int.resize(needed, 0);
        self.source
            .get_int16(&mut state.input_int, state.next_input, needed)?;
        state.input[0].clear();
        state.input[0].extend(state.input_int.iter().map(|s| *s as f32 / 32768.0));

        let (consumed, produced) = state
            .resampler
            .process_into_buffer(&state.input, &mut state.output, None)
            .map_err(|_e| {
                ProviderError::ResamplingFailed(
                    self.source.format().sample_rate,
                    self.format.sample_rate,
                )
            })?;
        state.next_input += consumed as u64;

        let skip = state.delay.min(produced);
        state.delay -= skip;
        state.fifo.extend_from_slice(&state.output[0][skip..produced]);
        Ok(())
    }
}

impl ResampleState {
    fn new(
        source_rate: u32,
        target_rate: u32,
        factor: u32,
        in_pos: u64,
    ) -> Result<Self, ProviderError> {
        let sinc_params = SincInterpolationParameters {
            sinc_len: SINC_LEN,
            f_cutoff: 0.95,
            oversampling_factor: 128,
            interpolation: SincInterpolationType::Linear,
            window: WindowFunction::BlackmanHarris2,
        };
        let resampler = SincFixedIn::<f32>::new(
            factor as f64,
            1.0,
            sinc_params,
            INPUT_BLOCK_SIZE,
            1,
        )
        .map_err(|_e| ProviderError::ResamplingFailed(source_rate, target_rate))?;
        let output = resampler.output_buffer_allocate(true);

        Ok(ResampleState {
            resampler,
            input: vec![Vec::with_capacity(INPUT_BLOCK_SIZE)],
            output,
            input_int: Vec::with_capacity(INPUT_BLOCK_SIZE),
            fifo: Vec::new(),
            fifo_start: in_pos * factor as u64,
            next_input: in_pos,
            delay: SINC_LEN * factor as usize / 2,
        })
    }
}

impl AudioProvider for Upsampler {
    fn fill_buffer(&self, buf: &mut [u8], start: u64, count: usize) -> Result<(), ProviderError> {
        let end = start + count as u64;
        let mut state = self.state.lock();

        let window_end = state.fifo_start + state.fifo.len() as u64;
        let lookahead = self.format.sample_rate as u64;
        if start < state.fifo_start || start > window_end + lookahead {
            self.reset_at(&mut state, start)?;
        }

        while state.fifo_start + (state.fifo.len() as u64) < end {
            self.produce(&mut state)?;
        }

        let offset = (start - state.fifo_start) as usize;
        for (out, value) in buf
            .chunks_exact_mut(2)
            .zip(&state.fifo[offset..offset + count])
        {
            let sample = (*value as f64 * 32768.0)
                .round()
                .clamp(i16::MIN as f64, i16::MAX as f64) as i16;
            out.copy_from_slice(&sample.to_le_bytes());
        }

        // Keep the window from `start` so rereads and the next sequential
        // read are served without refiltering.
        state.fifo.drain(..offset);
        state.fifo_start = start;
        Ok(())
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    fn num_samples(&self) -> u64 {
        self.source.num_samples() * self.factor as u64
    }

    fn source_name(&self) -> &str {
        self.source.source_name()
    }

    fn name(&self) -> &'static str {
        "upsample"
    }

    fn inner(&self) -> Option<&dyn AudioProvider> {
        Some(self.source.as_ref())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::audio::provider::dummy::{DummyProvider, DummySignal};
    use crate::audio::provider::traits::describe_chain;

    fn dummy(signal: DummySignal, format: AudioFormat, len: u64) -> Box<dyn AudioProvider> {
        Box::new(DummyProvider::new(signal, format, len))
    }

    #[test]
    fn test_upsample_factor() {
        assert_eq!(upsample_factor(MIN_UPSAMPLE_RATE), 8);
        assert_eq!(upsample_factor(8000), 4);
        assert_eq!(upsample_factor(11025), 4);
        assert_eq!(upsample_factor(16000), 2);
        assert_eq!(upsample_factor(22050), 2);
        assert_eq!(upsample_factor(32000), 1);
        assert_eq!(upsample_factor(44100), 1);
    }

    #[test]
    fn rates_below_the_floor_are_rejected() {
        let format = AudioFormat::new(1, 1, 2, SampleFormat::Int).unwrap();
        let result = convert_to_canonical(dummy(DummySignal::Silence, format, 100));
        assert!(matches!(result, Err(ProviderError::UnsupportedFormat(_))));

        let format = AudioFormat::new(MIN_UPSAMPLE_RATE - 1, 2, 4, SampleFormat::Float).unwrap();
        let result = convert_to_canonical(dummy(DummySignal::Noise, format, 100));
        assert!(matches!(result, Err(ProviderError::UnsupportedFormat(_))));

        let format = AudioFormat::new(MIN_UPSAMPLE_RATE, 1, 2, SampleFormat::Int).unwrap();
        let provider = convert_to_canonical(dummy(DummySignal::Silence, format, 100)).unwrap();
        assert_eq!(provider.format().sample_rate, 32000);
    }

    #[test]
    fn canonical_is_untouched() {
        let provider = convert_to_canonical(dummy(
            DummySignal::Silence,
            AudioFormat::canonical(44100),
            100,
        ))
        .unwrap();
        assert_eq!(provider.name(), "dummy");
        assert!(provider.inner().is_none());
    }

    #[test]
    fn stages_are_applied_in_order() {
        let format = AudioFormat::new(22050, 2, 4, SampleFormat::Int).unwrap();
        let provider = convert_to_canonical(dummy(DummySignal::Noise, format, 1000)).unwrap();
        assert_eq!(describe_chain(provider.as_ref()), "upsample <- downmix <- bitdepth <- dummy");
        assert!(provider.format().is_canonical());
        assert_eq!(provider.format().sample_rate, 44100);
        assert_eq!(provider.num_samples(), 2000);
        assert_eq!(provider.source_name(), "dummy-audio:noise");
    }

    #[test]
    fn float_and_eight_bit_conversion() {
        let format = AudioFormat::new(48000, 1, 4, SampleFormat::Float).unwrap();
        let provider = convert_to_canonical(dummy(
            DummySignal::Sine { frequency: 12000.0 },
            format,
            8,
        ))
        .unwrap();
        assert_eq!(provider.name(), "float-to-int");
        let mut out = [0i16; 4];
        provider.get_int16(&mut out, 0, 4).unwrap();
        assert_eq!(out[0], 0);
        assert!(out[1] >= i16::MAX - 1);
        assert!(out[3] <= i16::MIN + 1);

        let format = AudioFormat::new(48000, 1, 1, SampleFormat::Int).unwrap();
        let provider = convert_to_canonical(dummy(DummySignal::Silence, format, 8)).unwrap();
        assert_eq!(provider.name(), "bitdepth");
        let mut out = [1i16; 8];
        provider.get_int16(&mut out, 0, 8).unwrap();
        assert_eq!(out, [0; 8]);
    }

    #[test]
    fn downmix_averages_channels() {
        struct Stereo;
        impl AudioProvider for Stereo {
            fn fill_buffer(
                &self,
                buf: &mut [u8],
                _start: u64,
                _count: usize,
            ) -> Result<(), ProviderError> {
                for frame in buf.chunks_exact_mut(4) {
                    frame[..2].copy_from_slice(&1000i16.to_le_bytes());
                    frame[2..].copy_from_slice(&(-3000i16).to_le_bytes());
                }
                Ok(())
            }
            fn format(&self) -> AudioFormat {
                AudioFormat::new(44100, 2, 2, SampleFormat::Int).unwrap()
            }
            fn num_samples(&self) -> u64 {
                10
            }
            fn source_name(&self) -> &str {
                "stereo"
            }
            fn name(&self) -> &'static str {
                "stereo"
            }
        }

        let provider = convert_to_canonical(Box::new(Stereo)).unwrap();
        assert_eq!(provider.name(), "downmix");
        let mut out = [0i16; 10];
        provider.get_int16(&mut out, 0, 10).unwrap();
        assert_eq!(out, [-1000; 10]);
    }

    #[test]
    fn upsampled_sine_keeps_its_shape() {
        let rate = 16000;
        let frequency = 500.0;
        let provider = convert_to_canonical(dummy(
            DummySignal::Sine { frequency },
            AudioFormat::canonical(rate),
            rate as u64 * 3,
        ))
        .unwrap();
        assert_eq!(provider.format().sample_rate, 32000);

        // Compare a window in the middle against the ideal signal. The first
        // read jumps there, so it also exercises a filter restart.
        let start = 80000u64;
        let mut out = vec![0i16; 2000];
        provider.get_int16(&mut out, start, 2000).unwrap();
        let mut max_error = 0f64;
        for (i, sample) in out.iter().enumerate() {
            let t = (start + i as u64) as f64 / 32000.0;
            let expected = (std::f64::consts::TAU * frequency * t).sin() * i16::MAX as f64;
            max_error = max_error.max((*sample as f64 - expected).abs());
        }
        assert!(max_error < 4000.0, "max error {}", max_error);

        // Reading the same window again returns the same samples.
        let mut again = vec![0i16; 2000];
        provider.get_int16(&mut again, start, 2000).unwrap();
        assert_eq!(out, again);

        // And continuing sequentially matches a fresh read of that region.
        let mut next = vec![0i16; 500];
        provider.get_int16(&mut next, start + 2000, 500).unwrap();
        let fresh = convert_to_canonical(dummy(
            DummySignal::Sine { frequency },
            AudioFormat::canonical(rate),
            rate as u64 * 3,
        ))
        .unwrap();
        let mut expected = vec![0i16; 500];
        fresh.get_int16(&mut expected, start + 2000, 500).unwrap();
        for (a, b) in next.iter().zip(expected.iter()) {
            assert!((*a as i32 - *b as i32).abs() < 64);
        }
    }
}
