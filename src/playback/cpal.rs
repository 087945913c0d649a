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
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use tracing::{error, info, span, Level};

use super::{AudioPlayer, PlayerError};
use crate::audio::AudioProvider;

#[cfg(test)]
use super::MockPlayer;

/// Playback state shared with the output callback.
struct Shared {
    playing: AtomicBool,
    position: AtomicU64,
    end: AtomicU64,
    /// f64 bits.
    volume: AtomicU64,
}

/// Plays a canonical provider through a cpal output stream. The stream lives
/// on its own thread; the control thread only touches the atomics.
pub struct CpalPlayer {
    device_name: String,
    shared: Arc<Shared>,
    shutdown: Option<crossbeam_channel::Sender<()>>,
    output_thread: Option<thread::JoinHandle<()>>,
}

impl CpalPlayer {
    /// Opens `device_name`, or the host's default output device, and starts a
    /// stream at the provider's sample rate.
    pub fn new(
        provider: Arc<dyn AudioProvider>,
        device_name: Option<&str>,
    ) -> Result<CpalPlayer, PlayerError> {
        let span = span!(Level::INFO, "open player (cpal)");
        let _enter = span.enter();

        let device = find_device(device_name)?;
        let name = device.name()?;
        let supported = device.default_output_config()?;
        let sample_rate = provider.format().sample_rate;
        let config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: sample_rate as cpal::SampleRate,
            buffer_size: cpal::BufferSize::Default,
        };
        let sample_format = supported.sample_format();

        let shared = Arc::new(Shared {
            playing: AtomicBool::new(false),
            position: AtomicU64::new(0),
            end: AtomicU64::new(0),
            volume: AtomicU64::new(1.0f64.to_bits()),
        });

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), PlayerError>>(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let output_thread = {
            let shared = shared.clone();
            let config = config.clone();
            // The stream is not Send, so it is built and kept on this thread.
            thread::spawn(move || {
                let stream = match start_stream(&device, &config, sample_format, provider, shared)
                {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // Keep the stream alive until the player is dropped.
                let _ = shutdown_rx.recv();
                drop(stream);
            })
        };

        ready_rx.recv().map_err(|_| PlayerError::OutputThread)??;
        info!(
            device = name,
            channels = config.channels,
            sample_rate,
            format = %sample_format,
            "CPAL output stream started."
        );

        Ok(CpalPlayer {
            device_name: name,
            shared,
            shutdown: Some(shutdown_tx),
            output_thread: Some(output_thread),
        })
    }
}

impl Drop for CpalPlayer {
    fn drop(&mut self) {
        self.shared.playing.store(false, Ordering::Relaxed);
        // Dropping the sender wakes the output thread.
        self.shutdown.take();
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

fn find_device(name: Option<&str>) -> Result<cpal::Device, PlayerError> {
    let host = cpal::default_host();
    match name {
        Some(name) => {
            for device in host.output_devices()? {
                if device.name()?.trim() == name {
                    return Ok(device);
                }
            }
            Err(PlayerError::DeviceNotFound(name.to_string()))
        }
        None => host
            .default_output_device()
            .ok_or(PlayerError::NoDefaultDevice),
    }
}

fn start_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    provider: Arc<dyn AudioProvider>,
    shared: Arc<Shared>,
) -> Result<cpal::Stream, PlayerError> {
    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, provider, shared)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, provider, shared)?,
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, provider, shared)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, provider, shared)?,
        other => return Err(PlayerError::UnsupportedSampleFormat(other.to_string())),
    };
    stream.play()?;
    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    provider: Arc<dyn AudioProvider>,
    shared: Arc<Shared>,
) -> Result<cpal::Stream, PlayerError>
where
    T: SizedSample + FromSample<i16>,
{
    let channels = config.channels as usize;
    let mut callback = create_callback::<T>(provider, shared, channels);
    Ok(device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| callback(data),
        |err| error!("CPAL output stream error: {}", err),
        None,
    )?)
}

/// Output callback: reads mono samples at the play head and duplicates them
/// across the device channels. Past the end point it writes silence while
/// the position keeps advancing.
fn create_callback<T>(
    provider: Arc<dyn AudioProvider>,
    shared: Arc<Shared>,
    channels: usize,
) -> impl FnMut(&mut [T]) + Send + 'static
where
    T: SizedSample + FromSample<i16>,
{
    let mut scratch: Vec<i16> = Vec::new();
    move |data: &mut [T]| {
        if !shared.playing.load(Ordering::Acquire) {
            data.fill(T::EQUILIBRIUM);
            return;
        }

        let frames = data.len() / channels.max(1);
        let position = shared.position.load(Ordering::Acquire);
        let end = shared.end.load(Ordering::Acquire);
        let audible = end.saturating_sub(position).min(frames as u64) as usize;
        let volume = f64::from_bits(shared.volume.load(Ordering::Relaxed));

        scratch.clear();
        scratch.resize(frames, 0);
        provider.get_audio_with_volume(&mut scratch[..audible], position, audible, volume);

        for (frame, sample) in data.chunks_mut(channels.max(1)).zip(&scratch) {
            frame.fill(T::from_sample(*sample));
        }

        // A concurrent resync wins over our advance.
        let _ = shared.position.compare_exchange(
            position,
            position + frames as u64,
            Ordering::AcqRel,
            Ordering::Relaxed,
        );
    }
}

impl AudioPlayer for CpalPlayer {
    fn play(&mut self, start: u64, count: u64) {
        info!(device = self.device_name, start, count, "Playing.");
        self.shared.playing.store(false, Ordering::Release);
        self.shared.position.store(start, Ordering::Release);
        self.shared.end.store(start + count, Ordering::Release);
        self.shared.playing.store(true, Ordering::Release);
    }

    fn stop(&mut self) {
        self.shared.playing.store(false, Ordering::Release);
    }

    fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Acquire)
    }

    fn current_position(&self) -> u64 {
        self.shared.position.load(Ordering::Acquire)
    }

    fn end_position(&self) -> u64 {
        self.shared.end.load(Ordering::Acquire)
    }

    fn set_end_position(&mut self, end: u64) {
        self.shared.end.store(end, Ordering::Release);
    }

    fn set_current_position(&mut self, position: u64) {
        self.shared.position.store(position, Ordering::Release);
    }

    fn set_volume(&mut self, volume: f64) {
        self.shared.volume.store(volume.to_bits(), Ordering::Relaxed);
    }

    fn name(&self) -> &str {
        "cpal"
    }

    #[cfg(test)]
    fn to_mock(&self) -> Option<MockPlayer> {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::audio::provider::{DummyProvider, DummySignal};
    use crate::audio::AudioFormat;
    use cpal::Sample;

    fn shared(position: u64, end: u64) -> Arc<Shared> {
        Arc::new(Shared {
            playing: AtomicBool::new(true),
            position: AtomicU64::new(position),
            end: AtomicU64::new(end),
            volume: AtomicU64::new(1.0f64.to_bits()),
        })
    }

    fn sine() -> Arc<dyn AudioProvider> {
        Arc::new(DummyProvider::new(
            DummySignal::Sine { frequency: 441.0 },
            AudioFormat::canonical(44100),
            44100,
        ))
    }

    #[test]
    fn callback_duplicates_channels_and_advances() {
        let shared = shared(0, 44100);
        let mut callback = create_callback::<i16>(sine(), shared.clone(), 2);
        let mut data = [0i16; 200];
        callback(&mut data);

        assert_eq!(shared.position.load(Ordering::Relaxed), 100);
        for frame in data.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
        // Sample 25 is the sine's crest.
        assert_eq!(data[50], i16::MAX);
    }

    #[test]
    fn callback_drains_silence_past_end() {
        let shared = shared(1000, 1010);
        let mut callback = create_callback::<f32>(sine(), shared.clone(), 1);
        let mut data = [1.0f32; 64];
        callback(&mut data);

        assert!(data[..10].iter().any(|s| *s != 0.0));
        assert!(data[10..].iter().all(|s| *s == 0.0));
        assert_eq!(shared.position.load(Ordering::Relaxed), 1064);
    }

    #[test]
    fn stopped_callback_is_silent() {
        let shared = shared(0, 44100);
        shared.playing.store(false, Ordering::Relaxed);
        let mut callback = create_callback::<u16>(sine(), shared.clone(), 1);
        let mut data = [7u16; 16];
        callback(&mut data);
        assert!(data.iter().all(|s| *s == u16::EQUILIBRIUM));
        assert_eq!(shared.position.load(Ordering::Relaxed), 0);
    }
}
