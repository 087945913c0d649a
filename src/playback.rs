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
use std::{fmt, sync::Arc};

use tracing::{error, info};

use crate::audio::AudioProvider;
use crate::config;

pub mod clock;
pub mod cpal;
pub mod mock;

pub use clock::{ClockEvent, PlaybackClock, PlaybackState};
pub use mock::MockPlayer;

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("Unknown player {0}")]
    UnknownPlayer(String),

    #[error("No output device found with name {0}")]
    DeviceNotFound(String),

    #[error("No default output device")]
    NoDefaultDevice,

    #[error("Unsupported device sample format {0}")]
    UnsupportedSampleFormat(String),

    #[error("Output thread exited before the stream started")]
    OutputThread,

    #[error("Host unavailable: {0}")]
    HostUnavailable(#[from] ::cpal::HostUnavailable),

    #[error("Device enumeration error: {0}")]
    Devices(#[from] ::cpal::DevicesError),

    #[error("Device name error: {0}")]
    DeviceName(#[from] ::cpal::DeviceNameError),

    #[error("Stream config error: {0}")]
    StreamConfig(#[from] ::cpal::DefaultStreamConfigError),

    #[error("Supported configs error: {0}")]
    SupportedConfigs(#[from] ::cpal::SupportedStreamConfigsError),

    #[error("Stream build error: {0}")]
    BuildStream(#[from] ::cpal::BuildStreamError),

    #[error("Stream play error: {0}")]
    PlayStream(#[from] ::cpal::PlayStreamError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// An output device that plays canonical samples from a provider.
///
/// Positions are in samples of the provider. A player keeps advancing its
/// position past the end point, outputting silence, until it is stopped.
pub trait AudioPlayer: Send {
    /// Starts playing `count` samples from `start`, replacing any current
    /// playback.
    fn play(&mut self, start: u64, count: u64);

    fn stop(&mut self);

    fn is_playing(&self) -> bool;

    fn current_position(&self) -> u64;

    fn end_position(&self) -> u64;

    fn set_end_position(&mut self, end: u64);

    /// Moves the play head without restarting playback.
    fn set_current_position(&mut self, position: u64);

    fn set_volume(&mut self, volume: f64);

    fn name(&self) -> &str;

    #[cfg(test)]
    fn to_mock(&self) -> Option<MockPlayer>;
}

/// Creates the configured player for `provider`.
pub fn create_player(
    config: &config::Audio,
    provider: Arc<dyn AudioProvider>,
) -> Result<Box<dyn AudioPlayer>, PlayerError> {
    let player = config.player();
    if player.starts_with("mock") {
        return Ok(Box::new(MockPlayer::new(provider)));
    }
    match player {
        "cpal" => Ok(Box::new(cpal::CpalPlayer::new(provider, config.device())?)),
        _ => Err(PlayerError::UnknownPlayer(player.to_string())),
    }
}

/// An output device as reported by the audio host.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub host: String,
    pub max_channels: u16,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name, self.max_channels, self.host
        )
    }
}

/// Lists output devices on every available host.
pub fn list_devices() -> Result<Vec<DeviceInfo>, PlayerError> {
    use ::cpal::traits::{DeviceTrait, HostTrait};

    // Suppress noisy output here.
    let _shh_stdout = shh::stdout()?;
    let _shh_stderr = shh::stderr()?;

    let mut devices = Vec::new();
    for host_id in ::cpal::available_hosts() {
        let host_devices = match ::cpal::host_from_id(host_id)?.output_devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let Ok(output_configs) = device.supported_output_configs() else {
                continue;
            };
            let max_channels = output_configs.map(|c| c.channels()).max().unwrap_or(0);
            if max_channels > 0 {
                devices.push(DeviceInfo {
                    name: device.name()?,
                    host: host_id.name().to_string(),
                    max_channels,
                });
            }
        }
    }

    devices.sort_by(|a, b| a.name.cmp(&b.name));
    info!(count = devices.len(), "Listed output devices.");
    Ok(devices)
}
