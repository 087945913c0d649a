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
use std::path::Path;

use config::{Config, File, FileFormat};
use serde::Deserialize;

mod audio;
mod error;
mod playback;
mod resync;
mod spectrum;

pub use self::audio::{Audio, CacheType};
pub use self::error::ConfigError;
pub use self::playback::Playback;
pub use self::resync::Resync;
pub use self::spectrum::Spectrum;

/// All settings consumed by the audio pipeline. Every section and field is
/// optional.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Settings {
    /// Source opening and cache tiers.
    pub audio: Audio,
    /// Spectrogram derivation and rendering.
    pub spectrum: Spectrum,
    /// Playback clock.
    pub playback: Playback,
    /// Video/audio resync thresholds.
    pub sync: Resync,
}

impl Settings {
    /// Loads settings from a YAML file.
    pub fn load(path: &Path) -> Result<Settings, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Settings>()?)
    }

    /// Parses settings from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Settings, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<Settings>()?)
    }
}
