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
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::Deserialize;

const DEFAULT_PLAYER: &str = "cpal";

/// Cache tier wrapped around an opened provider. Parsed case-insensitively,
/// both from settings files and the command line.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(try_from = "String")]
pub enum CacheType {
    /// Read straight from the decoder.
    None,
    /// Decode everything into memory on open.
    #[default]
    Ram,
    /// Decode everything into a temporary file on open.
    Disk,
}

impl FromStr for CacheType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(CacheType::None),
            "ram" => Ok(CacheType::Ram),
            "disk" => Ok(CacheType::Disk),
            _ => Err(format!("unknown cache type {}", s)),
        }
    }
}

impl TryFrom<String> for CacheType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheType::None => write!(f, "none"),
            CacheType::Ram => write!(f, "ram"),
            CacheType::Disk => write!(f, "disk"),
        }
    }
}

fn default_providers() -> Vec<String> {
    vec!["symphonia".to_string()]
}

/// A YAML representation of the audio source configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Audio {
    /// Cache tier (default: ram).
    cache: Option<CacheType>,

    /// Directory for the disk tier (default: the system temp dir).
    cache_dir: Option<PathBuf>,

    /// Decoders to try, in priority order, after the PCM fast path.
    #[serde(default = "default_providers")]
    providers: Vec<String>,

    /// Player implementation (default: cpal).
    player: Option<String>,

    /// Output device name (default: the host's default device).
    device: Option<String>,
}

impl Default for Audio {
    fn default() -> Self {
        Audio {
            cache: None,
            cache_dir: None,
            providers: default_providers(),
            player: None,
            device: None,
        }
    }
}

impl Audio {
    pub fn with_cache(mut self, cache: CacheType) -> Audio {
        self.cache = Some(cache);
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: &Path) -> Audio {
        self.cache_dir = Some(cache_dir.to_path_buf());
        self
    }

    pub fn with_providers(mut self, providers: Vec<String>) -> Audio {
        self.providers = providers;
        self
    }

    pub fn with_player(mut self, player: &str) -> Audio {
        self.player = Some(player.to_string());
        self
    }

    /// Returns the cache tier (default: ram).
    pub fn cache(&self) -> CacheType {
        self.cache.unwrap_or_default()
    }

    /// Returns the disk tier directory, if configured.
    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    /// Returns the decoder priority list.
    pub fn providers(&self) -> &[String] {
        &self.providers
    }

    /// Returns the player implementation (default: cpal).
    pub fn player(&self) -> &str {
        self.player.as_deref().unwrap_or(DEFAULT_PLAYER)
    }

    /// Returns the output device name, if configured.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cache_type_from_str() {
        assert_eq!(CacheType::from_str("RAM"), Ok(CacheType::Ram));
        assert_eq!(CacheType::from_str("disk"), Ok(CacheType::Disk));
        assert_eq!(CacheType::from_str("none"), Ok(CacheType::None));
        assert!(CacheType::from_str("tape").is_err());
        assert_eq!(CacheType::Disk.to_string(), "disk");
    }

    #[test]
    fn builders_override_defaults() {
        let audio = Audio::default()
            .with_cache(CacheType::Disk)
            .with_cache_dir(Path::new("/tmp"))
            .with_player("mock");
        assert_eq!(audio.cache(), CacheType::Disk);
        assert_eq!(audio.cache_dir(), Some(Path::new("/tmp")));
        assert_eq!(audio.player(), "mock");
        assert_eq!(audio.device(), None);
    }
}
