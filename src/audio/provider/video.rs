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
use std::{fmt, str::FromStr};

use super::error::{DecoderAttempt, OpenError, ProviderError};
use super::file::FileProvider;
use super::traits::AudioProvider;
use crate::audio::AudioFormat;
use crate::video::VideoContext;

pub const URI_PREFIX: &str = "video-audio:";

/// How the audio track of the video is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoAudioMode {
    /// Decoded on demand. Opens quickly but seeks are approximate, so it
    /// cannot feed the spectrum renderer directly.
    Stream,
    /// Decoded once into a cache tier.
    Cache,
}

impl FromStr for VideoAudioMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stream" => Ok(VideoAudioMode::Stream),
            "cache" => Ok(VideoAudioMode::Cache),
            _ => Err(format!("unknown video audio mode {}", s)),
        }
    }
}

impl fmt::Display for VideoAudioMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoAudioMode::Stream => write!(f, "stream"),
            VideoAudioMode::Cache => write!(f, "cache"),
        }
    }
}

/// The audio track of the video that is currently open.
pub struct VideoAudioProvider {
    file: FileProvider,
    mode: VideoAudioMode,
    source_name: String,
}

impl VideoAudioProvider {
    /// Opens `video-audio:stream` or `video-audio:cache` against the given
    /// video.
    pub fn from_uri(uri: &str, video: Option<&VideoContext>) -> Result<Self, OpenError> {
        let mode = uri
            .strip_prefix(URI_PREFIX)
            .ok_or_else(|| format!("expected prefix {}", URI_PREFIX))
            .and_then(VideoAudioMode::from_str)
            .map_err(|reason| OpenError::InvalidSource {
                name: uri.to_string(),
                reason,
            })?;
        let video = video.ok_or(OpenError::NoVideo)?;
        if !video.path().exists() {
            return Err(OpenError::FileNotFound(video.path().to_path_buf()));
        }

        let file = FileProvider::open(video.path()).map_err(|e| OpenError::NoDecoder {
            name: uri.to_string(),
            attempts: vec![DecoderAttempt {
                decoder: "symphonia".to_string(),
                message: e.to_string(),
            }],
        })?;
        Ok(VideoAudioProvider::new(file, mode, uri))
    }

    pub fn new(file: FileProvider, mode: VideoAudioMode, source_name: &str) -> Self {
        VideoAudioProvider {
            file,
            mode,
            source_name: source_name.to_string(),
        }
    }

    pub fn mode(&self) -> VideoAudioMode {
        self.mode
    }
}

impl AudioProvider for VideoAudioProvider {
    fn fill_buffer(&self, buf: &mut [u8], start: u64, count: usize) -> Result<(), ProviderError> {
        self.file.fill_buffer(buf, start, count)
    }

    fn format(&self) -> AudioFormat {
        self.file.format()
    }

    fn num_samples(&self) -> u64 {
        self.file.num_samples()
    }

    fn source_name(&self) -> &str {
        &self.source_name
    }

    fn name(&self) -> &'static str {
        match self.mode {
            VideoAudioMode::Stream => "video-stream",
            VideoAudioMode::Cache => "video-cache",
        }
    }

    fn inner(&self) -> Option<&dyn AudioProvider> {
        Some(&self.file)
    }

    fn needs_cache(&self) -> bool {
        self.mode == VideoAudioMode::Cache
    }

    fn reliable_seek(&self) -> bool {
        self.mode == VideoAudioMode::Cache
    }
}
