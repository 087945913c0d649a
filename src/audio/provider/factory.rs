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
use std::path::{Path, PathBuf};

use tracing::{debug, info, span, Level};

use super::convert::convert_to_canonical;
use super::disk::DiskCache;
use super::dummy::{self, DummyProvider};
use super::error::{DecoderAttempt, OpenError, ProviderError};
use super::file::FileProvider;
use super::pcm::PcmProvider;
use super::ram::RamCache;
use super::traits::{describe_chain, AudioProvider};
use super::video::{self, VideoAudioProvider};
use crate::config::{self, CacheType};
use crate::video::VideoContext;

const FILE_URI_PREFIX: &str = "file://";

/// A general purpose decoder that can be listed in the `providers` setting.
pub struct DecoderFactory {
    pub name: &'static str,
    pub open: fn(&Path) -> Result<Box<dyn AudioProvider>, ProviderError>,
}

/// Every decoder known by name.
pub const DECODERS: &[DecoderFactory] = &[DecoderFactory {
    name: "symphonia",
    open: open_symphonia,
}];

fn open_symphonia(path: &Path) -> Result<Box<dyn AudioProvider>, ProviderError> {
    Ok(Box::new(FileProvider::open(path)?))
}

/// Opens an audio source by name and returns a canonical provider wrapped in
/// the configured cache tier.
///
/// Names are `dummy-audio:...`, `video-audio:stream|cache`, `file://<path>` or
/// a bare path.
pub fn open_provider(
    name: &str,
    config: &config::Audio,
    video: Option<&VideoContext>,
) -> Result<Box<dyn AudioProvider>, OpenError> {
    let span = span!(Level::INFO, "open audio");
    let _enter = span.enter();

    let raw = open_raw(name, config, video)?;
    let provider = if raw.format().is_canonical() {
        raw
    } else {
        debug!(source = name, format = %raw.format(), "Converting to canonical format.");
        convert_to_canonical(raw).map_err(OpenError::Conversion)?
    };
    let provider = apply_cache(provider, config)?;

    info!(
        source = name,
        chain = describe_chain(provider.as_ref()),
        format = %provider.format(),
        samples = provider.num_samples(),
        "Opened audio."
    );
    Ok(provider)
}

fn open_raw(
    name: &str,
    config: &config::Audio,
    video: Option<&VideoContext>,
) -> Result<Box<dyn AudioProvider>, OpenError> {
    if name.starts_with(dummy::URI_PREFIX) {
        return Ok(Box::new(DummyProvider::from_uri(name)?));
    }
    if name.starts_with(video::URI_PREFIX) {
        return Ok(Box::new(VideoAudioProvider::from_uri(name, video)?));
    }

    let path = PathBuf::from(name.strip_prefix(FILE_URI_PREFIX).unwrap_or(name));
    if !path.is_file() {
        return Err(OpenError::FileNotFound(path));
    }

    let mut attempts = Vec::new();
    match PcmProvider::open(&path) {
        Ok(provider) => return Ok(Box::new(provider)),
        Err(e) => {
            debug!(source = name, err = %e, "PCM fast path declined.");
            attempts.push(DecoderAttempt {
                decoder: "pcm".to_string(),
                message: e.to_string(),
            });
        }
    }

    for decoder in config.providers() {
        let Some(factory) = DECODERS.iter().find(|f| f.name == decoder.as_str()) else {
            attempts.push(DecoderAttempt {
                decoder: decoder.clone(),
                message: "unknown decoder".to_string(),
            });
            continue;
        };
        match (factory.open)(&path) {
            Ok(provider) => return Ok(provider),
            Err(e) => {
                debug!(source = name, decoder = factory.name, err = %e, "Decoder declined.");
                attempts.push(DecoderAttempt {
                    decoder: factory.name.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    Err(OpenError::NoDecoder {
        name: name.to_string(),
        attempts,
    })
}

/// Wraps the provider in the configured cache tier. Providers that must be
/// cached get a RAM tier even when caching is off.
fn apply_cache(
    provider: Box<dyn AudioProvider>,
    config: &config::Audio,
) -> Result<Box<dyn AudioProvider>, OpenError> {
    let mut cache = config.cache();
    if cache == CacheType::None && provider.needs_cache() {
        debug!(
            source = provider.source_name(),
            "Provider requires a cache, using RAM."
        );
        cache = CacheType::Ram;
    }

    Ok(match cache {
        CacheType::None => provider,
        CacheType::Ram => Box::new(RamCache::new(provider).map_err(OpenError::Cache)?),
        CacheType::Disk => Box::new(
            DiskCache::new(provider, config.cache_dir()).map_err(OpenError::Cache)?,
        ),
    })
}
