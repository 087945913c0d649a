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
use std::time::Instant;

use tracing::{info, span, warn, Level};

use super::error::ProviderError;
use super::traits::AudioProvider;
use crate::audio::AudioFormat;

/// Size of one cache block.
pub const CACHE_BLOCK_BYTES: usize = 4 << 20;

/// Decodes the whole source into memory once. Reads are plain copies.
pub struct RamCache {
    source: Box<dyn AudioProvider>,
    format: AudioFormat,
    num_samples: u64,
    frames_per_block: u64,
    blocks: Vec<Vec<u8>>,
}

impl RamCache {
    pub fn new(source: Box<dyn AudioProvider>) -> Result<RamCache, ProviderError> {
        let span = span!(Level::INFO, "ram cache");
        let _enter = span.enter();

        let format = source.format();
        let num_samples = source.num_samples();
        let frame_bytes = format.bytes_per_frame();
        let frames_per_block = (CACHE_BLOCK_BYTES / frame_bytes) as u64;
        let num_blocks = num_samples.div_ceil(frames_per_block) as usize;

        let started = Instant::now();
        let mut blocks = Vec::new();
        blocks
            .try_reserve_exact(num_blocks)
            .map_err(|_| ProviderError::CacheAllocation(num_blocks * CACHE_BLOCK_BYTES))?;

        for index in 0..num_blocks as u64 {
            let start = index * frames_per_block;
            let frames = (num_samples - start).min(frames_per_block) as usize;
            let bytes = frames * frame_bytes;

            let mut block = Vec::new();
            block
                .try_reserve_exact(bytes)
                .map_err(|_| ProviderError::CacheAllocation(bytes))?;
            block.resize(bytes, format.silence_byte());
            if let Err(e) = source.get_audio(&mut block, start, frames) {
                warn!(
                    err = %e,
                    source = source.source_name(),
                    block = index,
                    "Unable to decode block, caching silence."
                );
                block.fill(format.silence_byte());
            }
            blocks.push(block);
        }

        info!(
            source = source.source_name(),
            blocks = num_blocks,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Cached audio in memory."
        );

        Ok(RamCache {
            source,
            format,
            num_samples,
            frames_per_block,
            blocks,
        })
    }

    /// Bytes held by the cache.
    pub fn resident_bytes(&self) -> usize {
        self.blocks.iter().map(|b| b.len()).sum()
    }
}

impl AudioProvider for RamCache {
    fn fill_buffer(&self, buf: &mut [u8], start: u64, count: usize) -> Result<(), ProviderError> {
        let frame_bytes = self.format.bytes_per_frame();
        let mut frame = start;
        let mut written = 0;
        let end = start + count as u64;
        while frame < end {
            let index = (frame / self.frames_per_block) as usize;
            let offset = (frame % self.frames_per_block) as usize * frame_bytes;
            let block = &self.blocks[index];
            let n = (block.len() - offset).min((end - frame) as usize * frame_bytes);
            buf[written..written + n].copy_from_slice(&block[offset..offset + n]);
            written += n;
            frame += (n / frame_bytes) as u64;
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
        self.source.source_name()
    }

    fn name(&self) -> &'static str {
        "ram-cache"
    }

    fn inner(&self) -> Option<&dyn AudioProvider> {
        Some(self.source.as_ref())
    }

    // The cache satisfies whatever the wrapped provider needed.
    fn needs_cache(&self) -> bool {
        false
    }

    fn reliable_seek(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::audio::provider::dummy::{DummyProvider, DummySignal};

    #[test]
    fn matches_source_across_block_boundaries() {
        let source = || {
            Box::new(DummyProvider::new(
                DummySignal::Noise,
                AudioFormat::canonical(44100),
                5_000_000,
            ))
        };
        let cache = RamCache::new(source()).unwrap();
        assert_eq!(cache.num_samples(), 5_000_000);
        assert_eq!(cache.format(), AudioFormat::canonical(44100));
        assert_eq!(cache.resident_bytes(), 10_000_000);
        assert_eq!(cache.name(), "ram-cache");

        let reference = source();
        let boundary = (CACHE_BLOCK_BYTES / 2) as u64;
        for start in [0, boundary - 100, 4_999_900] {
            let mut expected = vec![0u8; 400];
            let mut actual = vec![0u8; 400];
            reference.get_audio(&mut expected, start, 200).unwrap();
            cache.get_audio(&mut actual, start, 200).unwrap();
            assert_eq!(expected, actual, "read at {}", start);
        }
    }

    #[test]
    fn decode_failure_caches_silence() {
        struct Broken;
        impl AudioProvider for Broken {
            fn fill_buffer(&self, _: &mut [u8], _: u64, _: usize) -> Result<(), ProviderError> {
                Err(ProviderError::SampleConversionFailed("broken".to_string()))
            }
            fn format(&self) -> AudioFormat {
                AudioFormat::canonical(44100)
            }
            fn num_samples(&self) -> u64 {
                100
            }
            fn source_name(&self) -> &str {
                "broken"
            }
            fn name(&self) -> &'static str {
                "broken"
            }
            fn needs_cache(&self) -> bool {
                true
            }
        }

        let cache = RamCache::new(Box::new(Broken)).unwrap();
        assert!(!cache.needs_cache());
        let mut out = [7i16; 100];
        cache.get_int16(&mut out, 0, 100).unwrap();
        assert_eq!(out, [0; 100]);
    }
}
