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
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{info, span, warn, Level};

use super::error::ProviderError;
use super::traits::AudioProvider;
use crate::audio::AudioFormat;

/// Frames decoded per write while filling the file.
const FILL_CHUNK_FRAMES: usize = 65536;

/// Decodes the whole source once into a temporary file and serves reads from
/// it. The file is deleted when the cache is dropped.
pub struct DiskCache {
    source: Box<dyn AudioProvider>,
    format: AudioFormat,
    num_samples: u64,
    file: Mutex<NamedTempFile>,
    path: PathBuf,
}

impl DiskCache {
    /// Creates the cache file in `dir`, or the system temp directory.
    pub fn new(source: Box<dyn AudioProvider>, dir: Option<&Path>) -> Result<Self, ProviderError> {
        let span = span!(Level::INFO, "disk cache");
        let _enter = span.enter();

        let dir = dir.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
        let mut file = tempfile::Builder::new()
            .prefix("subaudio-")
            .suffix(".cache")
            .tempfile_in(&dir)
            .map_err(|e| {
                ProviderError::IoError(std::io::Error::new(
                    e.kind(),
                    format!("{}: {}", dir.display(), e),
                ))
            })?;
        let path = file.path().to_path_buf();

        let format = source.format();
        let num_samples = source.num_samples();
        let frame_bytes = format.bytes_per_frame();

        let started = Instant::now();
        let mut chunk = vec![0u8; FILL_CHUNK_FRAMES * frame_bytes];
        let mut frame = 0;
        while frame < num_samples {
            let frames = (num_samples - frame).min(FILL_CHUNK_FRAMES as u64) as usize;
            let bytes = &mut chunk[..frames * frame_bytes];
            if let Err(e) = source.get_audio(bytes, frame, frames) {
                warn!(
                    err = %e,
                    source = source.source_name(),
                    frame,
                    "Unable to decode chunk, caching silence."
                );
                bytes.fill(format.silence_byte());
            }
            file.write_all(bytes)?;
            frame += frames as u64;
        }
        file.flush()?;

        info!(
            source = source.source_name(),
            path = %path.display(),
            bytes = num_samples * frame_bytes as u64,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Cached audio on disk."
        );

        Ok(DiskCache {
            source,
            format,
            num_samples,
            file: Mutex::new(file),
            path,
        })
    }

    /// Location of the cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AudioProvider for DiskCache {
    fn fill_buffer(&self, buf: &mut [u8], start: u64, count: usize) -> Result<(), ProviderError> {
        let frame_bytes = self.format.bytes_per_frame();
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(start * frame_bytes as u64))?;
        file.read_exact(&mut buf[..count * frame_bytes])?;
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
        "disk-cache"
    }

    fn inner(&self) -> Option<&dyn AudioProvider> {
        Some(self.source.as_ref())
    }

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

    fn noise(len: u64) -> Box<dyn AudioProvider> {
        Box::new(DummyProvider::new(
            DummySignal::Noise,
            AudioFormat::canonical(44100),
            len,
        ))
    }

    #[test]
    fn serves_same_samples_and_cleans_up() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let cache = DiskCache::new(noise(200_000), Some(dir.path()))?;
        let path = cache.path().to_path_buf();
        assert!(path.starts_with(dir.path()));
        assert_eq!(std::fs::metadata(&path)?.len(), 400_000);
        assert_eq!(cache.num_samples(), 200_000);

        let reference = noise(200_000);
        for start in [199_000u64, 0, 65_000] {
            let mut expected = vec![0u8; 2000];
            let mut actual = vec![0u8; 2000];
            reference.get_audio(&mut expected, start, 1000)?;
            cache.get_audio(&mut actual, start, 1000)?;
            assert_eq!(expected, actual);
        }

        // Past the end is silence, not an error.
        let mut tail = vec![1u8; 200];
        cache.get_audio(&mut tail, 199_950, 100)?;
        assert!(tail[100..].iter().all(|b| *b == 0));

        drop(cache);
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn missing_directory_fails() {
        let result = DiskCache::new(noise(10), Some(Path::new("/definitely/not/a/dir")));
        assert!(matches!(result, Err(ProviderError::IoError(_))));
    }
}
