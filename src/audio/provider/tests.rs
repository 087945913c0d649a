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
use std::error::Error;

use super::traits::scale_with_saturation;
use super::*;
use crate::audio::AudioFormat;
use crate::config::{self, CacheType};
use crate::testutil::write_wav;

/// A canonical provider whose sample `i` is `i` (wrapping), or that fails
/// every read.
struct Ramp {
    len: u64,
    fail: bool,
}

impl AudioProvider for Ramp {
    fn fill_buffer(&self, buf: &mut [u8], start: u64, count: usize) -> Result<(), ProviderError> {
        if self.fail {
            return Err(ProviderError::SampleConversionFailed("ramp".to_string()));
        }
        for (i, out) in buf.chunks_exact_mut(2).take(count).enumerate() {
            out.copy_from_slice(&((start + i as u64) as i16).to_le_bytes());
        }
        Ok(())
    }

    fn format(&self) -> AudioFormat {
        AudioFormat::canonical(44100)
    }

    fn num_samples(&self) -> u64 {
        self.len
    }

    fn source_name(&self) -> &str {
        "ramp"
    }

    fn name(&self) -> &'static str {
        "ramp"
    }
}

fn no_cache() -> config::Audio {
    config::Audio::default().with_cache(CacheType::None)
}

#[test]
fn get_audio_pads_tail_with_silence() -> Result<(), Box<dyn Error>> {
    let ramp = Ramp {
        len: 100,
        fail: false,
    };
    let mut out = [-1i16; 10];
    ramp.get_int16(&mut out, 95, 10)?;
    assert_eq!(out, [95, 96, 97, 98, 99, 0, 0, 0, 0, 0]);

    ramp.get_int16(&mut out, 1000, 10)?;
    assert_eq!(out, [0; 10]);
    Ok(())
}

#[test]
fn get_audio_rejects_short_buffer() {
    let ramp = Ramp {
        len: 100,
        fail: false,
    };
    let mut buf = [0u8; 3];
    assert!(matches!(
        ramp.get_audio(&mut buf, 0, 2),
        Err(ProviderError::BufferSize {
            expected: 4,
            actual: 3
        })
    ));
}

#[test]
fn unit_volume_matches_raw_read() -> Result<(), Box<dyn Error>> {
    let provider = DummyProvider::from_uri("dummy-audio:noise?ln=20000")?;
    let mut raw = vec![0u8; 2 * 10000];
    provider.get_audio(&mut raw, 5000, 10000)?;

    let mut scaled = vec![0i16; 10000];
    provider.get_audio_with_volume(&mut scaled, 5000, 10000, 1.0);
    let scaled_bytes: Vec<u8> = scaled.iter().flat_map(|s| s.to_le_bytes()).collect();
    assert_eq!(raw, scaled_bytes);
    Ok(())
}

#[test]
fn volume_saturates() {
    assert_eq!(scale_with_saturation(32000, 2.0), 32767);
    assert_eq!(scale_with_saturation(-32000, 2.0), -32768);
    assert_eq!(scale_with_saturation(1000, 0.5), 500);
    assert_eq!(scale_with_saturation(i16::MIN, 1.0), i16::MIN);

    let ramp = Ramp {
        len: 40000,
        fail: false,
    };
    let mut out = [0i16; 2];
    ramp.get_audio_with_volume(&mut out, 32000, 2, 2.0);
    assert_eq!(out, [32767, 32767]);
}

#[test]
fn failed_read_becomes_counted_silence() {
    let broken = Ramp {
        len: 100,
        fail: true,
    };
    let before = silenced_read_count();
    let mut out = [5i16; 50];
    broken.get_audio_with_volume(&mut out, 10, 50, 1.0);
    assert_eq!(out, [0; 50]);
    // Other tests may fail reads concurrently, so only a lower bound holds.
    assert!(silenced_read_count() > before);
}

#[test]
fn silence_dummy_is_all_zero() -> Result<(), Box<dyn Error>> {
    let provider = open_provider(
        "dummy-audio:silence?sr=44100&bd=16&ch=1&ln=44100",
        &config::Audio::default(),
        None,
    )?;
    assert_eq!(provider.num_samples(), 44100);
    let mut buf = vec![0xAAu8; 2 * 44100];
    provider.get_audio(&mut buf, 0, 44100)?;
    assert!(buf.iter().all(|b| *b == 0));
    Ok(())
}

#[test]
fn canonical_wav_is_not_wrapped() -> Result<(), Box<dyn Error>> {
    let tempdir = tempfile::tempdir()?;
    let path = tempdir.path().join("mono.wav");
    write_wav(path.clone(), vec![vec![0; 4410]], 44100)?;

    let provider = open_provider(path.to_str().ok_or("path")?, &no_cache(), None)?;
    assert_eq!(provider.name(), "pcm");
    assert!(provider.inner().is_none());
    assert_eq!(provider.format(), AudioFormat::canonical(44100));
    Ok(())
}

#[test]
fn stereo_wav_is_converted() -> Result<(), Box<dyn Error>> {
    let tempdir = tempfile::tempdir()?;
    let path = tempdir.path().join("stereo.wav");
    write_wav(path.clone(), vec![vec![100; 4410], vec![300; 4410]], 44100)?;

    let uri = format!("file://{}", path.display());
    let provider = open_provider(&uri, &no_cache(), None)?;
    assert_eq!(describe_chain(provider.as_ref()), "downmix <- pcm");
    assert!(provider.format().is_canonical());

    let mut out = [0i16; 4];
    provider.get_int16(&mut out, 0, 4)?;
    assert_eq!(out, [200; 4]);
    Ok(())
}

#[test]
fn cache_tiers_wrap_the_chain() -> Result<(), Box<dyn Error>> {
    let tempdir = tempfile::tempdir()?;
    let name = "dummy-audio:noise?ch=2&ln=5000";

    let ram = open_provider(name, &config::Audio::default(), None)?;
    assert_eq!(describe_chain(ram.as_ref()), "ram-cache <- downmix <- dummy");

    let disk_config = config::Audio::default()
        .with_cache(CacheType::Disk)
        .with_cache_dir(tempdir.path());
    let disk = open_provider(name, &disk_config, None)?;
    assert_eq!(describe_chain(disk.as_ref()), "disk-cache <- downmix <- dummy");
    assert_eq!(std::fs::read_dir(tempdir.path())?.count(), 1);

    // Both tiers hold the same samples as the uncached chain.
    let direct = open_provider(name, &no_cache(), None)?;
    let mut expected = [0i16; 1000];
    direct.get_int16(&mut expected, 2000, 1000)?;
    for cached in [&ram, &disk] {
        let mut out = [0i16; 1000];
        cached.get_int16(&mut out, 2000, 1000)?;
        assert_eq!(out, expected);
        assert_eq!(cached.num_samples(), 5000);
    }

    drop(disk);
    assert_eq!(std::fs::read_dir(tempdir.path())?.count(), 0);
    Ok(())
}

#[test]
fn disk_tier_failure_is_an_open_failure() {
    let config = config::Audio::default()
        .with_cache(CacheType::Disk)
        .with_cache_dir(std::path::Path::new("/definitely/not/a/dir"));
    assert!(matches!(
        open_provider("dummy-audio:silence?ln=10", &config, None),
        Err(OpenError::Cache(_))
    ));
}

#[test]
fn absurd_sample_rate_is_a_conversion_failure() {
    let result = open_provider("dummy-audio:silence?sr=1", &no_cache(), None);
    assert!(matches!(
        result,
        Err(OpenError::Conversion(ProviderError::UnsupportedFormat(_)))
    ));
}

#[test]
fn missing_file_is_reported_before_decoding() {
    let result = open_provider("/no/such/file.wav", &config::Audio::default(), None);
    assert!(matches!(result, Err(OpenError::FileNotFound(_))));

    let result = open_provider("file:///no/such/file.mp3", &config::Audio::default(), None);
    assert!(matches!(result, Err(OpenError::FileNotFound(_))));
}

#[test]
fn undecodable_file_lists_every_decoder() -> Result<(), Box<dyn Error>> {
    let tempdir = tempfile::tempdir()?;
    let path = tempdir.path().join("noise.bin");
    std::fs::write(&path, vec![0x42u8; 4096])?;

    let config = no_cache().with_providers(vec!["symphonia".to_string(), "ffmpeg".to_string()]);
    match open_provider(path.to_str().ok_or("path")?, &config, None) {
        Err(OpenError::NoDecoder { attempts, .. }) => {
            let decoders: Vec<&str> = attempts.iter().map(|a| a.decoder.as_str()).collect();
            assert_eq!(decoders, vec!["pcm", "symphonia", "ffmpeg"]);
            assert_eq!(attempts[2].message, "unknown decoder");
        }
        Err(e) => panic!("unexpected error {}", e),
        Ok(provider) => panic!("decoded garbage as {}", provider.name()),
    }
    Ok(())
}

#[test]
fn video_cache_mode_forces_ram_tier() -> Result<(), Box<dyn Error>> {
    let tempdir = tempfile::tempdir()?;
    let path = tempdir.path().join("movie.wav");
    write_wav(path.clone(), vec![vec![0; 48000]], 48000)?;
    let video = crate::video::VideoContext::new(path, crate::video::FrameRate::new(24, 1), 24);

    let cached = open_provider("video-audio:cache", &no_cache(), Some(&video))?;
    assert_eq!(
        describe_chain(cached.as_ref()),
        "ram-cache <- float-to-int <- video-cache <- symphonia"
    );
    assert!(cached.reliable_seek());

    let streamed = open_provider("video-audio:stream", &no_cache(), Some(&video))?;
    assert_eq!(streamed.name(), "float-to-int");
    assert!(!streamed.reliable_seek());
    Ok(())
}
