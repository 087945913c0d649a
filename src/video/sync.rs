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
use std::time::Duration;

use tracing::debug;

use super::VideoContext;
use crate::config::{self, ConfigError};

/// Decides when audio playback must be pulled back to the video clock.
///
/// Small drift is tolerated so playback does not stutter from constant
/// corrections. A seek in the video (a frame jump larger than
/// `max_frame_jump`) or drift beyond `max_drift` forces a resync, and every
/// `check_interval` frames a periodic check resyncs once drift exceeds one
/// second of audio.
pub struct VideoSync {
    max_frame_jump: u64,
    check_interval: u64,
    max_drift: Duration,
    last_frame: Option<u64>,
    frames_seen: u64,
}

impl VideoSync {
    pub fn new(config: &config::Resync) -> Result<VideoSync, ConfigError> {
        Ok(VideoSync {
            max_frame_jump: config.max_frame_jump(),
            check_interval: config.check_interval(),
            max_drift: config.max_drift()?,
            last_frame: None,
            frames_seen: 0,
        })
    }

    /// Forgets the previous frame, e.g. when playback restarts.
    pub fn reset(&mut self) {
        self.last_frame = None;
        self.frames_seen = 0;
    }

    /// Called when the video shows `frame` while audio is at
    /// `audio_position`. Returns the sample to resync audio to, if any.
    pub fn frame_advanced(
        &mut self,
        video: &VideoContext,
        frame: u64,
        audio_position: u64,
        sample_rate: u32,
    ) -> Option<u64> {
        let nominal = video.nominal_sample(frame, sample_rate);
        let drift = audio_position.abs_diff(nominal);
        let jump = self.last_frame.map(|last| last.abs_diff(frame));
        self.last_frame = Some(frame);
        self.frames_seen += 1;

        let max_drift_samples = sample_rate as u64 * self.max_drift.as_millis() as u64 / 1000;
        let jumped = jump.is_some_and(|jump| jump > self.max_frame_jump);
        let periodic =
            self.frames_seen % self.check_interval == 0 && drift > sample_rate as u64;

        if jumped || drift > max_drift_samples || periodic {
            debug!(
                frame,
                audio_position,
                nominal,
                drift,
                jumped,
                periodic,
                "Resyncing audio to video."
            );
            return Some(nominal);
        }
        None
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, path::PathBuf};

    use super::*;
    use crate::config::Settings;
    use crate::video::FrameRate;

    fn video() -> VideoContext {
        VideoContext::new(PathBuf::from("movie.mkv"), FrameRate::new(25, 1), 10000)
    }

    fn sync(yaml: &str) -> Result<VideoSync, Box<dyn Error>> {
        Ok(VideoSync::new(&Settings::from_yaml_str(yaml)?.sync)?)
    }

    #[test]
    fn seek_forces_resync() -> Result<(), Box<dyn Error>> {
        let mut sync = sync("{}")?;
        let video = video();
        // 25 fps at 44.1 kHz is 1764 samples per frame.
        assert_eq!(sync.frame_advanced(&video, 10, 17640, 44100), None);
        assert_eq!(
            sync.frame_advanced(&video, 200, 17640 + 1764, 44100),
            Some(200 * 1764)
        );
        Ok(())
    }

    #[test]
    fn small_steps_and_drift_are_tolerated() -> Result<(), Box<dyn Error>> {
        let mut sync = sync("{}")?;
        let video = video();
        // Half a second behind, advancing two frames at a time.
        for frame in (0..7).map(|i| 20 + i * 2) {
            let position = frame * 1764 - 22050;
            assert_eq!(sync.frame_advanced(&video, frame, position, 44100), None);
        }
        Ok(())
    }

    #[test]
    fn large_drift_forces_resync() -> Result<(), Box<dyn Error>> {
        let mut sync = sync("{}")?;
        let video = video();
        assert_eq!(sync.frame_advanced(&video, 100, 176400, 44100), None);
        assert_eq!(
            sync.frame_advanced(&video, 101, 101 * 1764 + 44101, 44100),
            Some(101 * 1764)
        );
        Ok(())
    }

    #[test]
    fn periodic_check_uses_one_second() -> Result<(), Box<dyn Error>> {
        // A generous per-frame bound leaves only the periodic check.
        let mut sync = sync("sync:\n  max_drift: 10s\n  check_interval: 4\n")?;
        let video = video();
        let drifted = |frame: u64| frame * 1764 + 50000;
        for frame in 1..4 {
            assert_eq!(sync.frame_advanced(&video, frame, drifted(frame), 44100), None);
        }
        assert_eq!(
            sync.frame_advanced(&video, 4, drifted(4), 44100),
            Some(4 * 1764)
        );
        Ok(())
    }

    #[test]
    fn reset_forgets_last_frame() -> Result<(), Box<dyn Error>> {
        let mut sync = sync("{}")?;
        let video = video();
        assert_eq!(sync.frame_advanced(&video, 10, 17640, 44100), None);
        sync.reset();
        assert_eq!(sync.frame_advanced(&video, 500, 500 * 1764, 44100), None);
        Ok(())
    }
}
