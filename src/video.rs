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
};

pub mod sync;

pub use sync::VideoSync;

/// A rational frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    num: u64,
    den: u64,
}

impl FrameRate {
    /// A zero numerator or denominator is treated as 1.
    pub fn new(num: u64, den: u64) -> FrameRate {
        FrameRate {
            num: num.max(1),
            den: den.max(1),
        }
    }

    pub fn fps(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Start time of `frame` in milliseconds, rounded down.
    pub fn ms_for_frame(&self, frame: u64) -> u64 {
        frame * 1000 * self.den / self.num
    }

    /// The frame displayed at `ms`.
    pub fn frame_at_ms(&self, ms: u64) -> u64 {
        ms * self.num / (1000 * self.den)
    }

    /// The audio sample at which `frame` starts.
    pub fn sample_for_frame(&self, frame: u64, sample_rate: u32) -> u64 {
        (frame as u128 * sample_rate as u128 * self.den as u128 / self.num as u128) as u64
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} fps", self.fps())
    }
}

/// The video paired with the open project. Created when a project with video
/// is opened and dropped when it is closed.
#[derive(Debug, Clone)]
pub struct VideoContext {
    path: PathBuf,
    frame_rate: FrameRate,
    frame_count: u64,
    current_frame: u64,
}

impl VideoContext {
    pub fn new(path: PathBuf, frame_rate: FrameRate, frame_count: u64) -> VideoContext {
        VideoContext {
            path,
            frame_rate,
            frame_count,
            current_frame: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    /// Moves to `frame`, clamped to the last frame.
    pub fn set_current_frame(&mut self, frame: u64) {
        self.current_frame = frame.min(self.frame_count.saturating_sub(1));
    }

    /// The audio sample at which `frame` nominally starts.
    pub fn nominal_sample(&self, frame: u64, sample_rate: u32) -> u64 {
        self.frame_rate.sample_for_frame(frame, sample_rate)
    }
}
