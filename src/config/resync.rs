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

use serde::Deserialize;

use super::error::{parse_duration, ConfigError};

const DEFAULT_MAX_FRAME_JUMP: u64 = 2;
const DEFAULT_CHECK_INTERVAL: u64 = 10;
const DEFAULT_MAX_DRIFT: Duration = Duration::from_secs(1);

/// A YAML representation of the video/audio resync thresholds.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Resync {
    /// Frame deltas larger than this are treated as seeks (default: 2).
    max_frame_jump: Option<u64>,

    /// Every nth frame gets the periodic drift check (default: 10).
    check_interval: Option<u64>,

    /// Drift tolerated before forcing a resync (default: 1s).
    max_drift: Option<String>,
}

impl Resync {
    pub fn max_frame_jump(&self) -> u64 {
        self.max_frame_jump.unwrap_or(DEFAULT_MAX_FRAME_JUMP)
    }

    /// Returns the periodic check interval in frames, at least 1.
    pub fn check_interval(&self) -> u64 {
        self.check_interval.unwrap_or(DEFAULT_CHECK_INTERVAL).max(1)
    }

    pub fn max_drift(&self) -> Result<Duration, ConfigError> {
        parse_duration("max_drift", self.max_drift.as_deref(), DEFAULT_MAX_DRIFT)
    }
}
