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

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);
const DEFAULT_END_SLACK: u64 = 200;
const DEFAULT_VOLUME: f64 = 1.0;

/// A YAML representation of the playback clock configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Playback {
    /// How often the position is polled while playing (default: 20ms).
    poll_interval: Option<String>,

    /// Samples played past the end of a range before stopping, so the device
    /// can drain (default: 200).
    end_slack: Option<u64>,

    /// Initial output volume (default: 1.0).
    volume: Option<f64>,
}

impl Playback {
    pub fn with_end_slack(mut self, end_slack: u64) -> Playback {
        self.end_slack = Some(end_slack);
        self
    }

    /// Returns the poll interval (default: 20ms).
    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        parse_duration(
            "poll_interval",
            self.poll_interval.as_deref(),
            DEFAULT_POLL_INTERVAL,
        )
    }

    pub fn end_slack(&self) -> u64 {
        self.end_slack.unwrap_or(DEFAULT_END_SLACK)
    }

    pub fn volume(&self) -> f64 {
        self.volume.unwrap_or(DEFAULT_VOLUME)
    }
}
