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
use std::sync::{
    atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::AudioPlayer;
use crate::audio::AudioProvider;

/// State shared between clones of a mock player.
struct State {
    playing: AtomicBool,
    position: AtomicU64,
    end: AtomicU64,
    peak: AtomicI32,
    volume: Mutex<f64>,
}

/// A player without a device. Time only moves when [MockPlayer::advance] is
/// called, which pulls the samples through the provider like a device
/// callback would.
#[derive(Clone)]
pub struct MockPlayer {
    provider: Arc<dyn AudioProvider>,
    state: Arc<State>,
}

impl MockPlayer {
    pub fn new(provider: Arc<dyn AudioProvider>) -> MockPlayer {
        MockPlayer {
            provider,
            state: Arc::new(State {
                playing: AtomicBool::new(false),
                position: AtomicU64::new(0),
                end: AtomicU64::new(0),
                peak: AtomicI32::new(0),
                volume: Mutex::new(1.0),
            }),
        }
    }

    /// Plays `samples` more samples. Past the end point the player outputs
    /// silence but keeps counting, like a draining device.
    pub fn advance(&self, samples: u64) {
        if !self.state.playing.load(Ordering::Relaxed) {
            return;
        }
        let position = self.state.position.load(Ordering::Relaxed);
        let end = self.state.end.load(Ordering::Relaxed);
        let audible = end.saturating_sub(position).min(samples) as usize;

        let mut buf = vec![0i16; audible];
        self.provider
            .get_audio_with_volume(&mut buf, position, audible, *self.state.volume.lock());
        let peak = buf.iter().map(|s| (*s as i32).abs()).max().unwrap_or(0);
        self.state.peak.store(peak, Ordering::Relaxed);
        self.state.position.store(position + samples, Ordering::Relaxed);
    }

    /// Ends playback as if the device had failed or run out.
    pub fn finish(&self) {
        debug!("Mock player finished.");
        self.state.playing.store(false, Ordering::Relaxed);
    }

    /// Largest absolute sample produced by the last [MockPlayer::advance].
    pub fn last_peak(&self) -> i32 {
        self.state.peak.load(Ordering::Relaxed)
    }

    pub fn volume(&self) -> f64 {
        *self.state.volume.lock()
    }
}

impl AudioPlayer for MockPlayer {
    fn play(&mut self, start: u64, count: u64) {
        info!(start, count, "Playing (mock).");
        self.state.position.store(start, Ordering::Relaxed);
        self.state.end.store(start + count, Ordering::Relaxed);
        self.state.playing.store(true, Ordering::Relaxed);
    }

    fn stop(&mut self) {
        self.state.playing.store(false, Ordering::Relaxed);
    }

    fn is_playing(&self) -> bool {
        self.state.playing.load(Ordering::Relaxed)
    }

    fn current_position(&self) -> u64 {
        self.state.position.load(Ordering::Relaxed)
    }

    fn end_position(&self) -> u64 {
        self.state.end.load(Ordering::Relaxed)
    }

    fn set_end_position(&mut self, end: u64) {
        self.state.end.store(end, Ordering::Relaxed);
    }

    fn set_current_position(&mut self, position: u64) {
        self.state.position.store(position, Ordering::Relaxed);
    }

    fn set_volume(&mut self, volume: f64) {
        *self.state.volume.lock() = volume;
    }

    fn name(&self) -> &str {
        "mock"
    }

    #[cfg(test)]
    fn to_mock(&self) -> Option<MockPlayer> {
        Some(self.clone())
    }
}
