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
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, span, warn, Level};

use crate::audio::{open_provider, AudioFormat, AudioProvider, OpenError, SampleRange};
use crate::config::{ConfigError, Settings};
use crate::playback::{
    create_player, AudioPlayer, ClockEvent, PlaybackClock, PlaybackState, PlayerError,
};
use crate::video::{VideoContext, VideoSync};

/// Notifications broadcast to every subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEvent {
    /// Audio was opened from the named source.
    AudioOpened(String),
    AudioClosed,
    PlaybackPosition(u64),
    PlaybackStopped,
    SelectionChanged(SampleRange),
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("No audio is open")]
    NotOpen,

    #[error("Could not open audio: {0}")]
    Open(#[from] OpenError),

    #[error("Could not open the player: {0}")]
    Player(#[from] PlayerError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Owns the open provider and player, the selection and the playback clock,
/// and broadcasts what happens to subscribers.
pub struct Controller {
    settings: Settings,
    video: Option<VideoContext>,
    source_name: Option<String>,
    provider: Option<Arc<dyn AudioProvider>>,
    player: Option<Box<dyn AudioPlayer>>,
    clock: PlaybackClock,
    sync: VideoSync,
    selection: SampleRange,
    subscribers: Vec<Sender<AudioEvent>>,
}

impl Controller {
    pub fn new(settings: Settings) -> Result<Controller, ControllerError> {
        Ok(Controller {
            clock: PlaybackClock::new(&settings.playback)?,
            sync: VideoSync::new(&settings.sync)?,
            settings,
            video: None,
            source_name: None,
            provider: None,
            player: None,
            selection: SampleRange::default(),
            subscribers: Vec::new(),
        })
    }

    /// Returns a receiver for every event broadcast from now on.
    pub fn subscribe(&mut self) -> Receiver<AudioEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn broadcast(&mut self, event: AudioEvent) {
        // Subscribers that hung up are dropped.
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn broadcast_clock(&mut self, event: ClockEvent) {
        self.broadcast(match event {
            ClockEvent::Position(position) => AudioEvent::PlaybackPosition(position),
            ClockEvent::Stopped => AudioEvent::PlaybackStopped,
        });
    }

    /// Attaches or detaches the project's video.
    pub fn set_video(&mut self, video: Option<VideoContext>) {
        self.sync.reset();
        self.video = video;
    }

    pub fn video(&self) -> Option<&VideoContext> {
        self.video.as_ref()
    }

    /// Opens `name`, replacing any open audio. On failure nothing stays open.
    pub fn open_audio(&mut self, name: &str) -> Result<(), ControllerError> {
        self.close_audio();

        let span = span!(Level::INFO, "open audio (controller)");
        let _enter = span.enter();

        let provider: Arc<dyn AudioProvider> =
            Arc::from(open_provider(name, &self.settings.audio, self.video.as_ref())?);
        let mut player = create_player(&self.settings.audio, provider.clone())?;
        player.set_volume(self.settings.playback.volume());

        info!(
            source = name,
            player = player.name(),
            samples = provider.num_samples(),
            "Audio open."
        );
        self.provider = Some(provider);
        self.player = Some(player);
        self.source_name = Some(name.to_string());
        self.broadcast(AudioEvent::AudioOpened(name.to_string()));
        Ok(())
    }

    /// Stops playback and releases the provider and player.
    pub fn close_audio(&mut self) {
        if !self.is_audio_open() {
            return;
        }
        self.stop();
        self.player = None;
        self.provider = None;
        if let Some(name) = self.source_name.take() {
            info!(source = name, "Audio closed.");
        }
        self.broadcast(AudioEvent::AudioClosed);
    }

    pub fn is_audio_open(&self) -> bool {
        self.provider.is_some()
    }

    pub fn provider(&self) -> Option<&Arc<dyn AudioProvider>> {
        self.provider.as_ref()
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    fn format(&self) -> Result<AudioFormat, ControllerError> {
        Ok(self
            .provider
            .as_ref()
            .ok_or(ControllerError::NotOpen)?
            .format())
    }

    pub fn play_range(&mut self, range: SampleRange) -> Result<(), ControllerError> {
        let player = self.player.as_mut().ok_or(ControllerError::NotOpen)?;
        debug!(range = %range, "Play range.");
        let events = self.clock.play_range(player.as_mut(), range, Instant::now());
        self.sync.reset();
        events.into_iter().for_each(|e| self.broadcast_clock(e));
        Ok(())
    }

    pub fn play_to_end(&mut self, start: u64) -> Result<(), ControllerError> {
        let num_samples = self
            .provider
            .as_ref()
            .ok_or(ControllerError::NotOpen)?
            .num_samples();
        let player = self.player.as_mut().ok_or(ControllerError::NotOpen)?;
        debug!(start, "Play to end.");
        let events = self
            .clock
            .play_to_end(player.as_mut(), start, num_samples, Instant::now());
        self.sync.reset();
        events.into_iter().for_each(|e| self.broadcast_clock(e));
        Ok(())
    }

    pub fn play_selection(&mut self) -> Result<(), ControllerError> {
        self.play_range(self.selection)
    }

    /// Stops playback. Does nothing when no audio is open or nothing plays.
    pub fn stop(&mut self) {
        let Some(player) = self.player.as_mut() else {
            return;
        };
        if let Some(event) = self.clock.stop(player.as_mut()) {
            self.broadcast_clock(event);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.clock.state()
    }

    /// The play head, or None when not playing.
    pub fn playback_position(&self) -> Option<u64> {
        match &self.player {
            Some(player) if self.clock.is_playing() => Some(player.current_position()),
            _ => None,
        }
    }

    pub fn change_playback_end(&mut self, end: u64) {
        if let Some(player) = self.player.as_mut() {
            self.clock.change_playback_end(player.as_mut(), end);
        }
    }

    pub fn resync_playback_position(&mut self, position: u64) -> bool {
        match self.player.as_mut() {
            Some(player) => self.clock.resync_playback_position(player.as_mut(), position),
            None => false,
        }
    }

    pub fn selection(&self) -> SampleRange {
        self.selection
    }

    pub fn set_selection(&mut self, selection: SampleRange) {
        if selection == self.selection {
            return;
        }
        self.selection = selection;
        self.broadcast(AudioEvent::SelectionChanged(selection));
    }

    pub fn samples_from_ms(&self, ms: u64) -> Result<u64, ControllerError> {
        Ok(self.format()?.samples_from_ms(ms))
    }

    pub fn ms_from_samples(&self, samples: u64) -> Result<u64, ControllerError> {
        Ok(self.format()?.ms_from_samples(samples))
    }

    pub fn timer_due(&self, now: Instant) -> bool {
        self.clock.timer_due(now)
    }

    pub fn next_tick(&self) -> Option<Instant> {
        self.clock.next_tick()
    }

    /// Poll timer callback.
    pub fn on_timer(&mut self) {
        let Some(player) = self.player.as_mut() else {
            return;
        };
        if let Some(event) = self.clock.tick(player.as_mut(), Instant::now()) {
            self.broadcast_clock(event);
        }
    }

    /// Called by the video playback loop when it shows `frame`. Resyncs audio
    /// when it has drifted or the video jumped, and returns the new position.
    pub fn video_frame_advanced(&mut self, frame: u64) -> Option<u64> {
        let video = self.video.as_mut()?;
        video.set_current_frame(frame);
        let position = self.playback_position()?;
        let sample_rate = self.provider.as_ref()?.format().sample_rate;
        let video = self.video.as_ref()?;
        let target = self
            .sync
            .frame_advanced(video, frame, position, sample_rate)?;
        self.resync_playback_position(target).then_some(target)
    }

    /// System suspend: stops playback and closes the output device. Decoded
    /// audio stays cached.
    pub fn suspend(&mut self) {
        if self.player.is_none() {
            return;
        }
        self.stop();
        self.player = None;
        info!("Audio output suspended.");
    }

    /// Reopens the output device after [Controller::suspend].
    pub fn resume(&mut self) -> Result<(), ControllerError> {
        let Some(provider) = self.provider.as_ref() else {
            return Ok(());
        };
        if self.player.is_some() {
            return Ok(());
        }
        let mut player = match create_player(&self.settings.audio, provider.clone()) {
            Ok(player) => player,
            Err(e) => {
                warn!(err = %e, "Unable to reopen audio output.");
                return Err(e.into());
            }
        };
        player.set_volume(self.settings.playback.volume());
        self.player = Some(player);
        info!("Audio output resumed.");
        Ok(())
    }

    pub fn set_volume(&mut self, volume: f64) {
        if let Some(player) = self.player.as_mut() {
            player.set_volume(volume);
        }
    }

    #[cfg(test)]
    fn mock_player(&self) -> Option<crate::playback::MockPlayer> {
        self.player.as_ref().and_then(|player| player.to_mock())
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.close_audio();
    }
}
