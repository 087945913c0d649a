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
use std::time::{Duration, Instant};

use tracing::debug;

use super::AudioPlayer;
use crate::audio::SampleRange;
use crate::config::{self, ConfigError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    NotPlaying,
    PlayingRange,
    PlayingToEnd,
}

/// Notifications produced by clock transitions and poll ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    Position(u64),
    Stopped,
}

/// The play/stop state machine and its poll timer.
///
/// The clock never sleeps: the host loop asks [PlaybackClock::timer_due] and
/// calls [PlaybackClock::tick] when the poll interval has elapsed. Stopping
/// cancels the timer before anything else, so no position is reported after
/// a stop.
pub struct PlaybackClock {
    state: PlaybackState,
    poll_interval: Duration,
    end_slack: u64,
    next_tick: Option<Instant>,
    end_passed: bool,
}

impl PlaybackClock {
    pub fn new(config: &config::Playback) -> Result<PlaybackClock, ConfigError> {
        Ok(PlaybackClock {
            state: PlaybackState::NotPlaying,
            poll_interval: config.poll_interval()?,
            end_slack: config.end_slack(),
            next_tick: None,
            end_passed: false,
        })
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state != PlaybackState::NotPlaying
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// When the next tick is due, or None while stopped.
    pub fn next_tick(&self) -> Option<Instant> {
        self.next_tick
    }

    pub fn timer_due(&self, now: Instant) -> bool {
        self.next_tick.is_some_and(|next| now >= next)
    }

    /// Plays `range`, stopping any current playback first.
    pub fn play_range(
        &mut self,
        player: &mut dyn AudioPlayer,
        range: SampleRange,
        now: Instant,
    ) -> Vec<ClockEvent> {
        let mut events: Vec<ClockEvent> = self.stop(player).into_iter().collect();
        player.play(range.begin(), range.length());
        self.start(PlaybackState::PlayingRange, now);
        events.push(ClockEvent::Position(range.begin()));
        events
    }

    /// Plays from `start` to the end of the audio, stopping any current
    /// playback first.
    pub fn play_to_end(
        &mut self,
        player: &mut dyn AudioPlayer,
        start: u64,
        num_samples: u64,
        now: Instant,
    ) -> Vec<ClockEvent> {
        let mut events: Vec<ClockEvent> = self.stop(player).into_iter().collect();
        player.play(start, num_samples.saturating_sub(start));
        self.start(PlaybackState::PlayingToEnd, now);
        events.push(ClockEvent::Position(start));
        events
    }

    fn start(&mut self, state: PlaybackState, now: Instant) {
        debug!(?state, "Playback started.");
        self.state = state;
        self.end_passed = false;
        self.next_tick = Some(now + self.poll_interval);
    }

    /// Stops playback. Idempotent: only the transition out of a playing state
    /// reports [ClockEvent::Stopped].
    pub fn stop(&mut self, player: &mut dyn AudioPlayer) -> Option<ClockEvent> {
        self.next_tick = None;
        player.stop();
        if self.state == PlaybackState::NotPlaying {
            return None;
        }
        debug!(state = ?self.state, "Playback stopped.");
        self.state = PlaybackState::NotPlaying;
        Some(ClockEvent::Stopped)
    }

    /// Moves the end of a range playback. An end at or before the current
    /// position stops playback on the next tick.
    pub fn change_playback_end(&mut self, player: &mut dyn AudioPlayer, end: u64) {
        if self.state != PlaybackState::PlayingRange {
            return;
        }
        player.set_end_position(end);
        self.end_passed = end <= player.current_position();
    }

    /// Forces the play head to `position` without restarting. Returns false
    /// when not playing.
    pub fn resync_playback_position(
        &mut self,
        player: &mut dyn AudioPlayer,
        position: u64,
    ) -> bool {
        if !self.is_playing() {
            return false;
        }
        debug!(
            from = player.current_position(),
            to = position,
            "Resyncing playback position."
        );
        player.set_current_position(position);
        true
    }

    /// One poll: stops when the player has stopped, a range has overrun its
    /// end by the slack, or playback to the end has reached the last sample.
    /// Otherwise reports the position.
    pub fn tick(&mut self, player: &mut dyn AudioPlayer, now: Instant) -> Option<ClockEvent> {
        if !self.is_playing() {
            return None;
        }
        self.next_tick = Some(now + self.poll_interval);

        let position = player.current_position();
        let end = player.end_position();
        let finished = match self.state {
            PlaybackState::PlayingRange => {
                self.end_passed || position >= end.saturating_add(self.end_slack)
            }
            PlaybackState::PlayingToEnd => position >= end,
            PlaybackState::NotPlaying => false,
        };
        if !player.is_playing() || finished {
            return self.stop(player);
        }
        Some(ClockEvent::Position(position))
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, sync::Arc};

    use super::*;
    use crate::audio::provider::{DummyProvider, DummySignal};
    use crate::audio::{AudioFormat, AudioProvider};
    use crate::playback::MockPlayer;

    fn setup() -> Result<(PlaybackClock, MockPlayer), Box<dyn Error>> {
        let provider: Arc<dyn AudioProvider> = Arc::new(DummyProvider::new(
            DummySignal::Silence,
            AudioFormat::canonical(44100),
            441000,
        ));
        Ok((
            PlaybackClock::new(&config::Playback::default())?,
            MockPlayer::new(provider),
        ))
    }

    #[test]
    fn range_stops_after_slack() -> Result<(), Box<dyn Error>> {
        let (mut clock, mut player) = setup()?;
        let now = Instant::now();
        let events = clock.play_range(&mut player, SampleRange::new(1000, 5000), now);
        assert_eq!(events, vec![ClockEvent::Position(1000)]);
        assert_eq!(clock.state(), PlaybackState::PlayingRange);

        player.advance(4100);
        assert_eq!(clock.tick(&mut player, now), Some(ClockEvent::Position(5100)));
        assert_eq!(clock.state(), PlaybackState::PlayingRange);

        player.advance(99);
        assert_eq!(clock.tick(&mut player, now), Some(ClockEvent::Position(5199)));

        player.advance(1);
        assert_eq!(clock.tick(&mut player, now), Some(ClockEvent::Stopped));
        assert_eq!(clock.state(), PlaybackState::NotPlaying);
        assert!(!player.is_playing());

        assert_eq!(clock.tick(&mut player, now), None);
        assert_eq!(clock.stop(&mut player), None);
        Ok(())
    }

    #[test]
    fn to_end_stops_at_last_sample() -> Result<(), Box<dyn Error>> {
        let (mut clock, mut player) = setup()?;
        let now = Instant::now();
        clock.play_to_end(&mut player, 440000, 441000, now);
        assert_eq!(player.end_position(), 441000);

        player.advance(999);
        assert_eq!(clock.tick(&mut player, now), Some(ClockEvent::Position(440999)));
        assert_eq!(clock.state(), PlaybackState::PlayingToEnd);

        // No slack past the end of the audio.
        player.advance(1);
        assert_eq!(clock.tick(&mut player, now), Some(ClockEvent::Stopped));
        assert_eq!(clock.state(), PlaybackState::NotPlaying);
        assert!(!player.is_playing());
        assert_eq!(clock.tick(&mut player, now), None);
        Ok(())
    }

    #[test]
    fn to_end_stops_when_overshooting() -> Result<(), Box<dyn Error>> {
        let (mut clock, mut player) = setup()?;
        let now = Instant::now();
        clock.play_to_end(&mut player, 0, 1000, now);
        player.advance(10000);
        assert_eq!(clock.tick(&mut player, now), Some(ClockEvent::Stopped));
        assert_eq!(clock.state(), PlaybackState::NotPlaying);
        Ok(())
    }

    #[test]
    fn player_stopping_ends_playback() -> Result<(), Box<dyn Error>> {
        let (mut clock, mut player) = setup()?;
        let now = Instant::now();
        clock.play_to_end(&mut player, 0, 441000, now);
        player.advance(500);
        player.finish();
        assert_eq!(clock.tick(&mut player, now), Some(ClockEvent::Stopped));
        Ok(())
    }

    #[test]
    fn replaying_stops_first() -> Result<(), Box<dyn Error>> {
        let (mut clock, mut player) = setup()?;
        let now = Instant::now();
        clock.play_range(&mut player, SampleRange::new(0, 100), now);
        let events = clock.play_to_end(&mut player, 50, 441000, now);
        assert_eq!(
            events,
            vec![ClockEvent::Stopped, ClockEvent::Position(50)]
        );
        assert_eq!(clock.state(), PlaybackState::PlayingToEnd);
        Ok(())
    }

    #[test]
    fn stop_cancels_the_timer() -> Result<(), Box<dyn Error>> {
        let (mut clock, mut player) = setup()?;
        let now = Instant::now();
        assert!(!clock.timer_due(now + Duration::from_secs(1)));

        clock.play_range(&mut player, SampleRange::new(0, 44100), now);
        assert!(!clock.timer_due(now));
        assert!(clock.timer_due(now + clock.poll_interval()));

        assert_eq!(clock.stop(&mut player), Some(ClockEvent::Stopped));
        assert_eq!(clock.next_tick(), None);
        assert!(!clock.timer_due(now + Duration::from_secs(1)));
        Ok(())
    }

    #[test]
    fn moving_end_behind_position_stops_next_tick() -> Result<(), Box<dyn Error>> {
        let (mut clock, mut player) = setup()?;
        let now = Instant::now();
        clock.play_range(&mut player, SampleRange::new(0, 44100), now);
        player.advance(10000);
        clock.change_playback_end(&mut player, 9950);
        assert_eq!(player.end_position(), 9950);
        assert_eq!(clock.tick(&mut player, now), Some(ClockEvent::Stopped));
        Ok(())
    }

    #[test]
    fn end_changes_only_apply_to_ranges() -> Result<(), Box<dyn Error>> {
        let (mut clock, mut player) = setup()?;
        let now = Instant::now();
        clock.play_to_end(&mut player, 0, 441000, now);
        clock.change_playback_end(&mut player, 10);
        assert_eq!(player.end_position(), 441000);
        Ok(())
    }

    #[test]
    fn resync_only_while_playing() -> Result<(), Box<dyn Error>> {
        let (mut clock, mut player) = setup()?;
        let now = Instant::now();
        assert!(!clock.resync_playback_position(&mut player, 500));
        assert_eq!(player.current_position(), 0);

        clock.play_to_end(&mut player, 0, 441000, now);
        player.advance(100);
        assert!(clock.resync_playback_position(&mut player, 20000));
        assert!(player.is_playing());
        assert_eq!(clock.tick(&mut player, now), Some(ClockEvent::Position(20000)));
        Ok(())
    }

    #[test]
    fn slack_is_configurable() -> Result<(), Box<dyn Error>> {
        let (_, mut player) = setup()?;
        let mut clock = PlaybackClock::new(&config::Playback::default().with_end_slack(0))?;
        let now = Instant::now();
        clock.play_range(&mut player, SampleRange::new(0, 100), now);
        player.advance(100);
        assert_eq!(clock.tick(&mut player, now), Some(ClockEvent::Stopped));
        Ok(())
    }
}
