/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
//! A simple tape recorder feeding the `EAR IN` signal from a pulse sequence.
use log::{debug, trace};

use zxreplay_core::clock::{CPU_HZ, FRAME_TSTATES, FTs};
use zxreplay_core::pulse::Pulse;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerState {
    /// No tape is inserted.
    NoTape,
    Paused,
    Playing,
    /// The last pulse of the tape has been played.
    Exhausted,
}

/// The struct that emulates a tape recorder playing a [Pulse] sequence.
///
/// The signal is sampled with [TapePlayer::level_at] using frame-relative T-state timestamps
/// that never decrease within a frame. [TapePlayer::end_frame] should be called at the end of
/// each frame to rebase the timestamps.
#[derive(Debug)]
pub struct TapePlayer<P> {
    pulses: Option<P>,
    state: PlayerState,
    frame_tstates: FTs,
    /// The last queried frame-relative timestamp.
    tick: FTs,
    /// T-states left of the current pulse.
    remaining: u32,
    level: bool,
    is_last: bool,
    elapsed: u64,
}

impl<P> Default for TapePlayer<P> {
    fn default() -> Self {
        TapePlayer::with_frame_tstates(FRAME_TSTATES)
    }
}

impl<P> TapePlayer<P> {
    pub fn new() -> Self {
        Self::default()
    }
    /// Creates the player with a custom frame duration.
    ///
    /// # Panics
    /// Panics if `frame_tstates` is not positive.
    pub fn with_frame_tstates(frame_tstates: FTs) -> Self {
        assert!(frame_tstates > 0, "frame duration must be positive");
        TapePlayer {
            pulses: None,
            state: PlayerState::NoTape,
            frame_tstates,
            tick: 0,
            remaining: 0,
            level: false,
            is_last: false,
            elapsed: 0
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn frame_tstates(&self) -> FTs {
        self.frame_tstates
    }
    /// Returns the last queried frame-relative timestamp.
    pub fn tick(&self) -> FTs {
        self.tick
    }
    /// Returns the number of T-states the tape has been playing.
    pub fn elapsed_ticks(&self) -> u64 {
        self.elapsed
    }
    /// Returns the number of seconds the tape has been playing.
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed as f64 / CPU_HZ as f64
    }

    pub fn is_inserted(&self) -> bool {
        self.pulses.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayerState::Playing
    }
    /// Inserts a new tape in the paused state. Returns the previously inserted tape.
    pub fn insert(&mut self, pulses: P) -> Option<P> {
        debug!("tape inserted");
        self.reset_signal();
        self.state = PlayerState::Paused;
        self.pulses.replace(pulses)
    }
    /// Removes the tape and returns it if one was inserted.
    pub fn eject(&mut self) -> Option<P> {
        debug!("tape ejected");
        self.reset_signal();
        self.state = PlayerState::NoTape;
        self.pulses.take()
    }
    /// Starts playing the paused tape. Returns `true` if the state changed.
    pub fn play(&mut self) -> bool {
        if self.state == PlayerState::Paused {
            self.state = PlayerState::Playing;
            return true
        }
        false
    }
    /// Pauses the playing tape. Returns `true` if the state changed.
    pub fn pause(&mut self) -> bool {
        if self.state == PlayerState::Playing {
            self.state = PlayerState::Paused;
            return true
        }
        false
    }

    fn reset_signal(&mut self) {
        self.remaining = 0;
        self.level = false;
        self.is_last = false;
        self.elapsed = 0;
    }
}

impl<P: Iterator<Item=Pulse>> TapePlayer<P> {
    /// Creates the player with the tape inserted and paused.
    pub fn with_tape(pulses: P) -> Self {
        let mut player = Self::default();
        player.insert(pulses);
        player
    }
    /// Returns the signal level at the frame-relative timestamp `tick`.
    ///
    /// When paused the signal is frozen and no pulses are consumed. With no tape inserted or
    /// after the tape is exhausted, the level is low.
    ///
    /// `tick` must not be less than the previously queried timestamp. Otherwise the query is
    /// treated as if it was made at the previous timestamp.
    pub fn level_at(&mut self, tick: FTs) -> bool {
        debug_assert!(tick >= self.tick, "tape player time can't go back: {} < {}", tick, self.tick);
        let tick = tick.max(self.tick);
        let mut delta = (tick - self.tick) as u64;
        self.tick = tick;
        match self.state {
            PlayerState::Playing => {}
            PlayerState::Paused => return self.level,
            PlayerState::NoTape|PlayerState::Exhausted => return false
        }
        loop {
            if u64::from(self.remaining) > delta {
                self.remaining -= delta as u32;
                self.elapsed += delta;
                return self.level
            }
            delta -= u64::from(self.remaining);
            self.elapsed += u64::from(self.remaining);
            self.remaining = 0;
            let next = if self.is_last {
                None
            }
            else {
                self.pulses.as_mut().and_then(|pulses| pulses.next())
            };
            match next {
                Some(pulse) => {
                    trace!("pulse: {}", pulse);
                    self.level = pulse.level;
                    self.remaining = pulse.duration;
                    self.is_last = pulse.is_end();
                }
                None => {
                    debug!("tape exhausted after {} T-states", self.elapsed);
                    self.state = PlayerState::Exhausted;
                    self.level = false;
                    return false
                }
            }
        }
    }
    /// Advances the player to the end of the current frame and rebases the frame-relative timestamp.
    pub fn end_frame(&mut self) {
        if self.tick < self.frame_tstates {
            self.level_at(self.frame_tstates);
        }
        self.tick -= self.frame_tstates;
    }
}
