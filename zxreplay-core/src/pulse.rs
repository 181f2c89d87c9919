/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
//! Tape signal pulses.
//!
//! A tape signal is represented as a sequence of [Pulse]s. Each pulse holds the signal level
//! for its duration measured in T-states. Pulse sequences are lazy, forward-only iterators
//! and the last pulse of every sequence is tagged with [PulseTags::END].
use core::fmt;
use core::iter::Peekable;

use bitflags::bitflags;

bitflags! {
    /// Symbolic labels attached to pulses.
    ///
    /// Apart from [PulseTags::END] the tags serve only diagnostic purposes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PulseTags: u8 {
        const PILOT = 0b0000_0001;
        const SYNC1 = 0b0000_0010;
        const SYNC2 = 0b0000_0100;
        const BIT0  = 0b0000_1000;
        const BIT1  = 0b0001_0000;
        const TAIL  = 0b0010_0000;
        const PAUSE = 0b0100_0000;
        /// Marks the last pulse of a sequence.
        const END   = 0b1000_0000;
    }
}

/// A single edge-triggered signal segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pulse {
    /// The signal level for the duration of this pulse.
    pub level: bool,
    /// The pulse duration in T-states.
    pub duration: u32,
    pub tags: PulseTags,
}

/// A boxed lazy sequence of pulses.
pub type PulseStream<'a> = Box<dyn Iterator<Item=Pulse> + 'a>;

/// An iterator adapter tagging the last pulse of the underlying sequence with [PulseTags::END].
#[derive(Debug, Clone)]
pub struct EndTagged<I: Iterator<Item=Pulse>> {
    iter: Peekable<I>
}

impl Default for PulseTags {
    fn default() -> Self {
        PulseTags::empty()
    }
}

impl Pulse {
    pub fn new(level: bool, duration: u32, tags: PulseTags) -> Self {
        Pulse { level, duration, tags }
    }
    /// Returns `true` if this pulse terminates its sequence.
    #[inline]
    pub fn is_end(&self) -> bool {
        self.tags.contains(PulseTags::END)
    }
}

impl fmt::Display for Pulse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}T {:?}", if self.level { "HIGH" } else { "LOW" }, self.duration, self.tags)
    }
}

impl<I: Iterator<Item=Pulse>> EndTagged<I> {
    pub fn new(iter: I) -> Self {
        EndTagged { iter: iter.peekable() }
    }
}

impl<I: Iterator<Item=Pulse>> Iterator for EndTagged<I> {
    type Item = Pulse;

    fn next(&mut self) -> Option<Pulse> {
        let mut pulse = self.iter.next()?;
        if self.iter.peek().is_none() {
            pulse.tags.insert(PulseTags::END);
        }
        Some(pulse)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

/// Adapts the pulse sequence so that its last pulse is tagged with [PulseTags::END].
pub fn end_tagged<I: IntoIterator<Item=Pulse>>(iter: I) -> EndTagged<I::IntoIter> {
    EndTagged::new(iter.into_iter())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_tagged_works() {
        let mut iter = end_tagged(core::iter::empty());
        assert_eq!(None, iter.next());

        let pulses = vec![
            Pulse::new(true, 10, PulseTags::PILOT),
            Pulse::new(false, 20, PulseTags::PILOT),
            Pulse::new(true, 30, PulseTags::TAIL)];
        let tagged: Vec<_> = end_tagged(pulses.clone()).collect();
        assert_eq!(tagged.len(), 3);
        assert_eq!(&tagged[..2], &pulses[..2]);
        assert!(tagged[2].is_end());
        assert!(tagged[2].tags.contains(PulseTags::TAIL));
        assert_eq!(tagged.iter().filter(|p| p.is_end()).count(), 1);
    }
}
