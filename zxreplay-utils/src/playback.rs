/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
//! Lock-step replay of the **RZX** input recordings.
//!
//! [Playback] walks the chunks of a parsed [RzxFile] and yields [PlaybackMarker]s: a
//! [PlaybackMarker::StartOfFrame], then each recorded input sample, then a
//! [PlaybackMarker::EndOfFrame], for each frame of every port samples chunk. Embedded snapshots
//! are installed into the provided [SnapshotLoader] when reached instead of being yielded.
//!
//! The execution core may also drive the playback with [Playback::start_frame],
//! [Playback::read_sample] and [Playback::end_frame], which report the sample count mismatches.
use core::fmt;

use log::{debug, trace, warn};
use thiserror::Error;

use zxreplay_core::snapshot::SnapshotLoader;
use zxreplay_formats::FormatError;
use zxreplay_formats::rzx::{CreatorInfo, FrameSamples, RzxChunk, RzxFile};

use crate::config::ReplayConfig;

mod compat;
pub use compat::*;

/// A synchronization marker yielded by [Playback].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlaybackMarker {
    StartOfFrame,
    /// The recorded value of the next port input.
    Sample(u8),
    EndOfFrame,
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("can't install an embedded snapshot: {0}")]
    Snapshot(#[from] FormatError),
    #[error("frame {frame} of chunk {chunk} repeats samples but there is no preceding frame")]
    MissingRepeatSource { chunk: usize, frame: usize },
    #[error("frame {frame}: more inputs read than {count} recorded")]
    SampleOverrun { frame: u64, count: usize },
    #[error("frame {frame}: {left} recorded inputs left unread")]
    SampleUnderrun { frame: u64, left: usize },
    #[error("no frame is being replayed")]
    FrameNotStarted,
}

/// Information about the frame just started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameInfo {
    /// The 0-based number of the frame counted from the beginning of the recording.
    pub number: u64,
    /// The number of instruction fetches (`M1` cycles) to execute in this frame.
    pub fetch_count: u16,
    /// The number of port inputs recorded for this frame.
    pub sample_count: usize,
    /// The T-state counter at the beginning of the first frame of a port samples chunk.
    pub first_tick: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    InFrame,
}

/// The replay synchronizer of a single recording.
pub struct Playback<'r, M> {
    rzx: &'r RzxFile,
    loader: M,
    compat: CompatProfile,
    /// Index of the chunk being visited.
    chunk: usize,
    /// Index of the next frame in the port samples chunk being visited.
    frame: usize,
    phase: Phase,
    samples: &'r [u8],
    sample: usize,
    last_samples: Option<&'r [u8]>,
    frames_played: u64,
}

impl fmt::Display for PlaybackMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackMarker::StartOfFrame => f.write_str("START_OF_FRAME"),
            PlaybackMarker::Sample(data) => write!(f, "0x{:02x}", data),
            PlaybackMarker::EndOfFrame => f.write_str("END_OF_FRAME"),
        }
    }
}

impl<'r, M: SnapshotLoader> Playback<'r, M> {
    /// Creates the playback of `rzx` with the default configuration.
    ///
    /// Snapshots embedded in the recording will be installed with `loader`.
    pub fn new(rzx: &'r RzxFile, loader: M) -> Self {
        Self::with_config(rzx, loader, &ReplayConfig::default())
    }
    /// Creates the playback of `rzx` with the compatibility profile determined by `config`.
    pub fn with_config(rzx: &'r RzxFile, loader: M, config: &ReplayConfig) -> Self {
        let compat = config.compat.resolve(rzx.find_creator_info());
        debug!("RZX playback: {} chunks, compatibility: {}", rzx.chunks.len(), compat);
        Playback {
            rzx,
            loader,
            compat,
            chunk: 0,
            frame: 0,
            phase: Phase::Idle,
            samples: &[],
            sample: 0,
            last_samples: None,
            frames_played: 0
        }
    }
    /// Returns the first creator info chunk of the recording.
    pub fn find_creator_info(&self) -> Option<&'r CreatorInfo> {
        self.rzx.find_creator_info()
    }
    /// Returns the compatibility profile selected for this recording.
    pub fn compat_profile(&self) -> CompatProfile {
        self.compat
    }

    pub fn recording(&self) -> &'r RzxFile {
        self.rzx
    }

    pub fn loader(&self) -> &M {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut M {
        &mut self.loader
    }

    pub fn into_loader(self) -> M {
        self.loader
    }
    /// Returns the number of frames started so far.
    pub fn frames_played(&self) -> u64 {
        self.frames_played
    }
    /// Returns `true` if a frame is being replayed.
    pub fn is_in_frame(&self) -> bool {
        self.phase == Phase::InFrame
    }
    /// Returns the number of the recorded inputs of the current frame not read yet.
    pub fn samples_left(&self) -> usize {
        match self.phase {
            Phase::InFrame => self.samples.len() - self.sample,
            Phase::Idle => 0
        }
    }
    /// Starts replaying the next frame installing any snapshots found on the way.
    ///
    /// Returns `Ok(None)` when there are no more frames.
    ///
    /// If the previous frame has not been ended yet, it is ended first with the same
    /// validation as in [Playback::end_frame].
    pub fn start_frame(&mut self) -> Result<Option<FrameInfo>, PlaybackError> {
        if self.phase == Phase::InFrame {
            self.end_frame()?;
        }
        self.next_frame()
    }
    /// Returns the recorded value of the next port input of the current frame.
    pub fn read_sample(&mut self) -> Result<u8, PlaybackError> {
        if self.phase != Phase::InFrame {
            return Err(PlaybackError::FrameNotStarted)
        }
        match self.samples.get(self.sample) {
            Some(&data) => {
                self.sample += 1;
                Ok(data)
            }
            None => Err(PlaybackError::SampleOverrun {
                frame: self.current_frame_number(),
                count: self.samples.len()
            })
        }
    }
    /// Ends the current frame.
    ///
    /// The frame is ended even if an error is returned.
    pub fn end_frame(&mut self) -> Result<(), PlaybackError> {
        if self.phase != Phase::InFrame {
            return Err(PlaybackError::FrameNotStarted)
        }
        self.phase = Phase::Idle;
        let left = self.samples.len() - self.sample;
        if left != 0 {
            return Err(PlaybackError::SampleUnderrun { frame: self.current_frame_number(), left })
        }
        Ok(())
    }

    fn current_frame_number(&self) -> u64 {
        self.frames_played.saturating_sub(1)
    }

    fn next_frame(&mut self) -> Result<Option<FrameInfo>, PlaybackError> {
        let rzx = self.rzx;
        while let Some(chunk) = rzx.chunks.get(self.chunk) {
            match chunk {
                RzxChunk::PortSamples(port) => {
                    let index = self.frame;
                    let frame = match port.frames.get(index) {
                        Some(frame) => frame,
                        None => {
                            self.next_chunk();
                            continue
                        }
                    };
                    self.frame += 1;
                    let samples = match &frame.samples {
                        FrameSamples::Recorded(samples) => &samples[..],
                        FrameSamples::Repeat => match self.last_samples {
                            Some(samples) => samples,
                            None => return Err(PlaybackError::MissingRepeatSource {
                                chunk: self.chunk, frame: index
                            })
                        }
                    };
                    let info = FrameInfo {
                        number: self.frames_played,
                        fetch_count: frame.fetch_count,
                        sample_count: samples.len(),
                        first_tick: if index == 0 { Some(port.first_tick) } else { None }
                    };
                    trace!("RZX frame: {:?}", info);
                    self.last_samples = Some(samples);
                    self.samples = samples;
                    self.sample = 0;
                    self.phase = Phase::InFrame;
                    self.frames_played += 1;
                    return Ok(Some(info))
                }
                RzxChunk::Snapshot(snapshot) => {
                    self.next_chunk();
                    let unified = snapshot.to_unified()?;
                    debug!("RZX playback: installing snapshot at frame {}", self.frames_played);
                    self.loader.install_snapshot(unified);
                }
                RzxChunk::Info(info) => {
                    trace!("RZX creator: {}", info);
                    self.next_chunk();
                }
            }
        }
        Ok(None)
    }

    fn next_chunk(&mut self) {
        self.chunk += 1;
        self.frame = 0;
    }
}

/// Yields the markers in the recorded order.
///
/// Errors are yielded in place of the marker that could not be produced and the iteration may
/// continue past them.
impl<'r, M: SnapshotLoader> Iterator for Playback<'r, M> {
    type Item = Result<PlaybackMarker, PlaybackError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.phase {
            Phase::InFrame => {
                if let Some(&data) = self.samples.get(self.sample) {
                    self.sample += 1;
                    Some(Ok(PlaybackMarker::Sample(data)))
                }
                else {
                    self.phase = Phase::Idle;
                    Some(Ok(PlaybackMarker::EndOfFrame))
                }
            }
            Phase::Idle => match self.next_frame() {
                Ok(Some(_)) => Some(Ok(PlaybackMarker::StartOfFrame)),
                Ok(None) => None,
                Err(err) => {
                    warn!("RZX playback: {}", err);
                    Some(Err(err))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use zxreplay_core::snapshot::UnifiedSnapshot;
    use zxreplay_formats::rzx::{Frame, PortSamples, SnapshotChunk};
    use super::*;
    use super::PlaybackMarker::*;

    #[derive(Default)]
    struct Machine {
        installed: Vec<UnifiedSnapshot>,
    }

    impl SnapshotLoader for Machine {
        fn install_snapshot(&mut self, snapshot: UnifiedSnapshot) {
            self.installed.push(snapshot);
        }
    }

    fn recording() -> RzxFile {
        let mut snap = UnifiedSnapshot::default();
        snap.pc = 0x8000;
        snap.hl = 0x1234;
        RzxFile::new()
            .with_chunk(CreatorInfo::new("Fuse", 1, 5))
            .with_chunk(SnapshotChunk::from_unified(&snap).unwrap())
            .with_chunk(PortSamples {
                first_tick: 100,
                frames: vec![Frame::new(10, vec![0xbf, 0xfe]), Frame::repeat(12)]
            })
            .with_chunk(PortSamples {
                first_tick: 0,
                frames: vec![Frame::repeat(5), Frame::new(1, vec![])]
            })
    }

    #[test]
    fn playback_markers_work() {
        let rzx = recording();
        let mut machine = Machine::default();
        let markers: Vec<_> = Playback::new(&rzx, &mut machine).map(Result::unwrap).collect();
        assert_eq!(markers, vec![
            StartOfFrame, Sample(0xbf), Sample(0xfe), EndOfFrame,
            StartOfFrame, Sample(0xbf), Sample(0xfe), EndOfFrame,
            StartOfFrame, Sample(0xbf), Sample(0xfe), EndOfFrame,
            StartOfFrame, EndOfFrame]);
        assert_eq!(machine.installed.len(), 1);
        assert_eq!(machine.installed[0].hl, 0x1234);
        assert_eq!(machine.installed[0].pc, 0x8000);
        assert_eq!(Sample(0x0f).to_string(), "0x0f");
        assert_eq!(EndOfFrame.to_string(), "END_OF_FRAME");
    }

    #[test]
    fn playback_frames_work() {
        let rzx = recording();
        let mut playback = Playback::new(&rzx, Machine::default());
        assert_eq!(playback.find_creator_info().unwrap().name, "Fuse");
        assert_eq!(playback.compat_profile(), CompatProfile::NEUTRAL);
        assert!(matches!(playback.read_sample(), Err(PlaybackError::FrameNotStarted)));
        assert!(matches!(playback.end_frame(), Err(PlaybackError::FrameNotStarted)));
        let info = playback.start_frame().unwrap().unwrap();
        assert_eq!(info, FrameInfo { number: 0, fetch_count: 10, sample_count: 2, first_tick: Some(100) });
        assert_eq!(playback.loader().installed.len(), 1);
        assert_eq!(playback.read_sample().unwrap(), 0xbf);
        assert_eq!(playback.read_sample().unwrap(), 0xfe);
        assert_eq!(playback.samples_left(), 0);
        match playback.read_sample() {
            Err(PlaybackError::SampleOverrun { frame: 0, count: 2 }) => {}
            res => panic!("unexpected: {:?}", res)
        }
        playback.end_frame().unwrap();
        let info = playback.start_frame().unwrap().unwrap();
        assert_eq!(info, FrameInfo { number: 1, fetch_count: 12, sample_count: 2, first_tick: None });
        assert_eq!(playback.read_sample().unwrap(), 0xbf);
        match playback.end_frame() {
            Err(PlaybackError::SampleUnderrun { frame: 1, left: 1 }) => {}
            res => panic!("unexpected: {:?}", res)
        }
        assert!(!playback.is_in_frame());
        let info = playback.start_frame().unwrap().unwrap();
        assert_eq!(info.first_tick, Some(0));
        assert_eq!(info.sample_count, 2);
        match playback.start_frame() {
            Err(PlaybackError::SampleUnderrun { frame: 2, left: 2 }) => {}
            res => panic!("unexpected: {:?}", res)
        }
        let info = playback.start_frame().unwrap().unwrap();
        assert_eq!(info.number, 3);
        assert_eq!(info.sample_count, 0);
        assert!(playback.start_frame().unwrap().is_none());
        assert_eq!(playback.frames_played(), 4);
        assert!(playback.start_frame().unwrap().is_none());
        assert_eq!(playback.into_loader().installed.len(), 1);
    }

    #[test]
    fn playback_missing_repeat_source_is_detected() {
        let rzx = RzxFile::new()
            .with_chunk(PortSamples { first_tick: 0, frames: vec![Frame::repeat(1), Frame::new(2, vec![7])] });
        let mut playback = Playback::new(&rzx, Machine::default());
        match playback.next() {
            Some(Err(PlaybackError::MissingRepeatSource { chunk: 0, frame: 0 })) => {}
            res => panic!("unexpected: {:?}", res)
        }
        let rest: Vec<_> = playback.map(Result::unwrap).collect();
        assert_eq!(rest, vec![StartOfFrame, Sample(7), EndOfFrame]);
    }

    #[test]
    fn playback_snapshot_error_is_reported() {
        let rzx = RzxFile::new()
            .with_chunk(SnapshotChunk { extension: "sna".into(), image: vec![0; 27] })
            .with_chunk(PortSamples { first_tick: 0, frames: vec![Frame::new(2, vec![])] });
        let mut machine = Machine::default();
        let mut playback = Playback::new(&rzx, &mut machine);
        assert!(matches!(playback.next(), Some(Err(PlaybackError::Snapshot(..)))));
        assert!(matches!(playback.next(), Some(Ok(StartOfFrame))));
        assert!(matches!(playback.next(), Some(Ok(EndOfFrame))));
        assert!(playback.next().is_none());
        assert!(machine.installed.is_empty());
    }

    #[test]
    fn playback_compat_profile_works() {
        let rzx = RzxFile::new().with_chunk(CreatorInfo::new("SPIN 0.6", 0, 6));
        let playback = Playback::new(&rzx, Machine::default());
        assert_eq!(playback.compat_profile(), CompatProfile::SPIN);
        assert!(playback.compat_profile().skips_rom_tape_save());
        let config = ReplayConfig { compat: CompatSelect::Neutral, ..ReplayConfig::default() };
        let mut playback = Playback::with_config(&rzx, Machine::default(), &config);
        assert_eq!(playback.compat_profile(), CompatProfile::NEUTRAL);
        assert!(playback.next().is_none());
    }
}
