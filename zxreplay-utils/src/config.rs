/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
//! Runtime options of a replay session.
use core::fmt;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use zxreplay_core::clock::{FRAME_TSTATES, FTs};
use zxreplay_core::snapshot::SnapshotLoader;
use zxreplay_formats::{self as formats, ArchivePolicy, FileRecord};
use zxreplay_formats::rzx::RzxFile;

use crate::playback::Playback;
use crate::tape::TapePlayer;

pub use crate::playback::CompatSelect;

/// Options of loading files, playing tapes and replaying the input recordings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(default))]
pub struct ReplayConfig {
    /// The duration of a single frame in T-states.
    pub frame_tstates: FTs,
    /// How to resolve archives with more than one recognized file.
    pub archive_policy: ArchivePolicy,
    /// How to select the compatibility profile of input recordings.
    pub compat: CompatSelect,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        ReplayConfig {
            frame_tstates: FRAME_TSTATES,
            archive_policy: ArchivePolicy::default(),
            compat: CompatSelect::default(),
        }
    }
}

impl fmt::Display for ReplayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame: {} T-states, archives: {}, compatibility: {}",
                self.frame_tstates, self.archive_policy, self.compat)
    }
}

impl ReplayConfig {
    /// Parses the file `image` with the archive policy of this configuration.
    pub fn parse(&self, filename: &str, image: &[u8]) -> formats::Result<FileRecord> {
        formats::parse_with_policy(filename, image, self.archive_policy)
    }
    /// Creates a tape player with the frame duration of this configuration.
    pub fn tape_player<P>(&self) -> TapePlayer<P> {
        TapePlayer::with_frame_tstates(self.frame_tstates)
    }
    /// Creates the playback of `rzx` with this configuration.
    pub fn playback<'r, M: SnapshotLoader>(&self, rzx: &'r RzxFile, loader: M) -> Playback<'r, M> {
        Playback::with_config(rzx, loader, self)
    }
}
