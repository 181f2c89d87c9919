/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    ZXREPLAY is free software: you can redistribute it and/or modify it under
    the terms of the GNU Lesser General Public License (LGPL) as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    ZXREPLAY is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Lesser General Public License for more details.

    You should have received a copy of the GNU Lesser General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.

    Author contact information: see Cargo.toml file, section [package.authors].
*/
/*! # ZXREPLAY

A library for persisting and deterministically replaying the **ZX Spectrum 48k** emulation.

The library consists of the following crates re-exported here:

* [clock], [pulse], [snapshot] and [video] - core types: clocks, tape pulses and the unified
  machine snapshot.
* [formats] - codecs of the snapshot, tape and input recording files with the format registry.
* [utils] - the tape player and the input recording playback synchronizer.

The most often used items are also re-exported at the top level.

```no_run
use zxreplay::{FileRecord, TapePlayer, parse};

let image = std::fs::read("game.tap").unwrap();
if let FileRecord::Sound(tape) = parse("game.tap", &image).unwrap() {
    let mut player = TapePlayer::with_tape(tape.into_pulses());
    player.play();
    let ear_in = player.level_at(0);
}
```
*/
pub use zxreplay_core::{clock, pulse, snapshot, video};
pub use zxreplay_formats as formats;
pub use zxreplay_utils as utils;

pub use zxreplay_core::z80emu;
pub use zxreplay_core::clock::{FRAME_TSTATES, FTs};
pub use zxreplay_core::pulse::{Pulse, PulseStream, PulseTags};
pub use zxreplay_core::snapshot::{SnapshotCreator, SnapshotLoader, UnifiedSnapshot};
pub use zxreplay_formats::{
    ArchivePolicy, FileRecord, FormatError, FormatKind, SnapshotFile, SoundFile,
    detect_format, make_snapshot, parse, parse_with_policy, save_snapshot
};
pub use zxreplay_utils::{
    CompatProfile, CompatSelect, Playback, PlaybackError, PlaybackMarker,
    PlayerState, ReplayConfig, TapePlayer
};
