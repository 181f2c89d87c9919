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
/*! Runtime utilities of the ZXREPLAY library.

* [tape] - a tape recorder answering `EAR IN` signal queries from a pulse sequence.
* [playback] - lock-step replay of the **RZX** input recordings.
* [config] - options of a replay session.
*/
pub mod config;
pub mod playback;
pub mod tape;

pub use config::ReplayConfig;
pub use playback::{CompatProfile, CompatSelect, Playback, PlaybackError, PlaybackMarker};
pub use tape::{PlayerState, TapePlayer};
