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
/*! File formats of the ZXREPLAY library.

Snapshots:

* [z80] - **Z80** snapshots, versions 1 to 3.
* [scr] - **SCR** screen dumps.

Input recordings:

* [rzx] - **RZX** recordings with embedded snapshots.

Tapes:

* [tap] - **TAP** tapes.
* [tzx] - **TZX** tapes.
* [wav] - **WAV** audio recordings of tapes.

Files are best decoded with [registry::parse], which determines the format from the file
signature and the file name extension and unpacks **ZIP** archives.
*/
pub mod binary;
mod error;
pub mod registry;
pub mod rzx;
pub mod scr;
pub mod tap;
pub mod tzx;
pub mod wav;
pub mod z80;
pub mod zip;

pub use error::{FormatError, Result};
pub use registry::{
    ArchivePolicy, FileRecord, FormatKind, SnapshotFile, SoundFile,
    detect_format, make_snapshot, make_z80, parse, parse_with_policy, save_snapshot
};
