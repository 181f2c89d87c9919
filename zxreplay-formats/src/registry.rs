/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
//! File format detection and dispatch.
//!
//! [parse] resolves the format of a file image from its signature and the file name extension
//! and decodes it into a [FileRecord]. Archives are unpacked recursively and must contain exactly
//! one file of a known format, unless [ArchivePolicy::FirstMatch] is requested with
//! [parse_with_policy].
use core::fmt;
use core::str::FromStr;
use std::path::Path;

use log::{debug, warn};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use zxreplay_core::pulse::PulseStream;
use zxreplay_core::snapshot::{SnapshotCreator, UnifiedSnapshot};

use crate::error::{FormatError, Result};
use crate::rzx::RzxFile;
use crate::scr::ScrSnapshot;
use crate::tap::TapFile;
use crate::tzx::TzxFile;
use crate::wav::WavFile;
use crate::z80::{Z80Snapshot, Z80Version, save_z80};

/// The maximum nesting level of archives.
pub const MAX_ARCHIVE_DEPTH: usize = 4;

/// All the recognized file formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormatKind {
    Z80,
    Scr,
    Rzx,
    Tap,
    Tzx,
    Wav,
    Zip,
}

/// Static properties of a file format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub kind: FormatKind,
    pub name: &'static str,
    /// Lowercase file name extensions.
    pub extensions: &'static [&'static str],
    /// Byte sequences expected at the given offsets, empty if the format has no signature.
    pub signature: &'static [(usize, &'static [u8])],
    pub is_archive: bool,
}

static FORMATS: [FormatDescriptor;7] = [
    FormatDescriptor {
        kind: FormatKind::Z80, name: "Z80", extensions: &["z80"],
        signature: &[], is_archive: false
    },
    FormatDescriptor {
        kind: FormatKind::Scr, name: "SCR", extensions: &["scr"],
        signature: &[], is_archive: false
    },
    FormatDescriptor {
        kind: FormatKind::Rzx, name: "RZX", extensions: &["rzx"],
        signature: &[(0, b"RZX!")], is_archive: false
    },
    FormatDescriptor {
        kind: FormatKind::Tap, name: "TAP", extensions: &["tap"],
        signature: &[], is_archive: false
    },
    FormatDescriptor {
        kind: FormatKind::Tzx, name: "TZX", extensions: &["tzx"],
        signature: &[(0, b"ZXTape!\x1A")], is_archive: false
    },
    FormatDescriptor {
        kind: FormatKind::Wav, name: "WAV", extensions: &["wav"],
        signature: &[(0, b"RIFF"), (8, b"WAVE")], is_archive: false
    },
    FormatDescriptor {
        kind: FormatKind::Zip, name: "ZIP", extensions: &["zip"],
        signature: &[(0, b"PK\x03\x04")], is_archive: true
    },
];

impl FormatKind {
    /// Returns descriptors of all the recognized formats.
    pub fn descriptors() -> &'static [FormatDescriptor] {
        &FORMATS
    }

    pub fn descriptor(self) -> &'static FormatDescriptor {
        let index = match self {
            FormatKind::Z80 => 0,
            FormatKind::Scr => 1,
            FormatKind::Rzx => 2,
            FormatKind::Tap => 3,
            FormatKind::Tzx => 4,
            FormatKind::Wav => 5,
            FormatKind::Zip => 6,
        };
        &FORMATS[index]
    }

    pub fn is_archive(self) -> bool {
        self.descriptor().is_archive
    }

    pub fn has_signature(self) -> bool {
        !self.descriptor().signature.is_empty()
    }
    /// Returns `true` if `extension` (with or without the leading dot) belongs to this format.
    pub fn matches_extension(self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.');
        self.descriptor().extensions.iter().any(|ext| ext.eq_ignore_ascii_case(extension))
    }
    /// Returns `true` if this format has a signature and `prefix` begins with it.
    pub fn matches_signature(self, prefix: &[u8]) -> bool {
        let signature = self.descriptor().signature;
        !signature.is_empty() && signature.iter().all(|&(offset, magic)| {
            prefix.get(offset..offset + magic.len()) == Some(magic)
        })
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descriptor().name)
    }
}

/// Determines the format from the first bytes of a file and the file name `extension`.
///
/// Formats without a signature are matched by the extension first. Then the signatures are
/// checked. At last, formats with a signature are matched by the extension, so their codecs
/// can report a bad signature.
pub fn detect_format(prefix: &[u8], extension: &str) -> Option<FormatKind> {
    let formats = || FORMATS.iter().map(|desc| desc.kind);
    formats().find(|kind| !kind.has_signature() && kind.matches_extension(extension))
        .or_else(|| formats().find(|kind| kind.matches_signature(prefix)))
        .or_else(|| formats().find(|kind| kind.matches_extension(extension)))
}

fn extension_of(filename: &str) -> &str {
    Path::new(filename).extension().and_then(|ext| ext.to_str()).unwrap_or("")
}

/// How to select a file from an archive holding more than one file of a known format.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(rename_all = "kebab-case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArchivePolicy {
    /// Anything but a single candidate is an error.
    ExactlyOne,
    /// The first candidate in the archive order, depth first, is selected.
    FirstMatch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseArchivePolicyError;

impl Default for ArchivePolicy {
    fn default() -> Self {
        ArchivePolicy::ExactlyOne
    }
}

impl fmt::Display for ArchivePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArchivePolicy::ExactlyOne => "exactly-one",
            ArchivePolicy::FirstMatch => "first-match",
        })
    }
}

impl std::error::Error for ParseArchivePolicyError {}

impl fmt::Display for ParseArchivePolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unrecognized archive policy")
    }
}

impl FromStr for ArchivePolicy {
    type Err = ParseArchivePolicyError;
    fn from_str(name: &str) -> core::result::Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "exactly-one" => Ok(ArchivePolicy::ExactlyOne),
            "first-match" => Ok(ArchivePolicy::FirstMatch),
            _ => Err(ParseArchivePolicyError)
        }
    }
}

/// A decoded snapshot file.
#[derive(Clone, Debug, PartialEq)]
pub enum SnapshotFile {
    Z80(Z80Snapshot),
    Scr(ScrSnapshot),
}

/// A decoded tape or audio file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SoundFile {
    Tap(TapFile),
    Tzx(TzxFile),
    Wav(WavFile),
}

/// A decoded file of any of the recognized formats.
#[derive(Clone, Debug, PartialEq)]
pub enum FileRecord {
    Snapshot(SnapshotFile),
    Sound(SoundFile),
    Recording(RzxFile),
}

impl SnapshotFile {
    pub fn kind(&self) -> FormatKind {
        match self {
            SnapshotFile::Z80(..) => FormatKind::Z80,
            SnapshotFile::Scr(..) => FormatKind::Scr,
        }
    }

    pub fn to_unified(&self) -> UnifiedSnapshot {
        match self {
            SnapshotFile::Z80(z80) => z80.to_unified(),
            SnapshotFile::Scr(scr) => scr.to_unified(),
        }
    }
}

impl SoundFile {
    pub fn kind(&self) -> FormatKind {
        match self {
            SoundFile::Tap(..) => FormatKind::Tap,
            SoundFile::Tzx(..) => FormatKind::Tzx,
            SoundFile::Wav(..) => FormatKind::Wav,
        }
    }
    /// Returns a lazy pulse sequence borrowing this file.
    pub fn pulses(&self) -> PulseStream<'_> {
        match self {
            SoundFile::Tap(tap) => Box::new(tap.pulses()),
            SoundFile::Tzx(tzx) => Box::new(tzx.pulses()),
            SoundFile::Wav(wav) => Box::new(wav.pulses()),
        }
    }
    /// Returns a lazy pulse sequence owning this file.
    pub fn into_pulses(self) -> PulseStream<'static> {
        match self {
            SoundFile::Tap(tap) => Box::new(tap.into_pulses()),
            SoundFile::Tzx(tzx) => Box::new(tzx.into_pulses()),
            SoundFile::Wav(wav) => Box::new(wav.into_pulses()),
        }
    }
}

impl FileRecord {
    pub fn kind(&self) -> FormatKind {
        match self {
            FileRecord::Snapshot(snap) => snap.kind(),
            FileRecord::Sound(sound) => sound.kind(),
            FileRecord::Recording(..) => FormatKind::Rzx,
        }
    }
}

/// Decodes `image` as a file of the given `kind`.
///
/// # Errors
/// Archives can't be decoded by this function and are reported as [FormatError::UnsupportedFeature].
pub fn parse_kind(kind: FormatKind, image: &[u8]) -> Result<FileRecord> {
    Ok(match kind {
        FormatKind::Z80 => FileRecord::Snapshot(SnapshotFile::Z80(Z80Snapshot::parse(image)?)),
        FormatKind::Scr => FileRecord::Snapshot(SnapshotFile::Scr(ScrSnapshot::parse(image)?)),
        FormatKind::Rzx => FileRecord::Recording(RzxFile::parse(image)?),
        FormatKind::Tap => FileRecord::Sound(SoundFile::Tap(TapFile::parse(image)?)),
        FormatKind::Tzx => FileRecord::Sound(SoundFile::Tzx(TzxFile::parse(image)?)),
        FormatKind::Wav => FileRecord::Sound(SoundFile::Wav(WavFile::parse(image)?)),
        FormatKind::Zip => return Err(FormatError::UnsupportedFeature("nested archive"))
    })
}

struct Candidate {
    name: String,
    kind: FormatKind,
    data: Vec<u8>,
}

fn collect_candidates(
        archive: FormatKind,
        path: &str,
        image: &[u8],
        depth: usize,
        candidates: &mut Vec<Candidate>
    ) -> Result<()>
{
    let members = match archive {
        FormatKind::Zip => crate::zip::read_files(image)?,
        _ => return Err(FormatError::UnsupportedFeature("archive format"))
    };
    for (name, data) in members {
        let full_name = if path.is_empty() { name } else { format!("{}/{}", path, name) };
        match detect_format(&data, extension_of(&full_name)) {
            Some(kind) if kind.is_archive() => {
                if depth + 1 >= MAX_ARCHIVE_DEPTH {
                    warn!("skipping archive nested too deep: {}", full_name);
                    continue
                }
                collect_candidates(kind, &full_name, &data, depth + 1, candidates)?;
            }
            Some(kind) => {
                debug!("archive member: {} ({})", full_name, kind);
                candidates.push(Candidate { name: full_name, kind, data });
            }
            None => debug!("ignoring archive member: {}", full_name)
        }
    }
    Ok(())
}

/// Decodes a file image, resolving its format from the signature and the `filename` extension.
///
/// Archives are unpacked recursively and must hold exactly one file of a known format.
///
/// # Errors
/// * [FormatError::UnknownFormat] if the format can't be determined.
/// * [FormatError::AmbiguousArchive] if an archive holds more than one file of a known format.
/// * [FormatError::NoKnownFormatInArchive] if an archive holds no file of a known format.
/// * Any error reported by the selected codec.
pub fn parse(filename: &str, image: &[u8]) -> Result<FileRecord> {
    parse_with_policy(filename, image, ArchivePolicy::default())
}

/// Decodes a file image just like [parse] does, selecting archive members with the given `policy`.
pub fn parse_with_policy(filename: &str, image: &[u8], policy: ArchivePolicy) -> Result<FileRecord> {
    let kind = detect_format(image, extension_of(filename))
               .ok_or_else(|| FormatError::UnknownFormat(filename.to_string()))?;
    debug!("{}: {}", filename, kind);
    if !kind.is_archive() {
        return parse_kind(kind, image)
    }
    let mut candidates = Vec::new();
    collect_candidates(kind, "", image, 0, &mut candidates)?;
    let selected = match policy {
        ArchivePolicy::ExactlyOne if candidates.len() > 1 => {
            return Err(FormatError::AmbiguousArchive {
                candidates: candidates.into_iter().map(|c| c.name).collect()
            })
        }
        _ => candidates.into_iter().next().ok_or(FormatError::NoKnownFormatInArchive)?
    };
    debug!("selected: {}", selected.name);
    parse_kind(selected.kind, &selected.data)
}

/// Encodes the `snapshot` as a **Z80** file image.
///
/// Version 3 is used if the snapshot holds the T-state counter, otherwise version 2.
pub fn make_snapshot(snapshot: &UnifiedSnapshot) -> Result<Vec<u8>> {
    let version = if snapshot.ticks_since_int.is_some() { Z80Version::V3 } else { Z80Version::V2 };
    make_z80(snapshot, version)
}

/// Encodes the `snapshot` as a **Z80** file image of the requested version.
pub fn make_z80(snapshot: &UnifiedSnapshot, version: Z80Version) -> Result<Vec<u8>> {
    save_z80(snapshot, version).map(|(_, image)| image)
}

/// Captures the live machine state of `creator` and encodes it as a **Z80** version 3 file image.
///
/// The T-state counter reported by the creator is used unless the captured snapshot holds one.
pub fn save_snapshot<C: SnapshotCreator + ?Sized>(creator: &C) -> Result<Vec<u8>> {
    let mut snapshot = creator.create_snapshot();
    if snapshot.ticks_since_int.is_none() {
        snapshot.ticks_since_int = Some(creator.interrupt_ticks());
    }
    debug!("saving snapshot, pc: {:04x}, ticks: {:?}", snapshot.pc, snapshot.ticks_since_int);
    make_z80(&snapshot, Z80Version::V3)
}
