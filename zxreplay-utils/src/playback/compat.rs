/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
//! Known quirks of tools creating input recordings.
use core::fmt;
use core::str::FromStr;

use bitflags::bitflags;
#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use zxreplay_formats::rzx::CreatorInfo;

bitflags! {
    /// Deviations of a recording tool from the reference replay behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Quirks: u8 {
        /// Instructions of the ROM tape saving routine are skipped by the recorder
        /// and should be skipped when replaying.
        const SKIP_ROM_TAPE_SAVE       = 0b01;
        /// The instruction fetch counter is not updated after the last input of a frame.
        const NO_FETCH_UPDATE_AFTER_INPUT = 0b10;
    }
}

impl Default for Quirks {
    fn default() -> Self {
        Quirks::empty()
    }
}

/// A named set of [Quirks].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CompatProfile {
    pub name: &'static str,
    pub quirks: Quirks,
}

impl CompatProfile {
    /// The profile with no quirks.
    pub const NEUTRAL: CompatProfile = CompatProfile { name: "neutral", quirks: Quirks::empty() };
    pub const SPIN: CompatProfile = CompatProfile {
        name: "SPIN", quirks: Quirks::SKIP_ROM_TAPE_SAVE
    };
    pub const REAL_SPECTRUM: CompatProfile = CompatProfile {
        name: "RealSpectrum", quirks: Quirks::NO_FETCH_UPDATE_AFTER_INPUT
    };
    /// Returns all the known profiles of recording tools.
    pub fn known() -> &'static [CompatProfile] {
        &KNOWN_PROFILES
    }
    /// Finds the profile of the tool with the given `creator` name.
    ///
    /// The name is matched by prefix, ignoring case, so versioned names are recognized too.
    pub fn for_creator(creator: &str) -> Option<CompatProfile> {
        let creator = creator.trim().to_ascii_lowercase();
        KNOWN_PROFILES.iter().copied().find(|profile| {
            creator.starts_with(&profile.name.to_ascii_lowercase())
        })
    }
    /// Returns the profile of the `info` creator or the neutral profile if the creator is unknown.
    pub fn from_creator_info(info: Option<&CreatorInfo>) -> CompatProfile {
        info.and_then(|info| Self::for_creator(&info.name)).unwrap_or(CompatProfile::NEUTRAL)
    }

    pub fn skips_rom_tape_save(&self) -> bool {
        self.quirks.contains(Quirks::SKIP_ROM_TAPE_SAVE)
    }

    pub fn updates_fetch_after_input(&self) -> bool {
        !self.quirks.contains(Quirks::NO_FETCH_UPDATE_AFTER_INPUT)
    }
}

static KNOWN_PROFILES: [CompatProfile;2] = [CompatProfile::SPIN, CompatProfile::REAL_SPECTRUM];

impl Default for CompatProfile {
    fn default() -> Self {
        CompatProfile::NEUTRAL
    }
}

impl fmt::Display for CompatProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Determines which [CompatProfile] is used for a playback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub enum CompatSelect {
    /// The profile is selected by the creator of the recording.
    Auto,
    /// No quirks are applied.
    Neutral,
    Spin,
    RealSpectrum,
}

impl Default for CompatSelect {
    fn default() -> Self {
        CompatSelect::Auto
    }
}

impl CompatSelect {
    /// Resolves the profile for a recording made by the `info` creator.
    pub fn resolve(self, info: Option<&CreatorInfo>) -> CompatProfile {
        match self {
            CompatSelect::Auto => CompatProfile::from_creator_info(info),
            CompatSelect::Neutral => CompatProfile::NEUTRAL,
            CompatSelect::Spin => CompatProfile::SPIN,
            CompatSelect::RealSpectrum => CompatProfile::REAL_SPECTRUM,
        }
    }
}

impl From<CompatSelect> for &str {
    fn from(select: CompatSelect) -> Self {
        match select {
            CompatSelect::Auto         => "Auto",
            CompatSelect::Neutral      => "Neutral",
            CompatSelect::Spin         => "SPIN",
            CompatSelect::RealSpectrum => "RealSpectrum",
        }
    }
}

impl fmt::Display for CompatSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <&str>::from(*self).fmt(f)
    }
}

impl FromStr for CompatSelect {
    type Err = &'static str;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        if name.eq_ignore_ascii_case("auto") {
            Ok(CompatSelect::Auto)
        }
        else if name.eq_ignore_ascii_case("neutral") || name.eq_ignore_ascii_case("none") {
            Ok(CompatSelect::Neutral)
        }
        else if name.eq_ignore_ascii_case("spin") {
            Ok(CompatSelect::Spin)
        }
        else if name.eq_ignore_ascii_case("realspectrum") {
            Ok(CompatSelect::RealSpectrum)
        }
        else {
            Err("Unrecognized compatibility profile")
        }
    }
}
