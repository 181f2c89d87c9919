/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
/*! **SCR** file format utilities.

An **SCR** file is a flat dump of the screen memory:

|  size | description                                |
|-------|--------------------------------------------|
|  6144 | INK/PAPER bitmap found at address 0x4000.  |
|   768 | Screen attributes found at address 0x5800. |

Only the standard 6912 byte layout is recognized.
*/
use zxreplay_core::snapshot::UnifiedSnapshot;
use zxreplay_core::video::{SCREEN_ADDRESS, SCREEN_SIZE};

use crate::error::{FormatError, Result};

/// The screen memory dump.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScrSnapshot {
    screen: Vec<u8>
}

impl ScrSnapshot {
    /// Parses an **SCR** file image.
    ///
    /// # Errors
    /// Images shorter than 6912 bytes are reported as [FormatError::Truncated] and
    /// longer ones as [FormatError::MemoryImageTooLarge].
    pub fn parse(image: &[u8]) -> Result<Self> {
        if image.len() < SCREEN_SIZE {
            return Err(FormatError::truncated(0, SCREEN_SIZE, image.len()))
        }
        if image.len() > SCREEN_SIZE {
            return Err(FormatError::MemoryImageTooLarge)
        }
        Ok(ScrSnapshot { screen: image.to_vec() })
    }
    /// Copies the screen memory out of the `snapshot`. Missing bytes are left as zeroes.
    pub fn from_unified(snapshot: &UnifiedSnapshot) -> Self {
        let mut screen = vec![0u8;SCREEN_SIZE];
        snapshot.read_memory(SCREEN_ADDRESS as usize, &mut screen);
        ScrSnapshot { screen }
    }

    pub fn screen(&self) -> &[u8] {
        &self.screen
    }
    /// Returns a snapshot with only the screen memory populated.
    pub fn to_unified(&self) -> UnifiedSnapshot {
        let mut snap = UnifiedSnapshot::default();
        // a single block always fits in the empty map
        let _ = snap.insert_memory(SCREEN_ADDRESS, self.screen.clone());
        snap
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.screen.clone()
    }
}
