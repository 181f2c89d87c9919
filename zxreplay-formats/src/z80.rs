/*
    Copyright (C) 2020  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
//! **Z80** snapshot format utilities.
//!
//! See the specification reference on [World of Spectrum](https://worldofspectrum.org/faq/reference/z80format.htm).
//!
//! ## Implementation specifics
//!
//! When reading from the **Z80** file:
//!
//! * Only 48k machines are accepted: hardware modes 0 and 1 in every version and mode 3 in version 3.
//!   Any other mode or the alternate hardware flag results in [FormatError::UnsupportedMachine].
//! * Memory pages 8, 4 and 5 are loaded at 0x4000, 0x8000 and 0xC000, page 0 is loaded as ROM at 0x0000.
//!   Other pages, e.g. Interface 1 ROM, are skipped.
//! * AY registers, joystick settings and the port 0x1ffd byte are ignored.
//!
//! When writing to the **Z80** file:
//!
//! * The ROM is saved only in versions 2 and 3 and only if present in the snapshot.
//! * Memory is compressed with every `ED` byte escaped.
//!
//! [FormatError::UnsupportedMachine]: crate::FormatError::UnsupportedMachine
mod common;
mod compress;
mod decompress;
mod loader;
mod saver;

pub use common::{Z80Version, z80_to_cycles, cycles_to_z80, PAGE_SIZE};
pub use compress::{compress, compress_write_all};
pub use decompress::decompress_exact;
pub use loader::*;
pub use saver::*;

use zxreplay_core::snapshot::UnifiedSnapshot;

use crate::error::Result;

/// A decoded **Z80** snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct Z80Snapshot {
    pub version: Z80Version,
    /// The hardware mode byte, 0 for version 1 files.
    pub hw_mode: u8,
    pub snapshot: UnifiedSnapshot,
}

impl Z80Snapshot {
    /// Parses a **Z80** file image.
    pub fn parse(image: &[u8]) -> Result<Self> {
        load_z80(image)
    }

    pub fn to_unified(&self) -> UnifiedSnapshot {
        self.snapshot.clone()
    }

    pub fn into_unified(self) -> UnifiedSnapshot {
        self.snapshot
    }
    /// Encodes the snapshot back to the image of its version.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        save_z80(&self.snapshot, self.version).map(|(_, image)| image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use zxreplay_core::video::BorderColor;
    use zxreplay_core::z80emu::InterruptMode;
    use crate::error::FormatError;

    fn test_snapshot(rng: &mut StdRng) -> UnifiedSnapshot {
        let mut snap = UnifiedSnapshot {
            af: rng.gen(), bc: rng.gen(), de: rng.gen(), hl: rng.gen(),
            ix: rng.gen(), iy: rng.gen(),
            alt_af: rng.gen(), alt_bc: rng.gen(), alt_de: rng.gen(), alt_hl: rng.gen(),
            pc: rng.gen_range(1..=0xFFFF), sp: rng.gen(), ir: rng.gen(),
            iff1: rng.gen(), iff2: rng.gen(),
            int_mode: InterruptMode::Mode1,
            border: Some(BorderColor::BLUE),
            ..UnifiedSnapshot::default()
        };
        for address in (0x4000..=0xC000).step_by(PAGE_SIZE) {
            let mut page = vec![0u8;PAGE_SIZE];
            for chunk in page.chunks_mut(rng.gen_range(1..600)) {
                let byte = *[0u8, 0xED, rng.gen()].choose(rng).unwrap();
                chunk.iter_mut().for_each(|p| *p = byte);
            }
            snap.insert_memory(address as u16, page).unwrap();
        }
        snap
    }

    #[test]
    fn z80_round_trip_works() {
        let mut rng = StdRng::seed_from_u64(48);
        for &version in &[Z80Version::V1, Z80Version::V2, Z80Version::V3] {
            for ticks in &[None, Some(0), Some(1234), Some(69887)] {
                let mut snap = test_snapshot(&mut rng);
                if version == Z80Version::V3 {
                    snap.ticks_since_int = *ticks;
                }
                let (saved_ver, image) = save_z80(&snap, version).unwrap();
                assert_eq!(saved_ver, version);
                let z80 = Z80Snapshot::parse(&image).unwrap();
                assert_eq!(z80.version, version);
                if version == Z80Version::V3 && snap.ticks_since_int.is_none() {
                    snap.ticks_since_int = Some(0);
                }
                assert_eq!(z80.snapshot, snap);
            }
        }
    }

    #[test]
    fn z80_v1_pc_zero_saves_v2() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut snap = test_snapshot(&mut rng);
        snap.pc = 0;
        let (version, image) = save_z80(&snap, Z80Version::V1).unwrap();
        assert_eq!(version, Z80Version::V2);
        assert_eq!(&image[6..8], &[0, 0]);
        assert_eq!(u16::from_le_bytes([image[30], image[31]]), 23);
        assert_eq!(load_z80(&image).unwrap().snapshot, snap);
    }

    #[test]
    fn z80_rom_page_works() {
        let mut rng = StdRng::seed_from_u64(2);
        let snap = test_snapshot(&mut rng).with_memory(0, vec![0xF3;PAGE_SIZE]).unwrap();
        let (_, image) = save_z80(&snap, Z80Version::V3).unwrap();
        let z80 = load_z80(&image).unwrap();
        assert_eq!(z80.snapshot.memory.blocks()[0].address, 0);
        assert_eq!(z80.snapshot.memory.blocks().len(), 4);
        assert_eq!(z80.snapshot, UnifiedSnapshot { ticks_since_int: Some(0), ..snap });
    }

    fn v1_image(hl: u16, pc: u16) -> Vec<u8> {
        let mut image = vec![0u8;30];
        image[4..6].copy_from_slice(&hl.to_le_bytes());
        image[6..8].copy_from_slice(&pc.to_le_bytes());
        image[11] = 0x7F;
        image[12] = 0xFF;
        image[29] = 1;
        image
    }

    #[test]
    fn z80_v1_uncompressed_works() {
        let mut image = v1_image(0x1234, 0x0001);
        image.extend((0..0xC000).map(|n| (n >> 8) as u8));
        assert_eq!(image.len(), 49182);
        assert_eq!(&image[4..6], &0x1234u16.to_le_bytes());
        let z80 = load_z80(&image).unwrap();
        assert_eq!(z80.version, Z80Version::V1);
        let snap = z80.snapshot;
        assert_eq!(snap.hl, 0x1234);
        assert_eq!(snap.pc, 0x0001);
        assert_eq!(snap.r(), 0xFF);
        assert_eq!(snap.border, Some(BorderColor::BLACK));
        assert_eq!(snap.int_mode, InterruptMode::Mode1);
        assert_eq!(snap.ticks_since_int, None);
        assert_eq!(snap.index_pair, None);
        assert_eq!(snap.memory.blocks().len(), 3);
        assert_eq!(snap.memory.blocks()[1].address, 0x8000);
        assert_eq!(snap.memory.blocks()[1].data[0x100], 0x41);

        image.push(0);
        assert!(matches!(load_z80(&image), Err(FormatError::MemoryImageTooLarge)));
        image.truncate(49181);
        assert!(matches!(load_z80(&image), Err(FormatError::Truncated {..})));
        assert!(matches!(load_z80(&image[..29]), Err(FormatError::Truncated {..})));
    }

    #[test]
    fn z80_v1_compressed_checks_marker() {
        let mut image = v1_image(0, 0x8000);
        image[12] = 0x20;
        image.extend_from_slice(&[0xED, 0xED, 0xFF, 0, 0xED, 0xED, 0xFF, 0]);
        match load_z80(&image) {
            Err(FormatError::CorruptedBlock(..)) => {}
            res => panic!("unexpected: {:?}", res)
        }
        image.extend_from_slice(MEMORY_V1_TERM_BYTES);
        match load_z80(&image) {
            Err(FormatError::CorruptedBlock(..)) => {}
            res => panic!("unexpected: {:?}", res)
        }
        let mut image = v1_image(0, 0x8000);
        image[12] = 0x20;
        compress_write_all(&[7u8;0xC000], &mut image).unwrap();
        image.extend_from_slice(MEMORY_V1_TERM_BYTES);
        let snap = load_z80(&image).unwrap().snapshot;
        assert!(snap.memory.blocks().iter().all(|b| b.data.iter().all(|&b| b == 7)));
    }

    const MEMORY_V1_TERM_BYTES: &[u8] = &[0, 0xED, 0xED, 0];

    #[test]
    fn z80_checks_extended_header() {
        let mut rng = StdRng::seed_from_u64(3);
        let snap = test_snapshot(&mut rng);
        let (_, mut image) = save_z80(&UnifiedSnapshot { pc: 0x8000, ..snap }, Z80Version::V2).unwrap();
        // hardware mode 4 (128k in version 2)
        image[34] = 4;
        assert!(matches!(load_z80(&image), Err(FormatError::UnsupportedMachine { hw_mode: 4 })));
        image[34] = 1;
        assert!(load_z80(&image).is_ok());
        // alternate hardware flag
        image[37] = 0x80;
        assert!(matches!(load_z80(&image), Err(FormatError::UnsupportedMachine { hw_mode: 1 })));
        image[37] = 0;
        // extra header bytes after the version 3 header and the port byte
        let mut bad = image[..32].to_vec();
        bad[30] = 56;
        bad.extend_from_slice(&[0u8;56]);
        assert!(matches!(load_z80(&bad), Err(FormatError::ExtraHeaderTooLarge(56))));
        bad[30] = 55;
        bad.truncate(32 + 55);
        let z80 = load_z80(&bad).unwrap();
        assert_eq!(z80.version, Z80Version::V3);
        assert!(z80.snapshot.memory.blocks().is_empty());
    }
}
