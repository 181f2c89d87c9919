/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
use core::convert::TryFrom;

use bitflags::bitflags;

use zxreplay_core::z80emu::InterruptMode;
use zxreplay_core::clock::{FTs, FRAME_TSTATES};
use zxreplay_core::video::BorderColor;

use crate::binary::Field;
use crate::error::{FormatError, Result};

pub const PAGE_SIZE: usize = 0x4000;
/// The size of the 48k RAM.
pub const RAM48_SIZE: usize = 3 * PAGE_SIZE;
/// The size of the version 1 header.
pub const HEADER_V1_SIZE: usize = 30;
/// The size of the version 2 extended header.
pub const HEADER_V2_SIZE: usize = 23;
/// The size of the version 3 extended header without the optional port byte.
pub const HEADER_V3_SIZE: usize = HEADER_V2_SIZE + 31;
/// A memory page length indicating the page is stored uncompressed.
pub const PAGE_UNCOMPRESSED: u16 = 0xFFFF;

pub const MEMORY_V1_TERM: &[u8] = &[0, 0xED, 0xED, 0];

/// Memory pages of the 48k machine and their addresses.
pub const PAGES_48K: &[(u8, u16)] = &[(0, 0x0000), (4, 0x8000), (5, 0xC000), (8, 0x4000)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Z80Version { V1, V2, V3 }

/// Keys of the **Z80** header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    A, F, BC, HL, PC, SP, I, R7, Flags1, DE, BCAlt, DEAlt, HLAlt, AAlt, FAlt, IY, IX, Iff1, Iff2, Flags2,
    // version 2, 3
    PCEx, HwMode, Port1, IfRom, Flags3, AySelReg, AyRegs,
    // version 3
    TsLo, TsHi, Flags4, MgtRom, MfRom, Fn1, Fn2, JoyBindings, JoyAscii, MgtType, Disciple1, Disciple2,
}

pub const HEADER_V1: &[(Field, Key)] = &[
    (Field::U8,    Key::A),
    (Field::U8,    Key::F),
    (Field::U16Le, Key::BC),
    (Field::U16Le, Key::HL),
    (Field::U16Le, Key::PC),
    (Field::U16Le, Key::SP),
    (Field::U8,    Key::I),
    (Field::U8,    Key::R7),
    (Field::U8,    Key::Flags1),
    (Field::U16Le, Key::DE),
    (Field::U16Le, Key::BCAlt),
    (Field::U16Le, Key::DEAlt),
    (Field::U16Le, Key::HLAlt),
    (Field::U8,    Key::AAlt),
    (Field::U8,    Key::FAlt),
    (Field::U16Le, Key::IY),
    (Field::U16Le, Key::IX),
    (Field::U8,    Key::Iff1),
    (Field::U8,    Key::Iff2),
    (Field::U8,    Key::Flags2)];

pub const HEADER_V2: &[(Field, Key)] = &[
    (Field::U16Le,     Key::PCEx),
    (Field::U8,        Key::HwMode),
    (Field::U8,        Key::Port1),
    (Field::U8,        Key::IfRom),
    (Field::U8,        Key::Flags3),
    (Field::U8,        Key::AySelReg),
    (Field::Block(16), Key::AyRegs)];

pub const HEADER_V3: &[(Field, Key)] = &[
    (Field::U16Le,     Key::TsLo),
    (Field::U8,        Key::TsHi),
    (Field::U8,        Key::Flags4),
    (Field::U8,        Key::MgtRom),
    (Field::U8,        Key::MfRom),
    (Field::U8,        Key::Fn1),
    (Field::U8,        Key::Fn2),
    (Field::Block(10), Key::JoyBindings),
    (Field::Block(10), Key::JoyAscii),
    (Field::U8,        Key::MgtType),
    (Field::U8,        Key::Disciple1),
    (Field::U8,        Key::Disciple2)];

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags1: u8 {
        const R_HIGH_BIT     = 0b0000_0001;
        const BORDER_COLOR   = 0b0000_1110;
        const BASIC_SAMROM   = 0b0001_0000;
        const MEM_COMPRESSED = 0b0010_0000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags2: u8 {
        const INTR_MODE0       = 0b0000_0000;
        const INTR_MODE1       = 0b0000_0001;
        const INTR_MODE2       = 0b0000_0010;
        const INTR_MODE_MASK   = 0b0000_0011;
        const ISSUE2_EMULATION = 0b0000_0100;
        const DOUBLE_INTERRUPT = 0b0000_1000;
        const VIDEO_SYNC       = 0b0011_0000;
        const JOYSTICK_MODEL   = 0b1100_0000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags3: u8 {
        const REG_R_EMU     = 0b0000_0001;
        const LDIR_EMU      = 0b0000_0010;
        const AY_SOUND_EMU  = 0b0000_0100;
        const AY_FULLER_BOX = 0b0100_0000;
        const ALT_HW_MODE   = 0b1000_0000;
    }
}

impl From<u8> for Flags1 {
    fn from(mut byte: u8) -> Self {
        if byte == u8::max_value() {
            byte = 1;
        }
        Flags1::from_bits_truncate(byte)
    }
}

impl Flags1 {
    pub fn with_border_color(self, border: BorderColor) -> Self {
        (self & !Flags1::BORDER_COLOR) | Flags1::from_bits_truncate(u8::from(border) << 1)
    }

    pub fn with_refresh_high_bit(mut self, r: u8) -> Self {
        self.set(Flags1::R_HIGH_BIT, (r & 0x80) != 0);
        self
    }

    pub fn border_color(self) -> BorderColor {
        BorderColor::from_bits_truncate((self & Flags1::BORDER_COLOR).bits() >> 1)
    }

    pub fn is_mem_compressed(self) -> bool {
        self.intersects(Flags1::MEM_COMPRESSED)
    }

    pub fn mix_r(self, r: u8) -> u8 {
        (r & 0x7F) | ((self & Flags1::R_HIGH_BIT).bits() << 7)
    }
}

impl From<u8> for Flags2 {
    fn from(byte: u8) -> Self {
        Flags2::from_bits_truncate(byte)
    }
}

impl Flags2 {
    pub fn with_interrupt_mode(self, im: InterruptMode) -> Self {
        (self & !Flags2::INTR_MODE_MASK) | match im {
            InterruptMode::Mode0 => Flags2::INTR_MODE0,
            InterruptMode::Mode1 => Flags2::INTR_MODE1,
            InterruptMode::Mode2 => Flags2::INTR_MODE2,
        }
    }

    pub fn interrupt_mode(self) -> Result<InterruptMode> {
        InterruptMode::try_from((self & Flags2::INTR_MODE_MASK).bits())
        .map_err(|_| FormatError::InvalidData("invalid interrupt mode"))
    }
}

impl From<u8> for Flags3 {
    fn from(byte: u8) -> Self {
        Flags3::from_bits_truncate(byte)
    }
}

impl Flags3 {
    pub fn is_alt_hw_mode(self) -> bool {
        self.intersects(Flags3::ALT_HW_MODE)
    }
}

/// Ensures the hardware mode describes a 48k machine.
///
/// Modes 0 (48k) and 1 (48k + Interface 1) are accepted in every version and
/// mode 3 (48k + MGT) only in version 3. Any machine modified by the alternate
/// hardware flag is rejected.
pub fn check_hw_mode(version: Z80Version, hw_mode: u8, flags3: Flags3) -> Result<()> {
    match (hw_mode, version) {
        _ if flags3.is_alt_hw_mode() => Err(FormatError::UnsupportedMachine { hw_mode }),
        (0, _)|(1, _)|(3, Z80Version::V3) => Ok(()),
        _ => Err(FormatError::UnsupportedMachine { hw_mode })
    }
}

/// Returns the address of the 48k memory page.
pub fn page_address(page: u8) -> Option<u16> {
    PAGES_48K.iter().find(|&&(p, _)| p == page).map(|&(_, address)| address)
}

/// Converts the **Z80** version 3 interrupt counter to T-states since the last interrupt.
pub fn z80_to_cycles(ts_lo: u16, ts_hi: u8) -> FTs {
    let total_ts = FRAME_TSTATES;
    let qts = total_ts / 4;
    let qcountdown = ts_lo as FTs;
    (((ts_hi as FTs + 1) % 4 + 1) * qts - (qcountdown + 1))
    .rem_euclid(total_ts)
}

/// Converts T-states since the last interrupt to the **Z80** version 3 interrupt counter.
pub fn cycles_to_z80(ts: FTs) -> (u16, u8) {
    let total_ts = FRAME_TSTATES;
    let qts = total_ts / 4;
    let ts_lo = (qts - (ts.rem_euclid(qts)) - 1) as u16;
    let ts_hi = (ts.rem_euclid(total_ts) / qts - 1).rem_euclid(4) as u8;
    (ts_lo, ts_hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::TryInto;

    #[test]
    fn z80_cycles_works() {
        let qts: u16 = (FRAME_TSTATES / 4).try_into().unwrap();
        for ts in 0..FRAME_TSTATES {
            let (lo, hi) = cycles_to_z80(ts);
            assert!((0..=3).contains(&hi));
            assert!((0..qts).contains(&lo));
            assert_eq!(z80_to_cycles(lo, hi), ts);
        }
        assert_eq!(cycles_to_z80(0), (qts - 1, 3));
    }

    #[test]
    fn flags1_works() {
        assert_eq!(Flags1::from(0xFF), Flags1::R_HIGH_BIT);
        let flags = Flags1::MEM_COMPRESSED
                    .with_border_color(BorderColor::MAGENTA)
                    .with_refresh_high_bit(0x80);
        assert_eq!(flags.bits(), 0b0010_0111);
        assert_eq!(flags.border_color(), BorderColor::MAGENTA);
        assert!(flags.is_mem_compressed());
        assert_eq!(flags.mix_r(0x7F), 0xFF);
        assert_eq!(Flags1::empty().mix_r(0xFF), 0x7F);
    }

    #[test]
    fn hw_mode_works() {
        use Z80Version::*;
        assert!(check_hw_mode(V1, 0, Flags3::empty()).is_ok());
        assert!(check_hw_mode(V2, 1, Flags3::empty()).is_ok());
        assert!(check_hw_mode(V3, 3, Flags3::empty()).is_ok());
        assert!(check_hw_mode(V2, 3, Flags3::empty()).is_err());
        assert!(check_hw_mode(V3, 4, Flags3::empty()).is_err());
        assert!(check_hw_mode(V3, 0, Flags3::ALT_HW_MODE).is_err());
        assert_eq!(page_address(8), Some(0x4000));
        assert_eq!(page_address(3), None);
    }
}
