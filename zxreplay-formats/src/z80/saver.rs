/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
use log::{debug, warn};

use zxreplay_core::snapshot::UnifiedSnapshot;

use crate::binary::{BinaryWriter, Fields, Value};
use crate::error::Result;

use super::common::*;
use super::compress::*;

fn init_z80_header(snap: &UnifiedSnapshot, version: Z80Version) -> Fields<'static, Key> {
    let r = snap.r();
    let flags1 = if version == Z80Version::V1 {
        Flags1::MEM_COMPRESSED
    }
    else {
        Flags1::empty()
    }
    .with_border_color(snap.border.unwrap_or_default())
    .with_refresh_high_bit(r);
    let flags2 = Flags2::empty().with_interrupt_mode(snap.int_mode);

    let [a, f] = snap.af.to_be_bytes();
    let [a_alt, f_alt] = snap.alt_af.to_be_bytes();
    Fields::new()
        .with(Key::A, Value::U8(a))
        .with(Key::F, Value::U8(f))
        .with(Key::BC, Value::U16(snap.bc))
        .with(Key::HL, Value::U16(snap.hl))
        .with(Key::PC, Value::U16(if version == Z80Version::V1 { snap.pc } else { 0 }))
        .with(Key::SP, Value::U16(snap.sp))
        .with(Key::I, Value::U8(snap.i()))
        .with(Key::R7, Value::U8(r & 0x7F))
        .with(Key::Flags1, Value::U8(flags1.bits()))
        .with(Key::DE, Value::U16(snap.de))
        .with(Key::BCAlt, Value::U16(snap.alt_bc))
        .with(Key::DEAlt, Value::U16(snap.alt_de))
        .with(Key::HLAlt, Value::U16(snap.alt_hl))
        .with(Key::AAlt, Value::U8(a_alt))
        .with(Key::FAlt, Value::U8(f_alt))
        .with(Key::IY, Value::U16(snap.iy))
        .with(Key::IX, Value::U16(snap.ix))
        .with(Key::Iff1, Value::U8(if snap.iff1 { !0 } else { 0 }))
        .with(Key::Iff2, Value::U8(if snap.iff2 { !0 } else { 0 }))
        .with(Key::Flags2, Value::U8(flags2.bits()))
}

const ZERO16: [u8;16] = [0;16];
const ZERO10: [u8;10] = [0;10];

fn init_z80_header_ex(snap: &UnifiedSnapshot) -> Fields<'static, Key> {
    Fields::new()
        .with(Key::PCEx, Value::U16(snap.pc))
        .with(Key::HwMode, Value::U8(0))
        .with(Key::Port1, Value::U8(0))
        .with(Key::IfRom, Value::U8(0))
        .with(Key::Flags3, Value::U8(0))
        .with(Key::AySelReg, Value::U8(0))
        .with(Key::AyRegs, Value::Block(&ZERO16))
}

fn init_z80_header_v3(snap: &UnifiedSnapshot) -> Fields<'static, Key> {
    let (ts_lo, ts_hi) = cycles_to_z80(snap.ticks_since_int.unwrap_or(0));
    let mut head = Fields::new()
        .with(Key::TsLo, Value::U16(ts_lo))
        .with(Key::TsHi, Value::U8(ts_hi))
        .with(Key::JoyBindings, Value::Block(&ZERO10))
        .with(Key::JoyAscii, Value::Block(&ZERO10));
    for &key in &[Key::Flags4, Key::MgtRom, Key::MfRom, Key::Fn1, Key::Fn2,
                  Key::MgtType, Key::Disciple1, Key::Disciple2] {
        head.insert(key, Value::U8(0));
    }
    head
}

fn save_memory_page(wr: &mut BinaryWriter, page: u8, data: &[u8]) {
    let packed = compress(data);
    if packed.len() < PAGE_SIZE {
        wr.write_u16_le(packed.len() as u16);
        wr.write_u8(page);
        wr.write_bytes(&packed);
    }
    else {
        wr.write_u16_le(PAGE_UNCOMPRESSED);
        wr.write_u8(page);
        wr.write_bytes(data);
    }
}

/// Encodes `snap` as a **Z80** file image of the given `version`.
///
/// A version 1 snapshot with `pc` equal to 0 can not be represented and is saved as version 2.
/// Version 1 files always store the 48k RAM compressed. Pages of later versions are stored
/// compressed unless compression does not reduce their size. The ROM page is stored only if
/// the snapshot holds memory below 0x4000.
///
/// Returns the version actually used with the image.
pub fn save_z80(snap: &UnifiedSnapshot, mut version: Z80Version) -> Result<(Z80Version, Vec<u8>)> {
    if version == Z80Version::V1 && snap.pc == 0 {
        debug!("pc is 0, saving as version 2");
        version = Z80Version::V2;
    }
    let mut wr = BinaryWriter::new();
    wr.write(HEADER_V1, &init_z80_header(snap, version));

    if version == Z80Version::V1 {
        let mut rom = [0u8;PAGE_SIZE];
        if snap.read_memory(0, &mut rom) {
            warn!("version 1 can not store ROM, memory below 0x4000 is not saved");
        }
        let mut ram = vec![0u8;RAM48_SIZE];
        snap.read_memory(PAGE_SIZE, &mut ram);
        compress_write_all(&ram, &mut wr)?;
        wr.write_bytes(MEMORY_V1_TERM);
        return Ok((version, wr.finalize()))
    }

    let header_len = if version == Z80Version::V3 { HEADER_V3_SIZE } else { HEADER_V2_SIZE };
    wr.write_u16_le(header_len as u16);
    wr.write(HEADER_V2, &init_z80_header_ex(snap));
    if version == Z80Version::V3 {
        wr.write(HEADER_V3, &init_z80_header_v3(snap));
    }

    let mut data = vec![0u8;PAGE_SIZE];
    for &(page, address) in PAGES_48K.iter() {
        data.iter_mut().for_each(|p| *p = 0);
        if snap.read_memory(address as usize, &mut data) || page != 0 {
            save_memory_page(&mut wr, page, &data);
        }
    }
    debug!("saved version: {:?}, size: {}", version, wr.len());
    Ok((version, wr.finalize()))
}
