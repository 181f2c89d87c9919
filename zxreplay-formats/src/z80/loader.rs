/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
use log::{debug, warn};

use zxreplay_core::snapshot::UnifiedSnapshot;

use crate::binary::{BinaryParser, Fields};
use crate::error::{FormatError, Result};

use super::Z80Snapshot;
use super::common::*;
use super::decompress::*;

fn pair(hi: u8, lo: u8) -> u16 {
    u16::from_be_bytes([hi, lo])
}

fn unified_from_header(head: &Fields<'_, Key>) -> Result<UnifiedSnapshot> {
    let flags1 = Flags1::from(head.u8(Key::Flags1));
    let flags2 = Flags2::from(head.u8(Key::Flags2));
    Ok(UnifiedSnapshot {
        af: pair(head.u8(Key::A), head.u8(Key::F)),
        bc: head.u16(Key::BC),
        de: head.u16(Key::DE),
        hl: head.u16(Key::HL),
        ix: head.u16(Key::IX),
        iy: head.u16(Key::IY),
        alt_af: pair(head.u8(Key::AAlt), head.u8(Key::FAlt)),
        alt_bc: head.u16(Key::BCAlt),
        alt_de: head.u16(Key::DEAlt),
        alt_hl: head.u16(Key::HLAlt),
        pc: head.u16(Key::PC),
        sp: head.u16(Key::SP),
        ir: pair(head.u8(Key::I), flags1.mix_r(head.u8(Key::R7))),
        iff1: head.u8(Key::Iff1) != 0,
        iff2: head.u8(Key::Iff2) != 0,
        int_mode: flags2.interrupt_mode()?,
        border: Some(flags1.border_color()),
        ..UnifiedSnapshot::default()
    })
}

/// Parses the version 2 header, returns `true` alongside it if more header bytes follow.
fn parse_header_v2<'a>(parser: &mut BinaryParser<'a>) -> Result<(Fields<'a, Key>, bool)> {
    let head = parser.parse(HEADER_V2)?;
    Ok((head, !parser.is_exhausted()))
}

/// Parses the version 3 header with the optional trailing port byte, returns `true`
/// alongside it if more header bytes follow.
fn parse_header_v3<'a>(parser: &mut BinaryParser<'a>) -> Result<(Fields<'a, Key>, Option<u8>, bool)> {
    let head = parser.parse(HEADER_V3)?;
    let port2 = if parser.is_exhausted() {
        None
    }
    else {
        Some(parser.read_u8()?)
    };
    Ok((head, port2, !parser.is_exhausted()))
}

fn load_memory_v1(data: &[u8], compressed: bool) -> Result<Vec<u8>> {
    if compressed {
        let data = match data.len().checked_sub(MEMORY_V1_TERM.len()) {
            Some(end) if &data[end..] == MEMORY_V1_TERM => &data[..end],
            _ => return Err(FormatError::CorruptedBlock("missing memory end marker"))
        };
        decompress_exact(data, RAM48_SIZE)
    }
    else if data.len() < RAM48_SIZE {
        Err(FormatError::truncated(HEADER_V1_SIZE, RAM48_SIZE, data.len()))
    }
    else if data.len() > RAM48_SIZE {
        Err(FormatError::MemoryImageTooLarge)
    }
    else {
        Ok(data.to_vec())
    }
}

fn load_memory_pages(parser: &mut BinaryParser<'_>, snap: &mut UnifiedSnapshot) -> Result<()> {
    while !parser.is_exhausted() {
        let length = parser.read_u16_le()?;
        let page = parser.read_u8()?;
        let data = if length == PAGE_UNCOMPRESSED {
            parser.read_block(PAGE_SIZE)?.to_vec()
        }
        else {
            let packed = parser.read_block(length as usize)?;
            decompress_exact(packed, PAGE_SIZE)?
        };
        match page_address(page) {
            Some(address) => {
                debug!("page: {} at 0x{:04x}, length: {}", page, address, length);
                snap.insert_memory(address, data)?;
            }
            None => warn!("skipping unsupported memory page: {}", page)
        }
    }
    Ok(())
}

/// Parses a **Z80** file image.
pub fn load_z80(image: &[u8]) -> Result<Z80Snapshot> {
    let mut parser = BinaryParser::new(image);
    let head = parser.parse(HEADER_V1)?;
    let flags1 = Flags1::from(head.u8(Key::Flags1));
    let mut snap = unified_from_header(&head)?;

    if snap.pc != 0 {
        debug!("version: 1, compressed: {}", flags1.is_mem_compressed());
        let ram = load_memory_v1(parser.read_rest(), flags1.is_mem_compressed())?;
        for (index, page) in ram.chunks(PAGE_SIZE).enumerate() {
            snap.insert_memory((PAGE_SIZE * (index + 1)) as u16, page.to_vec())?;
        }
        return Ok(Z80Snapshot { version: Z80Version::V1, hw_mode: 0, snapshot: snap })
    }

    let header_len = parser.read_u16_le()? as usize;
    let mut head_parser = BinaryParser::new(parser.read_block(header_len)?);
    let (head_v2, more) = parse_header_v2(&mut head_parser)?;
    let mut version = Z80Version::V2;
    snap.pc = head_v2.u16(Key::PCEx);
    let more = if more {
        version = Z80Version::V3;
        let (head_v3, port2, more) = parse_header_v3(&mut head_parser)?;
        let ts = z80_to_cycles(head_v3.u16(Key::TsLo), head_v3.u8(Key::TsHi));
        snap.ticks_since_int = Some(ts);
        if let Some(port2) = port2 {
            debug!("ignoring port 0x1ffd: {}", port2);
        }
        more
    }
    else {
        false
    };
    if more {
        return Err(FormatError::ExtraHeaderTooLarge(header_len))
    }

    let hw_mode = head_v2.u8(Key::HwMode);
    check_hw_mode(version, hw_mode, Flags3::from(head_v2.u8(Key::Flags3)))?;
    debug!("version: {:?}, header length: {}, hw mode: {}", version, header_len, hw_mode);

    load_memory_pages(&mut parser, &mut snap)?;
    Ok(Z80Snapshot { version, hw_mode, snapshot: snap })
}
