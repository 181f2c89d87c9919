/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
use std::io::Read;

use flate2::read::ZlibDecoder;
use log::{debug, warn};

use crate::binary::BinaryParser;
use crate::error::{FormatError, Result};
use crate::registry::FormatKind;

use super::*;

const CREATOR_NAME_SIZE: usize = 20;
const CREATOR_FIXED_SIZE: u32 = 24;
const SNAPSHOT_FIXED_SIZE: u32 = 12;
const INPUT_FIXED_SIZE: u32 = 13;

const SNAPSHOT_EXTERNAL: u32 = 1;
const SNAPSHOT_COMPRESSED: u32 = 2;
const INPUT_PROTECTED: u32 = 1;
const INPUT_COMPRESSED: u32 = 2;
// fetch counter, sample counter and the largest recorded sample run
const MAX_FRAME_SIZE: usize = 4 + REPEAT_SAMPLES as usize - 1;

/// Inflates at most `limit + 1` bytes, so the caller can tell an oversized stream apart.
fn inflate(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(limit.min(data.len().saturating_mul(4)));
    ZlibDecoder::new(data)
        .take((limit as u64).saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|err| {
            debug!("zlib: {}", err);
            FormatError::CorruptedBlock("invalid zlib stream")
        })?;
    Ok(out)
}

fn nul_terminated(bytes: &[u8]) -> &[u8] {
    match memchr::memchr(0, bytes) {
        Some(end) => &bytes[..end],
        None => bytes
    }
}

fn check_length(id: u8, length: u32, fixed: u32) -> Result<()> {
    if length < BLOCK_HEADER_SIZE + fixed {
        return Err(FormatError::MalformedBlockLength { id, length })
    }
    Ok(())
}

fn read_creator(payload: &[u8]) -> Result<CreatorInfo> {
    let mut parser = BinaryParser::new(payload);
    let name = nul_terminated(parser.read_block(CREATOR_NAME_SIZE)?);
    let major = parser.read_u16_le()?;
    let minor = parser.read_u16_le()?;
    Ok(CreatorInfo {
        name: String::from_utf8_lossy(name).into_owned(),
        major, minor,
        custom: parser.read_rest().to_vec()
    })
}

fn read_snapshot(payload: &[u8]) -> Result<SnapshotChunk> {
    let mut parser = BinaryParser::new(payload);
    let flags = parser.read_u32_le()?;
    let extension = nul_terminated(parser.read_block(4)?);
    let size = parser.read_u32_le()? as usize;
    if flags & SNAPSHOT_EXTERNAL != 0 {
        return Err(FormatError::UnsupportedFeature("external snapshot descriptor"))
    }
    let data = parser.read_rest();
    let image = if flags & SNAPSHOT_COMPRESSED != 0 {
        inflate(data, size)?
    }
    else {
        data.to_vec()
    };
    if image.len() != size {
        return Err(FormatError::CorruptedBlock("snapshot size mismatch"))
    }
    let extension = String::from_utf8_lossy(extension).to_ascii_lowercase();
    debug!("snapshot: {}, size: {}", extension, size);
    Ok(SnapshotChunk { extension, image })
}

fn read_frames(data: &[u8], count: u32) -> Result<Vec<Frame>> {
    let mut parser = BinaryParser::new(data);
    let mut frames = Vec::with_capacity(count.min(0x10000) as usize);
    for index in 0..count {
        let fetch_count = parser.read_u16_le()?;
        let samples = match parser.read_u16_le()? {
            REPEAT_SAMPLES => FrameSamples::Repeat,
            n => FrameSamples::Recorded(parser.read_block(n as usize)?.to_vec())
        };
        if fetch_count == 0 {
            warn!("dropping frame {} with no instruction fetches", index);
            continue
        }
        frames.push(Frame { fetch_count, samples });
    }
    if !parser.is_exhausted() {
        warn!("ignoring {} bytes after the last frame", parser.remaining());
    }
    Ok(frames)
}

fn read_input(payload: &[u8]) -> Result<PortSamples> {
    let mut parser = BinaryParser::new(payload);
    let count = parser.read_u32_le()?;
    let _reserved = parser.read_u8()?;
    let first_tick = parser.read_u32_le()?;
    let flags = parser.read_u32_le()?;
    if flags & INPUT_PROTECTED != 0 {
        return Err(FormatError::UnsupportedFeature("protected input recording"))
    }
    let data = parser.read_rest();
    let frames = if flags & INPUT_COMPRESSED != 0 {
        let limit = (count as usize).saturating_mul(MAX_FRAME_SIZE);
        let frames = inflate(data, limit)?;
        if frames.len() > limit {
            return Err(FormatError::CorruptedBlock("input recording exceeds the declared frames"))
        }
        read_frames(&frames, count)?
    }
    else {
        read_frames(data, count)?
    };
    debug!("input recording: {} frames, first tick: {}", frames.len(), first_tick);
    Ok(PortSamples { first_tick, frames })
}

/// Parses an **RZX** file image.
pub fn load_rzx(image: &[u8]) -> Result<RzxFile> {
    let mut parser = BinaryParser::new(image);
    if parser.read_block(RZX_SIGNATURE.len())? != RZX_SIGNATURE {
        return Err(FormatError::BadSignature(FormatKind::Rzx))
    }
    let major = parser.read_u8()?;
    let minor = parser.read_u8()?;
    let flags = parser.read_u32_le()?;
    debug!("RZX version: {}.{}, flags: {:08x}", major, minor, flags);

    let mut chunks = Vec::new();
    while !parser.is_exhausted() {
        let id = parser.read_u8()?;
        let length = parser.read_u32_le()?;
        let fixed = match id {
            CREATOR_BLOCK_ID => CREATOR_FIXED_SIZE,
            SNAPSHOT_BLOCK_ID => SNAPSHOT_FIXED_SIZE,
            INPUT_BLOCK_ID => INPUT_FIXED_SIZE,
            id => return Err(FormatError::UnsupportedBlock { kind: FormatKind::Rzx, id })
        };
        check_length(id, length, 0)?;
        let payload = parser.read_block((length - BLOCK_HEADER_SIZE) as usize)?;
        check_length(id, length, fixed)?;
        let chunk = match id {
            CREATOR_BLOCK_ID => RzxChunk::Info(read_creator(payload)?),
            SNAPSHOT_BLOCK_ID => RzxChunk::Snapshot(read_snapshot(payload)?),
            _ => RzxChunk::PortSamples(read_input(payload)?)
        };
        chunks.push(chunk);
    }
    Ok(RzxFile { major, minor, flags, chunks })
}
