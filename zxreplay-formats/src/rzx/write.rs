/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
use log::debug;

use crate::binary::BinaryWriter;

use super::*;

fn write_padded(wr: &mut BinaryWriter, bytes: &[u8], size: usize) {
    let len = bytes.len().min(size);
    wr.write_bytes(&bytes[..len]);
    for _ in len..size {
        wr.write_u8(0);
    }
}

fn write_block(wr: &mut BinaryWriter, id: u8, payload: BinaryWriter) {
    wr.write_u8(id);
    wr.write_u32_le(BLOCK_HEADER_SIZE + payload.len() as u32);
    wr.write_bytes(&payload.finalize());
}

fn creator_payload(info: &CreatorInfo) -> BinaryWriter {
    let mut wr = BinaryWriter::new();
    write_padded(&mut wr, info.name.as_bytes(), 20);
    wr.write_u16_le(info.major);
    wr.write_u16_le(info.minor);
    wr.write_bytes(&info.custom);
    wr
}

fn snapshot_payload(snapshot: &SnapshotChunk) -> BinaryWriter {
    let mut wr = BinaryWriter::new();
    wr.write_u32_le(0);
    write_padded(&mut wr, snapshot.extension.as_bytes(), 4);
    wr.write_u32_le(snapshot.image.len() as u32);
    wr.write_bytes(&snapshot.image);
    wr
}

fn input_payload(samples: &PortSamples) -> BinaryWriter {
    let mut wr = BinaryWriter::new();
    wr.write_u32_le(samples.frames.len() as u32);
    wr.write_u8(0);
    wr.write_u32_le(samples.first_tick);
    wr.write_u32_le(0);
    for frame in samples.frames.iter() {
        wr.write_u16_le(frame.fetch_count);
        match &frame.samples {
            FrameSamples::Recorded(data) => {
                assert!(data.len() < REPEAT_SAMPLES as usize,
                        "too many samples in a single frame: {}", data.len());
                wr.write_u16_le(data.len() as u16);
                wr.write_bytes(data);
            }
            FrameSamples::Repeat => wr.write_u16_le(REPEAT_SAMPLES)
        }
    }
    wr
}

/// Encodes `rzx` as an **RZX** file image with uncompressed blocks.
///
/// Creator names longer than 20 bytes and snapshot extensions longer than 4 bytes are truncated.
///
/// # Panics
/// Panics if a recorded frame holds `0xFFFF` or more samples.
pub fn save_rzx(rzx: &RzxFile) -> Vec<u8> {
    let mut wr = BinaryWriter::new();
    wr.write_bytes(RZX_SIGNATURE);
    wr.write_u8(rzx.major);
    wr.write_u8(rzx.minor);
    wr.write_u32_le(rzx.flags);
    for chunk in rzx.chunks.iter() {
        match chunk {
            RzxChunk::Info(info) => write_block(&mut wr, CREATOR_BLOCK_ID, creator_payload(info)),
            RzxChunk::Snapshot(snap) => write_block(&mut wr, SNAPSHOT_BLOCK_ID, snapshot_payload(snap)),
            RzxChunk::PortSamples(samples) => write_block(&mut wr, INPUT_BLOCK_ID, input_payload(samples)),
        }
    }
    debug!("saved RZX: {} chunks, size: {}", rzx.chunks.len(), wr.len());
    wr.finalize()
}
