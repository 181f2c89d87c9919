/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
use std::io::{Write, Result};

const ESCAPE: u8 = 0xED;
const MIN_RUN: usize = 5;

/// Writes `data` compressed with the **Z80** run-length scheme.
///
/// Runs of at least 5 equal bytes are encoded as `ED ED count byte`. Every `ED` byte
/// is encoded as a run, regardless of its length, so a literal `ED` never appears in the output.
pub fn compress_write_all<W: Write>(data: &[u8], mut wr: W) -> Result<()> {
    let mut index = 0;
    let mut pos = 0;
    while let Some(&byte) = data.get(pos) {
        let count = data[pos..].iter()
                    .take(u8::max_value() as usize)
                    .take_while(|&&b| b == byte)
                    .count();
        if count >= MIN_RUN || byte == ESCAPE {
            if pos > index {
                wr.write_all(&data[index..pos])?;
            }
            wr.write_all(&[ESCAPE, ESCAPE, count as u8, byte])?;
            index = pos + count;
        }
        pos += count;
    }

    if index < data.len() {
        wr.write_all(&data[index..])?;
    }
    Ok(())
}

/// Returns `data` compressed with the **Z80** run-length scheme.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len());
    // writing to a Vec never fails
    let _ = compress_write_all(data, &mut buf);
    buf
}
