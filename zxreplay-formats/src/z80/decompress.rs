/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
use memchr::memchr;

use crate::error::{FormatError, Result};

/// Returns the index of the next `ED ED` escape sequence in `data`.
fn find_escape(data: &[u8]) -> Option<usize> {
    let mut index = 0;
    while let Some(found) = memchr(0xED, &data[index..]) {
        let pos = index + found;
        if let Some(0xED) = data.get(pos + 1) {
            return Some(pos)
        }
        index = pos + 1;
    }
    None
}

/// Decompresses **Z80** run-length encoded `data` which must expand to exactly `expected` bytes.
///
/// A single `ED` not followed by another `ED` is a literal. An escape sequence cut short
/// by the end of data or an expanded size different from `expected` is reported as
/// [FormatError::CorruptedBlock].
pub fn decompress_exact(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected);
    let mut cursor = 0;
    while cursor < data.len() {
        let chunk = &data[cursor..];
        let literal = find_escape(chunk).unwrap_or_else(|| chunk.len());
        if out.len() + literal > expected {
            return Err(FormatError::CorruptedBlock("decompressed data too large"))
        }
        out.extend_from_slice(&chunk[..literal]);
        cursor += literal;
        if cursor == data.len() {
            break
        }
        match data.get(cursor..cursor + 4) {
            Some(&[_, _, count, fill]) => {
                let count = count as usize;
                if out.len() + count > expected {
                    return Err(FormatError::CorruptedBlock("decompressed data too large"))
                }
                out.resize(out.len() + count, fill);
                cursor += 4;
            }
            _ => return Err(FormatError::CorruptedBlock("truncated escape sequence"))
        }
    }
    if out.len() != expected {
        return Err(FormatError::CorruptedBlock("decompressed data too small"))
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use crate::z80::compress::compress;

    fn test_decompress(data: &[u8], expect: &[u8]) {
        assert_eq!(decompress_exact(data, expect.len()).unwrap(), expect);
        if !expect.is_empty() {
            assert!(decompress_exact(data, expect.len() - 1).is_err());
        }
        assert!(decompress_exact(data, expect.len() + 1).is_err());
    }

    #[test]
    fn decompress_works() {
        test_decompress(&[0xED,0xED,7,42,96,0xED,0xED,2,0xED], &[42,42,42,42,42,42,42,96,0xED,0xED]);
        test_decompress(&[69,0xED,0xED,0,0xED,0xED,0,0xED,0xED,4,0xED], &[69,0xED,0,0xED,0xED,0xED,0xED]);
        test_decompress(&[0,1,2,3,4,5,0xED], &[0,1,2,3,4,5,0xED]);
        test_decompress(&[0xED,0,1,2,3,4,5], &[0xED,0,1,2,3,4,5]);
        test_decompress(&[], &[]);
        test_decompress(&[0xED,0xED,2,0xED,0xED,1,0xED,2,0xED], &[0xED,0xED,0xED,1,0xED,2,0xED]);
    }

    #[test]
    fn decompress_detects_corruption() {
        for data in &[&[33u8,0xED,0xED][..], &[0xED,0xED,0xED], &[0xED,0xED], &[0,0xED,0xED,5]] {
            match decompress_exact(data, 100) {
                Err(FormatError::CorruptedBlock(..)) => {}
                res => panic!("unexpected: {:?}", res)
            }
        }
    }

    #[test]
    fn compress_decompress_works() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        for _ in 0..200 {
            let len = rng.gen_range(0..0x4000usize);
            let mut data = Vec::with_capacity(len);
            while data.len() < len {
                let byte = *[0u8, 0xED, 0xFF, rng.gen()].choose(&mut rng).unwrap();
                let run = rng.gen_range(1..300usize).min(len - data.len());
                data.extend(core::iter::repeat(byte).take(run));
            }
            let packed = compress(&data);
            assert_eq!(decompress_exact(&packed, data.len()).unwrap(), data);
        }
    }
}
