/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
/*! **TAP** file format utilities.

# TAP format

A **TAP** file is a sequence of blocks, each prefixed with a 16-bit little-endian length:

| offset | size | description                            |
|--------|------|----------------------------------------|
|    0   |   2  | block length: N                        |
|    2   |   N  | block data: flag, payload and checksum |

The first byte of the block data is a flag. Blocks with the flag less than 128 are headers
and get a longer lead tone when converted to pulses. The last byte is a checksum: the XOR
of all preceding bytes of the block.

# Pulses

[TapFile::pulses] and [TapFile::into_pulses] convert blocks to the signal produced by the
ROM saving routine: a lead tone, two sync pulses, two pulses per each bit and a terminating
pulse. Blocks are separated by a one second pause at the low level. The signal level of each
block starts high and flips on every pulse.
*/
use core::borrow::Borrow;
use core::fmt;
use std::borrow::Cow;

use log::{debug, warn};

use zxreplay_core::pulse::{EndTagged, Pulse, PulseTags};

use crate::binary::{BinaryParser, BinaryWriter};
use crate::error::Result;

pub mod pulse;

use pulse::{DataEncoder, consts::PAUSE_PULSE_LENGTH};

/// The size of a header block data including the flag and the checksum bytes.
pub const HEADER_SIZE: usize = 19;
const HEADER_FLAG: u8 = 0x00;

/// A parsed **TAP** file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TapFile {
    pub blocks: Vec<TapBlock>,
}

/// A single **TAP** block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TapBlock {
    /// The block data including the flag and the checksum bytes.
    pub data: Vec<u8>,
}

/// Computes the XOR checksum of `bytes`.
pub fn checksum<I: IntoIterator<Item=B>, B: Borrow<u8>>(iter: I) -> u8 {
    iter.into_iter().fold(0, |acc, x| acc ^ x.borrow())
}

impl TapBlock {
    /// Creates a block from the flag and payload, appending the checksum.
    pub fn new(flag: u8, payload: &[u8]) -> Self {
        let mut data = Vec::with_capacity(payload.len() + 2);
        data.push(flag);
        data.extend_from_slice(payload);
        data.push(checksum(&data));
        TapBlock { data }
    }

    pub fn flag(&self) -> Option<u8> {
        self.data.first().copied()
    }
    /// Returns `true` if this block looks like a header block.
    pub fn is_header(&self) -> bool {
        self.data.len() == HEADER_SIZE && self.data[0] == HEADER_FLAG
    }
    /// Returns `true` if the checksum of this block is valid.
    pub fn is_valid(&self) -> bool {
        !self.data.is_empty() && checksum(&self.data) == 0
    }
    /// Returns the file name of the header block.
    pub fn name(&self) -> Option<Cow<'_, str>> {
        if self.is_header() {
            Some(String::from_utf8_lossy(&self.data[2..12]))
        }
        else {
            None
        }
    }
}

impl fmt::Display for TapBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => {
                let kind = match self.data[1] {
                    0 => "Program",
                    1 => "Number array",
                    2 => "Character array",
                    3 => "Bytes",
                    _ => "Unknown"
                };
                let length = u16::from_le_bytes([self.data[12], self.data[13]]);
                write!(f, "{}: \"{}\" {}", kind, name.trim_end(), length)
            }
            None if self.data.is_empty() => write!(f, "(empty)"),
            None => write!(f, "(data {})", self.data.len())
        }
    }
}

impl From<Vec<u8>> for TapBlock {
    fn from(data: Vec<u8>) -> Self {
        TapBlock { data }
    }
}

impl TapFile {
    /// Parses a **TAP** file image.
    ///
    /// # Errors
    /// [FormatError::Truncated][crate::FormatError::Truncated] is returned if the block length
    /// exceeds the remaining data.
    pub fn parse(image: &[u8]) -> Result<Self> {
        let mut parser = BinaryParser::new(image);
        let mut blocks = Vec::new();
        while !parser.is_exhausted() {
            let length = parser.read_u16_le()?;
            let data = parser.read_block(length as usize)?;
            if data.is_empty() {
                warn!("skipping an empty block");
                continue
            }
            let block = TapBlock::from(data.to_vec());
            if !block.is_valid() {
                warn!("block {} has an invalid checksum", blocks.len());
            }
            debug!("TAP block: {}", block);
            blocks.push(block);
        }
        Ok(TapFile { blocks })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut wr = BinaryWriter::new();
        for block in self.blocks.iter() {
            wr.write_u16_le(block.data.len() as u16);
            wr.write_bytes(&block.data);
        }
        wr.finalize()
    }

    pub fn with_block<B: Into<TapBlock>>(mut self, block: B) -> Self {
        self.blocks.push(block.into());
        self
    }
    /// Returns a lazy pulse sequence borrowing this file.
    pub fn pulses(&self) -> TapPulses<&TapFile> {
        EndTagged::new(TapPulseIter::new(self))
    }
    /// Returns a lazy pulse sequence owning this file.
    pub fn into_pulses(self) -> TapPulses<TapFile> {
        EndTagged::new(TapPulseIter::new(self))
    }
}

/// The pulse sequence of a **TAP** file with the last pulse tagged.
pub type TapPulses<F> = EndTagged<TapPulseIter<F>>;

/// Encodes blocks of the borrowed [TapFile] as pulses.
#[derive(Clone, Debug)]
pub struct TapPulseIter<F> {
    file: F,
    block: usize,
    encoder: DataEncoder,
    level: bool,
    pause: bool,
}

impl<F: Borrow<TapFile>> TapPulseIter<F> {
    pub fn new(file: F) -> Self {
        let encoder = DataEncoder::standard(
            file.borrow().blocks.first().map(|b| &b.data[..]).unwrap_or(&[]));
        TapPulseIter { file, block: 0, encoder, level: true, pause: false }
    }
    /// Returns the index of the currently encoded block.
    pub fn block_index(&self) -> usize {
        self.block
    }

    pub fn into_inner(self) -> F {
        self.file
    }
}

impl<F: Borrow<TapFile>> Iterator for TapPulseIter<F> {
    type Item = Pulse;

    fn next(&mut self) -> Option<Pulse> {
        let blocks = &self.file.borrow().blocks;
        loop {
            let block = blocks.get(self.block)?;
            if self.pause {
                self.pause = false;
                self.block += 1;
                if let Some(next) = blocks.get(self.block) {
                    self.encoder = DataEncoder::standard(&next.data);
                }
                self.level = true;
                return Some(Pulse::new(false, PAUSE_PULSE_LENGTH, PulseTags::PAUSE))
            }
            match self.encoder.next_pulse(&block.data) {
                Some((duration, tags)) => {
                    let level = self.level;
                    self.level = !level;
                    return Some(Pulse::new(level, duration, tags))
                }
                None if self.block + 1 < blocks.len() => self.pause = true,
                None => self.block += 1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::pulse::consts::*;

    #[test]
    fn tap_parse_works() {
        let header = TapBlock::new(0, b"\x03hello     \x03\x00\x00\x80\x00\x80");
        assert!(header.is_header());
        assert!(header.is_valid());
        assert_eq!(header.to_string(), "Bytes: \"hello\" 3");
        let data = TapBlock::new(0xFF, &[1, 2, 3]);
        assert_eq!(data.to_string(), "(data 5)");
        let tap = TapFile::default().with_block(header).with_block(data);
        let image = tap.to_bytes();
        assert_eq!(&image[..2], &[19, 0]);
        assert_eq!(TapFile::parse(&image).unwrap(), tap);
        assert!(TapFile::parse(&image[..image.len() - 1]).unwrap_err().is_truncated());
        assert!(TapFile::parse(&[5]).unwrap_err().is_truncated());
        assert!(TapFile::parse(&[]).unwrap().blocks.is_empty());
    }

    #[test]
    fn tap_three_byte_block_pulses_work() {
        let tap = TapFile::parse(&[3, 0, 0xFF, 0x55, 0xAA]).unwrap();
        let pulses: Vec<_> = tap.pulses().collect();
        assert!(!pulses.is_empty());
        assert_eq!(pulses.len(), LEAD_PULSES_DATA as usize + 2 + 3*16 + 1);
        let last = pulses.last().unwrap();
        assert!(last.is_end());
        assert_eq!(last.duration, TAIL_PULSE_LENGTH);
        assert_eq!(pulses.iter().filter(|p| p.is_end()).count(), 1);
        assert!(pulses[0].level);
        assert!(pulses.windows(2).all(|w| w[0].level != w[1].level));
        assert_eq!(tap.into_pulses().count(), pulses.len());
    }

    #[test]
    fn tap_pause_separates_blocks() {
        let tap = TapFile::default()
            .with_block(TapBlock::new(0, &[]))
            .with_block(TapBlock::new(0xFF, &[]));
        let first = LEAD_PULSES_HEAD as usize + 2 + 2*16 + 1;
        let second = LEAD_PULSES_DATA as usize + 2 + 2*16 + 1;
        let pulses: Vec<_> = tap.pulses().collect();
        assert_eq!(pulses.len(), first + 1 + second);
        let pause = pulses[first];
        assert_eq!(pause, Pulse::new(false, PAUSE_PULSE_LENGTH, PulseTags::PAUSE));
        assert!(pulses[first + 1].level);
        assert_eq!(pulses[first + 1].tags, PulseTags::PILOT);
        assert!(pulses.last().unwrap().is_end());
        assert!(!pulses.iter().any(|p| p.tags.contains(PulseTags::PAUSE) && p.is_end()));
        assert_eq!(TapFile::default().pulses().next(), None);
    }
}
