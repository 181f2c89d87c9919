/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
/*! **RZX** input recording format utilities.

See the specification reference on [RAMSOFT's site](https://ramsoft.bbk.org.omegahg.com/rzxform.html).

An **RZX** file starts with the `RZX!` signature followed by the format version and flags.
The rest of the file is a sequence of blocks, each consisting of a block id byte and a 32-bit
block length which includes these 5 header bytes.

Recognized blocks:

|   id | block               | chunk                   |
|------|---------------------|-------------------------|
| 0x10 | Creator information | [RzxChunk::Info]        |
| 0x30 | Snapshot            | [RzxChunk::Snapshot]    |
| 0x80 | Input recording     | [RzxChunk::PortSamples] |

Security blocks (0x20 and 0x21) as well as any other blocks are reported as
[FormatError::UnsupportedBlock]. Snapshots given by external file descriptors and
protected input recordings are reported as [FormatError::UnsupportedFeature].

The writer never compresses nor protects the data it writes.

[FormatError::UnsupportedBlock]: crate::FormatError::UnsupportedBlock
[FormatError::UnsupportedFeature]: crate::FormatError::UnsupportedFeature
*/
use core::fmt;

use zxreplay_core::snapshot::UnifiedSnapshot;

use crate::error::{FormatError, Result};
use crate::z80::Z80Snapshot;

mod read;
mod write;

pub use read::*;
pub use write::*;

pub const RZX_SIGNATURE: &[u8;4] = b"RZX!";
/// The size of a block header: an id byte and a 32-bit length.
pub const BLOCK_HEADER_SIZE: u32 = 5;

pub const CREATOR_BLOCK_ID: u8 = 0x10;
pub const SECURITY_INFO_BLOCK_ID: u8 = 0x20;
pub const SECURITY_SIGNATURE_BLOCK_ID: u8 = 0x21;
pub const SNAPSHOT_BLOCK_ID: u8 = 0x30;
pub const INPUT_BLOCK_ID: u8 = 0x80;

/// A sample count indicating the frame repeats samples of the previous frame.
pub const REPEAT_SAMPLES: u16 = 0xFFFF;

/// A parsed **RZX** file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RzxFile {
    pub major: u8,
    pub minor: u8,
    pub flags: u32,
    pub chunks: Vec<RzxChunk>,
}

/// A top-level unit of the **RZX** file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RzxChunk {
    Info(CreatorInfo),
    Snapshot(SnapshotChunk),
    PortSamples(PortSamples),
}

/// Identifies the tool which created a recording.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreatorInfo {
    pub name: String,
    pub major: u16,
    pub minor: u16,
    pub custom: Vec<u8>,
}

/// An embedded snapshot, stored decompressed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SnapshotChunk {
    /// The lowercase snapshot file extension, e.g. `z80`.
    pub extension: String,
    pub image: Vec<u8>,
}

/// A sequence of recorded frames.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PortSamples {
    /// T-states elapsed since the last interrupt when the recording starts.
    pub first_tick: u32,
    pub frames: Vec<Frame>,
}

/// Input samples recorded during a single frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// The number of instruction fetches in the frame.
    pub fetch_count: u16,
    pub samples: FrameSamples,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameSamples {
    Recorded(Vec<u8>),
    /// Samples of the previous frame are repeated.
    Repeat,
}

impl Default for RzxFile {
    fn default() -> Self {
        RzxFile { major: 0, minor: 13, flags: 0, chunks: Vec::new() }
    }
}

impl RzxFile {
    /// Creates an empty recording of version 0.13.
    pub fn new() -> Self {
        Self::default()
    }
    /// Parses an **RZX** file image.
    pub fn parse(image: &[u8]) -> Result<Self> {
        load_rzx(image)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        save_rzx(self)
    }

    pub fn with_chunk<C: Into<RzxChunk>>(mut self, chunk: C) -> Self {
        self.chunks.push(chunk.into());
        self
    }
    /// Returns the first creator information chunk.
    pub fn find_creator_info(&self) -> Option<&CreatorInfo> {
        self.chunks.iter().find_map(|chunk| match chunk {
            RzxChunk::Info(info) => Some(info),
            _ => None
        })
    }
    /// Returns an iterator of all the input recording chunks.
    pub fn port_samples(&self) -> impl Iterator<Item=&PortSamples> {
        self.chunks.iter().filter_map(|chunk| match chunk {
            RzxChunk::PortSamples(samples) => Some(samples),
            _ => None
        })
    }
}

impl RzxChunk {
    /// Returns the role of the chunk: `info`, `snapshot` or `port_samples`.
    pub fn id(&self) -> &'static str {
        match self {
            RzxChunk::Info(..) => "info",
            RzxChunk::Snapshot(..) => "snapshot",
            RzxChunk::PortSamples(..) => "port_samples",
        }
    }
}

impl From<CreatorInfo> for RzxChunk {
    fn from(info: CreatorInfo) -> Self {
        RzxChunk::Info(info)
    }
}

impl From<SnapshotChunk> for RzxChunk {
    fn from(snapshot: SnapshotChunk) -> Self {
        RzxChunk::Snapshot(snapshot)
    }
}

impl From<PortSamples> for RzxChunk {
    fn from(samples: PortSamples) -> Self {
        RzxChunk::PortSamples(samples)
    }
}

impl fmt::Display for CreatorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}", self.name, self.major, self.minor)
    }
}

impl CreatorInfo {
    pub fn new<S: Into<String>>(name: S, major: u16, minor: u16) -> Self {
        CreatorInfo { name: name.into(), major, minor, custom: Vec::new() }
    }
}

impl SnapshotChunk {
    /// Creates a chunk with the `snapshot` encoded as a **Z80** version 3 image.
    pub fn from_unified(snapshot: &UnifiedSnapshot) -> Result<Self> {
        let (_, image) = crate::z80::save_z80(snapshot, crate::z80::Z80Version::V3)?;
        Ok(SnapshotChunk { extension: "z80".into(), image })
    }
    /// Decodes the embedded snapshot.
    pub fn to_unified(&self) -> Result<UnifiedSnapshot> {
        match self.extension.as_str() {
            "z80" => Z80Snapshot::parse(&self.image).map(Z80Snapshot::into_unified),
            _ => Err(FormatError::UnsupportedFeature("embedded snapshot format"))
        }
    }
}

impl Frame {
    pub fn new(fetch_count: u16, samples: Vec<u8>) -> Self {
        Frame { fetch_count, samples: FrameSamples::Recorded(samples) }
    }

    pub fn repeat(fetch_count: u16) -> Self {
        Frame { fetch_count, samples: FrameSamples::Repeat }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use flate2::{Compression, write::ZlibEncoder};
    use zxreplay_core::video::BorderColor;
    use crate::registry::FormatKind;
    use super::*;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn test_snapshot() -> UnifiedSnapshot {
        UnifiedSnapshot {
            pc: 0x8000,
            hl: 0x1234,
            border: Some(BorderColor::GREEN),
            ticks_since_int: Some(100),
            ..UnifiedSnapshot::default()
        }
        .with_memory(0x4000, vec![0;0x4000]).unwrap()
        .with_memory(0x8000, vec![0xED;0x4000]).unwrap()
        .with_memory(0xC000, vec![0xC9;0x4000]).unwrap()
    }

    #[test]
    fn rzx_round_trip_works() {
        let rzx = RzxFile::new()
            .with_chunk(CreatorInfo::new("zxreplay", 0, 1))
            .with_chunk(SnapshotChunk::from_unified(&test_snapshot()).unwrap())
            .with_chunk(PortSamples {
                first_tick: 100,
                frames: vec![Frame::new(1, vec![]), Frame::new(1, vec![])]
            });
        let image = rzx.to_bytes();
        assert_eq!(&image[..6], b"RZX!\x00\x0d");
        let rzx2 = RzxFile::parse(&image).unwrap();
        assert_eq!(rzx2.chunks[0].id(), "info");
        assert_eq!(rzx2.chunks[1].id(), "snapshot");
        assert_eq!(rzx2.chunks[2].id(), "port_samples");
        assert_eq!(rzx2, rzx);
        assert_eq!(rzx2.find_creator_info().unwrap().to_string(), "zxreplay 0.1");
        match &rzx2.chunks[1] {
            RzxChunk::Snapshot(chunk) => assert_eq!(chunk.to_unified().unwrap(), test_snapshot()),
            chunk => panic!("unexpected chunk: {:?}", chunk)
        }
    }

    #[test]
    fn rzx_frames_work() {
        let samples = PortSamples {
            first_tick: 0,
            frames: vec![
                Frame::new(100, vec![0xBF, 0xFF, 0x1F]),
                Frame::repeat(120),
                Frame::new(7, vec![])]
        };
        let rzx = RzxFile::new().with_chunk(samples.clone());
        let mut image = rzx.to_bytes();
        assert_eq!(RzxFile::parse(&image).unwrap(), rzx);
        // append a frame with a zero fetch count
        let block_len = u32::from_le_bytes([image[11], image[12], image[13], image[14]]);
        image[11..15].copy_from_slice(&(block_len + 5).to_le_bytes());
        image[15] += 1;
        image.extend_from_slice(&[0, 0, 1, 0, 0x55]);
        assert_eq!(RzxFile::parse(&image).unwrap(), rzx);
    }

    #[test]
    fn rzx_compressed_blocks_work() {
        let snap_image = crate::z80::save_z80(&test_snapshot(), crate::z80::Z80Version::V3).unwrap().1;
        let packed = zlib(&snap_image);
        let mut image = b"RZX!\x00\x0d\x00\x00\x00\x00".to_vec();
        image.push(SNAPSHOT_BLOCK_ID);
        image.extend_from_slice(&(5 + 12 + packed.len() as u32).to_le_bytes());
        image.extend_from_slice(&2u32.to_le_bytes());
        image.extend_from_slice(b"Z80\0");
        image.extend_from_slice(&(snap_image.len() as u32).to_le_bytes());
        image.extend_from_slice(&packed);

        let frames = [2u8, 0, 2, 0, 0x11, 0x22, 3, 0, 0xFF, 0xFF];
        let packed = zlib(&frames);
        image.push(INPUT_BLOCK_ID);
        image.extend_from_slice(&(5 + 13 + packed.len() as u32).to_le_bytes());
        image.extend_from_slice(&2u32.to_le_bytes());
        image.push(0);
        image.extend_from_slice(&77u32.to_le_bytes());
        image.extend_from_slice(&2u32.to_le_bytes());
        image.extend_from_slice(&packed);

        let rzx = RzxFile::parse(&image).unwrap();
        assert_eq!(rzx.chunks, vec![
            RzxChunk::Snapshot(SnapshotChunk { extension: "z80".into(), image: snap_image.clone() }),
            RzxChunk::PortSamples(PortSamples {
                first_tick: 77,
                frames: vec![Frame::new(2, vec![0x11, 0x22]), Frame::repeat(3)]
            })]);

        // declared snapshot size mismatch
        let mut bad = image.clone();
        bad[23] ^= 1;
        assert!(matches!(RzxFile::parse(&bad), Err(FormatError::CorruptedBlock(..))));
    }

    #[test]
    fn rzx_compressed_input_is_bounded() {
        let input_block = |count: u32, frames: &[u8]| {
            let packed = zlib(frames);
            let mut image = b"RZX!\x00\x0d\x00\x00\x00\x00".to_vec();
            image.push(INPUT_BLOCK_ID);
            image.extend_from_slice(&(5 + 13 + packed.len() as u32).to_le_bytes());
            image.extend_from_slice(&count.to_le_bytes());
            image.push(0);
            image.extend_from_slice(&0u32.to_le_bytes());
            image.extend_from_slice(&2u32.to_le_bytes());
            image.extend_from_slice(&packed);
            image
        };
        let mut frames = vec![1u8, 0, 0xFE, 0xFF];
        frames.extend(vec![0x1F;0xFFFE]);
        let rzx = RzxFile::parse(&input_block(1, &frames)).unwrap();
        assert_eq!(rzx.chunks, vec![RzxChunk::PortSamples(PortSamples {
            first_tick: 0,
            frames: vec![Frame::new(1, vec![0x1F;0xFFFE])]
        })]);
        frames.push(0);
        assert!(matches!(RzxFile::parse(&input_block(1, &frames)),
                         Err(FormatError::CorruptedBlock(..))));
        assert!(matches!(RzxFile::parse(&input_block(0, &[0;4096])),
                         Err(FormatError::CorruptedBlock(..))));
    }

    #[test]
    #[should_panic(expected = "too many samples in a single frame")]
    fn rzx_rejects_oversized_frames() {
        let rzx = RzxFile::new().with_chunk(PortSamples {
            first_tick: 0,
            frames: vec![Frame::new(1, vec![0;0xFFFF])]
        });
        rzx.to_bytes();
    }

    #[test]
    fn rzx_rejects_unsupported() {
        assert!(matches!(RzxFile::parse(b"RZY!\x00\x0d\x00\x00\x00\x00"),
                         Err(FormatError::BadSignature(FormatKind::Rzx))));
        assert!(RzxFile::parse(b"RZX!\x00\x0d").unwrap_err().is_truncated());
        let header = b"RZX!\x00\x0d\x00\x00\x00\x00";
        let mut image = header.to_vec();
        image.extend_from_slice(&[SECURITY_INFO_BLOCK_ID, 5, 0, 0, 0]);
        assert!(matches!(RzxFile::parse(&image),
                         Err(FormatError::UnsupportedBlock { id: 0x20, .. })));
        let mut image = header.to_vec();
        image.extend_from_slice(&[CREATOR_BLOCK_ID, 4, 0, 0, 0]);
        assert!(matches!(RzxFile::parse(&image),
                         Err(FormatError::MalformedBlockLength { id: 0x10, length: 4 })));
        let mut image = header.to_vec();
        image.extend_from_slice(&[CREATOR_BLOCK_ID, 10, 0, 0, 0, 1, 2]);
        assert!(RzxFile::parse(&image).unwrap_err().is_truncated());
        let mut image = header.to_vec();
        image.extend_from_slice(&[SNAPSHOT_BLOCK_ID, 17, 0, 0, 0, 1, 0, 0, 0]);
        image.extend_from_slice(b"z80\0\0\0\0\0");
        assert!(matches!(RzxFile::parse(&image), Err(FormatError::UnsupportedFeature(..))));
        let mut image = header.to_vec();
        image.extend_from_slice(&[INPUT_BLOCK_ID, 18, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0]);
        assert!(matches!(RzxFile::parse(&image), Err(FormatError::UnsupportedFeature(..))));
    }
}
