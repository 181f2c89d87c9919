/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
/*! **TZX** file format utilities.

See the specification reference on [World of Spectrum](https://worldofspectrum.net/TZXformat.html).

A **TZX** file starts with the `ZXTape!` signature, the `0x1A` byte and the format version.
The rest of the file is a sequence of blocks, each starting with a block id byte.

Supported blocks:

|   id | block                |
|------|----------------------|
| 0x10 | Standard speed data  |
| 0x11 | Turbo speed data     |
| 0x12 | Pure tone            |
| 0x13 | Pulse sequence       |
| 0x14 | Pure data            |
| 0x20 | Pause                |
| 0x21 | Group start          |
| 0x22 | Group end            |
| 0x30 | Text description     |
| 0x32 | Archive info         |

Any other block is reported as [FormatError::UnsupportedBlock].

# Pulses

The signal level flips on every pulse, starting high. A non-zero pause emits a single pulse
at the low level after which the next pulse is high again. A zero pause emits nothing and
the level is unchanged. The pause after the last signal producing block is omitted.

Data blocks with lead tones are terminated with a tail pulse just like **TAP** blocks.

[FormatError::UnsupportedBlock]: crate::FormatError::UnsupportedBlock
*/
use core::borrow::Borrow;

use log::{debug, trace};

use zxreplay_core::clock::ms_to_tstates;
use zxreplay_core::pulse::{EndTagged, Pulse, PulseTags};

use crate::binary::BinaryParser;
use crate::error::{FormatError, Result};
use crate::registry::FormatKind;
use crate::tap::pulse::{DataEncoder, DataTiming, consts::TAIL_PULSE_LENGTH};

pub const TZX_SIGNATURE: &[u8;8] = b"ZXTape!\x1A";

/// A parsed **TZX** file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TzxFile {
    pub major: u8,
    pub minor: u8,
    pub blocks: Vec<TzxBlock>,
}

/// A single **TZX** block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TzxBlock {
    /// 0x10
    StandardSpeed { pause_ms: u16, data: Vec<u8> },
    /// 0x11
    TurboSpeed {
        pilot_pulse: u16,
        sync1: u16,
        sync2: u16,
        zero_pulse: u16,
        one_pulse: u16,
        pilot_count: u16,
        used_bits: u8,
        pause_ms: u16,
        data: Vec<u8>
    },
    /// 0x12
    PureTone { pulse_len: u16, count: u16 },
    /// 0x13
    PulseSequence { pulses: Vec<u16> },
    /// 0x14
    PureData {
        zero_pulse: u16,
        one_pulse: u16,
        used_bits: u8,
        pause_ms: u16,
        data: Vec<u8>
    },
    /// 0x20, a zero duration stops the tape.
    Pause { duration_ms: u16 },
    /// 0x21
    GroupStart { name: String },
    /// 0x22
    GroupEnd,
    /// 0x30
    TextDescription { text: String },
    /// 0x32
    ArchiveInfo { entries: Vec<(u8, String)> },
}

impl TzxBlock {
    pub fn id(&self) -> u8 {
        match self {
            TzxBlock::StandardSpeed {..} => 0x10,
            TzxBlock::TurboSpeed {..} => 0x11,
            TzxBlock::PureTone {..} => 0x12,
            TzxBlock::PulseSequence {..} => 0x13,
            TzxBlock::PureData {..} => 0x14,
            TzxBlock::Pause {..} => 0x20,
            TzxBlock::GroupStart {..} => 0x21,
            TzxBlock::GroupEnd => 0x22,
            TzxBlock::TextDescription {..} => 0x30,
            TzxBlock::ArchiveInfo {..} => 0x32,
        }
    }
    /// Returns the data bytes of data blocks.
    pub fn data(&self) -> &[u8] {
        match self {
            TzxBlock::StandardSpeed { data, .. }|
            TzxBlock::TurboSpeed { data, .. }|
            TzxBlock::PureData { data, .. } => data,
            _ => &[]
        }
    }
    /// Returns the pause following this block in milliseconds.
    pub fn pause_ms(&self) -> u16 {
        match *self {
            TzxBlock::StandardSpeed { pause_ms, .. }|
            TzxBlock::TurboSpeed { pause_ms, .. }|
            TzxBlock::PureData { pause_ms, .. } => pause_ms,
            TzxBlock::Pause { duration_ms } => duration_ms,
            _ => 0
        }
    }
    /// Returns `true` if this block produces any pulses.
    pub fn has_signal(&self) -> bool {
        match self {
            TzxBlock::StandardSpeed {..}|TzxBlock::TurboSpeed {..} => true,
            TzxBlock::PureData { data, .. } => !data.is_empty() || self.pause_ms() != 0,
            TzxBlock::PureTone { count, .. } => *count != 0,
            TzxBlock::PulseSequence { pulses } => !pulses.is_empty(),
            TzxBlock::Pause { duration_ms } => *duration_ms != 0,
            _ => false
        }
    }

    fn encoder(&self) -> Option<DataEncoder> {
        match *self {
            TzxBlock::StandardSpeed { ref data, .. } => Some(DataEncoder::standard(data)),
            TzxBlock::TurboSpeed { pilot_pulse, sync1, sync2, zero_pulse, one_pulse,
                                   pilot_count, used_bits, .. } => {
                Some(DataEncoder::new(DataTiming {
                    lead_pulse: pilot_pulse.into(),
                    lead_count: pilot_count,
                    sync: Some((sync1.into(), sync2.into())),
                    zero_pulse: zero_pulse.into(),
                    one_pulse: one_pulse.into(),
                    used_bits,
                    tail: Some(TAIL_PULSE_LENGTH)
                }))
            }
            TzxBlock::PureData { zero_pulse, one_pulse, used_bits, .. } => {
                Some(DataEncoder::new(DataTiming {
                    lead_pulse: 0,
                    lead_count: 0,
                    sync: None,
                    zero_pulse: zero_pulse.into(),
                    one_pulse: one_pulse.into(),
                    used_bits,
                    tail: None
                }))
            }
            _ => None
        }
    }
}

fn read_string(parser: &mut BinaryParser<'_>, len: usize) -> Result<String> {
    Ok(String::from_utf8_lossy(parser.read_block(len)?).into_owned())
}

fn read_archive_info(body: &[u8]) -> Result<Vec<(u8, String)>> {
    let mut parser = BinaryParser::new(body);
    let count = parser.read_u8()?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let id = parser.read_u8()?;
        let len = parser.read_u8()? as usize;
        entries.push((id, read_string(&mut parser, len)?));
    }
    Ok(entries)
}

fn read_block(parser: &mut BinaryParser<'_>, id: u8) -> Result<TzxBlock> {
    Ok(match id {
        0x10 => {
            let pause_ms = parser.read_u16_le()?;
            let len = parser.read_u16_le()? as usize;
            TzxBlock::StandardSpeed { pause_ms, data: parser.read_block(len)?.to_vec() }
        }
        0x11 => {
            let pilot_pulse = parser.read_u16_le()?;
            let sync1 = parser.read_u16_le()?;
            let sync2 = parser.read_u16_le()?;
            let zero_pulse = parser.read_u16_le()?;
            let one_pulse = parser.read_u16_le()?;
            let pilot_count = parser.read_u16_le()?;
            let used_bits = parser.read_u8()?;
            let pause_ms = parser.read_u16_le()?;
            let len = parser.read_u24_le()? as usize;
            TzxBlock::TurboSpeed {
                pilot_pulse, sync1, sync2, zero_pulse, one_pulse, pilot_count, used_bits, pause_ms,
                data: parser.read_block(len)?.to_vec()
            }
        }
        0x12 => {
            let pulse_len = parser.read_u16_le()?;
            let count = parser.read_u16_le()?;
            TzxBlock::PureTone { pulse_len, count }
        }
        0x13 => {
            let count = parser.read_u8()?;
            let pulses = (0..count).map(|_| parser.read_u16_le()).collect::<Result<_>>()?;
            TzxBlock::PulseSequence { pulses }
        }
        0x14 => {
            let zero_pulse = parser.read_u16_le()?;
            let one_pulse = parser.read_u16_le()?;
            let used_bits = parser.read_u8()?;
            let pause_ms = parser.read_u16_le()?;
            let len = parser.read_u24_le()? as usize;
            TzxBlock::PureData {
                zero_pulse, one_pulse, used_bits, pause_ms,
                data: parser.read_block(len)?.to_vec()
            }
        }
        0x20 => TzxBlock::Pause { duration_ms: parser.read_u16_le()? },
        0x21 => {
            let len = parser.read_u8()? as usize;
            TzxBlock::GroupStart { name: read_string(parser, len)? }
        }
        0x22 => TzxBlock::GroupEnd,
        0x30 => {
            let len = parser.read_u8()? as usize;
            TzxBlock::TextDescription { text: read_string(parser, len)? }
        }
        0x32 => {
            let len = parser.read_u16_le()? as usize;
            TzxBlock::ArchiveInfo { entries: read_archive_info(parser.read_block(len)?)? }
        }
        id => return Err(FormatError::UnsupportedBlock { kind: FormatKind::Tzx, id })
    })
}

impl TzxFile {
    /// Parses a **TZX** file image.
    pub fn parse(image: &[u8]) -> Result<Self> {
        let mut parser = BinaryParser::new(image);
        if parser.read_block(TZX_SIGNATURE.len())? != TZX_SIGNATURE {
            return Err(FormatError::BadSignature(FormatKind::Tzx))
        }
        let major = parser.read_u8()?;
        let minor = parser.read_u8()?;
        debug!("TZX version: {}.{}", major, minor);
        let mut blocks = Vec::new();
        while !parser.is_exhausted() {
            let id = parser.read_u8()?;
            let block = read_block(&mut parser, id)?;
            trace!("TZX block: 0x{:02x}", block.id());
            blocks.push(block);
        }
        Ok(TzxFile { major, minor, blocks })
    }
    /// Returns a lazy pulse sequence borrowing this file.
    pub fn pulses(&self) -> TzxPulses<&TzxFile> {
        EndTagged::new(TzxPulseIter::new(self))
    }
    /// Returns a lazy pulse sequence owning this file.
    pub fn into_pulses(self) -> TzxPulses<TzxFile> {
        EndTagged::new(TzxPulseIter::new(self))
    }
}

/// The pulse sequence of a **TZX** file with the last pulse tagged.
pub type TzxPulses<F> = EndTagged<TzxPulseIter<F>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BlockState {
    Start,
    Data(DataEncoder),
    Tone { left: u16 },
    Sequence { index: usize },
    Pause,
    Next
}

/// Converts blocks of the borrowed [TzxFile] to pulses.
#[derive(Clone, Debug)]
pub struct TzxPulseIter<F> {
    file: F,
    block: usize,
    state: BlockState,
    level: bool,
}

#[inline]
fn edge(level: &mut bool, duration: u32, tags: PulseTags) -> Pulse {
    let pulse = Pulse::new(*level, duration, tags);
    *level = !*level;
    pulse
}

impl<F: Borrow<TzxFile>> TzxPulseIter<F> {
    pub fn new(file: F) -> Self {
        TzxPulseIter { file, block: 0, state: BlockState::Start, level: true }
    }
    /// Returns the index of the currently converted block.
    pub fn block_index(&self) -> usize {
        self.block
    }

    pub fn into_inner(self) -> F {
        self.file
    }
}

impl<F: Borrow<TzxFile>> Iterator for TzxPulseIter<F> {
    type Item = Pulse;

    fn next(&mut self) -> Option<Pulse> {
        let blocks = &self.file.borrow().blocks;
        loop {
            let block = blocks.get(self.block)?;
            match self.state {
                BlockState::Start => {
                    self.state = match block {
                        TzxBlock::PureTone { count, .. } => BlockState::Tone { left: *count },
                        TzxBlock::PulseSequence {..} => BlockState::Sequence { index: 0 },
                        TzxBlock::Pause {..} => BlockState::Pause,
                        block => match block.encoder() {
                            Some(encoder) => BlockState::Data(encoder),
                            None => BlockState::Next
                        }
                    };
                }
                BlockState::Data(ref mut encoder) => {
                    match encoder.next_pulse(block.data()) {
                        Some((duration, tags)) => return Some(edge(&mut self.level, duration, tags)),
                        None => self.state = BlockState::Pause
                    }
                }
                BlockState::Tone { ref mut left } => {
                    match block {
                        TzxBlock::PureTone { pulse_len, .. } if *left != 0 => {
                            *left -= 1;
                            return Some(edge(&mut self.level, (*pulse_len).into(), PulseTags::PILOT))
                        }
                        _ => self.state = BlockState::Next
                    }
                }
                BlockState::Sequence { ref mut index } => {
                    match block {
                        TzxBlock::PulseSequence { pulses } if *index < pulses.len() => {
                            let duration = pulses[*index].into();
                            *index += 1;
                            return Some(edge(&mut self.level, duration, PulseTags::empty()))
                        }
                        _ => self.state = BlockState::Next
                    }
                }
                BlockState::Pause => {
                    self.state = BlockState::Next;
                    let ms = block.pause_ms();
                    if ms != 0 && blocks[self.block + 1..].iter().any(TzxBlock::has_signal) {
                        self.level = true;
                        return Some(Pulse::new(false, ms_to_tstates(ms), PulseTags::PAUSE))
                    }
                }
                BlockState::Next => {
                    self.block += 1;
                    self.state = BlockState::Start;
                }
            }
        }
    }
}
