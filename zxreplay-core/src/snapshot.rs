/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
//! The format independent machine state.
//!
//! [UnifiedSnapshot] is the hub through which all snapshot formats are converted. A format
//! decoder fills in only the fields it encodes and leaves the optional ones as `None`.
use core::fmt;
use core::ops::Range;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use z80emu::{Cpu, CpuFlags, InterruptMode, Prefix, StkReg16};

use crate::clock::FTs;
use crate::video::BorderColor;

/// The size of the Z80 address space.
pub const ADDRESS_SPACE: usize = 0x1_0000;

/// Selects the register pair an instruction following an index prefix refers to.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexPair {
    HL,
    IX,
    IY,
}

/// A block of bytes placed at the given address.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct MemoryBlock {
    pub address: u16,
    pub data: Vec<u8>,
}

/// Non-overlapping memory blocks ordered by their addresses.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct MemoryMap {
    blocks: Vec<MemoryBlock>
}

/// Errors returned when inserting memory blocks into a [MemoryMap].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemoryError {
    /// The block does not fit in the 64 KiB address space.
    OutOfRange { address: u16, len: usize },
    /// The block overlaps a block already present.
    Overlap { address: u16, len: usize },
}

/// The canonical machine state.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct UnifiedSnapshot {
    pub af: u16,
    pub bc: u16,
    pub de: u16,
    pub hl: u16,
    pub ix: u16,
    pub iy: u16,
    pub alt_af: u16,
    pub alt_bc: u16,
    pub alt_de: u16,
    pub alt_hl: u16,
    pub pc: u16,
    pub sp: u16,
    /// I in the high byte and R in the low byte.
    pub ir: u16,
    pub iff1: bool,
    pub iff2: bool,
    pub int_mode: InterruptMode,
    /// The register pair selected by a pending index prefix.
    pub index_pair: Option<IndexPair>,
    /// T-states elapsed since the last interrupt.
    pub ticks_since_int: Option<FTs>,
    pub border: Option<BorderColor>,
    pub memory: MemoryMap,
}

/// An interface the execution core implements to accept restored machine states.
pub trait SnapshotLoader {
    /// Replaces the live machine state with `snapshot`.
    fn install_snapshot(&mut self, snapshot: UnifiedSnapshot);
}

/// An interface the execution core implements to expose its live machine state.
pub trait SnapshotCreator {
    /// Captures the live machine state.
    fn create_snapshot(&self) -> UnifiedSnapshot;
    /// Returns the number of T-states elapsed since the last interrupt.
    fn interrupt_ticks(&self) -> FTs;
}

impl<L: SnapshotLoader + ?Sized> SnapshotLoader for &mut L {
    fn install_snapshot(&mut self, snapshot: UnifiedSnapshot) {
        (**self).install_snapshot(snapshot)
    }
}

impl std::error::Error for MemoryError {}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::OutOfRange { address, len } => write!(f,
                "memory block at 0x{:04x} of {} bytes exceeds the address space", address, len),
            MemoryError::Overlap { address, len } => write!(f,
                "memory block at 0x{:04x} of {} bytes overlaps another block", address, len),
        }
    }
}

impl MemoryBlock {
    pub fn new(address: u16, data: Vec<u8>) -> Self {
        MemoryBlock { address, data }
    }
    /// Returns the address range covered by this block.
    pub fn range(&self) -> Range<usize> {
        let start = self.address as usize;
        start..start + self.data.len()
    }
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::default()
    }
    /// Returns memory blocks ordered by their addresses.
    pub fn blocks(&self) -> &[MemoryBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn into_blocks(self) -> Vec<MemoryBlock> {
        self.blocks
    }
    /// Inserts a block of memory at `address`.
    ///
    /// Fails if the block crosses the end of the address space or overlaps any of the
    /// already present blocks. Empty blocks are ignored.
    pub fn insert(&mut self, address: u16, data: Vec<u8>) -> Result<(), MemoryError> {
        let block = MemoryBlock::new(address, data);
        let range = block.range();
        if range.is_empty() {
            return Ok(())
        }
        if range.end > ADDRESS_SPACE {
            return Err(MemoryError::OutOfRange { address, len: block.data.len() })
        }
        let index = self.blocks.partition_point(|b| b.address < address);
        let overlaps_prev = index.checked_sub(1)
                            .map(|i| self.blocks[i].range().end > range.start)
                            .unwrap_or(false);
        let overlaps_next = self.blocks.get(index)
                            .map(|b| b.range().start < range.end)
                            .unwrap_or(false);
        if overlaps_prev || overlaps_next {
            return Err(MemoryError::Overlap { address, len: block.data.len() })
        }
        self.blocks.insert(index, block);
        Ok(())
    }
    /// Copies memory content covering `start..start + buf.len()` into `buf`.
    ///
    /// Bytes not covered by any block are left untouched. Returns `true` if any block
    /// intersects the range.
    pub fn read(&self, start: usize, buf: &mut [u8]) -> bool {
        let end = start + buf.len();
        let mut touched = false;
        for block in self.blocks.iter() {
            let range = block.range();
            let lo = range.start.max(start);
            let hi = range.end.min(end);
            if lo < hi {
                buf[lo - start..hi - start].copy_from_slice(&block.data[lo - range.start..hi - range.start]);
                touched = true;
            }
        }
        touched
    }
}

impl Default for UnifiedSnapshot {
    fn default() -> Self {
        UnifiedSnapshot {
            af: 0xFFFF,
            bc: 0,
            de: 0,
            hl: 0,
            ix: 0,
            iy: 0,
            alt_af: 0xFFFF,
            alt_bc: 0,
            alt_de: 0,
            alt_hl: 0,
            pc: 0,
            sp: 0xFFFF,
            ir: 0,
            iff1: false,
            iff2: false,
            int_mode: InterruptMode::Mode0,
            index_pair: None,
            ticks_since_int: None,
            border: None,
            memory: MemoryMap::default(),
        }
    }
}

impl UnifiedSnapshot {
    /// Returns the I register.
    pub fn i(&self) -> u8 {
        (self.ir >> 8) as u8
    }
    /// Returns the R register.
    pub fn r(&self) -> u8 {
        self.ir as u8
    }
    /// Inserts a block of memory at `address`, see [MemoryMap::insert].
    pub fn insert_memory(&mut self, address: u16, data: Vec<u8>) -> Result<(), MemoryError> {
        self.memory.insert(address, data)
    }
    /// Builder variant of [UnifiedSnapshot::insert_memory].
    pub fn with_memory(mut self, address: u16, data: Vec<u8>) -> Result<Self, MemoryError> {
        self.insert_memory(address, data)?;
        Ok(self)
    }
    /// Copies memory content into `buf`, see [MemoryMap::read].
    pub fn read_memory(&self, start: usize, buf: &mut [u8]) -> bool {
        self.memory.read(start, buf)
    }
    /// Creates a snapshot from the registers of the given `cpu`. Memory is not captured.
    ///
    /// A pending `0xDD` or `0xFD` prefix is captured as [UnifiedSnapshot::index_pair].
    pub fn from_cpu<C: Cpu>(cpu: &C) -> Self {
        let (a, f) = cpu.get_reg2(StkReg16::AF);
        let (a_alt, f_alt) = cpu.get_alt_reg2(StkReg16::AF);
        let (iff1, iff2) = cpu.get_iffs();
        UnifiedSnapshot {
            af: u16::from_be_bytes([a, f]),
            bc: cpu.get_reg16(StkReg16::BC),
            de: cpu.get_reg16(StkReg16::DE),
            hl: cpu.get_reg16(StkReg16::HL),
            ix: cpu.get_index16(Prefix::Xdd),
            iy: cpu.get_index16(Prefix::Yfd),
            alt_af: u16::from_be_bytes([a_alt, f_alt]),
            alt_bc: cpu.get_alt_reg16(StkReg16::BC),
            alt_de: cpu.get_alt_reg16(StkReg16::DE),
            alt_hl: cpu.get_alt_reg16(StkReg16::HL),
            pc: cpu.get_pc(),
            sp: cpu.get_sp(),
            ir: u16::from_be_bytes([cpu.get_i(), cpu.get_r()]),
            iff1,
            iff2,
            int_mode: cpu.get_im(),
            index_pair: match cpu.get_prefix() {
                Some(Prefix::Xdd) => Some(IndexPair::IX),
                Some(Prefix::Yfd) => Some(IndexPair::IY),
                None => None
            },
            ..UnifiedSnapshot::default()
        }
    }
    /// Sets the registers of the given `cpu` from this snapshot.
    ///
    /// The `cpu` is reset first, so no pending prefix is restored.
    pub fn apply_to_cpu<C: Cpu>(&self, cpu: &mut C) {
        cpu.reset();
        let [a_alt, f_alt] = self.alt_af.to_be_bytes();
        cpu.set_reg16(StkReg16::HL, self.alt_hl);
        cpu.set_reg16(StkReg16::DE, self.alt_de);
        cpu.set_reg16(StkReg16::BC, self.alt_bc);
        cpu.exx();
        cpu.set_acc(a_alt);
        cpu.set_flags(CpuFlags::from_bits_truncate(f_alt));
        cpu.ex_af_af();
        let [a, f] = self.af.to_be_bytes();
        cpu.set_acc(a);
        cpu.set_flags(CpuFlags::from_bits_truncate(f));
        cpu.set_reg16(StkReg16::HL, self.hl);
        cpu.set_reg16(StkReg16::DE, self.de);
        cpu.set_reg16(StkReg16::BC, self.bc);
        cpu.set_index16(Prefix::Xdd, self.ix);
        cpu.set_index16(Prefix::Yfd, self.iy);
        cpu.set_i(self.i());
        cpu.set_r(self.r());
        cpu.set_iffs(self.iff1, self.iff2);
        cpu.set_im(self.int_mode);
        cpu.set_sp(self.sp);
        cpu.set_pc(self.pc);
    }
}
