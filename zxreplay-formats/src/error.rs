/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
//! Errors reported by the format codecs.
use std::io;

use thiserror::Error;

use zxreplay_core::snapshot::MemoryError;

use crate::registry::FormatKind;

/// A specialized [Result][core::result::Result] type for the format codecs.
pub type Result<T> = core::result::Result<T, FormatError>;

/// The error type of all the parsers and encoders of this crate.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Fewer bytes were available than a declared or a fixed-size field requires.
    #[error("truncated data at offset {offset}: {needed} bytes needed, {available} available")]
    Truncated { offset: usize, needed: usize, available: usize },
    #[error("bad {0} signature")]
    BadSignature(FormatKind),
    #[error("unsupported {kind} block: 0x{id:02x}")]
    UnsupportedBlock { kind: FormatKind, id: u8 },
    #[error("unsupported machine, hardware mode: {hw_mode}")]
    UnsupportedMachine { hw_mode: u8 },
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(&'static str),
    #[error("corrupted block: {0}")]
    CorruptedBlock(&'static str),
    #[error("more than one known file format in archive: {}", candidates.join(", "))]
    AmbiguousArchive { candidates: Vec<String> },
    #[error("no known file format in archive")]
    NoKnownFormatInArchive,
    #[error("malformed length {length} of block 0x{id:02x}")]
    MalformedBlockLength { id: u8, length: u32 },
    #[error("extended header too large: {0} bytes")]
    ExtraHeaderTooLarge(usize),
    #[error("memory image too large")]
    MemoryImageTooLarge,
    #[error("invalid memory layout: {0}")]
    InvalidMemory(#[from] MemoryError),
    #[error("unknown file format: {0}")]
    UnknownFormat(String),
    #[error("invalid data: {0}")]
    InvalidData(&'static str),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FormatError {
    pub(crate) fn truncated(offset: usize, needed: usize, available: usize) -> Self {
        FormatError::Truncated { offset, needed, available }
    }
    /// Returns `true` if the error indicates insufficient data.
    pub fn is_truncated(&self) -> bool {
        matches!(self, FormatError::Truncated {..})
    }
}

impl From<FormatError> for io::Error {
    fn from(err: FormatError) -> Self {
        match err {
            FormatError::Io(err) => err,
            FormatError::Truncated {..} => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            err => io::Error::new(io::ErrorKind::InvalidData, err)
        }
    }
}
