/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of ZXREPLAY, a Rust library for persisting and replaying ZX Spectrum emulation.

    For the full copyright notice, see the lib.rs file.
*/
//! Schema driven binary field reader and writer.
//!
//! A schema is an ordered slice of `(Field, key)` pairs. [BinaryParser::parse] decodes the fields
//! in order and returns them as [Fields] addressed by keys. [BinaryWriter::write] encodes the
//! values in the order given by a schema.
//!
//! ```
//! use zxreplay_formats::binary::*;
//!
//! const SCHEMA: &[(Field, &str)] = &[(Field::Block(4), "sig"), (Field::U16Le, "len")];
//! let mut parser = BinaryParser::new(b"RZX!\x34\x12\x00");
//! let fields = parser.parse(SCHEMA)?;
//! assert_eq!(fields.block("sig"), b"RZX!");
//! assert_eq!(fields.u16("len"), 0x1234);
//! assert_eq!(parser.remaining(), 1);
//! # Ok::<(), zxreplay_formats::FormatError>(())
//! ```
use core::fmt;
use std::io;

use nom::number::complete::{be_u16, be_u32, le_u16, le_u32, u8 as nom_u8};
use nom::IResult;

use crate::error::{FormatError, Result};

/// A field format descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    U8,
    U16Le,
    U16Be,
    U32Le,
    U32Be,
    /// A fixed-size block of bytes.
    Block(usize),
}

/// A decoded field value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Value<'a> {
    U8(u8),
    U16(u16),
    U32(u32),
    Block(&'a [u8]),
}

/// Decoded or to be encoded field values addressed by keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fields<'a, K> {
    values: Vec<(K, Value<'a>)>
}

/// A cursor based reader of fields from a byte image.
///
/// The cursor never moves backwards and never exceeds the image length.
#[derive(Clone, Debug)]
pub struct BinaryParser<'a> {
    image: &'a [u8],
    cursor: usize,
}

/// An append-only writer of fields.
#[derive(Clone, Debug, Default)]
pub struct BinaryWriter {
    chunks: Vec<Vec<u8>>,
    len: usize,
}

impl Field {
    /// Returns the encoded size of this field in bytes.
    pub fn size(self) -> usize {
        match self {
            Field::U8 => 1,
            Field::U16Le|Field::U16Be => 2,
            Field::U32Le|Field::U32Be => 4,
            Field::Block(n) => n
        }
    }
}

impl<'a, K> Default for Fields<'a, K> {
    fn default() -> Self {
        Fields { values: Vec::new() }
    }
}

impl<'a, K: Copy + PartialEq + fmt::Debug> Fields<'a, K> {
    pub fn new() -> Self {
        Self::default()
    }
    /// Sets a value of the field with the given `key`.
    pub fn with(mut self, key: K, value: Value<'a>) -> Self {
        self.insert(key, value);
        self
    }
    /// Sets a value of the field with the given `key`.
    pub fn insert(&mut self, key: K, value: Value<'a>) {
        match self.values.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.values.push((key, value))
        }
    }

    pub fn get(&self, key: K) -> Option<Value<'a>> {
        self.values.iter().find(|(k, _)| *k == key).map(|&(_, v)| v)
    }
    /// # Panics
    /// Panics if the field is missing or is not a `U8` value.
    pub fn u8(&self, key: K) -> u8 {
        match self.get_expected(key) {
            (_, Value::U8(v)) => v,
            (key, value) => wrong_kind(key, value, "u8")
        }
    }
    /// # Panics
    /// Panics if the field is missing or is not a `U16` value.
    pub fn u16(&self, key: K) -> u16 {
        match self.get_expected(key) {
            (_, Value::U16(v)) => v,
            (key, value) => wrong_kind(key, value, "u16")
        }
    }
    /// # Panics
    /// Panics if the field is missing or is not a `U32` value.
    pub fn u32(&self, key: K) -> u32 {
        match self.get_expected(key) {
            (_, Value::U32(v)) => v,
            (key, value) => wrong_kind(key, value, "u32")
        }
    }
    /// # Panics
    /// Panics if the field is missing or is not a `Block` value.
    pub fn block(&self, key: K) -> &'a [u8] {
        match self.get_expected(key) {
            (_, Value::Block(v)) => v,
            (key, value) => wrong_kind(key, value, "block")
        }
    }

    fn get_expected(&self, key: K) -> (K, Value<'a>) {
        match self.get(key) {
            Some(value) => (key, value),
            None => panic!("missing field: {:?}", key)
        }
    }
}

fn wrong_kind<K: fmt::Debug, T>(key: K, value: Value<'_>, expected: &str) -> T {
    panic!("field {:?} is not {}: {:?}", key, expected, value)
}

fn decode<'a, T>(res: IResult<&'a [u8], T, ()>, offset: usize, needed: usize) -> Result<T> {
    res.map(|(_, v)| v).map_err(|_| FormatError::truncated(offset, needed, 0))
}

impl<'a> BinaryParser<'a> {
    pub fn new(image: &'a [u8]) -> Self {
        BinaryParser { image, cursor: 0 }
    }
    /// Returns the current cursor position.
    pub fn position(&self) -> usize {
        self.cursor
    }
    /// Returns the number of bytes left to be read.
    pub fn remaining(&self) -> usize {
        self.image.len() - self.cursor
    }
    /// Returns `true` if the cursor reached the end of the image.
    pub fn is_exhausted(&self) -> bool {
        self.cursor == self.image.len()
    }
    /// Returns the next `n` bytes and advances the cursor.
    ///
    /// Fails with [FormatError::Truncated] without moving the cursor if fewer than `n` bytes remain.
    pub fn read_block(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if n > available {
            return Err(FormatError::truncated(self.cursor, n, available))
        }
        let block = &self.image[self.cursor..self.cursor + n];
        self.cursor += n;
        Ok(block)
    }
    /// Returns all the remaining bytes and exhausts the parser.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.image[self.cursor..];
        self.cursor = self.image.len();
        rest
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_field(Field::U8).map(|v| match v { Value::U8(v) => v, _ => 0 })
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        self.read_field(Field::U16Le).map(|v| match v { Value::U16(v) => v, _ => 0 })
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        self.read_field(Field::U32Le).map(|v| match v { Value::U32(v) => v, _ => 0 })
    }
    /// Reads a 24-bit little-endian integer.
    pub fn read_u24_le(&mut self) -> Result<u32> {
        let bytes = self.read_block(3)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]))
    }
    /// Reads a single field.
    pub fn read_field(&mut self, field: Field) -> Result<Value<'a>> {
        let offset = self.cursor;
        let size = field.size();
        let bytes = self.read_block(size)?;
        Ok(match field {
            Field::U8 => Value::U8(decode(nom_u8(bytes), offset, size)?),
            Field::U16Le => Value::U16(decode(le_u16(bytes), offset, size)?),
            Field::U16Be => Value::U16(decode(be_u16(bytes), offset, size)?),
            Field::U32Le => Value::U32(decode(le_u32(bytes), offset, size)?),
            Field::U32Be => Value::U32(decode(be_u32(bytes), offset, size)?),
            Field::Block(_) => Value::Block(bytes)
        })
    }
    /// Reads fields in the order of the given `schema`.
    ///
    /// Fails with [FormatError::Truncated] on the first field that cannot be satisfied.
    pub fn parse<K: Copy + PartialEq + fmt::Debug>(&mut self, schema: &[(Field, K)]) -> Result<Fields<'a, K>> {
        let mut fields = Fields { values: Vec::with_capacity(schema.len()) };
        for &(field, key) in schema.iter() {
            let value = self.read_field(field)?;
            fields.values.push((key, value));
        }
        Ok(fields)
    }
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }
    /// Returns the total number of bytes written so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    /// Appends a chunk of bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if !bytes.is_empty() {
            self.len += bytes.len();
            self.chunks.push(bytes.to_vec());
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }

    pub fn write_u16_le(&mut self, value: u16) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_u32_le(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }
    /// Appends a single encoded field.
    ///
    /// # Panics
    /// Panics if the `value` can not be represented by the `field`.
    pub fn write_field(&mut self, field: Field, value: Value<'_>) {
        match (field, value) {
            (Field::U8, Value::U8(v)) => self.write_u8(v),
            (Field::U16Le, Value::U16(v)) => self.write_u16_le(v),
            (Field::U16Be, Value::U16(v)) => self.write_bytes(&v.to_be_bytes()),
            (Field::U32Le, Value::U32(v)) => self.write_u32_le(v),
            (Field::U32Be, Value::U32(v)) => self.write_bytes(&v.to_be_bytes()),
            (Field::Block(n), Value::Block(bytes)) if bytes.len() == n => self.write_bytes(bytes),
            (field, value) => panic!("can't encode {:?} as {:?}", value, field)
        }
    }
    /// Appends fields in the order of the given `schema`.
    ///
    /// # Panics
    /// Panics if any of the values is missing or can not be represented by its field.
    pub fn write<K: Copy + PartialEq + fmt::Debug>(&mut self, schema: &[(Field, K)], values: &Fields<'_, K>) {
        for &(field, key) in schema.iter() {
            let (_, value) = values.get_expected(key);
            self.write_field(field, value);
        }
    }
    /// Concatenates all the chunks.
    pub fn finalize(self) -> Vec<u8> {
        let mut image = Vec::with_capacity(self.len);
        for chunk in self.chunks.into_iter() {
            image.extend_from_slice(&chunk);
        }
        image
    }
}

impl io::Write for BinaryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
