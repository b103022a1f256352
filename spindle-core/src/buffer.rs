// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Byte buffers used by the codec.
//!
//! [`Writer`] owns a growable region whose length is the write cursor.
//! [`Reader`] borrows a byte slice and keeps a read cursor into it, so input is
//! never copied. All multi-byte values are little-endian.
//!
//! Variable-length integers use 7 bits per byte with the high bit as the
//! continuation flag. Signed variants zig-zag first so that small negative
//! numbers stay short.

use crate::error::Error;
use byteorder::{ByteOrder, LittleEndian};

/// Maximum encoded width of a 32-bit varint.
pub const MAX_VARINT32_SIZE: usize = 5;
/// Maximum encoded width of a 64-bit varint.
pub const MAX_VARINT64_SIZE: usize = 10;

const MIN_GROWTH: usize = 64;

#[inline(always)]
pub fn zigzag32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

#[inline(always)]
pub fn unzigzag32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

#[inline(always)]
pub fn zigzag64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

#[inline(always)]
pub fn unzigzag64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Number of bytes `write_varuint32` emits for `value`.
#[inline]
pub fn varuint32_size(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0xFFF_FFFF => 4,
        _ => 5,
    }
}

/// Number of bytes `write_varuint64` emits for `value`.
#[inline]
pub fn varuint64_size(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

#[derive(Default, Debug, Clone)]
pub struct Writer {
    pub(crate) bf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Writer {
        Writer::default()
    }

    pub fn with_capacity(capacity: usize) -> Writer {
        Writer {
            bf: Vec::with_capacity(capacity),
        }
    }

    /// Keeps capacity and resets the write cursor to 0.
    pub fn reset(&mut self) {
        self.bf.clear();
    }

    /// Drops retained capacity above `limit`.
    pub fn shrink_to(&mut self, limit: usize) {
        if self.bf.capacity() > limit {
            self.bf.clear();
            self.bf.shrink_to(limit);
        }
    }

    pub fn dump(&self) -> Vec<u8> {
        self.bf.clone()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.bf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bf
    }

    pub fn len(&self) -> usize {
        self.bf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.bf.capacity()
    }

    /// A zero-copy read view over everything written so far.
    pub fn reader(&self) -> Reader<'_> {
        Reader::new(&self.bf)
    }

    /// Ensures at least `min_extra` writable bytes, growing by at least 1.5x.
    #[inline(always)]
    pub fn grow(&mut self, min_extra: usize) {
        let free = self.bf.capacity() - self.bf.len();
        if free < min_extra {
            self.grow_slow(min_extra);
        }
    }

    #[cold]
    #[inline(never)]
    fn grow_slow(&mut self, min_extra: usize) {
        let cap = self.bf.capacity();
        let target = (self.bf.len() + min_extra)
            .max(cap + cap / 2)
            .max(MIN_GROWTH);
        self.bf.reserve_exact(target - self.bf.len());
    }

    /// Overwrites already-written bytes at `offset`.
    pub fn set_bytes(&mut self, offset: usize, data: &[u8]) -> Result<(), Error> {
        let len = self.bf.len();
        match self.bf.get_mut(offset..offset + data.len()) {
            Some(dst) => {
                dst.copy_from_slice(data);
                Ok(())
            }
            None => Err(Error::buffer_underflow(offset, data.len(), len)),
        }
    }

    #[inline(always)]
    pub fn write_bytes(&mut self, v: &[u8]) -> usize {
        self.grow(v.len());
        self.bf.extend_from_slice(v);
        v.len()
    }

    #[inline(always)]
    pub fn write_u8(&mut self, value: u8) {
        self.grow(1);
        self.bf.push(value);
    }

    #[inline(always)]
    pub fn write_i8(&mut self, value: i8) {
        self.write_u8(value as u8);
    }

    #[inline(always)]
    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(value as u8);
    }

    #[inline(always)]
    pub fn write_u16(&mut self, value: u16) {
        let mut b = [0u8; 2];
        LittleEndian::write_u16(&mut b, value);
        self.write_bytes(&b);
    }

    #[inline(always)]
    pub fn write_i16(&mut self, value: i16) {
        self.write_u16(value as u16);
    }

    #[inline(always)]
    pub fn write_u32(&mut self, value: u32) {
        let mut b = [0u8; 4];
        LittleEndian::write_u32(&mut b, value);
        self.write_bytes(&b);
    }

    #[inline(always)]
    pub fn write_i32(&mut self, value: i32) {
        self.write_u32(value as u32);
    }

    #[inline(always)]
    pub fn write_f32(&mut self, value: f32) {
        let mut b = [0u8; 4];
        LittleEndian::write_f32(&mut b, value);
        self.write_bytes(&b);
    }

    #[inline(always)]
    pub fn write_u64(&mut self, value: u64) {
        let mut b = [0u8; 8];
        LittleEndian::write_u64(&mut b, value);
        self.write_bytes(&b);
    }

    #[inline(always)]
    pub fn write_i64(&mut self, value: i64) {
        self.write_u64(value as u64);
    }

    #[inline(always)]
    pub fn write_f64(&mut self, value: f64) {
        let mut b = [0u8; 8];
        LittleEndian::write_f64(&mut b, value);
        self.write_bytes(&b);
    }

    #[inline(always)]
    pub fn write_varint32(&mut self, value: i32) {
        self.write_varuint32(zigzag32(value))
    }

    #[inline(always)]
    pub fn write_varuint32(&mut self, value: u32) {
        if value < 0x80 {
            self.write_u8(value as u8);
        } else {
            self.write_varuint64(value as u64);
        }
    }

    #[inline(always)]
    pub fn write_varint64(&mut self, value: i64) {
        self.write_varuint64(zigzag64(value))
    }

    pub fn write_varuint64(&mut self, mut value: u64) {
        let mut b = [0u8; MAX_VARINT64_SIZE];
        let mut i = 0;
        while value >= 0x80 {
            b[i] = (value as u8) | 0x80;
            value >>= 7;
            i += 1;
        }
        b[i] = value as u8;
        self.write_bytes(&b[..=i]);
    }

    /// varuint32 byte length followed by the UTF-8 bytes.
    pub fn write_utf8_string(&mut self, s: &str) {
        self.write_varuint32(s.len() as u32);
        self.write_bytes(s.as_bytes());
    }

    /// Reserves `max_len` bytes once and returns a writer that fills them
    /// without further capacity checks. The cursor advances when the block
    /// is dropped, by the number of bytes actually written.
    #[inline(always)]
    pub(crate) fn block(&mut self, max_len: usize) -> BlockWriter<'_> {
        self.grow(max_len);
        let start = self.bf.len();
        BlockWriter {
            bf: &mut self.bf,
            pos: start,
            limit: start + max_len,
        }
    }
}

/// Unchecked writer over capacity reserved by [`Writer::block`].
pub(crate) struct BlockWriter<'a> {
    bf: &'a mut Vec<u8>,
    pos: usize,
    limit: usize,
}

impl BlockWriter<'_> {
    #[inline(always)]
    fn put<const N: usize>(&mut self, bytes: [u8; N]) {
        debug_assert!(self.pos + N <= self.limit);
        // SAFETY: `Writer::block` reserved `limit - start` bytes and callers
        // size the block from the field layout, so `pos + N <= capacity`.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.bf.as_mut_ptr().add(self.pos), N);
        }
        self.pos += N;
    }

    #[inline(always)]
    pub fn put_u8(&mut self, value: u8) {
        self.put([value]);
    }

    #[inline(always)]
    pub fn put_bool(&mut self, value: bool) {
        self.put([value as u8]);
    }

    #[inline(always)]
    pub fn put_i8(&mut self, value: i8) {
        self.put([value as u8]);
    }

    #[inline(always)]
    pub fn put_i16(&mut self, value: i16) {
        self.put(value.to_le_bytes());
    }

    #[inline(always)]
    pub fn put_i32(&mut self, value: i32) {
        self.put(value.to_le_bytes());
    }

    #[inline(always)]
    pub fn put_i64(&mut self, value: i64) {
        self.put(value.to_le_bytes());
    }

    #[inline(always)]
    pub fn put_f32(&mut self, value: f32) {
        self.put(value.to_le_bytes());
    }

    #[inline(always)]
    pub fn put_f64(&mut self, value: f64) {
        self.put(value.to_le_bytes());
    }

    /// Callers reserve [`MAX_VARINT32_SIZE`] for each of these.
    #[inline(always)]
    pub fn put_varint32(&mut self, value: i32) {
        self.put_varuint64(zigzag32(value) as u64);
    }

    /// Callers reserve [`MAX_VARINT64_SIZE`] for each of these.
    #[inline(always)]
    pub fn put_varint64(&mut self, value: i64) {
        self.put_varuint64(zigzag64(value));
    }

    #[inline(always)]
    fn put_varuint64(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.put([(value as u8) | 0x80]);
            value >>= 7;
        }
        self.put([value as u8]);
    }
}

impl Drop for BlockWriter<'_> {
    #[inline(always)]
    fn drop(&mut self) {
        // SAFETY: every byte in `len..pos` was written by `put`.
        unsafe { self.bf.set_len(self.pos) }
    }
}

/// Zero-copy reader over a borrowed byte slice.
#[derive(Clone, Copy, Debug)]
pub struct Reader<'a> {
    bf: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bf: &'a [u8]) -> Reader<'a> {
        Reader { bf, cursor: 0 }
    }

    #[inline(always)]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.bf.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.bf.is_empty()
    }

    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.bf.len() - self.cursor
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.bf
    }

    pub fn slice_after_cursor(&self) -> &'a [u8] {
        &self.bf[self.cursor..]
    }

    /// A read-only view of `len` bytes at `offset`, sharing the same storage.
    pub fn slice(&self, offset: usize, len: usize) -> Result<Reader<'a>, Error> {
        match offset.checked_add(len) {
            Some(end) if end <= self.bf.len() => Ok(Reader::new(&self.bf[offset..end])),
            _ => Err(Error::buffer_underflow(offset, len, self.bf.len())),
        }
    }

    #[inline(always)]
    fn check(&self, needed: usize) -> Result<(), Error> {
        if needed > self.bf.len() - self.cursor {
            return Err(Error::buffer_underflow(self.cursor, needed, self.bf.len()));
        }
        Ok(())
    }

    #[inline(always)]
    pub fn skip(&mut self, len: usize) -> Result<(), Error> {
        self.check(len)?;
        self.cursor += len;
        Ok(())
    }

    #[inline(always)]
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], Error> {
        self.check(len)?;
        let s = &self.bf[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(s)
    }

    #[inline(always)]
    pub fn read_u8(&mut self) -> Result<u8, Error> {
        self.check(1)?;
        let v = self.bf[self.cursor];
        self.cursor += 1;
        Ok(v)
    }

    #[inline(always)]
    pub fn read_i8(&mut self) -> Result<i8, Error> {
        Ok(self.read_u8()? as i8)
    }

    #[inline(always)]
    pub fn read_bool(&mut self) -> Result<bool, Error> {
        Ok(self.read_u8()? != 0)
    }

    #[inline(always)]
    pub fn read_u16(&mut self) -> Result<u16, Error> {
        Ok(LittleEndian::read_u16(self.read_bytes(2)?))
    }

    #[inline(always)]
    pub fn read_i16(&mut self) -> Result<i16, Error> {
        Ok(self.read_u16()? as i16)
    }

    #[inline(always)]
    pub fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    #[inline(always)]
    pub fn read_i32(&mut self) -> Result<i32, Error> {
        Ok(self.read_u32()? as i32)
    }

    #[inline(always)]
    pub fn read_f32(&mut self) -> Result<f32, Error> {
        Ok(LittleEndian::read_f32(self.read_bytes(4)?))
    }

    #[inline(always)]
    pub fn read_u64(&mut self) -> Result<u64, Error> {
        Ok(LittleEndian::read_u64(self.read_bytes(8)?))
    }

    #[inline(always)]
    pub fn read_i64(&mut self) -> Result<i64, Error> {
        Ok(self.read_u64()? as i64)
    }

    #[inline(always)]
    pub fn read_f64(&mut self) -> Result<f64, Error> {
        Ok(LittleEndian::read_f64(self.read_bytes(8)?))
    }

    #[inline(always)]
    pub fn read_varuint32(&mut self) -> Result<u32, Error> {
        if let Some(&b0) = self.bf.get(self.cursor) {
            if b0 < 0x80 {
                self.cursor += 1;
                return Ok(b0 as u32);
            }
        }
        let v = self.read_varuint64()?;
        if v > u32::MAX as u64 {
            return Err(Error::invalid_data(format!("varuint32 overflow: {v}")));
        }
        Ok(v as u32)
    }

    #[inline(always)]
    pub fn read_varint32(&mut self) -> Result<i32, Error> {
        Ok(unzigzag32(self.read_varuint32()?))
    }

    pub fn read_varuint64(&mut self) -> Result<u64, Error> {
        let mut result = 0u64;
        for i in 0..MAX_VARINT64_SIZE {
            let b = self.read_u8()?;
            result |= ((b & 0x7F) as u64) << (7 * i);
            if b < 0x80 {
                return Ok(result);
            }
        }
        Err(Error::invalid_data("varint longer than 10 bytes"))
    }

    #[inline(always)]
    pub fn read_varint64(&mut self) -> Result<i64, Error> {
        Ok(unzigzag64(self.read_varuint64()?))
    }

    pub fn read_utf8(&mut self, len: usize) -> Result<&'a str, Error> {
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes).map_err(|e| Error::invalid_data(format!("invalid UTF-8: {e}")))
    }

    /// Reads a varuint32 length followed by that many UTF-8 bytes.
    pub fn read_utf8_string(&mut self) -> Result<&'a str, Error> {
        let len = self.read_varuint32()? as usize;
        self.read_utf8(len)
    }

    /// Checks `len` bytes once and returns a reader over them that performs no
    /// further bounds checks of its own.
    #[inline(always)]
    pub(crate) fn block(&mut self, len: usize) -> Result<BlockReader<'a>, Error> {
        let bytes = self.read_bytes(len)?;
        Ok(BlockReader { bf: bytes, pos: 0 })
    }
}

/// Reader over a region validated by [`Reader::block`].
pub(crate) struct BlockReader<'a> {
    bf: &'a [u8],
    pos: usize,
}

impl BlockReader<'_> {
    #[inline(always)]
    fn take<const N: usize>(&mut self) -> [u8; N] {
        debug_assert!(self.pos + N <= self.bf.len());
        let mut out = [0u8; N];
        // SAFETY: the block length equals the summed fixed widths of the
        // fields read from it, checked once in `Reader::block`.
        unsafe {
            std::ptr::copy_nonoverlapping(self.bf.as_ptr().add(self.pos), out.as_mut_ptr(), N);
        }
        self.pos += N;
        out
    }

    #[inline(always)]
    pub fn get_bool(&mut self) -> bool {
        self.take::<1>()[0] != 0
    }

    #[inline(always)]
    pub fn get_i8(&mut self) -> i8 {
        self.take::<1>()[0] as i8
    }

    #[inline(always)]
    pub fn get_i16(&mut self) -> i16 {
        i16::from_le_bytes(self.take())
    }

    #[inline(always)]
    pub fn get_i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }

    #[inline(always)]
    pub fn get_i64(&mut self) -> i64 {
        i64::from_le_bytes(self.take())
    }

    #[inline(always)]
    pub fn get_f32(&mut self) -> f32 {
        f32::from_le_bytes(self.take())
    }

    #[inline(always)]
    pub fn get_f64(&mut self) -> f64 {
        f64::from_le_bytes(self.take())
    }
}
