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

//! Hashing used for structural fingerprints and class def cache keys.

use crate::buffer::Writer;
use crate::meta::type_def::FieldType;
use byteorder::{ByteOrder, LittleEndian};

const HASH_SEED: u64 = 47;

fn fmix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51afd7ed558ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ceb9fe1a85ec53);
    k ^= k >> 33;
    k
}

/// MurmurHash3 x64 128-bit.
pub fn murmurhash3_x64_128(bytes: &[u8], seed: u64) -> (u64, u64) {
    const C1: u64 = 0x87c37b91114253d5;
    const C2: u64 = 0x4cf5ad432745937f;

    let (mut h1, mut h2) = (seed, seed);
    let mut blocks = bytes.chunks_exact(16);
    for block in &mut blocks {
        let mut k1 = LittleEndian::read_u64(&block[..8]);
        let mut k2 = LittleEndian::read_u64(&block[8..]);

        k1 = k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2);
        h1 ^= k1;
        h1 = h1
            .rotate_left(27)
            .wrapping_add(h2)
            .wrapping_mul(5)
            .wrapping_add(0x52dce729);

        k2 = k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1);
        h2 ^= k2;
        h2 = h2
            .rotate_left(31)
            .wrapping_add(h1)
            .wrapping_mul(5)
            .wrapping_add(0x38495ab5);
    }

    let tail = blocks.remainder();
    let (mut k1, mut k2) = (0u64, 0u64);
    for (i, &b) in tail.iter().enumerate() {
        if i < 8 {
            k1 ^= (b as u64) << (8 * i);
        } else {
            k2 ^= (b as u64) << (8 * (i - 8));
        }
    }
    if tail.len() > 8 {
        h2 ^= k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1);
    }
    if !tail.is_empty() {
        h1 ^= k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2);
    }

    h1 ^= bytes.len() as u64;
    h2 ^= bytes.len() as u64;
    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);
    h1 = fmix64(h1);
    h2 = fmix64(h2);
    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);
    (h1, h2)
}

/// 64-bit digest of an encoded record.
#[inline]
pub fn digest64(bytes: &[u8]) -> u64 {
    murmurhash3_x64_128(bytes, HASH_SEED).0
}

/// Low 32 bits of the digest of the ordered, typed field list.
///
/// Each field contributes its name, its qualifier when one is needed, its
/// type signature and its nullability, in layout order. Reordering fields,
/// renaming them or changing a type changes the hash.
pub fn structural_hash<'a, I>(fields: I) -> u32
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>, &'a FieldType, bool)>,
{
    let mut writer = Writer::with_capacity(128);
    for (name, qualifier, field_type, nullable) in fields {
        writer.write_utf8_string(name);
        match qualifier {
            Some(q) => {
                writer.write_u8(1);
                writer.write_utf8_string(q);
            }
            None => writer.write_u8(0),
        }
        writer.write_utf8_string(&field_type.to_string());
        writer.write_bool(nullable);
    }
    digest64(writer.as_slice()) as u32
}
