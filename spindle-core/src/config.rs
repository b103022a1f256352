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

/// Wire mode of an engine. Both peers must agree on it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Writer and reader share one schema; a structural hash guards drift.
    #[default]
    SchemaConsistent,
    /// Writer and reader may disagree on fields; class defs travel with the data.
    Compatible,
}

/// Configuration for Spindle serialization.
///
/// Shared read-only between the engine and every per-call context, so both
/// sides of a call see the same options.
#[derive(Clone, Debug)]
pub struct Config {
    /// Schema-consistent or compatible wire mode.
    pub mode: Mode,
    /// Compatible mode only: reference a class def already sent in the same
    /// scope instead of repeating it.
    pub share_meta: bool,
    /// Whether shared and circular references are tracked and preserved.
    pub track_ref: bool,
    /// Reject unregistered types on read and write.
    pub require_registration: bool,
    /// Zig-zag varint encoding for 32-bit integers.
    pub compress_int: bool,
    /// Zig-zag varint encoding for 64-bit integers.
    pub compress_long: bool,
    /// Schema-consistent mode only: write and verify the structural hash.
    pub check_struct_hash: bool,
    /// Maximum nesting of reference nodes in one graph.
    pub max_depth: u32,
    /// Largest element count a collection may declare beyond the input left
    /// to read. Elements of field-less types encode to zero bytes.
    pub max_collection_len: usize,
    /// Pooled write buffers larger than this are shrunk after use.
    pub buffer_size_limit: usize,
    /// Build fast codecs on a background thread instead of on the calling one.
    pub async_compilation: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mode: Mode::SchemaConsistent,
            share_meta: true,
            track_ref: false,
            require_registration: true,
            compress_int: false,
            compress_long: false,
            check_struct_hash: true,
            max_depth: 256,
            max_collection_len: 1 << 20,
            buffer_size_limit: 1 << 20,
            async_compilation: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[inline(always)]
    pub fn is_compatible(&self) -> bool {
        self.mode == Mode::Compatible
    }

    #[inline(always)]
    pub fn is_share_meta(&self) -> bool {
        self.share_meta
    }

    #[inline(always)]
    pub fn is_track_ref(&self) -> bool {
        self.track_ref
    }

    #[inline(always)]
    pub fn is_require_registration(&self) -> bool {
        self.require_registration
    }

    #[inline(always)]
    pub fn is_compress_int(&self) -> bool {
        self.compress_int
    }

    #[inline(always)]
    pub fn is_compress_long(&self) -> bool {
        self.compress_long
    }

    /// Hash is only meaningful in schema-consistent mode.
    #[inline(always)]
    pub fn is_check_struct_hash(&self) -> bool {
        self.check_struct_hash && self.mode == Mode::SchemaConsistent
    }

    #[inline(always)]
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    #[inline(always)]
    pub fn max_collection_len(&self) -> usize {
        self.max_collection_len
    }

    #[inline(always)]
    pub fn buffer_size_limit(&self) -> usize {
        self.buffer_size_limit
    }

    #[inline(always)]
    pub fn is_async_compilation(&self) -> bool {
        self.async_compilation
    }
}
