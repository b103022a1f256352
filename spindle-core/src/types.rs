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

//! Wire constants.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Slot head: the slot holds no value.
pub const NULL_FLAG: u32 = 0;
/// Slot head: a varuint32 ref-id follows, pointing at an earlier value.
pub const REF_FLAG: u32 = 1;
/// Slot head: a value of the declared (monomorphic) type follows.
pub const NOT_NULL_FLAG: u32 = 2;
/// Slot head: an object whose type is given by name (or by class def in
/// compatible mode).
pub const NAMED_OBJECT_FLAG: u32 = 3;
/// Slot head for builtin kind `code` is `BUILTIN_BASE + code`.
pub const BUILTIN_BASE: u32 = 4;
/// Slot head for registered id `id` is `USER_ID_BASE + id`.
pub const USER_ID_BASE: u32 = 32;

/// Boxed-group marker byte for a present value.
pub const PRESENT: u8 = 1;
/// Boxed-group marker byte for a missing value.
pub const ABSENT: u8 = 0;

// Collection header bits.
pub const TRACKING_REF: u8 = 0b1;
pub const HAS_NULL: u8 = 0b10;
/// Elements are of the declared element type; no type info is written.
pub const DECL_ELEMENT_TYPE: u8 = 0b100;
/// All elements share one runtime type, written once after the header.
pub const SAME_TYPE: u8 = 0b1000;

/// Binary payloads: low bit set means the value is an out-of-band index.
pub const BINARY_OUT_OF_BAND: u32 = 1;

/// Builtin type codes, shared by slot heads and class def field types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum TypeCode {
    Bool = 1,
    Int8 = 2,
    Int16 = 3,
    Int32 = 4,
    Int64 = 5,
    Float32 = 6,
    Float64 = 7,
    String = 8,
    Binary = 9,
    BoolArray = 10,
    Int16Array = 11,
    Int32Array = 12,
    Int64Array = 13,
    Float32Array = 14,
    Float64Array = 15,
    List = 16,
    Set = 17,
    Map = 18,
    /// Class def only: a monomorphic user object field.
    Object = 19,
    /// Class def only: a polymorphic field.
    Any = 20,
}

impl TypeCode {
    /// Slot head announcing a value of this builtin kind.
    #[inline(always)]
    pub fn slot_head(self) -> u32 {
        BUILTIN_BASE + self as u32
    }

    /// Inverse of [`TypeCode::slot_head`].
    #[inline]
    pub fn from_slot_head(head: u32) -> Option<TypeCode> {
        if (BUILTIN_BASE..USER_ID_BASE).contains(&head) {
            TypeCode::try_from((head - BUILTIN_BASE) as u8)
                .ok()
                .filter(|code| !matches!(code, TypeCode::Object | TypeCode::Any))
        } else {
            None
        }
    }

    /// Width in bytes of a fixed-width primitive.
    #[inline(always)]
    pub fn primitive_size(self) -> Option<usize> {
        match self {
            TypeCode::Bool | TypeCode::Int8 => Some(1),
            TypeCode::Int16 => Some(2),
            TypeCode::Int32 | TypeCode::Float32 => Some(4),
            TypeCode::Int64 | TypeCode::Float64 => Some(8),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn is_primitive(self) -> bool {
        self.primitive_size().is_some()
    }

    /// Kinds whose values carry identity and can be ref-tracked.
    #[inline(always)]
    pub fn is_ref_node(self) -> bool {
        matches!(
            self,
            TypeCode::List | TypeCode::Set | TypeCode::Map | TypeCode::Object | TypeCode::Any
        )
    }
}
