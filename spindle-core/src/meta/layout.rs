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

//! Field grouping and ordering.
//!
//! A type's fields are partitioned into six groups, each sorted
//! deterministically, and the concatenation is the order fields appear on
//! the wire:
//!
//! 1. non-null primitives, by descending width then name, so the whole group
//!    packs without padding into one bounds-checked block;
//! 2. nullable (boxed) primitives, same order;
//! 3. monomorphic references (strings, binaries, arrays, declared user types),
//!    by type then name; no type tag is written for them;
//! 4. polymorphic references, by name;
//! 5. lists and sets, by name;
//! 6. maps, by name.
//!
//! Names shared by several fields of a hierarchy are disambiguated by the
//! declaring type, which then also takes part in ordering and hashing.

use crate::buffer::{MAX_VARINT32_SIZE, MAX_VARINT64_SIZE};
use crate::meta::hash::structural_hash;
use crate::meta::type_def::{FieldType, TypeDef};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldGroup {
    Primitive,
    Boxed,
    Final,
    Other,
    Collection,
    Map,
}

impl FieldGroup {
    pub const ALL: [FieldGroup; 6] = [
        FieldGroup::Primitive,
        FieldGroup::Boxed,
        FieldGroup::Final,
        FieldGroup::Other,
        FieldGroup::Collection,
        FieldGroup::Map,
    ];

    pub fn of(field_type: &FieldType, nullable: bool) -> FieldGroup {
        match field_type {
            t if t.is_primitive() => {
                if nullable {
                    FieldGroup::Boxed
                } else {
                    FieldGroup::Primitive
                }
            }
            FieldType::Any => FieldGroup::Other,
            FieldType::List(_) | FieldType::Set(_) => FieldGroup::Collection,
            FieldType::Map(_, _) => FieldGroup::Map,
            _ => FieldGroup::Final,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    pub name: Arc<str>,
    /// Declaring type; only present when another field shares the name.
    pub qualifier: Option<Arc<str>>,
    pub field_type: FieldType,
    pub nullable: bool,
    pub group: FieldGroup,
    /// Position of the field in the type's declaration order.
    pub slot: usize,
}

impl FieldDescriptor {
    /// `Type.field`, or `Type.Declaring.field` when qualified.
    pub fn display_name(&self, type_name: &str) -> String {
        match &self.qualifier {
            Some(q) => format!("{type_name}.{q}.{}", self.name),
            None => format!("{type_name}.{}", self.name),
        }
    }
}

/// Sort order used inside each group; shared with class def validation.
pub(crate) fn compare_in_group(
    group: FieldGroup,
    a: (&str, Option<&str>, &FieldType),
    b: (&str, Option<&str>, &FieldType),
) -> Ordering {
    let by_name = |a: (&str, Option<&str>, &FieldType), b: (&str, Option<&str>, &FieldType)| {
        a.0.cmp(b.0).then_with(|| a.1.cmp(&b.1))
    };
    match group {
        FieldGroup::Primitive | FieldGroup::Boxed => {
            let size = |t: &FieldType| t.code().primitive_size().unwrap_or(0);
            size(b.2)
                .cmp(&size(a.2))
                .then_with(|| by_name(a, b))
        }
        FieldGroup::Final => (a.2.code() as u8)
            .cmp(&(b.2.code() as u8))
            .then_with(|| by_name(a, b)),
        FieldGroup::Other | FieldGroup::Collection | FieldGroup::Map => by_name(a, b),
    }
}

/// Canonical field order of one type, computed once at registration.
#[derive(Clone, Debug)]
pub struct FieldLayout {
    fields: Vec<FieldDescriptor>,
    /// `ranges[g]` is the slice of `fields` belonging to group `g`.
    ranges: [(usize, usize); 6],
    primitive_width: usize,
    struct_hash: u32,
}

impl FieldLayout {
    pub fn of(def: &TypeDef) -> FieldLayout {
        let mut name_counts: HashMap<&str, usize> = HashMap::new();
        for field in def.fields() {
            *name_counts.entry(&field.name).or_default() += 1;
        }
        let mut fields: Vec<FieldDescriptor> = def
            .fields()
            .iter()
            .enumerate()
            .map(|(slot, f)| FieldDescriptor {
                name: f.name.clone(),
                qualifier: (name_counts[&*f.name] > 1).then(|| f.declaring.clone()),
                field_type: f.field_type.clone(),
                nullable: f.nullable,
                group: FieldGroup::of(&f.field_type, f.nullable),
                slot,
            })
            .collect();
        fields.sort_by(|a, b| {
            a.group.cmp(&b.group).then_with(|| {
                compare_in_group(
                    a.group,
                    (&a.name, a.qualifier.as_deref(), &a.field_type),
                    (&b.name, b.qualifier.as_deref(), &b.field_type),
                )
            })
        });
        FieldLayout::from_sorted(fields)
    }

    /// Builds a layout from descriptors already in wire order.
    pub(crate) fn from_sorted(fields: Vec<FieldDescriptor>) -> FieldLayout {
        let mut ranges = [(0usize, 0usize); 6];
        for (g, group) in FieldGroup::ALL.iter().enumerate() {
            let start = fields.iter().position(|f| f.group == *group);
            ranges[g] = match start {
                Some(s) => {
                    let len = fields[s..].iter().take_while(|f| f.group == *group).count();
                    (s, s + len)
                }
                None => (0, 0),
            };
        }
        let primitive_width = fields[ranges[0].0..ranges[0].1]
            .iter()
            .filter_map(|f| f.field_type.code().primitive_size())
            .sum();
        let struct_hash = structural_hash(fields.iter().map(|f| {
            (
                &*f.name,
                f.qualifier.as_deref(),
                &f.field_type,
                f.nullable,
            )
        }));
        FieldLayout {
            fields,
            ranges,
            primitive_width,
            struct_hash,
        }
    }

    /// All fields in wire order.
    #[inline(always)]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    #[inline(always)]
    pub fn group(&self, group: FieldGroup) -> &[FieldDescriptor] {
        let (start, end) = self.ranges[group as usize];
        &self.fields[start..end]
    }

    /// Fields after the primitive group, in wire order.
    #[inline(always)]
    pub fn non_primitive(&self) -> &[FieldDescriptor] {
        &self.fields[self.ranges[0].1.max(self.ranges[0].0)..]
    }

    /// Fixed width of the primitive group without number compression.
    #[inline(always)]
    pub fn primitive_width(&self) -> usize {
        self.primitive_width
    }

    /// Upper bound of the primitive group's width under the given compression.
    pub fn primitive_max_width(&self, compress_int: bool, compress_long: bool) -> usize {
        self.group(FieldGroup::Primitive)
            .iter()
            .map(|f| match f.field_type {
                FieldType::Int32 if compress_int => MAX_VARINT32_SIZE,
                FieldType::Int64 if compress_long => MAX_VARINT64_SIZE,
                ref t => t.code().primitive_size().unwrap_or(0),
            })
            .sum()
    }

    #[inline(always)]
    pub fn struct_hash(&self) -> u32 {
        self.struct_hash
    }

    /// Same fields in the same wire order. Declaration slots are ignored,
    /// as a class def numbers its fields by wire position.
    pub fn same_wire_fields(&self, other: &FieldLayout) -> bool {
        self.fields.len() == other.fields.len()
            && self.fields.iter().zip(&other.fields).all(|(a, b)| {
                a.name == b.name
                    && a.qualifier == b.qualifier
                    && a.field_type == b.field_type
                    && a.nullable == b.nullable
                    && a.group == b.group
            })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
