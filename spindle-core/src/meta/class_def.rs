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

//! Self-describing type definitions exchanged in compatible mode.
//!
//! A class def record is laid out as
//!
//! ```text
//! | varuint32 body len | u64 def hash | body |
//! ```
//!
//! where the def hash is [`digest64`] of the body, so a reader that has seen
//! the same definition before can skip the body without parsing it. The body:
//!
//! ```text
//! | flags: u8 | [varuint32 id] | type name | varuint32 field count | fields... |
//! field: | flags: u8 | name | [qualifier] | wire type |
//! wire type: | code: u8 | list/set: elem | map: key, value | object: name |
//! ```
//!
//! Fields are listed in layout order. The structural hash is not carried; it
//! is recomputed from the listed fields.

use crate::buffer::{Reader, Writer};
use crate::ensure;
use crate::error::Error;
use crate::meta::hash::digest64;
use crate::meta::layout::{compare_in_group, FieldDescriptor, FieldGroup, FieldLayout};
use crate::meta::type_def::{FieldType, TypeDef};
use crate::types::TypeCode;
use std::cmp::Ordering;
use std::sync::Arc;

const BY_ID: u8 = 0b1;

const FIELD_NULLABLE: u8 = 0b1;
const FIELD_QUALIFIED: u8 = 0b10;

/// Nesting limit for wire types such as `list<map<string, list<int32>>>`.
const MAX_TYPE_NESTING: u32 = 32;

pub struct ClassDef {
    type_name: Arc<str>,
    type_id: Option<u32>,
    layout: FieldLayout,
    def_hash: u64,
    encoded: Vec<u8>,
}

impl ClassDef {
    /// Describes a registered type.
    pub fn from_layout(type_name: &Arc<str>, type_id: Option<u32>, layout: &FieldLayout) -> ClassDef {
        let mut body = Writer::with_capacity(64 + layout.len() * 16);
        match type_id {
            Some(id) => {
                body.write_u8(BY_ID);
                body.write_varuint32(id);
            }
            None => body.write_u8(0),
        }
        body.write_utf8_string(type_name);
        body.write_varuint32(layout.len() as u32);
        for field in layout.fields() {
            let mut flags = 0;
            if field.nullable {
                flags |= FIELD_NULLABLE;
            }
            if field.qualifier.is_some() {
                flags |= FIELD_QUALIFIED;
            }
            body.write_u8(flags);
            body.write_utf8_string(&field.name);
            if let Some(q) = &field.qualifier {
                body.write_utf8_string(q);
            }
            write_wire_type(&mut body, &field.field_type);
        }
        let body = body.into_inner();
        let def_hash = digest64(&body);
        let mut encoded = Writer::with_capacity(body.len() + 16);
        encoded.write_varuint32(body.len() as u32);
        encoded.write_u64(def_hash);
        encoded.write_bytes(&body);
        ClassDef {
            type_name: type_name.clone(),
            type_id,
            layout: layout.clone(),
            def_hash,
            encoded: encoded.into_inner(),
        }
    }

    /// Parses a body whose length prefix and hash were already consumed.
    pub fn from_body(body: &[u8], def_hash: u64) -> Result<ClassDef, Error> {
        ensure!(
            digest64(body) == def_hash,
            "class def hash {:#018x} does not match its body",
            def_hash
        );
        let mut reader = Reader::new(body);
        let flags = reader.read_u8()?;
        let type_id = if flags & BY_ID != 0 {
            Some(reader.read_varuint32()?)
        } else {
            None
        };
        let type_name: Arc<str> = Arc::from(reader.read_utf8_string()?);
        let count = reader.read_varuint32()? as usize;
        // every field takes at least three bytes
        ensure!(
            count <= reader.remaining() / 3,
            "class def `{}` declares {} fields in {} bytes",
            type_name,
            count,
            reader.remaining()
        );
        let mut fields: Vec<FieldDescriptor> = Vec::with_capacity(count);
        for slot in 0..count {
            let flags = reader.read_u8()?;
            let name: Arc<str> = Arc::from(reader.read_utf8_string()?);
            let qualifier = if flags & FIELD_QUALIFIED != 0 {
                Some(Arc::from(reader.read_utf8_string()?))
            } else {
                None
            };
            let field_type = read_wire_type(&mut reader, 0)?;
            let nullable = flags & FIELD_NULLABLE != 0;
            let group = FieldGroup::of(&field_type, nullable);
            let descriptor = FieldDescriptor {
                name,
                qualifier,
                field_type,
                nullable,
                group,
                slot,
            };
            if let Some(prev) = fields.last() {
                check_order(&type_name, prev, &descriptor)?;
            }
            fields.push(descriptor);
        }
        ensure!(
            reader.remaining() == 0,
            "class def `{}` has {} trailing bytes",
            type_name,
            reader.remaining()
        );
        Ok(ClassDef {
            type_name,
            type_id,
            layout: FieldLayout::from_sorted(fields),
            def_hash,
            encoded: Vec::new(),
        })
    }

    /// The type a reader builds when it has no local counterpart.
    pub fn to_type_def(&self) -> Result<TypeDef, Error> {
        let mut builder = TypeDef::builder(&self.type_name);
        let mut fields: Vec<&FieldDescriptor> = self.layout.fields().iter().collect();
        fields.sort_by_key(|f| f.slot);
        for field in fields {
            builder = match &field.qualifier {
                Some(q) => builder.declared_field(q, &field.name, field.field_type.clone(), field.nullable),
                None => builder.field_with(&field.name, field.field_type.clone(), field.nullable),
            };
        }
        builder.build()
    }

    #[inline(always)]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[inline(always)]
    pub fn type_id(&self) -> Option<u32> {
        self.type_id
    }

    /// Fields in wire order.
    #[inline(always)]
    pub fn layout(&self) -> &FieldLayout {
        &self.layout
    }

    #[inline(always)]
    pub fn struct_hash(&self) -> u32 {
        self.layout.struct_hash()
    }

    #[inline(always)]
    pub fn def_hash(&self) -> u64 {
        self.def_hash
    }

    /// Writes the full record. Only defs built by [`ClassDef::from_layout`] carry one.
    #[inline(always)]
    pub fn write_to(&self, writer: &mut Writer) {
        writer.write_bytes(&self.encoded);
    }

    pub fn encoded_len(&self) -> usize {
        self.encoded.len()
    }
}

impl std::fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassDef")
            .field("type_name", &self.type_name)
            .field("type_id", &self.type_id)
            .field("fields", &self.layout.fields())
            .field("def_hash", &format_args!("{:#018x}", self.def_hash))
            .finish()
    }
}

fn check_order(type_name: &str, prev: &FieldDescriptor, next: &FieldDescriptor) -> Result<(), Error> {
    let in_order = match prev.group.cmp(&next.group) {
        Ordering::Less => true,
        Ordering::Greater => false,
        Ordering::Equal => {
            compare_in_group(
                prev.group,
                (&prev.name, prev.qualifier.as_deref(), &prev.field_type),
                (&next.name, next.qualifier.as_deref(), &next.field_type),
            ) == Ordering::Less
        }
    };
    ensure!(
        in_order,
        "class def `{}` lists field `{}` out of layout order",
        type_name,
        next.name
    );
    Ok(())
}

fn write_wire_type(writer: &mut Writer, field_type: &FieldType) {
    writer.write_u8(field_type.code() as u8);
    match field_type {
        FieldType::List(elem) | FieldType::Set(elem) => write_wire_type(writer, elem),
        FieldType::Map(key, value) => {
            write_wire_type(writer, key);
            write_wire_type(writer, value);
        }
        FieldType::Object(name) => writer.write_utf8_string(name),
        _ => {}
    }
}

fn read_wire_type(reader: &mut Reader, nesting: u32) -> Result<FieldType, Error> {
    ensure!(
        nesting < MAX_TYPE_NESTING,
        "class def wire type nests deeper than {}",
        MAX_TYPE_NESTING
    );
    let byte = reader.read_u8()?;
    let code = TypeCode::try_from(byte)
        .map_err(|_| Error::invalid_data(format!("unknown wire type code {byte}")))?;
    Ok(match code {
        TypeCode::List => FieldType::list(read_wire_type(reader, nesting + 1)?),
        TypeCode::Set => FieldType::set(read_wire_type(reader, nesting + 1)?),
        TypeCode::Map => {
            let key = read_wire_type(reader, nesting + 1)?;
            let value = read_wire_type(reader, nesting + 1)?;
            FieldType::map(key, value)
        }
        TypeCode::Object => FieldType::Object(Arc::from(reader.read_utf8_string()?)),
        TypeCode::Any => FieldType::Any,
        other => match FieldType::from_code(other) {
            Some(t) => t,
            None => crate::bail!("wire type code {} is not a field type", byte),
        },
    })
}
