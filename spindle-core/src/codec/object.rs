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

//! Object codecs: the field-group encoding of one user type.

use crate::buffer::{BlockReader, BlockWriter, Reader, MAX_VARINT32_SIZE, MAX_VARINT64_SIZE};
use crate::codec::{read_field, write_field};
use crate::error::Error;
use crate::meta::{FieldGroup, FieldLayout, FieldType};
use crate::resolver::context::{ReadContext, WriteContext};
use crate::types::{ABSENT, PRESENT};
use crate::value::{Object, ObjectRef, Value};
use std::sync::Arc;

/// Encodes and decodes the fields of one user type.
///
/// The slot head, the ref-id and the struct hash or class def in front of
/// the fields are handled by the caller; a codec sees only the field groups.
/// Implementations must be `Send + Sync`: one codec serves every thread that
/// shares the engine.
pub trait ObjectCodec: Send + Sync {
    fn write_fields(&self, context: &mut WriteContext, object: &Object) -> Result<(), Error>;

    /// Decodes the fields into `sink`, addressed by declaration index.
    fn read_fields(&self, context: &mut ReadContext, sink: &mut FieldSink) -> Result<(), Error>;
}

/// Destination of decoded field values.
///
/// Structs are decoded in place, so a field that refers back to its own
/// object resolves to the instance being filled. Records collect their
/// values first and are constructed afterwards.
pub enum FieldSink<'s> {
    Object(&'s ObjectRef),
    Buffer(&'s mut Vec<Value>),
}

impl FieldSink<'_> {
    #[inline(always)]
    pub fn put(&mut self, slot: usize, value: Value) -> Result<(), Error> {
        match self {
            FieldSink::Object(object) => {
                let mut object = object.borrow_mut();
                if slot >= object.values().len() {
                    return Err(bad_slot(slot, object.values().len()));
                }
                object.set_index(slot, value);
            }
            FieldSink::Buffer(values) => match values.get_mut(slot) {
                Some(v) => *v = value,
                None => return Err(bad_slot(slot, values.len())),
            },
        }
        Ok(())
    }
}

#[cold]
fn bad_slot(slot: usize, len: usize) -> Error {
    Error::type_error(format!("field index {slot} out of range for {len} fields"))
}

/// Wire form of one primitive field under the engine's number compression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Prim {
    Bool,
    I8,
    I16,
    I32,
    VarI32,
    I64,
    VarI64,
    F32,
    F64,
}

impl Prim {
    pub(crate) fn of(field_type: &FieldType, compress_int: bool, compress_long: bool) -> Option<Prim> {
        Some(match field_type {
            FieldType::Bool => Prim::Bool,
            FieldType::Int8 => Prim::I8,
            FieldType::Int16 => Prim::I16,
            FieldType::Int32 if compress_int => Prim::VarI32,
            FieldType::Int32 => Prim::I32,
            FieldType::Int64 if compress_long => Prim::VarI64,
            FieldType::Int64 => Prim::I64,
            FieldType::Float32 => Prim::F32,
            FieldType::Float64 => Prim::F64,
            _ => return None,
        })
    }

    #[inline(always)]
    pub(crate) fn max_width(self) -> usize {
        match self {
            Prim::Bool | Prim::I8 => 1,
            Prim::I16 => 2,
            Prim::I32 | Prim::F32 => 4,
            Prim::I64 | Prim::F64 => 8,
            Prim::VarI32 => MAX_VARINT32_SIZE,
            Prim::VarI64 => MAX_VARINT64_SIZE,
        }
    }

    #[inline(always)]
    pub(crate) fn is_varint(self) -> bool {
        matches!(self, Prim::VarI32 | Prim::VarI64)
    }

    /// Writes `value`, widening narrower numbers. Returns `false` when the
    /// value does not fit the field.
    #[inline(always)]
    pub(crate) fn put(self, block: &mut BlockWriter, value: &Value) -> bool {
        match self {
            Prim::Bool => match value {
                Value::Bool(v) => block.put_bool(*v),
                _ => return false,
            },
            Prim::I8 => match as_int(value, 1) {
                Some(v) => block.put_i8(v as i8),
                None => return false,
            },
            Prim::I16 => match as_int(value, 2) {
                Some(v) => block.put_i16(v as i16),
                None => return false,
            },
            Prim::I32 => match as_int(value, 4) {
                Some(v) => block.put_i32(v as i32),
                None => return false,
            },
            Prim::VarI32 => match as_int(value, 4) {
                Some(v) => block.put_varint32(v as i32),
                None => return false,
            },
            Prim::I64 => match as_int(value, 8) {
                Some(v) => block.put_i64(v),
                None => return false,
            },
            Prim::VarI64 => match as_int(value, 8) {
                Some(v) => block.put_varint64(v),
                None => return false,
            },
            Prim::F32 => match as_float(value, 4) {
                Some(v) => block.put_f32(v as f32),
                None => return false,
            },
            Prim::F64 => match as_float(value, 8) {
                Some(v) => block.put_f64(v),
                None => return false,
            },
        }
        true
    }

    /// Reads a fixed-width value from a block checked by the caller.
    #[inline(always)]
    pub(crate) fn get(self, block: &mut BlockReader) -> Value {
        match self {
            Prim::Bool => Value::Bool(block.get_bool()),
            Prim::I8 => Value::Int8(block.get_i8()),
            Prim::I16 => Value::Int16(block.get_i16()),
            Prim::I32 | Prim::VarI32 => Value::Int32(block.get_i32()),
            Prim::I64 | Prim::VarI64 => Value::Int64(block.get_i64()),
            Prim::F32 => Value::Float32(block.get_f32()),
            Prim::F64 => Value::Float64(block.get_f64()),
        }
    }

    #[inline(always)]
    pub(crate) fn read(self, reader: &mut Reader) -> Result<Value, Error> {
        Ok(match self {
            Prim::Bool => Value::Bool(reader.read_bool()?),
            Prim::I8 => Value::Int8(reader.read_i8()?),
            Prim::I16 => Value::Int16(reader.read_i16()?),
            Prim::I32 => Value::Int32(reader.read_i32()?),
            Prim::VarI32 => Value::Int32(reader.read_varint32()?),
            Prim::I64 => Value::Int64(reader.read_i64()?),
            Prim::VarI64 => Value::Int64(reader.read_varint64()?),
            Prim::F32 => Value::Float32(reader.read_f32()?),
            Prim::F64 => Value::Float64(reader.read_f64()?),
        })
    }
}

#[inline(always)]
fn as_int(value: &Value, width: usize) -> Option<i64> {
    match value {
        Value::Int8(v) => Some(*v as i64),
        Value::Int16(v) if width >= 2 => Some(*v as i64),
        Value::Int32(v) if width >= 4 => Some(*v as i64),
        Value::Int64(v) if width >= 8 => Some(*v),
        _ => None,
    }
}

#[inline(always)]
fn as_float(value: &Value, width: usize) -> Option<f64> {
    match value {
        Value::Float32(v) => Some(*v as f64),
        Value::Float64(v) if width >= 8 => Some(*v),
        Value::Int8(v) => Some(*v as f64),
        Value::Int16(v) => Some(*v as f64),
        Value::Int32(v) if width >= 8 => Some(*v as f64),
        _ => None,
    }
}

#[cold]
pub(crate) fn primitive_mismatch(field: &str, field_type: &FieldType, value: &Value) -> Error {
    if value.is_null() {
        return Error::type_error(format!(
            "field `{field}` is a non-nullable {field_type} but holds null"
        ));
    }
    Error::type_error(format!(
        "field `{field}` is declared {field_type} but holds {}",
        value.kind_name()
    ))
}

/// Boxed group: a presence byte, then the value.
pub(crate) fn write_boxed(
    context: &mut WriteContext,
    prim: Prim,
    value: &Value,
) -> Result<bool, Error> {
    if value.is_null() {
        context.writer.write_u8(ABSENT);
        return Ok(true);
    }
    let mut block = context.writer.block(1 + prim.max_width());
    block.put_u8(PRESENT);
    Ok(prim.put(&mut block, value))
}

pub(crate) fn read_boxed(context: &mut ReadContext, prim: Prim) -> Result<Value, Error> {
    match context.reader.read_u8()? {
        ABSENT => Ok(Value::Null),
        PRESENT => prim.read(&mut context.reader),
        other => Err(Error::invalid_data(format!(
            "invalid presence marker {other} for a nullable primitive"
        ))),
    }
}

/// Codec that walks a [`FieldLayout`] on every call.
///
/// Serves a type until its compiled codec is available, and always serves
/// anonymous types decoded from foreign class defs.
pub struct LayoutCodec {
    type_name: Arc<str>,
    layout: Arc<FieldLayout>,
}

impl LayoutCodec {
    pub fn new(type_name: &Arc<str>, layout: &Arc<FieldLayout>) -> LayoutCodec {
        LayoutCodec {
            type_name: type_name.clone(),
            layout: layout.clone(),
        }
    }

    fn field_name(&self, index: usize) -> String {
        self.layout.fields()[index].display_name(&self.type_name)
    }
}

impl ObjectCodec for LayoutCodec {
    fn write_fields(&self, context: &mut WriteContext, object: &Object) -> Result<(), Error> {
        let config = context.spindle().config();
        let (compress_int, compress_long) = (config.is_compress_int(), config.is_compress_long());
        let values = object.values();
        let primitives = self.layout.group(FieldGroup::Primitive);
        if !primitives.is_empty() {
            let mut block = context
                .writer
                .block(self.layout.primitive_max_width(compress_int, compress_long));
            for (i, field) in primitives.iter().enumerate() {
                let value = &values[field.slot];
                let fits = Prim::of(&field.field_type, compress_int, compress_long)
                    .is_some_and(|prim| prim.put(&mut block, value));
                if !fits {
                    return Err(primitive_mismatch(&self.field_name(i), &field.field_type, value));
                }
            }
        }
        let offset = primitives.len();
        for (i, field) in self.layout.non_primitive().iter().enumerate() {
            let value = &values[field.slot];
            if field.group == FieldGroup::Boxed {
                let prim = Prim::of(&field.field_type, compress_int, compress_long);
                let fits = match prim {
                    Some(prim) => write_boxed(context, prim, value)?,
                    None => false,
                };
                if !fits {
                    return Err(primitive_mismatch(
                        &self.field_name(offset + i),
                        &field.field_type,
                        value,
                    ));
                }
            } else {
                write_field(context, value, &field.field_type)
                    .map_err(|e| e.at(|| self.field_name(offset + i)))?;
            }
        }
        Ok(())
    }

    fn read_fields(&self, context: &mut ReadContext, sink: &mut FieldSink) -> Result<(), Error> {
        let config = context.spindle().config();
        let (compress_int, compress_long) = (config.is_compress_int(), config.is_compress_long());
        let primitives = self.layout.group(FieldGroup::Primitive);
        let varint = (compress_int || compress_long)
            && primitives
                .iter()
                .any(|f| matches!(f.field_type, FieldType::Int32 | FieldType::Int64));
        if varint {
            for field in primitives {
                let prim = leaf_prim(&field.field_type, compress_int, compress_long)?;
                sink.put(field.slot, prim.read(&mut context.reader)?)?;
            }
        } else if !primitives.is_empty() {
            let mut block = context.reader.block(self.layout.primitive_width())?;
            for field in primitives {
                let prim = leaf_prim(&field.field_type, false, false)?;
                sink.put(field.slot, prim.get(&mut block))?;
            }
        }
        let offset = primitives.len();
        for (i, field) in self.layout.non_primitive().iter().enumerate() {
            let value = if field.group == FieldGroup::Boxed {
                let prim = leaf_prim(&field.field_type, compress_int, compress_long)?;
                read_boxed(context, prim)?
            } else {
                read_field(context, &field.field_type, &field.field_type)
                    .map_err(|e| e.at(|| self.field_name(offset + i)))?
            };
            sink.put(field.slot, value)?;
        }
        Ok(())
    }
}

#[inline(always)]
pub(crate) fn leaf_prim(
    field_type: &FieldType,
    compress_int: bool,
    compress_long: bool,
) -> Result<Prim, Error> {
    Prim::of(field_type, compress_int, compress_long).ok_or_else(|| {
        Error::type_error(format!("{field_type} is not a primitive type"))
    })
}
