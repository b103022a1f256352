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

//! The slot protocol.
//!
//! Every value the engine writes sits in a slot. A slot starts with a
//! varuint32 head: null, a back-reference, "value of the declared type", or
//! the value's type (a builtin code, a registered id, or a named object).
//! The payload follows. Ref-tracked nodes (lists, sets, maps and objects)
//! take their ref-id when their head is written, before any of their
//! children, and the reader reserves ids in the same order.

pub mod cache;
pub mod collection;
pub mod object;
pub mod plan;
mod skip;

use crate::error::Error;
use crate::meta::{FieldDef, FieldType, TypeDef, TypeKind};
use crate::resolver::context::{ReadContext, WriteContext};
use crate::resolver::type_registry::TypeEntry;
use crate::types::{
    TypeCode, BINARY_OUT_OF_BAND, NAMED_OBJECT_FLAG, NOT_NULL_FLAG, NULL_FLAG, REF_FLAG,
    USER_ID_BASE,
};
use crate::value::{describe_fields, Object, Value};
use bytes::Bytes;
use object::FieldSink;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

static ANY: FieldType = FieldType::Any;

/// What a slot head announced.
pub(crate) enum TypeHead {
    Builtin(TypeCode),
    Object(Arc<TypeEntry>),
    /// Compatible mode: the payload starts with the type's class def.
    Described,
}

/// Writes `value` into a polymorphic slot.
pub fn write_value(context: &mut WriteContext, value: &Value) -> Result<(), Error> {
    if value.is_null() {
        context.writer.write_varuint32(NULL_FLAG);
        return Ok(());
    }
    if let Some(ref_id) = context.track(value) {
        write_ref(context, ref_id);
        return Ok(());
    }
    let head = write_type_head(context, value)?;
    write_payload(context, value, &head)
}

/// Writes `value` into a slot whose type is fixed by a field declaration.
/// `Any` falls back to a polymorphic slot.
pub fn write_field(
    context: &mut WriteContext,
    value: &Value,
    declared: &FieldType,
) -> Result<(), Error> {
    if let FieldType::Any = declared {
        return write_value(context, value);
    }
    if value.is_null() {
        context.writer.write_varuint32(NULL_FLAG);
        return Ok(());
    }
    if let Some(ref_id) = context.track(value) {
        write_ref(context, ref_id);
        return Ok(());
    }
    context.writer.write_varuint32(NOT_NULL_FLAG);
    write_declared(context, value, declared)
}

#[inline(always)]
fn write_ref(context: &mut WriteContext, ref_id: u32) {
    context.writer.write_varuint32(REF_FLAG);
    context.writer.write_varuint32(ref_id);
}

fn entry_for(context: &WriteContext, object: &Object) -> Result<Arc<TypeEntry>, Error> {
    let spindle = context.spindle();
    spindle
        .registry()
        .entry_for_write(object.def(), spindle.config().is_require_registration())
}

/// Writes the type part of a polymorphic head.
pub(crate) fn write_type_head(context: &mut WriteContext, value: &Value) -> Result<TypeHead, Error> {
    match value {
        Value::Object(object) => {
            let entry = entry_for(context, &object.borrow())?;
            if context.spindle().config().is_compatible() {
                context.writer.write_varuint32(NAMED_OBJECT_FLAG);
            } else {
                match entry.id() {
                    Some(id) => context.writer.write_varuint32(USER_ID_BASE + id),
                    None => {
                        context.writer.write_varuint32(NAMED_OBJECT_FLAG);
                        context.writer.write_utf8_string(entry.name());
                    }
                }
            }
            Ok(TypeHead::Object(entry))
        }
        other => {
            let code = other
                .type_code()
                .ok_or_else(|| Error::type_error("null has no type head"))?;
            context.writer.write_varuint32(code.slot_head());
            Ok(TypeHead::Builtin(code))
        }
    }
}

/// Writes the payload of `value`, which must be of the kind `head` announced.
pub(crate) fn write_payload(
    context: &mut WriteContext,
    value: &Value,
    head: &TypeHead,
) -> Result<(), Error> {
    match (head, value) {
        (TypeHead::Object(entry), Value::Object(object)) => {
            let object = object.borrow();
            if !Arc::ptr_eq(object.def(), entry.def()) && !entry.def().same_shape(object.def()) {
                return Err(Error::type_error(format!(
                    "expected an object of type `{}`, found `{}`",
                    entry.name(),
                    object.type_name()
                )));
            }
            write_object(context, entry, &object)
        }
        (TypeHead::Builtin(code), value) if value.type_code() == Some(*code) => {
            write_builtin(context, value)
        }
        (TypeHead::Builtin(code), value) => Err(Error::type_error(format!(
            "expected {code:?}, found {}",
            value.kind_name()
        ))),
        _ => Err(Error::type_error(format!(
            "expected an object, found {}",
            value.kind_name()
        ))),
    }
}

/// Struct hash or class def, then the field groups.
fn write_object(
    context: &mut WriteContext,
    entry: &Arc<TypeEntry>,
    object: &Object,
) -> Result<(), Error> {
    context.inc_depth()?;
    let spindle = context.spindle();
    let config = spindle.config();
    if config.is_compatible() {
        context.write_class_def(entry.class_def());
    } else if config.is_check_struct_hash() {
        context.writer.write_u32(entry.layout().struct_hash());
    }
    spindle.codec_for(entry).write_fields(context, object)?;
    context.dec_depth();
    Ok(())
}

fn write_declared(
    context: &mut WriteContext,
    value: &Value,
    declared: &FieldType,
) -> Result<(), Error> {
    match (declared, value) {
        (FieldType::Object(name), Value::Object(object)) => {
            let object = object.borrow();
            if object.type_name() != &**name {
                return Err(declared_mismatch(declared, value));
            }
            let entry = entry_for(context, &object)?;
            write_object(context, &entry, &object)
        }
        (FieldType::List(elem), Value::List(items)) | (FieldType::Set(elem), Value::Set(items)) => {
            collection::write_list(context, &items.borrow(), elem)
        }
        (FieldType::Map(key, val), Value::Map(entries)) => {
            collection::write_map(context, &entries.borrow(), key, val)
        }
        (FieldType::Any, value) => write_value(context, value),
        (declared, value) if value.type_code() == Some(declared.code()) => {
            write_builtin(context, value)
        }
        (declared, value) if declared.is_primitive() => {
            let widened = promote(value.clone(), declared);
            if widened.type_code() != Some(declared.code()) {
                return Err(declared_mismatch(declared, value));
            }
            write_builtin(context, &widened)
        }
        (declared, value) => Err(declared_mismatch(declared, value)),
    }
}

#[cold]
fn declared_mismatch(declared: &FieldType, value: &Value) -> Error {
    Error::type_error(format!(
        "expected {declared}, found {}",
        value.kind_name()
    ))
}

/// Largest byte length an in-band binary payload can declare.
const MAX_BINARY_LEN: usize = (u32::MAX >> 1) as usize;

/// `len` as a 32-bit length prefix, or an error when it does not fit.
#[inline(always)]
pub(crate) fn length_prefix(len: usize, max: usize, what: &str) -> Result<u32, Error> {
    match u32::try_from(len) {
        Ok(prefix) if len <= max => Ok(prefix),
        _ => Err(Error::not_allowed(format!(
            "{what} of length {len} exceeds the wire limit of {max}"
        ))),
    }
}

macro_rules! write_array {
    ($context:expr, $items:expr, $width:expr, $put:ident) => {{
        let items = $items;
        let len = length_prefix(items.len(), u32::MAX as usize, "array")?;
        $context.writer.write_varuint32(len);
        let mut block = $context.writer.block(items.len() * $width);
        for item in items.iter() {
            block.$put(*item);
        }
    }};
}

fn write_builtin(context: &mut WriteContext, value: &Value) -> Result<(), Error> {
    let config = context.spindle().config();
    let writer = &mut *context.writer;
    match value {
        Value::Bool(v) => writer.write_bool(*v),
        Value::Int8(v) => writer.write_i8(*v),
        Value::Int16(v) => writer.write_i16(*v),
        Value::Int32(v) if config.is_compress_int() => writer.write_varint32(*v),
        Value::Int32(v) => writer.write_i32(*v),
        Value::Int64(v) if config.is_compress_long() => writer.write_varint64(*v),
        Value::Int64(v) => writer.write_i64(*v),
        Value::Float32(v) => writer.write_f32(*v),
        Value::Float64(v) => writer.write_f64(*v),
        Value::String(s) => {
            length_prefix(s.len(), u32::MAX as usize, "string")?;
            writer.write_utf8_string(s)
        }
        Value::Binary(bytes) => write_binary(context, bytes)?,
        Value::BoolArray(items) => write_array!(context, items, 1, put_bool),
        Value::Int16Array(items) => write_array!(context, items, 2, put_i16),
        Value::Int32Array(items) => write_array!(context, items, 4, put_i32),
        Value::Int64Array(items) => write_array!(context, items, 8, put_i64),
        Value::Float32Array(items) => write_array!(context, items, 4, put_f32),
        Value::Float64Array(items) => write_array!(context, items, 8, put_f64),
        Value::List(items) | Value::Set(items) => {
            return collection::write_list(context, &items.borrow(), &ANY)
        }
        Value::Map(entries) => {
            return collection::write_map(context, &entries.borrow(), &ANY, &ANY)
        }
        Value::Null | Value::Object(_) => {
            return Err(Error::type_error(format!(
                "{} is not a builtin value",
                value.kind_name()
            )))
        }
    }
    Ok(())
}

fn write_binary(context: &mut WriteContext, bytes: &Bytes) -> Result<(), Error> {
    match context.claim_buffer(bytes) {
        Some(index) => context
            .writer
            .write_varuint32((index << 1) | BINARY_OUT_OF_BAND),
        None => {
            let len = length_prefix(bytes.len(), MAX_BINARY_LEN, "binary")?;
            context.writer.write_varuint32(len << 1);
            context.writer.write_bytes(bytes);
        }
    }
    Ok(())
}

/// Reads a polymorphic slot.
pub fn read_value(context: &mut ReadContext) -> Result<Value, Error> {
    match context.reader.read_varuint32()? {
        NULL_FLAG => Ok(Value::Null),
        REF_FLAG => context.read_ref(),
        NOT_NULL_FLAG => Err(Error::invalid_data(
            "declared-type marker found in a polymorphic slot",
        )),
        head => {
            let head = read_type_head(context, head)?;
            read_payload(context, &head, &ANY)
        }
    }
}

/// Reads a slot written for a field the writer declared `remote`, and
/// widens the result to the reader's declaration `local`.
pub fn read_field(
    context: &mut ReadContext,
    remote: &FieldType,
    local: &FieldType,
) -> Result<Value, Error> {
    let value = match remote {
        FieldType::Any => read_value(context)?,
        remote => match context.reader.read_varuint32()? {
            NULL_FLAG => Value::Null,
            REF_FLAG => context.read_ref()?,
            NOT_NULL_FLAG => read_declared(context, remote, local)?,
            head => {
                return Err(Error::invalid_data(format!(
                    "invalid slot head {head} for a field declared {remote}"
                )))
            }
        },
    };
    Ok(promote(value, local))
}

/// Resolves the type part of a polymorphic head.
pub(crate) fn read_type_head(context: &mut ReadContext, head: u32) -> Result<TypeHead, Error> {
    let spindle = context.spindle();
    let config = spindle.config();
    match head {
        NAMED_OBJECT_FLAG if config.is_compatible() => Ok(TypeHead::Described),
        NAMED_OBJECT_FLAG => {
            let name = context.reader.read_utf8_string()?;
            let entry = spindle
                .registry()
                .resolve_name(name, config.is_require_registration())?;
            Ok(TypeHead::Object(entry))
        }
        head if head >= USER_ID_BASE => {
            let entry = spindle.registry().resolve_id(head - USER_ID_BASE)?;
            if config.is_compatible() {
                Ok(TypeHead::Described)
            } else {
                Ok(TypeHead::Object(entry))
            }
        }
        head => TypeCode::from_slot_head(head)
            .map(TypeHead::Builtin)
            .ok_or_else(|| Error::invalid_data(format!("invalid slot head {head}"))),
    }
}

pub(crate) fn read_payload(
    context: &mut ReadContext,
    head: &TypeHead,
    local: &FieldType,
) -> Result<Value, Error> {
    match head {
        TypeHead::Builtin(code) => read_builtin(context, *code, local),
        TypeHead::Object(entry) => read_object(context, entry),
        TypeHead::Described => read_described(context),
    }
}

fn read_declared(
    context: &mut ReadContext,
    remote: &FieldType,
    local: &FieldType,
) -> Result<Value, Error> {
    match remote {
        FieldType::Object(name) => {
            let spindle = context.spindle();
            let config = spindle.config();
            if config.is_compatible() {
                return read_described(context);
            }
            let entry = spindle
                .registry()
                .resolve_name(name, config.is_require_registration())?;
            read_object(context, &entry)
        }
        FieldType::List(elem) => collection::read_list(context, elem, local_elem(local), false),
        FieldType::Set(elem) => collection::read_list(context, elem, local_elem(local), true),
        FieldType::Map(key, val) => {
            let (local_key, local_val) = local_entry(local);
            collection::read_map(context, key, val, local_key, local_val)
        }
        FieldType::Any => Err(Error::invalid_data(
            "declared-type marker found on a polymorphic field",
        )),
        other => read_builtin(context, other.code(), local),
    }
}

#[inline(always)]
fn local_elem(local: &FieldType) -> &FieldType {
    match local {
        FieldType::List(elem) | FieldType::Set(elem) => elem,
        _ => &ANY,
    }
}

#[inline(always)]
fn local_entry(local: &FieldType) -> (&FieldType, &FieldType) {
    match local {
        FieldType::Map(key, val) => (key, val),
        _ => (&ANY, &ANY),
    }
}

macro_rules! read_array {
    ($reader:expr, $width:expr, $get:ident) => {{
        let count = $reader.read_varuint32()? as usize;
        let len = count
            .checked_mul($width)
            .ok_or_else(|| Error::invalid_data(format!("array of {count} elements is too large")))?;
        let mut block = $reader.block(len)?;
        (0..count).map(|_| block.$get()).collect()
    }};
}

fn read_builtin(context: &mut ReadContext, code: TypeCode, local: &FieldType) -> Result<Value, Error> {
    let config = context.spindle().config();
    let reader = &mut context.reader;
    Ok(match code {
        TypeCode::Bool => Value::Bool(reader.read_bool()?),
        TypeCode::Int8 => Value::Int8(reader.read_i8()?),
        TypeCode::Int16 => Value::Int16(reader.read_i16()?),
        TypeCode::Int32 if config.is_compress_int() => Value::Int32(reader.read_varint32()?),
        TypeCode::Int32 => Value::Int32(reader.read_i32()?),
        TypeCode::Int64 if config.is_compress_long() => Value::Int64(reader.read_varint64()?),
        TypeCode::Int64 => Value::Int64(reader.read_i64()?),
        TypeCode::Float32 => Value::Float32(reader.read_f32()?),
        TypeCode::Float64 => Value::Float64(reader.read_f64()?),
        TypeCode::String => Value::String(reader.read_utf8_string()?.to_string()),
        TypeCode::Binary => read_binary(context)?,
        TypeCode::BoolArray => Value::BoolArray(read_array!(reader, 1, get_bool)),
        TypeCode::Int16Array => Value::Int16Array(read_array!(reader, 2, get_i16)),
        TypeCode::Int32Array => Value::Int32Array(read_array!(reader, 4, get_i32)),
        TypeCode::Int64Array => Value::Int64Array(read_array!(reader, 8, get_i64)),
        TypeCode::Float32Array => Value::Float32Array(read_array!(reader, 4, get_f32)),
        TypeCode::Float64Array => Value::Float64Array(read_array!(reader, 8, get_f64)),
        TypeCode::List => collection::read_list(context, &ANY, local_elem(local), false)?,
        TypeCode::Set => collection::read_list(context, &ANY, local_elem(local), true)?,
        TypeCode::Map => {
            let (local_key, local_val) = local_entry(local);
            collection::read_map(context, &ANY, &ANY, local_key, local_val)?
        }
        TypeCode::Object | TypeCode::Any => {
            return Err(Error::invalid_data(format!("{code:?} is not a builtin payload")))
        }
    })
}

fn read_binary(context: &mut ReadContext) -> Result<Value, Error> {
    let marker = context.reader.read_varuint32()?;
    if marker & BINARY_OUT_OF_BAND != 0 {
        return Ok(Value::Binary(context.out_of_band(marker >> 1)?));
    }
    let bytes = context.reader.read_bytes((marker >> 1) as usize)?;
    Ok(Value::Binary(Bytes::copy_from_slice(bytes)))
}

/// Schema-consistent object payload.
fn read_object(context: &mut ReadContext, entry: &Arc<TypeEntry>) -> Result<Value, Error> {
    let spindle = context.spindle();
    if spindle.config().is_check_struct_hash() {
        let remote = context.reader.read_u32()?;
        let local = entry.layout().struct_hash();
        if remote != local {
            return Err(Error::incompatible_schema(entry.name(), remote, local));
        }
    }
    let codec = spindle.codec_for(entry);
    build_object(context, entry, |context, sink| codec.read_fields(context, sink))
}

/// Compatible-mode object payload: class def, then the writer's fields.
fn read_described(context: &mut ReadContext) -> Result<Value, Error> {
    let remote = context.read_class_def()?;
    let spindle = context.spindle();
    let require = spindle.config().is_require_registration() && !context.is_skipping();
    let entry = spindle.registry().resolve_class_def(&remote, require)?;
    let mapping = spindle.mappings().get_or_build(&remote, &entry)?;
    if mapping.is_exact() {
        let codec = spindle.codec_for(&entry);
        return build_object(context, &entry, |context, sink| codec.read_fields(context, sink));
    }
    build_object(context, &entry, |context, sink| {
        skip::read_mapped(context, &remote, &mapping, entry.def(), sink)
    })
}

/// Creates the instance for `entry` and registers it as the next ref node.
///
/// Structs are created first and filled in place, so their fields may
/// refer back to them. Records are constructed after all fields are read;
/// a reference to a record that is still being read is an error.
fn build_object<F>(context: &mut ReadContext, entry: &TypeEntry, fill: F) -> Result<Value, Error>
where
    F: FnOnce(&mut ReadContext, &mut FieldSink) -> Result<(), Error>,
{
    context.inc_depth()?;
    let def = entry.def();
    let value = match def.kind() {
        TypeKind::Struct => {
            let object = Rc::new(RefCell::new(Object::new(def)));
            let value = Value::Object(object.clone());
            let ref_id = context.reserve_ref();
            context.set_ref(ref_id, &value);
            fill(context, &mut FieldSink::Object(&object))?;
            value
        }
        TypeKind::Record => {
            let ref_id = context.reserve_ref();
            let mut values: Vec<Value> = def.fields().iter().map(FieldDef::default_value).collect();
            fill(context, &mut FieldSink::Buffer(&mut values))?;
            let value = Value::object(construct(def, values)?);
            context.set_ref(ref_id, &value);
            value
        }
    };
    context.dec_depth();
    Ok(value)
}

fn construct(def: &Arc<TypeDef>, values: Vec<Value>) -> Result<Object, Error> {
    let Some(factory) = def.factory() else {
        return Object::from_values(def, values);
    };
    let decoded = values.clone();
    factory(&**def, values)
        .and_then(|built| Object::from_values(def, built).map_err(|e| e.to_string()))
        .map_err(|reason| Error::construction(def.name(), reason, describe_fields(def, &decoded)))
}

/// Widens a decoded scalar to the reader's declared type. Other values pass
/// through unchanged.
pub(crate) fn promote(value: Value, local: &FieldType) -> Value {
    match (value, local) {
        (Value::Int8(v), FieldType::Int16) => Value::Int16(v as i16),
        (Value::Int8(v), FieldType::Int32) => Value::Int32(v as i32),
        (Value::Int8(v), FieldType::Int64) => Value::Int64(v as i64),
        (Value::Int8(v), FieldType::Float32) => Value::Float32(v as f32),
        (Value::Int8(v), FieldType::Float64) => Value::Float64(v as f64),
        (Value::Int16(v), FieldType::Int32) => Value::Int32(v as i32),
        (Value::Int16(v), FieldType::Int64) => Value::Int64(v as i64),
        (Value::Int16(v), FieldType::Float32) => Value::Float32(v as f32),
        (Value::Int16(v), FieldType::Float64) => Value::Float64(v as f64),
        (Value::Int32(v), FieldType::Int64) => Value::Int64(v as i64),
        (Value::Int32(v), FieldType::Float64) => Value::Float64(v as f64),
        (Value::Float32(v), FieldType::Float64) => Value::Float64(v as f64),
        (value, _) => value,
    }
}
