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

//! Lists, sets and maps.
//!
//! A collection payload is a varuint32 length, then, when non-empty, a
//! header byte and the elements. Maps write their keys as one element
//! sequence and their values as a second one.
//!
//! Header bits:
//! - `DECL_ELEMENT_TYPE`: elements are of the declared element type and
//!   carry no type information;
//! - `SAME_TYPE`: all elements share one runtime type, written once;
//! - `HAS_NULL`, `TRACKING_REF`: with either of the two above, each element
//!   is preceded by a null/ref/not-null marker.
//!
//! With neither of the first two bits every element is a full polymorphic
//! slot.

use crate::codec::{
    length_prefix, promote, read_declared, read_payload, read_type_head, read_value, write_declared,
    write_payload, write_type_head, write_value,
};
use crate::error::Error;
use crate::meta::FieldType;
use crate::resolver::context::{ReadContext, WriteContext};
use crate::types::{
    TypeCode, DECL_ELEMENT_TYPE, HAS_NULL, NOT_NULL_FLAG, NULL_FLAG, REF_FLAG, SAME_TYPE,
    TRACKING_REF,
};
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

const ELEMENT_MARKERS: u8 = HAS_NULL | TRACKING_REF;

pub fn write_list(context: &mut WriteContext, items: &[Value], elem: &FieldType) -> Result<(), Error> {
    context.inc_depth()?;
    let len = length_prefix(items.len(), u32::MAX as usize, "list")?;
    context.writer.write_varuint32(len);
    if !items.is_empty() {
        write_elements(context, items.iter(), elem)?;
    }
    context.dec_depth();
    Ok(())
}

pub fn write_map(
    context: &mut WriteContext,
    entries: &[(Value, Value)],
    key: &FieldType,
    value: &FieldType,
) -> Result<(), Error> {
    context.inc_depth()?;
    let len = length_prefix(entries.len(), u32::MAX as usize, "map")?;
    context.writer.write_varuint32(len);
    if !entries.is_empty() {
        write_elements(context, entries.iter().map(|(k, _)| k), key)
            .map_err(|e| e.at(|| "<key>".to_string()))?;
        write_elements(context, entries.iter().map(|(_, v)| v), value)
            .map_err(|e| e.at(|| "<value>".to_string()))?;
    }
    context.dec_depth();
    Ok(())
}

fn write_elements<'v, I>(context: &mut WriteContext, items: I, elem: &FieldType) -> Result<(), Error>
where
    I: Iterator<Item = &'v Value> + Clone,
{
    let track_ref = context.spindle().config().is_track_ref();
    let mut flags = 0;
    if items.clone().any(Value::is_null) {
        flags |= HAS_NULL;
    }
    if !matches!(elem, FieldType::Any) {
        if track_ref && elem.code().is_ref_node() {
            flags |= TRACKING_REF;
        }
        context.writer.write_u8(flags | DECL_ELEMENT_TYPE);
        for (i, item) in items.enumerate() {
            write_element(context, item, flags, |context, item| {
                write_declared(context, item, elem)
            })
            .map_err(|e| e.at(|| format!("[{i}]")))?;
        }
        return Ok(());
    }
    let Some(first) = common_kind(items.clone()) else {
        context.writer.write_u8(flags);
        for (i, item) in items.enumerate() {
            write_value(context, item).map_err(|e| e.at(|| format!("[{i}]")))?;
        }
        return Ok(());
    };
    if track_ref && first.type_code().is_some_and(TypeCode::is_ref_node) {
        flags |= TRACKING_REF;
    }
    context.writer.write_u8(flags | SAME_TYPE);
    let head = write_type_head(context, first)?;
    for (i, item) in items.enumerate() {
        write_element(context, item, flags, |context, item| {
            write_payload(context, item, &head)
        })
        .map_err(|e| e.at(|| format!("[{i}]")))?;
    }
    Ok(())
}

#[inline(always)]
fn write_element<F>(context: &mut WriteContext, item: &Value, flags: u8, payload: F) -> Result<(), Error>
where
    F: FnOnce(&mut WriteContext, &Value) -> Result<(), Error>,
{
    if flags & ELEMENT_MARKERS != 0 {
        if item.is_null() {
            context.writer.write_varuint32(NULL_FLAG);
            return Ok(());
        }
        if flags & TRACKING_REF != 0 {
            if let Some(ref_id) = context.track(item) {
                context.writer.write_varuint32(REF_FLAG);
                context.writer.write_varuint32(ref_id);
                return Ok(());
            }
        }
        context.writer.write_varuint32(NOT_NULL_FLAG);
    }
    payload(context, item)
}

/// First non-null element, when every non-null element has its kind.
fn common_kind<'v>(items: impl Iterator<Item = &'v Value>) -> Option<&'v Value> {
    let mut first: Option<&Value> = None;
    for item in items.filter(|v| !v.is_null()) {
        match first {
            None => first = Some(item),
            Some(f) if same_kind(f, item) => {}
            Some(_) => return None,
        }
    }
    first
}

fn same_kind(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => {
            Rc::ptr_eq(a, b) || a.borrow().type_name() == b.borrow().type_name()
        }
        (a, b) => a.type_code() == b.type_code(),
    }
}

/// Reads a list (or set) payload whose elements the writer declared `remote`.
pub fn read_list(
    context: &mut ReadContext,
    remote: &FieldType,
    local: &FieldType,
    set: bool,
) -> Result<Value, Error> {
    context.inc_depth()?;
    let len = context.reader.read_varuint32()? as usize;
    let items = Rc::new(RefCell::new(Vec::new()));
    let value = if set {
        Value::Set(items.clone())
    } else {
        Value::List(items.clone())
    };
    let ref_id = context.reserve_ref();
    context.set_ref(ref_id, &value);
    if len > 0 {
        let decoded = read_elements(context, len, remote, local)?;
        *items.borrow_mut() = decoded;
    }
    context.dec_depth();
    Ok(value)
}

pub fn read_map(
    context: &mut ReadContext,
    remote_key: &FieldType,
    remote_value: &FieldType,
    local_key: &FieldType,
    local_value: &FieldType,
) -> Result<Value, Error> {
    context.inc_depth()?;
    let len = context.reader.read_varuint32()? as usize;
    let entries = Rc::new(RefCell::new(Vec::new()));
    let value = Value::Map(entries.clone());
    let ref_id = context.reserve_ref();
    context.set_ref(ref_id, &value);
    if len > 0 {
        let keys = read_elements(context, len, remote_key, local_key)
            .map_err(|e| e.at(|| "<key>".to_string()))?;
        let values = read_elements(context, len, remote_value, local_value)
            .map_err(|e| e.at(|| "<value>".to_string()))?;
        *entries.borrow_mut() = keys.into_iter().zip(values).collect();
    }
    context.dec_depth();
    Ok(value)
}

fn read_elements(
    context: &mut ReadContext,
    len: usize,
    remote: &FieldType,
    local: &FieldType,
) -> Result<Vec<Value>, Error> {
    // Elements may encode to zero bytes, so the input size alone does not
    // bound the loop.
    let remaining = context.reader.remaining();
    if len > remaining && len > context.spindle().config().max_collection_len() {
        return Err(Error::invalid_data(format!(
            "collection of {len} elements exceeds the limit of {} with {remaining} bytes left",
            context.spindle().config().max_collection_len()
        )));
    }
    let flags = context.reader.read_u8()?;
    let mut out = Vec::with_capacity(len.min(remaining));
    if flags & DECL_ELEMENT_TYPE != 0 {
        if matches!(remote, FieldType::Any) {
            return Err(Error::invalid_data(
                "declared element type flag on a collection of polymorphic elements",
            ));
        }
        for i in 0..len {
            let item = read_element(context, flags, |context| read_declared(context, remote, local))
                .map_err(|e| e.at(|| format!("[{i}]")))?;
            out.push(promote(item, local));
        }
    } else if flags & SAME_TYPE != 0 {
        let head = context.reader.read_varuint32()?;
        let head = read_type_head(context, head)?;
        for i in 0..len {
            let item = read_element(context, flags, |context| read_payload(context, &head, local))
                .map_err(|e| e.at(|| format!("[{i}]")))?;
            out.push(promote(item, local));
        }
    } else {
        for i in 0..len {
            let item = read_value(context).map_err(|e| e.at(|| format!("[{i}]")))?;
            out.push(promote(item, local));
        }
    }
    Ok(out)
}

#[inline(always)]
fn read_element<F>(context: &mut ReadContext, flags: u8, payload: F) -> Result<Value, Error>
where
    F: FnOnce(&mut ReadContext) -> Result<Value, Error>,
{
    if flags & ELEMENT_MARKERS == 0 {
        return payload(context);
    }
    match context.reader.read_varuint32()? {
        NULL_FLAG => Ok(Value::Null),
        REF_FLAG => context.read_ref(),
        NOT_NULL_FLAG => payload(context),
        head => Err(Error::invalid_data(format!(
            "invalid element marker {head}"
        ))),
    }
}
