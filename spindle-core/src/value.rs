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

//! The dynamic object graph.
//!
//! Scalars, strings, binaries and primitive arrays are plain values.
//! Lists, sets, maps and objects are reference nodes behind `Rc<RefCell<_>>`:
//! cloning a [`Value`] that holds one clones the pointer, so two slots can
//! share a node and a node can contain itself. The pointer is the node's
//! identity for reference tracking.

use crate::error::Error;
use crate::meta::type_def::TypeDef;
use crate::types::TypeCode;
use bytes::Bytes;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

pub type ListRef = Rc<RefCell<Vec<Value>>>;
pub type MapRef = Rc<RefCell<Vec<(Value, Value)>>>;
pub type ObjectRef = Rc<RefCell<Object>>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Binary(Bytes),
    BoolArray(Vec<bool>),
    Int16Array(Vec<i16>),
    Int32Array(Vec<i32>),
    Int64Array(Vec<i64>),
    Float32Array(Vec<f32>),
    Float64Array(Vec<f64>),
    List(ListRef),
    /// Insertion-ordered set.
    Set(ListRef),
    /// Insertion-ordered map.
    Map(MapRef),
    Object(ObjectRef),
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    /// Builds a set, dropping structurally equal duplicates.
    pub fn set(items: Vec<Value>) -> Value {
        let mut unique: Vec<Value> = Vec::with_capacity(items.len());
        for item in items {
            if !unique.contains(&item) {
                unique.push(item);
            }
        }
        Value::Set(Rc::new(RefCell::new(unique)))
    }

    pub fn map(entries: Vec<(Value, Value)>) -> Value {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    pub fn object(object: Object) -> Value {
        Value::Object(Rc::new(RefCell::new(object)))
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::String(s.into())
    }

    #[inline(always)]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Builtin kind of this value; `Object` for user objects, `None` for null.
    #[inline]
    pub fn type_code(&self) -> Option<TypeCode> {
        Some(match self {
            Value::Null => return None,
            Value::Bool(_) => TypeCode::Bool,
            Value::Int8(_) => TypeCode::Int8,
            Value::Int16(_) => TypeCode::Int16,
            Value::Int32(_) => TypeCode::Int32,
            Value::Int64(_) => TypeCode::Int64,
            Value::Float32(_) => TypeCode::Float32,
            Value::Float64(_) => TypeCode::Float64,
            Value::String(_) => TypeCode::String,
            Value::Binary(_) => TypeCode::Binary,
            Value::BoolArray(_) => TypeCode::BoolArray,
            Value::Int16Array(_) => TypeCode::Int16Array,
            Value::Int32Array(_) => TypeCode::Int32Array,
            Value::Int64Array(_) => TypeCode::Int64Array,
            Value::Float32Array(_) => TypeCode::Float32Array,
            Value::Float64Array(_) => TypeCode::Float64Array,
            Value::List(_) => TypeCode::List,
            Value::Set(_) => TypeCode::Set,
            Value::Map(_) => TypeCode::Map,
            Value::Object(_) => TypeCode::Object,
        })
    }

    /// Human readable kind, used in error messages.
    pub fn kind_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Object(o) => o.borrow().type_name().to_string(),
            other => match other.type_code() {
                Some(code) => format!("{code:?}").to_lowercase(),
                None => "null".to_string(),
            },
        }
    }

    /// Pointer identity of a reference node.
    #[inline(always)]
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::List(r) | Value::Set(r) => Some(Rc::as_ptr(r) as *const () as usize),
            Value::Map(r) => Some(Rc::as_ptr(r) as *const () as usize),
            Value::Object(r) => Some(Rc::as_ptr(r) as *const () as usize),
            _ => None,
        }
    }

    /// True if both values are the same reference node.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Any integer that fits in an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int8(v) => Some(*v as i64),
            Value::Int16(v) => Some(*v as i64),
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int8(v) => Some(*v as i32),
            Value::Int16(v) => Some(*v as i32),
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListRef> {
        match self {
            Value::List(r) | Value::Set(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapRef> {
        match self {
            Value::Map(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(r) => Some(r),
            _ => None,
        }
    }

    /// Looks up a map entry by structural key equality.
    pub fn map_get(&self, key: &Value) -> Option<Value> {
        let map = self.as_map()?.borrow();
        map.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    fn eq_inner(&self, other: &Value, seen: &mut HashSet<(usize, usize)>) -> bool {
        if let (Some(a), Some(b)) = (self.identity(), other.identity()) {
            // a pair already being compared is assumed equal; cycles close here
            if a == b || !seen.insert((a, b)) {
                return true;
            }
        }
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int8(a), Value::Int8(b)) => a == b,
            (Value::Int16(a), Value::Int16(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float32(a), Value::Float32(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Float64(a), Value::Float64(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (Value::BoolArray(a), Value::BoolArray(b)) => a == b,
            (Value::Int16Array(a), Value::Int16Array(b)) => a == b,
            (Value::Int32Array(a), Value::Int32Array(b)) => a == b,
            (Value::Int64Array(a), Value::Int64Array(b)) => a == b,
            (Value::Float32Array(a), Value::Float32Array(b)) => a == b,
            (Value::Float64Array(a), Value::Float64Array(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Set(a), Value::Set(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.eq_inner(y, seen))
            }
            (Value::Map(a), Value::Map(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka.eq_inner(kb, seen) && va.eq_inner(vb, seen))
            }
            (Value::Object(a), Value::Object(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.type_name() == b.type_name()
                    && a.values.len() == b.values.len()
                    && a.values
                        .iter()
                        .zip(b.values.iter())
                        .all(|(x, y)| x.eq_inner(y, seen))
            }
            _ => false,
        }
    }

    fn fmt_inner(&self, f: &mut fmt::Formatter<'_>, stack: &mut Vec<usize>) -> fmt::Result {
        if let Some(id) = self.identity() {
            if stack.contains(&id) {
                return f.write_str("<cycle>");
            }
            stack.push(id);
        }
        let res = match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int8(v) => write!(f, "{v}i8"),
            Value::Int16(v) => write!(f, "{v}i16"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}L"),
            Value::Float32(v) => write!(f, "{v}f"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Binary(b) => write!(f, "bytes[{}]", b.len()),
            Value::BoolArray(a) => write!(f, "{a:?}"),
            Value::Int16Array(a) => write!(f, "{a:?}"),
            Value::Int32Array(a) => write!(f, "{a:?}"),
            Value::Int64Array(a) => write!(f, "{a:?}"),
            Value::Float32Array(a) => write!(f, "{a:?}"),
            Value::Float64Array(a) => write!(f, "{a:?}"),
            Value::List(items) | Value::Set(items) => {
                let open = if matches!(self, Value::Set(_)) { "{" } else { "[" };
                f.write_str(open)?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt_inner(f, stack)?;
                }
                f.write_str(if open == "{" { "}" } else { "]" })
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    k.fmt_inner(f, stack)?;
                    f.write_str(": ")?;
                    v.fmt_inner(f, stack)?;
                }
                f.write_str("}")
            }
            Value::Object(object) => {
                let object = object.borrow();
                write!(f, "{} {{", object.type_name())?;
                for (i, (field, value)) in object.def.fields().iter().zip(&object.values).enumerate() {
                    f.write_str(if i > 0 { ", " } else { " " })?;
                    write!(f, "{}: ", field.name)?;
                    value.fmt_inner(f, stack)?;
                }
                f.write_str(" }")
            }
        };
        if self.identity().is_some() {
            stack.pop();
        }
        res
    }
}

/// Structural, cycle-safe equality. Identity is not compared; use
/// [`Value::ptr_eq`] for that.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.eq_inner(other, &mut HashSet::new())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_inner(f, &mut Vec::new())
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Value {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from!(
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    String => String,
    Bytes => Binary,
    Vec<bool> => BoolArray,
    Vec<i16> => Int16Array,
    Vec<i32> => Int32Array,
    Vec<i64> => Int64Array,
    Vec<f32> => Float32Array,
    Vec<f64> => Float64Array,
);

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::String(v.to_string())
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Value {
        Value::object(v)
    }
}

/// An instance of a user type.
#[derive(Clone)]
pub struct Object {
    def: Arc<TypeDef>,
    values: Vec<Value>,
}

impl Object {
    /// A fresh instance holding every field's default.
    pub fn new(def: &Arc<TypeDef>) -> Object {
        Object {
            def: def.clone(),
            values: def.fields().iter().map(|f| f.default_value()).collect(),
        }
    }

    pub fn from_values(def: &Arc<TypeDef>, values: Vec<Value>) -> Result<Object, Error> {
        if values.len() != def.fields().len() {
            return Err(Error::type_error(format!(
                "type `{}` has {} fields, got {} values",
                def.name(),
                def.fields().len(),
                values.len()
            )));
        }
        Ok(Object {
            def: def.clone(),
            values,
        })
    }

    #[inline(always)]
    pub fn def(&self) -> &Arc<TypeDef> {
        &self.def
    }

    #[inline(always)]
    pub fn type_name(&self) -> &str {
        self.def.name()
    }

    #[inline(always)]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.def.field_index(name).map(|i| &self.values[i])
    }

    pub fn get_qualified(&self, declaring: &str, name: &str) -> Option<&Value> {
        self.def
            .field_index_qualified(declaring, name)
            .map(|i| &self.values[i])
    }

    #[inline(always)]
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), Error> {
        match self.def.field_index(name) {
            Some(i) => {
                self.values[i] = value.into();
                Ok(())
            }
            None => Err(Error::type_error(format!(
                "type `{}` has no field `{}`",
                self.def.name(),
                name
            ))),
        }
    }

    pub fn set_qualified(
        &mut self,
        declaring: &str,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), Error> {
        match self.def.field_index_qualified(declaring, name) {
            Some(i) => {
                self.values[i] = value.into();
                Ok(())
            }
            None => Err(Error::type_error(format!(
                "type `{}` has no field `{}.{}`",
                self.def.name(),
                declaring,
                name
            ))),
        }
    }

    /// Builder-style [`Object::set`].
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Object, Error> {
        self.set(name, value)?;
        Ok(self)
    }

    #[inline(always)]
    pub(crate) fn set_index(&mut self, index: usize, value: Value) {
        self.values[index] = value;
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&describe_fields(&self.def, &self.values))
    }
}

/// `Type { a: 1, b: "x" }`, used for construction errors.
pub fn describe_fields(def: &TypeDef, values: &[Value]) -> String {
    let mut out = format!("{} {{", def.name());
    for (i, (field, value)) in def.fields().iter().zip(values).enumerate() {
        out.push_str(if i > 0 { ", " } else { " " });
        out.push_str(&format!("{}: {:?}", field.name, value));
    }
    out.push_str(" }");
    out
}
