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

//! Mapping between Rust types and value graphs.
//!
//! [`GraphObject`] converts a Rust value to a [`Value`] and back;
//! [`GraphStruct`] additionally describes a user type. Both are usually
//! derived:
//!
//! ```rust
//! use spindle_core::typed::{FromValueContext, GraphObject, GraphStruct, ToValueContext};
//! use spindle_core::{Error, FieldType, Object, TypeDef, Value};
//!
//! #[derive(Debug, PartialEq)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! impl GraphStruct for Point {
//!     const TYPE_NAME: &'static str = "demo.Point";
//!
//!     fn type_def() -> Result<TypeDef, Error> {
//!         TypeDef::builder(Self::TYPE_NAME)
//!             .field_of::<i32>("x")
//!             .field_of::<i32>("y")
//!             .build()
//!     }
//! }
//!
//! impl GraphObject for Point {
//!     fn field_type() -> FieldType {
//!         FieldType::object(Self::TYPE_NAME)
//!     }
//!
//!     fn to_value(&self, context: &mut ToValueContext) -> Result<Value, Error> {
//!         let def = context.type_def::<Self>()?;
//!         let mut object = Object::new(&def);
//!         object.set("x", self.x.to_value(context)?)?;
//!         object.set("y", self.y.to_value(context)?)?;
//!         Ok(Value::object(object))
//!     }
//!
//!     fn from_value(value: &Value, context: &mut FromValueContext) -> Result<Self, Error> {
//!         let object = context.object::<Self>(value)?;
//!         let object = object.borrow();
//!         Ok(Point {
//!             x: context.field(&object, "x")?,
//!             y: context.field(&object, "y")?,
//!         })
//!     }
//! }
//! ```

use crate::codec::promote;
use crate::engine::Spindle;
use crate::error::Error;
use crate::meta::{FieldType, TypeDef};
use crate::value::{Object, ObjectRef, Value};
use bytes::Bytes;
use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;
use std::rc::Rc;
use std::sync::Arc;

const DEFAULT_MAX_DEPTH: u32 = 256;

pub trait GraphObject: Sized {
    /// Declared type of a field holding `Self`.
    fn field_type() -> FieldType;

    /// Whether a field holding `Self` may be null.
    fn nullable() -> bool {
        false
    }

    fn to_value(&self, context: &mut ToValueContext) -> Result<Value, Error>;

    fn from_value(value: &Value, context: &mut FromValueContext) -> Result<Self, Error>;
}

/// A Rust type that is a user type on the wire.
pub trait GraphStruct: GraphObject {
    const TYPE_NAME: &'static str;

    fn type_def() -> Result<TypeDef, Error>;
}

/// State of one Rust-to-value conversion.
pub struct ToValueContext<'a> {
    spindle: Option<&'a Spindle>,
    defs: HashMap<&'static str, Arc<TypeDef>>,
    shared: HashMap<usize, Value>,
}

impl<'a> ToValueContext<'a> {
    /// Objects are built from the definitions registered with `spindle`.
    pub fn new(spindle: &'a Spindle) -> Self {
        ToValueContext {
            spindle: Some(spindle),
            defs: HashMap::new(),
            shared: HashMap::new(),
        }
    }

    /// Objects are built from freshly derived definitions.
    pub fn detached() -> ToValueContext<'static> {
        ToValueContext {
            spindle: None,
            defs: HashMap::new(),
            shared: HashMap::new(),
        }
    }

    /// Definition to build `T` objects from.
    pub fn type_def<T: GraphStruct>(&mut self) -> Result<Arc<TypeDef>, Error> {
        if let Some(def) = self.defs.get(T::TYPE_NAME) {
            return Ok(def.clone());
        }
        let def = match self.spindle.and_then(|s| s.type_def(T::TYPE_NAME)) {
            Some(def) => def,
            None => Arc::new(T::type_def()?),
        };
        self.defs.insert(T::TYPE_NAME, def.clone());
        Ok(def)
    }

    /// Converts a shared value once; later occurrences of the same `Rc`
    /// become the same node.
    pub fn shared<T: GraphObject>(&mut self, rc: &Rc<T>) -> Result<Value, Error> {
        let key = Rc::as_ptr(rc) as *const () as usize;
        if let Some(value) = self.shared.get(&key) {
            return Ok(value.clone());
        }
        let value = (**rc).to_value(self)?;
        self.shared.insert(key, value.clone());
        Ok(value)
    }
}

/// State of one value-to-Rust conversion.
pub struct FromValueContext {
    shared: HashMap<usize, Box<dyn Any>>,
    depth: u32,
    max_depth: u32,
}

impl Default for FromValueContext {
    fn default() -> Self {
        FromValueContext::new(DEFAULT_MAX_DEPTH)
    }
}

impl FromValueContext {
    pub fn new(max_depth: u32) -> Self {
        FromValueContext {
            shared: HashMap::new(),
            depth: 0,
            max_depth,
        }
    }

    /// The object behind `value`, which must be of type `T`.
    pub fn object<'v, T: GraphStruct>(&self, value: &'v Value) -> Result<&'v ObjectRef, Error> {
        let object = value.as_object().ok_or_else(|| expected(T::TYPE_NAME, value))?;
        if object.borrow().type_name() != T::TYPE_NAME {
            return Err(expected(T::TYPE_NAME, value));
        }
        Ok(object)
    }

    /// Converts field `name` of `object`. A field the object does not have
    /// converts from null.
    pub fn field<T: GraphObject>(&mut self, object: &Object, name: &str) -> Result<T, Error> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(Error::depth_exceed(self.max_depth));
        }
        let result = T::from_value(object.get(name).unwrap_or(&Value::Null), self)
            .map_err(|e| e.at(|| format!("{}.{}", object.type_name(), name)));
        self.depth -= 1;
        result
    }

    /// Converts a shared node once; later occurrences of the same node
    /// become clones of the same `Rc`.
    pub fn shared<T: GraphObject + 'static>(&mut self, value: &Value) -> Result<Rc<T>, Error> {
        let Some(key) = value.identity() else {
            return Ok(Rc::new(T::from_value(value, self)?));
        };
        if let Some(rc) = self.shared.get(&key).and_then(|b| b.downcast_ref::<Rc<T>>()) {
            return Ok(rc.clone());
        }
        let rc = Rc::new(T::from_value(value, self)?);
        self.shared.insert(key, Box::new(rc.clone()));
        Ok(rc)
    }
}

#[cold]
fn expected(what: &str, value: &Value) -> Error {
    Error::type_error(format!("expected {what}, found {}", value.kind_name()))
}

macro_rules! impl_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl GraphObject for $ty {
            fn field_type() -> FieldType {
                FieldType::$variant
            }

            fn to_value(&self, _: &mut ToValueContext) -> Result<Value, Error> {
                Ok(Value::$variant(*self))
            }

            fn from_value(value: &Value, _: &mut FromValueContext) -> Result<Self, Error> {
                match promote(value.clone(), &FieldType::$variant) {
                    Value::$variant(v) => Ok(v),
                    _ => Err(expected(stringify!($ty), value)),
                }
            }
        }
    )*};
}

impl_scalar!(
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
);

impl GraphObject for String {
    fn field_type() -> FieldType {
        FieldType::String
    }

    fn to_value(&self, _: &mut ToValueContext) -> Result<Value, Error> {
        Ok(Value::String(self.clone()))
    }

    fn from_value(value: &Value, _: &mut FromValueContext) -> Result<Self, Error> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| expected("string", value))
    }
}

impl GraphObject for Bytes {
    fn field_type() -> FieldType {
        FieldType::Binary
    }

    fn to_value(&self, _: &mut ToValueContext) -> Result<Value, Error> {
        Ok(Value::Binary(self.clone()))
    }

    fn from_value(value: &Value, _: &mut FromValueContext) -> Result<Self, Error> {
        match value {
            Value::Binary(bytes) => Ok(bytes.clone()),
            other => Err(expected("binary", other)),
        }
    }
}

impl GraphObject for Value {
    fn field_type() -> FieldType {
        FieldType::Any
    }

    fn nullable() -> bool {
        true
    }

    fn to_value(&self, _: &mut ToValueContext) -> Result<Value, Error> {
        Ok(self.clone())
    }

    fn from_value(value: &Value, _: &mut FromValueContext) -> Result<Self, Error> {
        Ok(value.clone())
    }
}

impl<T: GraphObject> GraphObject for Option<T> {
    fn field_type() -> FieldType {
        T::field_type()
    }

    fn nullable() -> bool {
        true
    }

    fn to_value(&self, context: &mut ToValueContext) -> Result<Value, Error> {
        match self {
            Some(v) => v.to_value(context),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: &Value, context: &mut FromValueContext) -> Result<Self, Error> {
        match value {
            Value::Null => Ok(None),
            value => T::from_value(value, context).map(Some),
        }
    }
}

impl<T: GraphObject + 'static> GraphObject for Rc<T> {
    fn field_type() -> FieldType {
        T::field_type()
    }

    fn nullable() -> bool {
        T::nullable()
    }

    fn to_value(&self, context: &mut ToValueContext) -> Result<Value, Error> {
        context.shared(self)
    }

    fn from_value(value: &Value, context: &mut FromValueContext) -> Result<Self, Error> {
        context.shared(value)
    }
}

fn items_of<'v>(value: &'v Value, what: &str) -> Result<std::cell::Ref<'v, Vec<Value>>, Error> {
    value
        .as_list()
        .map(|items| items.borrow())
        .ok_or_else(|| expected(what, value))
}

impl<T: GraphObject> GraphObject for Vec<T> {
    fn field_type() -> FieldType {
        FieldType::list(T::field_type())
    }

    fn to_value(&self, context: &mut ToValueContext) -> Result<Value, Error> {
        let items = self
            .iter()
            .map(|item| item.to_value(context))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::list(items))
    }

    fn from_value(value: &Value, context: &mut FromValueContext) -> Result<Self, Error> {
        items_of(value, "list")?
            .iter()
            .map(|item| T::from_value(item, context))
            .collect()
    }
}

impl<T: GraphObject + Eq + Hash> GraphObject for HashSet<T> {
    fn field_type() -> FieldType {
        FieldType::set(T::field_type())
    }

    fn to_value(&self, context: &mut ToValueContext) -> Result<Value, Error> {
        let items = self
            .iter()
            .map(|item| item.to_value(context))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Set(Rc::new(std::cell::RefCell::new(items))))
    }

    fn from_value(value: &Value, context: &mut FromValueContext) -> Result<Self, Error> {
        items_of(value, "set")?
            .iter()
            .map(|item| T::from_value(item, context))
            .collect()
    }
}

fn entries_to_value<'m, K, V, I>(entries: I, context: &mut ToValueContext) -> Result<Value, Error>
where
    K: GraphObject + 'm,
    V: GraphObject + 'm,
    I: Iterator<Item = (&'m K, &'m V)>,
{
    let entries = entries
        .map(|(k, v)| Ok((k.to_value(context)?, v.to_value(context)?)))
        .collect::<Result<Vec<_>, Error>>()?;
    Ok(Value::map(entries))
}

fn entries_from_value<K, V, C>(value: &Value, context: &mut FromValueContext) -> Result<C, Error>
where
    K: GraphObject,
    V: GraphObject,
    C: FromIterator<(K, V)>,
{
    value
        .as_map()
        .ok_or_else(|| expected("map", value))?
        .borrow()
        .iter()
        .map(|(k, v)| Ok((K::from_value(k, context)?, V::from_value(v, context)?)))
        .collect()
}

impl<K: GraphObject + Eq + Hash, V: GraphObject> GraphObject for HashMap<K, V> {
    fn field_type() -> FieldType {
        FieldType::map(K::field_type(), V::field_type())
    }

    fn to_value(&self, context: &mut ToValueContext) -> Result<Value, Error> {
        entries_to_value(self.iter(), context)
    }

    fn from_value(value: &Value, context: &mut FromValueContext) -> Result<Self, Error> {
        entries_from_value(value, context)
    }
}

impl<K: GraphObject + Ord, V: GraphObject> GraphObject for BTreeMap<K, V> {
    fn field_type() -> FieldType {
        FieldType::map(K::field_type(), V::field_type())
    }

    fn to_value(&self, context: &mut ToValueContext) -> Result<Value, Error> {
        entries_to_value(self.iter(), context)
    }

    fn from_value(value: &Value, context: &mut FromValueContext) -> Result<Self, Error> {
        entries_from_value(value, context)
    }
}
