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

//! Shared fixtures for the integration tests.

use spindle_core::{FieldType, Object, Spindle, TypeDef, Value};
use std::sync::Arc;

/// Installs `env_logger` once; repeated calls are no-ops.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Serializes `value`, reads it back and checks structural equality.
pub fn test_roundtrip(spindle: &Spindle, value: &Value) -> Value {
    let bytes = spindle.serialize(value).unwrap();
    let back = spindle.deserialize(&bytes).unwrap();
    assert_eq!(&back, value);
    back
}

pub fn point_def() -> TypeDef {
    TypeDef::builder("demo.Point")
        .field("x", FieldType::Int32)
        .field("y", FieldType::Int32)
        .build()
        .unwrap()
}

pub fn point(def: &Arc<TypeDef>, x: i32, y: i32) -> Value {
    Value::object(Object::new(def).with("x", x).unwrap().with("y", y).unwrap())
}

/// A node with a value and an optional link, for chains and cycles.
pub fn node_def() -> TypeDef {
    TypeDef::builder("demo.Node")
        .field("value", FieldType::Int32)
        .field("next", FieldType::object("demo.Node"))
        .build()
        .unwrap()
}

/// A chain of `len` nodes, the head holding `len`.
pub fn chain(def: &Arc<TypeDef>, len: i32) -> Value {
    let mut next = Value::Null;
    for value in 1..=len {
        let node = Object::new(def)
            .with("value", value)
            .unwrap()
            .with("next", next)
            .unwrap();
        next = Value::object(node);
    }
    next
}

/// Registered definition of `name`; objects must be built from it.
pub fn registered(spindle: &Spindle, name: &str) -> Arc<TypeDef> {
    spindle.type_def(name).unwrap()
}

/// Field `name` of the object in `value`.
pub fn field(value: &Value, name: &str) -> Value {
    value
        .as_object()
        .unwrap()
        .borrow()
        .get(name)
        .cloned()
        .unwrap_or(Value::Null)
}
