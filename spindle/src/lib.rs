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

//! # Spindle
//!
//! Spindle serializes graphs of objects into a compact binary format that
//! other runtimes speaking the same protocol can read back. Shared and cyclic
//! references survive a round trip, and in compatible mode a reader whose
//! type has gained or lost fields still decodes what the writer sent.
//!
//! This crate gathers the public surface of `spindle-core` and the
//! `GraphObject` derive macro.
//!
//! ## Dynamic values
//!
//! Any graph can be built from [`Value`] nodes and user types described by a
//! [`TypeDef`]:
//!
//! ```rust
//! use spindle::{FieldType, Object, Spindle, TypeDef, Value};
//!
//! let mut spindle = Spindle::default();
//! spindle.register(
//!     TypeDef::builder("demo.Point")
//!         .field("x", FieldType::Int32)
//!         .field("y", FieldType::Int32)
//!         .build()?,
//! )?;
//! let def = spindle.type_def("demo.Point").unwrap();
//!
//! let point = Object::new(&def).with("x", 3)?.with("y", 4)?;
//! let bytes = spindle.serialize(&Value::object(point))?;
//! let back = spindle.deserialize(&bytes)?;
//! assert_eq!(back.as_object().unwrap().borrow().get("y"), Some(&Value::Int32(4)));
//! # Ok::<(), spindle::Error>(())
//! ```
//!
//! ## Typed structs
//!
//! `#[derive(GraphObject)]` maps a Rust struct onto a user type:
//!
//! ```rust
//! use spindle::{GraphObject, Spindle};
//!
//! #[derive(GraphObject, Debug, PartialEq)]
//! #[spindle(name = "demo.Person")]
//! struct Person {
//!     name: String,
//!     age: i32,
//!     friends: Vec<String>,
//! }
//!
//! let mut spindle = Spindle::default().compatible(true);
//! spindle.register_type::<Person>()?;
//! let alice = Person { name: "alice".into(), age: 30, friends: vec!["bob".into()] };
//! let bytes = spindle.serialize_object(&alice)?;
//! assert_eq!(spindle.deserialize_object::<Person>(&bytes)?, alice);
//! # Ok::<(), spindle::Error>(())
//! ```
//!
//! ## Configuration
//!
//! [`Spindle`] is configured through builder methods before its first use:
//!
//! - `compatible(true)`: ship class defs and tolerate schema changes
//! - `track_ref(true)`: preserve shared and cyclic references
//! - `require_registration(false)`: write unregistered types by name
//! - `compress_int` / `compress_long`: varint encode 32/64-bit integers
//! - `max_depth(n)`: bound the nesting depth on both sides
//!
//! A configured `Spindle` is `Send + Sync` and is meant to be shared.

pub use spindle_core::{
    codec::cache::CodecFactory, codec::object::ObjectCodec, codec::plan::PlanCodecFactory,
    typed::FromValueContext, typed::ToValueContext, Config, DefaultValue, Error, ErrorCategory,
    FieldType, GraphObject, GraphStruct, MetaContext, Mode, Object, Spindle, TypeDef, TypeKind, Value,
};
pub use spindle_derive::GraphObject;
