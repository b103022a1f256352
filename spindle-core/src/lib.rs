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

//! # Spindle Core
//!
//! The core of the Spindle object-graph serializer. It encodes graphs of
//! values (scalars, strings, binaries, primitive arrays, lists, sets, maps
//! and instances of user types) into a compact little-endian binary form
//! and decodes them back, preserving shared and circular references.
//!
//! ## Architecture
//!
//! - **`engine`**: the [`Spindle`] engine and its public API
//! - **`buffer`**: binary [`Writer`](buffer::Writer) and
//!   [`Reader`](buffer::Reader)
//! - **`value`**: the dynamic [`Value`] graph model
//! - **`meta`**: type definitions, field layouts, structural hashes and
//!   class defs
//! - **`resolver`**: type registry, reference and meta tables, per-call
//!   contexts and pooling
//! - **`codec`**: the slot protocol and the per-type object codecs
//! - **`typed`**: mapping between Rust types and value graphs
//! - **`types`**: wire constants
//! - **`error`**: error type and helpers
//!
//! ## Modes
//!
//! - **SchemaConsistent**: both peers share one schema, guarded by a
//!   structural hash
//! - **Compatible**: objects carry class defs, so peers may add, drop or
//!   widen fields independently
//!
//! ## Usage
//!
//! Most users go through the `spindle` crate, which re-exports this one
//! together with the `GraphObject` derive.
//!
//! ```rust
//! use spindle_core::{Spindle, Value};
//!
//! let spindle = Spindle::default().track_ref(true);
//! let shared = Value::list(vec![Value::Int32(1)]);
//! let pair = Value::list(vec![shared.clone(), shared]);
//!
//! let bytes = spindle.serialize(&pair).unwrap();
//! let back = spindle.deserialize(&bytes).unwrap();
//! let items = back.as_list().unwrap().borrow();
//! assert!(items[0].ptr_eq(&items[1]));
//! ```

pub mod buffer;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod meta;
pub mod resolver;
pub mod typed;
pub mod types;
pub mod util;
pub mod value;

pub use config::{Config, Mode};
pub use engine::Spindle;
pub use error::{Error, ErrorCategory};
pub use meta::{DefaultValue, FieldType, TypeDef, TypeKind};
pub use resolver::meta_resolver::MetaContext;
pub use typed::{GraphObject, GraphStruct};
pub use value::{Object, Value};
