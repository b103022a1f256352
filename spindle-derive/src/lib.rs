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

//! # Spindle Derive Macros
//!
//! `#[derive(GraphObject)]` maps a Rust struct onto a Spindle user type. It
//! implements `GraphObject` (conversion to and from a `Value`) and
//! `GraphStruct` (the type's name and definition) for the annotated struct.
//!
//! **Supported Types:**
//! - Structs with named fields
//! - Tuple structs (fields are named `_0`, `_1`, ...)
//! - Unit structs
//!
//! Every field type must implement `GraphObject`.
//!
//! ## Attributes
//!
//! On the struct:
//! - `#[spindle(name = "pkg.Type")]`: wire name; defaults to the struct name
//! - `#[spindle(record)]`: decode as a record, built after all its fields
//!
//! On a field:
//! - `#[spindle(rename = "other")]`: wire name of the field
//! - `#[spindle(skip)]`: not serialized; read back as `Default::default()`
//!
//! The generated code refers to `spindle_core`, which must be a dependency
//! of the crate using the derive.
//!
//! ```rust
//! use spindle_derive::GraphObject;
//!
//! #[derive(GraphObject, Debug, PartialEq)]
//! #[spindle(name = "demo.Person")]
//! struct Person {
//!     name: String,
//!     age: i32,
//!     nickname: Option<String>,
//! }
//! ```

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod object;
mod util;

/// Derive macro for graph objects.
///
/// # Example
///
/// ```rust
/// use spindle_derive::GraphObject;
/// use std::collections::HashMap;
///
/// #[derive(GraphObject)]
/// #[spindle(name = "demo.Order")]
/// struct Order {
///     id: i64,
///     lines: Vec<Line>,
///     tags: HashMap<String, String>,
/// }
///
/// #[derive(GraphObject)]
/// #[spindle(name = "demo.Line")]
/// struct Line {
///     sku: String,
///     quantity: i32,
/// }
/// ```
#[proc_macro_derive(GraphObject, attributes(spindle))]
pub fn proc_macro_derive_graph_object(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    object::derive_graph_object(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
