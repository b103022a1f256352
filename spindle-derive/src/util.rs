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

use syn::{Attribute, Field, LitStr};

#[derive(Default)]
pub struct StructMeta {
    pub name: Option<String>,
    pub record: bool,
}

#[derive(Default)]
pub struct FieldMeta {
    pub rename: Option<String>,
    pub skip: bool,
}

pub fn parse_struct_meta(attrs: &[Attribute]) -> syn::Result<StructMeta> {
    let mut meta = StructMeta::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("spindle")) {
        attr.parse_nested_meta(|nested| {
            if nested.path.is_ident("name") {
                let lit: LitStr = nested.value()?.parse()?;
                if lit.value().is_empty() {
                    return Err(syn::Error::new(lit.span(), "type name must not be empty"));
                }
                meta.name = Some(lit.value());
            } else if nested.path.is_ident("record") {
                meta.record = true;
            } else {
                return Err(nested.error("unknown spindle attribute; expected `name` or `record`"));
            }
            Ok(())
        })?;
    }
    Ok(meta)
}

pub fn parse_field_meta(field: &Field) -> syn::Result<FieldMeta> {
    let mut meta = FieldMeta::default();
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("spindle")) {
        attr.parse_nested_meta(|nested| {
            if nested.path.is_ident("rename") {
                let lit: LitStr = nested.value()?.parse()?;
                meta.rename = Some(lit.value());
            } else if nested.path.is_ident("skip") {
                meta.skip = true;
            } else {
                return Err(nested.error("unknown spindle field attribute; expected `rename` or `skip`"));
            }
            Ok(())
        })?;
    }
    Ok(meta)
}
