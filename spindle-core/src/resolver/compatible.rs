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

//! Field mapping between a foreign class def and a local type.
//!
//! Writer fields are matched to local fields by `(qualifier, name)` first.
//! The remaining ones then fall back, in wire order, to the most derived
//! unclaimed local field of that name. A match must be type compatible
//! ([`FieldType::promotes_to`]); otherwise the mapping fails with
//! [`Error::FieldTypeMismatch`]. Writer fields without a match are decoded
//! and dropped. Local fields without a match keep their defaults.

use crate::error::Error;
use crate::meta::{ClassDef, FieldType};
use crate::resolver::type_registry::TypeEntry;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

const MAX_CACHED_MAPPINGS: usize = 8192;

#[derive(Clone, Debug, PartialEq)]
pub struct FieldTarget {
    /// Local declaration index.
    pub slot: usize,
    pub local_type: FieldType,
}

/// Per writer field, where its value goes.
#[derive(Debug)]
pub struct FieldMapping {
    targets: Vec<Option<FieldTarget>>,
    defaulted: Vec<usize>,
    exact: bool,
}

impl FieldMapping {
    pub fn build(remote: &ClassDef, local: &TypeEntry) -> Result<FieldMapping, Error> {
        let def = local.def();
        let fields = remote.layout().fields();
        let mut used = vec![false; def.fields().len()];
        let mut indices: Vec<Option<usize>> = vec![None; fields.len()];
        // Exact `(qualifier, name)` matches claim their slots before any
        // field falls back to the bare name.
        for (i, field) in fields.iter().enumerate() {
            let Some(q) = field.qualifier.as_deref() else {
                continue;
            };
            if let Some(index) = def.field_index_qualified(q, &field.name).filter(|&x| !used[x]) {
                used[index] = true;
                indices[i] = Some(index);
            }
        }
        for (i, field) in fields.iter().enumerate() {
            if indices[i].is_some() {
                continue;
            }
            if let Some(index) = def.field_index(&field.name).filter(|&x| !used[x]) {
                used[index] = true;
                indices[i] = Some(index);
            }
        }
        let mut targets = Vec::with_capacity(fields.len());
        for (field, index) in fields.iter().zip(indices) {
            let Some(index) = index else {
                targets.push(None);
                continue;
            };
            let local_field = &def.fields()[index];
            if !field.field_type.promotes_to(&local_field.field_type) {
                return Err(Error::field_type_mismatch(
                    def.name(),
                    &field.name,
                    &field.field_type,
                    &local_field.field_type,
                ));
            }
            targets.push(Some(FieldTarget {
                slot: index,
                local_type: local_field.field_type.clone(),
            }));
        }
        let defaulted: Vec<usize> = (0..used.len()).filter(|&i| !used[i]).collect();
        let exact = remote.type_name() == def.name()
            && remote.layout().same_wire_fields(local.layout());
        let mapping = FieldMapping {
            targets,
            defaulted,
            exact,
        };
        debug!(
            "mapped `{}` onto `{}`: {} matched, {} dropped, {} defaulted{}",
            remote.type_name(),
            def.name(),
            mapping.matched(),
            mapping.targets.len() - mapping.matched(),
            mapping.defaulted.len(),
            if exact { ", identical layout" } else { "" }
        );
        Ok(mapping)
    }

    /// The writer's fields are the local ones in the same wire order, so the
    /// local codec reads the payload directly.
    #[inline(always)]
    pub fn is_exact(&self) -> bool {
        self.exact
    }

    /// Targets, in writer wire order.
    #[inline(always)]
    pub fn targets(&self) -> &[Option<FieldTarget>] {
        &self.targets
    }

    /// Local fields the writer does not know about.
    pub fn defaulted(&self) -> &[usize] {
        &self.defaulted
    }

    pub fn matched(&self) -> usize {
        self.targets.iter().filter(|t| t.is_some()).count()
    }
}

/// Mappings keyed by foreign def hash and local type name.
#[derive(Default)]
pub struct MappingCache {
    mappings: RwLock<HashMap<(u64, Arc<str>), Arc<FieldMapping>>>,
}

impl MappingCache {
    pub fn get_or_build(
        &self,
        remote: &ClassDef,
        local: &TypeEntry,
    ) -> Result<Arc<FieldMapping>, Error> {
        let key = (remote.def_hash(), local.def().name_arc().clone());
        if let Some(mapping) = self.mappings.read().ok().and_then(|m| m.get(&key).cloned()) {
            return Ok(mapping);
        }
        let mapping = Arc::new(FieldMapping::build(remote, local)?);
        if let Ok(mut mappings) = self.mappings.write() {
            if mappings.len() < MAX_CACHED_MAPPINGS {
                return Ok(mappings.entry(key).or_insert(mapping).clone());
            }
            warn!(
                "field mapping cache is full ({} entries); `{}` is not cached",
                MAX_CACHED_MAPPINGS,
                local.name()
            );
        }
        Ok(mapping)
    }

    /// Drops mappings onto `name`, after it was registered again.
    pub fn invalidate(&self, name: &str) {
        if let Ok(mut mappings) = self.mappings.write() {
            mappings.retain(|(_, local), _| &**local != name);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut mappings) = self.mappings.write() {
            mappings.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.mappings.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
