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

use crate::codec::cache::CodecSlot;
use crate::codec::object::ObjectCodec;
use crate::error::Error;
use crate::meta::{ClassDef, FieldLayout, TypeDef};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Anonymous and dynamically named entries kept at most this many.
const MAX_DYNAMIC_ENTRIES: usize = 8192;

/// Everything the codec needs to know about one user type.
pub struct TypeEntry {
    id: Option<u32>,
    def: Arc<TypeDef>,
    layout: Arc<FieldLayout>,
    class_def: Arc<ClassDef>,
    codec: Arc<CodecSlot>,
    anonymous: bool,
}

impl TypeEntry {
    pub(crate) fn new(
        def: Arc<TypeDef>,
        id: Option<u32>,
        custom: Option<Arc<dyn ObjectCodec>>,
        anonymous: bool,
    ) -> TypeEntry {
        let layout = Arc::new(FieldLayout::of(&def));
        let class_def = Arc::new(ClassDef::from_layout(def.name_arc(), id, &layout));
        let codec = Arc::new(CodecSlot::new(def.name_arc(), &layout, custom));
        TypeEntry {
            id,
            def,
            layout,
            class_def,
            codec,
            anonymous,
        }
    }

    /// Wire id, when registered by id.
    #[inline(always)]
    pub fn id(&self) -> Option<u32> {
        self.id
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        self.def.name()
    }

    #[inline(always)]
    pub fn def(&self) -> &Arc<TypeDef> {
        &self.def
    }

    #[inline(always)]
    pub fn layout(&self) -> &Arc<FieldLayout> {
        &self.layout
    }

    #[inline(always)]
    pub fn class_def(&self) -> &Arc<ClassDef> {
        &self.class_def
    }

    #[inline(always)]
    pub(crate) fn codec_slot(&self) -> &Arc<CodecSlot> {
        &self.codec
    }

    /// Built by the reader from a class def with no local counterpart.
    #[inline(always)]
    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }
}

impl std::fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeEntry")
            .field("id", &self.id)
            .field("name", &self.def.name())
            .field("struct_hash", &format_args!("{:#010x}", self.layout.struct_hash()))
            .field("anonymous", &self.anonymous)
            .finish()
    }
}

/// Maps wire ids and names to local types.
///
/// Registration happens through `&mut self` during engine setup. Entries
/// created while serializing (unregistered types in permissive mode and
/// anonymous types decoded from foreign class defs) live behind locks so the
/// registry can be shared by concurrent calls.
#[derive(Default)]
pub struct TypeRegistry {
    by_name: HashMap<Arc<str>, Arc<TypeEntry>>,
    by_id: Vec<Arc<TypeEntry>>,
    custom_codecs: HashMap<Arc<str>, Arc<dyn ObjectCodec>>,
    denied: HashSet<String>,
    dynamic: RwLock<HashMap<Arc<str>, Arc<TypeEntry>>>,
    anonymous: RwLock<HashMap<u64, Arc<TypeEntry>>>,
}

impl TypeRegistry {
    /// Registers `def` under the next wire id, or re-registers it under the id
    /// it already has. Returns the id.
    pub fn register(&mut self, def: TypeDef) -> Result<u32, Error> {
        self.check_allowed(def.name())?;
        let def = Arc::new(def);
        let id = match self.by_name.get(def.name()).and_then(|e| e.id()) {
            Some(id) => id,
            None => self.by_id.len() as u32,
        };
        let entry = Arc::new(TypeEntry::new(
            def.clone(),
            Some(id),
            self.custom_codecs.get(def.name()).cloned(),
            false,
        ));
        if (id as usize) < self.by_id.len() {
            debug!("re-registered type `{}` with id {}", def.name(), id);
            self.by_id[id as usize] = entry.clone();
        } else {
            debug!("registered type `{}` with id {}", def.name(), id);
            self.by_id.push(entry.clone());
        }
        self.insert_by_name(entry);
        Ok(id)
    }

    /// Registers `def` to be written by name. A type that already has an id keeps it.
    pub fn register_by_name(&mut self, def: TypeDef) -> Result<(), Error> {
        if self.by_name.get(def.name()).and_then(|e| e.id()).is_some() {
            return self.register(def).map(|_| ());
        }
        self.check_allowed(def.name())?;
        let custom = self.custom_codecs.get(def.name()).cloned();
        debug!("registered type `{}` by name", def.name());
        self.insert_by_name(Arc::new(TypeEntry::new(Arc::new(def), None, custom, false)));
        Ok(())
    }

    fn insert_by_name(&mut self, entry: Arc<TypeEntry>) {
        let name = entry.def().name_arc().clone();
        if let Ok(mut dynamic) = self.dynamic.write() {
            dynamic.remove(&name);
        }
        self.by_name.insert(name, entry);
    }

    fn check_allowed(&self, name: &str) -> Result<(), Error> {
        if self.denied.contains(name) {
            return Err(Error::disallowed(name.to_string()));
        }
        Ok(())
    }

    /// Installs a hand-written codec for `name`, now and for later registrations.
    pub fn register_codec(&mut self, name: &str, codec: Arc<dyn ObjectCodec>) {
        let name: Arc<str> = Arc::from(name);
        self.custom_codecs.insert(name.clone(), codec);
        if let Some(entry) = self.by_name.get(&name).cloned() {
            self.rebuild(&entry);
        }
    }

    /// Recreates every entry, dropping all built codecs.
    pub(crate) fn reset_codecs(&mut self) {
        let entries: Vec<_> = self.by_name.values().cloned().collect();
        for entry in entries {
            self.rebuild(&entry);
        }
        if let Ok(mut dynamic) = self.dynamic.write() {
            dynamic.clear();
        }
        if let Ok(mut anonymous) = self.anonymous.write() {
            anonymous.clear();
        }
    }

    fn rebuild(&mut self, entry: &Arc<TypeEntry>) {
        let fresh = Arc::new(TypeEntry::new(
            entry.def().clone(),
            entry.id(),
            self.custom_codecs.get(entry.name()).cloned(),
            false,
        ));
        if let Some(id) = entry.id() {
            self.by_id[id as usize] = fresh.clone();
        }
        self.insert_by_name(fresh);
    }

    pub fn deny(&mut self, name: &str) {
        warn_if_registered(self.by_name.contains_key(name), name);
        self.denied.insert(name.to_string());
    }

    #[inline(always)]
    pub fn is_denied(&self, name: &str) -> bool {
        !self.denied.is_empty() && self.denied.contains(name)
    }

    #[inline(always)]
    pub fn get_by_id(&self, id: u32) -> Option<&Arc<TypeEntry>> {
        self.by_id.get(id as usize)
    }

    #[inline(always)]
    pub fn get_by_name(&self, name: &str) -> Option<&Arc<TypeEntry>> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Entry used to write an object built from `def`.
    ///
    /// Unregistered types are rejected when `require_registration` is set and
    /// get a name-only dynamic entry otherwise. The object's definition must
    /// be the registered one, or one of identical shape.
    pub fn entry_for_write(
        &self,
        def: &Arc<TypeDef>,
        require_registration: bool,
    ) -> Result<Arc<TypeEntry>, Error> {
        if self.is_denied(def.name()) {
            return Err(Error::disallowed(def.name().to_string()));
        }
        let entry = match self.by_name.get(def.name()) {
            Some(entry) => entry.clone(),
            None => self.dynamic_entry(def, require_registration)?,
        };
        if !Arc::ptr_eq(entry.def(), def) && !entry.def().same_shape(def) {
            return Err(Error::type_error(format!(
                "object of type `{}` was built from a definition that differs from the registered one",
                def.name()
            )));
        }
        Ok(entry)
    }

    fn dynamic_entry(
        &self,
        def: &Arc<TypeDef>,
        require_registration: bool,
    ) -> Result<Arc<TypeEntry>, Error> {
        if require_registration {
            return Err(unregistered(def.name()));
        }
        if let Some(entry) = self.dynamic.read().ok().and_then(|m| m.get(def.name()).cloned()) {
            return Ok(entry);
        }
        let entry = Arc::new(TypeEntry::new(def.clone(), None, None, false));
        if let Ok(mut dynamic) = self.dynamic.write() {
            if dynamic.len() < MAX_DYNAMIC_ENTRIES {
                debug!("created dynamic entry for unregistered type `{}`", def.name());
                return Ok(dynamic.entry(def.name_arc().clone()).or_insert(entry).clone());
            }
            warn!(
                "dynamic type cache is full ({} entries); `{}` is not cached",
                MAX_DYNAMIC_ENTRIES,
                def.name()
            );
        }
        Ok(entry)
    }

    /// Resolves a type named in a consistent-mode stream.
    pub fn resolve_name(&self, name: &str, require_registration: bool) -> Result<Arc<TypeEntry>, Error> {
        if self.is_denied(name) {
            return Err(Error::disallowed(name.to_string()));
        }
        if let Some(entry) = self.by_name.get(name) {
            return Ok(entry.clone());
        }
        if !require_registration {
            if let Some(entry) = self.dynamic.read().ok().and_then(|m| m.get(name).cloned()) {
                return Ok(entry);
            }
        }
        Err(unregistered(name))
    }

    pub fn resolve_id(&self, id: u32) -> Result<Arc<TypeEntry>, Error> {
        match self.by_id.get(id as usize) {
            Some(entry) if self.is_denied(entry.name()) => {
                Err(Error::disallowed(entry.name().to_string()))
            }
            Some(entry) => Ok(entry.clone()),
            None => Err(Error::unknown_type(format!(
                "Type id {id} is not registered; {} ids are known",
                self.by_id.len()
            ))),
        }
    }

    /// Resolves the local type for a foreign class def.
    ///
    /// Lookup is by id when the writer registered the type by id and by name
    /// otherwise. With no local type, the class def itself shapes an anonymous
    /// entry, unless registration is required.
    pub fn resolve_class_def(
        &self,
        remote: &ClassDef,
        require_registration: bool,
    ) -> Result<Arc<TypeEntry>, Error> {
        if self.is_denied(remote.type_name()) {
            return Err(Error::disallowed(remote.type_name().to_string()));
        }
        let local = match remote.type_id() {
            Some(id) => self.by_id.get(id as usize),
            None => self.by_name.get(remote.type_name()),
        };
        if let Some(entry) = local {
            if self.is_denied(entry.name()) {
                return Err(Error::disallowed(entry.name().to_string()));
            }
            return Ok(entry.clone());
        }
        if require_registration {
            return Err(unregistered(remote.type_name()));
        }
        if let Some(entry) = self
            .anonymous
            .read()
            .ok()
            .and_then(|m| m.get(&remote.def_hash()).cloned())
        {
            return Ok(entry);
        }
        let def = Arc::new(remote.to_type_def()?);
        let entry = Arc::new(TypeEntry::new(def, remote.type_id(), None, true));
        if let Ok(mut anonymous) = self.anonymous.write() {
            if anonymous.len() < MAX_DYNAMIC_ENTRIES {
                debug!(
                    "decoding unknown type `{}` as anonymous object",
                    remote.type_name()
                );
                return Ok(anonymous.entry(remote.def_hash()).or_insert(entry).clone());
            }
            warn!(
                "anonymous type cache is full ({} entries); `{}` is not cached",
                MAX_DYNAMIC_ENTRIES,
                remote.type_name()
            );
        }
        Ok(entry)
    }
}

fn unregistered(name: &str) -> Error {
    Error::unknown_type(format!(
        "Type `{name}` is not registered and registration is required"
    ))
}

fn warn_if_registered(registered: bool, name: &str) {
    if registered {
        warn!("type `{}` is registered and now denied; it can no longer be written or read", name);
    }
}
