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

use crate::buffer::{Reader, Writer};
use crate::error::Error;
use crate::meta::ClassDef;
use log::{debug, trace, warn};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

const MAX_PARSED_NUM_TYPE_DEFS: usize = 8192;

/// Streaming meta writer that writes class defs inline during serialization.
/// Uses the streaming protocol:
/// - (index << 1) | 0 for a new class def (followed by the class def record)
/// - (index << 1) | 1 for a reference to a previously written class def
#[derive(Default)]
pub struct MetaWriter {
    index_map: HashMap<u64, u32>,
}

impl MetaWriter {
    /// Writes `class_def` inline, or a back-reference when it was already
    /// written through this table. With `share` off every entry is written in
    /// full and nothing is remembered.
    #[inline(always)]
    pub fn write_class_def(&mut self, writer: &mut Writer, class_def: &ClassDef, share: bool) {
        if !share {
            writer.write_varuint32(0);
            class_def.write_to(writer);
            return;
        }
        match self.index_map.get(&class_def.def_hash()) {
            Some(&index) => {
                trace!("class def `{}` shared as #{}", class_def.type_name(), index);
                writer.write_varuint32((index << 1) | 1);
            }
            None => {
                let index = self.index_map.len() as u32;
                writer.write_varuint32(index << 1);
                self.index_map.insert(class_def.def_hash(), index);
                class_def.write_to(writer);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.index_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_map.is_empty()
    }

    /// Forgets every entry numbered `len` or higher, keeping the ones before.
    pub fn truncate(&mut self, len: usize) {
        self.index_map.retain(|_, index| (*index as usize) < len);
    }

    #[inline(always)]
    pub fn reset(&mut self) {
        self.index_map.clear();
    }
}

/// Parsed class defs shared by every call of one engine, keyed by def hash.
///
/// A reader that meets a def hash it has parsed before skips the body.
/// The cache stops growing at a fixed size so a stream of distinct forged
/// definitions cannot exhaust memory.
#[derive(Default)]
pub struct ClassDefCache {
    parsed: RwLock<HashMap<u64, Arc<ClassDef>>>,
}

impl ClassDefCache {
    /// Reads one class def record.
    pub fn read(&self, reader: &mut Reader) -> Result<Arc<ClassDef>, Error> {
        let len = reader.read_varuint32()? as usize;
        let def_hash = reader.read_u64()?;
        if let Some(class_def) = self.get(def_hash) {
            reader.skip(len)?;
            return Ok(class_def);
        }
        let body = reader.read_bytes(len)?;
        let class_def = Arc::new(ClassDef::from_body(body, def_hash)?);
        debug!(
            "parsed class def `{}` ({} fields, hash {:#018x})",
            class_def.type_name(),
            class_def.layout().len(),
            def_hash
        );
        if let Ok(mut parsed) = self.parsed.write() {
            if parsed.len() < MAX_PARSED_NUM_TYPE_DEFS {
                parsed.insert(def_hash, class_def.clone());
            } else {
                warn!(
                    "parsed class def cache is full ({} entries); `{}` is not cached",
                    MAX_PARSED_NUM_TYPE_DEFS,
                    class_def.type_name()
                );
            }
        }
        Ok(class_def)
    }

    fn get(&self, def_hash: u64) -> Option<Arc<ClassDef>> {
        self.parsed.read().ok()?.get(&def_hash).cloned()
    }

    pub fn len(&self) -> usize {
        self.parsed.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Streaming meta reader, the mirror of [`MetaWriter`].
#[derive(Default)]
pub struct MetaReader {
    reading: Vec<Arc<ClassDef>>,
}

impl MetaReader {
    #[inline(always)]
    pub fn get(&self, index: usize) -> Option<&Arc<ClassDef>> {
        self.reading.get(index)
    }

    pub fn read_class_def(
        &mut self,
        reader: &mut Reader,
        cache: &ClassDefCache,
        share: bool,
    ) -> Result<Arc<ClassDef>, Error> {
        let marker = reader.read_varuint32()?;
        let index = (marker >> 1) as usize;
        if marker & 1 == 1 {
            return self.reading.get(index).cloned().ok_or_else(|| {
                Error::invalid_data(format!(
                    "class def #{index} referenced before it was defined; {} are known",
                    self.reading.len()
                ))
            });
        }
        let class_def = cache.read(reader)?;
        if share {
            if index != self.reading.len() {
                return Err(Error::invalid_data(format!(
                    "class def #{index} defined out of order; expected #{}",
                    self.reading.len()
                )));
            }
            self.reading.push(class_def.clone());
        }
        Ok(class_def)
    }

    pub fn len(&self) -> usize {
        self.reading.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reading.is_empty()
    }

    #[inline(always)]
    pub fn reset(&mut self) {
        self.reading.clear();
    }
}

/// Meta-share tables owned by the caller.
///
/// Passing the same context to consecutive calls keeps class defs shared
/// across them: each definition crosses the wire once per session instead
/// of once per call. The writing and the reading side must each keep their
/// own context and process the calls in the same order.
#[derive(Default)]
pub struct MetaContext {
    pub(crate) writer: MetaWriter,
    pub(crate) reader: MetaReader,
}

impl MetaContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new session.
    pub fn reset(&mut self) {
        self.writer.reset();
        self.reader.reset();
    }
}
