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

use crate::error::Error;
use crate::value::Value;
use std::collections::HashMap;

/// Reference writer for tracking shared references during serialization.
///
/// RefWriter maps the identity of every reference node written so far in the
/// current pass (list, set, map or object) to the ref-id it was given. When
/// the same node is met again, the codec writes a reference marker carrying
/// that id instead of encoding the node a second time. Ids are handed out in
/// first-occurrence order, which is the order the reader reserves them in.
///
/// # Examples
///
/// ```rust
/// use spindle_core::resolver::ref_resolver::RefWriter;
/// use spindle_core::value::Value;
///
/// let mut refs = RefWriter::new();
/// let list = Value::list(vec![]);
/// let id = list.identity().unwrap();
///
/// // First encounter - the node gets a fresh id and must be encoded
/// assert_eq!(refs.track_for_write(id), None);
///
/// // Second encounter - the earlier id is returned
/// assert_eq!(refs.track_for_write(id), Some(0));
/// ```
#[derive(Default)]
pub struct RefWriter {
    /// Maps node addresses to reference IDs
    refs: HashMap<usize, u32>,
    /// Next reference ID to assign
    next_ref_id: u32,
}

impl RefWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of a node already written in this pass, or assigns the
    /// next id to it and returns `None`.
    #[inline(always)]
    pub fn track_for_write(&mut self, identity: usize) -> Option<u32> {
        match self.refs.get(&identity) {
            Some(&ref_id) => Some(ref_id),
            None => {
                self.refs.insert(identity, self.next_ref_id);
                self.next_ref_id += 1;
                None
            }
        }
    }

    /// Number of ids assigned so far.
    pub fn len(&self) -> usize {
        self.next_ref_id as usize
    }

    pub fn is_empty(&self) -> bool {
        self.next_ref_id == 0
    }

    /// Clear all stored references.
    ///
    /// This is useful for reusing the RefWriter for multiple serialization operations.
    pub fn reset(&mut self) {
        self.refs.clear();
        self.next_ref_id = 0;
    }
}

enum RefSlot {
    /// Reserved for a record whose fields are still being decoded.
    Pending,
    Ready(Value),
}

/// Reference reader for resolving shared references during deserialization.
///
/// The codec reserves an id *before* decoding a node's fields. Mutable nodes
/// (lists, maps, structs) are allocated empty and stored right away, so a
/// field pointing back at an ancestor resolves to the same node. Records are
/// only built after all their fields are known; their slot stays pending
/// until [`RefReader::set`] is called, and a reference to a pending slot is
/// an error.
///
/// # Examples
///
/// ```rust
/// use spindle_core::resolver::ref_resolver::RefReader;
/// use spindle_core::value::Value;
///
/// let mut refs = RefReader::new();
/// let list = Value::list(vec![]);
///
/// let ref_id = refs.reserve_for_read();
/// refs.set(ref_id, list.clone());
///
/// let resolved = refs.get(ref_id).unwrap();
/// assert!(resolved.ptr_eq(&list));
/// ```
#[derive(Default)]
pub struct RefReader {
    refs: Vec<RefSlot>,
}

impl RefReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next id; it must later be completed with [`RefReader::set`].
    #[inline(always)]
    pub fn reserve_for_read(&mut self) -> u32 {
        let ref_id = self.refs.len() as u32;
        self.refs.push(RefSlot::Pending);
        ref_id
    }

    /// Completes a reserved slot.
    #[inline(always)]
    pub fn set(&mut self, ref_id: u32, value: Value) {
        if let Some(slot) = self.refs.get_mut(ref_id as usize) {
            *slot = RefSlot::Ready(value);
        }
    }

    /// Resolves a reference marker read from the stream.
    pub fn get(&self, ref_id: u32) -> Result<Value, Error> {
        match self.refs.get(ref_id as usize) {
            Some(RefSlot::Ready(value)) => Ok(value.clone()),
            Some(RefSlot::Pending) => Err(Error::invalid_ref(format!(
                "ref-id {ref_id} points at a record that is still being constructed"
            ))),
            None => Err(Error::invalid_ref(format!(
                "ref-id {ref_id} was not reserved; {} ids are known",
                self.refs.len()
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn reset(&mut self) {
        self.refs.clear();
    }
}
