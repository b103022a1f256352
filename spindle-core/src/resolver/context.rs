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
use crate::engine::Spindle;
use crate::error::Error;
use crate::meta::ClassDef;
use crate::resolver::meta_resolver::{MetaReader, MetaWriter};
use crate::resolver::ref_resolver::{RefReader, RefWriter};
use crate::value::Value;
use bytes::Bytes;
use std::sync::Arc;

/// Decides whether a binary payload stays in band (`true`) or is handed out
/// of band (`false`).
pub type BufferCallback<'a> = &'a mut dyn FnMut(&Bytes) -> bool;

/// Scratch state reused across serialize calls.
#[derive(Default)]
pub(crate) struct WriteScratch {
    pub writer: Writer,
    pub refs: RefWriter,
    pub meta: MetaWriter,
}

/// State of one serialize call.
pub struct WriteContext<'a> {
    spindle: &'a Spindle,
    pub writer: &'a mut Writer,
    refs: &'a mut RefWriter,
    meta: &'a mut MetaWriter,
    depth: u32,
    buffer_callback: Option<BufferCallback<'a>>,
    out_of_band: Vec<Bytes>,
}

impl<'a> WriteContext<'a> {
    pub fn new(
        spindle: &'a Spindle,
        writer: &'a mut Writer,
        refs: &'a mut RefWriter,
        meta: &'a mut MetaWriter,
    ) -> WriteContext<'a> {
        WriteContext {
            spindle,
            writer,
            refs,
            meta,
            depth: 0,
            buffer_callback: None,
            out_of_band: Vec::new(),
        }
    }

    pub fn with_buffer_callback(mut self, callback: BufferCallback<'a>) -> Self {
        self.buffer_callback = Some(callback);
        self
    }

    #[inline(always)]
    pub fn spindle(&self) -> &'a Spindle {
        self.spindle
    }

    /// Ref-id of a node already written in this call. Always `None` when
    /// reference tracking is off.
    #[inline(always)]
    pub fn track(&mut self, value: &Value) -> Option<u32> {
        if !self.spindle.config().is_track_ref() {
            return None;
        }
        value.identity().and_then(|id| self.refs.track_for_write(id))
    }

    #[inline(always)]
    pub fn write_class_def(&mut self, class_def: &ClassDef) {
        let share = self.spindle.config().is_share_meta();
        self.meta.write_class_def(self.writer, class_def, share);
    }

    /// Offers a binary payload to the buffer callback. Returns the out-of-band
    /// index when the callback takes it.
    pub fn claim_buffer(&mut self, bytes: &Bytes) -> Option<u32> {
        let callback = self.buffer_callback.as_mut()?;
        if callback(bytes) {
            return None;
        }
        self.out_of_band.push(bytes.clone());
        Some(self.out_of_band.len() as u32 - 1)
    }

    pub fn take_out_of_band(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.out_of_band)
    }

    #[inline(always)]
    pub fn inc_depth(&mut self) -> Result<(), Error> {
        self.depth += 1;
        let max = self.spindle.config().max_depth();
        if self.depth > max {
            return Err(Error::depth_exceed(max));
        }
        Ok(())
    }

    #[inline(always)]
    pub fn dec_depth(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

/// State of one deserialize call.
///
/// The ref table holds decoded values, which are not `Send`, so it lives
/// only as long as the call.
pub struct ReadContext<'a> {
    spindle: &'a Spindle,
    pub reader: Reader<'a>,
    refs: RefReader,
    meta: &'a mut MetaReader,
    depth: u32,
    buffers: Option<&'a [Bytes]>,
    skipping: u32,
}

impl<'a> ReadContext<'a> {
    pub fn new(spindle: &'a Spindle, reader: Reader<'a>, meta: &'a mut MetaReader) -> ReadContext<'a> {
        ReadContext {
            spindle,
            reader,
            refs: RefReader::new(),
            meta,
            depth: 0,
            buffers: None,
            skipping: 0,
        }
    }

    pub fn with_buffers(mut self, buffers: &'a [Bytes]) -> Self {
        self.buffers = Some(buffers);
        self
    }

    #[inline(always)]
    pub fn spindle(&self) -> &'a Spindle {
        self.spindle
    }

    pub fn read_class_def(&mut self) -> Result<Arc<ClassDef>, Error> {
        let share = self.spindle.config().is_share_meta();
        self.meta
            .read_class_def(&mut self.reader, self.spindle.class_defs(), share)
    }

    /// Reserves a ref-id for the node about to be decoded, when tracking is on.
    #[inline(always)]
    pub fn reserve_ref(&mut self) -> Option<u32> {
        if self.spindle.config().is_track_ref() {
            Some(self.refs.reserve_for_read())
        } else {
            None
        }
    }

    #[inline(always)]
    pub fn set_ref(&mut self, ref_id: Option<u32>, value: &Value) {
        if let Some(ref_id) = ref_id {
            self.refs.set(ref_id, value.clone());
        }
    }

    pub fn read_ref(&mut self) -> Result<Value, Error> {
        if !self.spindle.config().is_track_ref() {
            return Err(Error::invalid_ref(
                "reference marker found while reference tracking is disabled",
            ));
        }
        let ref_id = self.reader.read_varuint32()?;
        self.refs.get(ref_id)
    }

    pub fn out_of_band(&self, index: u32) -> Result<Bytes, Error> {
        let buffers = self.buffers.ok_or_else(|| {
            Error::invalid_data(format!(
                "stream refers to out-of-band buffer #{index} but no buffers were supplied"
            ))
        })?;
        buffers.get(index as usize).cloned().ok_or_else(|| {
            Error::invalid_data(format!(
                "out-of-band buffer #{index} requested, {} supplied",
                buffers.len()
            ))
        })
    }

    /// True while decoding a value the reader will drop.
    #[inline(always)]
    pub fn is_skipping(&self) -> bool {
        self.skipping > 0
    }

    pub(crate) fn enter_skip(&mut self) {
        self.skipping += 1;
    }

    pub(crate) fn exit_skip(&mut self) {
        self.skipping = self.skipping.saturating_sub(1);
    }

    #[inline(always)]
    pub fn inc_depth(&mut self) -> Result<(), Error> {
        self.depth += 1;
        let max = self.spindle.config().max_depth();
        if self.depth > max {
            return Err(Error::depth_exceed(max));
        }
        Ok(())
    }

    #[inline(always)]
    pub fn dec_depth(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}
