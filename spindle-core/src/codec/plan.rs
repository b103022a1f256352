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

//! Compiled object codecs.
//!
//! A plan fixes everything [`LayoutCodec`](super::object::LayoutCodec)
//! decides per call: the wire form of every primitive, the block widths and
//! the display names used in error paths. Plans are built once per type by a
//! [`CodecFactory`] and shared by every thread.

use crate::codec::cache::CodecFactory;
use crate::codec::object::{
    primitive_mismatch, read_boxed, write_boxed, FieldSink, ObjectCodec, Prim,
};
use crate::codec::{read_field, write_field};
use crate::config::Config;
use crate::error::Error;
use crate::meta::{FieldGroup, FieldType};
use crate::resolver::context::{ReadContext, WriteContext};
use crate::resolver::type_registry::TypeEntry;
use crate::value::Object;
use log::debug;
use std::sync::Arc;

#[derive(Debug)]
struct PrimOp {
    slot: usize,
    prim: Prim,
    field_type: FieldType,
    name: String,
}

#[derive(Debug)]
enum SlotOp {
    Boxed(PrimOp),
    Slot {
        slot: usize,
        field_type: FieldType,
        name: String,
    },
}

#[derive(Debug)]
pub struct PlanCodec {
    primitives: Vec<PrimOp>,
    /// Reserved bytes for the primitive group on write.
    max_width: usize,
    /// Exact width of the primitive group when it holds no varints.
    fixed_width: Option<usize>,
    rest: Vec<SlotOp>,
}

impl PlanCodec {
    pub fn compile(entry: &TypeEntry, config: &Config) -> Result<PlanCodec, Error> {
        let (compress_int, compress_long) = (config.is_compress_int(), config.is_compress_long());
        let layout = entry.layout();
        let prim_op = |field: &crate::meta::FieldDescriptor| -> Result<PrimOp, Error> {
            let prim = Prim::of(&field.field_type, compress_int, compress_long).ok_or_else(|| {
                Error::type_error(format!(
                    "{} is not a primitive type",
                    field.field_type
                ))
            })?;
            Ok(PrimOp {
                slot: field.slot,
                prim,
                field_type: field.field_type.clone(),
                name: field.display_name(entry.name()),
            })
        };
        let primitives = layout
            .group(FieldGroup::Primitive)
            .iter()
            .map(prim_op)
            .collect::<Result<Vec<_>, _>>()?;
        let max_width = primitives.iter().map(|op| op.prim.max_width()).sum();
        let fixed_width = (!primitives.iter().any(|op| op.prim.is_varint())).then_some(max_width);
        let rest = layout
            .non_primitive()
            .iter()
            .map(|field| {
                Ok(match field.group {
                    FieldGroup::Boxed => SlotOp::Boxed(prim_op(field)?),
                    _ => SlotOp::Slot {
                        slot: field.slot,
                        field_type: field.field_type.clone(),
                        name: field.display_name(entry.name()),
                    },
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(PlanCodec {
            primitives,
            max_width,
            fixed_width,
            rest,
        })
    }
}

impl ObjectCodec for PlanCodec {
    fn write_fields(&self, context: &mut WriteContext, object: &Object) -> Result<(), Error> {
        let values = object.values();
        if !self.primitives.is_empty() {
            let mut block = context.writer.block(self.max_width);
            for op in &self.primitives {
                let value = &values[op.slot];
                if !op.prim.put(&mut block, value) {
                    return Err(primitive_mismatch(&op.name, &op.field_type, value));
                }
            }
        }
        for op in &self.rest {
            match op {
                SlotOp::Boxed(op) => {
                    let value = &values[op.slot];
                    if !write_boxed(context, op.prim, value)? {
                        return Err(primitive_mismatch(&op.name, &op.field_type, value));
                    }
                }
                SlotOp::Slot {
                    slot,
                    field_type,
                    name,
                } => write_field(context, &values[*slot], field_type)
                    .map_err(|e| e.at(|| name.clone()))?,
            }
        }
        Ok(())
    }

    fn read_fields(&self, context: &mut ReadContext, sink: &mut FieldSink) -> Result<(), Error> {
        match self.fixed_width {
            Some(0) => {}
            Some(width) => {
                let mut block = context.reader.block(width)?;
                for op in &self.primitives {
                    sink.put(op.slot, op.prim.get(&mut block))?;
                }
            }
            None => {
                for op in &self.primitives {
                    sink.put(op.slot, op.prim.read(&mut context.reader)?)?;
                }
            }
        }
        for op in &self.rest {
            match op {
                SlotOp::Boxed(op) => {
                    let value = read_boxed(context, op.prim)?;
                    sink.put(op.slot, value)?;
                }
                SlotOp::Slot {
                    slot,
                    field_type,
                    name,
                } => {
                    let value = read_field(context, field_type, field_type)
                        .map_err(|e| e.at(|| name.clone()))?;
                    sink.put(*slot, value)?;
                }
            }
        }
        Ok(())
    }
}

/// Default factory: compiles a [`PlanCodec`] for the engine's configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlanCodecFactory;

impl CodecFactory for PlanCodecFactory {
    fn build(&self, entry: &TypeEntry, config: &Config) -> Result<Arc<dyn ObjectCodec>, Error> {
        let plan = PlanCodec::compile(entry, config)?;
        debug!(
            "compiled codec for `{}`: {} primitive ops, {} slot ops",
            entry.name(),
            plan.primitives.len(),
            plan.rest.len()
        );
        Ok(Arc::new(plan))
    }
}
