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

//! Reading an object whose writer used a different field set.
//!
//! Fields are read in the writer's order. Values with a local counterpart
//! are widened to the local type and stored; the rest are decoded and
//! dropped, which keeps ref-ids and nested class defs in step with the
//! writer.

use crate::codec::object::{leaf_prim, read_boxed, FieldSink};
use crate::codec::{promote, read_field};
use crate::error::Error;
use crate::meta::{ClassDef, FieldDescriptor, FieldGroup, FieldType, TypeDef};
use crate::resolver::compatible::FieldMapping;
use crate::resolver::context::ReadContext;
use crate::value::Value;
use log::trace;

pub(crate) fn read_mapped(
    context: &mut ReadContext,
    remote: &ClassDef,
    mapping: &FieldMapping,
    local: &TypeDef,
    sink: &mut FieldSink,
) -> Result<(), Error> {
    for (field, target) in remote.layout().fields().iter().zip(mapping.targets()) {
        let Some(target) = target else {
            trace!("skipping `{}`", field.display_name(remote.type_name()));
            skip_field(context, field)
                .map_err(|e| e.at(|| field.display_name(remote.type_name())))?;
            continue;
        };
        let value = read_remote(context, field, &target.local_type)
            .map_err(|e| e.at(|| field.display_name(remote.type_name())))?;
        // A non-nullable local primitive keeps its default.
        if value.is_null() && !local.fields()[target.slot].nullable {
            continue;
        }
        sink.put(target.slot, value)?;
    }
    Ok(())
}

fn read_remote(
    context: &mut ReadContext,
    field: &FieldDescriptor,
    local: &FieldType,
) -> Result<Value, Error> {
    let config = context.spindle().config();
    let (compress_int, compress_long) = (config.is_compress_int(), config.is_compress_long());
    match field.group {
        FieldGroup::Primitive => {
            let prim = leaf_prim(&field.field_type, compress_int, compress_long)?;
            Ok(promote(prim.read(&mut context.reader)?, local))
        }
        FieldGroup::Boxed => {
            let prim = leaf_prim(&field.field_type, compress_int, compress_long)?;
            Ok(promote(read_boxed(context, prim)?, local))
        }
        _ => read_field(context, &field.field_type, local),
    }
}

/// Decodes one writer field and drops it.
pub(crate) fn skip_field(context: &mut ReadContext, field: &FieldDescriptor) -> Result<(), Error> {
    context.enter_skip();
    let result = read_remote(context, field, &field.field_type);
    context.exit_skip();
    result.map(drop)
}
