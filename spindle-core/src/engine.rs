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
use crate::codec::cache::CodecFactory;
use crate::codec::object::ObjectCodec;
use crate::codec::plan::PlanCodecFactory;
use crate::codec::{read_value, write_value};
use crate::config::{Config, Mode};
use crate::error::Error;
use crate::meta::TypeDef;
use crate::resolver::compatible::MappingCache;
use crate::resolver::context::{ReadContext, WriteContext, WriteScratch};
use crate::resolver::meta_resolver::{ClassDefCache, MetaContext, MetaReader};
use crate::resolver::pool::Pool;
use crate::resolver::type_registry::{TypeEntry, TypeRegistry};
use crate::typed::{FromValueContext, GraphObject, GraphStruct, ToValueContext};
use crate::value::Value;
use bytes::Bytes;
use log::debug;
use std::sync::Arc;

/// The Spindle serialization engine.
///
/// `Spindle` turns [`Value`] graphs into bytes and back. One engine is set up
/// once (configuration and type registration take `self` by value or by
/// `&mut`) and is then shared: it is `Send + Sync`, and every
/// [`serialize`](Spindle::serialize) or [`deserialize`](Spindle::deserialize)
/// call borrows its own scratch state from an internal pool.
///
/// # Features
///
/// - **Shared and circular references**, preserved when reference tracking
///   is on
/// - **Schema evolution** in compatible mode: readers map foreign field sets
///   onto their own by name, widening numbers and defaulting what is missing
/// - **Registration policies**: strict registration, per-type denial and a
///   nesting limit for untrusted input
/// - **Out-of-band binaries** handed to the caller instead of being copied
///
/// # Examples
///
/// ```rust
/// use spindle_core::{FieldType, Object, Spindle, TypeDef, Value};
/// use std::sync::Arc;
///
/// let mut spindle = Spindle::default().check_struct_hash(false);
/// let def = TypeDef::builder("demo.Point")
///     .field("x", FieldType::Int32)
///     .field("y", FieldType::Int32)
///     .build()
///     .unwrap();
/// spindle.register(def).unwrap();
/// let def = spindle.type_def("demo.Point").unwrap();
///
/// let point = Object::new(&def).with("x", 1).unwrap().with("y", 2).unwrap();
/// let bytes = spindle.serialize(&Value::object(point)).unwrap();
/// let back = spindle.deserialize(&bytes).unwrap();
/// assert_eq!(back.as_object().unwrap().borrow().get("y"), Some(&Value::Int32(2)));
/// ```
pub struct Spindle {
    config: Config,
    registry: TypeRegistry,
    codec_factory: Arc<dyn CodecFactory>,
    class_defs: ClassDefCache,
    mappings: MappingCache,
    write_pool: Pool<WriteScratch>,
    read_pool: Pool<MetaReader>,
}

impl Default for Spindle {
    fn default() -> Self {
        let config = Config::default();
        let write_pool = write_pool(config.buffer_size_limit());
        Spindle {
            config,
            registry: TypeRegistry::default(),
            codec_factory: Arc::new(PlanCodecFactory),
            class_defs: ClassDefCache::default(),
            mappings: MappingCache::default(),
            write_pool,
            read_pool: Pool::new(MetaReader::default, MetaReader::reset),
        }
    }
}

fn write_pool(buffer_size_limit: usize) -> Pool<WriteScratch> {
    Pool::new(WriteScratch::default, move |scratch: &mut WriteScratch| {
        scratch.writer.reset();
        scratch.writer.shrink_to(buffer_size_limit);
        scratch.refs.reset();
        scratch.meta.reset();
    })
}

impl Spindle {
    /// Creates an engine from a complete configuration.
    pub fn with_config(config: Config) -> Self {
        let write_pool = write_pool(config.buffer_size_limit());
        Spindle {
            config,
            write_pool,
            ..Spindle::default()
        }
    }

    /// Sets the wire mode.
    ///
    /// - [`Mode::SchemaConsistent`]: writer and reader share one schema. Objects
    ///   carry a structural hash (unless disabled with
    ///   [`check_struct_hash`](Spindle::check_struct_hash)) and a mismatch is
    ///   reported as [`Error::IncompatibleSchema`].
    /// - [`Mode::Compatible`]: every object carries its writer's class def, so
    ///   readers with a different field set can still decode it.
    ///
    /// Both peers must use the same mode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Shorthand for `mode(Mode::Compatible)` or `mode(Mode::SchemaConsistent)`.
    ///
    /// ```rust
    /// use spindle_core::Spindle;
    ///
    /// let spindle = Spindle::default().compatible(true);
    /// assert!(spindle.config().is_compatible());
    /// ```
    pub fn compatible(self, compatible: bool) -> Self {
        self.mode(if compatible {
            Mode::Compatible
        } else {
            Mode::SchemaConsistent
        })
    }

    /// Enables shared and circular reference tracking.
    ///
    /// With tracking on, a node reached twice is written once and referenced
    /// afterwards, so identity survives a round trip. With tracking off every
    /// occurrence is written in full and a cycle runs into the depth limit.
    /// Both peers must agree on this setting.
    ///
    /// # Default
    ///
    /// `false`.
    pub fn track_ref(mut self, track_ref: bool) -> Self {
        self.config.track_ref = track_ref;
        self
    }

    /// Rejects unregistered types on read and write.
    ///
    /// # Default
    ///
    /// `true`. Turning it off lets a schema-consistent writer name
    /// unregistered types and lets a compatible reader build anonymous types
    /// from foreign class defs.
    pub fn require_registration(mut self, require: bool) -> Self {
        self.config.require_registration = require;
        self
    }

    /// Zig-zag varint encoding for `int32` values outside arrays.
    pub fn compress_int(mut self, compress: bool) -> Self {
        self.config.compress_int = compress;
        self.registry.reset_codecs();
        self
    }

    /// Zig-zag varint encoding for `int64` values outside arrays.
    pub fn compress_long(mut self, compress: bool) -> Self {
        self.config.compress_long = compress;
        self.registry.reset_codecs();
        self
    }

    /// Compatible mode: send each class def once per call and refer to it by
    /// index afterwards. With sharing off, every object repeats its class def.
    pub fn share_meta(mut self, share: bool) -> Self {
        self.config.share_meta = share;
        self
    }

    /// Schema-consistent mode: write and verify a 4-byte structural hash in
    /// front of every object.
    pub fn check_struct_hash(mut self, check: bool) -> Self {
        self.config.check_struct_hash = check;
        self
    }

    /// Maximum nesting of objects and containers, on write and on read.
    ///
    /// # Default
    ///
    /// `256`.
    pub fn max_depth(mut self, max_depth: u32) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    /// Collections declaring more elements than there are bytes left to read
    /// are rejected above this length.
    pub fn max_collection_len(mut self, len: usize) -> Self {
        self.config.max_collection_len = len;
        self
    }

    /// Pooled write buffers above this capacity are shrunk after each call.
    pub fn buffer_size_limit(mut self, limit: usize) -> Self {
        self.config.buffer_size_limit = limit;
        self.write_pool = write_pool(limit);
        self
    }

    /// Builds compiled codecs on a background thread. Calls made before a
    /// type's codec is published use its layout codec; the bytes are the same.
    pub fn async_compilation(mut self, enabled: bool) -> Self {
        self.config.async_compilation = enabled;
        self.registry.reset_codecs();
        self
    }

    #[inline(always)]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline(always)]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    #[inline(always)]
    pub(crate) fn class_defs(&self) -> &ClassDefCache {
        &self.class_defs
    }

    #[inline(always)]
    pub(crate) fn mappings(&self) -> &MappingCache {
        &self.mappings
    }

    /// Codec serving `entry` for the current call.
    #[inline(always)]
    pub(crate) fn codec_for(&self, entry: &Arc<TypeEntry>) -> Arc<dyn ObjectCodec> {
        entry
            .codec_slot()
            .resolve(entry, &self.codec_factory, &self.config)
    }

    /// Registers a type under the next numeric id, which is returned.
    ///
    /// Ids are assigned in registration order, so peers must register the
    /// same types in the same order. Registering a name again replaces its
    /// definition and keeps its id.
    ///
    /// # Errors
    ///
    /// [`Error::Disallowed`] if the name was denied.
    pub fn register(&mut self, def: TypeDef) -> Result<u32, Error> {
        let name = def.name_arc().clone();
        let id = self.registry.register(def)?;
        self.mappings.invalidate(&name);
        Ok(id)
    }

    /// Registers a type that is identified on the wire by its name.
    pub fn register_by_name(&mut self, def: TypeDef) -> Result<(), Error> {
        let name = def.name_arc().clone();
        self.registry.register_by_name(def)?;
        self.mappings.invalidate(&name);
        Ok(())
    }

    /// Registers the type derived for `T`.
    pub fn register_type<T: GraphStruct>(&mut self) -> Result<u32, Error> {
        self.register(T::type_def()?)
    }

    /// Serves `name` with a hand-written codec instead of a generated one.
    pub fn register_codec(&mut self, name: &str, codec: Arc<dyn ObjectCodec>) {
        self.registry.register_codec(name, codec);
    }

    /// Replaces the factory that builds compiled codecs. Codecs already built
    /// are dropped.
    pub fn set_codec_factory(&mut self, factory: Arc<dyn CodecFactory>) {
        self.codec_factory = factory;
        self.registry.reset_codecs();
        self.mappings.clear();
        debug!("codec factory replaced; compiled codecs dropped");
    }

    /// Refuses `name` from now on, registered or not, on read and on write.
    pub fn deny_type(&mut self, name: &str) {
        self.registry.deny(name);
    }

    /// The registered definition of `name`, for building objects.
    pub fn type_def(&self, name: &str) -> Option<Arc<TypeDef>> {
        self.registry.get_by_name(name).map(|e| e.def().clone())
    }

    /// Whether `name` is served by its compiled (or custom) codec yet.
    pub fn codec_ready(&self, name: &str) -> bool {
        self.registry
            .get_by_name(name)
            .is_some_and(|e| e.codec_slot().is_ready())
    }

    /// Serializes a value graph.
    ///
    /// # Errors
    ///
    /// - [`Error::TypeError`] if a field holds a value its declaration does
    ///   not allow, such as null in a non-nullable primitive field.
    /// - [`Error::UnknownType`] or [`Error::Disallowed`] for types the
    ///   registration policy rejects.
    /// - [`Error::DepthExceed`] if the graph nests deeper than
    ///   [`max_depth`](Spindle::max_depth).
    pub fn serialize(&self, value: &Value) -> Result<Vec<u8>, Error> {
        self.write_pool.borrow_mut(|scratch| {
            let WriteScratch { writer, refs, meta } = scratch;
            write_value(&mut WriteContext::new(self, writer, refs, meta), value)?;
            Ok(writer.dump())
        })
    }

    /// Appends the encoding of `value` to `writer`. On error, `writer` is left
    /// as it was.
    pub fn serialize_into(&self, value: &Value, writer: &mut Writer) -> Result<(), Error> {
        let start = writer.len();
        let result = self.write_pool.borrow_mut(|scratch| {
            let WriteScratch { refs, meta, .. } = scratch;
            write_value(&mut WriteContext::new(self, writer, refs, meta), value)
        });
        if result.is_err() {
            writer.bf.truncate(start);
        }
        result
    }

    /// Serializes with a callback deciding, per binary payload, whether it is
    /// written in band (`true`) or handed back out of band (`false`).
    ///
    /// Returns the stream and the out-of-band buffers in the order the stream
    /// refers to them; pass both to
    /// [`deserialize_with_buffers`](Spindle::deserialize_with_buffers).
    pub fn serialize_with_buffer_callback<F>(
        &self,
        value: &Value,
        mut callback: F,
    ) -> Result<(Vec<u8>, Vec<Bytes>), Error>
    where
        F: FnMut(&Bytes) -> bool,
    {
        self.write_pool.borrow_mut(|scratch| {
            let WriteScratch { writer, refs, meta } = scratch;
            let mut context =
                WriteContext::new(self, writer, refs, meta).with_buffer_callback(&mut callback);
            write_value(&mut context, value)?;
            let buffers = context.take_out_of_band();
            drop(context);
            Ok((writer.dump(), buffers))
        })
    }

    /// Serializes with class defs shared across calls through `meta`.
    pub fn serialize_with_meta_context(
        &self,
        value: &Value,
        meta: &mut MetaContext,
    ) -> Result<Vec<u8>, Error> {
        self.write_pool.borrow_mut(|scratch| {
            let WriteScratch { writer, refs, .. } = scratch;
            let start = meta.writer.len();
            let result = write_value(&mut WriteContext::new(self, writer, refs, &mut meta.writer), value);
            if result.is_err() {
                // Definitions announced by a failed call never reached the peer.
                meta.writer.truncate(start);
            }
            result?;
            Ok(writer.dump())
        })
    }

    /// Deserializes one value graph. The input must hold exactly one value.
    ///
    /// # Errors
    ///
    /// Malformed input fails with [`Error::InvalidData`],
    /// [`Error::InvalidRef`] or [`Error::BufferUnderflow`]; schema problems with
    /// [`Error::IncompatibleSchema`] or [`Error::FieldTypeMismatch`]; policy
    /// rejections with [`Error::UnknownType`], [`Error::Disallowed`] or
    /// [`Error::DepthExceed`]. No input makes this function panic.
    pub fn deserialize(&self, bytes: &[u8]) -> Result<Value, Error> {
        self.read_pool.borrow_mut(|meta| {
            let mut context = ReadContext::new(self, Reader::new(bytes), meta);
            let value = read_value(&mut context)?;
            ensure_consumed(&context)?;
            Ok(value)
        })
    }

    /// Reads one value at the reader's cursor and advances past it. Bytes
    /// after the value are left for the caller.
    pub fn deserialize_from(&self, reader: &mut Reader) -> Result<Value, Error> {
        self.read_pool.borrow_mut(|meta| {
            let start = reader.cursor();
            let mut context = ReadContext::new(self, *reader, meta);
            let value = read_value(&mut context)?;
            reader.skip(context.reader.cursor() - start)?;
            Ok(value)
        })
    }

    /// Deserializes a stream written with
    /// [`serialize_with_buffer_callback`](Spindle::serialize_with_buffer_callback).
    pub fn deserialize_with_buffers(&self, bytes: &[u8], buffers: &[Bytes]) -> Result<Value, Error> {
        self.read_pool.borrow_mut(|meta| {
            let mut context = ReadContext::new(self, Reader::new(bytes), meta).with_buffers(buffers);
            let value = read_value(&mut context)?;
            ensure_consumed(&context)?;
            Ok(value)
        })
    }

    /// Deserializes with class defs shared across calls through `meta`.
    pub fn deserialize_with_meta_context(
        &self,
        bytes: &[u8],
        meta: &mut MetaContext,
    ) -> Result<Value, Error> {
        let mut context = ReadContext::new(self, Reader::new(bytes), &mut meta.reader);
        let value = read_value(&mut context)?;
        ensure_consumed(&context)?;
        Ok(value)
    }

    /// Serializes a typed value through its [`GraphObject`] mapping.
    pub fn serialize_object<T: GraphObject>(&self, value: &T) -> Result<Vec<u8>, Error> {
        let value = value.to_value(&mut ToValueContext::new(self))?;
        self.serialize(&value)
    }

    /// Deserializes a typed value through its [`GraphObject`] mapping.
    pub fn deserialize_object<T: GraphObject>(&self, bytes: &[u8]) -> Result<T, Error> {
        let value = self.deserialize(bytes)?;
        T::from_value(&value, &mut FromValueContext::new(self.config.max_depth()))
    }
}

fn ensure_consumed(context: &ReadContext) -> Result<(), Error> {
    let remaining = context.reader.remaining();
    if remaining != 0 {
        return Err(Error::invalid_data(format!(
            "{remaining} trailing bytes after the root value"
        )));
    }
    Ok(())
}
