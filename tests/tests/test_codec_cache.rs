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

use spindle_core::buffer::{Reader, Writer};
use spindle_core::codec::cache::CodecFactory;
use spindle_core::codec::object::{FieldSink, ObjectCodec};
use spindle_core::codec::plan::PlanCodecFactory;
use spindle_core::config::Config;
use spindle_core::error::Error;
use spindle_core::resolver::context::{ReadContext, WriteContext};
use spindle_core::resolver::type_registry::TypeEntry;
use spindle_core::{FieldType, Object, Spindle, TypeDef, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tests::{field, init_logger, point, point_def, registered};

/// Counts builds and delegates to the default factory.
#[derive(Default)]
struct CountingFactory {
    builds: AtomicUsize,
}

impl CodecFactory for CountingFactory {
    fn build(&self, entry: &TypeEntry, config: &Config) -> Result<Arc<dyn ObjectCodec>, Error> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        PlanCodecFactory.build(entry, config)
    }
}

struct FailingFactory;

impl CodecFactory for FailingFactory {
    fn build(&self, entry: &TypeEntry, _: &Config) -> Result<Arc<dyn ObjectCodec>, Error> {
        Err(Error::unsupported(format!("no codec for {}", entry.name())))
    }
}

#[test]
fn test_codec_is_built_once_on_first_use() {
    init_logger();
    let factory = Arc::new(CountingFactory::default());
    let mut spindle = Spindle::default();
    spindle.set_codec_factory(factory.clone());
    spindle.register(point_def()).unwrap();
    assert!(!spindle.codec_ready("demo.Point"));

    let def = registered(&spindle, "demo.Point");
    for i in 0..10 {
        let value = point(&def, i, i * 2);
        let back = spindle.deserialize(&spindle.serialize(&value).unwrap()).unwrap();
        assert_eq!(back, value);
    }
    assert!(spindle.codec_ready("demo.Point"));
    assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
}

#[test]
fn test_async_compilation_publishes_codec() {
    let mut spindle = Spindle::default().async_compilation(true);
    spindle.register(point_def()).unwrap();
    let def = registered(&spindle, "demo.Point");
    let value = point(&def, 5, 6);
    // Served by the layout codec while the build runs.
    let first = spindle.serialize(&value).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while !spindle.codec_ready("demo.Point") {
        assert!(Instant::now() < deadline, "codec was never published");
        thread::sleep(Duration::from_millis(5));
    }
    let second = spindle.serialize(&value).unwrap();
    assert_eq!(first, second);
    assert_eq!(spindle.deserialize(&first).unwrap(), value);
}

#[test]
fn test_failed_build_falls_back_to_layout_codec() {
    let mut spindle = Spindle::default();
    spindle.set_codec_factory(Arc::new(FailingFactory));
    spindle.register(point_def()).unwrap();
    let def = registered(&spindle, "demo.Point");
    let value = point(&def, -1, 1);
    let bytes = spindle.serialize(&value).unwrap();
    assert_eq!(spindle.deserialize(&bytes).unwrap(), value);
    assert!(!spindle.codec_ready("demo.Point"));

    let mut reference = Spindle::default();
    reference.register(point_def()).unwrap();
    let def = registered(&reference, "demo.Point");
    assert_eq!(reference.serialize(&point(&def, -1, 1)).unwrap(), bytes);
}

/// Stores a temperature in tenths of a degree.
struct TenthsCodec;

impl ObjectCodec for TenthsCodec {
    fn write_fields(&self, context: &mut WriteContext, object: &Object) -> Result<(), Error> {
        let celsius = object
            .get("celsius")
            .and_then(Value::as_f64)
            .ok_or_else(|| Error::type_error("celsius is not a number"))?;
        context.writer.write_i16((celsius * 10.0).round() as i16);
        Ok(())
    }

    fn read_fields(&self, context: &mut ReadContext, sink: &mut FieldSink) -> Result<(), Error> {
        let tenths = context.reader.read_i16()?;
        sink.put(0, Value::Float64(tenths as f64 / 10.0))
    }
}

#[test]
fn test_custom_codec() {
    let mut spindle = Spindle::default().check_struct_hash(false);
    spindle.register_codec("demo.Temp", Arc::new(TenthsCodec));
    spindle
        .register(
            TypeDef::builder("demo.Temp")
                .field("celsius", FieldType::Float64)
                .build()
                .unwrap(),
        )
        .unwrap();
    assert!(spindle.codec_ready("demo.Temp"));

    let def = registered(&spindle, "demo.Temp");
    let value = Value::object(Object::new(&def).with("celsius", 21.5f64).unwrap());
    let bytes = spindle.serialize(&value).unwrap();
    assert_eq!(bytes, vec![0x20, 215, 0]);
    let back = spindle.deserialize(&bytes).unwrap();
    assert_eq!(field(&back, "celsius"), Value::Float64(21.5));
}

#[test]
fn test_stream_of_values() {
    let mut spindle = Spindle::default();
    spindle.register(point_def()).unwrap();
    let def = registered(&spindle, "demo.Point");
    let values = vec![
        Value::Int32(1),
        point(&def, 2, 3),
        Value::string("tail"),
        Value::list(vec![Value::Null, Value::Bool(true)]),
    ];

    let mut writer = Writer::default();
    for value in &values {
        spindle.serialize_into(value, &mut writer).unwrap();
    }
    let mut reader = Reader::new(writer.as_slice());
    for value in &values {
        assert_eq!(&spindle.deserialize_from(&mut reader).unwrap(), value);
    }
    assert_eq!(reader.remaining(), 0);

    // `deserialize` wants exactly one value.
    if !spindle_core::error::should_panic_on_error() {
        let err = spindle.deserialize(writer.as_slice()).unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)), "{err}");
    }
}

#[test]
fn test_failed_serialize_into_leaves_writer_untouched() {
    if spindle_core::error::should_panic_on_error() {
        return;
    }
    let spindle = Spindle::default();
    let mut writer = Writer::default();
    spindle.serialize_into(&Value::Int64(9), &mut writer).unwrap();
    let before = writer.as_slice().to_vec();

    let mut other = Spindle::default();
    other.register(point_def()).unwrap();
    let def = registered(&other, "demo.Point");
    let unregistered = Value::list(vec![Value::Int32(1), point(&def, 1, 1)]);
    assert!(spindle.serialize_into(&unregistered, &mut writer).is_err());
    assert_eq!(writer.as_slice(), &before[..]);
}
