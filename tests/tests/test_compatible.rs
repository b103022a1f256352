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

use spindle_core::error::Error;
use spindle_core::{DefaultValue, FieldType, MetaContext, Object, Spindle, TypeDef, Value};
use tests::{field, init_logger, point, point_def, registered};

fn compatible() -> Spindle {
    Spindle::default().compatible(true)
}

#[test]
fn test_added_and_removed_fields() {
    init_logger();
    let mut writer = compatible();
    writer
        .register(
            TypeDef::builder("demo.Evolve")
                .field("a", FieldType::Int32)
                .field("b", FieldType::String)
                .build()
                .unwrap(),
        )
        .unwrap();
    let mut reader = compatible();
    reader
        .register(
            TypeDef::builder("demo.Evolve")
                .field("a", FieldType::Int32)
                .field("c", FieldType::Int64)
                .build()
                .unwrap(),
        )
        .unwrap();

    let def = registered(&writer, "demo.Evolve");
    let value = Value::object(
        Object::new(&def)
            .with("a", 42)
            .unwrap()
            .with("b", "dropped")
            .unwrap(),
    );
    let bytes = writer.serialize(&value).unwrap();
    let back = reader.deserialize(&bytes).unwrap();
    assert_eq!(field(&back, "a"), Value::Int32(42));
    assert_eq!(field(&back, "c"), Value::Int64(0));
    assert!(back.as_object().unwrap().borrow().get("b").is_none());
}

#[test]
fn test_missing_field_takes_declared_default() {
    let mut writer = compatible();
    writer
        .register(
            TypeDef::builder("demo.Config")
                .field("name", FieldType::String)
                .build()
                .unwrap(),
        )
        .unwrap();
    let mut reader = compatible();
    reader
        .register(
            TypeDef::builder("demo.Config")
                .field("name", FieldType::String)
                .field_with_default("retries", FieldType::Int32, DefaultValue::Int(3))
                .field_with_default("label", FieldType::String, DefaultValue::Str("none".into()))
                .build()
                .unwrap(),
        )
        .unwrap();
    let def = registered(&writer, "demo.Config");
    let bytes = writer
        .serialize(&Value::object(Object::new(&def).with("name", "svc").unwrap()))
        .unwrap();
    let back = reader.deserialize(&bytes).unwrap();
    assert_eq!(field(&back, "name"), Value::string("svc"));
    assert_eq!(field(&back, "retries"), Value::Int32(3));
    assert_eq!(field(&back, "label"), Value::string("none"));
}

#[test]
fn test_numeric_widening_across_versions() {
    let mut writer = compatible();
    writer
        .register(
            TypeDef::builder("demo.Metric")
                .field("count", FieldType::Int32)
                .field("ratio", FieldType::Float32)
                .field("samples", FieldType::list(FieldType::Int16))
                .build()
                .unwrap(),
        )
        .unwrap();
    let mut reader = compatible();
    reader
        .register(
            TypeDef::builder("demo.Metric")
                .field("count", FieldType::Int64)
                .field("ratio", FieldType::Float64)
                .field("samples", FieldType::list(FieldType::Int64))
                .build()
                .unwrap(),
        )
        .unwrap();
    let def = registered(&writer, "demo.Metric");
    let samples = Value::list(vec![Value::Int16(1), Value::Int16(-2)]);
    let object = Object::new(&def)
        .with("count", 7)
        .unwrap()
        .with("ratio", 0.5f32)
        .unwrap()
        .with("samples", samples)
        .unwrap();
    let back = reader
        .deserialize(&writer.serialize(&Value::object(object)).unwrap())
        .unwrap();
    assert_eq!(field(&back, "count"), Value::Int64(7));
    assert_eq!(field(&back, "ratio"), Value::Float64(0.5));
    assert_eq!(
        field(&back, "samples"),
        Value::list(vec![Value::Int64(1), Value::Int64(-2)])
    );
}

#[test]
fn test_incompatible_field_type() {
    if spindle_core::error::should_panic_on_error() {
        return;
    }
    let mut writer = compatible();
    writer
        .register(
            TypeDef::builder("demo.Clash")
                .field("v", FieldType::String)
                .build()
                .unwrap(),
        )
        .unwrap();
    let mut reader = compatible();
    reader
        .register(
            TypeDef::builder("demo.Clash")
                .field("v", FieldType::Int32)
                .build()
                .unwrap(),
        )
        .unwrap();
    let def = registered(&writer, "demo.Clash");
    let bytes = writer
        .serialize(&Value::object(Object::new(&def).with("v", "text").unwrap()))
        .unwrap();
    match reader.deserialize(&bytes).unwrap_err() {
        Error::FieldTypeMismatch { field, .. } => assert_eq!(field, "v"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_unknown_type_policy() {
    if spindle_core::error::should_panic_on_error() {
        return;
    }
    let mut writer = compatible();
    writer.register(point_def()).unwrap();
    let def = registered(&writer, "demo.Point");
    let bytes = writer.serialize(&point(&def, 5, 6)).unwrap();

    let strict = compatible();
    let err = strict.deserialize(&bytes).unwrap_err();
    assert!(matches!(err, Error::UnknownType(_)));
    assert!(err.is_security());

    let permissive = compatible().require_registration(false);
    let back = permissive.deserialize(&bytes).unwrap();
    let object = back.as_object().unwrap().borrow();
    assert_eq!(object.type_name(), "demo.Point");
    assert_eq!(object.get("x"), Some(&Value::Int32(5)));
    assert_eq!(object.get("y"), Some(&Value::Int32(6)));
}

#[test]
fn test_dropped_field_of_unknown_type_is_skipped() {
    let mut writer = compatible();
    writer
        .register_by_name(
            TypeDef::builder("demo.Secret")
                .field("token", FieldType::String)
                .build()
                .unwrap(),
        )
        .unwrap();
    writer
        .register(
            TypeDef::builder("demo.Holder")
                .field("id", FieldType::Int32)
                .field("secret", FieldType::object("demo.Secret"))
                .field("tail", FieldType::String)
                .build()
                .unwrap(),
        )
        .unwrap();
    let mut reader = compatible();
    reader
        .register(
            TypeDef::builder("demo.Holder")
                .field("id", FieldType::Int32)
                .field("tail", FieldType::String)
                .build()
                .unwrap(),
        )
        .unwrap();

    let secret = Object::new(&registered(&writer, "demo.Secret"))
        .with("token", "abc")
        .unwrap();
    let holder = Object::new(&registered(&writer, "demo.Holder"))
        .with("id", 9)
        .unwrap()
        .with("secret", secret)
        .unwrap()
        .with("tail", "end")
        .unwrap();
    let back = reader
        .deserialize(&writer.serialize(&Value::object(holder)).unwrap())
        .unwrap();
    assert_eq!(field(&back, "id"), Value::Int32(9));
    assert_eq!(field(&back, "tail"), Value::string("end"));
}

#[test]
fn test_class_def_written_once_per_call() {
    let mut spindle = compatible();
    spindle.register(point_def()).unwrap();
    let def = registered(&spindle, "demo.Point");
    let one = spindle.serialize(&point(&def, 1, 2)).unwrap();
    let list = Value::list((0..10).map(|i| point(&def, i, i)).collect());
    let many = spindle.serialize(&list).unwrap();

    let mut inline = compatible().share_meta(false);
    inline.register(point_def()).unwrap();
    let def = registered(&inline, "demo.Point");
    let list = Value::list((0..10).map(|i| point(&def, i, i)).collect());
    let inline_many = inline.serialize(&list).unwrap();

    assert!(many.len() < one.len() * 10);
    assert!(inline_many.len() > many.len());
    assert_eq!(inline.deserialize(&inline_many).unwrap(), list);
    assert_eq!(spindle.deserialize(&many).unwrap(), list);
}

#[test]
fn test_meta_context_spans_calls() {
    if spindle_core::error::should_panic_on_error() {
        return;
    }
    let mut spindle = compatible();
    spindle.register(point_def()).unwrap();
    let def = registered(&spindle, "demo.Point");

    let mut write_meta = MetaContext::new();
    let first = spindle
        .serialize_with_meta_context(&point(&def, 1, 1), &mut write_meta)
        .unwrap();
    let second = spindle
        .serialize_with_meta_context(&point(&def, 2, 2), &mut write_meta)
        .unwrap();
    assert!(second.len() < first.len());

    let mut read_meta = MetaContext::new();
    let a = spindle
        .deserialize_with_meta_context(&first, &mut read_meta)
        .unwrap();
    let b = spindle
        .deserialize_with_meta_context(&second, &mut read_meta)
        .unwrap();
    assert_eq!(field(&a, "x"), Value::Int32(1));
    assert_eq!(field(&b, "x"), Value::Int32(2));

    // The second message only refers to a definition sent earlier.
    assert!(matches!(
        spindle.deserialize_with_meta_context(&second, &mut MetaContext::new()),
        Err(Error::InvalidData(_))
    ));
}

#[test]
fn test_meta_context_survives_failed_call() {
    if spindle_core::error::should_panic_on_error() {
        return;
    }
    let mut spindle = compatible();
    spindle.register(point_def()).unwrap();
    spindle
        .register(
            TypeDef::builder("demo.Bad")
                .field("n", FieldType::Int32)
                .build()
                .unwrap(),
        )
        .unwrap();
    let def = registered(&spindle, "demo.Point");
    let bad_def = registered(&spindle, "demo.Bad");

    let mut write_meta = MetaContext::new();
    let first = spindle
        .serialize_with_meta_context(&point(&def, 1, 1), &mut write_meta)
        .unwrap();
    let null_field = Value::object(Object::new(&bad_def).with("n", Value::Null).unwrap());
    assert!(matches!(
        spindle.serialize_with_meta_context(&null_field, &mut write_meta),
        Err(Error::TypeError(_))
    ));
    let third = spindle
        .serialize_with_meta_context(&point(&def, 3, 3), &mut write_meta)
        .unwrap();
    let good = Value::object(Object::new(&bad_def).with("n", 4).unwrap());
    let fourth = spindle
        .serialize_with_meta_context(&good, &mut write_meta)
        .unwrap();

    let mut read_meta = MetaContext::new();
    let a = spindle
        .deserialize_with_meta_context(&first, &mut read_meta)
        .unwrap();
    let c = spindle
        .deserialize_with_meta_context(&third, &mut read_meta)
        .unwrap();
    let d = spindle
        .deserialize_with_meta_context(&fourth, &mut read_meta)
        .unwrap();
    assert_eq!(field(&a, "x"), Value::Int32(1));
    assert_eq!(field(&c, "x"), Value::Int32(3));
    assert_eq!(field(&d, "n"), Value::Int32(4));
}
