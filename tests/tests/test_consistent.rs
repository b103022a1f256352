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

use bytes::Bytes;
use spindle_core::buffer::Writer;
use spindle_core::error::Error;
use spindle_core::{FieldType, Object, Spindle, TypeDef, Value};
use tests::{field, point, point_def, registered, test_roundtrip};

#[test]
fn test_point_exact_bytes() {
    let mut spindle = Spindle::default().check_struct_hash(false);
    assert_eq!(spindle.register(point_def()).unwrap(), 0);
    let def = registered(&spindle, "demo.Point");

    let bytes = spindle.serialize(&point(&def, -1, i32::MAX)).unwrap();
    assert_eq!(
        bytes,
        vec![0x20, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F]
    );

    let back = spindle.deserialize(&bytes).unwrap();
    assert_eq!(field(&back, "x"), Value::Int32(-1));
    assert_eq!(field(&back, "y"), Value::Int32(i32::MAX));
}

#[test]
fn test_point_with_struct_hash() {
    let mut spindle = Spindle::default();
    spindle.register(point_def()).unwrap();
    let def = registered(&spindle, "demo.Point");
    let bytes = spindle.serialize(&point(&def, -1, i32::MAX)).unwrap();
    assert_eq!(bytes.len(), 1 + 4 + 8);
    assert_eq!(bytes[0], 0x20);
    assert_eq!(&bytes[5..], &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F]);
    test_roundtrip(&spindle, &point(&def, 3, 4));
}

#[test]
fn test_builtin_round_trips() {
    let spindle = Spindle::default();
    let values = vec![
        Value::Null,
        Value::Bool(true),
        Value::Int8(-8),
        Value::Int16(i16::MIN),
        Value::Int32(i32::MIN),
        Value::Int64(i64::MAX),
        Value::Float32(1.5),
        Value::Float64(-0.25),
        Value::string(""),
        Value::string("héllo wörld"),
        Value::Binary(Bytes::from_static(b"\x00\x01\x02")),
        Value::BoolArray(vec![true, false, true]),
        Value::Int16Array(vec![1, -2, 3]),
        Value::Int32Array(vec![i32::MIN, 0, i32::MAX]),
        Value::Int64Array(vec![]),
        Value::Float32Array(vec![0.5, 1.5]),
        Value::Float64Array(vec![f64::MAX, f64::MIN_POSITIVE]),
        Value::list(vec![]),
        Value::list(vec![Value::Int32(1), Value::Null, Value::string("x")]),
        Value::set(vec![Value::Int64(1), Value::Int64(2)]),
        Value::map(vec![
            (Value::string("a"), Value::Int32(1)),
            (Value::string("b"), Value::list(vec![Value::Bool(false)])),
        ]),
    ];
    for value in &values {
        test_roundtrip(&spindle, value);
    }
}

#[test]
fn test_all_field_groups() {
    let mut spindle = Spindle::default();
    spindle.register(point_def()).unwrap();
    spindle
        .register(
            TypeDef::builder("demo.Everything")
                .field("flag", FieldType::Bool)
                .field("small", FieldType::Int8)
                .field("short", FieldType::Int16)
                .field("int", FieldType::Int32)
                .field("long", FieldType::Int64)
                .field("float", FieldType::Float32)
                .field("double", FieldType::Float64)
                .nullable_field("maybe", FieldType::Int32)
                .nullable_field("missing", FieldType::Float64)
                .field("name", FieldType::String)
                .field("blob", FieldType::Binary)
                .field("ints", FieldType::Int32Array)
                .field("origin", FieldType::object("demo.Point"))
                .field("anything", FieldType::Any)
                .field("names", FieldType::list(FieldType::String))
                .field("points", FieldType::list(FieldType::object("demo.Point")))
                .field("ids", FieldType::set(FieldType::Int64))
                .field("scores", FieldType::map(FieldType::String, FieldType::Float64))
                .build()
                .unwrap(),
        )
        .unwrap();
    let point_def = registered(&spindle, "demo.Point");
    let def = registered(&spindle, "demo.Everything");
    let object = Object::new(&def)
        .with("flag", true)
        .unwrap()
        .with("small", 1i8)
        .unwrap()
        .with("short", 2i16)
        .unwrap()
        .with("int", 3)
        .unwrap()
        .with("long", 4i64)
        .unwrap()
        .with("float", 5.5f32)
        .unwrap()
        .with("double", 6.25)
        .unwrap()
        .with("maybe", 7)
        .unwrap()
        .with("name", "everything")
        .unwrap()
        .with("blob", Bytes::from_static(b"blob"))
        .unwrap()
        .with("ints", vec![1, 2, 3])
        .unwrap()
        .with("origin", point(&point_def, 0, 0))
        .unwrap()
        .with("anything", Value::map(vec![(Value::Int8(1), Value::Null)]))
        .unwrap()
        .with("names", Value::list(vec!["a".into(), Value::Null, "c".into()]))
        .unwrap()
        .with(
            "points",
            Value::list(vec![point(&point_def, 1, 2), point(&point_def, 3, 4)]),
        )
        .unwrap()
        .with("ids", Value::set(vec![Value::Int64(10), Value::Int64(20)]))
        .unwrap()
        .with(
            "scores",
            Value::map(vec![(Value::string("math"), Value::Float64(0.9))]),
        )
        .unwrap();
    let back = test_roundtrip(&spindle, &Value::object(object));
    assert_eq!(field(&back, "missing"), Value::Null);
}

#[test]
fn test_polymorphic_list_of_objects() {
    let mut spindle = Spindle::default();
    spindle.register(point_def()).unwrap();
    let def = registered(&spindle, "demo.Point");
    let mixed = Value::list(vec![
        point(&def, 1, 1),
        Value::string("not a point"),
        point(&def, 2, 2),
    ]);
    test_roundtrip(&spindle, &mixed);
    let same = Value::list(vec![point(&def, 1, 1), Value::Null, point(&def, 2, 2)]);
    test_roundtrip(&spindle, &same);
}

#[test]
fn test_struct_hash_mismatch() {
    if spindle_core::error::should_panic_on_error() {
        return;
    }
    let mut writer = Spindle::default();
    writer.register(point_def()).unwrap();
    let def = registered(&writer, "demo.Point");
    let bytes = writer.serialize(&point(&def, 1, 2)).unwrap();

    let mut reader = Spindle::default();
    reader
        .register(
            TypeDef::builder("demo.Point")
                .field("x", FieldType::Int32)
                .field("y", FieldType::Int64)
                .build()
                .unwrap(),
        )
        .unwrap();
    let err = reader.deserialize(&bytes).unwrap_err();
    match &err {
        Error::IncompatibleSchema {
            type_name,
            remote_hash,
            local_hash,
        } => {
            assert_eq!(type_name, "demo.Point");
            assert_ne!(remote_hash, local_hash);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("demo.Point"));
}

#[test]
fn test_null_in_primitive_field_is_rejected() {
    if spindle_core::error::should_panic_on_error() {
        return;
    }
    let mut spindle = Spindle::default();
    spindle.register(point_def()).unwrap();
    let def = registered(&spindle, "demo.Point");
    let mut object = Object::new(&def);
    object.set("x", Value::Null).unwrap();
    let err = spindle.serialize(&Value::object(object)).unwrap_err();
    assert!(matches!(err, Error::TypeError(_)));
}

#[test]
fn test_primitive_fields_accept_narrower_values() {
    let mut spindle = Spindle::default();
    spindle
        .register(
            TypeDef::builder("demo.Wide")
                .field("long", FieldType::Int64)
                .field("double", FieldType::Float64)
                .build()
                .unwrap(),
        )
        .unwrap();
    let def = registered(&spindle, "demo.Wide");
    let object = Object::new(&def)
        .with("long", 7i8)
        .unwrap()
        .with("double", 2.5f32)
        .unwrap();
    let back = spindle
        .deserialize(&spindle.serialize(&Value::object(object)).unwrap())
        .unwrap();
    assert_eq!(field(&back, "long"), Value::Int64(7));
    assert_eq!(field(&back, "double"), Value::Float64(2.5));
}

#[test]
fn test_garbage_input_never_panics() {
    if spindle_core::error::should_panic_on_error() {
        return;
    }
    let mut spindle = Spindle::default().track_ref(true);
    spindle.register(point_def()).unwrap();
    let inputs: [&[u8]; 8] = [
        &[],
        &[0x02],
        &[0x01, 0x00],
        &[0x20],
        &[0x1F],
        &[0x18, 0xFF, 0xFF, 0xFF, 0xFF, 0x0F],
        &[0x14, 0x05, 0x00],
        &[0x0C, 0xFF, 0xFF, 0xFF, 0xFF, 0x0F, 0xFF],
    ];
    for input in inputs {
        assert!(spindle.deserialize(input).is_err(), "{input:?}");
    }
}

fn empty_list_engine(max_collection_len: usize) -> (Spindle, Vec<u8>) {
    let mut spindle = Spindle::default()
        .check_struct_hash(false)
        .max_collection_len(max_collection_len);
    spindle
        .register(TypeDef::builder("demo.Empty").build().unwrap())
        .unwrap();
    let def = registered(&spindle, "demo.Empty");
    let empty = || Value::object(Object::new(&def));
    let bytes = spindle
        .serialize(&Value::list(vec![empty(), empty(), empty()]))
        .unwrap();
    (spindle, bytes)
}

#[test]
fn test_field_less_elements_cost_no_bytes() {
    let (spindle, bytes) = empty_list_engine(1 << 20);
    assert_eq!(bytes, vec![0x14, 3, 0x08, 0x20]);
    let back = spindle.deserialize(&bytes).unwrap();
    assert_eq!(back.as_list().unwrap().borrow().len(), 3);
}

#[test]
fn test_forged_collection_length() {
    if spindle_core::error::should_panic_on_error() {
        return;
    }
    let (spindle, bytes) = empty_list_engine(1 << 20);
    let mut writer = Writer::new();
    writer.write_u8(bytes[0]);
    writer.write_varuint32(20_000_000);
    writer.write_bytes(&bytes[2..]);
    assert!(matches!(
        spindle.deserialize(&writer.dump()),
        Err(Error::InvalidData(_))
    ));

    let (strict, bytes) = empty_list_engine(2);
    assert!(matches!(
        strict.deserialize(&bytes),
        Err(Error::InvalidData(_))
    ));
    // Elements that take input are bounded by it, not by the limit.
    let numbers = Value::list((0..10).map(Value::Int32).collect());
    assert_eq!(test_roundtrip(&strict, &numbers), numbers);
}
