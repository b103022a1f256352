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

use spindle_core::error::{Error, ErrorCategory};
use spindle_core::{FieldType, Object, Spindle, TypeDef, TypeKind, Value};
use tests::{field, registered, test_roundtrip};

fn range_def() -> TypeDef {
    TypeDef::builder("demo.Range")
        .field("start", FieldType::Int32)
        .field("end", FieldType::Int32)
        .record_with(|_, values| {
            if let (Value::Int32(start), Value::Int32(end)) = (&values[0], &values[1]) {
                if start > end {
                    return Err(format!("start {start} is after end {end}"));
                }
            }
            Ok(values)
        })
        .build()
        .unwrap()
}

fn range(spindle: &Spindle, start: i32, end: i32) -> Value {
    let def = registered(spindle, "demo.Range");
    Value::object(
        Object::new(&def)
            .with("start", start)
            .unwrap()
            .with("end", end)
            .unwrap(),
    )
}

#[test]
fn test_record_round_trip() {
    let mut spindle = Spindle::default();
    spindle.register(range_def()).unwrap();
    assert_eq!(
        registered(&spindle, "demo.Range").kind(),
        TypeKind::Record
    );
    test_roundtrip(&spindle, &range(&spindle, 1, 10));
    test_roundtrip(
        &spindle,
        &Value::list(vec![range(&spindle, 0, 0), range(&spindle, -5, 5)]),
    );
}

#[test]
fn test_construction_failure_reports_fields() {
    if spindle_core::error::should_panic_on_error() {
        return;
    }
    let mut spindle = Spindle::default();
    spindle.register(range_def()).unwrap();
    // The factory only runs on read, so an invalid range can be written.
    let bytes = spindle.serialize(&range(&spindle, 9, 3)).unwrap();
    let err = spindle.deserialize(&bytes).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Construction);
    match &err {
        Error::Construction {
            type_name,
            reason,
            fields,
        } => {
            assert_eq!(type_name, "demo.Range");
            assert!(reason.contains("start 9 is after end 3"));
            assert_eq!(fields, "demo.Range { start: 9, end: 3 }");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_shared_record_after_construction() {
    let mut spindle = Spindle::default().track_ref(true);
    spindle.register(range_def()).unwrap();
    let shared = range(&spindle, 1, 2);
    let list = Value::list(vec![shared.clone(), shared]);
    let back = test_roundtrip(&spindle, &list);
    let items = back.as_list().unwrap().borrow().clone();
    assert!(items[0].ptr_eq(&items[1]));
}

#[test]
fn test_record_with_missing_fields_in_compatible_mode() {
    let mut writer = Spindle::default().compatible(true);
    writer
        .register(
            TypeDef::builder("demo.Range")
                .field("start", FieldType::Int32)
                .record()
                .build()
                .unwrap(),
        )
        .unwrap();
    let mut reader = Spindle::default().compatible(true);
    reader.register(range_def()).unwrap();

    let def = registered(&writer, "demo.Range");
    let bytes = writer
        .serialize(&Value::object(Object::new(&def).with("start", -4).unwrap()))
        .unwrap();
    let back = reader.deserialize(&bytes).unwrap();
    assert_eq!(field(&back, "start"), Value::Int32(-4));
    assert_eq!(field(&back, "end"), Value::Int32(0));
}
