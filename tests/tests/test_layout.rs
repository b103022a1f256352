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

use spindle_core::meta::FieldGroup;
use spindle_core::{FieldType, Object, Spindle, TypeDef, Value};
use tests::{registered, test_roundtrip};

#[test]
fn test_primitives_are_packed_by_width() {
    let mut spindle = Spindle::default().check_struct_hash(false);
    spindle
        .register(
            TypeDef::builder("demo.Packed")
                .field("flag", FieldType::Bool)
                .field("short", FieldType::Int16)
                .field("long", FieldType::Int64)
                .field("int", FieldType::Int32)
                .build()
                .unwrap(),
        )
        .unwrap();
    let def = registered(&spindle, "demo.Packed");
    let object = Object::new(&def)
        .with("flag", true)
        .unwrap()
        .with("short", 0x0102i16)
        .unwrap()
        .with("long", 0x0304i64)
        .unwrap()
        .with("int", 0x05i32)
        .unwrap();
    let bytes = spindle.serialize(&Value::object(object)).unwrap();
    assert_eq!(
        bytes,
        vec![0x20, 0x04, 0x03, 0, 0, 0, 0, 0, 0, 0x05, 0, 0, 0, 0x02, 0x01, 0x01]
    );
}

#[test]
fn test_declaration_order_does_not_change_the_wire() {
    let forward = TypeDef::builder("demo.Pair")
        .field("left", FieldType::String)
        .field("right", FieldType::Int64)
        .build()
        .unwrap();
    let backward = TypeDef::builder("demo.Pair")
        .field("right", FieldType::Int64)
        .field("left", FieldType::String)
        .build()
        .unwrap();
    let mut a = Spindle::default();
    a.register(forward).unwrap();
    let mut b = Spindle::default();
    b.register(backward).unwrap();

    let build = |spindle: &Spindle| {
        let def = registered(spindle, "demo.Pair");
        Value::object(
            Object::new(&def)
                .with("left", "l")
                .unwrap()
                .with("right", 1i64)
                .unwrap(),
        )
    };
    let bytes_a = a.serialize(&build(&a)).unwrap();
    let bytes_b = b.serialize(&build(&b)).unwrap();
    assert_eq!(bytes_a, bytes_b);
    let read = b.deserialize(&bytes_a).unwrap();
    assert_eq!(
        read.as_object().unwrap().borrow().get("left"),
        Some(&Value::string("l"))
    );
}

#[test]
fn test_structural_hash_tracks_shape() {
    let hash = |def: TypeDef| {
        let mut spindle = Spindle::default();
        spindle.register(def).unwrap();
        spindle
            .registry()
            .get_by_name("demo.Shape")
            .unwrap()
            .layout()
            .struct_hash()
    };
    let base = hash(
        TypeDef::builder("demo.Shape")
            .field("a", FieldType::Int32)
            .field("b", FieldType::String)
            .build()
            .unwrap(),
    );
    let reordered = hash(
        TypeDef::builder("demo.Shape")
            .field("b", FieldType::String)
            .field("a", FieldType::Int32)
            .build()
            .unwrap(),
    );
    let retyped = hash(
        TypeDef::builder("demo.Shape")
            .field("a", FieldType::Int64)
            .field("b", FieldType::String)
            .build()
            .unwrap(),
    );
    let renamed = hash(
        TypeDef::builder("demo.Shape")
            .field("a", FieldType::Int32)
            .field("c", FieldType::String)
            .build()
            .unwrap(),
    );
    let boxed = hash(
        TypeDef::builder("demo.Shape")
            .nullable_field("a", FieldType::Int32)
            .field("b", FieldType::String)
            .build()
            .unwrap(),
    );
    assert_eq!(base, reordered);
    assert_ne!(base, retyped);
    assert_ne!(base, renamed);
    assert_ne!(base, boxed);
}

#[test]
fn test_shadowed_fields_round_trip() {
    let parent = TypeDef::builder("demo.Animal")
        .field("name", FieldType::String)
        .field("legs", FieldType::Int32)
        .build()
        .unwrap();
    let child = TypeDef::builder("demo.Dog")
        .extends(&parent)
        .field("name", FieldType::String)
        .field("good", FieldType::Bool)
        .build()
        .unwrap();
    for compatible in [false, true] {
        let mut spindle = Spindle::default().compatible(compatible);
        spindle.register(child.clone()).unwrap();
        let def = registered(&spindle, "demo.Dog");
        let entry = spindle.registry().get_by_name("demo.Dog").unwrap().clone();
        let qualified: Vec<_> = entry
            .layout()
            .group(FieldGroup::Final)
            .iter()
            .map(|f| f.qualifier.as_deref().map(str::to_string))
            .collect();
        assert_eq!(
            qualified,
            vec![Some("demo.Animal".to_string()), Some("demo.Dog".to_string())]
        );

        let mut dog = Object::new(&def);
        dog.set_qualified("demo.Animal", "name", "animal").unwrap();
        dog.set("name", "rex").unwrap();
        dog.set("legs", 4).unwrap();
        dog.set("good", true).unwrap();
        let back = test_roundtrip(&spindle, &Value::object(dog));
        let back = back.as_object().unwrap().borrow();
        assert_eq!(back.get("name"), Some(&Value::string("rex")));
        assert_eq!(
            back.get_qualified("demo.Animal", "name"),
            Some(&Value::string("animal"))
        );
    }
}
