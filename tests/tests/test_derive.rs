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
use spindle::{Error, GraphObject, GraphStruct, Spindle, TypeKind, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;
use tests::init_logger;

#[derive(GraphObject, Debug, PartialEq, Clone, Default)]
#[spindle(name = "demo.Address")]
struct Address {
    street: String,
    zip: i32,
}

#[derive(GraphObject, Debug, PartialEq, Clone, Default)]
#[spindle(name = "demo.Person")]
struct Person {
    name: String,
    age: i16,
    score: f64,
    nickname: Option<String>,
    tags: Vec<String>,
    ratings: HashMap<String, i64>,
    ordered: BTreeMap<i32, String>,
    labels: HashSet<String>,
    home: Option<Address>,
    avatar: Bytes,
    extra: Value,
}

fn person() -> Person {
    Person {
        name: "Ada".to_string(),
        age: 36,
        score: 99.5,
        nickname: None,
        tags: vec!["math".to_string(), "engines".to_string()],
        ratings: HashMap::from([("x".to_string(), 1), ("y".to_string(), -2)]),
        ordered: BTreeMap::from([(1, "one".to_string()), (2, "two".to_string())]),
        labels: HashSet::from(["a".to_string()]),
        home: Some(Address {
            street: "Main".to_string(),
            zip: 12345,
        }),
        avatar: Bytes::from_static(b"\x89PNG"),
        extra: Value::list(vec![Value::Int8(1), Value::string("two")]),
    }
}

fn engine() -> Spindle {
    let mut spindle = Spindle::default();
    spindle.register_type::<Address>().unwrap();
    spindle.register_type::<Person>().unwrap();
    spindle
}

#[test]
fn test_struct_roundtrip() {
    init_logger();
    let spindle = engine();
    let src = person();
    let bytes = spindle.serialize_object(&src).unwrap();
    let dest: Person = spindle.deserialize_object(&bytes).unwrap();
    assert_eq!(dest, src);
}

#[test]
fn test_derived_type_def() {
    let def = Person::type_def().unwrap();
    assert_eq!(Person::TYPE_NAME, "demo.Person");
    assert_eq!(def.name(), "demo.Person");
    assert_eq!(def.kind(), TypeKind::Struct);
    let names: Vec<&str> = def.fields().iter().map(|f| &*f.name).collect();
    assert_eq!(
        names,
        vec![
            "name", "age", "score", "nickname", "tags", "ratings", "ordered", "labels", "home",
            "avatar", "extra"
        ]
    );
    let nickname = &def.fields()[3];
    assert!(nickname.nullable);
    assert_eq!(nickname.field_type, spindle::FieldType::String);
    assert!(!def.fields()[0].nullable);
}

#[test]
fn test_typed_and_dynamic_agree() {
    let spindle = engine();
    let bytes = spindle.serialize_object(&person()).unwrap();
    let value = spindle.deserialize(&bytes).unwrap();
    let object = value.as_object().unwrap().borrow();
    assert_eq!(object.type_name(), "demo.Person");
    assert_eq!(object.get("age"), Some(&Value::Int16(36)));
    assert_eq!(object.get("nickname"), Some(&Value::Null));
}

#[derive(GraphObject, Debug, PartialEq)]
#[spindle(name = "demo.Renamed")]
struct Renamed {
    #[spindle(rename = "id")]
    identifier: i64,
    #[spindle(skip)]
    cache: Vec<u8>,
    label: String,
}

#[test]
fn test_rename_and_skip() {
    let mut spindle = Spindle::default();
    spindle.register_type::<Renamed>().unwrap();
    let def = spindle.type_def("demo.Renamed").unwrap();
    let names: Vec<&str> = def.fields().iter().map(|f| &*f.name).collect();
    assert_eq!(names, vec!["id", "label"]);

    let src = Renamed {
        identifier: 7,
        cache: vec![1, 2, 3],
        label: "seven".to_string(),
    };
    let bytes = spindle.serialize_object(&src).unwrap();
    let dest: Renamed = spindle.deserialize_object(&bytes).unwrap();
    assert_eq!(dest.identifier, 7);
    assert_eq!(dest.label, "seven");
    assert!(dest.cache.is_empty());
}

#[derive(GraphObject, Debug, PartialEq)]
#[spindle(name = "demo.Pair")]
struct Pair(i32, String);

#[derive(GraphObject, Debug, PartialEq)]
#[spindle(name = "demo.Marker")]
struct Marker;

#[derive(GraphObject, Debug, PartialEq)]
#[spindle(name = "demo.Holder")]
struct Holder {
    pair: Pair,
    marker: Option<Marker>,
}

#[test]
fn test_tuple_and_unit_structs() {
    let mut spindle = Spindle::default();
    spindle.register_type::<Pair>().unwrap();
    spindle.register_type::<Marker>().unwrap();
    spindle.register_type::<Holder>().unwrap();
    let names: Vec<String> = Pair::type_def()
        .unwrap()
        .fields()
        .iter()
        .map(|f| f.name.to_string())
        .collect();
    assert_eq!(names, vec!["_0", "_1"]);

    let src = Holder {
        pair: Pair(3, "three".to_string()),
        marker: Some(Marker),
    };
    let bytes = spindle.serialize_object(&src).unwrap();
    assert_eq!(spindle.deserialize_object::<Holder>(&bytes).unwrap(), src);

    let bytes = spindle.serialize_object(&Marker).unwrap();
    assert_eq!(spindle.deserialize_object::<Marker>(&bytes).unwrap(), Marker);
}

#[derive(GraphObject, Debug, PartialEq)]
#[spindle(name = "demo.Span", record)]
struct Span {
    from: i32,
    to: i32,
}

#[test]
fn test_record_struct() {
    let mut spindle = Spindle::default();
    spindle.register_type::<Span>().unwrap();
    assert_eq!(Span::type_def().unwrap().kind(), TypeKind::Record);
    let src = Span { from: 1, to: 5 };
    let bytes = spindle.serialize_object(&src).unwrap();
    assert_eq!(spindle.deserialize_object::<Span>(&bytes).unwrap(), src);
}

#[derive(GraphObject, Debug)]
#[spindle(name = "demo.Shared")]
struct Shared {
    first: Rc<Address>,
    second: Rc<Address>,
    others: Vec<Rc<Address>>,
}

#[test]
fn test_shared_rc_identity() {
    let mut spindle = Spindle::default().track_ref(true);
    spindle.register_type::<Address>().unwrap();
    spindle.register_type::<Shared>().unwrap();
    let address = Rc::new(Address {
        street: "Elm".to_string(),
        zip: 1,
    });
    let src = Shared {
        first: address.clone(),
        second: address.clone(),
        others: vec![address.clone(), Rc::new(Address::default())],
    };
    let bytes = spindle.serialize_object(&src).unwrap();
    let dest: Shared = spindle.deserialize_object(&bytes).unwrap();
    assert!(Rc::ptr_eq(&dest.first, &dest.second));
    assert!(Rc::ptr_eq(&dest.first, &dest.others[0]));
    assert!(!Rc::ptr_eq(&dest.first, &dest.others[1]));
    assert_eq!(*dest.first, *address);

    // Without tracking the shared address is written, and read back, twice.
    let mut plain = Spindle::default();
    plain.register_type::<Address>().unwrap();
    plain.register_type::<Shared>().unwrap();
    let bytes = plain.serialize_object(&src).unwrap();
    let dest: Shared = plain.deserialize_object(&bytes).unwrap();
    assert!(!Rc::ptr_eq(&dest.first, &dest.second));
    assert_eq!(dest.first, dest.second);
}

#[derive(GraphObject, Debug, PartialEq)]
#[spindle(name = "demo.User")]
struct UserV1 {
    id: i32,
    name: Option<String>,
    legacy: i64,
}

#[derive(GraphObject, Debug, PartialEq)]
#[spindle(name = "demo.User")]
struct UserV2 {
    id: i32,
    name: Option<String>,
    email: Option<String>,
    visits: i64,
}

#[test]
fn test_compatible_evolution() {
    let mut old = Spindle::default().compatible(true);
    old.register_type::<UserV1>().unwrap();
    let mut new = Spindle::default().compatible(true);
    new.register_type::<UserV2>().unwrap();

    let v1 = UserV1 {
        id: 1,
        name: Some("ann".to_string()),
        legacy: 99,
    };
    let bytes = old.serialize_object(&v1).unwrap();
    let v2: UserV2 = new.deserialize_object(&bytes).unwrap();
    assert_eq!(
        v2,
        UserV2 {
            id: 1,
            name: Some("ann".to_string()),
            email: None,
            visits: 0,
        }
    );

    let v2 = UserV2 {
        id: 2,
        name: None,
        email: Some("b@example.com".to_string()),
        visits: 3,
    };
    let bytes = new.serialize_object(&v2).unwrap();
    let v1: UserV1 = old.deserialize_object(&bytes).unwrap();
    assert_eq!(
        v1,
        UserV1 {
            id: 2,
            name: None,
            legacy: 0,
        }
    );
}

#[test]
fn test_unregistered_type_is_rejected() {
    if spindle_core::error::should_panic_on_error() {
        return;
    }
    let spindle = Spindle::default();
    let err = spindle.serialize_object(&Address::default()).unwrap_err();
    assert!(matches!(err, Error::UnknownType(_)), "{err}");
}

#[test]
fn test_wrong_target_type() {
    if spindle_core::error::should_panic_on_error() {
        return;
    }
    let spindle = engine();
    let bytes = spindle.serialize_object(&Address::default()).unwrap();
    let err = spindle.deserialize_object::<Person>(&bytes).unwrap_err();
    assert!(matches!(err, Error::TypeError(_)), "{err}");
}
