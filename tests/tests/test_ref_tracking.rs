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
use spindle_core::{FieldType, Object, Spindle, TypeDef, Value};
use tests::{field, node_def, registered, test_roundtrip};

fn items(value: &Value) -> Vec<Value> {
    value.as_list().unwrap().borrow().clone()
}

#[test]
fn test_shared_list_keeps_identity() {
    let spindle = Spindle::default().track_ref(true);
    let inner = Value::list(vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)]);
    let outer = Value::list(vec![inner.clone(), inner]);

    let back = test_roundtrip(&spindle, &outer);
    let slots = items(&back);
    assert!(slots[0].ptr_eq(&slots[1]));

    slots[0].as_list().unwrap().borrow_mut().push(Value::Int32(4));
    assert_eq!(items(&slots[1]).len(), 4);
}

#[test]
fn test_without_tracking_shared_nodes_are_copied() {
    let spindle = Spindle::default();
    let inner = Value::list(vec![Value::Int32(1)]);
    let outer = Value::list(vec![inner.clone(), inner]);
    let back = test_roundtrip(&spindle, &outer);
    let slots = items(&back);
    assert!(!slots[0].ptr_eq(&slots[1]));
}

#[test]
fn test_self_containing_list() {
    let spindle = Spindle::default().track_ref(true);
    let list = Value::list(vec![Value::string("head")]);
    list.as_list().unwrap().borrow_mut().push(list.clone());

    let bytes = spindle.serialize(&list).unwrap();
    let back = spindle.deserialize(&bytes).unwrap();
    let slots = items(&back);
    assert_eq!(slots[0], Value::string("head"));
    assert!(slots[1].ptr_eq(&back));
}

#[test]
fn test_object_cycle() {
    let mut spindle = Spindle::default().track_ref(true);
    spindle.register(node_def()).unwrap();
    let def = registered(&spindle, "demo.Node");

    let a = Value::object(Object::new(&def).with("value", 1).unwrap());
    let b = Value::object(
        Object::new(&def)
            .with("value", 2)
            .unwrap()
            .with("next", a.clone())
            .unwrap(),
    );
    a.as_object().unwrap().borrow_mut().set("next", b.clone()).unwrap();

    let back = spindle.deserialize(&spindle.serialize(&a).unwrap()).unwrap();
    let next = field(&back, "next");
    assert_eq!(field(&next, "value"), Value::Int32(2));
    assert!(field(&next, "next").ptr_eq(&back));
}

#[test]
fn test_shared_map_values_and_keys() {
    let spindle = Spindle::default().track_ref(true);
    let key = Value::list(vec![Value::Int8(1)]);
    let map = Value::map(vec![
        (key.clone(), Value::string("first")),
        (Value::string("again"), key.clone()),
    ]);
    let root = Value::list(vec![map.clone(), map, key]);
    let back = test_roundtrip(&spindle, &root);
    let slots = items(&back);
    assert!(slots[0].ptr_eq(&slots[1]));
    let entries = slots[0].as_map().unwrap().borrow().clone();
    assert!(entries[0].0.ptr_eq(&entries[1].1));
    assert!(entries[0].0.ptr_eq(&slots[2]));
}

#[test]
fn test_cycle_without_tracking_hits_depth_limit() {
    if spindle_core::error::should_panic_on_error() {
        return;
    }
    let mut spindle = Spindle::default().max_depth(32);
    spindle.register(node_def()).unwrap();
    let def = registered(&spindle, "demo.Node");
    let node = Value::object(Object::new(&def).with("value", 1).unwrap());
    node.as_object().unwrap().borrow_mut().set("next", node.clone()).unwrap();

    let err = spindle.serialize(&node).unwrap_err();
    assert!(matches!(err, Error::DepthExceed { max: 32, .. }));
    assert!(err.to_string().contains("demo.Node.next"), "{err}");
}

#[test]
fn test_reference_to_record_under_construction() {
    if spindle_core::error::should_panic_on_error() {
        return;
    }
    let mut spindle = Spindle::default().track_ref(true);
    spindle
        .register(
            TypeDef::builder("demo.Frozen")
                .field("peer", FieldType::Any)
                .record()
                .build()
                .unwrap(),
        )
        .unwrap();
    let def = registered(&spindle, "demo.Frozen");
    let frozen = Value::object(Object::new(&def));
    frozen.as_object().unwrap().borrow_mut().set("peer", frozen.clone()).unwrap();

    let bytes = spindle.serialize(&frozen).unwrap();
    let err = spindle.deserialize(&bytes).unwrap_err();
    assert!(matches!(err, Error::InvalidRef(_)), "{err:?}");
}

#[test]
fn test_ref_marker_without_tracking_is_rejected() {
    if spindle_core::error::should_panic_on_error() {
        return;
    }
    let spindle = Spindle::default();
    assert!(matches!(
        spindle.deserialize(&[0x01, 0x00]),
        Err(Error::InvalidRef(_))
    ));
}
