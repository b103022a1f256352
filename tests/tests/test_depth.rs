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
use spindle_core::{Spindle, Value};
use tests::{chain, node_def, registered};

fn nested_lists(depth: usize) -> Value {
    let mut value = Value::Int32(0);
    for _ in 0..depth {
        value = Value::list(vec![value]);
    }
    value
}

#[test]
fn test_depth_within_limit() {
    let mut spindle = Spindle::default().max_depth(5);
    spindle.register(node_def()).unwrap();
    let def = registered(&spindle, "demo.Node");
    let bytes = spindle.serialize(&chain(&def, 5)).unwrap();
    assert!(spindle.deserialize(&bytes).is_ok());
    let bytes = spindle.serialize(&nested_lists(5)).unwrap();
    assert!(spindle.deserialize(&bytes).is_ok());
}

#[test]
fn test_depth_exceeded_on_write() {
    if spindle_core::error::should_panic_on_error() {
        return;
    }
    let mut spindle = Spindle::default().max_depth(5);
    spindle.register(node_def()).unwrap();
    let def = registered(&spindle, "demo.Node");
    let err = spindle.serialize(&chain(&def, 6)).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Resource);
    let msg = err.to_string();
    assert!(msg.contains("Maximum graph depth 5 exceeded"), "{msg}");
    assert!(msg.contains("demo.Node.next > demo.Node.next"), "{msg}");

    let err = spindle.serialize(&nested_lists(6)).unwrap_err();
    assert!(matches!(err, Error::DepthExceed { max: 5, .. }));
    assert!(err.to_string().contains("[0] > [0]"));
}

#[test]
fn test_depth_exceeded_on_read() {
    if spindle_core::error::should_panic_on_error() {
        return;
    }
    let mut writer = Spindle::default();
    writer.register(node_def()).unwrap();
    let def = registered(&writer, "demo.Node");
    let bytes = writer.serialize(&chain(&def, 64)).unwrap();

    let mut reader = Spindle::default().max_depth(16);
    reader.register(node_def()).unwrap();
    match reader.deserialize(&bytes).unwrap_err() {
        Error::DepthExceed { max, path } => {
            assert_eq!(max, 16);
            assert!(!path.is_empty());
            assert!(path.iter().all(|segment| segment == "demo.Node.next"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_raised_limit_allows_deep_graphs() {
    let handle = std::thread::Builder::new()
        .stack_size(32 * 1024 * 1024)
        .spawn(|| {
            let value = nested_lists(300);
            let spindle = Spindle::default().max_depth(1000);
            let bytes = spindle.serialize(&value).unwrap();
            assert_eq!(spindle.deserialize(&bytes).unwrap(), value);
            if !spindle_core::error::should_panic_on_error() {
                assert!(Spindle::default().serialize(&value).is_err());
            }
        })
        .unwrap();
    handle.join().unwrap();
}
