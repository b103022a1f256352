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

//! Per-type codec cache.
//!
//! Every registered type starts on its [`LayoutCodec`]. The engine's
//! [`CodecFactory`] builds a faster codec the first time the type is used;
//! with synchronous compilation the first caller builds it and concurrent
//! callers wait, with asynchronous compilation a background thread builds it
//! while callers keep using the layout codec, and the result is published
//! atomically.

use crate::codec::object::{LayoutCodec, ObjectCodec};
use crate::config::Config;
use crate::error::Error;
use crate::meta::FieldLayout;
use crate::resolver::type_registry::TypeEntry;
use arc_swap::ArcSwapOption;
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;

/// Builds the codec a type is served by once it leaves the layout codec.
pub trait CodecFactory: Send + Sync {
    fn build(&self, entry: &TypeEntry, config: &Config) -> Result<Arc<dyn ObjectCodec>, Error>;
}

struct Built(Arc<dyn ObjectCodec>);

pub struct CodecSlot {
    interim: Arc<dyn ObjectCodec>,
    custom: Option<Arc<dyn ObjectCodec>>,
    compiled: OnceLock<Option<Arc<dyn ObjectCodec>>>,
    published: ArcSwapOption<Built>,
    building: AtomicBool,
}

impl CodecSlot {
    pub(crate) fn new(
        type_name: &Arc<str>,
        layout: &Arc<FieldLayout>,
        custom: Option<Arc<dyn ObjectCodec>>,
    ) -> CodecSlot {
        CodecSlot {
            interim: Arc::new(LayoutCodec::new(type_name, layout)),
            custom,
            compiled: OnceLock::new(),
            published: ArcSwapOption::empty(),
            building: AtomicBool::new(false),
        }
    }

    /// Codec to use for `entry` right now.
    pub(crate) fn resolve(
        &self,
        entry: &Arc<TypeEntry>,
        factory: &Arc<dyn CodecFactory>,
        config: &Config,
    ) -> Arc<dyn ObjectCodec> {
        if let Some(custom) = &self.custom {
            return custom.clone();
        }
        if entry.is_anonymous() {
            return self.interim.clone();
        }
        if config.is_async_compilation() {
            if let Some(built) = self.published.load_full() {
                return built.0.clone();
            }
            if !self.building.swap(true, Ordering::AcqRel) {
                spawn_build(entry, factory, config);
            }
            return self.interim.clone();
        }
        let compiled = self.compiled.get_or_init(|| match factory.build(entry, config) {
            Ok(codec) => {
                debug!("codec for `{}` is ready", entry.name());
                Some(codec)
            }
            Err(err) => {
                warn!(
                    "building codec for `{}` failed, using the layout codec: {}",
                    entry.name(),
                    err
                );
                None
            }
        });
        match compiled {
            Some(codec) => codec.clone(),
            None => self.interim.clone(),
        }
    }

    /// Whether calls are served by something other than the layout codec.
    pub fn is_ready(&self) -> bool {
        self.custom.is_some()
            || matches!(self.compiled.get(), Some(Some(_)))
            || self.published.load().is_some()
    }
}

fn spawn_build(entry: &Arc<TypeEntry>, factory: &Arc<dyn CodecFactory>, config: &Config) {
    let (entry, factory, config) = (entry.clone(), factory.clone(), config.clone());
    let name = format!("spindle-codec-{}", entry.name().replace('\0', ""));
    let spawned = thread::Builder::new().name(name).spawn({
        let entry = entry.clone();
        move || match factory.build(&entry, &config) {
            Ok(codec) => {
                entry.codec_slot().published.store(Some(Arc::new(Built(codec))));
                debug!("published codec for `{}`", entry.name());
            }
            Err(err) => warn!(
                "background build of `{}` failed, staying on the layout codec: {}",
                entry.name(),
                err
            ),
        }
    });
    if let Err(err) = spawned {
        warn!("could not start codec build for `{}`: {}", entry.name(), err);
        entry.codec_slot().building.store(false, Ordering::Release);
    }
}
