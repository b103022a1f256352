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

use crate::util::Spinlock;
use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Number of segments in the pool. Using 16 segments to reduce contention.
const NUM_SEGMENTS: usize = 16;

/// Idle items kept per segment; extra items are dropped on return.
const MAX_IDLE_PER_SEGMENT: usize = 8;

/// Hands out segment indexes round-robin, one per thread.
static NEXT_SEGMENT: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static SEGMENT_INDEX: Cell<usize> =
        Cell::new(NEXT_SEGMENT.fetch_add(1, Ordering::Relaxed) % NUM_SEGMENTS);
}

type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;
type Recycler<T> = Box<dyn Fn(&mut T) + Send + Sync>;

/// A segmented pool of per-call scratch state.
///
/// Each thread is pinned to one segment, so threads borrowing concurrently
/// usually take different locks. Items are recycled before they go back,
/// so a borrowed item is always in its initial state.
pub struct Pool<T> {
    segments: [Spinlock<Vec<T>>; NUM_SEGMENTS],
    factory: Factory<T>,
    recycle: Recycler<T>,
}

impl<T> Pool<T> {
    pub fn new<F, R>(factory: F, recycle: R) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        R: Fn(&mut T) + Send + Sync + 'static,
    {
        Pool {
            segments: std::array::from_fn(|_| Spinlock::new(Vec::new())),
            factory: Box::new(factory),
            recycle: Box::new(recycle),
        }
    }

    /// Borrows an item, runs `handler` on it, then recycles and returns it.
    #[inline(always)]
    pub fn borrow_mut<R>(&self, handler: impl FnOnce(&mut T) -> R) -> R {
        let segment = &self.segments[SEGMENT_INDEX.with(|idx| idx.get())];
        let popped = segment.lock().pop();
        let mut item = popped.unwrap_or_else(|| (self.factory)());
        let result = handler(&mut item);
        (self.recycle)(&mut item);
        let mut idle = segment.lock();
        if idle.len() < MAX_IDLE_PER_SEGMENT {
            idle.push(item);
        }
        result
    }

    /// Items currently idle across all segments.
    pub fn idle(&self) -> usize {
        self.segments.iter().map(|s| s.lock().len()).sum()
    }
}
