// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The process-wide live-fiber index (spec §4.7's `Fiber.all()`/introspection
//! surface): every fiber registers itself on start and removes itself on
//! completion.

use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::handle::DynFiber;
use crate::id::FiberId;

fn registry() -> &'static Mutex<HashMap<FiberId, DynFiber>> {
    static REGISTRY: OnceLock<Mutex<HashMap<FiberId, DynFiber>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

pub(crate) fn register(fiber: DynFiber) {
    registry().lock().insert(fiber.id(), fiber);
}

pub(crate) fn unregister(id: FiberId) {
    registry().lock().remove(&id);
}

/// A snapshot of every fiber currently registered as live, in no particular
/// order.
#[must_use]
pub fn all() -> Vec<DynFiber> {
    registry().lock().values().cloned().collect()
}

/// Look up a live fiber by id.
#[must_use]
pub fn find(id: FiberId) -> Option<DynFiber> {
    registry().lock().get(&id).cloned()
}
