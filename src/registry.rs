// glbridge/src/registry.rs
//
//! The registry of live contexts.
//!
//! The registry exclusively owns the ContextID -> context mapping. IDs are
//! allocated from 1 under the registry lock, so they are unique while live;
//! 0 is never allocated and serves as the failure sentinel on the bridge
//! surface. Embedders can own private registries; the flat bridge functions
//! in [`crate::api`] go through one process-wide instance.

use fnv::FnvHashMap;
use log::{debug, warn};
use std::os::raw::c_void;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::context::{Context, ContextID};
use crate::error::Error;

// What the registry owns: the next ID to hand out and the table of live
// contexts.
struct RegistryData {
    next_id: u32,
    contexts: FnvHashMap<ContextID, Context>,
}

/// The table of live contexts, keyed by [`ContextID`].
///
/// Cheap to clone; clones share the same table.
#[derive(Clone)]
pub struct Registry(Arc<Mutex<RegistryData>>);

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Registry {
        Registry(Arc::new(Mutex::new(RegistryData {
            next_id: 1,
            contexts: FnvHashMap::default(),
        })))
    }

    fn lock(&self) -> MutexGuard<RegistryData> {
        self.0.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Creates a context bound to the JS engine behind `engine` and
    /// registers it under a fresh ID.
    ///
    /// Fails if `engine` is null or the ID space is exhausted. The handle
    /// is kept as an opaque address and never dereferenced.
    pub fn create_context(&self, engine: *mut c_void) -> Result<ContextID, Error> {
        if engine.is_null() {
            return Err(Error::NullEngineHandle);
        }
        let mut data = self.lock();
        if data.next_id == u32::MAX {
            warn!("context ID space exhausted");
            return Err(Error::ContextIdsExhausted);
        }
        let id = ContextID(data.next_id);
        data.next_id += 1;
        debug_assert!(!data.contexts.contains_key(&id));
        data.contexts.insert(id, Context::new(id, engine));
        debug!("created context {:?}", id);
        Ok(id)
    }

    /// Resolves `id` to a live context.
    pub fn get(&self, id: ContextID) -> Option<Context> {
        self.lock().contexts.get(&id).cloned()
    }

    /// Destroys the context registered under `id`. Unknown IDs are a no-op.
    ///
    /// Safe to call while the render thread is flushing the same context:
    /// the flusher's clone keeps the state alive until its call returns,
    /// after which it is freed. All later operations on `id` fail with
    /// [`Error::NoSuchContext`] or the bridge surface's sentinels.
    pub fn destroy_context(&self, id: ContextID) {
        let removed = self.lock().contexts.remove(&id);
        if let Some(context) = removed {
            context.teardown();
            debug!("destroyed context {:?}", id);
        }
    }
}

impl Default for Registry {
    fn default() -> Registry {
        Registry::new()
    }
}
