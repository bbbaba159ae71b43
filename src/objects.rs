// glbridge/src/objects.rs
//
//! The object ID table: small integer handles standing in for native GL
//! objects.
//!
//! Script never sees driver object names or native pointers. It sees object
//! IDs, which this table resolves to the real names (`GLuint`s) the driver
//! handed back. IDs can be allocated before the native object exists at all:
//! the mapping is filled in later, typically by deferred work running on the
//! render thread.

use fnv::FnvHashMap;
use log::warn;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::Error;

/// A small integer naming one logical GL resource within a single context.
///
/// Valid only for the context that allocated it. 0 is never allocated; the
/// bridge surface uses it as the failure sentinel.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ObjectID(pub u32);

/// A driver-side object name (a `GLuint`): texture, buffer, program, and so
/// on. 0 means "no object", as it does in GL itself.
pub type NativeHandle = u32;

// One table per context. The table is shared with queued work through cheap
// clones, so a deferred creation can fill in its mapping while running on
// the render thread.
pub(crate) struct ObjectTable {
    objects: Arc<Mutex<FnvHashMap<ObjectID, NativeHandle>>>,
    next_id: Arc<AtomicU32>,
}

impl Clone for ObjectTable {
    fn clone(&self) -> ObjectTable {
        ObjectTable {
            objects: self.objects.clone(),
            next_id: self.next_id.clone(),
        }
    }
}

impl ObjectTable {
    pub(crate) fn new() -> ObjectTable {
        ObjectTable {
            objects: Arc::new(Mutex::new(FnvHashMap::default())),
            next_id: Arc::new(AtomicU32::new(1)),
        }
    }

    fn lock(&self) -> MutexGuard<FnvHashMap<ObjectID, NativeHandle>> {
        self.objects.lock().unwrap_or_else(|err| err.into_inner())
    }

    // IDs are allocated monotonically and never reused while the context
    // lives, so a stale ID resolves to nothing rather than aliasing a newer
    // object. The counter saturates: once it reaches the ceiling, allocation
    // fails rather than wrapping around into live IDs.
    pub(crate) fn create(&self) -> Result<ObjectID, Error> {
        let allocated = self
            .next_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| {
                id.checked_add(1)
            });
        match allocated {
            Ok(id) => Ok(ObjectID(id)),
            Err(_) => {
                warn!("object ID space exhausted");
                Err(Error::ObjectIdsExhausted)
            }
        }
    }

    pub(crate) fn destroy(&self, id: ObjectID) {
        self.lock().remove(&id);
    }

    pub(crate) fn map(&self, id: ObjectID, native: NativeHandle) {
        self.lock().insert(id, native);
    }

    pub(crate) fn get(&self, id: ObjectID) -> Option<NativeHandle> {
        self.lock().get(&id).copied()
    }
}
