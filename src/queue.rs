// glbridge/src/queue.rs
//
//! The cross-thread work queue.
//!
//! GL contexts are thread-affine, so work that touches the driver cannot run
//! where it originates. The JS thread stages work here and the render thread
//! runs it at flush points, strictly in the order it was enqueued.
//!
//! Publication happens in two steps. The JS thread appends to a *pending*
//! batch, then commits the whole batch to the *backlog* at once. A flush
//! only ever sees committed batches, so a half-built batch is never executed
//! and the render thread contends with the JS thread only at batch
//! boundaries.

use std::mem;
use std::sync::{Mutex, MutexGuard};

// A deferred unit of GL work. Runs exactly once, on the render thread.
pub(crate) type WorkItem = Box<dyn FnOnce() + Send + 'static>;

type Batch = Vec<WorkItem>;

// Fresh batches reserve this much up front; a busy frame enqueues hundreds
// of items.
const BATCH_CAPACITY: usize = 128;

pub(crate) struct WorkQueue {
    pending: Mutex<Batch>,
    backlog: Mutex<Vec<Batch>>,
}

impl WorkQueue {
    pub(crate) fn new() -> WorkQueue {
        WorkQueue {
            pending: Mutex::new(Vec::with_capacity(BATCH_CAPACITY)),
            backlog: Mutex::new(Vec::new()),
        }
    }

    // Called by the producer.
    pub(crate) fn enqueue(&self, item: WorkItem) {
        self.lock_pending().push(item);
    }

    // Called by the producer. Publishes the pending batch to the backlog,
    // where the next drain will pick it up. Empty batches are not published.
    pub(crate) fn commit(&self) {
        let batch = {
            let mut pending = self.lock_pending();
            if pending.is_empty() {
                return;
            }
            mem::replace(&mut *pending, Vec::with_capacity(BATCH_CAPACITY))
        };
        self.lock_backlog().push(batch);
    }

    // Called by the consumer. Takes every committed batch, leaving the
    // backlog empty. The caller runs the items after the lock is released,
    // so items are free to re-enter table operations.
    pub(crate) fn drain(&self) -> Vec<Batch> {
        mem::take(&mut *self.lock_backlog())
    }

    // Drops all staged work, run and unrun alike. Called on context
    // destruction so queued closures holding context state don't keep it
    // alive forever.
    pub(crate) fn clear(&self) {
        self.lock_pending().clear();
        self.lock_backlog().clear();
    }

    fn lock_pending(&self) -> MutexGuard<Batch> {
        self.pending.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn lock_backlog(&self) -> MutexGuard<Vec<Batch>> {
        self.backlog.lock().unwrap_or_else(|err| err.into_inner())
    }
}
