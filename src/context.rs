//! Virtual GL contexts.
//!
//! A context is the bridge between one JS engine instance and one real,
//! thread-affine GL context owned by the platform's view layer. Script-side
//! code runs on the *JS thread*: it allocates and maps object IDs, stages
//! deferred GL work, and marks frame boundaries. The platform's *render
//! thread* owns the drawable surface and the real GL context, and is the
//! only thread allowed to call [`Context::flush`].
//!
//! Contexts are reference-counted: the registry holds one reference and
//! hands out clones. Destroying a context unregisters it, but a flush
//! already in flight on the render thread keeps the state alive until it
//! returns.

use log::debug;
use std::os::raw::c_void;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use crate::error::Error;
use crate::objects::{NativeHandle, ObjectID, ObjectTable};
use crate::queue::WorkQueue;

/// The ID of a context.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ContextID(pub u32);

/// The redraw trigger installed by the platform.
///
/// Invoking it asks the view owning the drawable to schedule a redraw,
/// which eventually calls back into [`Context::flush`] on the render
/// thread. It may be invoked from either thread, so it must only schedule;
/// it must never perform GL work itself. The slot it lives in stays locked
/// while it runs, so it must hand the request off and return without
/// calling back into the same context.
pub type FlushMethod = Box<dyn FnMut() + Send + 'static>;

// Per-context state. The JS thread and the render thread touch this
// concurrently, so every field synchronizes itself.
struct ContextData {
    id: ContextID,
    // The JS engine instance this context is bound to, kept as an opaque
    // address. Never dereferenced; the context must not outlive the engine.
    engine: usize,
    objects: ObjectTable,
    queue: WorkQueue,
    // Shared with queued work, which sets it on the render thread.
    needs_redraw: Arc<AtomicBool>,
    default_framebuffer: AtomicU32,
    flush_method: Mutex<Option<FlushMethod>>,
    // The render thread, pinned by the first flush.
    render_thread: Mutex<Option<ThreadId>>,
}

/// A virtual GL context bound to one JS engine instance.
///
/// Cheap to clone; clones share the same state. Lifecycle is owned by the
/// [`crate::Registry`] that created it.
#[derive(Clone)]
pub struct Context(Arc<ContextData>);

impl Context {
    pub(crate) fn new(id: ContextID, engine: *mut c_void) -> Context {
        Context(Arc::new(ContextData {
            id,
            engine: engine as usize,
            objects: ObjectTable::new(),
            queue: WorkQueue::new(),
            needs_redraw: Arc::new(AtomicBool::new(false)),
            default_framebuffer: AtomicU32::new(0),
            flush_method: Mutex::new(None),
            render_thread: Mutex::new(None),
        }))
    }

    /// Returns the ID of this context.
    pub fn id(&self) -> ContextID {
        self.0.id
    }

    /// Returns the opaque JS engine handle this context was bound to.
    pub fn engine_handle(&self) -> *mut c_void {
        self.0.engine as *mut c_void
    }

    /// Allocates a fresh object ID with no native mapping yet.
    ///
    /// IDs are unique within this context and never reused while it lives.
    pub fn create_object(&self) -> Result<ObjectID, Error> {
        self.0.objects.create()
    }

    /// Allocates an object ID immediately and maps it at the next flush to
    /// whatever `init` returns on the render thread.
    ///
    /// This is how script-visible creation calls (`createTexture` and
    /// friends) hand an ID back synchronously while the driver object is
    /// generated later: [`Context::get_object`] reports no mapping until
    /// the queued work has run.
    pub fn create_object_with<F>(&self, init: F) -> Result<ObjectID, Error>
    where
        F: FnOnce() -> NativeHandle + Send + 'static,
    {
        let id = self.0.objects.create()?;
        let table = self.0.objects.clone();
        self.enqueue(move || table.map(id, init()));
        Ok(id)
    }

    /// Removes `id`'s mapping, if any. Unknown IDs are a no-op.
    ///
    /// The ID never resolves again: stale uses observe "no object" rather
    /// than whatever the driver name gets recycled into.
    pub fn destroy_object(&self, id: ObjectID) {
        self.0.objects.destroy(id);
    }

    /// Points `id` at the native object `native`, overwriting any prior
    /// mapping. `native` is not validated against the driver; misuse shows
    /// up when the driver rejects the name.
    pub fn map_object(&self, id: ObjectID, native: NativeHandle) {
        self.0.objects.map(id, native);
    }

    /// Returns the native object `id` currently maps to, if any.
    pub fn get_object(&self, id: ObjectID) -> Option<NativeHandle> {
        self.0.objects.get(id)
    }

    /// Defers `work` until a later flush.
    ///
    /// Work stays invisible to the render thread until [`Context::commit`]
    /// publishes the batch it belongs to.
    pub fn enqueue<F>(&self, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.0.queue.enqueue(Box::new(work));
    }

    /// Publishes the pending batch of deferred work to the render thread.
    pub fn commit(&self) {
        self.0.queue.commit();
    }

    /// Runs `work` on the render thread and returns its result, blocking
    /// the calling thread until then.
    ///
    /// The pending batch is committed first, so everything enqueued before
    /// this call runs before `work` does. Used for the handful of calls
    /// that are synchronous in the GL API itself (getters, `finish`).
    /// Requires a live render thread servicing flush requests; panics if
    /// the context is torn down before `work` could run.
    pub fn call_blocking<F, R>(&self, work: F) -> R
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        self.enqueue(move || {
            let _ = sender.send(work());
        });
        self.commit();
        self.request_flush();
        receiver
            .recv()
            .expect("context torn down before blocking work could run")
    }

    /// Drains every committed batch and runs its work in FIFO order on the
    /// calling thread.
    ///
    /// This must be the render thread: the work run here touches the real,
    /// thread-affine GL context, which the platform has made current on
    /// that thread. The first call pins the thread; debug builds assert
    /// that every later flush happens on the same one. Returns once the
    /// work committed at call time has run; it never waits for more.
    pub fn flush(&self) {
        self.check_render_thread();
        for batch in self.0.queue.drain() {
            for work in batch {
                work();
            }
        }
    }

    fn check_render_thread(&self) {
        let current = thread::current().id();
        let mut owner = self
            .0
            .render_thread
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        match *owner {
            None => *owner = Some(current),
            Some(owner_id) => debug_assert_eq!(
                owner_id, current,
                "flush must stay on the render thread that first flushed this context"
            ),
        }
    }

    /// Installs the platform's redraw trigger, replacing any previous one
    /// wholesale.
    ///
    /// See [`FlushMethod`] for what the trigger may and may not do; in
    /// particular it must not call back into this context synchronously.
    pub fn set_flush_method<F>(&self, method: F)
    where
        F: FnMut() + Send + 'static,
    {
        debug!("context {:?}: flush method installed", self.0.id);
        *self.lock_flush_method() = Some(Box::new(method));
    }

    /// Asks the platform to schedule a redraw by invoking the installed
    /// flush method. Does nothing if none is installed.
    pub fn request_flush(&self) {
        if let Some(ref mut method) = *self.lock_flush_method() {
            method();
        }
    }

    /// Marks the end of a JS-side frame: queues the needs-redraw mark,
    /// publishes the batch, and asks the platform to flush.
    ///
    /// The flag is set by the queued work itself, so it becomes observable
    /// once the render thread has flushed, at which point the frame's
    /// rendering work has actually been issued to the driver.
    pub fn end_frame(&self) {
        let needs_redraw = self.0.needs_redraw.clone();
        self.enqueue(move || needs_redraw.store(true, Ordering::Release));
        self.commit();
        self.request_flush();
    }

    /// Returns whether rendering work is waiting on a platform redraw.
    pub fn needs_redraw(&self) -> bool {
        self.0.needs_redraw.load(Ordering::Acquire)
    }

    /// Tells the context the platform consumed its redraw request and
    /// finished the draw. The platform calls this exactly once per draw
    /// cycle.
    pub fn draw_ended(&self) {
        self.0.needs_redraw.store(false, Ordering::Release);
    }

    /// Installs the native framebuffer that stands in for framebuffer 0.
    ///
    /// On platforms whose drawable is not framebuffer 0 (iOS), the platform
    /// view supplies its renderbuffer-backed framebuffer here and queued
    /// work binds it wherever script asked for the default.
    pub fn set_default_framebuffer(&self, framebuffer: NativeHandle) {
        self.0.default_framebuffer.store(framebuffer, Ordering::Release);
    }

    /// Returns the native framebuffer standing in for framebuffer 0, or 0
    /// if the platform never supplied one.
    pub fn default_framebuffer(&self) -> NativeHandle {
        self.0.default_framebuffer.load(Ordering::Acquire)
    }

    // Drops staged work and the flush method. Queued closures and the
    // platform callback may hold clones of this context; dropping them here
    // keeps an unregistered context from living forever.
    pub(crate) fn teardown(&self) {
        self.0.queue.clear();
        *self.lock_flush_method() = None;
    }

    fn lock_flush_method(&self) -> MutexGuard<Option<FlushMethod>> {
        self.0
            .flush_method
            .lock()
            .unwrap_or_else(|err| err.into_inner())
    }
}
