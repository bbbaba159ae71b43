// glbridge/src/api.rs
//
//! The flat bridge surface platform shims call.
//!
//! Every function here takes raw integer IDs, flattens failure to the
//! 0/false sentinels the host runtime checks in script, and never panics on
//! stale IDs: the runtime passes IDs across asynchronous boundaries (a
//! reload, a torn-down view) long after the context may have gone away.
//! JNI and ObjC shims are expected to be one-line wrappers over these.
//!
//! Calls against IDs the registry no longer knows are dropped with a
//! `warn!` diagnostic. Destroys stay quiet: they are documented no-ops.
//!
//! Everything resolves against one process-wide [`Registry`]. Embedders
//! that want explicit ownership can skip this module and hold their own
//! [`Registry`] instead.

use lazy_static::lazy_static;
use log::warn;
use std::os::raw::c_void;

use crate::context::{Context, ContextID};
use crate::objects::{NativeHandle, ObjectID};
use crate::registry::Registry;

lazy_static! {
    // The one process-wide registry behind the flat surface.
    static ref REGISTRY: Registry = Registry::new();
}

fn with_context<T, F>(ctx: u32, fallback: T, f: F) -> T
where
    F: FnOnce(Context) -> T,
{
    let id = ContextID(ctx);
    match REGISTRY.get(id) {
        Some(context) => f(context),
        None => {
            warn!("dropped call against unknown context {:?}", id);
            fallback
        }
    }
}

/// Creates a context bound to the given JS engine handle and returns its
/// ID, or 0 if the handle is null or the ID space is exhausted.
pub fn context_create(engine: *mut c_void) -> u32 {
    match REGISTRY.create_context(engine) {
        Ok(id) => id.0,
        Err(_) => 0,
    }
}

/// Destroys the context `ctx`. Unknown IDs are a no-op. Safe to call while
/// the render thread is flushing `ctx`.
pub fn context_destroy(ctx: u32) {
    REGISTRY.destroy_context(ContextID(ctx));
}

/// Resolves `ctx` to the underlying [`Context`], for integrations that
/// wire the JS-facing GL methods straight to the work queue.
pub fn context_get(ctx: u32) -> Option<Context> {
    REGISTRY.get(ContextID(ctx))
}

/// Drains and runs the committed work of `ctx` on the calling thread,
/// which must be the render thread. Unknown IDs are a no-op.
pub fn context_flush(ctx: u32) {
    with_context(ctx, (), |context| context.flush());
}

/// Allocates an object ID in `ctx` with no native mapping yet. Returns 0
/// on failure.
pub fn context_create_object(ctx: u32) -> u32 {
    with_context(ctx, 0, |context| match context.create_object() {
        Ok(id) => id.0,
        Err(_) => 0,
    })
}

/// Drops the mapping of object `obj` in `ctx`. Unknown IDs are a no-op.
pub fn context_destroy_object(ctx: u32, obj: u32) {
    // Destroys of stale IDs are normal teardown traffic; no diagnostic.
    if let Some(context) = REGISTRY.get(ContextID(ctx)) {
        context.destroy_object(ObjectID(obj));
    }
}

/// Points object `obj` in `ctx` at the native object `native`, overwriting
/// any prior mapping. Unknown context IDs are a no-op.
pub fn context_map_object(ctx: u32, obj: u32, native: NativeHandle) {
    with_context(ctx, (), |context| {
        context.map_object(ObjectID(obj), native)
    });
}

/// Returns the native object `obj` maps to in `ctx`, or 0 if it has no
/// mapping, the object is unknown, or the context is unknown.
pub fn context_get_object(ctx: u32, obj: u32) -> NativeHandle {
    with_context(ctx, 0, |context| {
        context.get_object(ObjectID(obj)).unwrap_or(0)
    })
}

/// Installs the platform's redraw trigger on `ctx`, replacing any previous
/// one wholesale. Unknown IDs are a no-op.
pub fn context_set_flush_method<F>(ctx: u32, method: F)
where
    F: FnMut() + Send + 'static,
{
    with_context(ctx, (), |context| context.set_flush_method(method));
}

/// Returns whether `ctx` has rendering work waiting on a platform redraw.
/// No side effects. Unknown IDs return false.
pub fn context_needs_redraw(ctx: u32) -> bool {
    with_context(ctx, false, |context| context.needs_redraw())
}

/// Tells `ctx` the platform consumed its redraw request and finished the
/// draw. Unknown IDs are a no-op.
pub fn context_draw_ended(ctx: u32) {
    with_context(ctx, (), |context| context.draw_ended());
}

/// Marks the end of a JS-side frame on `ctx`: commits staged work and asks
/// the platform to flush. Unknown IDs are a no-op.
pub fn context_end_frame(ctx: u32) {
    with_context(ctx, (), |context| context.end_frame());
}

/// Installs the native framebuffer standing in for framebuffer 0 on `ctx`.
/// Unknown IDs are a no-op.
pub fn context_set_default_framebuffer(ctx: u32, framebuffer: NativeHandle) {
    with_context(ctx, (), |context| {
        context.set_default_framebuffer(framebuffer)
    });
}
