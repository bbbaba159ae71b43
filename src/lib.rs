//! A low-level bridge exposing a virtual GL context to a JS engine.
//!
//! Script never holds driver state directly. It holds small integer IDs: a
//! [`ContextID`] naming one live [`Context`], and [`ObjectID`]s naming
//! logical GL resources inside it, which the context's object table resolves
//! to real driver names. GL work is not run where it is requested either:
//! the JS thread stages closures on a per-context work queue, and the
//! platform's render thread (the only thread the driver's context is
//! current on) drains them in FIFO order at flush points.
//!
//! The [`api`] module is the flat, sentinel-returning surface a JNI or ObjC
//! shim calls, backed by one process-wide [`Registry`]. Embedders in Rust
//! can instead own a [`Registry`] directly and get typed errors.

pub mod api;
pub use crate::api::{
    context_create, context_create_object, context_destroy, context_destroy_object,
    context_draw_ended, context_end_frame, context_flush, context_get, context_get_object,
    context_map_object, context_needs_redraw, context_set_default_framebuffer,
    context_set_flush_method,
};

pub mod error;
pub use crate::error::Error;

mod context;
pub use crate::context::{Context, ContextID, FlushMethod};

mod objects;
pub use crate::objects::{NativeHandle, ObjectID};

mod queue;

mod registry;
pub use crate::registry::Registry;

#[cfg(test)]
mod tests;
