// glbridge/src/error.rs
//
//! Various errors that bridge operations can produce.

/// Various errors that bridge operations can produce.
///
/// The flat bridge surface in [`crate::api`] never exposes these: there they
/// are flattened to the 0/false sentinels the host runtime checks in script.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Error {
    /// The JS engine handle supplied at context creation was null.
    NullEngineHandle,
    /// The context ID doesn't name a live context.
    ///
    /// Stale IDs are expected in normal operation: the host runtime passes
    /// them across asynchronous boundaries (for instance after a reload) and
    /// checks for failure on the script side.
    NoSuchContext,
    /// The process-wide context ID space is used up.
    ContextIdsExhausted,
    /// The per-context object ID space is used up.
    ObjectIdsExhausted,
}
