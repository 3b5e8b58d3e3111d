//! Single-owner async store runtime and event stream APIs.

/// Event stream types emitted by the store worker.
pub mod events;
/// Store handle, configuration and worker loop.
pub mod handle;
