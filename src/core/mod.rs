//! Record indexing and identifier helpers shared by the backend and runtime.

/// Identifier generation.
pub mod ids;
/// Index key extraction.
pub mod indices;
