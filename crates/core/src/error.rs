//! Shared error taxonomy.
//!
//! Upper layers generally define their own `thiserror` enum scoped to their
//! component and convert leaf I/O errors into it directly; [`CoreError`]
//! exists for call sites that don't belong to one specific layer, such as the
//! CLI driver's `main`.

use std::io;

/// Errors that don't belong to a single protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Underlying socket or file I/O fault; not recoverable locally.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Operation attempted on a component that has already been closed.
    #[error("operation attempted on a disposed component")]
    Disposed,
}
