#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! `protocol` implements the parameter exchange run over a freshly opened
//! framed channel before any block streaming begins, plus the
//! receiver-side on-disk file resolution it depends on.
//!
//! # Design
//!
//! Exchange steps are free functions taking `&mut transport::FramedChannel<S>`
//! rather than methods on a session type, so each step is independently
//! testable against an in-memory `tokio::io::duplex` pair without needing a
//! real TCP session or a file system.
//!
//! # Errors
//!
//! [`ExchangeError`] composes [`transport::TransportError`] via `#[from]` and
//! adds the negotiation-specific outcomes
//! (`InvalidPassword`, `RemoteCancelled`, `LocalCancelled`).

pub mod exchange;
pub mod metadata;
pub mod resolve;
pub mod traits;

pub use exchange::{receiver_exchange, sender_exchange};
pub use metadata::FileMetadata;
pub use resolve::{resolve_incoming_file, ResolvedFile};
pub use traits::{ConflictPrompt, ConflictResolution, Folder, UserPrompts};

use std::io;
use transport::TransportError;

/// Errors arising from parameter exchange and file resolution.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// Underlying channel fault; the channel is no longer usable.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// File-system fault while resolving the on-disk target file.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// A frame arrived with an unexpected message type at a given step.
    #[error("protocol error: {0}")]
    Protocol(&'static str),
    /// The receiver rejected the sender's password.
    #[error("invalid password")]
    InvalidPassword,
    /// The peer emitted `EndOfTransfer` at a non-terminal exchange step.
    #[error("remote cancelled the exchange")]
    RemoteCancelled,
    /// The local user aborted via a conflict prompt.
    #[error("local user cancelled the exchange")]
    LocalCancelled,
}
