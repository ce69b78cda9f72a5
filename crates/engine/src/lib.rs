#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! `engine` drives a single transfer's streaming phase (`transfer`), wires
//! one negotiated stream's parameter exchange and streaming together as a
//! managed transfer under a [`session::Session`]'s per-transfer bookkeeping,
//! and owns the full set of sessions plus the acceptor and discovery loops
//! under a [`fleet::Fleet`].
//!
//! # Design
//!
//! Every long-running task is spawned by the layer that owns its
//! lifecycle: the transfer engine's transmitter/receiver loops run inside
//! tasks started by [`session::Session`], never by `transfer` itself. A
//! transfer removes itself from its owning session's transfer set on
//! termination via a plain closure captured at spawn time.
//!
//! # Errors
//!
//! [`TransferError`] composes [`transport::TransportError`] and
//! [`protocol::ExchangeError`] via `#[from]`, adding the streaming-phase
//! outcomes.

pub mod fleet;
pub mod session;
pub mod transfer;

pub use fleet::Fleet;
pub use session::{Direction, Session};
pub use transfer::{run_receiver, run_transmitter, TransferOutcome};

use std::io;

/// Errors produced while streaming a transfer or orchestrating sessions.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Underlying framed-channel fault.
    #[error("transport error: {0}")]
    Transport(#[from] transport::TransportError),
    /// Parameter exchange failed.
    #[error("exchange error: {0}")]
    Exchange(#[from] protocol::ExchangeError),
    /// Underlying socket fault while dialing or accepting.
    #[error("net error: {0}")]
    Net(#[from] net::NetError),
    /// File-system fault opening or sizing the transferred file.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// A frame of the wrong type arrived during block streaming.
    #[error("protocol error: {0}")]
    Protocol(&'static str),
    /// The transfer's cancel token fired; fatal, tears down the channel and
    /// file accessor.
    #[error("transfer cancelled")]
    Cancelled,
    /// The declared file handle could not be sized or opened.
    #[error("file unavailable: {0}")]
    FileUnavailable(String),
}
