#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! `transport` implements the two leaf components of the LAN transfer
//! protocol: the framed byte channel and the
//! resumable block file accessor with its metadata sidecar. Everything above this crate — parameter exchange, the
//! transfer engine, session and fleet orchestration — is built on top of
//! these two primitives and never touches raw sockets or raw file handles
//! directly.
//!
//! # Design
//!
//! [`FramedChannel`] is generic over any `AsyncRead + AsyncWrite + Unpin`
//! stream, so the same type drives a `TcpStream` in production and an
//! in-memory `tokio::io::duplex` pair in tests. It owns exactly one reusable
//! receive buffer; [`FramedChannel::receive`] borrows from it, which means
//! the borrow checker enforces a "valid only until the next
//! receive" invariant for free — callers that need to retain a payload
//! across further receives must copy it out.
//!
//! [`BlockAccessor`] and [`MetadataSidecar`] implement a crash
//! safety contract: a block is never considered durably written until the
//! sidecar counter has been flushed to disk, and the in-memory progress
//! counter only advances after that flush succeeds.
//!
//! # Errors
//!
//! All fallible operations return [`TransportError`]. Any I/O fault, short
//! read/write, or oversized frame header is fatal to the channel — the
//! channel must not be reused afterward, which
//! [`FramedChannel`] enforces by latching a `disposed` flag.

pub mod block_io;
pub mod channel;
pub mod frame;
pub mod sidecar;

pub use block_io::BlockAccessor;
pub use channel::FramedChannel;
pub use frame::{Frame, MessageType};
pub use sidecar::MetadataSidecar;

use std::io;

/// Errors produced by the framed channel and block I/O layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Underlying socket or file I/O fault; the channel is no longer usable.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A frame header declared an unexpected message type or a payload size
    /// that doesn't match what was actually read.
    #[error("protocol error: {0}")]
    Protocol(&'static str),

    /// A frame's declared payload size exceeded [`lanshare_core::constants::BLOCK_SIZE`].
    #[error("frame payload of {0} bytes exceeds the {1}-byte limit")]
    FrameTooLarge(u32, usize),

    /// Operation attempted on a channel that has already failed or been
    /// closed.
    #[error("channel is disposed")]
    Disposed,
}
