#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! `net` implements the three networking components that sit below the
//! protocol layer: the cooperative [`loop_harness`], LAN peer [`discovery`], and
//! the TCP [`acceptor`]/[`dialer`] pair.
//!
//! # Design
//!
//! Every long-running activity in this crate runs under a
//! [`loop_harness::LoopHarness`], which owns the single
//! `tokio::task::JoinHandle` and makes `run`/`stop`/`close` idempotent and
//! safe to call concurrently. Discovery and the acceptor are
//! both built on top of it rather than spawning their own bare tasks.

pub mod acceptor;
pub mod dialer;
pub mod discovery;
pub mod loop_harness;

pub use acceptor::Acceptor;
pub use dialer::dial;
pub use discovery::{DiscoveryHandler, PeerSet};
pub use loop_harness::LoopHarness;

use std::io;

/// Errors produced by discovery and connection setup.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Underlying socket I/O fault.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Operation attempted on a harness that has already been closed.
    #[error("operation attempted on a disposed component")]
    Disposed,
}
