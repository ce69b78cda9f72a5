#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! `lanshare_core` holds the pieces every other crate in this workspace needs
//! but none of them owns: the protocol's compile-time constants, the shared
//! error taxonomy, and a one-shot `tracing` setup helper used by the CLI
//! driver.
//!
//! The package is deliberately not named `core`: combining a path-dependency
//! literally named `core` with `thiserror`'s derive macro in the same
//! downstream crate shadows libcore and breaks the macro's generated
//! `core::fmt`/`core::write!` references.
//!
//! # Design
//!
//! Constants live in [`constants`] as plain `const` items rather than a
//! runtime-configurable struct — the wire protocol fixes these values, so
//! there is no lifecycle to manage for them. [`error`] defines the error
//! kinds shared across the workspace; individual crates still define their
//! own `thiserror` enums scoped to their layer and convert into or wrap
//! these kinds rather than reusing one giant enum.
//!
//! # Errors
//!
//! [`CoreError`] is the fallback error type for code that does not belong to
//! a more specific crate (e.g. the CLI driver's top-level `main`).

pub mod constants;
pub mod error;
pub mod logging;

pub use error::CoreError;
