//! One-shot `tracing` initialisation shared by the CLI driver.
//!
//! Library crates never call this; they only emit spans and events. Calling
//! [`init`] more than once is harmless (the second call is a no-op) since
//! binaries that embed this workspace as a library may already have their
//! own subscriber installed.

use tracing_subscriber::EnvFilter;

/// Installs a `tracing-subscriber` fmt layer driven by `RUST_LOG`, defaulting
/// to `info` when the environment variable is unset.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
