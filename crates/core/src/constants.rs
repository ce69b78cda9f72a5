//! Protocol constants fixed by the wire format.
//!
//! These are not configurable at runtime: changing any of them breaks
//! interoperability with a peer running an unmodified build.

use std::time::Duration;

/// Size in bytes of a file-transfer block. A block shorter than this is the
/// signal for end-of-file when sending.
pub const BLOCK_SIZE: usize = 65_536;

/// Send/receive socket buffer size applied to every accepted or dialed TCP
/// stream.
pub const SOCKET_BUFFER: usize = 131_072;

/// Interval between discovery broadcasts on each interface.
pub const BROADCAST_INTERVAL: Duration = Duration::from_secs(2);

/// TCP control/session port.
pub const PORT: u16 = 52_123;

/// UDP discovery broadcast port.
pub const BROADCAST_PORT: u16 = 52_913;

/// Name of the subdirectory under the receiver's root that holds in-progress
/// transfer sidecars.
pub const METADATA_DIR: &str = ".transfers_in_progress";

/// Length in bytes of the sidecar's leading block-counter field.
pub const SIDECAR_COUNTER_LEN: usize = 4;
