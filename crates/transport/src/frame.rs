//! Wire-level message type and frame header.

use crate::TransportError;

/// One byte on the wire identifying the kind of frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum MessageType {
    /// Carries password, file metadata, or a resume point, depending on the
    /// exchange step.
    Metadata = 0,
    /// Carries up to `BLOCK_SIZE` bytes of file content.
    Data = 1,
    /// Empty-payload signal marking the end of a transfer, or a rejection
    /// during parameter exchange.
    EndOfTransfer = 2,
}

impl MessageType {
    /// Decodes a wire byte, rejecting anything outside `{0, 1, 2}`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Protocol`] for any byte other than 0, 1, or
    /// 2.
    pub fn from_wire(byte: u8) -> Result<Self, TransportError> {
        match byte {
            0 => Ok(Self::Metadata),
            1 => Ok(Self::Data),
            2 => Ok(Self::EndOfTransfer),
            _ => Err(TransportError::Protocol("unknown message type byte")),
        }
    }

    /// Encodes this type as its wire byte.
    #[must_use]
    pub const fn to_wire(self) -> u8 {
        self as u8
    }
}

/// Header size in bytes: one type byte plus a 4-byte little-endian length.
pub const HEADER_LEN: usize = 5;

/// A decoded frame: a message type paired with a borrowed view over its
/// payload inside the channel's reusable receive buffer.
#[derive(Debug)]
pub struct Frame<'a> {
    /// The frame's message type.
    pub message_type: MessageType,
    /// The frame's payload, valid only until the next `receive` call on the
    /// channel that produced it.
    pub payload: &'a [u8],
}
