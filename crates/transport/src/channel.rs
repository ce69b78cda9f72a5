//! Framed byte channel.

use crate::frame::{Frame, HEADER_LEN, MessageType};
use crate::TransportError;
use lanshare_core::constants::BLOCK_SIZE;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{trace, warn};

/// Wraps a reliable ordered byte stream and exchanges length-prefixed typed
/// messages over it.
///
/// Never correlates sends and receives: a [`FramedChannel`] is strictly
/// request/response-agnostic, and matching ordering is the caller's job.
/// The caller also guarantees there is at most one
/// outstanding `send` and at most one outstanding `receive` at a time — the
/// channel does not serialise internally.
pub struct FramedChannel<S> {
    stream: S,
    recv_buf: Vec<u8>,
    last_message_type: MessageType,
    disposed: bool,
}

impl<S> FramedChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps `stream` in a fresh framed channel.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            recv_buf: vec![0u8; BLOCK_SIZE],
            last_message_type: MessageType::Metadata,
            disposed: false,
        }
    }

    /// Sends one frame: a 5-byte header followed by `payload`.
    ///
    /// Both writes loop internally until fully sent (via
    /// [`AsyncWriteExt::write_all`]); the underlying stream reporting zero
    /// bytes written is surfaced as a fatal "remote closed" I/O error and
    /// disposes the channel.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Disposed`] if the channel already failed or
    /// was closed, otherwise [`TransportError::Io`] on any write failure.
    pub async fn send(
        &mut self,
        message_type: MessageType,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        if self.disposed {
            return Err(TransportError::Disposed);
        }

        let result = self.send_inner(message_type, payload).await;
        match &result {
            Ok(()) => trace!(?message_type, len = payload.len(), "sent frame"),
            Err(err) => {
                warn!(?message_type, error = %err, "send failed, disposing channel");
                self.disposed = true;
            }
        }
        result
    }

    async fn send_inner(
        &mut self,
        message_type: MessageType,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let mut header = [0u8; HEADER_LEN];
        header[0] = message_type.to_wire();
        header[1..5].copy_from_slice(&(payload.len() as u32).to_le_bytes());

        self.stream.write_all(&header).await?;
        if !payload.is_empty() {
            self.stream.write_all(payload).await?;
        }
        self.stream.flush().await?;
        Ok(())
    }

    /// Receives one frame, reading exactly 5 header bytes and then exactly
    /// `size` payload bytes into the channel's reusable buffer.
    ///
    /// The returned [`Frame`] borrows from that buffer and is only valid
    /// until the next call to `receive` on this channel.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Disposed`] if the channel already failed or
    /// was closed. Returns [`TransportError::FrameTooLarge`] without
    /// attempting to read the payload if the declared size exceeds
    /// `BLOCK_SIZE`. Returns [`TransportError::Protocol`] for an unknown
    /// message type byte. Otherwise returns [`TransportError::Io`] on any
    /// short read.
    pub async fn receive(&mut self) -> Result<Frame<'_>, TransportError> {
        if self.disposed {
            return Err(TransportError::Disposed);
        }

        match self.receive_inner().await {
            Ok(size) => {
                trace!(message_type = ?self.last_message_type, len = size, "received frame");
                Ok(Frame {
                    message_type: self.last_message_type,
                    payload: &self.recv_buf[..size],
                })
            }
            Err(err) => {
                warn!(error = %err, "receive failed, disposing channel");
                self.disposed = true;
                Err(err)
            }
        }
    }

    async fn receive_inner(&mut self) -> Result<usize, TransportError> {
        let mut header = [0u8; HEADER_LEN];
        self.stream.read_exact(&mut header).await?;

        let message_type = MessageType::from_wire(header[0])?;
        let size = u32::from_le_bytes([header[1], header[2], header[3], header[4]]);

        if size as usize > BLOCK_SIZE {
            return Err(TransportError::FrameTooLarge(size, BLOCK_SIZE));
        }

        let size = size as usize;
        self.stream.read_exact(&mut self.recv_buf[..size]).await?;
        self.last_message_type = message_type;
        Ok(size)
    }

    /// Marks the channel as disposed; further `send`/`receive` calls fail
    /// with [`TransportError::Disposed`].
    pub fn close(&mut self) {
        self.disposed = true;
    }

    /// Returns the underlying stream, consuming the channel.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn round_trips_every_payload_length() {
        let (client, server) = duplex(1 << 20);
        let mut client = FramedChannel::new(client);
        let mut server = FramedChannel::new(server);

        for len in [0usize, 1, 17, BLOCK_SIZE / 2, BLOCK_SIZE] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            client.send(MessageType::Data, &payload).await.unwrap();
            let frame = server.receive().await.unwrap();
            assert_eq!(frame.message_type, MessageType::Data);
            assert_eq!(frame.payload, payload.as_slice());
        }
    }

    #[tokio::test]
    async fn rejects_oversized_frame_without_reading_payload() {
        let (mut client, server) = duplex(1 << 20);
        let mut server = FramedChannel::new(server);

        let mut header = [0u8; HEADER_LEN];
        header[0] = MessageType::Data.to_wire();
        header[1..5].copy_from_slice(&((BLOCK_SIZE as u32) + 1).to_le_bytes());
        client.write_all(&header).await.unwrap();

        let err = server.receive().await.unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge(_, _)));
    }

    #[tokio::test]
    async fn disposed_channel_rejects_further_use() {
        let (client, _server) = duplex(16);
        let mut client = FramedChannel::new(client);
        client.close();

        let err = client.send(MessageType::Metadata, b"x").await.unwrap_err();
        assert!(matches!(err, TransportError::Disposed));
    }

    #[tokio::test]
    async fn short_read_disposes_the_channel() {
        let (client, server) = duplex(16);
        let mut server = FramedChannel::new(server);
        drop(client);

        let err = server.receive().await.unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));

        let err = server.receive().await.unwrap_err();
        assert!(matches!(err, TransportError::Disposed));
    }
}
