//! Transfer engine: transmitter and receiver loops.

use crate::TransferError;
use lanshare_core::constants::BLOCK_SIZE;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use transport::{BlockAccessor, FramedChannel, MessageType};

/// How a transmitter or receiver loop stopped.
///
/// `Paused` is clean and resumable: the caller may invoke the loop function
/// again against the same [`BlockAccessor`] and pick up where it left off,
/// since progress lives in the accessor (and its sidecar) rather than in the
/// loop's own state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransferOutcome {
    /// The transfer reached `EndOfTransfer` normally.
    Completed,
    /// `pause` was observed at the top of a loop iteration.
    Paused,
}

/// Streams `file`'s remaining blocks over `channel` until exhaustion,
/// observing `pause` at the top of each iteration and `cancel` around every
/// await.
///
/// Sends a final `EndOfTransfer` frame after the last `Data` frame,
/// regardless of whether that last frame was short or exactly one block —
/// this ordering is contractual.
///
/// # Errors
///
/// Returns [`TransferError::Cancelled`] if `cancel` fires, or whatever
/// transport/I/O fault interrupts the send or the read.
pub async fn run_transmitter<S>(
    channel: &mut FramedChannel<S>,
    file: &mut BlockAccessor,
    pause: &CancellationToken,
    cancel: &CancellationToken,
) -> Result<TransferOutcome, TransferError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        if pause.is_cancelled() {
            return Ok(TransferOutcome::Paused);
        }

        let block = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(TransferError::Cancelled),
            result = file.read_next_block() => result?,
        };
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }

        let len = block.len();
        if len == 0 {
            send_checked(channel, MessageType::EndOfTransfer, &[], cancel).await?;
            trace!("transmitter reached end of file on a block boundary");
            return Ok(TransferOutcome::Completed);
        }

        // `block` borrows from the accessor's reusable buffer; copy it out
        // before the next `&mut` use of `file` so the borrow checker doesn't
        // need to reason about the channel send in between.
        let payload = block.to_vec();
        send_checked(channel, MessageType::Data, &payload, cancel).await?;

        if len < BLOCK_SIZE {
            send_checked(channel, MessageType::EndOfTransfer, &[], cancel).await?;
            trace!(len, "transmitter sent a short final block");
            return Ok(TransferOutcome::Completed);
        }
    }
}

async fn send_checked<S>(
    channel: &mut FramedChannel<S>,
    message_type: MessageType,
    payload: &[u8],
    cancel: &CancellationToken,
) -> Result<(), TransferError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(TransferError::Cancelled),
        result = channel.send(message_type, payload) => Ok(result?),
    }
}

/// Receives blocks over `channel` into `file` until `EndOfTransfer`,
/// observing `pause` and `cancel` the same way [`run_transmitter`] does.
///
/// # Errors
///
/// Returns [`TransferError::Protocol`] if a `Metadata` frame (or any frame
/// other than `Data`/`EndOfTransfer`) arrives mid-stream,
/// [`TransferError::Cancelled`] if `cancel` fires, or whatever
/// transport/I/O fault interrupts the receive or the write.
pub async fn run_receiver<S>(
    channel: &mut FramedChannel<S>,
    file: &mut BlockAccessor,
    pause: &CancellationToken,
    cancel: &CancellationToken,
) -> Result<TransferOutcome, TransferError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        if pause.is_cancelled() {
            return Ok(TransferOutcome::Paused);
        }

        enum Step {
            Write(Vec<u8>),
            Done,
        }

        let step = {
            let frame = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(TransferError::Cancelled),
                frame = channel.receive() => frame?,
            };
            match frame.message_type {
                MessageType::Data => Step::Write(frame.payload.to_vec()),
                MessageType::EndOfTransfer => Step::Done,
                MessageType::Metadata => {
                    return Err(TransferError::Protocol(
                        "unexpected Metadata frame during streaming",
                    ))
                }
            }
        };
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }

        match step {
            Step::Write(payload) => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(TransferError::Cancelled),
                    result = file.write_next_block(&payload) => result?,
                }
            }
            Step::Done => {
                debug!(
                    last_processed_block = file.last_processed_block(),
                    "receiver reached end of transfer"
                );
                return Ok(TransferOutcome::Completed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::fs::OpenOptions;
    use tokio::io::duplex;

    async fn rw_file(path: &std::path::Path) -> tokio::fs::File {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn exact_multiple_of_block_size_ends_with_empty_end_of_transfer() {
        let dir = tempdir().unwrap();
        let src_path = dir.path().join("src.bin");
        let dst_path = dir.path().join("dst.bin");
        let data = vec![9u8; BLOCK_SIZE * 2];
        tokio::fs::write(&src_path, &data).await.unwrap();

        let (client, server) = duplex(1 << 20);
        let mut tx_channel = FramedChannel::new(client);
        let mut rx_channel = FramedChannel::new(server);

        let mut tx_file = BlockAccessor::new(rw_file(&src_path).await, data.len() as i64);
        let mut rx_file = BlockAccessor::new(rw_file(&dst_path).await, data.len() as i64);

        let pause = CancellationToken::new();
        let cancel = CancellationToken::new();

        let (tx_outcome, rx_outcome) = tokio::join!(
            run_transmitter(&mut tx_channel, &mut tx_file, &pause, &cancel),
            run_receiver(&mut rx_channel, &mut rx_file, &pause, &cancel),
        );

        assert_eq!(tx_outcome.unwrap(), TransferOutcome::Completed);
        assert_eq!(rx_outcome.unwrap(), TransferOutcome::Completed);
        assert_eq!(rx_file.last_processed_block(), 2);
        assert_eq!(tokio::fs::read(&dst_path).await.unwrap(), data);
    }

    #[tokio::test]
    async fn short_final_block_ends_the_transfer() {
        let dir = tempdir().unwrap();
        let src_path = dir.path().join("src.bin");
        let dst_path = dir.path().join("dst.bin");
        let data = vec![3u8; BLOCK_SIZE + 1_234];
        tokio::fs::write(&src_path, &data).await.unwrap();

        let (client, server) = duplex(1 << 20);
        let mut tx_channel = FramedChannel::new(client);
        let mut rx_channel = FramedChannel::new(server);

        let mut tx_file = BlockAccessor::new(rw_file(&src_path).await, data.len() as i64);
        let mut rx_file = BlockAccessor::new(rw_file(&dst_path).await, data.len() as i64);

        let pause = CancellationToken::new();
        let cancel = CancellationToken::new();

        let (tx_outcome, rx_outcome) = tokio::join!(
            run_transmitter(&mut tx_channel, &mut tx_file, &pause, &cancel),
            run_receiver(&mut rx_channel, &mut rx_file, &pause, &cancel),
        );

        assert_eq!(tx_outcome.unwrap(), TransferOutcome::Completed);
        assert_eq!(rx_outcome.unwrap(), TransferOutcome::Completed);
        assert_eq!(tokio::fs::read(&dst_path).await.unwrap(), data);
    }

    #[tokio::test]
    async fn zero_byte_file_sends_a_bare_end_of_transfer() {
        let dir = tempdir().unwrap();
        let src_path = dir.path().join("empty.bin");
        let dst_path = dir.path().join("dst.bin");
        tokio::fs::write(&src_path, b"").await.unwrap();

        let (client, server) = duplex(1 << 16);
        let mut tx_channel = FramedChannel::new(client);
        let mut rx_channel = FramedChannel::new(server);

        let mut tx_file = BlockAccessor::new(rw_file(&src_path).await, 0);
        let mut rx_file = BlockAccessor::new(rw_file(&dst_path).await, 0);

        let pause = CancellationToken::new();
        let cancel = CancellationToken::new();

        let (tx_outcome, rx_outcome) = tokio::join!(
            run_transmitter(&mut tx_channel, &mut tx_file, &pause, &cancel),
            run_receiver(&mut rx_channel, &mut rx_file, &pause, &cancel),
        );

        assert_eq!(tx_outcome.unwrap(), TransferOutcome::Completed);
        assert_eq!(rx_outcome.unwrap(), TransferOutcome::Completed);
        assert_eq!(rx_file.last_processed_block(), 0);
        assert_eq!(tokio::fs::read(&dst_path).await.unwrap(), b"");
    }

    #[tokio::test]
    async fn pausing_the_transmitter_stops_cleanly_and_resumes() {
        let dir = tempdir().unwrap();
        let src_path = dir.path().join("src.bin");
        let dst_path = dir.path().join("dst.bin");
        let data = vec![5u8; BLOCK_SIZE * 3];
        tokio::fs::write(&src_path, &data).await.unwrap();

        let (client, server) = duplex(1 << 20);
        let mut tx_channel = FramedChannel::new(client);
        let mut rx_channel = FramedChannel::new(server);
        let mut tx_file = BlockAccessor::new(rw_file(&src_path).await, data.len() as i64);
        let mut rx_file = BlockAccessor::new(rw_file(&dst_path).await, data.len() as i64);

        let pause = CancellationToken::new();
        let cancel = CancellationToken::new();
        pause.cancel();

        let outcome = run_transmitter(&mut tx_channel, &mut tx_file, &pause, &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, TransferOutcome::Paused);
        assert_eq!(tx_file.last_processed_block(), 0);

        let fresh_pause = CancellationToken::new();
        let (tx_outcome, rx_outcome) = tokio::join!(
            run_transmitter(&mut tx_channel, &mut tx_file, &fresh_pause, &cancel),
            run_receiver(&mut rx_channel, &mut rx_file, &fresh_pause, &cancel),
        );
        assert_eq!(tx_outcome.unwrap(), TransferOutcome::Completed);
        assert_eq!(rx_outcome.unwrap(), TransferOutcome::Completed);
        assert_eq!(tokio::fs::read(&dst_path).await.unwrap(), data);
    }

    #[tokio::test]
    async fn cancelling_mid_stream_is_fatal() {
        let dir = tempdir().unwrap();
        let dst_path = dir.path().join("dst.bin");
        let (client, server) = duplex(1 << 16);
        let mut rx_channel = FramedChannel::new(server);
        let mut rx_file = BlockAccessor::new(rw_file(&dst_path).await, BLOCK_SIZE as i64);

        let pause = CancellationToken::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        drop(client);

        let err = run_receiver(&mut rx_channel, &mut rx_file, &pause, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Cancelled));
    }

    #[tokio::test]
    async fn metadata_frame_mid_stream_is_a_protocol_error() {
        let dir = tempdir().unwrap();
        let dst_path = dir.path().join("dst.bin");
        let (mut client, server) = duplex(1 << 16);
        let mut rx_channel = FramedChannel::new(server);
        let mut rx_file = BlockAccessor::new(rw_file(&dst_path).await, BLOCK_SIZE as i64);

        let mut tx_channel = FramedChannel::new(&mut client);
        tx_channel
            .send(MessageType::Metadata, b"unexpected")
            .await
            .unwrap();

        let pause = CancellationToken::new();
        let cancel = CancellationToken::new();
        let err = run_receiver(&mut rx_channel, &mut rx_file, &pause, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Protocol(_)));
    }
}
