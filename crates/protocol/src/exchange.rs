//! Parameter exchange: password gate, metadata exchange, resume-point
//! exchange, run over a framed channel with no correlation id — both sides
//! rely on a strict, fixed message order instead.

use crate::resolve::{resolve_incoming_file, ResolvedFile};
use crate::traits::{ConflictPrompt, Folder};
use crate::{ExchangeError, FileMetadata};
use checksums::ContentHash;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;
use transport::{FramedChannel, MessageType};

/// Runs the sender's half of parameter exchange.
///
/// Sends `password`, awaits the verdict, sends `metadata`'s three fields,
/// then awaits and returns the receiver's resume point.
///
/// # Errors
///
/// Returns [`ExchangeError::InvalidPassword`] if the receiver rejects the
/// password, [`ExchangeError::RemoteCancelled`] if the receiver cancels at
/// either await, [`ExchangeError::Protocol`] on any out-of-sequence frame,
/// or [`ExchangeError::Transport`] on any channel fault.
pub async fn sender_exchange<S>(
    channel: &mut FramedChannel<S>,
    password: &str,
    metadata: &FileMetadata,
) -> Result<i32, ExchangeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    channel
        .send(MessageType::Metadata, password.as_bytes())
        .await?;

    let verdict_type = channel.receive().await?.message_type;
    match verdict_type {
        MessageType::EndOfTransfer => return Err(ExchangeError::InvalidPassword),
        MessageType::Metadata => {}
        MessageType::Data => return Err(ExchangeError::Protocol("unexpected Data as password verdict")),
    }

    channel
        .send(MessageType::Metadata, metadata.name.as_bytes())
        .await?;
    channel
        .send(MessageType::Metadata, metadata.hash.as_bytes())
        .await?;
    channel
        .send(MessageType::Metadata, &metadata.size.to_le_bytes())
        .await?;

    let resume_point = {
        let frame = channel.receive().await?;
        match frame.message_type {
            MessageType::EndOfTransfer => return Err(ExchangeError::RemoteCancelled),
            MessageType::Metadata => {
                if frame.payload.len() != 4 {
                    return Err(ExchangeError::Protocol("resume point frame was not 4 bytes"));
                }
                i32::from_le_bytes([
                    frame.payload[0],
                    frame.payload[1],
                    frame.payload[2],
                    frame.payload[3],
                ])
            }
            MessageType::Data => return Err(ExchangeError::Protocol("unexpected Data as resume point")),
        }
    };

    debug!(resume_point, "sender exchange complete");
    Ok(resume_point)
}

/// Runs the receiver's half of parameter exchange.
///
/// Checks the sender's password against `local_password` (an empty local
/// password accepts any sender password), receives the three metadata
/// frames, resolves the on-disk target file via `root`/`conflict`, and
/// replies with the resume point.
///
/// # Errors
///
/// Returns [`ExchangeError::InvalidPassword`] on a password mismatch,
/// [`ExchangeError::RemoteCancelled`] if the sender cancels during metadata
/// exchange, [`ExchangeError::Protocol`] on any out-of-sequence frame, or
/// whatever [`resolve_incoming_file`] returns for file-resolution failures.
pub async fn receiver_exchange<S, F, C>(
    channel: &mut FramedChannel<S>,
    local_password: &str,
    root: &F,
    metadata_dir_name: &str,
    conflict: &C,
) -> Result<(FileMetadata, ResolvedFile<F::Sub>), ExchangeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: Folder,
    C: ConflictPrompt,
{
    negotiate_password(channel, local_password).await?;

    let name = receive_metadata_field(channel).await?;
    let name = String::from_utf8(name)
        .map_err(|_| ExchangeError::Protocol("file name was not valid UTF-8"))?;
    let hash_bytes = receive_metadata_field(channel).await?;
    let hash = ContentHash::from_bytes(
        hash_bytes
            .try_into()
            .map_err(|_| ExchangeError::Protocol("hash was not 16 bytes"))?,
    );
    let size_bytes = receive_metadata_field(channel).await?;
    let size_bytes: [u8; 4] = size_bytes
        .try_into()
        .map_err(|_| ExchangeError::Protocol("file size was not 4 bytes"))?;
    let size = i32::from_le_bytes(size_bytes);

    let metadata = FileMetadata::new(name.clone(), hash, size);

    let resolved = resolve_incoming_file(root, metadata_dir_name, &name, &hash, conflict).await?;

    channel
        .send(
            MessageType::Metadata,
            &resolved.resume_from_block.to_le_bytes(),
        )
        .await?;

    debug!(name = %metadata.name, resume_from = resolved.resume_from_block, "receiver exchange complete");
    Ok((metadata, resolved))
}

async fn negotiate_password<S>(
    channel: &mut FramedChannel<S>,
    local_password: &str,
) -> Result<(), ExchangeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let received = receive_metadata_field(channel).await?;

    if !local_password.is_empty() && local_password.as_bytes() != received.as_slice() {
        channel.send(MessageType::EndOfTransfer, &[]).await?;
        return Err(ExchangeError::InvalidPassword);
    }

    channel.send(MessageType::Metadata, &[]).await?;
    Ok(())
}

/// Reads one frame expected to be a `Metadata` frame, returning its payload
/// as an owned buffer. Any `EndOfTransfer` is translated to
/// [`ExchangeError::RemoteCancelled`].
async fn receive_metadata_field<S>(
    channel: &mut FramedChannel<S>,
) -> Result<Vec<u8>, ExchangeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let frame = channel.receive().await?;
    match frame.message_type {
        MessageType::Metadata => Ok(frame.payload.to_vec()),
        MessageType::EndOfTransfer => Err(ExchangeError::RemoteCancelled),
        MessageType::Data => Err(ExchangeError::Protocol("unexpected Data frame during exchange")),
    }
}
