//! Session orchestrator: wires the framed channel, parameter exchange, and
//! transfer engine together per transfer, and tracks the inbound/outbound
//! transfer sets for one peer connection.
//!
//! A naive reading might model a `Session` as owning one persistent
//! "control-stream" plus two transfer sets, with sub-streams multiplexed
//! underneath it. This implementation instead has each transfer run
//! parameter exchange and streaming over its *own* freshly dialed or
//! accepted TCP stream — there is no separate, persistently multiplexed
//! control socket, since nothing downstream needs one. We resolve that
//! design question (recorded in DESIGN.md) by treating each transfer's own
//! [`transport::FramedChannel`] as serving both roles in sequence, rather
//! than inventing an undocumented session-level sub-protocol.

use crate::transfer::{run_receiver, run_transmitter, TransferOutcome};
use crate::TransferError;
use checksums::{ContentHash, Hasher};
use protocol::{receiver_exchange, sender_exchange, ConflictPrompt, FileMetadata, Folder};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::fs::OpenOptions;
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use transport::{BlockAccessor, FramedChannel};

/// Which way a transfer moves bytes relative to this session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    /// We are sending a local file to the peer.
    Out,
    /// We are receiving a file from the peer.
    In,
}

/// A live transfer's control surface, as tracked by the owning
/// [`Session`]'s inbound/outbound set.
struct TransferHandle {
    direction: Direction,
    name: String,
    cancel: CancellationToken,
    pause: Arc<Mutex<CancellationToken>>,
    resume_notify: Arc<Notify>,
}

type TransferSet = Mutex<HashMap<u64, TransferHandle>>;

/// Owns one peer's inbound and outbound transfers under a shared root
/// directory and password.
///
/// `F` is the [`Folder`] implementation rooted at the local receive
/// directory; it is cloned once per inbound transfer since `Folder`'s
/// methods take `&self` and each transfer resolves its own target file
/// independently.
pub struct Session<F> {
    root: F,
    metadata_dir_name: String,
    password: String,
    conflict: Arc<dyn ConflictPrompt>,
    next_id: AtomicU64,
    inbound: TransferSet,
    outbound: TransferSet,
    session_cancel: CancellationToken,
}

impl<F> Session<F>
where
    F: Folder + Clone + Send + Sync + 'static,
{
    /// Creates a session rooted at `root`, gated by `password` (empty
    /// accepts any sender password), using `conflict` to resolve inbound
    /// name clashes.
    #[must_use]
    pub fn new(
        root: F,
        metadata_dir_name: impl Into<String>,
        password: impl Into<String>,
        conflict: Arc<dyn ConflictPrompt>,
    ) -> Self {
        Self {
            root,
            metadata_dir_name: metadata_dir_name.into(),
            password: password.into(),
            conflict,
            next_id: AtomicU64::new(0),
            inbound: Mutex::new(HashMap::new()),
            outbound: Mutex::new(HashMap::new()),
            session_cancel: CancellationToken::new(),
        }
    }

    /// Number of transfers currently tracked in either set.
    #[must_use]
    pub fn transfer_count(&self) -> usize {
        let inbound = self.inbound.lock().expect("inbound set mutex poisoned").len();
        let outbound = self.outbound.lock().expect("outbound set mutex poisoned").len();
        inbound + outbound
    }

    /// Dials `peer`, runs parameter exchange as the sender for the local
    /// file at `file_path`, and launches a transmitter transfer under this
    /// session's outbound set.
    ///
    /// The file's content hash is computed by a single streaming read
    /// before the exchange begins: the hash is a value the sender already
    /// has in hand rather than something negotiated over the wire.
    ///
    /// Returns the transfer's id within this session's outbound set, so a
    /// caller (e.g. a GUI host) can later [`pause`](Self::pause) or
    /// [`resume`](Self::resume) it.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] if the dial, the exchange, or opening the
    /// local file fails.
    pub async fn start_outgoing(
        self: &Arc<Self>,
        file_path: impl AsRef<Path>,
        peer: SocketAddr,
    ) -> Result<u64, TransferError> {
        let file_path = file_path.as_ref().to_path_buf();
        let name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| TransferError::FileUnavailable("file path has no file name".into()))?;

        let hash = hash_file(&file_path).await?;
        let size = tokio::fs::metadata(&file_path)
            .await
            .map_err(|e| TransferError::FileUnavailable(e.to_string()))?
            .len();
        let metadata = FileMetadata::new(name.clone(), hash, size as i32);

        let stream = net::dial(peer, &self.session_cancel).await?;
        let mut channel = FramedChannel::new(stream);
        let resume_from = sender_exchange(&mut channel, &self.password, &metadata).await?;

        let file = OpenOptions::new()
            .read(true)
            .open(&file_path)
            .await
            .map_err(|e| TransferError::FileUnavailable(e.to_string()))?;
        let mut accessor = BlockAccessor::new(file, size as i64);
        accessor.seek_to_block(resume_from as i64).await?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        let pause = Arc::new(Mutex::new(CancellationToken::new()));
        let resume_notify = Arc::new(Notify::new());

        self.insert(Direction::Out, id, &name, cancel.clone(), pause.clone(), resume_notify.clone());

        let session = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = drive_transfer(&mut channel, &mut accessor, &pause, &resume_notify, &cancel, true)
                .await;
            match outcome {
                Ok(()) => info!(name = %name, "outgoing transfer completed"),
                Err(err) => warn!(name = %name, error = %err, "outgoing transfer failed"),
            }
            session.remove(Direction::Out, id);
        });

        Ok(id)
    }

    /// Runs parameter exchange as the receiver over `stream`, resolves the
    /// on-disk target file, and launches a receiver transfer under this
    /// session's inbound set.
    ///
    /// Fired by the fleet's acceptor for each freshly accepted connection.
    /// Returns the transfer's id within this session's inbound set, so a
    /// caller can later [`pause`](Self::pause) or [`resume`](Self::resume)
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] if the exchange or file resolution fails.
    pub async fn handle_incoming(self: &Arc<Self>, stream: TcpStream) -> Result<u64, TransferError> {
        let mut channel = FramedChannel::new(stream);
        let (metadata, resolved) = receiver_exchange(
            &mut channel,
            &self.password,
            &self.root,
            &self.metadata_dir_name,
            self.conflict.as_ref(),
        )
        .await?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&resolved.file_path)
            .await
            .map_err(|e| TransferError::FileUnavailable(e.to_string()))?;

        let mut accessor = BlockAccessor::new(file, metadata.size as i64).with_sidecar(resolved.sidecar);
        accessor.seek_to_block(resolved.resume_from_block as i64).await?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        let pause = Arc::new(Mutex::new(CancellationToken::new()));
        let resume_notify = Arc::new(Notify::new());
        let name = metadata.name.clone();

        self.insert(Direction::In, id, &name, cancel.clone(), pause.clone(), resume_notify.clone());

        let session = Arc::clone(self);
        let metadata_dir = resolved.metadata_dir;
        let metadata_file_name = resolved.metadata_file_name;
        tokio::spawn(async move {
            let outcome = drive_transfer(&mut channel, &mut accessor, &pause, &resume_notify, &cancel, false)
                .await;
            match &outcome {
                Ok(()) => {
                    info!(name = %name, "incoming transfer completed");
                    if let Err(err) = metadata_dir.delete_file(&metadata_file_name) {
                        warn!(name = %name, error = %err, "failed to delete completed sidecar");
                    }
                }
                Err(err) => warn!(name = %name, error = %err, "incoming transfer failed"),
            }
            session.remove(Direction::In, id);
        });

        Ok(id)
    }

    /// Pauses the transfer identified by `id`, if it is currently tracked.
    /// Clean and resumable via [`Session::resume`].
    pub fn pause(&self, direction: Direction, id: u64) {
        let set = self.set_for(direction);
        if let Some(handle) = set.lock().expect("transfer set mutex poisoned").get(&id) {
            handle.pause.lock().expect("pause token mutex poisoned").cancel();
        }
    }

    /// Resumes a previously paused transfer identified by `id`.
    pub fn resume(&self, direction: Direction, id: u64) {
        let set = self.set_for(direction);
        if let Some(handle) = set.lock().expect("transfer set mutex poisoned").get(&id) {
            *handle.pause.lock().expect("pause token mutex poisoned") = CancellationToken::new();
            handle.resume_notify.notify_one();
        }
    }

    /// Cancels every tracked transfer, then drains both sets. Closing the
    /// session's control surface this way tears down any in-flight dial as
    /// well.
    pub fn stop(&self) {
        self.session_cancel.cancel();
        for set in [&self.inbound, &self.outbound] {
            let mut set = set.lock().expect("transfer set mutex poisoned");
            for handle in set.values() {
                info!(name = %handle.name, direction = ?handle.direction, "stopping transfer");
                handle.cancel.cancel();
            }
            set.clear();
        }
    }

    fn set_for(&self, direction: Direction) -> &TransferSet {
        match direction {
            Direction::In => &self.inbound,
            Direction::Out => &self.outbound,
        }
    }

    fn insert(
        &self,
        direction: Direction,
        id: u64,
        name: &str,
        cancel: CancellationToken,
        pause: Arc<Mutex<CancellationToken>>,
        resume_notify: Arc<Notify>,
    ) {
        let set = self.set_for(direction);
        set.lock().expect("transfer set mutex poisoned").insert(
            id,
            TransferHandle {
                direction,
                name: name.to_string(),
                cancel,
                pause,
                resume_notify,
            },
        );
    }

    /// Self-removal callback: a transfer calls this on its own `id` when it
    /// terminates, holding no reference back to the `Session` beyond this
    /// one function call.
    fn remove(&self, direction: Direction, id: u64) {
        let set = self.set_for(direction);
        set.lock().expect("transfer set mutex poisoned").remove(&id);
    }
}

/// Drives one transfer's streaming phase to completion, looping across
/// pause/resume cycles. `is_sender` selects [`run_transmitter`] vs
/// [`run_receiver`].
async fn drive_transfer<S>(
    channel: &mut FramedChannel<S>,
    accessor: &mut BlockAccessor,
    pause: &Arc<Mutex<CancellationToken>>,
    resume_notify: &Arc<Notify>,
    cancel: &CancellationToken,
    is_sender: bool,
) -> Result<(), TransferError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    loop {
        let current_pause = pause.lock().expect("pause token mutex poisoned").clone();
        let outcome = if is_sender {
            run_transmitter(channel, accessor, &current_pause, cancel).await?
        } else {
            run_receiver(channel, accessor, &current_pause, cancel).await?
        };

        match outcome {
            TransferOutcome::Completed => return Ok(()),
            TransferOutcome::Paused => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(TransferError::Cancelled),
                    () = resume_notify.notified() => {}
                }
            }
        }
    }
}

async fn hash_file(path: &Path) -> Result<ContentHash, TransferError> {
    use tokio::io::AsyncReadExt;

    let mut file = OpenOptions::new()
        .read(true)
        .open(path)
        .await
        .map_err(|e| TransferError::FileUnavailable(e.to_string()))?;
    let mut hasher = Hasher::new();
    let mut buf = vec![0u8; lanshare_core::constants::BLOCK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

