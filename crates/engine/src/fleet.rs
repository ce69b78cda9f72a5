//! Fleet orchestrator: the acceptor, discovery, and the set of sessions.

use crate::session::Session;
use crate::TransferError;
use lanshare_core::constants::PORT;
use net::{Acceptor, DiscoveryHandler, NetError, PeerSet};
use protocol::ConflictPrompt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpStream;
use tracing::{info, warn};

/// Holds the acceptor, the discovery handler, and every live [`Session`],
/// fanning `stop` out to all three.
///
/// Generic over the receive-side [`protocol::Folder`] implementation, since
/// every session accepted by this fleet shares the same root directory and
/// password policy.
pub struct Fleet<F> {
    acceptor: Acceptor,
    discovery: DiscoveryHandler,
    sessions: Mutex<Vec<Arc<Session<F>>>>,
    root: F,
    metadata_dir_name: String,
    password: String,
    conflict: Arc<dyn ConflictPrompt>,
}

impl<F> Fleet<F>
where
    F: protocol::Folder + Clone + Send + Sync + 'static,
{
    /// Creates a fleet rooted at `root`, not yet listening or discovering.
    #[must_use]
    pub fn new(
        root: F,
        metadata_dir_name: impl Into<String>,
        password: impl Into<String>,
        conflict: Arc<dyn ConflictPrompt>,
    ) -> Self {
        Self {
            acceptor: Acceptor::new(),
            discovery: DiscoveryHandler::new(),
            sessions: Mutex::new(Vec::new()),
            root,
            metadata_dir_name: metadata_dir_name.into(),
            password: password.into(),
            conflict,
        }
    }

    /// Returns a handle to the live discovered-peer set.
    #[must_use]
    pub fn peers(&self) -> PeerSet {
        self.discovery.peers()
    }

    /// Starts the discovery loops and the TCP acceptor on `port`; each
    /// accepted stream becomes a fresh [`Session`] handling exactly one
    /// incoming transfer.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Disposed`] if the fleet has already been closed.
    pub fn start(self: &Arc<Self>, port: u16) -> Result<(), NetError> {
        self.discovery.start()?;
        let mut incoming = self.acceptor.listen(port)?;

        let fleet = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(stream) = incoming.recv().await {
                fleet.accept_stream(stream);
            }
        });

        Ok(())
    }

    /// Starts the fleet on the protocol's default control port
    /// ([`lanshare_core::constants::PORT`]).
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Disposed`] if the fleet has already been closed.
    pub fn start_default(self: &Arc<Self>) -> Result<(), NetError> {
        self.start(PORT)
    }

    fn accept_stream(self: &Arc<Self>, stream: TcpStream) {
        let peer = stream.peer_addr().ok();
        let session = Arc::new(Session::new(
            self.root.clone(),
            self.metadata_dir_name.clone(),
            self.password.clone(),
            Arc::clone(&self.conflict),
        ));
        self.sessions
            .lock()
            .expect("session list mutex poisoned")
            .push(Arc::clone(&session));

        tokio::spawn(async move {
            if let Err(err) = session.handle_incoming(stream).await {
                warn!(?peer, error = %err, "incoming session failed");
            }
        });
    }

    /// Dials `peer` and starts sending `file_path` as a brand new outgoing
    /// session.
    ///
    /// Returns the freshly created session alongside the transfer's id
    /// within it, so a caller can pause/resume that specific transfer.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] if the dial or parameter exchange fails.
    pub async fn start_outgoing(
        self: &Arc<Self>,
        file_path: impl AsRef<std::path::Path>,
        peer: SocketAddr,
    ) -> Result<(Arc<Session<F>>, u64), TransferError> {
        let session = Arc::new(Session::new(
            self.root.clone(),
            self.metadata_dir_name.clone(),
            self.password.clone(),
            Arc::clone(&self.conflict),
        ));
        self.sessions
            .lock()
            .expect("session list mutex poisoned")
            .push(Arc::clone(&session));

        let id = session.start_outgoing(file_path, peer).await?;
        Ok((session, id))
    }

    /// Cancels the acceptor, both discovery loops, and every live session.
    pub fn stop(&self) {
        info!("stopping fleet");
        self.acceptor.close();
        self.discovery.close();
        for session in self.sessions.lock().expect("session list mutex poisoned").drain(..) {
            session.stop();
        }
    }
}

