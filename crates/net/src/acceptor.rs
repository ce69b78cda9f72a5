//! TCP connection acceptor.

use crate::loop_harness::LoopHarness;
use crate::NetError;
use lanshare_core::constants::SOCKET_BUFFER;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Listens on the fixed control port and emits each accepted stream with its
/// default socket buffer sizes already applied.
pub struct Acceptor {
    harness: LoopHarness,
}

impl Default for Acceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Acceptor {
    /// Creates an acceptor that is not yet listening.
    #[must_use]
    pub fn new() -> Self {
        Self {
            harness: LoopHarness::new(),
        }
    }

    /// Starts listening on `port`, forwarding each accepted stream over the
    /// returned receiver. Cancellation (via `stop`/`close`) aborts any
    /// in-flight accept immediately.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Disposed`] if the acceptor has been closed.
    pub fn listen(&self, port: u16) -> Result<mpsc::Receiver<TcpStream>, NetError> {
        let (tx, rx) = mpsc::channel(16);
        self.harness.run(move |cancel| async move {
            let listener = match bind_listener(port) {
                Ok(listener) => listener,
                Err(err) => {
                    warn!(error = %err, "acceptor failed to bind");
                    return;
                }
            };

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return,
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, peer)) => {
                                if let Err(err) = apply_socket_buffers(&stream) {
                                    warn!(error = %err, %peer, "failed to size accepted socket buffers");
                                }
                                info!(%peer, "accepted connection");
                                if tx.send(stream).await.is_err() {
                                    return;
                                }
                            }
                            Err(err) => {
                                warn!(error = %err, "accept failed");
                            }
                        }
                    }
                }
            }
        })?;
        Ok(rx)
    }

    /// Stops the listener without preventing a later restart.
    pub fn stop(&self) {
        self.harness.stop();
    }

    /// Stops the listener and prevents any further restart.
    pub fn close(&self) {
        self.harness.close();
    }
}

fn bind_listener(port: u16) -> std::io::Result<TcpListener> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
    #[cfg(not(windows))]
    socket.set_reuse_address(true)?;
    socket.bind(&SocketAddr::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)).into())?;
    socket.listen(128)?;
    socket.set_nonblocking(true)?;
    TcpListener::from_std(socket.into())
}

/// Applies the workspace's default send/receive buffer sizes to `stream`.
pub(crate) fn apply_socket_buffers(stream: &TcpStream) -> std::io::Result<()> {
    let socket = socket2::SockRef::from(stream);
    socket.set_send_buffer_size(SOCKET_BUFFER)?;
    socket.set_recv_buffer_size(SOCKET_BUFFER)?;
    Ok(())
}
