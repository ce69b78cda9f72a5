//! Outgoing TCP dial helper.

use crate::acceptor::apply_socket_buffers;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

/// Connects to `addr`, respecting `cancel`, and applies the workspace's
/// default socket buffer sizes to the resulting stream.
///
/// # Errors
///
/// Returns an I/O error if the connect fails or does not complete before
/// `cancel` fires.
pub async fn dial(addr: SocketAddr, cancel: &CancellationToken) -> std::io::Result<TcpStream> {
    let stream = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            return Err(std::io::Error::new(std::io::ErrorKind::Interrupted, "dial cancelled"));
        }
        result = TcpStream::connect(addr) => result?,
    };

    apply_socket_buffers(&stream)?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acceptor::Acceptor;
    use std::net::{Ipv4Addr, SocketAddrV4};

    #[tokio::test]
    async fn dials_an_accepting_listener() {
        let acceptor = Acceptor::new();
        let mut incoming = acceptor.listen(58_123).expect("listen");
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 58_123));

        let dial_task = tokio::spawn(async move { dial(addr, &CancellationToken::new()).await });
        let _accepted = incoming.recv().await.expect("accepted connection");
        let dialed = dial_task.await.expect("join").expect("dial");

        assert!(dialed.peer_addr().is_ok());
        acceptor.close();
    }

    #[tokio::test]
    async fn cancellation_aborts_a_pending_dial() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(10, 255, 255, 1), 1));
        let err = dial(addr, &cancel).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::Interrupted);
    }
}
