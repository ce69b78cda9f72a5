//! LAN peer discovery.

use crate::loop_harness::LoopHarness;
use crate::NetError;
use lanshare_core::constants::{BROADCAST_INTERVAL, BROADCAST_PORT};
use dashmap::DashMap;
use socket2::{Domain, Protocol, Socket, Type};
use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Observable set of discovered peers, mapping each peer's IPv4 address to
/// the instant it was last heard from.
///
/// No expiry runs automatically; callers that want one can poll [`PeerSet::expire_older_than`]
/// on their own schedule.
#[derive(Clone, Default)]
pub struct PeerSet {
    inner: Arc<DashMap<Ipv4Addr, Instant>>,
}

impl PeerSet {
    fn new() -> Self {
        Self::default()
    }

    fn insert(&self, addr: Ipv4Addr) {
        self.inner.insert(addr, Instant::now());
    }

    /// Returns a snapshot of the currently known peer addresses.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Ipv4Addr> {
        self.inner.iter().map(|entry| *entry.key()).collect()
    }

    /// Removes peers not heard from within `max_age`.
    pub fn expire_older_than(&self, max_age: std::time::Duration) {
        let now = Instant::now();
        self.inner
            .retain(|_, last_heard| now.duration_since(*last_heard) <= max_age);
    }
}

/// A UDP-broadcast-enabled local interface, computed once at construction.
struct BroadcastInterface {
    local_addr: Ipv4Addr,
    broadcast_addr: Ipv4Addr,
}

fn up_ipv4_interfaces() -> std::io::Result<Vec<BroadcastInterface>> {
    let mut out = Vec::new();
    for iface in if_addrs::get_if_addrs()? {
        if iface.is_loopback() || !is_interface_up(&iface.name) {
            continue;
        }
        if let if_addrs::IfAddr::V4(v4) = iface.addr {
            let broadcast_addr = network_broadcast_address(v4.ip, v4.netmask);
            out.push(BroadcastInterface {
                local_addr: v4.ip,
                broadcast_addr,
            });
        }
    }
    Ok(out)
}

/// Checks operational up status via `getifaddrs`'s `IFF_UP` flag.
///
/// `if-addrs` enumerates addresses but not interface flags, so a down
/// interface that still carries a stale IPv4 lease would otherwise pass
/// through untouched, get broadcast to, and get counted as a local address
/// in [`run_receiver`] — silently hiding a real peer that later reuses that
/// address.
#[cfg(unix)]
fn is_interface_up(name: &str) -> bool {
    match nix::ifaddrs::getifaddrs() {
        Ok(addrs) => addrs
            .filter(|iface| iface.interface_name == name)
            .any(|iface| iface.flags.contains(nix::net::if_::InterfaceFlags::IFF_UP)),
        Err(err) => {
            warn!(%err, %name, "getifaddrs failed, treating interface as down");
            false
        }
    }
}

#[cfg(not(unix))]
fn is_interface_up(_name: &str) -> bool {
    true
}

/// Computes the network broadcast address as `addr | ~netmask`, octet by
/// octet.
fn network_broadcast_address(addr: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Addr {
    let addr = addr.octets();
    let mask = netmask.octets();
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = addr[i] | !mask[i];
    }
    Ipv4Addr::from(out)
}

/// Drives the sender and receiver discovery loops.
pub struct DiscoveryHandler {
    sender: LoopHarness,
    receiver: LoopHarness,
    peers: PeerSet,
}

impl Default for DiscoveryHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryHandler {
    /// Creates a handler with both loops stopped.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sender: LoopHarness::new(),
            receiver: LoopHarness::new(),
            peers: PeerSet::new(),
        }
    }

    /// Returns a handle to the observable peer set.
    #[must_use]
    pub fn peers(&self) -> PeerSet {
        self.peers.clone()
    }

    /// Starts both the broadcast sender and the broadcast receiver loops.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Disposed`] if `stop`/`close` has already been
    /// called on this handler.
    pub fn start(&self) -> Result<(), NetError> {
        self.start_sender()?;
        self.start_receiver()?;
        Ok(())
    }

    fn start_sender(&self) -> Result<(), NetError> {
        self.sender.run(move |cancel| async move {
            if let Err(err) = run_sender(cancel).await {
                warn!(error = %err, "discovery sender loop exited");
            }
        })
    }

    fn start_receiver(&self) -> Result<(), NetError> {
        let peers = self.peers.clone();
        self.receiver.run(move |cancel| async move {
            if let Err(err) = run_receiver(peers, cancel).await {
                warn!(error = %err, "discovery receiver loop exited");
            }
        })
    }

    /// Stops both loops without preventing a later restart.
    pub fn stop(&self) {
        self.sender.stop();
        self.receiver.stop();
    }

    /// Stops both loops and prevents any further restart.
    pub fn close(&self) {
        self.sender.close();
        self.receiver.close();
    }
}

async fn run_sender(cancel: CancellationToken) -> Result<(), NetError> {
    let interfaces = up_ipv4_interfaces()?;
    let mut sockets = Vec::with_capacity(interfaces.len());

    for iface in &interfaces {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        #[cfg(not(windows))]
        socket.set_reuse_address(true)?;
        socket.set_broadcast(true)?;
        socket.bind(&SocketAddr::from(SocketAddrV4::new(iface.local_addr, 0)).into())?;
        socket.connect(
            &SocketAddr::from(SocketAddrV4::new(iface.broadcast_addr, BROADCAST_PORT)).into(),
        )?;
        socket.set_nonblocking(true)?;
        let udp = UdpSocket::from_std(socket.into())?;
        sockets.push((iface.local_addr, udp));
    }

    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }

        for (local_addr, socket) in &sockets {
            let payload = local_addr.octets();
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(()),
                result = socket.send(&payload) => { result?; }
            }
            trace!(%local_addr, "sent discovery broadcast");
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            () = tokio::time::sleep(BROADCAST_INTERVAL) => {}
        }
    }
}

async fn run_receiver(peers: PeerSet, cancel: CancellationToken) -> Result<(), NetError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    #[cfg(not(windows))]
    socket.set_reuse_address(true)?;
    socket.bind(&SocketAddr::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, BROADCAST_PORT)).into())?;
    socket.set_nonblocking(true)?;
    let socket = UdpSocket::from_std(socket.into())?;

    let local_addrs: HashSet<Ipv4Addr> = up_ipv4_interfaces()?
        .into_iter()
        .map(|iface| iface.local_addr)
        .collect();

    let mut buf = [0u8; 4];
    loop {
        let (len, _from) = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            result = socket.recv_from(&mut buf) => result?,
        };

        if len != 4 {
            continue;
        }
        let addr = Ipv4Addr::from(buf);
        if local_addrs.contains(&addr) {
            debug!(%addr, "ignoring self-announced discovery address");
            continue;
        }
        peers.insert(addr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_address_masks_host_bits() {
        let addr = network_broadcast_address(
            Ipv4Addr::new(10, 0, 0, 5),
            Ipv4Addr::new(255, 255, 255, 0),
        );
        assert_eq!(addr, Ipv4Addr::new(10, 0, 0, 255));

        let addr = network_broadcast_address(
            Ipv4Addr::new(192, 168, 1, 7),
            Ipv4Addr::new(255, 255, 255, 0),
        );
        assert_eq!(addr, Ipv4Addr::new(192, 168, 1, 255));
    }

    #[test]
    fn peer_set_expiry_drops_stale_entries() {
        let peers = PeerSet::new();
        peers.insert(Ipv4Addr::new(10, 0, 0, 9));
        std::thread::sleep(std::time::Duration::from_millis(5));
        peers.expire_older_than(std::time::Duration::from_millis(1));
        assert!(peers.snapshot().is_empty());
    }
}
