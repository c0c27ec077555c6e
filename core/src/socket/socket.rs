//! The socket object: generic lifecycle, queues and notification state
//! shared by every socket kind. Protocol-specific send/receive logic (UDP
//! demux, TCP's state machine) lives outside this crate and drives sockets
//! through this object's queues and [`crate::notify::Notifier`].

use crate::buf::{AncillaryData, NetBuffer};
use crate::error::{NetError, NetResult};
use crate::notify::{Notifier, Readiness};
use crate::types::{Endpoint, Ipv4Addr};

use super::accept::{AcceptQueue, AcceptedConnection, PendingConnection};
use super::options::{SocketFlags, SocketOptions};
use super::queue::BoundedQueue;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SocketKind {
    Datagram,
    Stream,
    Raw,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SocketState {
    Unbound,
    Bound,
    Listening,
    Connecting,
    Connected,
    Closed,
}

const DEFAULT_RECV_QUEUE_DEPTH: usize = 16;
const DEFAULT_BACKLOG: usize = 8;

pub struct Socket {
    pub kind: SocketKind,
    pub state: SocketState,
    pub flags: SocketFlags,
    pub options: SocketOptions,
    pub local: Option<Endpoint>,
    pub remote: Option<Endpoint>,
    pub recv_queue: BoundedQueue<(NetBuffer, Endpoint)>,
    accept_queue: Option<AcceptQueue>,
    pub notifier: Notifier,
    pub pending_error: Option<NetError>,
    /// Set once the peer has closed its end. A `recv` against an empty
    /// queue after this is set returns an empty read (EOF) rather than
    /// blocking or erroring.
    peer_closed: bool,
}

impl Socket {
    pub fn new(kind: SocketKind) -> Self {
        Self {
            kind,
            state: SocketState::Unbound,
            flags: SocketFlags::empty(),
            options: SocketOptions::new(),
            local: None,
            remote: None,
            recv_queue: BoundedQueue::new(DEFAULT_RECV_QUEUE_DEPTH),
            accept_queue: None,
            notifier: Notifier::new(),
            pending_error: None,
            peer_closed: false,
        }
    }

    pub fn is_nonblocking(&self) -> bool {
        self.flags.contains(SocketFlags::O_NONBLOCK)
    }

    pub fn set_nonblocking(&mut self, nonblocking: bool) {
        self.flags.set(SocketFlags::O_NONBLOCK, nonblocking);
    }

    pub fn is_read_shutdown(&self) -> bool {
        self.flags.contains(SocketFlags::SHUT_RD)
    }

    pub fn is_write_shutdown(&self) -> bool {
        self.flags.contains(SocketFlags::SHUT_WR)
    }

    pub fn shutdown_read(&mut self) {
        self.flags.insert(SocketFlags::SHUT_RD);
        self.notifier.set(Readiness::HANGUP);
    }

    pub fn shutdown_write(&mut self) {
        self.flags.insert(SocketFlags::SHUT_WR);
    }

    pub fn take_pending_error(&mut self) -> Option<NetError> {
        self.pending_error.take()
    }

    pub fn bind(&mut self, local: Endpoint) -> NetResult<()> {
        if self.state != SocketState::Unbound {
            return Err(NetError::NotAllowed);
        }
        self.local = Some(local);
        self.state = SocketState::Bound;
        Ok(())
    }

    pub fn connect(&mut self, remote: Endpoint) -> NetResult<()> {
        if self.kind == SocketKind::Stream {
            self.state = SocketState::Connecting;
        } else {
            self.state = SocketState::Connected;
        }
        self.remote = Some(remote);
        Ok(())
    }

    pub fn mark_connected(&mut self) {
        self.state = SocketState::Connected;
        self.notifier.set(Readiness::WRITABLE);
    }

    /// Begin listening with room for `backlog` completed connections
    /// (`Stream` sockets only).
    pub fn listen(&mut self, backlog: usize) -> NetResult<()> {
        if self.kind != SocketKind::Stream {
            return Err(NetError::Unsupported);
        }
        if self.state != SocketState::Bound {
            return Err(NetError::NotAllowed);
        }
        self.accept_queue = Some(AcceptQueue::new(backlog.max(1).min(DEFAULT_BACKLOG.max(backlog))));
        self.state = SocketState::Listening;
        Ok(())
    }

    /// Hand a completed connection to a listener's accept queue, waking
    /// anyone blocked in `accept()`. Called by the (external) TCP
    /// handshake completion path.
    pub fn offer_connection(&mut self, conn: AcceptedConnection) -> NetResult<()> {
        let queue = self.accept_queue.as_mut().ok_or(NetError::NotAllowed)?;
        if !queue.push(conn) {
            return Err(NetError::NoBufferSpace);
        }
        self.notifier.set(Readiness::ACCEPT);
        Ok(())
    }

    pub fn accept(&mut self) -> NetResult<AcceptedConnection> {
        let queue = self.accept_queue.as_mut().ok_or(NetError::NotAllowed)?;
        let conn = queue.pop().ok_or(NetError::WouldBlock)?;
        if queue.is_empty() {
            self.notifier.clear(Readiness::ACCEPT);
        }
        Ok(conn)
    }

    pub fn accept_queue_len(&self) -> usize {
        self.accept_queue.as_ref().map_or(0, AcceptQueue::len)
    }

    /// Queue a received datagram (and its source address) for `recv`,
    /// waking anyone blocked reading. Called by the (external) UDP/raw
    /// demux path.
    pub fn push_datagram(&mut self, buf: NetBuffer, from: Endpoint) -> NetResult<()> {
        if self.is_read_shutdown() {
            return Err(NetError::NotConnected);
        }
        if !self.recv_queue.push((buf, from)) {
            return Err(NetError::NoBufferSpace);
        }
        self.notifier.set(Readiness::READABLE);
        Ok(())
    }

    pub fn recv_datagram(&mut self) -> NetResult<(NetBuffer, Endpoint)> {
        match self.recv_queue.pop() {
            Some(item) => {
                if self.recv_queue.is_empty() {
                    self.notifier.clear(Readiness::READABLE);
                }
                Ok(item)
            }
            None if self.peer_closed => Ok((NetBuffer::alloc()?, Endpoint::UNSPECIFIED)),
            None => Err(NetError::WouldBlock),
        }
    }

    /// Mark the peer as having closed its end. Further `recv` calls against
    /// an empty queue return an empty (EOF) read instead of blocking.
    pub fn mark_peer_closed(&mut self) {
        self.peer_closed = true;
        self.notifier.set(Readiness::HANGUP);
    }

    pub fn apply_recv_buf_size(&mut self, size: usize) -> NetResult<()> {
        self.options.set_recv_buf_size(size)?;
        self.recv_queue.resize(size / 1024.max(1));
        Ok(())
    }

    // -- accept queue delegation ------------------------------------------

    pub fn set_max_backlog(&mut self, max_backlog: usize) -> NetResult<()> {
        let queue = self.accept_queue.as_mut().ok_or(NetError::NotAllowed)?;
        queue.set_max_backlog(max_backlog);
        Ok(())
    }

    pub fn spawn_pending(&mut self, conn: PendingConnection) -> NetResult<()> {
        let queue = self.accept_queue.as_mut().ok_or(NetError::NotAllowed)?;
        if !queue.spawn_pending(conn) {
            return Err(NetError::NoBufferSpace);
        }
        Ok(())
    }

    pub fn connected(&mut self, remote: Endpoint) -> NetResult<()> {
        let queue = self.accept_queue.as_mut().ok_or(NetError::NotAllowed)?;
        if !queue.connected(remote) {
            return Err(NetError::NoBufferSpace);
        }
        self.notifier.set(Readiness::ACCEPT);
        Ok(())
    }

    pub fn dequeue_connected(&mut self) -> NetResult<AcceptedConnection> {
        let queue = self.accept_queue.as_mut().ok_or(NetError::NotAllowed)?;
        let conn = queue.dequeue_connected().ok_or(NetError::WouldBlock)?;
        if queue.is_empty() {
            self.notifier.clear(Readiness::ACCEPT);
        }
        Ok(conn)
    }

    pub fn aborted(&self) -> usize {
        self.accept_queue.as_ref().map_or(0, AcceptQueue::aborted)
    }

    // -- send --------------------------------------------------------------

    /// Resolve the destination to send to and build an outgoing buffer,
    /// implicitly binding an unbound socket and validating the combination
    /// of connected state and an explicit destination the same way
    /// `sendto`/`send` do: a connected socket given an explicit destination
    /// is an error, as is an unconnected, destination-less send, and a
    /// datagram that doesn't fit the negotiated send buffer in one piece is
    /// rejected rather than silently fragmented.
    pub fn send(
        &mut self,
        local_bind: impl FnOnce() -> NetResult<Endpoint>,
        data: &[u8],
        destination: Option<Endpoint>,
        ancillary: Option<AncillaryData>,
    ) -> NetResult<(NetBuffer, Endpoint)> {
        if self.is_write_shutdown() {
            return Err(NetError::NotConnected);
        }
        let dest = match (self.remote, destination) {
            (Some(_), Some(_)) => return Err(NetError::IsConnected),
            (Some(remote), None) => remote,
            (None, Some(dest)) => dest,
            (None, None) => return Err(NetError::DestinationRequired),
        };
        if self.kind == SocketKind::Datagram && data.len() > self.options.send_buf_size {
            return Err(NetError::MessageTooLong);
        }
        if self.local.is_none() {
            let bound = local_bind()?;
            self.local = Some(bound);
            if self.state == SocketState::Unbound {
                self.state = SocketState::Bound;
            }
        }
        let mut buf = NetBuffer::from_copy(data)?;
        if let Some(ancillary) = ancillary {
            buf.ancillary = ancillary;
        }
        buf.set_source(self.local.unwrap());
        buf.set_destination(dest);
        Ok((buf, dest))
    }

    /// Like [`Self::send`], but also resolves the outgoing route and
    /// rewrites the buffer's destination to the next-hop gateway when the
    /// matching route carries one.
    pub fn send_routed(
        &mut self,
        local_bind: impl FnOnce() -> NetResult<Endpoint>,
        data: &[u8],
        destination: Option<Endpoint>,
        ancillary: Option<AncillaryData>,
    ) -> NetResult<(NetBuffer, Endpoint)> {
        let (mut buf, dest) = self.send(local_bind, data, destination, ancillary)?;
        crate::route::send_routed_data(&mut buf, dest)?;
        Ok((buf, dest))
    }
}

/// Two sockets wired directly to each other, bypassing any device or
/// routing path — the building block behind `socketpair(2)`.
#[allow(dead_code)]
pub struct SocketPair {
    pub a: Socket,
    pub b: Socket,
}

#[allow(dead_code)]
impl SocketPair {
    /// Hand `data` from `a` straight into `b`'s receive queue.
    pub fn pump_a_to_b(&mut self, data: &[u8]) -> NetResult<usize> {
        let buf = NetBuffer::from_copy(data)?;
        let from = self.a.local.unwrap_or(Endpoint::UNSPECIFIED);
        self.b.push_datagram(buf, from)?;
        Ok(data.len())
    }

    pub fn pump_b_to_a(&mut self, data: &[u8]) -> NetResult<usize> {
        let buf = NetBuffer::from_copy(data)?;
        let from = self.b.local.unwrap_or(Endpoint::UNSPECIFIED);
        self.a.push_datagram(buf, from)?;
        Ok(data.len())
    }

    /// Close `a`'s end: further sends from `a` fail and `b`'s next `recv`
    /// past its queued data returns EOF.
    pub fn close_a(&mut self) {
        self.a.state = SocketState::Closed;
        self.a.shutdown_write();
        self.b.mark_peer_closed();
    }

    pub fn close_b(&mut self) {
        self.b.state = SocketState::Closed;
        self.b.shutdown_write();
        self.a.mark_peer_closed();
    }
}

/// Build a connected pair of sockets of the given kind, sharing no device
/// or route — used for local, in-process communication the way
/// `socketpair(2)` is on a Unix host.
#[allow(dead_code)]
pub fn socketpair(kind: SocketKind) -> NetResult<SocketPair> {
    use crate::types::Port;
    let mut a = Socket::new(kind);
    let mut b = Socket::new(kind);
    let ep_a = Endpoint::new(Ipv4Addr::LOOPBACK, Port::new(1));
    let ep_b = Endpoint::new(Ipv4Addr::LOOPBACK, Port::new(2));
    a.local = Some(ep_a);
    a.remote = Some(ep_b);
    a.state = SocketState::Connected;
    b.local = Some(ep_b);
    b.remote = Some(ep_a);
    b.state = SocketState::Connected;
    Ok(SocketPair { a, b })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Ipv4Addr, Port};
    use netstack_support::testing::TestResult;
    use netstack_support::{assert_eq_test, assert_test, pass};

    fn endpoint(port: u16) -> Endpoint {
        Endpoint::new(Ipv4Addr::LOOPBACK, Port::new(port))
    }

    pub fn test_bind_then_listen_then_accept_round_trip() -> TestResult {
        let mut sock = Socket::new(SocketKind::Stream);
        sock.bind(endpoint(80)).unwrap();
        sock.listen(4).unwrap();
        assert_eq_test!(sock.accept().unwrap_err(), NetError::WouldBlock);
        sock.offer_connection(AcceptedConnection {
            local: endpoint(80),
            remote: endpoint(4000),
            dev: crate::types::DevIndex(0),
        })
        .unwrap();
        let conn = sock.accept().unwrap();
        assert_eq_test!(conn.remote.port.get(), 4000);
        pass!()
    }

    pub fn test_push_datagram_sets_readable_and_recv_clears_it() -> TestResult {
        let mut sock = Socket::new(SocketKind::Datagram);
        let buf = NetBuffer::alloc().unwrap();
        sock.push_datagram(buf, endpoint(53)).unwrap();
        assert_test!(sock.notifier.current().contains(Readiness::READABLE));
        sock.recv_datagram().unwrap();
        assert_test!(!sock.notifier.current().contains(Readiness::READABLE));
        pass!()
    }

    pub fn test_shutdown_read_rejects_further_datagrams() -> TestResult {
        let mut sock = Socket::new(SocketKind::Datagram);
        sock.shutdown_read();
        let buf = NetBuffer::alloc().unwrap();
        assert_eq_test!(sock.push_datagram(buf, endpoint(53)).unwrap_err(), NetError::NotConnected);
        pass!()
    }

    pub fn test_recv_after_peer_closed_returns_eof_not_would_block() -> TestResult {
        let mut sock = Socket::new(SocketKind::Datagram);
        sock.mark_peer_closed();
        let (buf, from) = sock.recv_datagram().unwrap();
        assert_eq_test!(buf.len(), 0);
        assert_eq_test!(from, Endpoint::UNSPECIFIED);
        pass!()
    }

    pub fn test_send_requires_destination_when_unconnected() -> TestResult {
        let mut sock = Socket::new(SocketKind::Datagram);
        let result = sock.send(|| Ok(endpoint(4000)), b"hi", None, None);
        assert_eq_test!(result.unwrap_err(), NetError::DestinationRequired);
        pass!()
    }

    pub fn test_send_rejects_explicit_destination_when_connected() -> TestResult {
        let mut sock = Socket::new(SocketKind::Datagram);
        sock.connect(endpoint(53)).unwrap();
        let result = sock.send(|| Ok(endpoint(4000)), b"hi", Some(endpoint(80)), None);
        assert_eq_test!(result.unwrap_err(), NetError::IsConnected);
        pass!()
    }

    pub fn test_send_implicitly_binds_unbound_socket() -> TestResult {
        let mut sock = Socket::new(SocketKind::Datagram);
        assert_test!(sock.local.is_none());
        let (buf, dest) = sock.send(|| Ok(endpoint(4000)), b"hi", Some(endpoint(53)), None).unwrap();
        assert_eq_test!(sock.local.unwrap().port.get(), 4000);
        assert_eq_test!(dest.port.get(), 53);
        assert_eq_test!(buf.len(), 2);
        pass!()
    }

    pub fn test_send_datagram_too_long_rejected() -> TestResult {
        let mut sock = Socket::new(SocketKind::Datagram);
        sock.options.set_send_buf_size(512).unwrap();
        let data = alloc::vec![0u8; 1024];
        let result = sock.send(|| Ok(endpoint(1)), &data, Some(endpoint(53)), None);
        assert_eq_test!(result.unwrap_err(), NetError::MessageTooLong);
        pass!()
    }

    pub fn test_socketpair_send_recv_then_close_yields_eof() -> TestResult {
        let mut pair = socketpair(SocketKind::Stream).unwrap();
        pair.pump_a_to_b(b"ping").unwrap();
        let (buf, _) = pair.b.recv_datagram().unwrap();
        let mut out = [0u8; 4];
        buf.read_data(0, &mut out).unwrap();
        assert_eq_test!(&out, b"ping");
        pair.close_a();
        let (eof, _) = pair.b.recv_datagram().unwrap();
        assert_eq_test!(eof.len(), 0);
        pass!()
    }

    pub fn test_two_stage_accept_queue_via_socket() -> TestResult {
        let mut sock = Socket::new(SocketKind::Stream);
        sock.bind(endpoint(80)).unwrap();
        sock.listen(2).unwrap();
        sock.spawn_pending(crate::socket::PendingConnection {
            local: endpoint(80),
            remote: endpoint(9000),
            dev: crate::types::DevIndex(0),
        })
        .unwrap();
        sock.connected(endpoint(9000)).unwrap();
        let conn = sock.dequeue_connected().unwrap();
        assert_eq_test!(conn.remote.port.get(), 9000);
        pass!()
    }

    netstack_support::define_test_suite!(
        socket,
        [
            test_bind_then_listen_then_accept_round_trip,
            test_push_datagram_sets_readable_and_recv_clears_it,
            test_shutdown_read_rejects_further_datagrams,
            test_recv_after_peer_closed_returns_eof_not_would_block,
            test_send_requires_destination_when_unconnected,
            test_send_rejects_explicit_destination_when_connected,
            test_send_implicitly_binds_unbound_socket,
            test_send_datagram_too_long_rejected,
            test_socketpair_send_recv_then_close_yields_eof,
            test_two_stage_accept_queue_via_socket,
        ]
    );
}
