//! Backlog queue a listening socket's completed connections wait in until
//! `accept()` claims them.

use alloc::collections::VecDeque;

use crate::types::{DevIndex, Endpoint};

/// A completed inbound connection handed off from protocol-level handshake
/// processing (external to this crate) to the listening socket that will
/// `accept()` it.
#[derive(Clone, Copy, Debug)]
pub struct AcceptedConnection {
    pub local: Endpoint,
    pub remote: Endpoint,
    pub dev: DevIndex,
}

/// A handshake in progress: a peer that has reached this listener but
/// hasn't yet completed whatever protocol-level confirmation turns it into
/// a connection `accept()` can hand out.
#[derive(Clone, Copy, Debug)]
pub struct PendingConnection {
    pub local: Endpoint,
    pub remote: Endpoint,
    pub dev: DevIndex,
}

/// Two-stage backlog: connections a handshake is still in flight for sit in
/// `pending`, and only move to `connected` once protocol-level code confirms
/// them, which is the split `accept()` actually needs — a full connected
/// queue shouldn't block new handshakes from starting, only from finishing.
/// Both stages share one combined cap of `3 * max_backlog / 2`, the same
/// slack BSD listen(2) backlogs allow for in-flight handshakes beyond the
/// nominal backlog.
pub struct AcceptQueue {
    pending: VecDeque<PendingConnection>,
    connected: VecDeque<AcceptedConnection>,
    max_backlog: usize,
    aborted: usize,
}

impl AcceptQueue {
    pub fn new(max_backlog: usize) -> Self {
        let max_backlog = max_backlog.max(1);
        Self {
            pending: VecDeque::with_capacity(max_backlog.min(256)),
            connected: VecDeque::with_capacity(max_backlog.min(256)),
            max_backlog,
            aborted: 0,
        }
    }

    fn cap(&self) -> usize {
        (3 * self.max_backlog) / 2
    }

    pub fn set_max_backlog(&mut self, max_backlog: usize) {
        self.max_backlog = max_backlog.max(1);
    }

    pub fn max_backlog(&self) -> usize {
        self.max_backlog
    }

    /// Record a handshake attempt as pending. Rejected once pending plus
    /// connected already fill the combined cap.
    pub fn spawn_pending(&mut self, conn: PendingConnection) -> bool {
        if self.pending.len() + self.connected.len() >= self.cap() {
            return false;
        }
        self.pending.push_back(conn);
        true
    }

    /// Promote the oldest pending handshake matching `remote` to connected.
    /// If the connected queue is already at `max_backlog`, the handshake is
    /// dropped and counted in [`Self::aborted`] rather than overflowing the
    /// queue `accept()` drains.
    pub fn connected(&mut self, remote: Endpoint) -> bool {
        let Some(pos) = self.pending.iter().position(|p| p.remote == remote) else {
            return false;
        };
        let conn = self.pending.remove(pos).unwrap();
        if self.connected.len() >= self.max_backlog {
            self.aborted += 1;
            return false;
        }
        self.connected.push_back(AcceptedConnection { local: conn.local, remote: conn.remote, dev: conn.dev });
        true
    }

    pub fn dequeue_connected(&mut self) -> Option<AcceptedConnection> {
        self.connected.pop_front()
    }

    /// Count of completed handshakes dropped because the connected queue
    /// was already full.
    pub fn aborted(&self) -> usize {
        self.aborted
    }

    /// Push straight onto the connected queue, bypassing the pending stage
    /// — the path a caller that already has a fully-formed connection (no
    /// separate handshake to track) uses.
    pub fn push(&mut self, conn: AcceptedConnection) -> bool {
        if self.connected.len() >= self.max_backlog {
            return false;
        }
        self.connected.push_back(conn);
        true
    }

    pub fn pop(&mut self) -> Option<AcceptedConnection> {
        self.dequeue_connected()
    }

    pub fn len(&self) -> usize {
        self.connected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connected.is_empty()
    }

    pub fn has_room(&self) -> bool {
        self.pending.len() + self.connected.len() < self.cap()
    }

    pub fn backlog(&self) -> usize {
        self.max_backlog
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.connected.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netstack_support::testing::TestResult;
    use netstack_support::{assert_eq_test, assert_test, pass};

    fn conn(port: u16) -> AcceptedConnection {
        AcceptedConnection {
            local: Endpoint::new(crate::types::Ipv4Addr::LOOPBACK, crate::types::Port::new(80)),
            remote: Endpoint::new(crate::types::Ipv4Addr::LOOPBACK, crate::types::Port::new(port)),
            dev: DevIndex(0),
        }
    }

    pub fn test_push_respects_backlog() -> TestResult {
        let mut q = AcceptQueue::new(1);
        assert_test!(q.push(conn(1)));
        assert_test!(!q.push(conn(2)));
        assert_eq_test!(q.len(), 1);
        pass!()
    }

    pub fn test_pop_returns_oldest_first() -> TestResult {
        let mut q = AcceptQueue::new(4);
        q.push(conn(1));
        q.push(conn(2));
        assert_eq_test!(q.pop().unwrap().remote.port.get(), 1);
        pass!()
    }

    fn pending(port: u16) -> PendingConnection {
        PendingConnection {
            local: Endpoint::new(crate::types::Ipv4Addr::LOOPBACK, crate::types::Port::new(80)),
            remote: Endpoint::new(crate::types::Ipv4Addr::LOOPBACK, crate::types::Port::new(port)),
            dev: DevIndex(0),
        }
    }

    pub fn test_spawn_pending_then_connected_promotes_to_accept_queue() -> TestResult {
        let mut q = AcceptQueue::new(2);
        assert_test!(q.spawn_pending(pending(5)));
        assert_eq_test!(q.len(), 0);
        let remote = pending(5).remote;
        assert_test!(q.connected(remote));
        assert_eq_test!(q.len(), 1);
        assert_eq_test!(q.dequeue_connected().unwrap().remote.port.get(), 5);
        pass!()
    }

    pub fn test_combined_cap_is_one_and_a_half_times_backlog() -> TestResult {
        let mut q = AcceptQueue::new(2);
        assert_test!(q.spawn_pending(pending(1)));
        assert_test!(q.spawn_pending(pending(2)));
        assert_test!(q.spawn_pending(pending(3)));
        assert_test!(!q.spawn_pending(pending(4)));
        pass!()
    }

    pub fn test_connected_overflow_counts_as_aborted() -> TestResult {
        let mut q = AcceptQueue::new(3);
        q.push(conn(10));
        q.push(conn(11));
        q.push(conn(12));
        assert_test!(q.spawn_pending(pending(13)));
        assert_test!(!q.connected(pending(13).remote));
        assert_eq_test!(q.aborted(), 1);
        pass!()
    }

    netstack_support::define_test_suite!(
        socket_accept,
        [
            test_push_respects_backlog,
            test_pop_returns_oldest_first,
            test_spawn_pending_then_connected_promotes_to_accept_queue,
            test_combined_cap_is_one_and_a_half_times_backlog,
            test_connected_overflow_counts_as_aborted,
        ]
    );
}
