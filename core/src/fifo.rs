//! Bounded, blocking-capable buffer queue. Every suspension point that
//! hands packets between a producer and a consumer task — a device's
//! receive queue, a socket's receive buffer — is built on this.

use alloc::collections::VecDeque;

use netstack_support::IrqMutex;
use netstack_support::waitqueue::WaitQueue;

use crate::buf::NetBuffer;
use crate::error::{NetError, NetResult};

struct FifoInner {
    queue: VecDeque<NetBuffer>,
    capacity: usize,
    closed: bool,
}

/// FIFO queue of buffers with a byte-agnostic capacity (counted in buffers,
/// not bytes — callers needing a byte budget track it themselves using
/// [`NetFifo::len`] and buffer lengths).
pub struct NetFifo {
    inner: IrqMutex<FifoInner>,
    not_empty: WaitQueue,
    not_full: WaitQueue,
}

impl NetFifo {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: IrqMutex::new(FifoInner { queue: VecDeque::new(), capacity, closed: false }),
            not_empty: WaitQueue::new(),
            not_full: WaitQueue::new(),
        }
    }

    /// Enqueue without blocking. Fails with [`NetError::NoBufferSpace`] if
    /// full, [`NetError::NotConnected`] if the FIFO has been closed.
    pub fn try_push(&self, buf: NetBuffer) -> NetResult<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(NetError::NotConnected);
        }
        if inner.queue.len() >= inner.capacity {
            return Err(NetError::NoBufferSpace);
        }
        inner.queue.push_back(buf);
        drop(inner);
        self.not_empty.wake_one();
        Ok(())
    }

    /// Enqueue, blocking the caller while the queue is full.
    pub fn push(&self, mut buf: NetBuffer) -> NetResult<()> {
        loop {
            {
                let mut inner = self.inner.lock();
                if inner.closed {
                    return Err(NetError::NotConnected);
                }
                if inner.queue.len() < inner.capacity {
                    inner.queue.push_back(buf);
                    drop(inner);
                    self.not_empty.wake_one();
                    return Ok(());
                }
            }
            self.not_full.wait_event(|| {
                let inner = self.inner.lock();
                inner.closed || inner.queue.len() < inner.capacity
            });
            let _ = &mut buf;
        }
    }

    pub fn try_pop(&self) -> Option<NetBuffer> {
        let mut inner = self.inner.lock();
        let item = inner.queue.pop_front();
        drop(inner);
        if item.is_some() {
            self.not_full.wake_one();
        }
        item
    }

    /// Block until a buffer is available or the FIFO is closed.
    pub fn pop(&self) -> Option<NetBuffer> {
        loop {
            if let Some(item) = self.try_pop() {
                return Some(item);
            }
            if self.inner.lock().closed {
                return None;
            }
            self.not_empty.wait_event(|| {
                let inner = self.inner.lock();
                inner.closed || !inner.queue.is_empty()
            });
            if let Some(item) = self.try_pop() {
                return Some(item);
            }
            if self.inner.lock().closed {
                return None;
            }
        }
    }

    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.not_empty.wake_all();
        self.not_full.wake_all();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netstack_support::testing::TestResult;
    use netstack_support::{assert_eq_test, assert_test, pass};

    pub fn test_push_pop_preserves_order() -> TestResult {
        let fifo = NetFifo::new(4);
        for i in 0..3u8 {
            fifo.try_push(NetBuffer::from_copy(&[i]).unwrap()).unwrap();
        }
        for i in 0..3u8 {
            let mut out = [0u8; 1];
            fifo.try_pop().unwrap().copy_to_slice(&mut out);
            assert_eq_test!(out[0], i);
        }
        assert_test!(fifo.try_pop().is_none());
        pass!()
    }

    pub fn test_try_push_reports_no_space_when_full() -> TestResult {
        let fifo = NetFifo::new(1);
        fifo.try_push(NetBuffer::from_copy(&[1]).unwrap()).unwrap();
        let err = fifo.try_push(NetBuffer::from_copy(&[2]).unwrap()).unwrap_err();
        assert_eq_test!(err, NetError::NoBufferSpace);
        pass!()
    }

    pub fn test_closed_fifo_rejects_push_and_drains_pop() -> TestResult {
        let fifo = NetFifo::new(4);
        fifo.try_push(NetBuffer::from_copy(&[9]).unwrap()).unwrap();
        fifo.close();
        assert_eq_test!(
            fifo.try_push(NetBuffer::from_copy(&[1]).unwrap()).unwrap_err(),
            NetError::NotConnected
        );
        assert_test!(fifo.try_pop().is_some());
        pass!()
    }

    netstack_support::define_test_suite!(
        fifo,
        [
            test_push_pop_preserves_order,
            test_try_push_reports_no_space_when_full,
            test_closed_fifo_rejects_push_and_drains_pop,
        ]
    );
}
