//! Slab-allocated socket table: slots with a freelist, doubling growth,
//! capped at a hard maximum so a runaway caller cannot exhaust memory one
//! socket at a time.

use alloc::vec::Vec;

use netstack_support::IrqMutex;

use super::ports::EphemeralPortAllocator;
use super::socket::{Socket, SocketKind};

pub struct SlabSocketTable {
    slots: Vec<Option<Socket>>,
    freelist: Vec<usize>,
    max_capacity: usize,
}

impl SlabSocketTable {
    pub const INITIAL_CAPACITY: usize = 64;
    pub const MAX_CAPACITY: usize = 4096;

    pub const fn empty() -> Self {
        Self { slots: Vec::new(), freelist: Vec::new(), max_capacity: 0 }
    }

    fn init_if_needed(&mut self) {
        if self.max_capacity == 0 {
            *self = Self::new(Self::INITIAL_CAPACITY, Self::MAX_CAPACITY);
        }
    }

    pub fn new(initial_capacity: usize, max_capacity: usize) -> Self {
        let init_cap = initial_capacity.min(max_capacity);
        let mut slots = Vec::with_capacity(init_cap);
        slots.resize_with(init_cap, || None);
        let freelist = (0..init_cap).rev().collect();
        Self { slots, freelist, max_capacity }
    }

    pub fn alloc(&mut self, kind: SocketKind) -> Option<usize> {
        self.init_if_needed();
        if self.freelist.is_empty() {
            self.grow();
        }
        let idx = self.freelist.pop()?;
        self.slots[idx] = Some(Socket::new(kind));
        Some(idx)
    }

    pub fn get(&self, idx: usize) -> Option<&Socket> {
        self.slots.get(idx)?.as_ref()
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut Socket> {
        self.slots.get_mut(idx)?.as_mut()
    }

    pub fn free(&mut self, idx: usize) {
        if let Some(slot) = self.slots.get_mut(idx) {
            if slot.take().is_some() {
                self.freelist.push(idx);
            }
        }
    }

    pub fn count_active(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn grow(&mut self) {
        let current = self.slots.len();
        if current >= self.max_capacity {
            return;
        }
        let new_cap = if current == 0 { Self::INITIAL_CAPACITY } else { current.saturating_mul(2) }.min(self.max_capacity);
        if new_cap <= current {
            return;
        }
        self.slots.resize_with(new_cap, || None);
        for idx in (current..new_cap).rev() {
            self.freelist.push(idx);
        }
    }
}

impl Default for SlabSocketTable {
    fn default() -> Self {
        Self::empty()
    }
}

pub static SOCKET_TABLE: IrqMutex<SlabSocketTable> = IrqMutex::new(SlabSocketTable::empty());
pub static EPHEMERAL_PORTS: IrqMutex<EphemeralPortAllocator> = IrqMutex::new(EphemeralPortAllocator::new());

#[cfg(test)]
mod tests {
    use super::*;
    use netstack_support::testing::TestResult;
    use netstack_support::{assert_eq_test, assert_test, pass};

    pub fn test_alloc_then_free_recycles_slot() -> TestResult {
        let mut table = SlabSocketTable::new(2, 8);
        let a = table.alloc(SocketKind::Datagram).unwrap();
        table.free(a);
        let b = table.alloc(SocketKind::Datagram).unwrap();
        assert_eq_test!(a, b);
        pass!()
    }

    pub fn test_alloc_beyond_initial_capacity_grows() -> TestResult {
        let mut table = SlabSocketTable::new(1, 8);
        let a = table.alloc(SocketKind::Stream).unwrap();
        let b = table.alloc(SocketKind::Stream).unwrap();
        assert_test!(a != b);
        assert_test!(table.capacity() >= 2);
        pass!()
    }

    pub fn test_grow_is_capped_at_max_capacity() -> TestResult {
        let mut table = SlabSocketTable::new(1, 2);
        table.alloc(SocketKind::Raw);
        table.alloc(SocketKind::Raw);
        assert_eq_test!(table.alloc(SocketKind::Raw), None);
        pass!()
    }

    netstack_support::define_test_suite!(
        socket_table,
        [
            test_alloc_then_free_recycles_slot,
            test_alloc_beyond_initial_capacity_grows,
            test_grow_is_capped_at_max_capacity,
        ]
    );
}
