//! Fixed-capacity pool of refcounted data pages backing every [`super::NetBuffer`]
//! node.
//!
//! Allocation is a lock-free Treiber stack, same discipline as the rest of
//! this stack's hot-path allocators: a tagged `(version, index)` head avoids
//! the ABA problem across concurrent `alloc`/`release` races. What's new
//! here relative to a plain packet-buffer pool is the refcount array sitting
//! alongside the freelist — a page stays allocated as long as any
//! [`DataHeader`] clone references it, which is what lets [`super::NetBuffer`]
//! hand out cheap, zero-copy duplicates.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

pub const PAGE_SIZE: usize = 2048;
const POOL_SIZE: usize = 512;
const FREELIST_EMPTY: u16 = u16::MAX;

#[repr(C, align(64))]
struct PoolStorage {
    pages: UnsafeCell<[[u8; PAGE_SIZE]; POOL_SIZE]>,
}

unsafe impl Sync for PoolStorage {}

static POOL_STORAGE: PoolStorage = PoolStorage { pages: UnsafeCell::new([[0; PAGE_SIZE]; POOL_SIZE]) };

struct DataPagePool {
    head: AtomicU32,
    next: [AtomicU16; POOL_SIZE],
    refcount: [AtomicU16; POOL_SIZE],
    initialized: AtomicBool,
}

impl DataPagePool {
    const fn new() -> Self {
        const ZERO: AtomicU16 = AtomicU16::new(0);
        Self {
            head: AtomicU32::new(0),
            next: [ZERO; POOL_SIZE],
            refcount: [ZERO; POOL_SIZE],
            initialized: AtomicBool::new(false),
        }
    }

    fn ensure_init(&self) {
        if self.initialized.load(Ordering::Acquire) {
            return;
        }
        for i in 0..POOL_SIZE {
            let next = if i + 1 < POOL_SIZE { (i + 1) as u16 } else { FREELIST_EMPTY };
            self.next[i].store(next, Ordering::Relaxed);
        }
        self.head.store(0u32 << 16 | 0, Ordering::Release);
        self.initialized.store(true, Ordering::Release);
    }

    fn alloc(&self) -> Option<u16> {
        self.ensure_init();
        loop {
            let head = self.head.load(Ordering::Acquire);
            let index = (head & 0xFFFF) as u16;
            if index == FREELIST_EMPTY {
                return None;
            }
            let version = head >> 16;
            let next = self.next[index as usize].load(Ordering::Relaxed);
            let new_head = (version.wrapping_add(1)) << 16 | next as u32;
            if self
                .head
                .compare_exchange_weak(head, new_head, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.refcount[index as usize].store(1, Ordering::Release);
                return Some(index);
            }
        }
    }

    fn release(&self, slot: u16) {
        loop {
            let head = self.head.load(Ordering::Acquire);
            let version = head >> 16;
            self.next[slot as usize].store((head & 0xFFFF) as u16, Ordering::Relaxed);
            let new_head = (version.wrapping_add(1)) << 16 | slot as u32;
            if self
                .head
                .compare_exchange_weak(head, new_head, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
        }
    }

    fn retain(&self, slot: u16) {
        self.refcount[slot as usize].fetch_add(1, Ordering::Relaxed);
    }

    fn drop_ref(&self, slot: u16) {
        if self.refcount[slot as usize].fetch_sub(1, Ordering::AcqRel) == 1 {
            self.release(slot);
        }
    }

    fn is_shared(&self, slot: u16) -> bool {
        self.refcount[slot as usize].load(Ordering::Acquire) > 1
    }

    fn slot_ptr(&self, slot: u16) -> *mut u8 {
        unsafe { (*POOL_STORAGE.pages.get())[slot as usize].as_mut_ptr() }
    }

    fn available(&self) -> usize {
        self.ensure_init();
        let mut count = 0;
        let head = self.head.load(Ordering::Acquire);
        let mut index = (head & 0xFFFF) as u16;
        while index != FREELIST_EMPTY {
            count += 1;
            index = self.next[index as usize].load(Ordering::Relaxed);
        }
        count
    }
}

static PAGE_POOL: DataPagePool = DataPagePool::new();

/// A refcounted handle to one 2KiB page in the pool. Cloning bumps the
/// refcount instead of copying bytes — callers that need to mutate a shared
/// page must copy-on-write first via [`DataHeader::make_unique`].
pub struct DataHeader {
    slot: u16,
}

impl DataHeader {
    /// Allocate a fresh, exclusively-owned page. Returns `None` if the pool
    /// is exhausted.
    pub fn alloc() -> Option<Self> {
        PAGE_POOL.alloc().map(|slot| Self { slot })
    }

    pub fn is_shared(&self) -> bool {
        PAGE_POOL.is_shared(self.slot)
    }

    pub fn as_slice(&self) -> &[u8; PAGE_SIZE] {
        unsafe { &*(PAGE_POOL.slot_ptr(self.slot) as *const [u8; PAGE_SIZE]) }
    }

    /// Mutable access. Callers must have already established exclusive
    /// ownership (refcount == 1) via [`DataHeader::make_unique`] before
    /// calling this on bytes another node might still be reading.
    pub fn as_mut_slice(&mut self) -> &mut [u8; PAGE_SIZE] {
        unsafe { &mut *(PAGE_POOL.slot_ptr(self.slot) as *mut [u8; PAGE_SIZE]) }
    }

    /// Ensure this handle is the page's sole owner, copying the contents
    /// into a freshly allocated page first if not. Returns `Err` if the
    /// pool is exhausted and a copy was required.
    pub fn make_unique(&mut self) -> Result<(), ()> {
        if !self.is_shared() {
            return Ok(());
        }
        let Some(mut fresh) = DataHeader::alloc() else {
            return Err(());
        };
        fresh.as_mut_slice().copy_from_slice(self.as_slice());
        PAGE_POOL.drop_ref(self.slot);
        self.slot = fresh.slot;
        core::mem::forget(fresh);
        Ok(())
    }

    pub fn available_pages() -> usize {
        PAGE_POOL.available()
    }
}

impl Clone for DataHeader {
    fn clone(&self) -> Self {
        PAGE_POOL.retain(self.slot);
        Self { slot: self.slot }
    }
}

impl Drop for DataHeader {
    fn drop(&mut self) {
        PAGE_POOL.drop_ref(self.slot);
    }
}

unsafe impl Send for DataHeader {}
unsafe impl Sync for DataHeader {}
