//! Physical and virtual page pools.
//!
//! Each pool owns a starting address and a page-granular bitmap; a bit is
//! set iff the corresponding page is currently owned by some mapping. There
//! is no refcounting and no buddy order: every frame/page has exactly one
//! owner, matching the spec's ownership model.
//!
//! The three global pools (`mm::init` builds them before the kernel heap
//! exists) use a fixed-capacity `Bitmap`, so standing them up never touches
//! the allocator. Per-task user pools, built after the heap is already
//! alive, use the heap-backed `DynBitmap` instead since their size depends
//! on the task's address range rather than a compile-time bound.

use crate::lib::error::KernelError;
use crate::util::bitmap::{Bitmap, DynBitmap};
use spin::Mutex;

use super::page::PAGE_SIZE;

/// Upper bound on pages tracked by a single global pool: 256 MiB worth of
/// 4 KiB pages. Memory beyond this per pool is simply left unmanaged.
pub const MAX_POOL_PAGES: usize = 65_536;
const WORDS: usize = MAX_POOL_PAGES / 32;

pub struct PhysPool {
    base: u32,
    capacity: usize,
    bitmap: Mutex<Bitmap<WORDS>>,
}

impl PhysPool {
    pub fn new(base: u32, frame_count: usize) -> Self {
        assert!(frame_count <= MAX_POOL_PAGES, "pool exceeds fixed bitmap capacity");
        let mut bitmap = Bitmap::new();
        bitmap.set_range(frame_count, MAX_POOL_PAGES - frame_count);
        Self { base, capacity: frame_count, bitmap: Mutex::new(bitmap) }
    }

    pub fn alloc_frame(&self) -> Option<u32> {
        let mut bm = self.bitmap.lock();
        let bit = bm.find_clear_run(1, 0)?;
        bm.set(bit);
        Some(self.base + (bit * PAGE_SIZE) as u32)
    }

    pub fn free_frame(&self, paddr: u32) {
        let bit = ((paddr - self.base) as usize) / PAGE_SIZE;
        debug_assert!(bit < self.capacity);
        self.bitmap.lock().clear(bit);
    }

    pub fn frames_in_use(&self) -> usize {
        self.bitmap.lock().count_set() - (MAX_POOL_PAGES - self.capacity)
    }
}

pub struct FixedVirtPool {
    base: u32,
    capacity: usize,
    bitmap: Mutex<Bitmap<WORDS>>,
}

impl FixedVirtPool {
    pub fn new(base: u32, page_count: usize) -> Self {
        assert!(page_count <= MAX_POOL_PAGES, "pool exceeds fixed bitmap capacity");
        let mut bitmap = Bitmap::new();
        bitmap.set_range(page_count, MAX_POOL_PAGES - page_count);
        Self { base, capacity: page_count, bitmap: Mutex::new(bitmap) }
    }

    pub fn alloc_pages(&self, n: usize) -> Result<u32, KernelError> {
        let mut bm = self.bitmap.lock();
        let start = bm.find_clear_run(n, 0).ok_or(KernelError::Capacity)?;
        bm.set_range(start, n);
        Ok(self.base + (start * PAGE_SIZE) as u32)
    }

    pub fn free_pages(&self, vaddr: u32, n: usize) {
        let start = ((vaddr - self.base) as usize) / PAGE_SIZE;
        debug_assert!(start + n <= self.capacity);
        self.bitmap.lock().clear_range(start, n);
    }

    pub fn pages_in_use(&self) -> usize {
        self.bitmap.lock().count_set() - (MAX_POOL_PAGES - self.capacity)
    }
}

/// A per-task user virtual-address range, allocated in contiguous runs.
/// Each user task owns one, starting at `0x08048000` (`mm::address_space`).
pub struct VirtPool {
    base: u32,
    bitmap: Mutex<DynBitmap>,
}

impl VirtPool {
    pub fn new(base: u32, page_count: usize) -> Self {
        Self { base, bitmap: Mutex::new(DynBitmap::new(page_count)) }
    }

    pub fn alloc_pages(&self, n: usize) -> Result<u32, KernelError> {
        let mut bm = self.bitmap.lock();
        let start = bm.find_clear_run(n, 0).ok_or(KernelError::Capacity)?;
        bm.set_range(start, n);
        Ok(self.base + (start * PAGE_SIZE) as u32)
    }

    pub fn free_pages(&self, vaddr: u32, n: usize) {
        let start = ((vaddr - self.base) as usize) / PAGE_SIZE;
        self.bitmap.lock().clear_range(start, n);
    }

    pub fn pages_in_use(&self) -> usize {
        self.bitmap.lock().count_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phys_pool_alloc_free_roundtrip() {
        let pool = PhysPool::new(0x0010_0000, 16);
        let a = pool.alloc_frame().unwrap();
        let b = pool.alloc_frame().unwrap();
        assert_ne!(a, b);
        assert_eq!(pool.frames_in_use(), 2);
        pool.free_frame(a);
        pool.free_frame(b);
        assert_eq!(pool.frames_in_use(), 0);
    }

    #[test]
    fn phys_pool_respects_capacity_bound() {
        let pool = PhysPool::new(0x0010_0000, 2);
        assert!(pool.alloc_frame().is_some());
        assert!(pool.alloc_frame().is_some());
        assert!(pool.alloc_frame().is_none());
    }

    #[test]
    fn fixed_virt_pool_contiguous_alloc() {
        let pool = FixedVirtPool::new(0xC010_0000, 8);
        let v = pool.alloc_pages(3).unwrap();
        assert_eq!(v, 0xC010_0000);
        assert_eq!(pool.pages_in_use(), 3);
        pool.free_pages(v, 3);
        assert_eq!(pool.pages_in_use(), 0);
    }

    #[test]
    fn virt_pool_contiguous_alloc() {
        let pool = VirtPool::new(0xC010_0000, 8);
        let v = pool.alloc_pages(3).unwrap();
        assert_eq!(v, 0xC010_0000);
        assert_eq!(pool.pages_in_use(), 3);
        pool.free_pages(v, 3);
        assert_eq!(pool.pages_in_use(), 0);
    }

    #[test]
    fn exhaustion_returns_capacity_error() {
        let pool = VirtPool::new(0xC010_0000, 2);
        assert!(pool.alloc_pages(3).is_err());
    }
}
