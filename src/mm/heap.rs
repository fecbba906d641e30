//! Heap arena: fixed size-class allocator for small requests, contiguous
//! page runs for large ones.
//!
//! Every heap page starts with an arena header; the owning arena for any
//! block is recovered by masking the block's address down to a page
//! boundary. Free objects are threaded through themselves (the technique
//! the slab cache used), so there is no separate metadata array.
//!
//! An `Arena` is generic over where its backing pages come from, through
//! `PageSource`: the kernel heap draws from the global kernel pool, while
//! each task's user heap draws from that task's own address space, but
//! both share the same class/block bookkeeping.

use super::page::PAGE_SIZE;
use crate::lib::error::KernelError;
use core::alloc::{GlobalAlloc, Layout};
use core::ptr::NonNull;
use spin::Mutex;

const SIZE_CLASSES: [usize; 7] = [16, 32, 64, 128, 256, 512, 1024];
const LARGE_THRESHOLD: usize = 1024;

#[repr(C)]
struct ArenaHeader {
    descriptor: u8,
    count: u32,
    large: bool,
}

struct FreeBlock {
    next: Option<NonNull<FreeBlock>>,
}

struct ClassFreeList {
    head: Option<NonNull<FreeBlock>>,
}

unsafe impl Send for ClassFreeList {}

impl ClassFreeList {
    const fn new() -> Self {
        Self { head: None }
    }
}

fn class_for(size: usize) -> Option<usize> {
    SIZE_CLASSES.iter().position(|&c| size <= c)
}

fn blocks_per_arena(block_size: usize) -> u32 {
    ((PAGE_SIZE - core::mem::size_of::<ArenaHeader>()) / block_size) as u32
}

fn arena_of(ptr: *mut u8) -> *mut ArenaHeader {
    ((ptr as usize) & !(PAGE_SIZE - 1)) as *mut ArenaHeader
}

/// Where an arena's backing pages come from: the global kernel pool for
/// `kernel_heap_alloc`, or a task's private address space for its user heap.
pub trait PageSource {
    fn alloc_pages(&mut self, n: usize) -> Result<u32, KernelError>;
    fn free_pages(&mut self, vaddr: u32, n: usize);
}

/// A size-class arena plus a large-allocation path. Holds no lock of its
/// own; callers that share an `Arena` across interrupt context (the kernel
/// heap) wrap it in a `Mutex` and disable interrupts around each call.
pub struct Arena {
    classes: [ClassFreeList; 7],
}

impl Arena {
    pub const fn new() -> Self {
        Self {
            classes: [
                ClassFreeList::new(),
                ClassFreeList::new(),
                ClassFreeList::new(),
                ClassFreeList::new(),
                ClassFreeList::new(),
                ClassFreeList::new(),
                ClassFreeList::new(),
            ],
        }
    }

    fn grow_class(&mut self, class_idx: usize, source: &mut impl PageSource) -> Result<(), KernelError> {
        let block_size = SIZE_CLASSES[class_idx];
        let vaddr = source.alloc_pages(1)?;
        let header_size = core::mem::size_of::<ArenaHeader>();
        let count = blocks_per_arena(block_size);

        unsafe {
            (vaddr as *mut ArenaHeader).write(ArenaHeader { descriptor: class_idx as u8, count, large: false });
        }

        let base = vaddr as usize + header_size;
        let mut head = self.classes[class_idx].head;
        for i in (0..count as usize).rev() {
            let block_ptr = (base + i * block_size) as *mut FreeBlock;
            unsafe {
                block_ptr.write(FreeBlock { next: head });
            }
            head = NonNull::new(block_ptr);
        }
        self.classes[class_idx].head = head;
        Ok(())
    }

    /// Choose a size-class (or the large path for >1024 B), growing the
    /// arena if its free list is empty, and return a block.
    pub fn alloc(&mut self, size: usize, source: &mut impl PageSource) -> Result<*mut u8, KernelError> {
        if size > LARGE_THRESHOLD {
            return self.alloc_large(size, source);
        }
        let class_idx = class_for(size.max(1)).expect("size within small range");
        if self.classes[class_idx].head.is_none() {
            self.grow_class(class_idx, source)?;
        }
        let block = self.classes[class_idx].head.take().expect("grown class has a block");
        self.classes[class_idx].head = unsafe { block.as_ref().next };
        let arena = arena_of(block.as_ptr() as *mut u8);
        unsafe {
            (*arena).count -= 1;
        }
        Ok(block.as_ptr() as *mut u8)
    }

    fn alloc_large(&mut self, size: usize, source: &mut impl PageSource) -> Result<*mut u8, KernelError> {
        let header_size = core::mem::size_of::<ArenaHeader>();
        let pages = (size + header_size + PAGE_SIZE - 1) / PAGE_SIZE;
        let vaddr = source.alloc_pages(pages)?;
        unsafe {
            (vaddr as *mut ArenaHeader).write(ArenaHeader { descriptor: 0, count: pages as u32, large: true });
        }
        Ok((vaddr as usize + header_size) as *mut u8)
    }

    /// Recover the owning arena by page-align mask. Large allocations free
    /// their page run; small ones push the block back and free the page
    /// once every block in the arena has returned.
    pub fn free(&mut self, ptr: *mut u8, source: &mut impl PageSource) {
        let arena = arena_of(ptr);
        let header = unsafe { &*arena };
        if header.large {
            source.free_pages(arena as u32, header.count as usize);
            return;
        }

        let class_idx = header.descriptor as usize;
        let block_size = SIZE_CLASSES[class_idx];
        let total = blocks_per_arena(block_size);

        let block = ptr as *mut FreeBlock;
        unsafe {
            block.write(FreeBlock { next: self.classes[class_idx].head });
        }
        self.classes[class_idx].head = NonNull::new(block);

        let header_mut = unsafe { &mut *arena };
        header_mut.count += 1;
        if header_mut.count == total {
            self.unlink_arena(class_idx, arena as usize, block_size, total);
            source.free_pages(arena as u32, 1);
        }
    }

    /// Walk `class`'s free list removing every block that belongs to
    /// `arena`, just before the backing page is returned to the source.
    fn unlink_arena(&mut self, class_idx: usize, arena: usize, block_size: usize, total: u32) {
        let header_size = core::mem::size_of::<ArenaHeader>();
        let base = arena + header_size;
        let in_arena = |p: usize| p >= base && p < base + total as usize * block_size;

        let mut cursor = &mut self.classes[class_idx].head;
        while let Some(node) = *cursor {
            if in_arena(node.as_ptr() as usize) {
                let next = unsafe { node.as_ref().next };
                *cursor = next;
            } else {
                cursor = unsafe { &mut (*cursor.unwrap().as_ptr()).next };
            }
        }
    }
}

struct KernelPageSource;

impl PageSource for KernelPageSource {
    fn alloc_pages(&mut self, n: usize) -> Result<u32, KernelError> {
        crate::mm::alloc_kernel_pages(n)
    }
    fn free_pages(&mut self, vaddr: u32, n: usize) {
        crate::mm::free_kernel_pages(vaddr, n)
    }
}

static KERNEL_ARENA: Mutex<Arena> = Mutex::new(Arena::new());

/// Kernel-internal allocations (inodes, page tables, buffer pages) that
/// must not be attributed to whichever task happens to be running.
pub fn kernel_heap_alloc(size: usize) -> Result<*mut u8, KernelError> {
    let saved = crate::arch::x86::intr::disable();
    let mut arena = KERNEL_ARENA.lock();
    let result = arena.alloc(size, &mut KernelPageSource);
    crate::arch::x86::intr::set(saved);
    result
}

pub fn kernel_heap_free(ptr: *mut u8) {
    let saved = crate::arch::x86::intr::disable();
    KERNEL_ARENA.lock().free(ptr, &mut KernelPageSource);
    crate::arch::x86::intr::set(saved);
}

pub fn heap_alloc(size: usize) -> Result<*mut u8, KernelError> {
    kernel_heap_alloc(size)
}

pub fn heap_free(ptr: *mut u8) {
    kernel_heap_free(ptr)
}

pub struct KernelHeap;

unsafe impl GlobalAlloc for KernelHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        kernel_heap_alloc(layout.size()).unwrap_or(core::ptr::null_mut())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        kernel_heap_free(ptr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;
    use alloc::vec::Vec;

    #[test]
    fn class_for_rounds_up() {
        assert_eq!(class_for(1), Some(0));
        assert_eq!(class_for(16), Some(0));
        assert_eq!(class_for(17), Some(1));
        assert_eq!(class_for(1024), Some(6));
        assert_eq!(class_for(1025), None);
    }

    #[test]
    fn blocks_per_arena_leaves_room_for_header() {
        let header = core::mem::size_of::<ArenaHeader>();
        assert_eq!(blocks_per_arena(16), ((PAGE_SIZE - header) / 16) as u32);
    }

    /// Hands out pages from the host heap instead of the kernel physical
    /// pool, so `Arena` can be exercised without `intr::disable()` or real
    /// paging. Tracks how many pages are currently checked out the same
    /// way `mm::kernel_frames_in_use` does for the real pool.
    struct MockPageSource {
        live: Vec<Box<[u8; PAGE_SIZE]>>,
    }

    impl MockPageSource {
        fn new() -> Self {
            Self { live: Vec::new() }
        }

        fn pages_in_use(&self) -> usize {
            self.live.len()
        }
    }

    impl PageSource for MockPageSource {
        fn alloc_pages(&mut self, n: usize) -> Result<u32, KernelError> {
            assert_eq!(n, 1, "arena never grows by more than one page at a time for small classes");
            let page: Box<[u8; PAGE_SIZE]> = Box::new([0u8; PAGE_SIZE]);
            let addr = page.as_ptr() as u32;
            self.live.push(page);
            Ok(addr)
        }

        fn free_pages(&mut self, vaddr: u32, n: usize) {
            assert_eq!(n, 1);
            let idx = self.live.iter().position(|p| p.as_ptr() as u32 == vaddr).expect("freed unknown page");
            self.live.remove(idx);
        }
    }

    #[test]
    fn arena_round_trip_returns_same_class() {
        let mut arena = Arena::new();
        let mut source = MockPageSource::new();
        let block = arena.alloc(100, &mut source).unwrap();
        assert_eq!(source.pages_in_use(), 1);
        arena.free(block, &mut source);
        assert_eq!(source.pages_in_use(), 0, "last block freed should release the arena's page");
    }

    #[test]
    fn arena_large_allocation_spans_multiple_pages() {
        let mut arena = Arena::new();
        let mut source = MockPageSource::new();
        let block = arena.alloc(5000, &mut source).unwrap();
        assert!(source.pages_in_use() >= 2);
        arena.free(block, &mut source);
        assert_eq!(source.pages_in_use(), 0);
    }

    /// Mirrors the kernel's own heap-stress scenario: repeated
    /// alloc(128)/alloc(256)/alloc(512)/free-all leaves zero pages checked
    /// out once every cycle completes.
    #[test]
    fn heap_stress_leaves_no_pages_leaked() {
        let mut arena = Arena::new();
        let mut source = MockPageSource::new();
        for _ in 0..1000 {
            let a = arena.alloc(128, &mut source).unwrap();
            let b = arena.alloc(256, &mut source).unwrap();
            let c = arena.alloc(512, &mut source).unwrap();
            arena.free(a, &mut source);
            arena.free(b, &mut source);
            arena.free(c, &mut source);
        }
        assert_eq!(source.pages_in_use(), 0);
    }
}
