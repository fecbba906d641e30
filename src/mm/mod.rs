//! Memory management: physical/virtual page pools, the page-table mapper,
//! and the heap arena.
//!
//! Kernel reserves the first 2 MiB of physical memory for itself (the boot
//! area plus the bootstrap page tables below); everything above that is
//! split evenly between the kernel and user frame pools.

pub mod address_space;
pub mod heap;
pub mod page;
pub mod paging;
pub mod pool;

pub use address_space::AddressSpace;
pub use page::{page_align_down, page_align_up, pa_to_pfn, pfn_to_pa, Pfn, PhysAddr, PAGE_SHIFT, PAGE_SIZE};
pub use paging::{PageTable, PteFlags};
pub use pool::{FixedVirtPool, PhysPool, VirtPool};

use crate::lib::error::KernelError;
use spin::Mutex;

pub const KERNEL_RESERVED: u32 = 2 * 1024 * 1024;
pub const KERNEL_VBASE: u32 = 0xC010_0000;

struct Pools {
    kernel_phys: PhysPool,
    user_phys: PhysPool,
    kernel_virt: FixedVirtPool,
}

static POOLS: Mutex<Option<Pools>> = Mutex::new(None);

/// The directory active while no task is running yet (early boot) and the
/// template every new address space's kernel half is copied from.
#[repr(align(4096))]
struct AlignedTable(PageTable);

static mut KERNEL_DIRECTORY: AlignedTable = AlignedTable(PageTable::empty());
/// Identity-maps the first `KERNEL_RESERVED` bytes 1:1; filled once at boot
/// so the transition to paging doesn't fault on the instruction pointer.
static mut BOOT_TABLE: AlignedTable = AlignedTable(PageTable::empty());

/// Split `total_mem_bytes` into kernel/user pools, identity-map the
/// reserved region, and enable paging.
pub fn init(total_mem_bytes: u32) {
    assert!(total_mem_bytes > KERNEL_RESERVED * 2, "not enough memory to boot");

    let remaining = total_mem_bytes - KERNEL_RESERVED;
    let half = remaining / 2;
    let kernel_phys_base = KERNEL_RESERVED;
    let user_phys_base = KERNEL_RESERVED + half;

    let kernel_frames = ((half / PAGE_SIZE as u32) as usize).min(pool::MAX_POOL_PAGES);
    let user_frames =
        (((total_mem_bytes - user_phys_base) / PAGE_SIZE as u32) as usize).min(pool::MAX_POOL_PAGES);
    let kernel_pages = kernel_frames;

    *POOLS.lock() = Some(Pools {
        kernel_phys: PhysPool::new(kernel_phys_base, kernel_frames),
        user_phys: PhysPool::new(user_phys_base, user_frames),
        kernel_virt: FixedVirtPool::new(KERNEL_VBASE, kernel_pages),
    });

    unsafe {
        identity_map_reserved_region();
        load_directory_and_enable_paging();
    }

    crate::kinfo!(
        "mm: {} KiB total, kernel pool {} frames at {:#010x}, user pool {} frames at {:#010x}",
        total_mem_bytes / 1024,
        kernel_frames,
        kernel_phys_base,
        user_frames,
        user_phys_base
    );
}

unsafe fn identity_map_reserved_region() {
    let table = &mut *core::ptr::addr_of_mut!(BOOT_TABLE.0);
    let pages = (KERNEL_RESERVED / PAGE_SIZE as u32) as usize;
    for i in 0..pages.min(paging::ENTRIES_PER_TABLE) {
        let addr = (i * PAGE_SIZE) as u32;
        table.entries[i] = paging_entry_identity(addr);
    }

    let directory = &mut *core::ptr::addr_of_mut!(KERNEL_DIRECTORY.0);
    directory.entries[0] = paging_entry_identity(core::ptr::addr_of!(BOOT_TABLE.0) as u32);
}

fn paging_entry_identity(addr: u32) -> paging::Entry {
    paging::Entry::raw(addr, PteFlags::PRESENT | PteFlags::WRITABLE)
}

unsafe fn load_directory_and_enable_paging() {
    let phys = core::ptr::addr_of!(KERNEL_DIRECTORY.0) as u32;
    core::arch::asm!(
        "mov cr3, {0}",
        "mov {1}, cr0",
        "or {1}, 0x80000000",
        "mov cr0, {1}",
        in(reg) phys,
        out(reg) _,
        options(nostack),
    );
}

pub(crate) fn alloc_pt_frame() -> Result<u32, KernelError> {
    let mut guard = POOLS.lock();
    let pools = guard.as_mut().expect("mm::init not called");
    let frame = pools.kernel_phys.alloc_frame().ok_or(KernelError::Capacity)?;
    unsafe {
        core::ptr::write_bytes(frame as *mut u8, 0, PAGE_SIZE);
    }
    Ok(frame)
}

pub(crate) fn alloc_user_frame() -> Result<u32, KernelError> {
    let mut guard = POOLS.lock();
    let pools = guard.as_mut().expect("mm::init not called");
    pools.user_phys.alloc_frame().ok_or(KernelError::Capacity)
}

pub(crate) fn free_user_frame(paddr: u32) {
    let mut guard = POOLS.lock();
    let pools = guard.as_mut().expect("mm::init not called");
    pools.user_phys.free_frame(paddr);
}

/// Allocate `n` contiguous virtual pages from the kernel pool, back them
/// with physical frames from the kernel frame pool, map them, and zero the
/// region. Fails with `OutOfMemory` if either pool is exhausted.
pub fn alloc_kernel_pages(n: usize) -> Result<u32, KernelError> {
    let vbase = {
        let mut guard = POOLS.lock();
        let pools = guard.as_mut().expect("mm::init not called");
        pools.kernel_virt.alloc_pages(n)?
    };

    let directory = unsafe { &mut *core::ptr::addr_of_mut!(KERNEL_DIRECTORY.0) };
    for i in 0..n {
        let vaddr = vbase + (i * PAGE_SIZE) as u32;
        let paddr = {
            let mut guard = POOLS.lock();
            let pools = guard.as_mut().expect("mm::init not called");
            pools.kernel_phys.alloc_frame().ok_or(KernelError::Capacity)?
        };
        paging::map(directory, vaddr, paddr, PteFlags::WRITABLE)?;
    }
    unsafe {
        core::ptr::write_bytes(vbase as *mut u8, 0, n * PAGE_SIZE);
    }
    Ok(vbase)
}

pub fn free_kernel_pages(vaddr: u32, n: usize) {
    let directory = unsafe { &mut *core::ptr::addr_of_mut!(KERNEL_DIRECTORY.0) };
    let mut guard = POOLS.lock();
    let pools = guard.as_mut().expect("mm::init not called");
    for i in 0..n {
        let va = vaddr + (i * PAGE_SIZE) as u32;
        let pa = paging::v2p(directory, va);
        paging::unmap(directory, va);
        pools.kernel_phys.free_frame(pa);
    }
    pools.kernel_virt.free_pages(vaddr, n);
}

pub fn heap_alloc(size: usize) -> Result<*mut u8, KernelError> {
    heap::heap_alloc(size)
}

pub fn heap_free(ptr: *mut u8) {
    heap::heap_free(ptr)
}

/// Frames currently checked out of the kernel physical pool. Used by leak
/// checks: any balanced sequence of allocs/frees must leave this unchanged.
pub fn kernel_frames_in_use() -> usize {
    let guard = POOLS.lock();
    guard.as_ref().expect("mm::init not called").kernel_phys.frames_in_use()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_region_is_two_mebibytes() {
        assert_eq!(KERNEL_RESERVED, 2 * 1024 * 1024);
    }
}
