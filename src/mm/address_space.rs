//! Per-task user address space: a private page directory plus a private
//! virtual-page pool. There is no VMA list; a task's entire user range is
//! one pool, and pages are mapped eagerly on allocation (no demand paging,
//! no copy-on-write).

use super::page::PAGE_SIZE;
use super::paging::{self, PageTable, PteFlags};
use super::pool::VirtPool;
use crate::lib::error::KernelError;

pub const USER_VBASE: u32 = 0x0804_8000;
pub const USER_VTOP: u32 = 0xC000_0000 - PAGE_SIZE as u32;

pub struct AddressSpace {
    directory: *mut PageTable,
    directory_phys: u32,
    pool: VirtPool,
}

unsafe impl Send for AddressSpace {}

impl AddressSpace {
    /// Allocate a fresh page directory from the kernel pool and a private
    /// user virtual pool spanning `USER_VBASE..USER_VTOP`.
    pub fn new() -> Result<Self, KernelError> {
        let dir_phys = super::alloc_pt_frame()?;
        let directory = dir_phys as *mut PageTable;
        unsafe {
            directory.write(PageTable::empty());
        }
        let page_count = ((USER_VTOP - USER_VBASE) / PAGE_SIZE as u32) as usize;
        Ok(Self { directory, directory_phys: dir_phys, pool: VirtPool::new(USER_VBASE, page_count) })
    }

    pub fn directory_phys(&self) -> u32 {
        self.directory_phys
    }

    fn directory_mut(&mut self) -> &mut PageTable {
        unsafe { &mut *self.directory }
    }

    /// Allocate `n` contiguous user pages, backing each with a freshly
    /// zeroed frame from the kernel's physical pool, and map them
    /// present | writable | user.
    pub fn alloc_pages(&mut self, n: usize) -> Result<u32, KernelError> {
        let vbase = self.pool.alloc_pages(n)?;
        for i in 0..n {
            let vaddr = vbase + (i * PAGE_SIZE) as u32;
            let paddr = super::alloc_user_frame()?;
            unsafe {
                core::ptr::write_bytes(paddr as *mut u8, 0, PAGE_SIZE);
            }
            paging::map(
                self.directory_mut(),
                vaddr,
                paddr,
                PteFlags::WRITABLE | PteFlags::USER,
            )?;
        }
        Ok(vbase)
    }

    pub fn free_pages(&mut self, vaddr: u32, n: usize) {
        for i in 0..n {
            let va = vaddr + (i * PAGE_SIZE) as u32;
            let pa = paging::v2p(self.directory_mut(), va);
            paging::unmap(self.directory_mut(), va);
            super::free_user_frame(pa);
        }
        self.pool.free_pages(vaddr, n);
    }

    pub fn v2p(&self, vaddr: u32) -> u32 {
        paging::v2p(unsafe { &*self.directory }, vaddr)
    }
}

impl super::heap::PageSource for AddressSpace {
    fn alloc_pages(&mut self, n: usize) -> Result<u32, KernelError> {
        AddressSpace::alloc_pages(self, n)
    }
    fn free_pages(&mut self, vaddr: u32, n: usize) {
        AddressSpace::free_pages(self, vaddr, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_range_fits_below_kernel_split() {
        assert!(USER_VBASE < USER_VTOP);
        assert!(USER_VTOP < 0xC000_0000);
    }
}
