//! Global Descriptor Table: flat kernel/user code+data segments plus the TSS.
//!
//! Segmentation mechanics beyond a flat ring0/ring3 split are out of scope
//! for this kernel, so the table is built once at boot and never touched
//! again except for `set_kernel_stack`, which patches TSS.esp0 on every
//! context switch.
//!
//! ```text
//! Index  Segment          DPL  Selector
//! -----  ---------------  ---  --------
//! 0      Null             -    0x00
//! 1      Kernel code      0    0x08
//! 2      Kernel data      0    0x10
//! 3      User code        3    0x1B
//! 4      User data        3    0x23
//! 5      TSS              0    0x28
//! ```

use super::tss::Tss;
use core::arch::asm;
use core::mem::size_of;

pub const KERNEL_CODE_SELECTOR: u16 = 0x08;
pub const KERNEL_DATA_SELECTOR: u16 = 0x10;
pub const USER_CODE_SELECTOR: u16 = 0x18 | 3;
pub const USER_DATA_SELECTOR: u16 = 0x20 | 3;
pub const TSS_SELECTOR: u16 = 0x28;

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct GdtEntry {
    limit_low: u16,
    base_low: u16,
    base_mid: u8,
    access: u8,
    granularity: u8,
    base_high: u8,
}

impl GdtEntry {
    const fn null() -> Self {
        Self { limit_low: 0, base_low: 0, base_mid: 0, access: 0, granularity: 0, base_high: 0 }
    }

    /// A flat (base 0, limit 4 GiB) segment with 4 KiB granularity.
    const fn flat(access: u8) -> Self {
        Self {
            limit_low: 0xFFFF,
            base_low: 0,
            base_mid: 0,
            access,
            granularity: 0xCF,
            base_high: 0,
        }
    }

    fn tss(base: u32, limit: u32) -> Self {
        Self {
            limit_low: (limit & 0xFFFF) as u16,
            base_low: (base & 0xFFFF) as u16,
            base_mid: ((base >> 16) & 0xFF) as u8,
            access: 0x89, // present, ring0, 32-bit TSS (available)
            granularity: ((limit >> 16) & 0x0F) as u8,
            base_high: ((base >> 24) & 0xFF) as u8,
        }
    }
}

#[repr(C, packed)]
struct GdtPointer {
    limit: u16,
    base: u32,
}

const ENTRY_COUNT: usize = 6;

static mut GDT: [GdtEntry; ENTRY_COUNT] = [GdtEntry::null(); ENTRY_COUNT];
static mut TSS: Tss = Tss::new();

/// Build the GDT, load it, reload every segment register, and load the TSS.
///
/// Relies on the bootloader having already entered 32-bit protected mode
/// with CS pointing at a flat code segment at the same index (0x08) this
/// table assigns the kernel code segment, so no far jump is needed to
/// reload CS.
///
/// # Safety
/// Must run exactly once, very early in boot, with interrupts disabled.
pub unsafe fn init() {
    GDT[0] = GdtEntry::null();
    GDT[1] = GdtEntry::flat(0x9A); // kernel code: present, ring0, exec/read
    GDT[2] = GdtEntry::flat(0x92); // kernel data: present, ring0, read/write
    GDT[3] = GdtEntry::flat(0xFA); // user code: present, ring3, exec/read
    GDT[4] = GdtEntry::flat(0xF2); // user data: present, ring3, read/write
    GDT[5] = GdtEntry::tss(core::ptr::addr_of!(TSS) as u32, (size_of::<Tss>() - 1) as u32);

    let ptr = GdtPointer {
        limit: (size_of::<[GdtEntry; ENTRY_COUNT]>() - 1) as u16,
        base: GDT.as_ptr() as u32,
    };

    asm!(
        "lgdt [{0}]",
        "mov ax, {1:x}",
        "mov ds, ax",
        "mov es, ax",
        "mov fs, ax",
        "mov gs, ax",
        "mov ss, ax",
        "ltr {2:x}",
        in(reg) &ptr,
        in(reg) KERNEL_DATA_SELECTOR,
        in(reg) TSS_SELECTOR,
        out("ax") _,
    );
}

/// Update TSS.esp0 so the next ring3->ring0 transition lands on `stack_top`.
pub fn set_kernel_stack(stack_top: u32) {
    unsafe {
        TSS.esp0 = stack_top;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_match_table_layout() {
        assert_eq!(KERNEL_CODE_SELECTOR, 0x08);
        assert_eq!(KERNEL_DATA_SELECTOR, 0x10);
        assert_eq!(USER_CODE_SELECTOR & !0x3, 0x18);
        assert_eq!(USER_DATA_SELECTOR & !0x3, 0x20);
        assert_eq!(TSS_SELECTOR, 0x28);
    }
}
