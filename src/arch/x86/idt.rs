//! Interrupt Descriptor Table: exceptions 0x00-0x1F, hardware IRQs
//! 0x20-0x2F (PIC-remapped), and the software syscall gate at 0x80.
//!
//! Each vector gets a tiny naked assembly stub (`isr0`..`isr47`, `isr128`)
//! that normalizes the stack into a `TrapFrame` — pushing a dummy error
//! code for vectors the CPU doesn't supply one for — then jumps to a single
//! shared `isr_common` trampoline that calls into Rust.

use super::gdt::KERNEL_CODE_SELECTOR;
use super::trapframe::TrapFrame;
use core::arch::global_asm;

pub const VECTOR_PAGE_FAULT: u8 = 0x0E;
pub const VECTOR_TIMER: u8 = 0x20;
pub const VECTOR_KEYBOARD: u8 = 0x21;
pub const VECTOR_IDE_PRIMARY: u8 = 0x2E;
pub const VECTOR_IDE_SECONDARY: u8 = 0x2F;
pub const VECTOR_SYSCALL: u8 = 0x80;

const IRQ_COUNT: usize = 48; // vectors 0x00-0x2F
const SYSCALL_SLOT: usize = IRQ_COUNT;
const STUB_COUNT: usize = IRQ_COUNT + 1;

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct IdtEntry {
    offset_low: u16,
    selector: u16,
    zero: u8,
    type_attr: u8,
    offset_high: u16,
}

impl IdtEntry {
    const fn missing() -> Self {
        Self { offset_low: 0, selector: 0, zero: 0, type_attr: 0, offset_high: 0 }
    }

    fn new(handler: u32, type_attr: u8) -> Self {
        Self {
            offset_low: (handler & 0xFFFF) as u16,
            selector: KERNEL_CODE_SELECTOR,
            zero: 0,
            type_attr,
            offset_high: ((handler >> 16) & 0xFFFF) as u16,
        }
    }
}

#[repr(C, packed)]
struct IdtPointer {
    limit: u16,
    base: u32,
}

const GATE_INTERRUPT_RING0: u8 = 0x8E; // present, ring0, 32-bit interrupt gate
const GATE_INTERRUPT_RING3: u8 = 0xEE; // present, ring3, 32-bit interrupt gate (syscall)

static mut IDT: [IdtEntry; 256] = [IdtEntry::missing(); 256];

pub type Handler = fn(&mut TrapFrame);

static mut HANDLERS: [Option<Handler>; 256] = [None; 256];

extern "C" {
    static isr_stub_table: [u32; STUB_COUNT];
}

/// Register `handler` for `vector`. Must be called before `init()` enables
/// the corresponding PIC line (or, for 0x80, before any task can trap in).
pub fn register_handler(vector: u8, handler: Handler) {
    unsafe {
        HANDLERS[vector as usize] = Some(handler);
    }
}

/// Build and load the IDT.
///
/// # Safety
/// Must run once during boot, after the GDT is loaded.
pub unsafe fn init() {
    for vector in 0..IRQ_COUNT {
        IDT[vector] = IdtEntry::new(isr_stub_table[vector], GATE_INTERRUPT_RING0);
    }
    IDT[VECTOR_SYSCALL as usize] =
        IdtEntry::new(isr_stub_table[SYSCALL_SLOT], GATE_INTERRUPT_RING3);

    let ptr = IdtPointer {
        limit: (core::mem::size_of::<[IdtEntry; 256]>() - 1) as u16,
        base: IDT.as_ptr() as u32,
    };
    core::arch::asm!("lidt [{0}]", in(reg) &ptr);
}

/// Called from `isr_common` with a pointer to the frame built on the
/// kernel stack. Dispatches to a registered handler, or a default that
/// panics with the vector/error code (mirroring the spec's PANIC-on-
/// unexpected-trap policy).
#[no_mangle]
extern "C" fn common_interrupt_handler(frame: *mut TrapFrame) {
    let frame = unsafe { &mut *frame };
    let vector = frame.vector as u8;
    let handler = unsafe { HANDLERS[vector as usize] };
    match handler {
        Some(h) => h(frame),
        None => default_handler(frame),
    }
}

fn default_handler(frame: &mut TrapFrame) {
    if frame.vector as u8 == VECTOR_PAGE_FAULT {
        let fault_addr = read_cr2();
        crate::PANIC!(&alloc::format!(
            "unhandled page fault at {:#010x} (error={:#x})",
            fault_addr,
            frame.error_code
        ));
    }
    crate::PANIC!(&alloc::format!(
        "unhandled trap vector {:#04x} (error={:#x}) at eip={:#010x}",
        frame.vector,
        frame.error_code,
        frame.eip
    ));
}

fn read_cr2() -> u32 {
    let value: u32;
    unsafe {
        core::arch::asm!("mov {0}, cr2", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

macro_rules! isr_noerr {
    ($n:literal) => {
        concat!("isr", $n, ":\n", "push dword 0\n", "push dword ", $n, "\n", "jmp isr_common\n")
    };
}

macro_rules! isr_err {
    ($n:literal) => {
        concat!("isr", $n, ":\n", "push dword ", $n, "\n", "jmp isr_common\n")
    };
}

global_asm!(
    ".intel_syntax noprefix",
    ".text",
    isr_noerr!(0), isr_noerr!(1), isr_noerr!(2), isr_noerr!(3),
    isr_noerr!(4), isr_noerr!(5), isr_noerr!(6), isr_noerr!(7),
    isr_err!(8),
    isr_noerr!(9),
    isr_err!(10), isr_err!(11), isr_err!(12), isr_err!(13), isr_err!(14),
    isr_noerr!(15), isr_noerr!(16),
    isr_err!(17),
    isr_noerr!(18), isr_noerr!(19), isr_noerr!(20), isr_noerr!(21),
    isr_noerr!(22), isr_noerr!(23), isr_noerr!(24), isr_noerr!(25),
    isr_noerr!(26), isr_noerr!(27), isr_noerr!(28), isr_noerr!(29),
    isr_noerr!(30), isr_noerr!(31),
    isr_noerr!(32), isr_noerr!(33), isr_noerr!(34), isr_noerr!(35),
    isr_noerr!(36), isr_noerr!(37), isr_noerr!(38), isr_noerr!(39),
    isr_noerr!(40), isr_noerr!(41), isr_noerr!(42), isr_noerr!(43),
    isr_noerr!(44), isr_noerr!(45), isr_noerr!(46), isr_noerr!(47),
    isr_noerr!(128),
    "isr_common:",
    "pusha",
    "push ds",
    "push es",
    "push fs",
    "push gs",
    "mov ax, 0x10",
    "mov ds, ax",
    "mov es, ax",
    "mov fs, ax",
    "mov gs, ax",
    "push esp",
    "call common_interrupt_handler",
    "add esp, 4",
    "pop gs",
    "pop fs",
    "pop es",
    "pop ds",
    "popa",
    "add esp, 8",
    "iretd",
    ".section .rodata",
    ".global isr_stub_table",
    "isr_stub_table:",
    ".long isr0", ".long isr1", ".long isr2", ".long isr3",
    ".long isr4", ".long isr5", ".long isr6", ".long isr7",
    ".long isr8", ".long isr9", ".long isr10", ".long isr11",
    ".long isr12", ".long isr13", ".long isr14", ".long isr15",
    ".long isr16", ".long isr17", ".long isr18", ".long isr19",
    ".long isr20", ".long isr21", ".long isr22", ".long isr23",
    ".long isr24", ".long isr25", ".long isr26", ".long isr27",
    ".long isr28", ".long isr29", ".long isr30", ".long isr31",
    ".long isr32", ".long isr33", ".long isr34", ".long isr35",
    ".long isr36", ".long isr37", ".long isr38", ".long isr39",
    ".long isr40", ".long isr41", ".long isr42", ".long isr43",
    ".long isr44", ".long isr45", ".long isr46", ".long isr47",
    ".long isr128",
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_constants_match_pic_remap() {
        assert_eq!(VECTOR_TIMER, 0x20);
        assert_eq!(VECTOR_KEYBOARD, 0x21);
        assert_eq!(VECTOR_IDE_PRIMARY, 0x2E);
        assert_eq!(VECTOR_IDE_SECONDARY, 0x2F);
        assert_eq!(VECTOR_SYSCALL, 0x80);
    }
}
