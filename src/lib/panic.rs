//! Fatal banner printing and the `#[panic_handler]` entry point.

use core::arch::asm;
use core::panic::PanicInfo;
use core::sync::atomic::{AtomicBool, Ordering};

static PANICKING: AtomicBool = AtomicBool::new(false);

/// Rust-level panic handler (`unwrap`/`assert`/array-bounds panics that slip
/// past the explicit `PANIC!` call sites). Funnels into the same banner.
pub fn rust_panic_handler(info: &PanicInfo) -> ! {
    crate::arch::x86::intr::disable();

    if PANICKING.swap(true, Ordering::SeqCst) {
        crate::arch::x86::serial::write_str("\n!!! PANIC WHILE PANICKING !!!\n");
        halt();
    }

    let location = info
        .location()
        .map(|l| alloc::format!("{}:{}", l.file(), l.line()))
        .unwrap_or_else(|| alloc::string::String::from("<unknown>"));
    let message = alloc::format!("{}", info.message());

    fatal_banner(&location, 0, "rust_panic", &message);
    halt();
}

pub fn fatal_banner(file: &str, line: u32, func: &str, expression: &str) {
    let w = crate::arch::x86::serial::write_str;
    w("\n================================ KERNEL PANIC ================================\n");
    if line != 0 {
        w(&alloc::format!("at {}:{} in {}\n", file, line, func));
    } else {
        w(&alloc::format!("at {} in {}\n", file, func));
    }
    w(&alloc::format!("expression: {}\n", expression));
    w(&alloc::format!("uptime: {} ticks\n", crate::time::ticks()));

    print_registers();
    print_recent_logs();
    w("================================================================================\n");
}

fn print_registers() {
    let (eax, ebx, ecx, edx, esi, edi, ebp, esp): (u32, u32, u32, u32, u32, u32, u32, u32);
    unsafe {
        asm!(
            "mov {0}, eax", "mov {1}, ebx", "mov {2}, ecx", "mov {3}, edx",
            "mov {4}, esi", "mov {5}, edi", "mov {6}, ebp", "mov {7}, esp",
            out(reg) eax, out(reg) ebx, out(reg) ecx, out(reg) edx,
            out(reg) esi, out(reg) edi, out(reg) ebp, out(reg) esp,
        );
    }
    let w = crate::arch::x86::serial::write_str;
    w(&alloc::format!(
        "eax={:08x} ebx={:08x} ecx={:08x} edx={:08x}\nesi={:08x} edi={:08x} ebp={:08x} esp={:08x}\n",
        eax, ebx, ecx, edx, esi, edi, ebp, esp
    ));
}

fn print_recent_logs() {
    let w = crate::arch::x86::serial::write_str;
    w("recent log lines:\n");
    for entry in crate::lib::printk::recent_lines() {
        let text = core::str::from_utf8(&entry.message[..entry.len]).unwrap_or("<invalid utf8>");
        w(&alloc::format!("  [{:>5}] {}\n", entry.level.as_str(), text));
    }
}

pub fn halt() -> ! {
    crate::arch::x86::serial::write_str("system halted.\n");
    loop {
        unsafe {
            asm!("cli", "hlt");
        }
    }
}
