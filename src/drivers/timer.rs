//! Wires the PIT tick interrupt to the global tick counter and the
//! scheduler's preemption check.

use crate::arch::x86::idt::{self, VECTOR_TIMER};
use crate::arch::x86::trapframe::TrapFrame;
use crate::arch::x86::{pic, pit};
use crate::process::scheduler;

fn on_tick(_frame: &mut TrapFrame) {
    pit::on_tick();
    scheduler::timer_tick();
    pic::end_of_interrupt(VECTOR_TIMER);
}

/// Programs the PIT for 100 Hz and wires its IRQ. Interrupts must still be
/// globally enabled by the caller afterward.
pub fn init() {
    pit::init();
    idt::register_handler(VECTOR_TIMER, on_tick);
    pic::enable_irq(0);
}
