//! Wires the PS/2 keyboard IRQ to its decoder.

use crate::arch::x86::idt::{self, VECTOR_KEYBOARD};
use crate::arch::x86::trapframe::TrapFrame;
use crate::arch::x86::{pic, ps2_keyboard};

fn on_irq(_frame: &mut TrapFrame) {
    ps2_keyboard::on_irq();
    pic::end_of_interrupt(VECTOR_KEYBOARD);
}

pub fn init() {
    ps2_keyboard::init();
    idt::register_handler(VECTOR_KEYBOARD, on_irq);
    pic::enable_irq(1);
}
