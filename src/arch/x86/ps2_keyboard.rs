//! PS/2 keyboard driver: scancode set 1, US layout, extended (0xE0) sequences.
//!
//! Letters are case-folded by `shift XOR caps_lock`; the "dual-purpose" keys
//! (number row, brackets, punctuation) only respond to Shift — Caps Lock
//! never changes `1` into `!`. Decoded bytes are pushed into the IO ring
//! buffer with `try_put`, so a burst of keystrokes the console hasn't drained
//! yet is dropped rather than blocking the interrupt handler.

use super::port::inb;
use spin::Mutex;

const DATA_PORT: u16 = 0x60;

const SC_LSHIFT: u8 = 0x2A;
const SC_RSHIFT: u8 = 0x36;
const SC_LCTRL: u8 = 0x1D;
const SC_LALT: u8 = 0x38;
const SC_CAPSLOCK: u8 = 0x3A;
const RELEASE_BIT: u8 = 0x80;
const EXTENDED_PREFIX: u8 = 0xE0;

/// Scancodes whose shifted form is a different symbol rather than a case
/// change, and so ignore Caps Lock entirely.
const DUAL_PURPOSE: [u8; 22] = [
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x1A, 0x1B, 0x27,
    0x28, 0x29, 0x2B, 0x33, 0x34, 0x35,
];

struct Modifiers {
    shift: bool,
    ctrl: bool,
    alt: bool,
    caps_lock: bool,
    pending_extended: bool,
}

impl Modifiers {
    const fn new() -> Self {
        Self { shift: false, ctrl: false, alt: false, caps_lock: false, pending_extended: false }
    }
}

static STATE: Mutex<Modifiers> = Mutex::new(Modifiers::new());

pub fn init() {
    crate::arch::x86::pic::enable_irq(1);
}

/// Called from the IRQ1 handler. Reads one scancode, updates modifier
/// state, and enqueues a translated ASCII byte if the key has one.
pub fn on_irq() {
    let scancode = inb(DATA_PORT);
    let mut state = STATE.lock();

    if scancode == EXTENDED_PREFIX {
        state.pending_extended = true;
        return;
    }
    let extended = core::mem::replace(&mut state.pending_extended, false);

    let released = scancode & RELEASE_BIT != 0;
    let code = scancode & !RELEASE_BIT;

    match code {
        SC_LSHIFT | SC_RSHIFT => {
            state.shift = !released;
            return;
        }
        SC_LCTRL => {
            state.ctrl = !released;
            return;
        }
        SC_LALT => {
            state.alt = !released;
            return;
        }
        SC_CAPSLOCK if !released => {
            state.caps_lock = !state.caps_lock;
            return;
        }
        _ => {}
    }

    if released || extended {
        return;
    }

    if let Some(byte) = translate(code, state.shift, state.caps_lock) {
        crate::drivers::ioqueue::try_put(byte);
    }
}

/// Two-column keymap: (scancode, unshifted, shifted).
const KEYMAP: &[(u8, u8, u8)] = &[
    (0x02, b'1', b'!'),
    (0x03, b'2', b'@'),
    (0x04, b'3', b'#'),
    (0x05, b'4', b'$'),
    (0x06, b'5', b'%'),
    (0x07, b'6', b'^'),
    (0x08, b'7', b'&'),
    (0x09, b'8', b'*'),
    (0x0A, b'9', b'('),
    (0x0B, b'0', b')'),
    (0x0C, b'-', b'_'),
    (0x0D, b'=', b'+'),
    (0x0E, 0x08, 0x08), // backspace
    (0x0F, b'\t', b'\t'),
    (0x10, b'q', b'Q'),
    (0x11, b'w', b'W'),
    (0x12, b'e', b'E'),
    (0x13, b'r', b'R'),
    (0x14, b't', b'T'),
    (0x15, b'y', b'Y'),
    (0x16, b'u', b'U'),
    (0x17, b'i', b'I'),
    (0x18, b'o', b'O'),
    (0x19, b'p', b'P'),
    (0x1A, b'[', b'{'),
    (0x1B, b']', b'}'),
    (0x1C, b'\n', b'\n'),
    (0x1E, b'a', b'A'),
    (0x1F, b's', b'S'),
    (0x20, b'd', b'D'),
    (0x21, b'f', b'F'),
    (0x22, b'g', b'G'),
    (0x23, b'h', b'H'),
    (0x24, b'j', b'J'),
    (0x25, b'k', b'K'),
    (0x26, b'l', b'L'),
    (0x27, b';', b':'),
    (0x28, b'\'', b'"'),
    (0x29, b'`', b'~'),
    (0x2B, b'\\', b'|'),
    (0x2C, b'z', b'Z'),
    (0x2D, b'x', b'X'),
    (0x2E, b'c', b'C'),
    (0x2F, b'v', b'V'),
    (0x30, b'b', b'B'),
    (0x31, b'n', b'N'),
    (0x32, b'm', b'M'),
    (0x33, b',', b'<'),
    (0x34, b'.', b'>'),
    (0x35, b'/', b'?'),
    (0x39, b' ', b' '),
];

fn translate(scancode: u8, shift: bool, caps_lock: bool) -> Option<u8> {
    let (_, normal, shifted) = KEYMAP.iter().find(|&&(sc, _, _)| sc == scancode).copied()?;
    let effective_shift = if DUAL_PURPOSE.contains(&scancode) {
        shift
    } else {
        shift ^ caps_lock
    };
    Some(if effective_shift { shifted } else { normal })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_lock_folds_letters_not_digits() {
        assert_eq!(translate(0x1E, false, true), Some(b'A')); // 'a' -> 'A' under caps
        assert_eq!(translate(0x02, false, true), Some(b'1')); // '1' unaffected by caps
        assert_eq!(translate(0x02, true, true), Some(b'!')); // shift still works
    }

    #[test]
    fn shift_and_caps_cancel_for_letters() {
        assert_eq!(translate(0x1E, true, true), Some(b'a'));
    }

    #[test]
    fn unknown_scancode_has_no_translation() {
        assert_eq!(translate(0xFF, false, false), None);
    }
}
