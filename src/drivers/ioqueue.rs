//! 64-slot blocking IO ring buffer, shared between interrupt producers
//! (keyboard) and in-kernel consumers (console reads).
//!
//! Two semaphores track filled/free slots: `get`/`put` block on them
//! directly, `try_put` only ever probes `space` non-blockingly so the
//! keyboard ISR never waits.

use crate::sync::Semaphore;
use spin::Mutex;

const CAPACITY: usize = 64;

struct Ring {
    slots: [u8; CAPACITY],
    head: usize,
    tail: usize,
}

struct IoQueue {
    ring: Mutex<Ring>,
    items: Semaphore,
    space: Semaphore,
}

static QUEUE: IoQueue = IoQueue {
    ring: Mutex::new(Ring { slots: [0; CAPACITY], head: 0, tail: 0 }),
    items: Semaphore::new(0),
    // One slot is always left empty so a full ring (tail == head after
    // wrapping) stays distinguishable from an empty one; usable capacity
    // is CAPACITY - 1.
    space: Semaphore::new((CAPACITY - 1) as u32),
};

fn push(byte: u8) {
    let mut ring = QUEUE.ring.lock();
    let tail = ring.tail;
    ring.slots[tail] = byte;
    ring.tail = (tail + 1) % CAPACITY;
}

fn pop() -> u8 {
    let mut ring = QUEUE.ring.lock();
    let head = ring.head;
    let byte = ring.slots[head];
    ring.head = (head + 1) % CAPACITY;
    byte
}

/// Non-blocking enqueue for interrupt handlers. Drops the byte silently if
/// the ring is already full.
pub fn try_put(byte: u8) {
    if QUEUE.space.try_down() {
        push(byte);
        QUEUE.items.up();
    }
}

/// Blocking enqueue for kernel producers.
pub fn put(byte: u8) {
    QUEUE.space.down();
    push(byte);
    QUEUE.items.up();
}

/// Blocking dequeue: waits for a byte to arrive.
pub fn get() -> u8 {
    QUEUE.items.down();
    let byte = pop();
    QUEUE.space.up();
    byte
}
