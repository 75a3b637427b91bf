//! # PS/2 Keyboard Driver
//!
//! Handles PS/2 keyboard input via IRQ1 interrupt.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐    IRQ1     ┌──────────────┐
//! │  Keyboard   │────────────▶│  Ring Buffer │
//! │  (Port 60)  │             │  (256 bytes) │
//! └─────────────┘             └──────┬───────┘
//!                                    │
//!                                    ▼
//!                           dequeue_scancode()
//! ```
//!
//! The IRQ1 handler only moves the byte out of the controller. Decoding
//! scan codes into keys is left to whoever drains the queue.

use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use spin::Mutex;

use crate::instructions::port::{HardwarePorts, PortIo};

pub const DATA_PORT: u16 = 0x60;
pub const STATUS_PORT: u16 = 0x64;
/// Status bit 0: a byte is waiting in the output buffer.
pub const STATUS_OUTPUT_FULL: u8 = 1 << 0;

const BUFFER_SIZE: usize = 256;

/// Where the keyboard IRQ handler gets its scan code from.
pub trait ScanCodeSource {
    /// Takes the pending scan code off the device, if there is one.
    fn consume_scancode(&mut self) -> Option<u8>;
}

/// Single-producer single-consumer byte ring. Full rings drop new bytes.
pub struct ScancodeQueue {
    buf: [AtomicU8; BUFFER_SIZE],
    head: AtomicUsize,
    tail: AtomicUsize,
}

impl ScancodeQueue {
    pub const fn new() -> Self {
        Self {
            buf: [const { AtomicU8::new(0) }; BUFFER_SIZE],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Returns false if the ring was full and `scancode` was dropped.
    pub fn push(&self, scancode: u8) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let next = head.wrapping_add(1) % BUFFER_SIZE;
        let tail = self.tail.load(Ordering::Acquire);
        if next == tail {
            return false;
        }
        self.buf[head].store(scancode, Ordering::Relaxed);
        self.head.store(next, Ordering::Release);
        true
    }

    pub fn pop(&self) -> Option<u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }
        let scancode = self.buf[tail].load(Ordering::Relaxed);
        self.tail.store(tail.wrapping_add(1) % BUFFER_SIZE, Ordering::Release);
        Some(scancode)
    }
}

impl Default for ScancodeQueue {
    fn default() -> Self {
        Self::new()
    }
}

static SCANCODES: ScancodeQueue = ScancodeQueue::new();

pub static KEYBOARD: Mutex<Ps2Keyboard<HardwarePorts>> =
    Mutex::new(Ps2Keyboard::new(HardwarePorts, &SCANCODES));

/// Next scan code received by the IRQ handler.
pub fn dequeue_scancode() -> Option<u8> {
    SCANCODES.pop()
}

pub struct Ps2Keyboard<P> {
    ports: P,
    queue: &'static ScancodeQueue,
}

impl<P> Ps2Keyboard<P> {
    pub const fn new(ports: P, queue: &'static ScancodeQueue) -> Self {
        Self { ports, queue }
    }
}

impl<P: PortIo> ScanCodeSource for Ps2Keyboard<P> {
    fn consume_scancode(&mut self) -> Option<u8> {
        let status = unsafe { self.ports.read(STATUS_PORT) };
        if status & STATUS_OUTPUT_FULL == 0 {
            return None;
        }

        let scancode = unsafe { self.ports.read(DATA_PORT) };
        if !self.queue.push(scancode) {
            log::warn!("scancode queue full, dropped {:#04x}", scancode);
        }
        Some(scancode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::boxed::Box;
    use std::vec::Vec;

    struct FakeController {
        output: Vec<u8>,
    }

    impl PortIo for FakeController {
        unsafe fn read(&mut self, port: u16) -> u8 {
            match port {
                STATUS_PORT if !self.output.is_empty() => STATUS_OUTPUT_FULL,
                STATUS_PORT => 0,
                DATA_PORT => self.output.remove(0),
                _ => 0xFF,
            }
        }

        unsafe fn write(&mut self, _port: u16, _value: u8) {}
    }

    fn leaked_queue() -> &'static ScancodeQueue {
        Box::leak(Box::new(ScancodeQueue::new()))
    }

    #[test]
    fn reads_pending_byte_into_queue() {
        let queue = leaked_queue();
        let mut keyboard = Ps2Keyboard::new(FakeController { output: vec![0x1E, 0x9E] }, queue);

        assert_eq!(keyboard.consume_scancode(), Some(0x1E));
        assert_eq!(keyboard.consume_scancode(), Some(0x9E));
        assert_eq!(keyboard.consume_scancode(), None);

        assert_eq!(queue.pop(), Some(0x1E));
        assert_eq!(queue.pop(), Some(0x9E));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn empty_output_buffer_leaves_data_port_alone() {
        let queue = leaked_queue();
        let mut keyboard = Ps2Keyboard::new(FakeController { output: Vec::new() }, queue);
        assert_eq!(keyboard.consume_scancode(), None);
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn full_ring_drops_newest() {
        let queue = leaked_queue();
        for i in 0..BUFFER_SIZE - 1 {
            assert!(queue.push(i as u8));
        }
        assert!(!queue.push(0xAA));
        assert_eq!(queue.pop(), Some(0));
        assert!(queue.push(0xAA));
    }
}
