//! # Interrupt and exception handlers
//!
//! The code the trampolines end up in, written against small traits so it
//! can run on the host.
//!
//! ## Exception Handlers
//!
//! | Exception              | Action          |
//! |------------------------|-----------------|
//! | Divide Error (#DE)     | Report, halt    |
//! | Invalid Opcode (#UD)   | Report, halt    |
//! | Segment Not Present    | Report, halt    |
//! | Stack Fault (#SS)      | Report, halt    |
//! | General Protection     | Report, halt    |
//! | Page Fault (#PF)       | Report, halt    |
//!
//! No fault context is decoded yet and nothing is resumed.
//!
//! ## Hardware Interrupts
//!
//! Each IRQ handler acknowledges the controller exactly once, as its last
//! action, whatever path it took.

use core::fmt::Write;

use super::idt::{Exception, InterruptIndex};
use super::pic::{EoiTarget, InterruptController};
use super::timer;
use crate::drivers::ps2_keyboard::ScanCodeSource;

/// Stops the machine for good.
pub trait Halt {
    fn halt(&self) -> !;
}

/// Reports `exception` on `console` and halts.
pub fn fatal(exception: Exception, console: &mut impl Write, cpu: &impl Halt) -> ! {
    let _ = writeln!(console, "{}", exception.message());
    cpu.halt()
}

/// Catch-all for vectors nobody claimed.
pub fn default_interrupt(pic: &mut impl InterruptController) {
    pic.send_eoi(EoiTarget::Primary);
}

pub fn timer_tick(pic: &mut impl InterruptController) {
    timer::tick();
    pic.send_eoi(EoiTarget::Line(InterruptIndex::Timer.line()));
}

pub fn keyboard(pic: &mut impl InterruptController, keyboard: &mut impl ScanCodeSource) {
    match keyboard.consume_scancode() {
        Some(scancode) => log::trace!("keyboard scancode {:#04x}", scancode),
        None => log::debug!("keyboard interrupt with empty output buffer"),
    }
    pic.send_eoi(EoiTarget::Line(InterruptIndex::Keyboard.line()));
}
