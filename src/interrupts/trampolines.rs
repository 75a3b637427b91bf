//! Machine-level entry stubs, one per [`Stub`].
//!
//! Each stub saves the general purpose registers, calls exactly one handler
//! with no arguments and returns with `iretd`. Exception stubs never get as
//! far as the `iretd`.

use super::handlers;
use super::idt::{Exception, Stub, Trampolines};
use super::pic::with_controller;
use super::{Processor, PICS};
use crate::drivers::ps2_keyboard::KEYBOARD;
use crate::instructions::port::HardwarePorts;
use crate::serial::{self, SERIAL};

macro_rules! trampoline {
    ($stub:ident => $handler:path) => {
        core::arch::global_asm!(
            concat!(".global ", stringify!($stub)),
            concat!(stringify!($stub), ":"),
            "pushad",
            "cld",
            "call {handler}",
            "popad",
            "iretd",
            handler = sym $handler,
        );
    };
}

trampoline!(isr_default => int_default);
trampoline!(isr_divide_by_zero => exc_divide_by_zero);
trampoline!(isr_invalid_opcode => exc_invalid_opcode);
trampoline!(isr_segment_not_present => exc_segment_not_present);
trampoline!(isr_stack_fault => exc_stack_fault);
trampoline!(isr_general_protection => exc_general_protection);
trampoline!(isr_page_fault => exc_page_fault);
trampoline!(isr_timer => int_timer);
trampoline!(isr_keyboard => int_keyboard);

extern "C" {
    fn isr_default();
    fn isr_divide_by_zero();
    fn isr_invalid_opcode();
    fn isr_segment_not_present();
    fn isr_stack_fault();
    fn isr_general_protection();
    fn isr_page_fault();
    fn isr_timer();
    fn isr_keyboard();
}

/// The linked stubs.
pub struct EntryPoints;

impl Trampolines for EntryPoints {
    fn address(&self, stub: Stub) -> u32 {
        let entry: unsafe extern "C" fn() = match stub {
            Stub::Default => isr_default,
            Stub::Exception(Exception::DivideByZero) => isr_divide_by_zero,
            Stub::Exception(Exception::InvalidOpcode) => isr_invalid_opcode,
            Stub::Exception(Exception::SegmentNotPresent) => isr_segment_not_present,
            Stub::Exception(Exception::StackFault) => isr_stack_fault,
            Stub::Exception(Exception::GeneralProtection) => isr_general_protection,
            Stub::Exception(Exception::PageFault) => isr_page_fault,
            Stub::Timer => isr_timer,
            Stub::Keyboard => isr_keyboard,
        };
        entry as usize as u32
    }
}

extern "C" fn int_default() {
    with_controller(&PICS, || HardwarePorts, |pic| handlers::default_interrupt(pic));
}

extern "C" fn int_timer() {
    with_controller(&PICS, || HardwarePorts, |pic| handlers::timer_tick(pic));
}

extern "C" fn int_keyboard() {
    with_controller(&PICS, || HardwarePorts, |pic| {
        handlers::keyboard(pic, &mut *KEYBOARD.lock())
    });
}

/// Nothing runs after a fault, so whoever held the console is not coming back.
fn fault(exception: Exception) -> ! {
    let mut console = unsafe { serial::seize(&SERIAL) };
    handlers::fatal(exception, &mut *console, &Processor)
}

extern "C" fn exc_divide_by_zero() {
    fault(Exception::DivideByZero)
}

extern "C" fn exc_invalid_opcode() {
    fault(Exception::InvalidOpcode)
}

extern "C" fn exc_segment_not_present() {
    fault(Exception::SegmentNotPresent)
}

extern "C" fn exc_stack_fault() {
    fault(Exception::StackFault)
}

extern "C" fn exc_general_protection() {
    fault(Exception::GeneralProtection)
}

extern "C" fn exc_page_fault() {
    fault(Exception::PageFault)
}
