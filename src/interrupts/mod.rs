//! # Interrupt Handling Module
//!
//! Provides interrupt infrastructure for the kernel including:
//!
//! - **GDT**: flat segment table whose code selector every gate uses
//! - **IDT**: the 256-entry vector table and its handlers
//! - **PIC**: 8259 remapping, masking and EOI
//! - **Timer**: system timer tick tracking
//!
//! ## Interrupt Vector Layout
//!
//! | Vector | Type                   | Handler              |
//! |--------|------------------------|----------------------|
//! | 0-31   | CPU Exceptions         | report and halt      |
//! | 32     | Timer (IRQ0)           | `handlers::timer_tick` |
//! | 33     | Keyboard (IRQ1)        | `handlers::keyboard` |
//! | 34-47  | Other IRQ lines        | `handlers::default_interrupt` |
//!
//! ## Usage
//!
//! ```ignore
//! interrupts::gdt::init();
//! unsafe { interrupts::init_idt() };
//! unsafe { interrupts::init_pics() };
//! instructions::interrupts::enable();
//! ```
//!
//! [`crate::kernel::init`] performs these steps in order.

pub mod descriptor;
pub mod gdt;
pub mod handlers;
pub mod idt;
pub mod pic;
pub mod timer;
#[cfg(target_arch = "x86")]
mod trampolines;

use spin::Mutex;

use crate::instructions::{self, port::HardwarePorts};
use handlers::Halt;
use pic::{Pic8259, PIC_1_OFFSET, PIC_2_OFFSET};

/// The controller pair. Boot code locks it, with interrupts disabled, to
/// program it; handlers go through [`pic::with_controller`] to acknowledge.
pub static PICS: Mutex<Pic8259<HardwarePorts>> =
    Mutex::new(Pic8259::new(PIC_1_OFFSET, PIC_2_OFFSET, HardwarePorts));

/// Built once on first use and never modified; the CPU keeps reading the
/// copy at [`idt::IDT_BASE`] for as long as the machine runs.
#[cfg(target_arch = "x86")]
static IDT: spin::Lazy<idt::VectorTable> = spin::Lazy::new(|| {
    idt::VectorTable::build(&trampolines::EntryPoints, gdt::KERNEL_CODE_SELECTOR)
});

/// Builds and loads the vector table.
///
/// # Safety
/// Interrupts must be disabled and the GDT loaded.
#[cfg(target_arch = "x86")]
pub unsafe fn init_idt() {
    unsafe { IDT.activate() };
}

/// Remaps and masks the 8259 pair.
///
/// # Safety
/// Interrupts must be disabled and the IDT loaded.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub unsafe fn init_pics() {
    unsafe { PICS.lock().initialize() };
}

/// The CPU this code runs on.
#[derive(Debug, Default, Clone, Copy)]
pub struct Processor;

impl Halt for Processor {
    fn halt(&self) -> ! {
        instructions::halt_loop()
    }
}
