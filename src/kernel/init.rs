//! Boot-time bring-up of the interrupt subsystem.
//!
//! Order matters and is fixed:
//!
//! 1. CPU detection (abort on failure)
//! 2. segment table, which the gates' selector points into
//! 3. vector table
//! 4. interrupt controller remap
//!
//! Interrupts are off from the first step until the last one has finished.

use core::fmt;

use super::status::{BootStatus, PhaseState, BOOT_STATUS};

/// Boot phases in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    CpuDetection,
    SegmentTable,
    VectorTable,
    InterruptController,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::CpuDetection,
        Phase::SegmentTable,
        Phase::VectorTable,
        Phase::InterruptController,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Phase::CpuDetection => "CPU Features",
            Phase::SegmentTable => "Global Descriptor Table",
            Phase::VectorTable => "Interrupt Descriptor Table",
            Phase::InterruptController => "Programmable Interrupt Interface",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    CpuUnsupported,
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootError::CpuUnsupported => write!(f, "CPU detection failed"),
        }
    }
}

/// The pieces of the machine the boot sequence drives.
pub trait Platform {
    fn disable_interrupts(&mut self);
    fn enable_interrupts(&mut self);
    /// Console line for the operator.
    fn announce(&mut self, message: &str);

    fn detect_cpu(&mut self) -> bool;
    fn dump_cpu(&mut self);
    fn init_segment_table(&mut self);
    fn init_vector_table(&mut self);
    fn init_interrupt_controller(&mut self);
}

/// Brings up interrupts, recording progress in the global boot status.
pub fn init(platform: &mut impl Platform) -> Result<(), BootError> {
    run(platform, &mut BOOT_STATUS.lock())
}

/// [`init`] against an explicit status record.
pub fn run(platform: &mut impl Platform, status: &mut BootStatus) -> Result<(), BootError> {
    platform.disable_interrupts();
    platform.announce("Arch x86 init..\n");

    init_phase(platform, status, Phase::CpuDetection, |p| {
        if !p.detect_cpu() {
            return Err(BootError::CpuUnsupported);
        }
        p.dump_cpu();
        Ok(())
    })?;

    platform.announce("Init Global Descriptor Table..");
    init_phase(platform, status, Phase::SegmentTable, |p| {
        p.init_segment_table();
        Ok(())
    })?;

    platform.announce("Init Interrupt Descriptor Table..");
    init_phase(platform, status, Phase::VectorTable, |p| {
        p.init_vector_table();
        Ok(())
    })?;

    platform.announce("Init Programmable Interrupt Interface..");
    init_phase(platform, status, Phase::InterruptController, |p| {
        p.init_interrupt_controller();
        Ok(())
    })?;

    platform.enable_interrupts();
    log::info!("interrupts enabled");
    Ok(())
}

fn init_phase<P: Platform>(
    platform: &mut P,
    status: &mut BootStatus,
    phase: Phase,
    init_fn: impl FnOnce(&mut P) -> Result<(), BootError>,
) -> Result<(), BootError> {
    status.update(phase, PhaseState::Running);
    log::debug!("initializing {}", phase.name());

    match init_fn(platform) {
        Ok(()) => {
            status.update(phase, PhaseState::Done);
            log::info!("{} initialized", phase.name());
            Ok(())
        }
        Err(e) => {
            status.update(phase, PhaseState::Aborted(e));
            log::error!("{} failed: {}", phase.name(), e);
            Err(e)
        }
    }
}

/// The real machine.
#[cfg(target_arch = "x86")]
pub struct BareMetal;

#[cfg(target_arch = "x86")]
impl Platform for BareMetal {
    fn disable_interrupts(&mut self) {
        crate::instructions::interrupts::disable();
    }

    fn enable_interrupts(&mut self) {
        crate::instructions::interrupts::enable();
    }

    fn announce(&mut self, message: &str) {
        crate::println!("{}", message);
    }

    fn detect_cpu(&mut self) -> bool {
        crate::cpu::init()
    }

    fn dump_cpu(&mut self) {
        crate::cpu::dump();
    }

    fn init_segment_table(&mut self) {
        crate::interrupts::gdt::init();
    }

    fn init_vector_table(&mut self) {
        unsafe { crate::interrupts::init_idt() };
    }

    fn init_interrupt_controller(&mut self) {
        unsafe { crate::interrupts::init_pics() };
    }
}
