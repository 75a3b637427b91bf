//! # Interrupt Descriptor Table
//!
//! ## Vector layout
//!
//! | Vector | Source                       | Stub              |
//! |--------|------------------------------|-------------------|
//! | 0      | Divide error (#DE)           | `DivideByZero`    |
//! | 6      | Invalid opcode (#UD)         | `InvalidOpcode`   |
//! | 11     | Segment not present (#NP)    | `SegmentNotPresent` |
//! | 12     | Stack-segment fault (#SS)    | `StackFault`      |
//! | 13     | General protection (#GP)     | `GeneralProtection` |
//! | 14     | Page fault (#PF)             | `PageFault`       |
//! | 32     | IRQ0, timer                  | `Timer`           |
//! | 33     | IRQ1, keyboard               | `Keyboard`        |
//! | other  | anything else                | `Default`         |
//!
//! Every slot is filled before the table is handed to the CPU. A vector
//! nobody cares about lands in the default stub, which acknowledges the
//! controller and returns.

use core::ops::Index;

use x86_64::structures::gdt::SegmentSelector;

use super::descriptor::{GateDescriptor, TableRegister};
use super::pic::{PIC_1_OFFSET, PIC_2_OFFSET};

/// Number of vectors the architecture defines.
pub const IDT_SIZE: usize = 256;

/// Linear address the table is copied to before loading.
pub const IDT_BASE: u32 = 0x0000_1000;

/// Limit written into the table register.
pub const IDT_LIMIT: u16 = (IDT_SIZE * core::mem::size_of::<GateDescriptor>()) as u16;

pub const DIVIDE_ERROR: u8 = 0;
pub const DEBUG: u8 = 1;
pub const NON_MASKABLE_INTERRUPT: u8 = 2;
pub const BREAKPOINT: u8 = 3;
pub const OVERFLOW: u8 = 4;
pub const BOUND_RANGE_EXCEEDED: u8 = 5;
pub const INVALID_OPCODE: u8 = 6;
pub const DEVICE_NOT_AVAILABLE: u8 = 7;
pub const DOUBLE_FAULT: u8 = 8;
/// Only raised by the 386 and earlier.
pub const COPROCESSOR_SEGMENT_OVERRUN: u8 = 9;
pub const INVALID_TSS: u8 = 10;
pub const SEGMENT_NOT_PRESENT: u8 = 11;
pub const STACK_SEGMENT_FAULT: u8 = 12;
pub const GENERAL_PROTECTION_FAULT: u8 = 13;
pub const PAGE_FAULT: u8 = 14;
pub const RESERVED_15: u8 = 15;
pub const X87_FLOATING_POINT: u8 = 16;
pub const ALIGNMENT_CHECK: u8 = 17;
pub const MACHINE_CHECK: u8 = 18;
pub const SIMD_FLOATING_POINT: u8 = 19;
pub const VIRTUALIZATION: u8 = 20;
pub const CONTROL_PROTECTION: u8 = 21;
/// 22-27 are reserved.
pub const HYPERVISOR_INJECTION: u8 = 28;
pub const VMM_COMMUNICATION: u8 = 29;
pub const SECURITY_EXCEPTION: u8 = 30;

/// Last vector reserved for CPU exceptions.
pub const LAST_EXCEPTION: u8 = 31;

/// Whether the CPU pushes an error code before entering the handler for
/// `vector`. The shared default stub does not pop one.
pub const fn pushes_error_code(vector: u8) -> bool {
    matches!(
        vector,
        DOUBLE_FAULT
            | INVALID_TSS
            | SEGMENT_NOT_PRESENT
            | STACK_SEGMENT_FAULT
            | GENERAL_PROTECTION_FAULT
            | PAGE_FAULT
            | ALIGNMENT_CHECK
            | CONTROL_PROTECTION
            | VMM_COMMUNICATION
            | SECURITY_EXCEPTION
    )
}

/// Fault classes with a dedicated handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Exception {
    DivideByZero = DIVIDE_ERROR,
    InvalidOpcode = INVALID_OPCODE,
    SegmentNotPresent = SEGMENT_NOT_PRESENT,
    StackFault = STACK_SEGMENT_FAULT,
    GeneralProtection = GENERAL_PROTECTION_FAULT,
    PageFault = PAGE_FAULT,
}

impl Exception {
    pub const ALL: [Exception; 6] = [
        Exception::DivideByZero,
        Exception::InvalidOpcode,
        Exception::SegmentNotPresent,
        Exception::StackFault,
        Exception::GeneralProtection,
        Exception::PageFault,
    ];

    pub const fn vector(self) -> u8 {
        self as u8
    }

    pub const fn from_vector(vector: u8) -> Option<Self> {
        match vector {
            DIVIDE_ERROR => Some(Exception::DivideByZero),
            INVALID_OPCODE => Some(Exception::InvalidOpcode),
            SEGMENT_NOT_PRESENT => Some(Exception::SegmentNotPresent),
            STACK_SEGMENT_FAULT => Some(Exception::StackFault),
            GENERAL_PROTECTION_FAULT => Some(Exception::GeneralProtection),
            PAGE_FAULT => Some(Exception::PageFault),
            _ => None,
        }
    }

    /// Text printed on the console when the fault is taken.
    pub const fn message(self) -> &'static str {
        match self {
            Exception::DivideByZero => "Divide by zero!",
            Exception::InvalidOpcode => "Invalid opcode!",
            Exception::SegmentNotPresent => "Segment not present!",
            Exception::StackFault => "Stack fault!",
            Exception::GeneralProtection => "General protection exception!",
            Exception::PageFault => "Page fault!",
        }
    }
}

/// Hardware interrupt vectors, after remapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InterruptIndex {
    Timer = PIC_1_OFFSET,
    Keyboard = PIC_1_OFFSET + 1,
}

impl InterruptIndex {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn as_usize(self) -> usize {
        self as usize
    }

    /// Controller line the interrupt arrives on.
    pub const fn line(self) -> u8 {
        self as u8 - PIC_1_OFFSET
    }
}

/// Returns whether `vector` belongs to the remapped hardware range.
pub const fn is_hardware_vector(vector: u8) -> bool {
    vector >= PIC_1_OFFSET && vector < PIC_2_OFFSET + 8
}

/// Entry stubs, one per distinct handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stub {
    Default,
    Exception(Exception),
    Timer,
    Keyboard,
}

impl Stub {
    pub const ALL: [Stub; 9] = [
        Stub::Default,
        Stub::Exception(Exception::DivideByZero),
        Stub::Exception(Exception::InvalidOpcode),
        Stub::Exception(Exception::SegmentNotPresent),
        Stub::Exception(Exception::StackFault),
        Stub::Exception(Exception::GeneralProtection),
        Stub::Exception(Exception::PageFault),
        Stub::Timer,
        Stub::Keyboard,
    ];

    /// The stub a freshly built table routes `vector` to.
    pub const fn for_vector(vector: u8) -> Stub {
        if let Some(exception) = Exception::from_vector(vector) {
            return Stub::Exception(exception);
        }
        match vector {
            v if v == InterruptIndex::Timer.as_u8() => Stub::Timer,
            v if v == InterruptIndex::Keyboard.as_u8() => Stub::Keyboard,
            _ => Stub::Default,
        }
    }
}

/// Resolves stubs to the address the CPU jumps to.
pub trait Trampolines {
    fn address(&self, stub: Stub) -> u32;

    /// Reverse lookup, for reading a table back.
    fn stub_at(&self, address: u32) -> Option<Stub> {
        Stub::ALL.into_iter().find(|&stub| self.address(stub) == address)
    }
}

/// The full 256-entry table, built in ordinary memory.
#[derive(Clone)]
#[repr(C, align(8))]
pub struct VectorTable {
    entries: [GateDescriptor; IDT_SIZE],
}

const _: () = assert!(core::mem::size_of::<VectorTable>() == IDT_LIMIT as usize);

impl VectorTable {
    pub fn build(trampolines: &impl Trampolines, selector: SegmentSelector) -> Self {
        let default = GateDescriptor::interrupt(trampolines.address(Stub::Default), selector);
        let mut table = Self {
            entries: [default; IDT_SIZE],
        };

        for exception in Exception::ALL {
            table.set(
                exception.vector(),
                trampolines.address(Stub::Exception(exception)),
                selector,
            );
        }

        table.set(InterruptIndex::Timer.as_u8(), trampolines.address(Stub::Timer), selector);
        table.set(InterruptIndex::Keyboard.as_u8(), trampolines.address(Stub::Keyboard), selector);

        log::debug!("vector table built, default stub at {:#010x}", default.handler_address());
        table
    }

    fn set(&mut self, vector: u8, handler: u32, selector: SegmentSelector) {
        self.entries[usize::from(vector)] = GateDescriptor::interrupt(handler, selector);
    }

    pub fn entries(&self) -> &[GateDescriptor; IDT_SIZE] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &GateDescriptor)> {
        self.entries.iter().enumerate().map(|(vector, gate)| (vector as u8, gate))
    }

    pub const fn register() -> TableRegister {
        TableRegister::new(IDT_BASE, IDT_LIMIT)
    }

    /// Copies the table to [`IDT_BASE`] and loads it.
    ///
    /// # Safety
    /// `IDT_BASE..IDT_BASE + IDT_LIMIT` must be identity-mapped, writable and
    /// unused by anything else for the lifetime of the kernel. Interrupts must
    /// be disabled.
    #[cfg(target_arch = "x86")]
    pub unsafe fn activate(&self) -> TableRegister {
        let register = Self::register();
        let dst = register.base as usize as *mut GateDescriptor;
        unsafe {
            core::ptr::copy_nonoverlapping(self.entries.as_ptr(), dst, IDT_SIZE);
            core::arch::asm!(
                "lidt [{}]",
                in(reg) &register as *const TableRegister,
                options(readonly, nostack, preserves_flags)
            );
        }
        log::info!(
            "idt loaded at {:#010x}, limit {}",
            { register.base },
            { register.limit }
        );
        register
    }
}

impl Index<u8> for VectorTable {
    type Output = GateDescriptor;

    fn index(&self, vector: u8) -> &GateDescriptor {
        &self.entries[usize::from(vector)]
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::interrupts::descriptor::INTERRUPT_GATE;
    use std::vec::Vec;
    use x86_64::PrivilegeLevel;

    /// Hands out synthetic, distinct addresses.
    pub(crate) struct FakeTrampolines;

    impl Trampolines for FakeTrampolines {
        fn address(&self, stub: Stub) -> u32 {
            let index = Stub::ALL.iter().position(|&s| s == stub).unwrap() as u32;
            0x0010_0000 + index * 0x20
        }
    }

    pub(crate) const CODE: SegmentSelector = SegmentSelector::new(1, PrivilegeLevel::Ring0);

    #[test]
    fn every_slot_holds_a_valid_gate() {
        let table = VectorTable::build(&FakeTrampolines, CODE);
        assert_eq!(table.iter().count(), IDT_SIZE);
        for (vector, gate) in table.iter() {
            assert!(gate.is_valid(), "vector {vector} is not a valid gate");
            assert_eq!(gate.type_attributes(), INTERRUPT_GATE);
            assert_eq!(gate.selector().0, 0x08);
            assert_ne!(gate.handler_address(), 0);
        }
    }

    #[test]
    fn known_vectors_override_the_default() {
        let table = VectorTable::build(&FakeTrampolines, CODE);
        let expected = [
            (0, Stub::Exception(Exception::DivideByZero)),
            (6, Stub::Exception(Exception::InvalidOpcode)),
            (11, Stub::Exception(Exception::SegmentNotPresent)),
            (12, Stub::Exception(Exception::StackFault)),
            (13, Stub::Exception(Exception::GeneralProtection)),
            (14, Stub::Exception(Exception::PageFault)),
            (32, Stub::Timer),
            (33, Stub::Keyboard),
        ];

        for (vector, gate) in table.iter() {
            let want = expected
                .iter()
                .find(|(v, _)| *v == vector)
                .map(|&(_, stub)| stub)
                .unwrap_or(Stub::Default);
            assert_eq!(FakeTrampolines.stub_at(gate.handler_address()), Some(want), "vector {vector}");
            assert_eq!(Stub::for_vector(vector), want);
        }
    }

    #[test]
    fn register_describes_the_fixed_table() {
        let register = VectorTable::register();
        assert_eq!({ register.base }, IDT_BASE);
        assert_eq!({ register.limit }, 256 * 8);
    }

    #[test]
    fn exception_vectors_and_messages() {
        assert_eq!(Exception::DivideByZero.message(), "Divide by zero!");
        assert_eq!(Exception::PageFault.vector(), 14);
        for exception in Exception::ALL {
            assert_eq!(Exception::from_vector(exception.vector()), Some(exception));
            assert!(exception.vector() <= LAST_EXCEPTION);
        }
        assert_eq!(Exception::from_vector(DOUBLE_FAULT), None);
    }

    #[test]
    fn hardware_range() {
        assert!(!is_hardware_vector(31));
        assert!(is_hardware_vector(32));
        assert!(is_hardware_vector(47));
        assert!(!is_hardware_vector(48));
        assert_eq!(InterruptIndex::Keyboard.line(), 1);
    }

    const NAMED: [u8; 25] = [
        DIVIDE_ERROR,
        DEBUG,
        NON_MASKABLE_INTERRUPT,
        BREAKPOINT,
        OVERFLOW,
        BOUND_RANGE_EXCEEDED,
        INVALID_OPCODE,
        DEVICE_NOT_AVAILABLE,
        DOUBLE_FAULT,
        COPROCESSOR_SEGMENT_OVERRUN,
        INVALID_TSS,
        SEGMENT_NOT_PRESENT,
        STACK_SEGMENT_FAULT,
        GENERAL_PROTECTION_FAULT,
        PAGE_FAULT,
        RESERVED_15,
        X87_FLOATING_POINT,
        ALIGNMENT_CHECK,
        MACHINE_CHECK,
        SIMD_FLOATING_POINT,
        VIRTUALIZATION,
        CONTROL_PROTECTION,
        HYPERVISOR_INJECTION,
        VMM_COMMUNICATION,
        SECURITY_EXCEPTION,
    ];

    #[test]
    fn exception_names_cover_the_defined_vectors() {
        let mut seen = [false; 32];
        for vector in NAMED {
            assert!(vector <= LAST_EXCEPTION);
            assert!(!seen[usize::from(vector)], "vector {vector} named twice");
            seen[usize::from(vector)] = true;
        }
        let unnamed: Vec<u8> = (0..=LAST_EXCEPTION).filter(|&v| !seen[usize::from(v)]).collect();
        assert_eq!(unnamed, [22, 23, 24, 25, 26, 27, 31]);
    }

    #[test]
    fn unclaimed_exceptions_share_the_default_stub() {
        let table = VectorTable::build(&FakeTrampolines, CODE);

        let with_error_code: Vec<u8> = NAMED
            .into_iter()
            .filter(|&v| pushes_error_code(v) && Exception::from_vector(v).is_none())
            .collect();
        assert_eq!(
            with_error_code,
            [
                DOUBLE_FAULT,
                INVALID_TSS,
                ALIGNMENT_CHECK,
                CONTROL_PROTECTION,
                VMM_COMMUNICATION,
                SECURITY_EXCEPTION
            ]
        );

        let without_error_code = [
            DEBUG,
            NON_MASKABLE_INTERRUPT,
            BREAKPOINT,
            OVERFLOW,
            BOUND_RANGE_EXCEEDED,
            DEVICE_NOT_AVAILABLE,
            COPROCESSOR_SEGMENT_OVERRUN,
            X87_FLOATING_POINT,
            MACHINE_CHECK,
            SIMD_FLOATING_POINT,
            VIRTUALIZATION,
            HYPERVISOR_INJECTION,
        ];
        for &vector in &without_error_code {
            assert!(!pushes_error_code(vector), "vector {vector}");
        }

        for vector in with_error_code.into_iter().chain(without_error_code) {
            let stub = FakeTrampolines.stub_at(table[vector].handler_address());
            assert_eq!(stub, Some(Stub::Default), "vector {vector}");
        }
        assert!(pushes_error_code(PAGE_FAULT));
        assert!(!pushes_error_code(RESERVED_15));
    }
}
