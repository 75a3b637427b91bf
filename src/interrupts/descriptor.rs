//! # Gate descriptors
//!
//! Binary layouts the CPU reads directly: the 8-byte protected-mode gate and
//! the 6-byte pseudo-descriptor handed to `lidt`.
//!
//! ```text
//!  63            48 47 46 45 44   40 39      32 31          16 15           0
//! ┌────────────────┬──┬─────┬──┬─────┬──────────┬──────────────┬──────────────┐
//! │ offset 31..16  │P │ DPL │0 │type │ reserved │   selector   │ offset 15..0 │
//! └────────────────┴──┴─────┴──┴─────┴──────────┴──────────────┴──────────────┘
//! ```

use core::mem::{offset_of, size_of};

use x86_64::structures::gdt::SegmentSelector;
use x86_64::PrivilegeLevel;

/// Gate kinds valid in a 32-bit IDT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GateKind {
    /// Clears IF on entry.
    Interrupt = 0xE,
    /// Leaves IF untouched.
    Trap = 0xF,
}

impl GateKind {
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0x0F {
            0xE => Some(GateKind::Interrupt),
            0xF => Some(GateKind::Trap),
            _ => None,
        }
    }
}

const PRESENT: u8 = 1 << 7;
const DPL_SHIFT: u8 = 5;

/// Packs the type/attribute byte.
pub const fn attributes(kind: GateKind, dpl: PrivilegeLevel, present: bool) -> u8 {
    let present = if present { PRESENT } else { 0 };
    present | ((dpl as u8) << DPL_SHIFT) | kind as u8
}

/// Present, ring 0, 32-bit interrupt gate (`0x8E`).
pub const INTERRUPT_GATE: u8 = attributes(GateKind::Interrupt, PrivilegeLevel::Ring0, true);

/// Present, ring 0, 32-bit trap gate (`0x8F`).
pub const TRAP_GATE: u8 = attributes(GateKind::Trap, PrivilegeLevel::Ring0, true);

/// One IDT entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct GateDescriptor {
    offset_low: u16,
    selector: u16,
    reserved: u8,
    type_attributes: u8,
    offset_high: u16,
}

const _: () = {
    assert!(size_of::<GateDescriptor>() == 8);
    assert!(offset_of!(GateDescriptor, offset_low) == 0);
    assert!(offset_of!(GateDescriptor, selector) == 2);
    assert!(offset_of!(GateDescriptor, reserved) == 4);
    assert!(offset_of!(GateDescriptor, type_attributes) == 5);
    assert!(offset_of!(GateDescriptor, offset_high) == 6);
};

impl GateDescriptor {
    /// An all-zero, non-present entry.
    pub const MISSING: Self = Self {
        offset_low: 0,
        selector: 0,
        reserved: 0,
        type_attributes: 0,
        offset_high: 0,
    };

    pub const fn new(handler: u32, selector: SegmentSelector, type_attributes: u8) -> Self {
        Self {
            offset_low: (handler & 0x0000_FFFF) as u16,
            offset_high: ((handler & 0xFFFF_0000) >> 16) as u16,
            selector: selector.0,
            reserved: 0,
            type_attributes,
        }
    }

    /// Interrupt gate into ring 0 code.
    pub const fn interrupt(handler: u32, selector: SegmentSelector) -> Self {
        Self::new(handler, selector, INTERRUPT_GATE)
    }

    pub const fn handler_address(&self) -> u32 {
        (self.offset_high as u32) << 16 | self.offset_low as u32
    }

    pub const fn selector(&self) -> SegmentSelector {
        SegmentSelector(self.selector)
    }

    pub const fn type_attributes(&self) -> u8 {
        self.type_attributes
    }

    pub const fn is_present(&self) -> bool {
        self.type_attributes & PRESENT != 0
    }

    pub const fn kind(&self) -> Option<GateKind> {
        GateKind::from_bits(self.type_attributes)
    }

    pub fn privilege_level(&self) -> PrivilegeLevel {
        PrivilegeLevel::from_u16(u16::from((self.type_attributes >> DPL_SHIFT) & 0b11))
    }

    /// A present gate with a recognised kind and a zero reserved byte.
    pub fn is_valid(&self) -> bool {
        self.is_present() && self.kind().is_some() && self.reserved == 0
    }

    /// Encodes the entry in the order the CPU reads it.
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[0..2].copy_from_slice(&self.offset_low.to_le_bytes());
        bytes[2..4].copy_from_slice(&self.selector.to_le_bytes());
        bytes[4] = self.reserved;
        bytes[5] = self.type_attributes;
        bytes[6..8].copy_from_slice(&self.offset_high.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Self {
            offset_low: u16::from_le_bytes([bytes[0], bytes[1]]),
            selector: u16::from_le_bytes([bytes[2], bytes[3]]),
            reserved: bytes[4],
            type_attributes: bytes[5],
            offset_high: u16::from_le_bytes([bytes[6], bytes[7]]),
        }
    }
}

/// Operand of `lidt` in protected mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, packed(2))]
pub struct TableRegister {
    pub limit: u16,
    pub base: u32,
}

const _: () = assert!(size_of::<TableRegister>() == 6);

impl TableRegister {
    pub const fn new(base: u32, limit: u16) -> Self {
        Self { limit, base }
    }

    pub fn to_bytes(&self) -> [u8; 6] {
        let (limit, base) = (self.limit, self.base);
        let mut bytes = [0u8; 6];
        bytes[0..2].copy_from_slice(&limit.to_le_bytes());
        bytes[2..6].copy_from_slice(&base.to_le_bytes());
        bytes
    }
}
