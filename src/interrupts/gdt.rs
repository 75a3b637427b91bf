//! Flat-model Global Descriptor Table.
//!
//! Three entries: null, ring 0 code, ring 0 data, all spanning the full
//! 4 GiB. The IDT gates reference [`KERNEL_CODE_SELECTOR`], so this has to be
//! loaded before the vector table is activated.

use x86_64::structures::gdt::SegmentSelector;
use x86_64::PrivilegeLevel;

#[cfg(target_arch = "x86")]
use super::descriptor::TableRegister;

pub const KERNEL_CODE_SELECTOR: SegmentSelector = SegmentSelector::new(1, PrivilegeLevel::Ring0);
pub const KERNEL_DATA_SELECTOR: SegmentSelector = SegmentSelector::new(2, PrivilegeLevel::Ring0);

/// Present, ring 0, code, executable, readable.
const ACCESS_KERNEL_CODE: u8 = 0x9A;
/// Present, ring 0, data, writable.
const ACCESS_KERNEL_DATA: u8 = 0x92;
/// 4 KiB granularity, 32-bit segment.
const FLAGS_FLAT_32: u8 = 0xC;
const FLAT_LIMIT: u32 = 0xF_FFFF;

/// One 8-byte segment descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct SegmentDescriptor(u64);

impl SegmentDescriptor {
    pub const NULL: Self = Self(0);

    pub const fn new(base: u32, limit: u32, access: u8, flags: u8) -> Self {
        let mut raw = (limit & 0xFFFF) as u64;
        raw |= ((base & 0x00FF_FFFF) as u64) << 16;
        raw |= (access as u64) << 40;
        raw |= (((limit >> 16) & 0xF) as u64) << 48;
        raw |= ((flags & 0xF) as u64) << 52;
        raw |= ((base >> 24) as u64) << 56;
        Self(raw)
    }

    pub const fn kernel_code() -> Self {
        Self::new(0, FLAT_LIMIT, ACCESS_KERNEL_CODE, FLAGS_FLAT_32)
    }

    pub const fn kernel_data() -> Self {
        Self::new(0, FLAT_LIMIT, ACCESS_KERNEL_DATA, FLAGS_FLAT_32)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }

    pub const fn base(&self) -> u32 {
        ((self.0 >> 16) & 0x00FF_FFFF) as u32 | (((self.0 >> 56) as u32) << 24)
    }

    pub const fn limit(&self) -> u32 {
        (self.0 & 0xFFFF) as u32 | (((self.0 >> 48) & 0xF) as u32) << 16
    }

    pub const fn access(&self) -> u8 {
        (self.0 >> 40) as u8
    }
}

static GDT: [SegmentDescriptor; 3] = [
    SegmentDescriptor::NULL,
    SegmentDescriptor::kernel_code(),
    SegmentDescriptor::kernel_data(),
];

/// Loads the GDT and reloads every segment register. Safe to repeat.
#[cfg(target_arch = "x86")]
pub fn init() {
    let register = TableRegister::new(
        GDT.as_ptr() as usize as u32,
        (core::mem::size_of_val(&GDT) - 1) as u16,
    );

    unsafe {
        core::arch::asm!(
            "lgdt [{gdtr}]",
            "mov ds, {data:x}",
            "mov es, {data:x}",
            "mov fs, {data:x}",
            "mov gs, {data:x}",
            "mov ss, {data:x}",
            "push {code}",
            "lea {tmp}, [2f]",
            "push {tmp}",
            "retf",
            "2:",
            gdtr = in(reg) &register as *const TableRegister,
            data = in(reg) u32::from(KERNEL_DATA_SELECTOR.0),
            code = in(reg) u32::from(KERNEL_CODE_SELECTOR.0),
            tmp = out(reg) _,
        );
    }

    log::info!("gdt loaded, code {:#06x}, data {:#06x}", KERNEL_CODE_SELECTOR.0, KERNEL_DATA_SELECTOR.0);
}
