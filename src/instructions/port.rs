//! Byte-wide I/O port access.
//!
//! Drivers take a [`PortIo`] implementation instead of touching ports
//! directly, so their command sequences can be replayed against a recording
//! double in tests.

/// Access to the x86 I/O port space.
pub trait PortIo {
    /// Reads one byte from `port`.
    ///
    /// # Safety
    /// Reading a device register can have side effects on the device.
    unsafe fn read(&mut self, port: u16) -> u8;

    /// Writes one byte to `port`.
    ///
    /// # Safety
    /// The caller must ensure the write is valid for the device behind `port`.
    unsafe fn write(&mut self, port: u16, value: u8);

    /// Gives slow devices time to settle between commands.
    ///
    /// # Safety
    /// Writes to the unused POST diagnostic port.
    unsafe fn wait(&mut self) {
        unsafe { self.write(POST_PORT, 0) };
    }
}

/// POST code port, unused after boot. Writing to it takes roughly 1µs.
pub const POST_PORT: u16 = 0x80;

/// The real port space, accessed with `in`/`out`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HardwarePorts;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
impl PortIo for HardwarePorts {
    #[inline]
    unsafe fn read(&mut self, port: u16) -> u8 {
        let value: u8;
        unsafe {
            core::arch::asm!("in al, dx", out("al") value, in("dx") port, options(nomem, nostack, preserves_flags));
        }
        value
    }

    #[inline]
    unsafe fn write(&mut self, port: u16, value: u8) {
        unsafe {
            core::arch::asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack, preserves_flags));
        }
    }
}
