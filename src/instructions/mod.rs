//! Thin wrappers around the privileged x86 instructions the kernel needs.
//!
//! Everything here compiles to nothing on the host; the library's logic only
//! reaches hardware through the traits in [`port`] and [`crate::interrupts`].

pub mod port;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
use core::arch::asm;

/// Halts the CPU until the next interrupt arrives.
#[inline]
pub fn hlt() {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    unsafe {
        asm!("hlt", options(nomem, nostack, preserves_flags));
    }
}

/// Disables interrupts and halts forever.
pub fn halt_loop() -> ! {
    loop {
        interrupts::disable();
        hlt();
    }
}

pub mod interrupts {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    use core::arch::asm;

    const EFLAGS_IF: usize = 1 << 9;

    /// Sets the interrupt flag.
    #[inline]
    pub fn enable() {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        unsafe {
            asm!("sti", options(nomem, nostack));
        }
    }

    /// Clears the interrupt flag.
    #[inline]
    pub fn disable() {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        unsafe {
            asm!("cli", options(nomem, nostack));
        }
    }

    /// Returns whether the interrupt flag is set.
    #[inline]
    pub fn are_enabled() -> bool {
        flags() & EFLAGS_IF != 0
    }

    /// Runs `f` with interrupts disabled, restoring the previous state afterwards.
    pub fn without_interrupts<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let saved = are_enabled();
        if saved {
            disable();
        }
        let ret = f();
        if saved {
            enable();
        }
        ret
    }

    #[cfg(target_arch = "x86")]
    fn flags() -> usize {
        let flags: usize;
        unsafe { asm!("pushfd", "pop {}", out(reg) flags, options(nomem, preserves_flags)) };
        flags
    }

    #[cfg(target_arch = "x86_64")]
    fn flags() -> usize {
        let flags: usize;
        unsafe { asm!("pushfq", "pop {}", out(reg) flags, options(nomem, preserves_flags)) };
        flags
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    fn flags() -> usize {
        0
    }
}
