use core::fmt;

use spin::{Mutex, MutexGuard};

/// COM1, the kernel's only console.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub static SERIAL: spin::Lazy<Mutex<uart_16550::SerialPort>> = spin::Lazy::new(|| {
    let mut serial_port = unsafe { uart_16550::SerialPort::new(0x3F8) };
    serial_port.init();
    Mutex::new(serial_port)
});

/// Takes `lock` whether or not someone already holds it.
///
/// # Safety
/// The current holder must never touch the value again, as on a path that
/// halts the machine.
pub unsafe fn seize<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    if let Some(guard) = lock.try_lock() {
        return guard;
    }
    unsafe { lock.force_unlock() };
    lock.lock()
}

#[doc(hidden)]
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;

    crate::instructions::interrupts::without_interrupts(|| {
        let _ = SERIAL.lock().write_fmt(args);
    });
}

/// No UART to write to on other hosts.
#[doc(hidden)]
#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
pub fn _print(_args: fmt::Arguments) {}

/// Prints to the serial console.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::serial::_print(format_args!($($arg)*))
    };
}

/// Prints to the serial console, with a newline.
#[macro_export]
macro_rules! println {
    () => {
        $crate::print!("\n")
    };
    ($($arg:tt)*) => {
        $crate::print!("{}\n", format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::String;

    #[test]
    fn seize_takes_a_free_lock() {
        let console = Mutex::new(String::new());
        unsafe { seize(&console) }.push_str("ok");
        assert_eq!(*console.lock(), "ok");
    }

    #[test]
    fn seize_takes_a_lock_whose_holder_never_returns() {
        let console = Mutex::new(String::from("half a line"));
        core::mem::forget(console.lock());
        assert!(console.is_locked());

        let mut guard = unsafe { seize(&console) };
        guard.push_str("\nDivide by zero!\n");
        drop(guard);

        assert!(!console.is_locked());
        assert_eq!(*console.lock(), "half a line\nDivide by zero!\n");
    }
}
