#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
extern crate rlibc;

#[cfg(target_os = "none")]
mod boot {
    use core::panic::PanicInfo;

    use corvid::instructions::halt_loop;
    use corvid::kernel::{self, BootError};
    use corvid::logger::LOGGER;
    use corvid::println;

    const MULTIBOOT_MAGIC: u32 = 0x1BAD_B002;
    /// Page-aligned modules, memory map requested.
    const MULTIBOOT_FLAGS: u32 = 0x0000_0003;
    const STACK_SIZE: usize = 16 * 1024;

    core::arch::global_asm!(
        ".section .multiboot, \"a\"",
        ".align 4",
        ".long {magic}",
        ".long {flags}",
        ".long {checksum}",
        "",
        ".section .bss",
        ".align 16",
        "boot_stack_bottom:",
        ".skip {stack_size}",
        "boot_stack_top:",
        "",
        ".section .text",
        ".global _start",
        "_start:",
        "    cli",
        "    lea esp, [boot_stack_top]",
        "    call {main}",
        "2:",
        "    cli",
        "    hlt",
        "    jmp 2b",
        magic = const MULTIBOOT_MAGIC,
        flags = const MULTIBOOT_FLAGS,
        checksum = const 0u32.wrapping_sub(MULTIBOOT_MAGIC).wrapping_sub(MULTIBOOT_FLAGS),
        stack_size = const STACK_SIZE,
        main = sym kernel_main,
    );

    extern "C" fn kernel_main() -> ! {
        LOGGER.init();

        let mut platform = kernel::init::BareMetal;
        if let Err(e) = kernel::init(&mut platform) {
            abort(e);
        }

        debug_assert!(kernel::all_phases_ready());
        println!("Interrupts online.");
        loop {
            while let Some(scancode) = corvid::drivers::ps2_keyboard::dequeue_scancode() {
                log::trace!("scancode {:#04x}", scancode);
            }
            corvid::instructions::hlt();
        }
    }

    fn abort(error: BootError) -> ! {
        println!("Kernel initialization failed: {}", error);
        for phase in kernel::Phase::ALL {
            println!("  {}: {}", phase.name(), kernel::phase_status(phase));
        }
        halt_loop()
    }

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        println!("PANIC : {}", info);
        halt_loop()
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    eprintln!("corvid is a freestanding kernel; build it with --target i686-corvid.json");
}
