//! Early-boot interrupt subsystem for a 32-bit x86 kernel.
//!
//! Everything except the trampolines and the instructions behind
//! `#[cfg(target_arch = "x86")]` builds and runs on the host, which is where
//! the unit tests execute.

#![cfg_attr(not(test), no_std)]

pub mod cpu;
pub mod drivers;
pub mod instructions;
pub mod interrupts;
pub mod kernel;
pub mod logger;
pub mod serial;
