//! System timer tick tracking.

use core::sync::atomic::{AtomicU64, Ordering};

pub static TIMER_TICKS: AtomicU64 = AtomicU64::new(0);

/// Counts one timer interrupt.
pub fn tick() {
    TIMER_TICKS.fetch_add(1, Ordering::Relaxed);
}

/// Ticks seen since the controller was programmed.
pub fn ticks() -> u64 {
    TIMER_TICKS.load(Ordering::Relaxed)
}
