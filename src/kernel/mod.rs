//! Boot sequence and per-phase bookkeeping.
pub mod init;
pub mod status;

pub use init::{init, BootError, Phase, Platform};
pub use status::{all_phases_ready, phase_status, PhaseState};
