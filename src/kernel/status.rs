//! Where each boot phase got to.
//!
//! [`super::init`] records every transition here so the abort path (and
//! anything running after boot) can tell which phase stopped the machine.

use core::fmt;

use spin::Mutex;

use super::init::{BootError, Phase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseState {
    Pending,
    Running,
    Done,
    Aborted(BootError),
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseState::Pending => f.write_str("pending"),
            PhaseState::Running => f.write_str("running"),
            PhaseState::Done => f.write_str("done"),
            PhaseState::Aborted(error) => write!(f, "aborted ({})", error),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PhaseRecord {
    pub phase: Phase,
    pub state: PhaseState,
}

impl PhaseRecord {
    pub const fn pending(phase: Phase) -> Self {
        Self {
            phase,
            state: PhaseState::Pending,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == PhaseState::Done
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.state, PhaseState::Aborted(_))
    }
}

/// One record per boot phase, in boot order.
pub struct BootStatus {
    records: [PhaseRecord; Phase::ALL.len()],
}

impl BootStatus {
    pub const fn new() -> Self {
        Self {
            records: [
                PhaseRecord::pending(Phase::ALL[0]),
                PhaseRecord::pending(Phase::ALL[1]),
                PhaseRecord::pending(Phase::ALL[2]),
                PhaseRecord::pending(Phase::ALL[3]),
            ],
        }
    }

    pub fn update(&mut self, phase: Phase, state: PhaseState) {
        if let Some(record) = self.records.iter_mut().find(|r| r.phase == phase) {
            record.state = state;
        }
    }

    pub fn get(&self, phase: Phase) -> PhaseState {
        self.records
            .iter()
            .find(|r| r.phase == phase)
            .map_or(PhaseState::Pending, |r| r.state)
    }

    pub fn all_done(&self) -> bool {
        self.records.iter().all(PhaseRecord::is_done)
    }

    /// The phase that aborted boot, if any.
    pub fn aborted(&self) -> Option<&PhaseRecord> {
        self.records.iter().find(|r| r.is_aborted())
    }

    pub fn records(&self) -> &[PhaseRecord] {
        &self.records
    }
}

impl Default for BootStatus {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) static BOOT_STATUS: Mutex<BootStatus> = Mutex::new(BootStatus::new());

pub fn phase_status(phase: Phase) -> PhaseState {
    BOOT_STATUS.lock().get(phase)
}

/// True once [`super::init`] has run every phase to completion.
pub fn all_phases_ready() -> bool {
    BOOT_STATUS.lock().all_done()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn tracks_each_phase_independently() {
        let mut status = BootStatus::new();
        assert!(!status.all_done());
        assert!(status.aborted().is_none());

        status.update(Phase::CpuDetection, PhaseState::Done);
        status.update(Phase::SegmentTable, PhaseState::Aborted(BootError::CpuUnsupported));
        assert_eq!(status.get(Phase::CpuDetection), PhaseState::Done);
        assert_eq!(status.get(Phase::VectorTable), PhaseState::Pending);
        assert!(status.records()[1].is_aborted());
        assert_eq!(status.aborted().map(|r| r.phase), Some(Phase::SegmentTable));

        for phase in Phase::ALL {
            status.update(phase, PhaseState::Done);
        }
        assert!(status.all_done());
    }

    #[test]
    fn display() {
        assert_eq!(
            PhaseState::Aborted(BootError::CpuUnsupported).to_string(),
            "aborted (CPU detection failed)"
        );
        assert_eq!(PhaseState::Running.to_string(), "running");
    }
}
