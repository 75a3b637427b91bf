//! # Programmable Interrupt Controller (8259 PIC)
//!
//! Configures the legacy 8259 pair for interrupt routing.
//!
//! ## PIC Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐
//! │   PIC 1     │     │   PIC 2     │
//! │  (Primary)  │◀────│ (Secondary) │
//! │ IRQ 0-7     │ IRQ2│ IRQ 8-15    │
//! └─────────────┘     └─────────────┘
//!       │
//!       ▼
//!     CPU
//! ```
//!
//! ## Vector Remapping
//!
//! At power-on IRQ 0-7 report as vectors 8-15, on top of CPU exceptions.
//! [`Pic8259::initialize`] moves them:
//! - PIC 1: vectors 32-39 (IRQ 0-7)
//! - PIC 2: vectors 40-47 (IRQ 8-15)
//!
//! Only the timer (IRQ0) and keyboard (IRQ1) lines are unmasked at boot.

use spin::Mutex;

use crate::instructions::port::PortIo;

pub const PIC_1_OFFSET: u8 = 32;
pub const PIC_2_OFFSET: u8 = 40;

pub const PIC_1_COMMAND: u16 = 0x20;
pub const PIC_1_DATA: u16 = 0x21;
pub const PIC_2_COMMAND: u16 = 0xA0;
pub const PIC_2_DATA: u16 = 0xA1;

/// ICW1: initialization, ICW4 follows, cascade mode, edge triggered.
pub const ICW1_INIT: u8 = 0x11;
/// ICW4: 8086/88 mode, normal EOI.
pub const ICW4_8086: u8 = 0x01;
/// ICW3 for the primary: secondary hangs off line 2.
pub const CASCADE_LINE_MASK: u8 = 1 << CASCADE_LINE;
/// ICW3 for the secondary: its cascade identity.
pub const CASCADE_IDENTITY: u8 = CASCADE_LINE;
pub const CASCADE_LINE: u8 = 2;
/// Non-specific end of interrupt.
pub const CMD_END_OF_INTERRUPT: u8 = 0x20;

/// Timer (IRQ0) and keyboard (IRQ1) enabled.
pub const INITIAL_PRIMARY_MASK: u8 = 0xFC;
pub const INITIAL_SECONDARY_MASK: u8 = 0xFF;

/// Which controller(s) an acknowledgment goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EoiTarget {
    /// The interrupt came in on this line (0-15).
    Line(u8),
    /// Source unknown; acknowledge the primary only.
    Primary,
}

/// Acknowledgment side of an interrupt controller.
pub trait InterruptController {
    /// Tells the controller the current interrupt has been serviced.
    fn send_eoi(&mut self, target: EoiTarget);
}

/// One 8259 chip.
#[derive(Debug, Clone, Copy)]
struct Pic {
    offset: u8,
    command: u16,
    data: u16,
}

impl Pic {
    const fn handles_interrupt(&self, vector: u8) -> bool {
        self.offset <= vector && vector < self.offset + 8
    }
}

/// The chained primary/secondary pair.
pub struct Pic8259<P> {
    primary: Pic,
    secondary: Pic,
    ports: P,
}

impl<P> Pic8259<P> {
    pub const fn new(primary_offset: u8, secondary_offset: u8, ports: P) -> Self {
        Self {
            primary: Pic {
                offset: primary_offset,
                command: PIC_1_COMMAND,
                data: PIC_1_DATA,
            },
            secondary: Pic {
                offset: secondary_offset,
                command: PIC_2_COMMAND,
                data: PIC_2_DATA,
            },
            ports,
        }
    }

    pub const fn vector_for_line(&self, line: u8) -> u8 {
        if line < 8 {
            self.primary.offset + line
        } else {
            self.secondary.offset + (line - 8)
        }
    }

    pub const fn line_for_vector(&self, vector: u8) -> Option<u8> {
        if self.primary.handles_interrupt(vector) {
            Some(vector - self.primary.offset)
        } else if self.secondary.handles_interrupt(vector) {
            Some(vector - self.secondary.offset + 8)
        } else {
            None
        }
    }

    pub const fn handles_interrupt(&self, vector: u8) -> bool {
        self.primary.handles_interrupt(vector) || self.secondary.handles_interrupt(vector)
    }

    pub fn ports(&self) -> &P {
        &self.ports
    }
}

impl<P: PortIo> Pic8259<P> {
    /// Runs the ICW1-ICW4 sequence on both chips, then applies the boot masks.
    ///
    /// # Safety
    /// Interrupts must be disabled and the IDT must route both new vector
    /// ranges somewhere before any line is unmasked.
    pub unsafe fn initialize(&mut self) {
        let (primary, secondary) = (self.primary, self.secondary);
        unsafe {
            self.ports.write(primary.command, ICW1_INIT);
            self.ports.wait();
            self.ports.write(secondary.command, ICW1_INIT);
            self.ports.wait();

            self.ports.write(primary.data, primary.offset);
            self.ports.wait();
            self.ports.write(secondary.data, secondary.offset);
            self.ports.wait();

            self.ports.write(primary.data, CASCADE_LINE_MASK);
            self.ports.wait();
            self.ports.write(secondary.data, CASCADE_IDENTITY);
            self.ports.wait();

            self.ports.write(primary.data, ICW4_8086);
            self.ports.wait();
            self.ports.write(secondary.data, ICW4_8086);
            self.ports.wait();

            self.set_masks(INITIAL_PRIMARY_MASK, INITIAL_SECONDARY_MASK);
        }
        log::info!(
            "pic remapped to {}/{}, masks {:#04x}/{:#04x}",
            primary.offset,
            secondary.offset,
            INITIAL_PRIMARY_MASK,
            INITIAL_SECONDARY_MASK
        );
    }

    /// Reads both interrupt mask registers.
    pub fn masks(&mut self) -> (u8, u8) {
        unsafe { (self.ports.read(self.primary.data), self.ports.read(self.secondary.data)) }
    }

    /// # Safety
    /// Unmasking a line without a handler behind its vector sends it to the
    /// default stub.
    pub unsafe fn set_masks(&mut self, primary: u8, secondary: u8) {
        unsafe {
            self.ports.write(self.primary.data, primary);
            self.ports.write(self.secondary.data, secondary);
        }
    }

    pub fn mask_line(&mut self, line: u8) {
        let (chip, bit) = self.locate(line);
        unsafe {
            let mask = self.ports.read(chip.data);
            self.ports.write(chip.data, mask | (1 << bit));
        }
    }

    /// # Safety
    /// See [`Self::set_masks`].
    pub unsafe fn unmask_line(&mut self, line: u8) {
        let (chip, bit) = self.locate(line);
        unsafe {
            let mask = self.ports.read(chip.data);
            self.ports.write(chip.data, mask & !(1 << bit));
        }
    }

    fn locate(&self, line: u8) -> (Pic, u8) {
        debug_assert!(line < 16, "irq line {line} out of range");
        if line < 8 {
            (self.primary, line)
        } else {
            (self.secondary, line - 8)
        }
    }
}

impl<P: PortIo> InterruptController for Pic8259<P> {
    fn send_eoi(&mut self, target: EoiTarget) {
        unsafe {
            if let EoiTarget::Line(line) = target {
                if line >= 8 {
                    self.ports.write(self.secondary.command, CMD_END_OF_INTERRUPT);
                }
            }
            self.ports.write(self.primary.command, CMD_END_OF_INTERRUPT);
        }
    }
}

/// Runs `f` on the shared controller pair.
///
/// Handlers for NMI, `int3` and unclaimed vectors can land while ordinary code
/// holds `pics`. The 8259 pair keeps no state on this side of the port
/// accesses, so a fresh handle built over `ports()` drives the same chips.
pub fn with_controller<P, R>(
    pics: &Mutex<Pic8259<P>>,
    ports: impl FnOnce() -> P,
    f: impl FnOnce(&mut Pic8259<P>) -> R,
) -> R {
    match pics.try_lock() {
        Some(mut guard) => f(&mut guard),
        None => f(&mut Pic8259::new(PIC_1_OFFSET, PIC_2_OFFSET, ports())),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::interrupts::handlers;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::vec::Vec;

    /// Records every port write and keeps the two mask registers.
    #[derive(Default)]
    pub(crate) struct RecordingPorts {
        pub writes: Vec<(u16, u8)>,
        pub primary_mask: u8,
        pub secondary_mask: u8,
    }

    impl RecordingPorts {
        fn writes_to(&self, port: u16) -> Vec<u8> {
            self.writes.iter().filter(|(p, _)| *p == port).map(|&(_, v)| v).collect()
        }
    }

    impl PortIo for RecordingPorts {
        unsafe fn read(&mut self, port: u16) -> u8 {
            match port {
                PIC_1_DATA => self.primary_mask,
                PIC_2_DATA => self.secondary_mask,
                _ => 0,
            }
        }

        unsafe fn write(&mut self, port: u16, value: u8) {
            match port {
                PIC_1_DATA => self.primary_mask = value,
                PIC_2_DATA => self.secondary_mask = value,
                _ => {}
            }
            self.writes.push((port, value));
        }

        unsafe fn wait(&mut self) {}
    }

    fn pics() -> Pic8259<RecordingPorts> {
        Pic8259::new(PIC_1_OFFSET, PIC_2_OFFSET, RecordingPorts::default())
    }

    #[test]
    fn initialization_sequence_remaps_both_chips() {
        let mut pics = pics();
        unsafe { pics.initialize() };

        let ports = pics.ports();
        assert_eq!(ports.writes_to(PIC_1_COMMAND), [ICW1_INIT]);
        assert_eq!(ports.writes_to(PIC_2_COMMAND), [ICW1_INIT]);
        assert_eq!(
            ports.writes_to(PIC_1_DATA),
            [32, CASCADE_LINE_MASK, ICW4_8086, INITIAL_PRIMARY_MASK]
        );
        assert_eq!(
            ports.writes_to(PIC_2_DATA),
            [40, CASCADE_IDENTITY, ICW4_8086, INITIAL_SECONDARY_MASK]
        );
    }

    #[test]
    fn icw1_precedes_offsets() {
        let mut pics = pics();
        unsafe { pics.initialize() };
        let writes = &pics.ports().writes;
        assert_eq!(writes[0], (PIC_1_COMMAND, ICW1_INIT));
        assert_eq!(writes[1], (PIC_2_COMMAND, ICW1_INIT));
        assert_eq!(writes[2], (PIC_1_DATA, 32));
        assert_eq!(writes[3], (PIC_2_DATA, 40));
    }

    #[test]
    fn boot_masks_enable_timer_and_keyboard_only() {
        let mut pics = pics();
        unsafe { pics.initialize() };
        let (primary, secondary) = pics.masks();
        assert_eq!(primary & 0b11, 0);
        assert_eq!(primary | 0b11, 0xFF);
        assert_eq!(secondary, 0xFF);
    }

    /// Mapping needs no port access, so it is usable in const context.
    const UNWIRED: Pic8259<()> = Pic8259::new(PIC_1_OFFSET, PIC_2_OFFSET, ());

    #[test]
    fn mapping_without_port_access() {
        assert_eq!(UNWIRED.vector_for_line(1), 33);
        assert_eq!(UNWIRED.line_for_vector(40), Some(8));
    }

    #[test]
    fn remapped_lines() {
        let pics = pics();
        assert_eq!(pics.vector_for_line(0), 32);
        assert_eq!(pics.vector_for_line(8), 40);
        assert_eq!(pics.vector_for_line(15), 47);
        assert_eq!(pics.line_for_vector(33), Some(1));
        assert_eq!(pics.line_for_vector(44), Some(12));
        assert_eq!(pics.line_for_vector(14), None);
        assert!(!pics.handles_interrupt(48));
    }

    #[test]
    fn eoi_goes_to_secondary_only_for_high_lines() {
        let mut pics = pics();
        pics.send_eoi(EoiTarget::Line(1));
        assert_eq!(pics.ports().writes, [(PIC_1_COMMAND, CMD_END_OF_INTERRUPT)]);

        let mut pics = self::pics();
        pics.send_eoi(EoiTarget::Line(12));
        assert_eq!(
            pics.ports().writes,
            [(PIC_2_COMMAND, CMD_END_OF_INTERRUPT), (PIC_1_COMMAND, CMD_END_OF_INTERRUPT)]
        );

        let mut pics = self::pics();
        pics.send_eoi(EoiTarget::Primary);
        assert_eq!(pics.ports().writes, [(PIC_1_COMMAND, CMD_END_OF_INTERRUPT)]);
    }

    #[test]
    fn masking_single_lines() {
        let mut pics = pics();
        unsafe { pics.set_masks(0xFF, 0xFF) };
        unsafe { pics.unmask_line(1) };
        unsafe { pics.unmask_line(12) };
        assert_eq!(pics.masks(), (0xFD, 0xEF));
        pics.mask_line(1);
        assert_eq!(pics.masks(), (0xFF, 0xEF));
    }

    /// Port log shared between every handle built over it.
    #[derive(Clone, Default)]
    struct SharedPorts(Rc<RefCell<Vec<(u16, u8)>>>);

    impl PortIo for SharedPorts {
        unsafe fn read(&mut self, _port: u16) -> u8 {
            0
        }

        unsafe fn write(&mut self, port: u16, value: u8) {
            self.0.borrow_mut().push((port, value));
        }

        unsafe fn wait(&mut self) {}
    }

    #[test]
    fn default_handler_acknowledges_while_the_pair_is_locked() {
        let log = SharedPorts::default();
        let pics = Mutex::new(Pic8259::new(PIC_1_OFFSET, PIC_2_OFFSET, log.clone()));
        let held = pics.lock();

        with_controller(&pics, || log.clone(), |pic| handlers::default_interrupt(pic));

        assert!(pics.is_locked());
        assert_eq!(*log.0.borrow(), [(PIC_1_COMMAND, CMD_END_OF_INTERRUPT)]);
        drop(held);
        assert!(!pics.is_locked());
    }

    #[test]
    fn uncontended_pair_is_used_in_place() {
        let pics = Mutex::new(pics());
        with_controller(
            &pics,
            || unreachable!("fresh handle built for a free lock"),
            |pic| handlers::timer_tick(pic),
        );
        assert!(!pics.is_locked());
        assert_eq!(pics.lock().ports().writes, [(PIC_1_COMMAND, CMD_END_OF_INTERRUPT)]);
    }
}
