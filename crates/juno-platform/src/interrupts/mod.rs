//! The workstation's I/O interrupt lines.
//!
//! [`PlatformInterrupts`] latches the level of each line; devices hold an
//! [`IrqLine`] handle bound to their source and raise/lower it as their
//! hardware would drive the physical wire. The CPU model polls
//! [`PlatformInterrupts::is_raised`] between instructions.
//!
//! Per-line raise counters are kept so tests can assert exactly-once
//! delivery without hooking the CPU model in.

use std::cell::RefCell;
use std::rc::Rc;

/// Interrupt sources of the I/O subsystem, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Uart,
    Keyboard,
    Floppy,
    HardDisk,
}

impl Interrupt {
    const COUNT: usize = 4;

    fn index(self) -> usize {
        match self {
            Interrupt::Uart => 0,
            Interrupt::Keyboard => 1,
            Interrupt::Floppy => 2,
            Interrupt::HardDisk => 3,
        }
    }
}

/// Latched interrupt-line state for the whole machine.
#[derive(Debug, Default)]
pub struct PlatformInterrupts {
    raised: [bool; Interrupt::COUNT],
    raise_counts: [u64; Interrupt::COUNT],
}

impl PlatformInterrupts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drives the line high. Counted even when the line is already high
    /// (re-raising an unacknowledged line is how the hardware behaves).
    pub fn raise(&mut self, source: Interrupt) {
        self.raised[source.index()] = true;
        self.raise_counts[source.index()] += 1;
    }

    pub fn clear(&mut self, source: Interrupt) {
        self.raised[source.index()] = false;
    }

    pub fn is_raised(&self, source: Interrupt) -> bool {
        self.raised[source.index()]
    }

    /// Total number of raise edges seen on `source` since power-on.
    pub fn raise_count(&self, source: Interrupt) -> u64 {
        self.raise_counts[source.index()]
    }
}

pub type SharedInterrupts = Rc<RefCell<PlatformInterrupts>>;

/// A device-held handle to one interrupt line.
#[derive(Clone)]
pub struct IrqLine {
    ints: SharedInterrupts,
    source: Interrupt,
}

impl IrqLine {
    pub fn new(ints: SharedInterrupts, source: Interrupt) -> Self {
        Self { ints, source }
    }

    pub fn raise(&self) {
        self.ints.borrow_mut().raise(self.source);
    }

    pub fn clear(&self) {
        self.ints.borrow_mut().clear(self.source);
    }

    pub fn is_raised(&self) -> bool {
        self.ints.borrow().is_raised(self.source)
    }
}

impl std::fmt::Debug for IrqLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IrqLine")
            .field("source", &self.source)
            .field("raised", &self.is_raised())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_and_clear_latch_per_line() {
        let mut ints = PlatformInterrupts::new();
        ints.raise(Interrupt::HardDisk);
        assert!(ints.is_raised(Interrupt::HardDisk));
        assert!(!ints.is_raised(Interrupt::Keyboard));

        ints.clear(Interrupt::HardDisk);
        assert!(!ints.is_raised(Interrupt::HardDisk));
    }

    #[test]
    fn raise_count_tracks_every_edge() {
        let mut ints = PlatformInterrupts::new();
        ints.raise(Interrupt::HardDisk);
        ints.raise(Interrupt::HardDisk);
        ints.clear(Interrupt::HardDisk);
        ints.raise(Interrupt::HardDisk);
        assert_eq!(ints.raise_count(Interrupt::HardDisk), 3);
        assert_eq!(ints.raise_count(Interrupt::Floppy), 0);
    }

    #[test]
    fn irq_line_handles_share_the_controller() {
        let ints: SharedInterrupts = Rc::new(RefCell::new(PlatformInterrupts::new()));
        let line = IrqLine::new(ints.clone(), Interrupt::HardDisk);
        let alias = line.clone();

        line.raise();
        assert!(alias.is_raised());
        assert!(ints.borrow().is_raised(Interrupt::HardDisk));

        alias.clear();
        assert!(!line.is_raised());
    }
}
