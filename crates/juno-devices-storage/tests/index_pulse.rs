//! The index pulse models continuous platter rotation: high for the pulse
//! width, low for the rotation period, forever, command activity or not.

use juno_devices_storage::shugart::{
    DiskTimer, ShugartController, DISC_ROTATION_NS, INDEX_PULSE_NS, STATUS_INDEX,
};
use juno_platform::interrupts::{Interrupt, IrqLine, PlatformInterrupts, SharedInterrupts};
use juno_platform::time::{Clock, TimerQueue};
use juno_storage::{DiskImage, DriveGeometry};
use std::cell::RefCell;
use std::rc::Rc;

const SMALL: DriveGeometry = DriveGeometry {
    cylinders: 4,
    heads: 1,
    sectors: 2,
    header_bytes: 2,
    data_bytes: 8,
};

struct Rig {
    ctrl: ShugartController,
    queue: TimerQueue<DiskTimer>,
    clock: Clock,
    ints: SharedInterrupts,
}

impl Rig {
    fn new() -> Self {
        let ints: SharedInterrupts = Rc::new(RefCell::new(PlatformInterrupts::new()));
        let irq = IrqLine::new(ints.clone(), Interrupt::HardDisk);
        let mut queue = TimerQueue::new();
        let clock = Clock::new();
        let ctrl = ShugartController::new(
            Some(DiskImage::blank(SMALL)),
            irq,
            clock.now_ns(),
            &mut queue,
        );
        Self {
            ctrl,
            queue,
            clock,
            ints,
        }
    }

    fn run_for(&mut self, ns: u64) {
        self.clock.advance(ns);
        while let Some((at, ev)) = self.queue.pop_due(self.clock.now_ns()) {
            self.ctrl.handle_timer(ev, at, &mut self.queue);
        }
    }

    fn index(&self) -> bool {
        self.ctrl.read_status() & STATUS_INDEX != 0
    }
}

#[test]
fn index_is_high_for_the_pulse_width_then_low_for_a_rotation() {
    let mut rig = Rig::new();

    // High from power-on through the whole pulse width.
    assert!(rig.index());
    rig.run_for(INDEX_PULSE_NS - 1);
    assert!(rig.index());

    // Falls exactly at the end of the pulse.
    rig.run_for(1);
    assert!(!rig.index());

    // Low for a full rotation period.
    rig.run_for(DISC_ROTATION_NS - 1);
    assert!(!rig.index());

    // Rises again for the next pulse.
    rig.run_for(1);
    assert!(rig.index());
}

#[test]
fn duty_cycle_repeats_indefinitely() {
    let mut rig = Rig::new();
    for cycle in 0..4 {
        assert!(rig.index(), "pulse start, cycle {cycle}");
        rig.run_for(INDEX_PULSE_NS);
        assert!(!rig.index(), "pulse end, cycle {cycle}");
        rig.run_for(DISC_ROTATION_NS);
        assert!(rig.index(), "next pulse, cycle {cycle}");
    }
}

#[test]
fn index_pulses_raise_no_interrupts() {
    let mut rig = Rig::new();
    rig.run_for(3 * (INDEX_PULSE_NS + DISC_ROTATION_NS));
    assert_eq!(rig.ints.borrow().raise_count(Interrupt::HardDisk), 0);
}
