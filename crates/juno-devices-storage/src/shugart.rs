//! Shugart-interface hard-disk controller.
//!
//! Register-level model of the workstation's hard-disk controller board,
//! faithful enough that the original microcode cannot tell it from the real
//! card. Three timing domains meet here:
//!
//! - CPU register writes (synchronous, handled to completion on the spot)
//! - the mechanical step-pulse seek handshake (clocked by bits 3/4 of every
//!   command-word write, one cylinder and one interrupt per full pulse)
//! - rotational timing (a perpetual index pulse, plus a fixed busy window
//!   before each command reports done)
//!
//! Deferred work is expressed as [`DiskTimer`] events on the platform
//! [`TimerQueue`]; the machine loop feeds due events back into
//! [`ShugartController::handle_timer`]. The controller never blocks and
//! never fails a register operation: bad commands are traced and dropped,
//! out-of-range seeks clamp against the head stops.
//!
//! Quirks preserved from the hardware:
//!
//! - buffer address low halves are stored through the board's address line
//!   scrambling ([`unfrob`]), high halves bit-inverted
//! - reading the status register has no side effect on the interrupt line
//! - command code 6 ("seek") is not wired to the dispatch PROM; all head
//!   motion goes through the step-pulse bits instead

use juno_platform::interrupts::IrqLine;
use juno_platform::memory::MemoryBus;
use juno_platform::time::TimerQueue;
use juno_storage::{DiskImage, Sector, SectorDisk};
use tracing::{debug, trace, warn};

/// One full platter rotation.
pub const DISC_ROTATION_NS: u64 = 20_000_000;
/// How long the index line stays high at the start of each rotation.
pub const INDEX_PULSE_NS: u64 = 1_100;
/// Fixed time any command reports Busy before completing.
pub const BUSY_DURATION_NS: u64 = 1_000_000;

// Command word: low 3 bits select the command; bits 3/4 double as the
// drive's step interface on every write, whatever the command bits say.
pub const CMD_IDLE: u16 = 0x0;
pub const CMD_READ_CHK: u16 = 0x1;
pub const CMD_READ_DIAG: u16 = 0x2;
pub const CMD_WRITE_CHK: u16 = 0x3;
pub const CMD_WRITE_FIRST: u16 = 0x4;
pub const CMD_FORMAT: u16 = 0x5;
pub const CMD_SEEK: u16 = 0x6;
pub const CMD_RESET: u16 = 0x7;
/// Step direction: clear steps toward cylinder 0, set steps away.
pub const CMD_STEP_DIR: u16 = 1 << 3;
/// Step pulse level.
pub const CMD_STEP: u16 = 1 << 4;

// Status word layout. Bits 0-2 carry the controller state.
pub const STATUS_DONE: u16 = 0b000;
pub const STATUS_BUSY: u16 = 0b111;
pub const STATUS_INDEX: u16 = 1 << 3;
pub const STATUS_TRACK_ZERO: u16 = 1 << 4;
pub const STATUS_DRIVE_FAULT: u16 = 1 << 5;
pub const STATUS_SEEK_COMPLETE: u16 = 1 << 6;
pub const STATUS_UNIT_READY: u16 = 1 << 7;

/// Deferred controller events, dispatched from the platform timer queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskTimer {
    /// End of the fixed busy window: report Done and interrupt.
    BusyDone,
    /// Leading edge of the index pulse.
    IndexStart,
    /// Trailing edge of the index pulse.
    IndexEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Idle,
    ReadChk,
    ReadDiag,
    WriteChk,
    WriteFirst,
    Format,
    Seek,
    Reset,
}

impl Command {
    fn decode(word: u16) -> Self {
        match word & 0x7 {
            CMD_IDLE => Command::Idle,
            CMD_READ_CHK => Command::ReadChk,
            CMD_READ_DIAG => Command::ReadDiag,
            CMD_WRITE_CHK => Command::WriteChk,
            CMD_WRITE_FIRST => Command::WriteFirst,
            CMD_FORMAT => Command::Format,
            CMD_SEEK => Command::Seek,
            CMD_RESET => Command::Reset,
            _ => unreachable!("3-bit command field"),
        }
    }
}

/// Controller operation state, reported in status bits 0-2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CtrlState {
    Done,
    Busy,
}

impl CtrlState {
    fn bits(self) -> u16 {
        match self {
            CtrlState::Done => STATUS_DONE,
            CtrlState::Busy => STATUS_BUSY,
        }
    }
}

/// Step-pulse handshake: software raises then lowers the step bit; the
/// head moves one cylinder per full pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeekState {
    WaitForStepSet,
    WaitForStepRelease,
    SeekComplete,
}

/// Inverse of the address-line scrambling the board applies to the low ten
/// bits of buffer addresses. Self-inverse; the upper six bits of the half
/// pass through untouched.
pub fn unfrob(value: u16) -> u16 {
    (value & 0xFC00) | (!value & 0x03FF)
}

fn status_word(
    state: CtrlState,
    index: bool,
    track_zero: bool,
    drive_fault: bool,
    seek_complete: bool,
    unit_ready: bool,
) -> u16 {
    state.bits()
        | if index { STATUS_INDEX } else { 0 }
        | if track_zero { STATUS_TRACK_ZERO } else { 0 }
        | if drive_fault { STATUS_DRIVE_FAULT } else { 0 }
        | if seek_complete { STATUS_SEEK_COMPLETE } else { 0 }
        | if unit_ready { STATUS_UNIT_READY } else { 0 }
}

pub struct ShugartController {
    disk: Option<DiskImage>,
    irq: IrqLine,

    // Logical target of the next block transfer. Decoupled from the head's
    // physical position: only `physical_cylinder` is clamped to the drive
    // and drives the track-zero line.
    cylinder: u16,
    head: u8,
    sector: u8,
    physical_cylinder: u16,

    // Pass-through registers; the controller stores these, nothing more.
    serial_low: u16,
    serial_high: u16,
    block_number: u16,

    // Buffer addresses as stored (already unfrobbed / un-inverted).
    header_addr_low: u16,
    header_addr_high: u16,
    data_buffer_low: u16,
    data_buffer_high: u16,

    state: CtrlState,
    index: bool,
    track_zero: bool,
    drive_fault: bool,
    seek_complete: bool,
    unit_ready: bool,

    seek_state: SeekState,
    command_word: u16,
}

impl ShugartController {
    /// Builds the controller and starts the index-pulse cycle, which runs
    /// on `queue` for the controller's whole lifetime.
    pub fn new(
        disk: Option<DiskImage>,
        irq: IrqLine,
        now_ns: u64,
        queue: &mut TimerQueue<DiskTimer>,
    ) -> Self {
        let unit_ready = disk.is_some();
        let mut ctrl = Self {
            disk,
            irq,
            cylinder: 0,
            head: 0,
            sector: 0,
            physical_cylinder: 0,
            serial_low: 0,
            serial_high: 0,
            block_number: 0,
            header_addr_low: 0,
            header_addr_high: 0,
            data_buffer_low: 0,
            data_buffer_high: 0,
            state: CtrlState::Done,
            // The platter is already spinning at power-on, so the machine
            // comes up inside an index pulse.
            index: true,
            track_zero: true,
            drive_fault: false,
            seek_complete: false,
            unit_ready,
            seek_state: SeekState::WaitForStepSet,
            command_word: 0,
        };
        queue.schedule(now_ns + INDEX_PULSE_NS, DiskTimer::IndexEnd);
        ctrl
    }

    pub fn attach(&mut self, disk: DiskImage) {
        self.disk = Some(disk);
        self.unit_ready = true;
    }

    pub fn detach(&mut self) -> Option<DiskImage> {
        self.unit_ready = false;
        self.disk.take()
    }

    pub fn disk(&self) -> Option<&DiskImage> {
        self.disk.as_ref()
    }

    pub fn disk_mut(&mut self) -> Option<&mut DiskImage> {
        self.disk.as_mut()
    }

    /// Logical (cylinder, head, sector) target, for inspection.
    pub fn logical_address(&self) -> (u16, u8, u8) {
        (self.cylinder, self.head, self.sector)
    }

    /// Where the head actually is.
    pub fn physical_cylinder(&self) -> u16 {
        self.physical_cylinder
    }

    /// Drive serial number as last written, low half first.
    pub fn serial_number(&self) -> u32 {
        u32::from(self.serial_low) | (u32::from(self.serial_high) << 16)
    }

    pub fn block_number(&self) -> u16 {
        self.block_number
    }

    /// Composes the status word. Reading it never touches the interrupt
    /// line; the microcode polls around that.
    pub fn read_status(&self) -> u16 {
        status_word(
            self.state,
            self.index,
            self.track_zero,
            self.drive_fault,
            self.seek_complete,
            self.unit_ready,
        )
    }

    pub fn write_head(&mut self, value: u16) {
        self.head = (value & 0x7) as u8;
    }

    /// Packed target register: bits 0-4 sector, 5-7 head, 8-15 cylinder.
    pub fn write_cylinder_sector(&mut self, value: u16) {
        self.sector = (value & 0x1F) as u8;
        self.head = ((value >> 5) & 0x7) as u8;
        self.cylinder = (value >> 8) & 0xFF;
    }

    pub fn write_serial_low(&mut self, value: u16) {
        self.serial_low = value;
    }

    pub fn write_serial_high(&mut self, value: u16) {
        self.serial_high = value;
    }

    pub fn write_block_number(&mut self, value: u16) {
        self.block_number = value;
    }

    pub fn write_header_addr_low(&mut self, value: u16) {
        self.header_addr_low = unfrob(value);
    }

    pub fn write_header_addr_high(&mut self, value: u16) {
        self.header_addr_high = !value;
    }

    pub fn write_data_buffer_addr_low(&mut self, value: u16) {
        self.data_buffer_low = unfrob(value);
    }

    pub fn write_data_buffer_addr_high(&mut self, value: u16) {
        self.data_buffer_high = !value;
    }

    /// Command register write: dispatch the low 3 bits, then clock the seek
    /// state machine with bits 3/4 of the same word. The step interface
    /// rides along on every write, whatever the command was.
    pub fn write_command(
        &mut self,
        value: u16,
        now_ns: u64,
        queue: &mut TimerQueue<DiskTimer>,
        mem: &mut dyn MemoryBus,
    ) {
        let value = value & 0x1F;
        self.command_word = value;
        trace!(command = value, "command register write");

        match Command::decode(value) {
            Command::Idle => self.irq.clear(),
            Command::Reset => self.reset(now_ns, queue),
            Command::ReadChk | Command::ReadDiag => self.read_block(now_ns, queue, mem),
            Command::WriteChk => self.write_block(false, now_ns, queue, mem),
            Command::WriteFirst | Command::Format => self.write_block(true, now_ns, queue, mem),
            Command::Seek => {
                // Not wired on the real board; head motion happens through
                // the step bits below.
                debug!(command = value, "unhandled command code");
            }
        }

        self.clock_seek();
    }

    /// Moves the head by a signed cylinder delta, clamped against the head
    /// stops. Also the fast path for programmatic multi-cylinder seeks.
    pub fn seek_by(&mut self, delta: i32) {
        let max = i32::from(self.cylinder_count()) - 1;
        let target = i32::from(self.physical_cylinder) + delta;
        self.physical_cylinder = target.clamp(0, max) as u16;
        self.track_zero = self.physical_cylinder == 0;
        trace!(cylinder = self.physical_cylinder, "head moved");
    }

    /// Delivers a due timer event. `at_ns` is the event's deadline, so the
    /// index cadence stays exact however late the queue is pumped.
    pub fn handle_timer(&mut self, timer: DiskTimer, at_ns: u64, queue: &mut TimerQueue<DiskTimer>) {
        match timer {
            DiskTimer::BusyDone => {
                self.state = CtrlState::Done;
                self.irq.raise();
            }
            DiskTimer::IndexStart => {
                self.index = true;
                queue.schedule(at_ns + INDEX_PULSE_NS, DiskTimer::IndexEnd);
            }
            DiskTimer::IndexEnd => {
                self.index = false;
                queue.schedule(at_ns + DISC_ROTATION_NS, DiskTimer::IndexStart);
            }
        }
    }

    fn cylinder_count(&self) -> u16 {
        // With no drive attached the head stays parked at cylinder 0.
        self.disk.as_ref().map_or(1, |d| d.geometry().cylinders)
    }

    fn reset(&mut self, now_ns: u64, queue: &mut TimerQueue<DiskTimer>) {
        self.drive_fault = false;
        self.seek_complete = false;
        self.physical_cylinder = 0;
        self.track_zero = true;
        self.seek_state = SeekState::WaitForStepSet;
        self.set_busy(now_ns, queue);
    }

    /// Enters Busy and arms the completion timer. A no-op while already
    /// Busy: a command issued mid-operation retargets the registers but
    /// must not arm a second completion.
    fn set_busy(&mut self, now_ns: u64, queue: &mut TimerQueue<DiskTimer>) {
        if self.state == CtrlState::Busy {
            return;
        }
        self.state = CtrlState::Busy;
        queue.schedule(now_ns + BUSY_DURATION_NS, DiskTimer::BusyDone);
    }

    /// Advances the step-pulse handshake against the latest command word.
    /// One full set/release pulse moves the head exactly one cylinder and
    /// raises exactly one interrupt.
    fn clock_seek(&mut self) {
        let step = self.command_word & CMD_STEP != 0;
        self.seek_state = match self.seek_state {
            SeekState::WaitForStepSet if step => {
                self.seek_complete = false;
                SeekState::WaitForStepRelease
            }
            SeekState::WaitForStepSet => SeekState::WaitForStepSet,
            SeekState::WaitForStepRelease if !step => SeekState::SeekComplete,
            SeekState::WaitForStepRelease => SeekState::WaitForStepRelease,
            // Transient: resolved below on the same clock.
            SeekState::SeekComplete => SeekState::SeekComplete,
        };

        if self.seek_state == SeekState::SeekComplete {
            let delta = if self.command_word & CMD_STEP_DIR != 0 {
                1
            } else {
                -1
            };
            self.seek_by(delta);
            self.seek_complete = true;
            self.irq.raise();
            self.seek_state = SeekState::WaitForStepSet;
        }
    }

    fn header_addr(&self) -> u32 {
        u32::from(self.header_addr_low) | (u32::from(self.header_addr_high) << 16)
    }

    fn data_buffer_addr(&self) -> u32 {
        u32::from(self.data_buffer_low) | (u32::from(self.data_buffer_high) << 16)
    }

    fn read_block(
        &mut self,
        now_ns: u64,
        queue: &mut TimerQueue<DiskTimer>,
        mem: &mut dyn MemoryBus,
    ) {
        let (cylinder, head, sector) = (self.cylinder, self.head, self.sector);
        let data_addr = self.data_buffer_addr();
        let header_addr = self.header_addr();
        trace!(cylinder, head, sector, "block read");

        match self.disk.as_ref().and_then(|d| d.sector(cylinder, head, sector)) {
            Some(contents) => {
                copy_to_memory(mem, data_addr, &contents.data);
                copy_to_memory(mem, header_addr, &contents.header);
            }
            None => warn!(cylinder, head, sector, "read outside attached drive"),
        }
        self.set_busy(now_ns, queue);
    }

    fn write_block(
        &mut self,
        write_header: bool,
        now_ns: u64,
        queue: &mut TimerQueue<DiskTimer>,
        mem: &mut dyn MemoryBus,
    ) {
        let (cylinder, head, sector) = (self.cylinder, self.head, self.sector);
        let data_addr = self.data_buffer_addr();
        let header_addr = self.header_addr();
        trace!(cylinder, head, sector, write_header, "block write");

        match &mut self.disk {
            Some(disk) if disk.geometry().contains(cylinder, head, sector) => {
                let geometry = disk.geometry();
                let mut contents = Sector::blank(&geometry);
                copy_from_memory(mem, data_addr, &mut contents.data);
                if write_header {
                    copy_from_memory(mem, header_addr, &mut contents.header);
                } else {
                    // Keep the header already on disk at this address.
                    contents.header = disk
                        .sector(cylinder, head, sector)
                        .expect("address inside geometry")
                        .header
                        .clone();
                }
                disk.put_sector(cylinder, head, sector, contents);
            }
            _ => warn!(cylinder, head, sector, "write outside attached drive"),
        }
        self.set_busy(now_ns, queue);
    }
}

impl std::fmt::Debug for ShugartController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShugartController")
            .field("cylinder", &self.cylinder)
            .field("head", &self.head)
            .field("sector", &self.sector)
            .field("physical_cylinder", &self.physical_cylinder)
            .field("state", &self.state)
            .field("seek_state", &self.seek_state)
            .field("status", &format_args!("{:#04x}", self.read_status()))
            .finish()
    }
}

/// Transfers bytes into guest memory, one little-endian word per address.
fn copy_to_memory(mem: &mut dyn MemoryBus, addr: u32, bytes: &[u8]) {
    for (i, pair) in bytes.chunks_exact(2).enumerate() {
        mem.store(addr + i as u32, u16::from_le_bytes([pair[0], pair[1]]));
    }
}

/// Fills `bytes` from guest memory, one little-endian word per address.
fn copy_from_memory(mem: &mut dyn MemoryBus, addr: u32, bytes: &mut [u8]) {
    for (i, pair) in bytes.chunks_exact_mut(2).enumerate() {
        let word = mem.fetch(addr + i as u32).to_le_bytes();
        pair.copy_from_slice(&word);
    }
}
