//! Machine snapshots.
//!
//! A snapshot is a fixed 33,280-byte little-endian record. Fields are written
//! one by one at the offsets of the legacy snapshot format, including its
//! alignment padding, so existing `nc1020.sts` files stay loadable:
//!
//! ```text
//! 0x0000 version (u64)         0x0008 pc a p x y sp
//! 0x0010 RAM (32KB)            0x8010 zero-page backup (64)
//! 0x8050 clock regs (80)       0x80A0 clock flags
//! 0x80A1 jingle samples, flags, index, playing
//! 0x80C4 flash step, type, bank, backup[2], buffer (256)
//! 0x81C9 slept, should wake, pending wake, wake flags, timer0 toggle
//! 0x81D0 cycles, timer0, timer1 (u64), pending IRQ
//! 0x81F0 LCD address (u64)     0x81F8 keypad rows (8)
//! ```

use thiserror::Error;

use crate::{
    cpu::Cpu,
    flash::{BUFFER_SIZE, FlashCommand},
    io::JINGLE_SAMPLES,
    mmu::{Mmu, RAM_SIZE},
    rtc::CLOCK_REGS,
    timer::Timer,
};

pub const SNAPSHOT_VERSION: u64 = 0x06;
pub const SNAPSHOT_SIZE: usize = 33_280;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("snapshot is {actual} bytes, expected {expected}")]
    WrongSize { expected: usize, actual: usize },

    #[error("snapshot version {found} does not match {expected}")]
    VersionMismatch { expected: u64, found: u64 },
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    fn u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn u64(&mut self, value: u64) {
        self.align(8);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn bytes(&mut self, value: &[u8]) {
        self.buf.extend_from_slice(value);
    }

    fn align(&mut self, to: usize) {
        let padded = self.buf.len().next_multiple_of(to);
        self.buf.resize(padded, 0);
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take(&mut self, len: usize) -> &[u8] {
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        slice
    }

    fn u8(&mut self) -> u8 {
        self.take(1)[0]
    }

    fn bool(&mut self) -> bool {
        self.u8() != 0
    }

    fn u16(&mut self) -> u16 {
        let bytes = self.take(2);
        u16::from_le_bytes([bytes[0], bytes[1]])
    }

    fn u64(&mut self) -> u64 {
        self.pos = self.pos.next_multiple_of(8);
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8));
        u64::from_le_bytes(bytes)
    }

    fn array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N));
        out
    }
}

/// Serialize the machine into a snapshot record.
pub fn encode(cpu: &Cpu, mmu: &Mmu, timer: &Timer, cycles: u64) -> Vec<u8> {
    let mut w = Writer {
        buf: Vec::with_capacity(SNAPSHOT_SIZE),
    };
    w.u64(SNAPSHOT_VERSION);

    w.u16(cpu.pc);
    w.u8(cpu.a);
    w.u8(cpu.p);
    w.u8(cpu.x);
    w.u8(cpu.y);
    w.u8(cpu.sp);
    w.align(2);

    w.bytes(&mmu.ram);
    w.bytes(&mmu.zp_backup);
    w.bytes(&mmu.clock.regs);
    w.u8(mmu.clock.flags);

    w.bytes(&mmu.jingle.samples);
    w.u8(mmu.jingle.flags);
    w.u8(mmu.jingle.index);
    w.bool(mmu.jingle.playing);

    w.u8(mmu.flash.step);
    w.u8(mmu.flash.command.map_or(0, FlashCommand::code));
    w.u8(mmu.flash.bank);
    w.bytes(&mmu.flash.backup);
    w.bytes(&mmu.flash.buffer);

    w.bool(mmu.power.slept);
    w.bool(mmu.power.should_wake_up);
    w.bool(mmu.power.pending_wake_up);
    w.u8(mmu.power.wake_up_flags);

    w.bool(timer.timer0_toggle);
    w.u64(cycles);
    w.u64(timer.timer0_cycles);
    w.u64(timer.timer1_cycles);
    w.bool(timer.irq_pending);

    w.u64(mmu.lcd_addr as u64);
    w.bytes(&mmu.keypad.rows);
    w.align(8);
    w.buf
}

/// Check size and version without touching any machine state.
pub fn validate(data: &[u8]) -> Result<(), SnapshotError> {
    if data.len() != SNAPSHOT_SIZE {
        return Err(SnapshotError::WrongSize {
            expected: SNAPSHOT_SIZE,
            actual: data.len(),
        });
    }
    let mut version = [0u8; 8];
    version.copy_from_slice(&data[..8]);
    let found = u64::from_le_bytes(version);
    if found != SNAPSHOT_VERSION {
        return Err(SnapshotError::VersionMismatch {
            expected: SNAPSHOT_VERSION,
            found,
        });
    }
    Ok(())
}

/// Restore a validated snapshot. Nothing is modified when validation fails.
/// The window table is not rebuilt here; callers refresh it afterwards.
pub fn decode(
    data: &[u8],
    cpu: &mut Cpu,
    mmu: &mut Mmu,
    timer: &mut Timer,
) -> Result<u64, SnapshotError> {
    validate(data)?;
    let mut r = Reader { data, pos: 8 };

    cpu.pc = r.u16();
    cpu.a = r.u8();
    cpu.p = r.u8();
    cpu.x = r.u8();
    cpu.y = r.u8();
    cpu.sp = r.u8();
    r.pos = r.pos.next_multiple_of(2);

    mmu.ram.copy_from_slice(r.take(RAM_SIZE));
    mmu.zp_backup = r.array();
    mmu.clock.regs = r.array::<CLOCK_REGS>();
    mmu.clock.flags = r.u8();

    mmu.jingle.samples = r.array::<JINGLE_SAMPLES>();
    mmu.jingle.flags = r.u8();
    mmu.jingle.index = r.u8();
    mmu.jingle.playing = r.bool();

    mmu.flash.step = r.u8();
    mmu.flash.command = FlashCommand::from_code(r.u8());
    mmu.flash.bank = r.u8();
    mmu.flash.backup = r.array();
    mmu.flash.buffer = r.array::<BUFFER_SIZE>();

    mmu.power.slept = r.bool();
    mmu.power.should_wake_up = r.bool();
    mmu.power.pending_wake_up = r.bool();
    mmu.power.wake_up_flags = r.u8();

    timer.timer0_toggle = r.bool();
    let cycles = r.u64();
    timer.timer0_cycles = r.u64();
    timer.timer1_cycles = r.u64();
    timer.irq_pending = r.bool();

    mmu.lcd_addr = r.u64() as u16;
    mmu.keypad.rows = r.array();
    Ok(cycles)
}
