use crate::{
    mmu::Mmu,
    rtc::{FLAG_COUNT_DOWN, SUBSECOND},
};

/// CPU clock in Hz.
pub const CYCLES_SECOND: u64 = 5_120_000;
/// Timer0 runs at 2 Hz and drives the RTC.
pub const CYCLES_TIMER0: u64 = CYCLES_SECOND / 2;
/// Timer1 runs at 256 Hz and drives the periodic IRQ.
pub const CYCLES_TIMER1: u64 = CYCLES_SECOND / 256;
pub const CYCLES_TIMER1_SPEED_UP: u64 = CYCLES_TIMER1 / 20;
pub const CYCLES_MS: u64 = CYCLES_SECOND / 1000;

// I/O status bits raised by the timers
const IO_TIMER_STATUS: usize = 0x01;
const IO_WAKE_STATUS: usize = 0x02;
const IO_CLOCK_MODE: usize = 0x3D;
const TIMER1_TICK: u8 = 0x08;
const WAKE_BIT: u8 = 0x01;
const COUNT_DOWN_MATCH: u8 = 0x20;

/// Deadlines are measured in cycles from the start of the current time slice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timer {
    pub timer0_cycles: u64,
    pub timer1_cycles: u64,
    pub timer0_toggle: bool,
    pub irq_pending: bool,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            timer0_cycles: CYCLES_TIMER0,
            timer1_cycles: CYCLES_TIMER1,
            timer0_toggle: false,
            irq_pending: false,
        }
    }

    /// Half-second tick: advance the RTC every other call and refresh the
    /// count-down alarm status.
    pub fn poll_timer0(&mut self, elapsed: u64, mmu: &mut Mmu) {
        if elapsed < self.timer0_cycles {
            return;
        }
        self.timer0_cycles += CYCLES_TIMER0;
        self.timer0_toggle = !self.timer0_toggle;
        if !self.timer0_toggle {
            mmu.clock.advance_second();
        }
        if self.timer0_toggle || !mmu.clock.is_count_down() {
            mmu.ram[IO_CLOCK_MODE] = 0;
        } else {
            mmu.ram[IO_CLOCK_MODE] = COUNT_DOWN_MATCH;
            mmu.clock.flags &= !FLAG_COUNT_DOWN;
        }
        self.irq_pending = true;
    }

    /// 256 Hz tick. Returns true when a pending wake-up fires, in which case
    /// the caller restarts the CPU from the reset vector.
    pub fn poll_timer1(&mut self, elapsed: u64, speed_up: bool, mmu: &mut Mmu) -> bool {
        if elapsed < self.timer1_cycles {
            return false;
        }
        self.timer1_cycles += if speed_up {
            CYCLES_TIMER1_SPEED_UP
        } else {
            CYCLES_TIMER1
        };
        mmu.clock.regs[SUBSECOND] = mmu.clock.regs[SUBSECOND].wrapping_add(1);
        if mmu.power.should_wake_up {
            mmu.power.should_wake_up = false;
            mmu.ram[IO_TIMER_STATUS] |= WAKE_BIT;
            mmu.ram[IO_WAKE_STATUS] |= WAKE_BIT;
            return true;
        }
        mmu.ram[IO_TIMER_STATUS] |= TIMER1_TICK;
        self.irq_pending = true;
        false
    }

    pub fn take_irq(&mut self) -> bool {
        std::mem::take(&mut self.irq_pending)
    }

    /// Rebase both deadlines onto the start of the next slice.
    pub fn end_slice(&mut self, budget: u64) {
        self.timer0_cycles = self.timer0_cycles.saturating_sub(budget);
        self.timer1_cycles = self.timer1_cycles.saturating_sub(budget);
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
