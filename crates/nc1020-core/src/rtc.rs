pub const CLOCK_REGS: usize = 80;

// Register indices inside the clock file
const SECONDS: usize = 0;
const MINUTES: usize = 1;
const HOURS: usize = 2;
const DAYS: usize = 3;
pub const SUBSECOND: usize = 4;
const ALARM_SECONDS: usize = 5;
const ALARM_MINUTES: usize = 6;
const ALARM_HOURS: usize = 7;
const ALARM_CONTROL: usize = 0x0A;
const LOCK: usize = 0x0B;
const STATUS: usize = 0x3B;

/// Clock flag armed by the firmware to request count-down alarms.
pub const FLAG_COUNT_DOWN: u8 = 0x02;

/// RTC register file and its alarm flags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Clock {
    pub regs: [u8; CLOCK_REGS],
    pub flags: u8,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            regs: [0; CLOCK_REGS],
            flags: 0,
        }
    }

    /// Advance by one second, carrying into minutes, hours and days. The
    /// hour register keeps its two mode bits on day rollover.
    pub fn advance_second(&mut self) {
        self.regs[SECONDS] = self.regs[SECONDS].wrapping_add(1);
        if self.regs[SECONDS] < 60 {
            return;
        }
        self.regs[SECONDS] = 0;
        self.regs[MINUTES] = self.regs[MINUTES].wrapping_add(1);
        if self.regs[MINUTES] < 60 {
            return;
        }
        self.regs[MINUTES] = 0;
        self.regs[HOURS] = self.regs[HOURS].wrapping_add(1);
        if self.regs[HOURS] < 24 {
            return;
        }
        self.regs[HOURS] &= 0xC0;
        self.regs[DAYS] = self.regs[DAYS].wrapping_add(1);
    }

    /// True when a count-down alarm is armed and one of the enabled
    /// hour/minute/second compare registers matches the current time.
    pub fn is_count_down(&self) -> bool {
        if self.regs[ALARM_CONTROL] & 0x02 == 0 || self.flags & FLAG_COUNT_DOWN == 0 {
            return false;
        }
        let matches = |alarm: usize, current: usize, mask: u8| {
            self.regs[alarm] & 0x80 != 0 && (self.regs[alarm] ^ self.regs[current]) & mask == 0
        };
        matches(ALARM_HOURS, HOURS, 0x1F)
            || matches(ALARM_MINUTES, MINUTES, 0x3F)
            || matches(ALARM_SECONDS, SECONDS, 0x3F)
    }

    pub fn locked(&self) -> bool {
        self.regs[LOCK] & 0x80 != 0
    }

    /// Value seen through port 0x3B while the clock is in read mode.
    pub fn status(&self) -> u8 {
        self.regs[STATUS] & 0xFE
    }

    pub fn read(&self, index: u8) -> u8 {
        self.regs.get(index as usize).copied().unwrap_or(0)
    }

    /// Write through the indirect data port. Indices below 7 hold the live
    /// time and only accept writes while the clock is unlocked.
    pub fn write(&mut self, index: u8, value: u8) {
        let index = index as usize;
        match index {
            LOCK => {
                self.flags |= value & 0x07;
                // Only bit 7 comes from `value`.
                self.regs[LOCK] = value ^ ((self.regs[LOCK] ^ value) & 0x7F);
            }
            ALARM_CONTROL => {
                self.flags |= value & 0x07;
                self.regs[ALARM_CONTROL] = value;
            }
            7.. => self.regs[index % CLOCK_REGS] = value,
            _ => {
                if !self.locked() {
                    self.regs[index] = value;
                }
            }
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
