/// Key 15 toggles sleep and scans as every column of row 7 except bit 0.
pub const POWER_KEY: u8 = 0x0F;
const POWER_KEY_BITS: u8 = 0xFE;

/// 8x8 key matrix, one byte per row with a bit per column.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Keypad {
    pub rows: [u8; 8],
}

impl Keypad {
    /// Update the matrix for `key` (0-63): row = key % 8, column = key / 8.
    pub fn set(&mut self, key: u8, down: bool) {
        let row = (key % 8) as usize;
        let bits = if key == POWER_KEY {
            POWER_KEY_BITS
        } else {
            1 << (key / 8)
        };
        if down {
            self.rows[row] |= bits;
        } else {
            self.rows[row] &= !bits;
        }
    }

    /// Rows merged for a scan of every column at once.
    pub fn any_row(&self) -> u8 {
        self.rows.iter().fold(0, |acc, row| acc | row)
    }
}

/// Value the firmware finds at 0x045F after a key wakes the machine.
fn wake_flags(key: u8) -> Option<u8> {
    match key {
        0x08 => Some(0x00),
        0x09 => Some(0x0A),
        0x0A => Some(0x08),
        0x0B => Some(0x06),
        0x0C => Some(0x04),
        0x0D => Some(0x02),
        0x0F => Some(0x00),
        _ => None,
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PowerState {
    pub slept: bool,
    /// Restart from the reset vector on the next timer1 tick.
    pub should_wake_up: bool,
    /// Inject `wake_up_flags` on the next load of 0x045F.
    pub pending_wake_up: bool,
    pub wake_up_flags: u8,
}

impl PowerState {
    pub fn key_down(&mut self, key: u8) {
        if !self.slept {
            if key == POWER_KEY {
                self.slept = true;
            }
            return;
        }
        if let Some(flags) = wake_flags(key) {
            self.wake_up_flags = flags;
            self.should_wake_up = true;
            self.pending_wake_up = true;
            self.slept = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_key_sets_row_seven_columns() {
        let mut keypad = Keypad::default();
        keypad.set(POWER_KEY, true);
        assert_eq!(keypad.rows[7], 0xFE);
        keypad.set(0x07, true);
        assert_eq!(keypad.rows[7], 0xFF);
        keypad.set(POWER_KEY, false);
        assert_eq!(keypad.rows[7], 0x01);
    }

    #[test]
    fn key_maps_to_row_and_column() {
        let mut keypad = Keypad::default();
        keypad.set(0x2A, true);
        assert_eq!(keypad.rows[2], 1 << 5);
        assert_eq!(keypad.any_row(), 1 << 5);
    }

    #[test]
    fn only_wake_keys_leave_sleep() {
        let mut power = PowerState::default();
        power.key_down(0x09);
        assert!(!power.slept);
        power.key_down(POWER_KEY);
        assert!(power.slept);

        power.key_down(0x0E);
        power.key_down(0x20);
        assert!(power.slept);
        assert!(!power.should_wake_up);

        power.key_down(0x0B);
        assert!(!power.slept);
        assert!(power.should_wake_up);
        assert!(power.pending_wake_up);
        assert_eq!(power.wake_up_flags, 0x06);
    }
}
