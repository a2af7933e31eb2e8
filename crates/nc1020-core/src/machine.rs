use log::{info, warn};

use crate::{
    bus::Bus,
    cpu::{Cpu, RESET_VECTOR},
    mmu::{Mmu, NOR_SIZE, ROM_SIZE},
    state::{self, SnapshotError},
    storage::{self, StorageError, StoragePaths},
    timer::{CYCLES_MS, Timer},
};

/// Bytes in one LCD frame: 160x80 pixels at one bit per pixel.
pub const LCD_BUFFER_SIZE: usize = 1600;
pub const KEY_COUNT: u8 = 64;

// Firmware RAM cells holding the calendar time.
const TIME_HOUR_ADDR: u16 = 0x046F;
const TIME_MINUTE_ADDR: u16 = 0x0470;
const TIME_SECOND_ADDR: u16 = 0x0471;
const TIME_YEAR_ADDR: u16 = 0x0472;
const TIME_MONTH_ADDR: u16 = 0x0473;
const TIME_DAY_ADDR: u16 = 0x0474;
const TIME_WEEKDAY_ADDR: u16 = 0x0475;
const TIME_YEAR_BASE: i32 = 1881;

/// Host calendar time handed to [`Nc1020::sync_time`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WallClock {
    pub year: i32,
    /// 1-12
    pub month: u8,
    /// 1-31
    pub day: u8,
    /// Days since Sunday.
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// A complete NC1020: CPU, memory map and timers plus the files backing them.
pub struct Nc1020 {
    pub cpu: Cpu,
    pub mmu: Mmu,
    pub timer: Timer,
    cycles: u64,
    paths: Option<StoragePaths>,
}

impl Nc1020 {
    /// Load the ROM image from `paths` and power on with an empty NOR. Call
    /// [`Nc1020::load`] afterwards to bring in the NOR image and snapshot.
    pub fn initialize(paths: StoragePaths) -> Result<Self, StorageError> {
        let rom = storage::read_image(&paths.rom, ROM_SIZE)?;
        info!("loaded ROM image from {}", paths.rom.display());
        let mut machine = Self::with_images(rom, vec![0; NOR_SIZE]);
        machine.paths = Some(paths);
        Ok(machine)
    }

    /// In-memory machine over already decoded images. Nothing touches disk.
    pub fn with_images(rom: Vec<u8>, nor: Vec<u8>) -> Self {
        let mmu = Mmu::new(rom, nor);
        let mut cpu = Cpu::new();
        cpu.reset(&mmu);
        Self {
            cpu,
            mmu,
            timer: Timer::new(),
            cycles: 0,
            paths: None,
        }
    }

    pub fn paths(&self) -> Option<&StoragePaths> {
        self.paths.as_ref()
    }

    /// Reload the NOR image and return to power-on state.
    pub fn reset(&mut self) -> Result<(), StorageError> {
        self.load_nor()?;
        self.reset_state();
        Ok(())
    }

    /// Reload the NOR image, reset, then restore the saved snapshot if one
    /// exists and matches the current format.
    pub fn load(&mut self) -> Result<(), StorageError> {
        self.load_nor()?;
        self.reset_state();
        let Some(path) = self.paths.as_ref().map(|p| p.state.clone()) else {
            return Ok(());
        };
        let Some(bytes) = storage::read_state(&path)? else {
            info!("no snapshot at {}; starting fresh", path.display());
            return Ok(());
        };
        if let Err(e) = self.restore(&bytes) {
            warn!("ignoring snapshot {}: {e}", path.display());
        }
        Ok(())
    }

    /// Persist the NOR image and a snapshot of the machine.
    pub fn save(&self) -> Result<(), StorageError> {
        let Some(paths) = &self.paths else {
            return Ok(());
        };
        storage::write_image(&paths.nor, &self.mmu.nor)?;
        storage::write_file(&paths.state, &self.snapshot())?;
        info!("saved state to {}", paths.state.display());
        Ok(())
    }

    /// Remove the persisted NOR image and snapshot.
    pub fn delete_state_and_nor(&self) -> Result<(), StorageError> {
        let Some(paths) = &self.paths else {
            return Ok(());
        };
        storage::remove_file(&paths.nor)?;
        storage::remove_file(&paths.state)
    }

    /// Serialized machine state in the snapshot format.
    pub fn snapshot(&self) -> Vec<u8> {
        state::encode(&self.cpu, &self.mmu, &self.timer, self.cycles)
    }

    /// Apply a snapshot. The machine is untouched if it is rejected.
    pub fn restore(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        self.cycles = state::decode(bytes, &mut self.cpu, &mut self.mmu, &mut self.timer)?;
        self.mmu.switch_volume();
        Ok(())
    }

    fn load_nor(&mut self) -> Result<(), StorageError> {
        if let Some(paths) = &self.paths {
            self.mmu.nor = storage::read_image(&paths.nor, NOR_SIZE)?;
        }
        Ok(())
    }

    fn reset_state(&mut self) {
        self.mmu.reset();
        self.timer = Timer::new();
        self.cycles = 0;
        self.cpu.reset(&self.mmu);
    }

    /// Press or release key `id` (masked to 0-63).
    pub fn set_key(&mut self, id: u8, down: bool) {
        let key = id % KEY_COUNT;
        self.mmu.keypad.set(key, down);
        if down {
            self.mmu.power.key_down(key);
        }
    }

    /// Run the CPU for `ms` milliseconds of emulated time, servicing both
    /// timers along the way.
    pub fn run_time_slice(&mut self, ms: u64, speed_up: bool) {
        let budget = ms.saturating_mul(CYCLES_MS);
        let mut elapsed = 0u64;
        while elapsed < budget {
            elapsed += u64::from(self.cpu.step(&mut self.mmu));
            self.timer.poll_timer0(elapsed, &mut self.mmu);
            if self.timer.take_irq() {
                elapsed += u64::from(self.cpu.irq(&mut self.mmu));
            }
            if self.timer.poll_timer1(elapsed, speed_up, &mut self.mmu) {
                self.cpu.pc = self.mmu.peek_word(RESET_VECTOR);
            }
        }
        self.cycles += elapsed;
        self.timer.end_slice(budget);
    }

    /// Copy the current frame into `out`. Returns false until the firmware
    /// has latched a framebuffer address.
    pub fn copy_lcd_buffer(&self, out: &mut [u8; LCD_BUFFER_SIZE]) -> bool {
        match self.lcd_buffer() {
            Some(frame) => {
                out.copy_from_slice(frame);
                true
            }
            None => false,
        }
    }

    pub fn lcd_buffer(&self) -> Option<&[u8]> {
        if self.mmu.lcd_addr == 0 {
            return None;
        }
        let start = self.mmu.lcd_addr as usize;
        self.mmu.ram.get(start..start + LCD_BUFFER_SIZE)
    }

    /// Total CPU cycles executed since the last reset.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Write the host time into the firmware's calendar cells.
    pub fn sync_time(&mut self, now: &WallClock) {
        let year = (now.year - TIME_YEAR_BASE) as u8;
        self.mmu.store(TIME_YEAR_ADDR, year);
        self.mmu.store(TIME_MONTH_ADDR, now.month);
        self.mmu.store(TIME_DAY_ADDR, now.day.wrapping_add(1));
        self.mmu.store(TIME_WEEKDAY_ADDR, now.weekday);
        self.mmu.store(TIME_HOUR_ADDR, now.hour);
        self.mmu.store(TIME_MINUTE_ADDR, now.minute);
        self.mmu.store(TIME_SECOND_ADDR, now.second / 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcd_buffer_is_none_until_latched() {
        let mut machine = Nc1020::with_images(Vec::new(), Vec::new());
        let mut frame = [0u8; LCD_BUFFER_SIZE];
        assert!(!machine.copy_lcd_buffer(&mut frame));

        machine.mmu.ram[0x0C] = 0x01;
        machine.mmu.store(0x06, 0x9C);
        assert_eq!(machine.mmu.lcd_addr, 0x19C0);
        machine.mmu.ram[0x19C0] = 0xAA;
        machine.mmu.ram[0x19C0 + LCD_BUFFER_SIZE - 1] = 0x55;
        assert!(machine.copy_lcd_buffer(&mut frame));
        assert_eq!(frame[0], 0xAA);
        assert_eq!(frame[LCD_BUFFER_SIZE - 1], 0x55);
    }

    #[test]
    fn sync_time_fills_calendar_cells() {
        let mut machine = Nc1020::with_images(Vec::new(), Vec::new());
        machine.sync_time(&WallClock {
            year: 2024,
            month: 3,
            day: 9,
            weekday: 6,
            hour: 13,
            minute: 45,
            second: 59,
        });
        assert_eq!(&machine.mmu.ram[0x46F..0x476], &[13, 45, 29, 143, 3, 10, 6]);
    }

    #[test]
    fn key_ids_wrap_at_sixty_four() {
        let mut machine = Nc1020::with_images(Vec::new(), Vec::new());
        machine.set_key(64 + 9, true);
        assert_eq!(machine.mmu.keypad.rows[1], 0x02);
        machine.set_key(9, false);
        assert_eq!(machine.mmu.keypad.rows[1], 0);
    }

    #[test]
    fn machine_without_paths_skips_disk() {
        let mut machine = Nc1020::with_images(Vec::new(), vec![0x5A; NOR_SIZE]);
        machine.mmu.ram[0x100] = 1;
        machine.load().unwrap();
        assert_eq!(machine.mmu.ram[0x100], 0);
        assert_eq!(machine.mmu.nor[0], 0x5A);
        machine.save().unwrap();
        machine.delete_state_and_nor().unwrap();
    }
}
