//! I/O register dispatch for 0x00-0x3F.
//!
//! Registers live in the first 64 bytes of RAM. Most ports are plain storage;
//! the ones below have side effects on the memory map or peripherals.

use log::debug;

use crate::mmu::Mmu;

const IO_BANK: u8 = 0x00;
const IO_SLEEP: u8 = 0x05;
const IO_LCD_START: u8 = 0x06;
const IO_KEY_DATA: u8 = 0x08;
const IO_KEY_SELECT: u8 = 0x09;
const IO_ROA_BBS: u8 = 0x0A;
const IO_KEY_STATUS: usize = 0x0B;
const IO_LCD_HIGH: usize = 0x0C;
const IO_VOLUME: u8 = 0x0D;
const IO_ZERO_PAGE: u8 = 0x0F;
const IO_KEY_MASK: usize = 0x15;
const IO_JINGLE_CONTROL: u8 = 0x20;
const IO_JINGLE_SAMPLE: usize = 0x22;
const IO_JINGLE_COMMAND: u8 = 0x23;
const IO_CLOCK_STATUS: u8 = 0x3B;
const IO_CLOCK_MODE: usize = 0x3D;
const IO_CLOCK_INDEX: usize = 0x3E;
const IO_CLOCK_DATA: u8 = 0x3F;

const ZERO_PAGE_WINDOW: usize = 0x40;
const ZERO_PAGE_LEN: usize = 0x40;

pub const JINGLE_SAMPLES: usize = 0x20;

/// Latched "jingle" sample buffer. Samples are captured but never played.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JingleWave {
    pub samples: [u8; JINGLE_SAMPLES],
    pub flags: u8,
    pub index: u8,
    pub playing: bool,
}

/// RAM offset backing zero-page bank `index`. Banks 1-3 alias the I/O page.
fn zero_page_offset(index: u8) -> usize {
    if index < 4 { 0 } else { (index as usize) << 6 }
}

impl Mmu {
    pub(crate) fn read_io(&mut self, port: u8) -> u8 {
        match port {
            IO_CLOCK_STATUS if self.ram[IO_CLOCK_MODE] & 0x03 == 0 => self.clock.status(),
            IO_CLOCK_DATA => self.clock.read(self.ram[IO_CLOCK_INDEX]),
            _ => self.ram[port as usize],
        }
    }

    pub(crate) fn write_io(&mut self, port: u8, value: u8) {
        let old = self.ram[port as usize];
        self.ram[port as usize] = value;
        match port {
            IO_BANK => {
                if value != old {
                    self.switch_bank();
                }
            }
            IO_SLEEP => {
                if (old ^ value) & 0x08 != 0 {
                    self.power.slept = value & 0x08 == 0;
                }
            }
            IO_LCD_START => {
                if self.lcd_addr == 0 {
                    self.lcd_addr =
                        (((self.ram[IO_LCD_HIGH] & 0x03) as u16) << 12) | ((value as u16) << 4);
                }
                self.ram[IO_KEY_SELECT as usize] &= 0xFE;
            }
            IO_KEY_DATA => self.ram[IO_KEY_STATUS] &= 0xFE,
            IO_KEY_SELECT => self.scan_keypad(value),
            IO_ROA_BBS => {
                if value != old {
                    self.select_bbs(value);
                }
            }
            IO_VOLUME => {
                if value != old {
                    self.switch_volume();
                }
            }
            IO_ZERO_PAGE => self.swap_zero_page(old & 0x07, value & 0x07),
            IO_JINGLE_CONTROL => {
                if value == 0x80 || value == 0x40 {
                    self.jingle.samples = [0; JINGLE_SAMPLES];
                    self.ram[IO_JINGLE_CONTROL as usize] = 0;
                    self.jingle.flags = 1;
                    self.jingle.index = 0;
                }
            }
            IO_JINGLE_COMMAND => self.jingle_command(value),
            IO_CLOCK_DATA => {
                let index = self.ram[IO_CLOCK_INDEX];
                if index == 0x0B {
                    self.ram[IO_CLOCK_MODE] = 0xF8;
                }
                self.clock.write(index, value);
            }
            _ => {}
        }
    }

    fn scan_keypad(&mut self, select: u8) {
        match select {
            0 => {
                self.ram[IO_KEY_STATUS] |= 0x01;
                if self.keypad.rows[7] == 0xFE {
                    self.ram[IO_KEY_STATUS] &= 0xFE;
                }
            }
            0x7F => {
                if self.ram[IO_KEY_MASK] == 0x7F {
                    self.ram[IO_KEY_DATA as usize] = self.keypad.any_row();
                }
            }
            _ if select.is_power_of_two() => {
                self.ram[IO_KEY_DATA as usize] =
                    self.keypad.rows[select.trailing_zeros() as usize];
            }
            _ => {}
        }
    }

    fn swap_zero_page(&mut self, old: u8, new: u8) {
        if old == new {
            return;
        }
        let live = ZERO_PAGE_WINDOW..ZERO_PAGE_WINDOW + ZERO_PAGE_LEN;
        if old != 0 {
            self.ram.copy_within(live.clone(), zero_page_offset(old));
            if new != 0 {
                let src = zero_page_offset(new);
                self.ram.copy_within(src..src + ZERO_PAGE_LEN, ZERO_PAGE_WINDOW);
            } else {
                self.ram[live].copy_from_slice(&self.zp_backup);
            }
        } else {
            self.zp_backup.copy_from_slice(&self.ram[live]);
            let src = zero_page_offset(new);
            self.ram.copy_within(src..src + ZERO_PAGE_LEN, ZERO_PAGE_WINDOW);
        }
    }

    fn jingle_command(&mut self, value: u8) {
        let index = self.jingle.index as usize;
        match value {
            0xC2 => {
                if index < JINGLE_SAMPLES {
                    self.jingle.samples[index] = self.ram[IO_JINGLE_SAMPLE];
                }
            }
            0xC4 => {
                if index < JINGLE_SAMPLES {
                    self.jingle.samples[index] = self.ram[IO_JINGLE_SAMPLE];
                    self.jingle.index += 1;
                }
            }
            0x80 => {
                self.ram[IO_JINGLE_CONTROL as usize] = 0x80;
                self.jingle.flags = 0;
                if index != 0 && !self.jingle.playing {
                    debug!("jingle wave ready with {index} samples; playback is not emulated");
                    self.jingle.index = 0;
                }
            }
            _ => {}
        }
    }
}
