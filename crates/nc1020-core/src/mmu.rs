use log::warn;

use crate::{
    bus::Bus,
    flash::FlashState,
    io::JingleWave,
    keypad::{Keypad, PowerState},
    rtc::Clock,
};

pub const PAGE_SIZE: usize = 0x2000;
pub const BANK_SIZE: usize = 0x8000;
pub const RAM_SIZE: usize = 0x8000;
pub const ROM_VOLUMES: usize = 3;
pub const ROM_BANKS_PER_VOLUME: usize = 0x100;
pub const NOR_BANKS: usize = 0x20;
pub const ROM_SIZE: usize = BANK_SIZE * ROM_BANKS_PER_VOLUME * ROM_VOLUMES;
pub const NOR_SIZE: usize = BANK_SIZE * NOR_BANKS;

pub const IO_LIMIT: u16 = 0x40;
/// Zero-page cell the firmware inspects after a wake-up.
pub const WAKE_FLAGS_ADDR: u16 = 0x045F;

// I/O registers that steer the window table
pub const IO_BANK: usize = 0x00;
pub const IO_ROA_BBS: usize = 0x0A;
pub const IO_VOLUME: usize = 0x0D;

const FIRST_ROM_BANK: u8 = 0x80;

/// Backing storage for one 8KB window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Window {
    /// RAM page 0-3.
    Ram(u8),
    Rom { volume: u8, bank: u8, segment: u8 },
    Nor { bank: u8, segment: u8 },
}

impl Window {
    fn offset(self) -> usize {
        match self {
            Window::Ram(page) => page as usize * PAGE_SIZE,
            Window::Rom {
                volume,
                bank,
                segment,
            } => {
                (volume as usize * ROM_BANKS_PER_VOLUME + bank as usize) * BANK_SIZE
                    + segment as usize * PAGE_SIZE
            }
            Window::Nor { bank, segment } => {
                bank as usize * BANK_SIZE + segment as usize * PAGE_SIZE
            }
        }
    }
}

/// Memory map: owns RAM, ROM and NOR plus every peripheral that lives behind
/// the I/O registers.
pub struct Mmu {
    pub ram: Vec<u8>,
    pub rom: Vec<u8>,
    pub nor: Vec<u8>,
    windows: [Window; 8],
    bbs: [Window; 16],
    /// Live bytes of the 0x40-0x7F zero-page window while bank 0 is swapped out.
    pub zp_backup: [u8; 0x40],
    pub clock: Clock,
    pub jingle: JingleWave,
    pub flash: FlashState,
    pub keypad: Keypad,
    pub power: PowerState,
    /// Framebuffer address in RAM, 0 until the firmware latches it.
    pub lcd_addr: u16,
}

impl Mmu {
    /// Build a memory map over the given images. Short images are padded so
    /// every window resolves inside its buffer.
    pub fn new(mut rom: Vec<u8>, mut nor: Vec<u8>) -> Self {
        rom.resize(ROM_SIZE, 0);
        nor.resize(NOR_SIZE, 0);
        let mut mmu = Self {
            ram: vec![0; RAM_SIZE],
            rom,
            nor,
            windows: [Window::Ram(0); 8],
            bbs: [Window::Ram(0); 16],
            zp_backup: [0; 0x40],
            clock: Clock::new(),
            jingle: JingleWave::default(),
            flash: FlashState::new(),
            keypad: Keypad::default(),
            power: PowerState::default(),
            lcd_addr: 0,
        };
        mmu.reset();
        mmu
    }

    /// Clear everything except the ROM and NOR images and rebuild the window
    /// table from the zeroed select registers.
    pub fn reset(&mut self) {
        self.ram.fill(0);
        self.zp_backup = [0; 0x40];
        self.clock = Clock::new();
        self.jingle = JingleWave::default();
        self.flash = FlashState::new();
        self.keypad = Keypad::default();
        self.power = PowerState::default();
        self.lcd_addr = 0;
        self.windows[0] = Window::Ram(0);
        self.switch_volume();
    }

    pub fn windows(&self) -> &[Window; 8] {
        &self.windows
    }

    /// Active ROM volume from the low two bits of the volume register.
    pub fn volume(&self) -> u8 {
        match self.ram[IO_VOLUME] & 0x03 {
            0x01 => 1,
            0x03 => 2,
            _ => 0,
        }
    }

    fn bank_window(&self, bank: u8, segment: u8) -> Option<Window> {
        if (bank as usize) < NOR_BANKS {
            Some(Window::Nor { bank, segment })
        } else if bank >= FIRST_ROM_BANK {
            Some(Window::Rom {
                volume: self.volume(),
                bank,
                segment,
            })
        } else {
            None
        }
    }

    /// Map the 32KB bank named by register 0x00 into windows 2-5.
    pub fn switch_bank(&mut self) {
        let bank = self.ram[IO_BANK];
        for segment in 0..4u8 {
            match self.bank_window(bank, segment) {
                Some(window) => self.windows[2 + segment as usize] = window,
                None => {
                    warn!("bank {bank:#04x} has no backing storage; keeping current mapping");
                    return;
                }
            }
        }
    }

    /// Rebuild the BBS table for the active volume, then refresh windows 1, 6
    /// and 7 and the banked windows.
    pub fn switch_volume(&mut self) {
        let volume = self.volume();
        for bank in 0..4u8 {
            for segment in 0..4u8 {
                self.bbs[(bank * 4 + segment) as usize] = Window::Rom {
                    volume,
                    bank,
                    segment,
                };
            }
        }
        self.bbs[1] = Window::Ram(3);
        self.windows[7] = Window::Rom {
            volume: 0,
            bank: 0,
            segment: 1,
        };
        let roa_bbs = self.ram[IO_ROA_BBS];
        self.windows[1] = Window::Ram(if roa_bbs & 0x04 != 0 { 2 } else { 1 });
        self.windows[6] = self.bbs[(roa_bbs & 0x0F) as usize];
        self.switch_bank();
    }

    /// Point window 6 at BBS entry `index`.
    pub(crate) fn select_bbs(&mut self, index: u8) {
        self.windows[6] = self.bbs[(index & 0x0F) as usize];
    }

    fn byte(&self, window: Window, offset: usize) -> u8 {
        let at = window.offset() + offset;
        match window {
            Window::Ram(_) => self.ram[at],
            Window::Rom { .. } => self.rom[at],
            Window::Nor { .. } => self.nor[at],
        }
    }

    pub fn peek(&self, addr: u16) -> u8 {
        self.byte(self.windows[addr as usize >> 13], addr as usize & (PAGE_SIZE - 1))
    }

    pub fn load(&mut self, addr: u16) -> u8 {
        if addr < IO_LIMIT {
            return self.read_io(addr as u8);
        }
        if let Some(status) = self.flash.poll_status(addr) {
            return status;
        }
        if addr == WAKE_FLAGS_ADDR && self.power.pending_wake_up {
            self.power.pending_wake_up = false;
            self.ram[WAKE_FLAGS_ADDR as usize] = self.power.wake_up_flags;
        }
        self.peek(addr)
    }

    pub fn store(&mut self, addr: u16, value: u8) {
        if addr < IO_LIMIT {
            self.write_io(addr as u8, value);
            return;
        }
        if addr < 0x4000 {
            let offset = self.windows[addr as usize >> 13].offset();
            self.ram[offset + (addr as usize & (PAGE_SIZE - 1))] = value;
            return;
        }
        if let Window::Ram(page) = self.windows[addr as usize >> 13] {
            self.ram[page as usize * PAGE_SIZE + (addr as usize & (PAGE_SIZE - 1))] = value;
            return;
        }
        if addr >= 0xE000 {
            return;
        }
        let bank = self.ram[IO_BANK];
        if bank as usize >= NOR_BANKS {
            return;
        }
        self.flash.write(&mut self.nor, bank, addr, value);
    }
}

impl Bus for Mmu {
    fn peek(&self, addr: u16) -> u8 {
        Mmu::peek(self, addr)
    }

    fn load(&mut self, addr: u16) -> u8 {
        Mmu::load(self, addr)
    }

    fn store(&mut self, addr: u16, value: u8) {
        Mmu::store(self, addr, value)
    }
}
