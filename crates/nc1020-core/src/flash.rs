//! NOR flash command sequencer.
//!
//! Stores into the NOR-backed address range do not write memory directly.
//! They feed an unlock/command/confirm sequence modelled on JEDEC parts:
//!
//! ```text
//! step 0 --AA@5555--> 1 --55@AAAA--> 2 --cmd@5555--> 3 --...--> 6
//! ```
//!
//! A write of 0xF0 to 0x8000 returns to step 0 from anywhere.

use log::{trace, warn};

use crate::mmu::BANK_SIZE;

const UNLOCK_ADDR_1: u16 = 0x5555;
const UNLOCK_ADDR_2: u16 = 0xAAAA;
const RESET_ADDR: u16 = 0x8000;
const WINDOW_BASE: u16 = 0x4000;
const SECTOR_SIZE: usize = 0x800;
pub const BUFFER_SIZE: usize = 0x100;

/// Value returned by a status read while a program or erase completes.
pub const STATUS_READY: u8 = 0x88;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlashCommand {
    /// Product ID entry. The first two data bytes of the bank are saved and
    /// restored on exit.
    IdEntry,
    /// Program a byte by ANDing it into the array.
    ByteProgram,
    /// Sector or chip erase.
    Erase,
    /// Program into the 256-byte page buffer.
    BufferProgram,
    /// Chip or page-buffer erase.
    BufferErase,
    Reset,
}

impl FlashCommand {
    fn from_byte(value: u8) -> Option<Self> {
        match value {
            0x90 => Some(Self::IdEntry),
            0xA0 => Some(Self::ByteProgram),
            0x80 => Some(Self::Erase),
            0xA8 => Some(Self::BufferProgram),
            0x88 => Some(Self::BufferErase),
            0x78 => Some(Self::Reset),
            _ => None,
        }
    }

    /// Numeric command type as stored in snapshots (1-6).
    pub fn code(self) -> u8 {
        match self {
            Self::IdEntry => 1,
            Self::ByteProgram => 2,
            Self::Erase => 3,
            Self::BufferProgram => 4,
            Self::BufferErase => 5,
            Self::Reset => 6,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::IdEntry),
            2 => Some(Self::ByteProgram),
            3 => Some(Self::Erase),
            4 => Some(Self::BufferProgram),
            5 => Some(Self::BufferErase),
            6 => Some(Self::Reset),
            _ => None,
        }
    }

    fn is_erase(self) -> bool {
        matches!(self, Self::Erase | Self::BufferErase)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlashState {
    pub step: u8,
    pub command: Option<FlashCommand>,
    /// Bank selected when ID entry started.
    pub bank: u8,
    pub backup: [u8; 2],
    pub buffer: [u8; BUFFER_SIZE],
}

impl FlashState {
    pub fn new() -> Self {
        Self {
            step: 0,
            command: None,
            bank: 0,
            backup: [0; 2],
            buffer: [0; BUFFER_SIZE],
        }
    }

    /// Status read hook. Reading anywhere in 0x4000-0xBFFF right after a byte
    /// program or a sector/chip erase reports ready and ends the sequence.
    pub fn poll_status(&mut self, addr: u16) -> Option<u8> {
        let busy = matches!(
            (self.step, self.command),
            (4, Some(FlashCommand::ByteProgram)) | (6, Some(FlashCommand::Erase))
        );
        if busy && (0x4000..0xC000).contains(&addr) {
            self.step = 0;
            return Some(STATUS_READY);
        }
        None
    }

    /// Feed a store aimed at the NOR window of `bank` into the sequencer.
    /// `nor` is the whole NOR image.
    pub fn write(&mut self, nor: &mut [u8], bank: u8, addr: u16, value: u8) {
        if self.step == 0 {
            if addr == UNLOCK_ADDR_1 && value == 0xAA {
                self.step = 1;
            } else {
                trace!("flash: ignoring write {value:#04x} to {addr:#06x} while idle");
            }
            return;
        }
        if self.advance(nor, bank, addr, value) {
            return;
        }
        if addr == RESET_ADDR && value == 0xF0 {
            self.step = 0;
            return;
        }
        warn!(
            "flash: unexpected write {value:#04x} to {addr:#06x} at step {} ({:?})",
            self.step, self.command
        );
    }

    fn advance(&mut self, nor: &mut [u8], bank: u8, addr: u16, value: u8) -> bool {
        let bank_base = bank as usize * BANK_SIZE;
        match (self.step, self.command) {
            (1, _) => {
                if addr == UNLOCK_ADDR_2 && value == 0x55 {
                    self.step = 2;
                    return true;
                }
                false
            }
            (2, _) => {
                if addr != UNLOCK_ADDR_1 {
                    return false;
                }
                let Some(command) = FlashCommand::from_byte(value) else {
                    return false;
                };
                if command == FlashCommand::IdEntry {
                    self.bank = bank;
                    self.backup = [
                        nor_byte(nor, bank_base + 0x4000),
                        nor_byte(nor, bank_base + 0x4001),
                    ];
                }
                self.command = Some(command);
                self.step = 3;
                true
            }
            (3, Some(FlashCommand::IdEntry)) => {
                if value != 0xF0 {
                    return false;
                }
                if let Some(bytes) = nor.get_mut(bank_base + 0x4000..bank_base + 0x4002) {
                    bytes.copy_from_slice(&self.backup);
                }
                self.step = 0;
                true
            }
            (3, Some(FlashCommand::ByteProgram)) => {
                let offset = bank_base + addr.wrapping_sub(WINDOW_BASE) as usize;
                match nor.get_mut(offset) {
                    Some(byte) => *byte &= value,
                    None => warn!("flash: program at {addr:#06x} falls outside NOR"),
                }
                self.step = 4;
                true
            }
            (3, Some(FlashCommand::BufferProgram)) => {
                self.buffer[addr as usize & 0xFF] &= value;
                self.step = 4;
                true
            }
            (3, Some(command)) if command.is_erase() => {
                if addr == UNLOCK_ADDR_1 && value == 0xAA {
                    self.step = 4;
                    return true;
                }
                false
            }
            (4, Some(command)) if command.is_erase() => {
                if addr == UNLOCK_ADDR_2 && value == 0x55 {
                    self.step = 5;
                    return true;
                }
                false
            }
            (5, Some(command)) => {
                if addr == UNLOCK_ADDR_1 && value == 0x10 {
                    nor.fill(0xFF);
                    if command == FlashCommand::BufferErase {
                        self.buffer.fill(0xFF);
                    }
                    self.step = 6;
                    return true;
                }
                match command {
                    FlashCommand::Erase if value == 0x30 => {
                        let offset = addr.wrapping_sub(WINDOW_BASE) as usize;
                        let sector = bank_base + offset / SECTOR_SIZE * SECTOR_SIZE;
                        match nor.get_mut(sector..sector + SECTOR_SIZE) {
                            Some(bytes) => bytes.fill(0xFF),
                            None => warn!("flash: sector erase at {addr:#06x} falls outside NOR"),
                        }
                        self.step = 6;
                        true
                    }
                    FlashCommand::BufferErase if value == 0x48 => {
                        self.buffer.fill(0xFF);
                        self.step = 6;
                        true
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

impl Default for FlashState {
    fn default() -> Self {
        Self::new()
    }
}

fn nor_byte(nor: &[u8], offset: usize) -> u8 {
    nor.get(offset).copied().unwrap_or(0xFF)
}
