#![allow(dead_code)]

use nc1020_core::{
    Nc1020,
    mmu::{NOR_SIZE, ROM_SIZE},
};

/// CPU address of the first byte of ROM volume 0, bank 0, segment 1.
pub const PROGRAM_BASE: u16 = 0xE000;
const PROGRAM_OFFSET: usize = 0x2000;
const RESET_VECTOR_OFFSET: usize = 0x3FFC;

/// `JMP $E000`
pub const SPIN: [u8; 3] = [0x4C, 0x00, 0xE0];

/// Decoded ROM image with `program` at 0xE000 and the reset vector pointing
/// at it.
pub fn rom_with_program(program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; ROM_SIZE];
    rom[PROGRAM_OFFSET..PROGRAM_OFFSET + program.len()].copy_from_slice(program);
    rom[RESET_VECTOR_OFFSET..RESET_VECTOR_OFFSET + 2].copy_from_slice(&PROGRAM_BASE.to_le_bytes());
    rom
}

pub fn machine_with_program(program: &[u8]) -> Nc1020 {
    Nc1020::with_images(rom_with_program(program), vec![0u8; NOR_SIZE])
}

/// Place extra code at `addr` inside the fixed ROM window.
pub fn poke_rom(machine: &mut Nc1020, addr: u16, bytes: &[u8]) {
    let start = PROGRAM_OFFSET + (addr - PROGRAM_BASE) as usize;
    machine.mmu.rom[start..start + bytes.len()].copy_from_slice(bytes);
}
