//! WQX NC1020 handheld emulation core.
//!
//! This crate contains the platform-agnostic machine: a 6502 interpreter, the
//! bank-switched memory map, I/O registers, NOR flash, real-time clock and
//! keypad. Frontends drive it through the [`machine::Nc1020`] facade.

/// Memory interface the CPU executes against.
pub mod bus;

/// 6502 interpreter.
pub mod cpu;

/// NOR flash program/erase command sequencer.
pub mod flash;

/// Memory-mapped I/O registers (0x00-0x3F).
pub mod io;

/// Keypad matrix and sleep/wake bookkeeping.
pub mod keypad;

/// High-level facade that wires the CPU, memory map and timers together.
pub mod machine;

/// Window table over RAM, ROM and NOR.
pub mod mmu;

/// Real-time clock register file.
pub mod rtc;

/// Versioned machine snapshots.
pub mod state;

/// ROM/NOR image files.
pub mod storage;

/// Timer deadlines and constants.
pub mod timer;

pub use machine::{Nc1020, WallClock};
pub use storage::{StorageError, StoragePaths};
