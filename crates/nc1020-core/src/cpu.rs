use crate::bus::Bus;

#[cfg(feature = "cpu-trace")]
macro_rules! cpu_trace {
    ($($arg:tt)*) => {
        log::trace!($($arg)*);
    };
}
#[cfg(not(feature = "cpu-trace"))]
macro_rules! cpu_trace {
    ($($arg:tt)*) => {};
}

// Status register bits
pub const FLAG_C: u8 = 0x01; // Carry
pub const FLAG_Z: u8 = 0x02; // Zero
pub const FLAG_I: u8 = 0x04; // IRQ disable
pub const FLAG_D: u8 = 0x08; // Decimal, stored but never applied
pub const FLAG_B: u8 = 0x10; // Break
pub const FLAG_U: u8 = 0x20; // Unused
pub const FLAG_V: u8 = 0x40; // Overflow
pub const FLAG_N: u8 = 0x80; // Negative

pub const RESET_VECTOR: u16 = 0xFFFC;
pub const IRQ_VECTOR: u16 = 0xFFFE;

const STACK_BASE: u16 = 0x0100;
const POWER_ON_STATUS: u8 = FLAG_U | FLAG_I;
const IRQ_CYCLES: u32 = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Imm,
    Zp,
    ZpX,
    ZpY,
    Abs,
    AbsX,
    AbsY,
    IndX,
    IndY,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cpu {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub p: u8,
    pub pc: u16,
    /// Undefined opcodes executed since the last reset. They run as
    /// zero-cycle no-ops that only step over the opcode byte.
    pub illegal_opcodes: u64,
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFF,
            p: POWER_ON_STATUS,
            pc: 0,
            illegal_opcodes: 0,
        }
    }

    /// Power-on register state with PC taken from the reset vector through
    /// the current window mapping.
    pub fn reset<B: Bus>(&mut self, bus: &B) {
        *self = Self::new();
        self.pc = bus.peek_word(RESET_VECTOR);
    }

    pub fn flag(&self, mask: u8) -> bool {
        self.p & mask != 0
    }

    fn set_flag(&mut self, mask: u8, on: bool) {
        if on {
            self.p |= mask;
        } else {
            self.p &= !mask;
        }
    }

    fn set_nz(&mut self, value: u8) {
        self.p = (self.p & !(FLAG_N | FLAG_Z))
            | (value & FLAG_N)
            | if value == 0 { FLAG_Z } else { 0 };
    }

    fn fetch8<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = bus.peek(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    fn fetch16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let value = bus.peek_word(self.pc);
        self.pc = self.pc.wrapping_add(2);
        value
    }

    fn push<B: Bus>(&mut self, bus: &mut B, value: u8) {
        bus.store(STACK_BASE | self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pull<B: Bus>(&mut self, bus: &mut B) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.load(STACK_BASE | self.sp as u16)
    }

    fn push_pc<B: Bus>(&mut self, bus: &mut B) {
        let [lo, hi] = self.pc.to_le_bytes();
        self.push(bus, hi);
        self.push(bus, lo);
    }

    fn pull_pc<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.pull(bus);
        let hi = self.pull(bus);
        u16::from_le_bytes([lo, hi])
    }

    fn indexed(base: u16, index: u8) -> (u16, u32) {
        let addr = base.wrapping_add(index as u16);
        (addr, u32::from((base ^ addr) & 0xFF00 != 0))
    }

    /// Effective address for `mode` plus the page-cross penalty that indexed
    /// reads pay.
    fn operand<B: Bus>(&mut self, bus: &mut B, mode: Mode) -> (u16, u32) {
        match mode {
            Mode::Imm => {
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                (addr, 0)
            }
            Mode::Zp => (self.fetch8(bus) as u16, 0),
            Mode::ZpX => (self.fetch8(bus).wrapping_add(self.x) as u16, 0),
            Mode::ZpY => (self.fetch8(bus).wrapping_add(self.y) as u16, 0),
            Mode::Abs => (self.fetch16(bus), 0),
            Mode::AbsX => {
                let base = self.fetch16(bus);
                Self::indexed(base, self.x)
            }
            Mode::AbsY => {
                let base = self.fetch16(bus);
                Self::indexed(base, self.y)
            }
            Mode::IndX => {
                let ptr = self.fetch8(bus).wrapping_add(self.x);
                (bus.peek_word(ptr as u16), 0)
            }
            Mode::IndY => {
                let ptr = self.fetch8(bus);
                let base = bus.peek_word(ptr as u16);
                Self::indexed(base, self.y)
            }
        }
    }

    fn read_op<B: Bus>(
        &mut self,
        bus: &mut B,
        mode: Mode,
        cycles: u32,
        op: fn(&mut Self, u8),
    ) -> u32 {
        let (addr, penalty) = self.operand(bus, mode);
        let value = bus.load(addr);
        op(self, value);
        cycles + penalty
    }

    fn write_op<B: Bus>(&mut self, bus: &mut B, mode: Mode, cycles: u32, value: u8) -> u32 {
        let (addr, _) = self.operand(bus, mode);
        bus.store(addr, value);
        cycles
    }

    fn modify_op<B: Bus>(
        &mut self,
        bus: &mut B,
        mode: Mode,
        cycles: u32,
        op: fn(&mut Self, u8) -> u8,
    ) -> u32 {
        let (addr, _) = self.operand(bus, mode);
        let value = bus.load(addr);
        let result = op(self, value);
        bus.store(addr, result);
        cycles
    }

    fn branch<B: Bus>(&mut self, bus: &mut B, taken: bool) -> u32 {
        let offset = self.fetch8(bus) as i8;
        if !taken {
            return 2;
        }
        let target = self.pc.wrapping_add(offset as u16);
        let cycles = if (self.pc ^ target) & 0xFF00 != 0 { 4 } else { 3 };
        self.pc = target;
        cycles
    }

    fn lda(&mut self, value: u8) {
        self.a = value;
        self.set_nz(value);
    }

    fn ldx(&mut self, value: u8) {
        self.x = value;
        self.set_nz(value);
    }

    fn ldy(&mut self, value: u8) {
        self.y = value;
        self.set_nz(value);
    }

    fn ora(&mut self, value: u8) {
        self.a |= value;
        self.set_nz(self.a);
    }

    fn and(&mut self, value: u8) {
        self.a &= value;
        self.set_nz(self.a);
    }

    fn eor(&mut self, value: u8) {
        self.a ^= value;
        self.set_nz(self.a);
    }

    fn adc(&mut self, value: u8) {
        let sum = self.a as u16 + value as u16 + (self.p & FLAG_C) as u16;
        let result = sum as u8;
        self.set_flag(FLAG_V, (self.a ^ value ^ 0x80) & (self.a ^ result) & 0x80 != 0);
        self.set_flag(FLAG_C, sum > 0xFF);
        self.lda(result);
    }

    fn sbc(&mut self, value: u8) {
        let borrow = i16::from(self.p & FLAG_C == 0);
        let diff = self.a as i16 - value as i16 - borrow;
        let result = diff as u8;
        self.set_flag(FLAG_V, (self.a ^ value) & (self.a ^ result) & 0x80 != 0);
        self.set_flag(FLAG_C, diff >= 0);
        self.lda(result);
    }

    fn compare(&mut self, register: u8, value: u8) {
        self.set_flag(FLAG_C, register >= value);
        self.set_nz(register.wrapping_sub(value));
    }

    fn cmp(&mut self, value: u8) {
        self.compare(self.a, value);
    }

    fn cpx(&mut self, value: u8) {
        self.compare(self.x, value);
    }

    fn cpy(&mut self, value: u8) {
        self.compare(self.y, value);
    }

    fn bit(&mut self, value: u8) {
        self.p = (self.p & !(FLAG_N | FLAG_V | FLAG_Z))
            | (value & (FLAG_N | FLAG_V))
            | if self.a & value == 0 { FLAG_Z } else { 0 };
    }

    fn asl(&mut self, value: u8) -> u8 {
        let result = value << 1;
        self.set_flag(FLAG_C, value & 0x80 != 0);
        self.set_nz(result);
        result
    }

    fn lsr(&mut self, value: u8) -> u8 {
        let result = value >> 1;
        self.set_flag(FLAG_C, value & 0x01 != 0);
        self.set_nz(result);
        result
    }

    fn rol(&mut self, value: u8) -> u8 {
        let result = (value << 1) | (self.p & FLAG_C);
        self.set_flag(FLAG_C, value & 0x80 != 0);
        self.set_nz(result);
        result
    }

    fn ror(&mut self, value: u8) -> u8 {
        let result = (value >> 1) | ((self.p & FLAG_C) << 7);
        self.set_flag(FLAG_C, value & 0x01 != 0);
        self.set_nz(result);
        result
    }

    fn inc(&mut self, value: u8) -> u8 {
        let result = value.wrapping_add(1);
        self.set_nz(result);
        result
    }

    fn dec(&mut self, value: u8) -> u8 {
        let result = value.wrapping_sub(1);
        self.set_nz(result);
        result
    }

    fn brk<B: Bus>(&mut self, bus: &mut B) -> u32 {
        // Skip the padding byte after the opcode.
        self.pc = self.pc.wrapping_add(1);
        self.push_pc(bus);
        self.p |= FLAG_B;
        let status = self.p;
        self.push(bus, status);
        self.p |= FLAG_I;
        self.pc = bus.peek_word(IRQ_VECTOR);
        7
    }

    /// Service a hardware interrupt request. Returns the cycles spent, which
    /// is zero while interrupts are disabled.
    pub fn irq<B: Bus>(&mut self, bus: &mut B) -> u32 {
        if self.flag(FLAG_I) {
            return 0;
        }
        self.push_pc(bus);
        self.p &= !FLAG_B;
        let status = self.p;
        self.push(bus, status);
        self.p |= FLAG_I;
        self.pc = bus.peek_word(IRQ_VECTOR);
        IRQ_CYCLES
    }

    /// Execute one instruction and return the cycles it consumed.
    pub fn step<B: Bus>(&mut self, bus: &mut B) -> u32 {
        cpu_trace!(
            "PC:{:04X} OP:{:02X} A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X}",
            self.pc,
            bus.peek(self.pc),
            self.a,
            self.x,
            self.y,
            self.p,
            self.sp
        );
        let opcode = self.fetch8(bus);
        match opcode {
            0x00 => self.brk(bus),
            0x01 => self.read_op(bus, Mode::IndX, 6, Self::ora),
            0x05 => self.read_op(bus, Mode::Zp, 3, Self::ora),
            0x06 => self.modify_op(bus, Mode::Zp, 5, Self::asl),
            0x08 => {
                let status = self.p;
                self.push(bus, status);
                3
            }
            0x09 => self.read_op(bus, Mode::Imm, 2, Self::ora),
            0x0A => {
                self.a = self.asl(self.a);
                2
            }
            0x0D => self.read_op(bus, Mode::Abs, 4, Self::ora),
            0x0E => self.modify_op(bus, Mode::Abs, 6, Self::asl),
            0x10 => self.branch(bus, !self.flag(FLAG_N)),
            0x11 => self.read_op(bus, Mode::IndY, 5, Self::ora),
            0x15 => self.read_op(bus, Mode::ZpX, 4, Self::ora),
            0x16 => self.modify_op(bus, Mode::ZpX, 6, Self::asl),
            0x18 => {
                self.p &= !FLAG_C;
                2
            }
            0x19 => self.read_op(bus, Mode::AbsY, 4, Self::ora),
            0x1D => self.read_op(bus, Mode::AbsX, 4, Self::ora),
            0x1E => self.modify_op(bus, Mode::AbsX, 6, Self::asl),
            0x20 => {
                let target = self.fetch16(bus);
                self.pc = self.pc.wrapping_sub(1);
                self.push_pc(bus);
                self.pc = target;
                6
            }
            0x21 => self.read_op(bus, Mode::IndX, 6, Self::and),
            0x24 => self.read_op(bus, Mode::Zp, 3, Self::bit),
            0x25 => self.read_op(bus, Mode::Zp, 3, Self::and),
            0x26 => self.modify_op(bus, Mode::Zp, 5, Self::rol),
            0x28 => {
                self.p = self.pull(bus);
                4
            }
            0x29 => self.read_op(bus, Mode::Imm, 2, Self::and),
            0x2A => {
                self.a = self.rol(self.a);
                2
            }
            0x2C => self.read_op(bus, Mode::Abs, 4, Self::bit),
            0x2D => self.read_op(bus, Mode::Abs, 4, Self::and),
            0x2E => self.modify_op(bus, Mode::Abs, 6, Self::rol),
            0x30 => self.branch(bus, self.flag(FLAG_N)),
            0x31 => self.read_op(bus, Mode::IndY, 5, Self::and),
            0x35 => self.read_op(bus, Mode::ZpX, 4, Self::and),
            0x36 => self.modify_op(bus, Mode::ZpX, 6, Self::rol),
            0x38 => {
                self.p |= FLAG_C;
                2
            }
            0x39 => self.read_op(bus, Mode::AbsY, 4, Self::and),
            0x3D => self.read_op(bus, Mode::AbsX, 4, Self::and),
            0x3E => self.modify_op(bus, Mode::AbsX, 6, Self::rol),
            0x40 => {
                self.p = self.pull(bus);
                self.pc = self.pull_pc(bus);
                6
            }
            0x41 => self.read_op(bus, Mode::IndX, 6, Self::eor),
            0x45 => self.read_op(bus, Mode::Zp, 3, Self::eor),
            0x46 => self.modify_op(bus, Mode::Zp, 5, Self::lsr),
            0x48 => {
                let a = self.a;
                self.push(bus, a);
                3
            }
            0x49 => self.read_op(bus, Mode::Imm, 2, Self::eor),
            0x4A => {
                self.a = self.lsr(self.a);
                2
            }
            0x4C => {
                self.pc = self.fetch16(bus);
                3
            }
            0x4D => self.read_op(bus, Mode::Abs, 4, Self::eor),
            0x4E => self.modify_op(bus, Mode::Abs, 6, Self::lsr),
            0x50 => self.branch(bus, !self.flag(FLAG_V)),
            0x51 => self.read_op(bus, Mode::IndY, 5, Self::eor),
            0x55 => self.read_op(bus, Mode::ZpX, 4, Self::eor),
            0x56 => self.modify_op(bus, Mode::ZpX, 6, Self::lsr),
            0x58 => {
                self.p &= !FLAG_I;
                2
            }
            0x59 => self.read_op(bus, Mode::AbsY, 4, Self::eor),
            0x5D => self.read_op(bus, Mode::AbsX, 4, Self::eor),
            0x5E => self.modify_op(bus, Mode::AbsX, 6, Self::lsr),
            0x60 => {
                self.pc = self.pull_pc(bus).wrapping_add(1);
                6
            }
            0x61 => self.read_op(bus, Mode::IndX, 6, Self::adc),
            0x65 => self.read_op(bus, Mode::Zp, 3, Self::adc),
            0x66 => self.modify_op(bus, Mode::Zp, 5, Self::ror),
            0x68 => {
                let value = self.pull(bus);
                self.lda(value);
                4
            }
            0x69 => self.read_op(bus, Mode::Imm, 2, Self::adc),
            0x6A => {
                self.a = self.ror(self.a);
                2
            }
            0x6C => {
                // No page-wrap quirk on the pointer.
                let ptr = self.fetch16(bus);
                self.pc = bus.peek_word(ptr);
                6
            }
            0x6D => self.read_op(bus, Mode::Abs, 4, Self::adc),
            0x6E => self.modify_op(bus, Mode::Abs, 6, Self::ror),
            0x70 => self.branch(bus, self.flag(FLAG_V)),
            0x71 => self.read_op(bus, Mode::IndY, 5, Self::adc),
            0x75 => self.read_op(bus, Mode::ZpX, 4, Self::adc),
            0x76 => self.modify_op(bus, Mode::ZpX, 6, Self::ror),
            0x78 => {
                self.p |= FLAG_I;
                2
            }
            0x79 => self.read_op(bus, Mode::AbsY, 4, Self::adc),
            0x7D => self.read_op(bus, Mode::AbsX, 4, Self::adc),
            0x7E => self.modify_op(bus, Mode::AbsX, 6, Self::ror),
            0x81 => self.write_op(bus, Mode::IndX, 6, self.a),
            0x84 => self.write_op(bus, Mode::Zp, 3, self.y),
            0x85 => self.write_op(bus, Mode::Zp, 3, self.a),
            0x86 => self.write_op(bus, Mode::Zp, 3, self.x),
            0x88 => {
                self.y = self.dec(self.y);
                2
            }
            0x8A => {
                self.lda(self.x);
                2
            }
            0x8C => self.write_op(bus, Mode::Abs, 4, self.y),
            0x8D => self.write_op(bus, Mode::Abs, 4, self.a),
            0x8E => self.write_op(bus, Mode::Abs, 4, self.x),
            0x90 => self.branch(bus, !self.flag(FLAG_C)),
            0x91 => self.write_op(bus, Mode::IndY, 6, self.a),
            0x94 => self.write_op(bus, Mode::ZpX, 4, self.y),
            0x95 => self.write_op(bus, Mode::ZpX, 4, self.a),
            0x96 => self.write_op(bus, Mode::ZpY, 4, self.x),
            0x98 => {
                self.lda(self.y);
                2
            }
            0x99 => self.write_op(bus, Mode::AbsY, 5, self.a),
            0x9A => {
                self.sp = self.x;
                2
            }
            0x9D => self.write_op(bus, Mode::AbsX, 5, self.a),
            0xA0 => self.read_op(bus, Mode::Imm, 2, Self::ldy),
            0xA1 => self.read_op(bus, Mode::IndX, 6, Self::lda),
            0xA2 => self.read_op(bus, Mode::Imm, 2, Self::ldx),
            0xA4 => self.read_op(bus, Mode::Zp, 3, Self::ldy),
            0xA5 => self.read_op(bus, Mode::Zp, 3, Self::lda),
            0xA6 => self.read_op(bus, Mode::Zp, 3, Self::ldx),
            0xA8 => {
                self.ldy(self.a);
                2
            }
            0xA9 => self.read_op(bus, Mode::Imm, 2, Self::lda),
            0xAA => {
                self.ldx(self.a);
                2
            }
            0xAC => self.read_op(bus, Mode::Abs, 4, Self::ldy),
            0xAD => self.read_op(bus, Mode::Abs, 4, Self::lda),
            0xAE => self.read_op(bus, Mode::Abs, 4, Self::ldx),
            0xB0 => self.branch(bus, self.flag(FLAG_C)),
            0xB1 => self.read_op(bus, Mode::IndY, 5, Self::lda),
            0xB4 => self.read_op(bus, Mode::ZpX, 4, Self::ldy),
            0xB5 => self.read_op(bus, Mode::ZpX, 4, Self::lda),
            0xB6 => self.read_op(bus, Mode::ZpY, 4, Self::ldx),
            0xB8 => {
                self.p &= !FLAG_V;
                2
            }
            0xB9 => self.read_op(bus, Mode::AbsY, 4, Self::lda),
            0xBA => {
                self.ldx(self.sp);
                2
            }
            0xBC => self.read_op(bus, Mode::AbsX, 4, Self::ldy),
            0xBD => self.read_op(bus, Mode::AbsX, 4, Self::lda),
            0xBE => self.read_op(bus, Mode::AbsY, 4, Self::ldx),
            0xC0 => self.read_op(bus, Mode::Imm, 2, Self::cpy),
            0xC1 => self.read_op(bus, Mode::IndX, 6, Self::cmp),
            0xC4 => self.read_op(bus, Mode::Zp, 3, Self::cpy),
            0xC5 => self.read_op(bus, Mode::Zp, 3, Self::cmp),
            0xC6 => self.modify_op(bus, Mode::Zp, 5, Self::dec),
            0xC8 => {
                self.y = self.inc(self.y);
                2
            }
            0xC9 => self.read_op(bus, Mode::Imm, 2, Self::cmp),
            0xCA => {
                self.x = self.dec(self.x);
                2
            }
            0xCC => self.read_op(bus, Mode::Abs, 4, Self::cpy),
            0xCD => self.read_op(bus, Mode::Abs, 4, Self::cmp),
            0xCE => self.modify_op(bus, Mode::Abs, 6, Self::dec),
            0xD0 => self.branch(bus, !self.flag(FLAG_Z)),
            0xD1 => self.read_op(bus, Mode::IndY, 5, Self::cmp),
            0xD5 => self.read_op(bus, Mode::ZpX, 4, Self::cmp),
            0xD6 => self.modify_op(bus, Mode::ZpX, 6, Self::dec),
            0xD8 => {
                self.p &= !FLAG_D;
                2
            }
            0xD9 => self.read_op(bus, Mode::AbsY, 4, Self::cmp),
            0xDD => self.read_op(bus, Mode::AbsX, 4, Self::cmp),
            0xDE => self.modify_op(bus, Mode::AbsX, 6, Self::dec),
            0xE0 => self.read_op(bus, Mode::Imm, 2, Self::cpx),
            0xE1 => self.read_op(bus, Mode::IndX, 6, Self::sbc),
            0xE4 => self.read_op(bus, Mode::Zp, 3, Self::cpx),
            0xE5 => self.read_op(bus, Mode::Zp, 3, Self::sbc),
            0xE6 => self.modify_op(bus, Mode::Zp, 5, Self::inc),
            0xE8 => {
                self.x = self.inc(self.x);
                2
            }
            0xE9 => self.read_op(bus, Mode::Imm, 2, Self::sbc),
            0xEA => 2,
            0xEC => self.read_op(bus, Mode::Abs, 4, Self::cpx),
            0xED => self.read_op(bus, Mode::Abs, 4, Self::sbc),
            0xEE => self.modify_op(bus, Mode::Abs, 6, Self::inc),
            0xF0 => self.branch(bus, self.flag(FLAG_Z)),
            0xF1 => self.read_op(bus, Mode::IndY, 5, Self::sbc),
            0xF5 => self.read_op(bus, Mode::ZpX, 4, Self::sbc),
            0xF6 => self.modify_op(bus, Mode::ZpX, 6, Self::inc),
            0xF8 => {
                self.p |= FLAG_D;
                2
            }
            0xF9 => self.read_op(bus, Mode::AbsY, 4, Self::sbc),
            0xFD => self.read_op(bus, Mode::AbsX, 4, Self::sbc),
            0xFE => self.modify_op(bus, Mode::AbsX, 6, Self::inc),
            _ => {
                self.illegal_opcodes += 1;
                log::trace!(
                    "illegal opcode {opcode:02X} at {:04X}",
                    self.pc.wrapping_sub(1)
                );
                0
            }
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: u16 = 0x0200;
    const FLAGS: u8 = FLAG_N | FLAG_V | FLAG_Z | FLAG_C;

    struct FlatBus {
        mem: Vec<u8>,
    }

    impl FlatBus {
        fn with_program(program: &[u8]) -> Self {
            let mut mem = vec![0u8; 0x10000];
            mem[ORIGIN as usize..ORIGIN as usize + program.len()].copy_from_slice(program);
            Self { mem }
        }
    }

    impl Bus for FlatBus {
        fn peek(&self, addr: u16) -> u8 {
            self.mem[addr as usize]
        }

        fn load(&mut self, addr: u16) -> u8 {
            self.mem[addr as usize]
        }

        fn store(&mut self, addr: u16, value: u8) {
            self.mem[addr as usize] = value;
        }
    }

    fn cpu_at_origin() -> Cpu {
        Cpu {
            pc: ORIGIN,
            ..Cpu::new()
        }
    }

    #[test]
    fn adc_flag_table() {
        // (a, operand, carry in, result, N/V/Z/C)
        let cases = [
            (0x00, 0x00, false, 0x00, FLAG_Z),
            (0x00, 0x00, true, 0x01, 0),
            (0x7F, 0x01, false, 0x80, FLAG_N | FLAG_V),
            (0xFF, 0x01, false, 0x00, FLAG_Z | FLAG_C),
            (0x80, 0x80, false, 0x00, FLAG_Z | FLAG_C | FLAG_V),
            (0xFF, 0xFF, true, 0xFF, FLAG_N | FLAG_C),
            (0x80, 0xFF, false, 0x7F, FLAG_V | FLAG_C),
        ];
        for (a, operand, carry, result, flags) in cases {
            let mut bus = FlatBus::with_program(&[0x69, operand]);
            let mut cpu = cpu_at_origin();
            cpu.a = a;
            cpu.set_flag(FLAG_C, carry);
            assert_eq!(cpu.step(&mut bus), 2);
            assert_eq!(cpu.a, result, "ADC {a:02X}+{operand:02X} c={carry}");
            assert_eq!(cpu.p & FLAGS, flags, "ADC {a:02X}+{operand:02X} c={carry}");
        }
    }

    #[test]
    fn sbc_flag_table() {
        let cases = [
            (0x00, 0x00, true, 0x00, FLAG_Z | FLAG_C),
            (0x00, 0x01, true, 0xFF, FLAG_N),
            (0x80, 0x01, true, 0x7F, FLAG_V | FLAG_C),
            (0x7F, 0xFF, true, 0x80, FLAG_N | FLAG_V),
            (0xFF, 0xFF, false, 0xFF, FLAG_N),
            (0x01, 0x00, false, 0x00, FLAG_Z | FLAG_C),
        ];
        for (a, operand, carry, result, flags) in cases {
            let mut bus = FlatBus::with_program(&[0xE9, operand]);
            let mut cpu = cpu_at_origin();
            cpu.a = a;
            cpu.set_flag(FLAG_C, carry);
            cpu.step(&mut bus);
            assert_eq!(cpu.a, result, "SBC {a:02X}-{operand:02X} c={carry}");
            assert_eq!(cpu.p & FLAGS, flags, "SBC {a:02X}-{operand:02X} c={carry}");
        }
    }

    #[test]
    fn logical_and_compare_flags() {
        // (opcode, a, operand, result a, N/V/Z/C with carry clear beforehand)
        let cases = [
            (0x29, 0xF0, 0x0F, 0x00, FLAG_Z),
            (0x29, 0xFF, 0x80, 0x80, FLAG_N),
            (0x09, 0x00, 0x00, 0x00, FLAG_Z),
            (0x09, 0x01, 0x80, 0x81, FLAG_N),
            (0x49, 0xFF, 0xFF, 0x00, FLAG_Z),
            (0x49, 0x7F, 0xFF, 0x80, FLAG_N),
            (0xC9, 0x80, 0x80, 0x80, FLAG_Z | FLAG_C),
            (0xC9, 0x00, 0x01, 0x00, FLAG_N),
            (0xC9, 0xFF, 0x00, 0xFF, FLAG_N | FLAG_C),
        ];
        for (opcode, a, operand, result, flags) in cases {
            let mut bus = FlatBus::with_program(&[opcode, operand]);
            let mut cpu = cpu_at_origin();
            cpu.a = a;
            cpu.step(&mut bus);
            assert_eq!(cpu.a, result, "{opcode:02X} {a:02X},{operand:02X}");
            assert_eq!(cpu.p & FLAGS, flags, "{opcode:02X} {a:02X},{operand:02X}");
        }
    }

    #[test]
    fn index_register_flags() {
        // (program, x, y, x after, y after, N/V/Z/C with carry clear beforehand)
        let cases: &[(&[u8], u8, u8, u8, u8, u8)] = &[
            (&[0xE0, 0x80], 0x7F, 0x00, 0x7F, 0x00, FLAG_N),
            (&[0xE0, 0x80], 0x80, 0x00, 0x80, 0x00, FLAG_Z | FLAG_C),
            (&[0xE0, 0x00], 0xFF, 0x00, 0xFF, 0x00, FLAG_N | FLAG_C),
            (&[0xC0, 0x00], 0x00, 0x00, 0x00, 0x00, FLAG_Z | FLAG_C),
            (&[0xC0, 0x01], 0x00, 0x00, 0x00, 0x00, FLAG_N),
            (&[0xE8], 0xFF, 0x00, 0x00, 0x00, FLAG_Z),
            (&[0xE8], 0x7F, 0x00, 0x80, 0x00, FLAG_N),
            (&[0xCA], 0x00, 0x00, 0xFF, 0x00, FLAG_N),
            (&[0xCA], 0x01, 0x00, 0x00, 0x00, FLAG_Z),
            (&[0xC8], 0x00, 0xFF, 0x00, 0x00, FLAG_Z),
            (&[0x88], 0x00, 0x00, 0x00, 0xFF, FLAG_N),
            (&[0x88], 0x00, 0x80, 0x00, 0x7F, 0),
        ];
        for &(program, x, y, x_after, y_after, flags) in cases {
            let mut bus = FlatBus::with_program(program);
            let mut cpu = cpu_at_origin();
            cpu.x = x;
            cpu.y = y;
            cpu.step(&mut bus);
            assert_eq!((cpu.x, cpu.y), (x_after, y_after), "{program:02X?} x={x:02X} y={y:02X}");
            assert_eq!(cpu.p & FLAGS, flags, "{program:02X?} x={x:02X} y={y:02X}");
        }
    }

    #[test]
    fn memory_operand_flags() {
        // (opcode, a, carry in, byte at $10, a after, byte after, N/V/Z/C)
        let cases = [
            (0xE6, 0x00, false, 0xFF, 0x00, 0x00, FLAG_Z),
            (0xE6, 0x00, false, 0x7F, 0x00, 0x80, FLAG_N),
            (0xE6, 0x00, true, 0xFF, 0x00, 0x00, FLAG_Z | FLAG_C),
            (0xC6, 0x00, false, 0x00, 0x00, 0xFF, FLAG_N),
            (0xC6, 0x00, false, 0x01, 0x00, 0x00, FLAG_Z),
            (0xC6, 0x00, false, 0x80, 0x00, 0x7F, 0),
            (0x65, 0x7F, false, 0x01, 0x80, 0x01, FLAG_N | FLAG_V),
            (0x65, 0xFF, false, 0x01, 0x00, 0x01, FLAG_Z | FLAG_C),
            (0x65, 0x80, false, 0x80, 0x00, 0x80, FLAG_Z | FLAG_C | FLAG_V),
            (0xE5, 0x80, true, 0x01, 0x7F, 0x01, FLAG_V | FLAG_C),
            (0xE5, 0x00, true, 0x01, 0xFF, 0x01, FLAG_N),
            (0xE5, 0xFF, true, 0xFF, 0x00, 0xFF, FLAG_Z | FLAG_C),
        ];
        for (opcode, a, carry, value, a_after, value_after, flags) in cases {
            let mut bus = FlatBus::with_program(&[opcode, 0x10]);
            bus.mem[0x10] = value;
            let mut cpu = cpu_at_origin();
            cpu.a = a;
            cpu.set_flag(FLAG_C, carry);
            cpu.step(&mut bus);
            assert_eq!(cpu.a, a_after, "{opcode:02X} a={a:02X} m={value:02X}");
            assert_eq!(bus.mem[0x10], value_after, "{opcode:02X} a={a:02X} m={value:02X}");
            assert_eq!(cpu.p & FLAGS, flags, "{opcode:02X} a={a:02X} m={value:02X}");
        }
    }

    #[test]
    fn bit_copies_operand_bits() {
        let mut bus = FlatBus::with_program(&[0x24, 0x10]);
        bus.mem[0x10] = 0xC0;
        let mut cpu = cpu_at_origin();
        cpu.a = 0x01;
        assert_eq!(cpu.step(&mut bus), 3);
        assert_eq!(cpu.p & FLAGS, FLAG_N | FLAG_V | FLAG_Z);
    }

    #[test]
    fn shifts_and_rotates_through_carry() {
        let mut bus = FlatBus::with_program(&[0x2A, 0x6A, 0x0A, 0x4A]);
        let mut cpu = cpu_at_origin();
        cpu.a = 0x80;
        cpu.step(&mut bus); // ROL A
        assert_eq!(cpu.a, 0x00);
        assert_eq!(cpu.p & FLAGS, FLAG_Z | FLAG_C);
        cpu.step(&mut bus); // ROR A
        assert_eq!(cpu.a, 0x80);
        assert_eq!(cpu.p & FLAGS, FLAG_N);
        cpu.step(&mut bus); // ASL A
        assert_eq!(cpu.a, 0x00);
        assert_eq!(cpu.p & FLAGS, FLAG_Z | FLAG_C);
        cpu.a = 0x01;
        cpu.step(&mut bus); // LSR A
        assert_eq!(cpu.a, 0x00);
        assert_eq!(cpu.p & FLAGS, FLAG_Z | FLAG_C);
    }

    #[test]
    fn indexed_reads_pay_for_page_cross_but_stores_do_not() {
        let mut bus = FlatBus::with_program(&[0xBD, 0xFF, 0x10, 0xBD, 0x00, 0x10, 0x9D, 0xFF, 0x10]);
        bus.mem[0x1100] = 0x42;
        let mut cpu = cpu_at_origin();
        cpu.x = 1;
        assert_eq!(cpu.step(&mut bus), 5);
        assert_eq!(cpu.a, 0x42);
        assert_eq!(cpu.step(&mut bus), 4);
        assert_eq!(cpu.step(&mut bus), 5);
        assert_eq!(bus.mem[0x1100], 0x00);
    }

    #[test]
    fn indirect_indexed_page_cross() {
        let mut bus = FlatBus::with_program(&[0xB1, 0x20]);
        bus.mem[0x20] = 0xF0;
        bus.mem[0x21] = 0x30;
        bus.mem[0x3110] = 0x99;
        let mut cpu = cpu_at_origin();
        cpu.y = 0x20;
        assert_eq!(cpu.step(&mut bus), 6);
        assert_eq!(cpu.a, 0x99);
    }

    #[test]
    fn branch_cycles() {
        // BNE +2 not taken, taken within the page, then taken across a page.
        let mut bus = FlatBus::with_program(&[0xD0, 0x02]);
        let mut cpu = cpu_at_origin();
        cpu.p |= FLAG_Z;
        assert_eq!(cpu.step(&mut bus), 2);
        assert_eq!(cpu.pc, ORIGIN + 2);

        let mut cpu = cpu_at_origin();
        assert_eq!(cpu.step(&mut bus), 3);
        assert_eq!(cpu.pc, ORIGIN + 4);

        let mut bus = FlatBus::with_program(&[0xD0, 0x80]);
        let mut cpu = cpu_at_origin();
        assert_eq!(cpu.step(&mut bus), 4);
        assert_eq!(cpu.pc, 0x0182);
    }

    #[test]
    fn jsr_and_rts_round_trip() {
        let mut bus = FlatBus::with_program(&[0x20, 0x00, 0x03]);
        bus.mem[0x0300] = 0x60;
        let mut cpu = cpu_at_origin();
        assert_eq!(cpu.step(&mut bus), 6);
        assert_eq!(cpu.pc, 0x0300);
        assert_eq!(cpu.sp, 0xFD);
        assert_eq!(bus.mem[0x01FF], 0x02);
        assert_eq!(bus.mem[0x01FE], 0x02);
        assert_eq!(cpu.step(&mut bus), 6);
        assert_eq!(cpu.pc, ORIGIN + 3);
        assert_eq!(cpu.sp, 0xFF);
    }

    #[test]
    fn brk_pushes_break_flag_and_rti_restores() {
        let mut bus = FlatBus::with_program(&[0x00, 0xEA]);
        bus.mem[0xFFFE] = 0x00;
        bus.mem[0xFFFF] = 0x04;
        bus.mem[0x0400] = 0x40;
        let mut cpu = cpu_at_origin();
        cpu.p = FLAG_U;
        assert_eq!(cpu.step(&mut bus), 7);
        assert_eq!(cpu.pc, 0x0400);
        assert!(cpu.flag(FLAG_I));
        assert_eq!(bus.mem[0x01FF], 0x02);
        assert_eq!(bus.mem[0x01FE], 0x02);
        assert_eq!(bus.mem[0x01FD], FLAG_U | FLAG_B);

        assert_eq!(cpu.step(&mut bus), 6);
        assert_eq!(cpu.pc, ORIGIN + 2);
        assert_eq!(cpu.p, FLAG_U | FLAG_B);
    }

    #[test]
    fn irq_is_masked_by_interrupt_disable() {
        let mut bus = FlatBus::with_program(&[]);
        bus.mem[0xFFFE] = 0x34;
        bus.mem[0xFFFF] = 0x12;
        let mut cpu = cpu_at_origin();
        assert_eq!(cpu.irq(&mut bus), 0);
        assert_eq!(cpu.pc, ORIGIN);

        cpu.p = FLAG_U | FLAG_B;
        assert_eq!(cpu.irq(&mut bus), 7);
        assert_eq!(cpu.pc, 0x1234);
        assert_eq!(bus.mem[0x01FD], FLAG_U);
        assert!(cpu.flag(FLAG_I));
    }

    #[test]
    fn illegal_opcode_is_counted_zero_cycle_noop() {
        let mut bus = FlatBus::with_program(&[0x02, 0xFF]);
        let mut cpu = cpu_at_origin();
        let before = cpu.clone();
        assert_eq!(cpu.step(&mut bus), 0);
        assert_eq!(cpu.pc, ORIGIN + 1);
        assert_eq!(cpu.illegal_opcodes, 1);
        assert_eq!((cpu.a, cpu.p, cpu.sp), (before.a, before.p, before.sp));
    }

    #[test]
    fn jmp_indirect_reads_across_page() {
        let mut bus = FlatBus::with_program(&[0x6C, 0xFF, 0x10]);
        bus.mem[0x10FF] = 0x34;
        bus.mem[0x1100] = 0x12;
        let mut cpu = cpu_at_origin();
        cpu.step(&mut bus);
        assert_eq!(cpu.pc, 0x1234);
    }

    #[test]
    fn reset_loads_vector() {
        let mut bus = FlatBus::with_program(&[]);
        bus.mem[0xFFFC] = 0x00;
        bus.mem[0xFFFD] = 0xE0;
        let mut cpu = cpu_at_origin();
        cpu.a = 9;
        cpu.reset(&bus);
        assert_eq!(cpu.pc, 0xE000);
        assert_eq!(cpu.p, 0x24);
        assert_eq!(cpu.sp, 0xFF);
        assert_eq!(cpu.a, 0);
    }
}
