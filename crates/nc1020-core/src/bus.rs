/// Memory as seen by the CPU.
pub trait Bus {
    /// Read without side effects. Used for opcode, operand and pointer fetches.
    fn peek(&self, addr: u16) -> u8;

    /// Read that may trigger I/O, flash status or wake-flag side effects.
    fn load(&mut self, addr: u16) -> u8;

    /// Write that may remap windows or feed the flash sequencer.
    fn store(&mut self, addr: u16, value: u8);

    /// Little-endian word at `addr`. The high byte comes from `addr + 1`
    /// without wrapping inside the page.
    fn peek_word(&self, addr: u16) -> u16 {
        u16::from_le_bytes([self.peek(addr), self.peek(addr.wrapping_add(1))])
    }
}
