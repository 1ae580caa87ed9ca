//! Digiac CPU registers.
//!
//! The Digiac-3080 had:
//! - A: accumulator (sign + 24 bits)
//! - B: secondary register, the low half of products and the quotient of divides
//! - PC: 12-bit program counter
//!
//! The instruction counter is an emulator addition used for status and trace.

use crate::cpu::memory::MEMORY_SIZE;
use crate::word::Word;
use serde::{Serialize, Deserialize};

/// Mask for a 12-bit address.
pub const ADDRESS_MASK: u16 = 0o7777;

/// The Digiac register file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// A: accumulator.
    pub a: Word,

    /// B: secondary register.
    pub b: Word,

    /// PC: address of the next instruction to fetch.
    pub pc: u16,

    /// Instructions retired since the session started.
    pub instruction_count: u64,
}

impl Registers {
    /// Create a new register file with all values zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Increment the program counter by 1, wrapping at the top of memory.
    /// Returns the old value.
    pub fn advance_pc(&mut self) -> u16 {
        let old = self.pc;
        self.pc = next_address(old);
        old
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, addr: u16) {
        self.pc = addr & ADDRESS_MASK;
    }
}

/// The address after `addr`, wrapping from 7777 to 0000.
#[inline]
pub fn next_address(addr: u16) -> u16 {
    ((usize::from(addr) + 1) % MEMORY_SIZE) as u16
}
