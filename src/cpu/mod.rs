//! CPU emulation for the Digiac-3080.
//!
//! This module implements the Digiac-3080 processor:
//! - 4096 words of core memory, sign + 24 bits each
//! - A and B registers, a 12-bit program counter
//! - a single-address instruction set with sign control and shift on
//!   memory operands, and block I/O to the typewriter and paper tape

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;

pub use memory::{Memory, MemoryError, MEMORY_SIZE};
pub use registers::Registers;
pub use decode::{Block, DecodeError, Instruction, Operand};
pub use execute::{Access, Cpu, CpuError, CpuState, Effect, ExecFault, Executed, MemoryAccess};
