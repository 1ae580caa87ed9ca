//! Disassembler for Digiac programs.
//!
//! Programs reach the machine as paper tape images, so there is no
//! assembler; the disassembler turns words back into mnemonics for traces
//! and the `disasm` command.

pub mod disasm;

pub use disasm::{disassemble, disassemble_instruction, format_instruction};
