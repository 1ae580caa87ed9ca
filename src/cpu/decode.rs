//! Instruction decoder for the Digiac-3080.
//!
//! Every instruction is a single word: a two-digit opcode, a two-digit
//! count, and a four-digit address (all octal). The sign of the word is
//! not part of the instruction.

use crate::word::arith::SignControl;
use crate::word::Word;
use thiserror::Error;

/// Memory operand of the load/arithmetic/store group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operand {
    /// Memory address.
    pub addr: u16,
    /// Sign handling (low two opcode bits).
    pub sign: SignControl,
    /// Shift count applied to the magnitude (see [`crate::word::arith::shift_magnitude`]).
    pub count: u8,
}

impl Operand {
    pub fn new(addr: u16) -> Self {
        Self { addr, sign: SignControl::AsIs, count: 0 }
    }

    pub fn with_sign(mut self, sign: SignControl) -> Self {
        self.sign = sign;
        self
    }

    pub fn with_count(mut self, count: u8) -> Self {
        self.count = count & 0o77;
        self
    }
}

/// A run of consecutive words moved by an I/O instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// First memory address.
    pub addr: u16,
    /// Raw count field; the block is `0o100 - count` words long.
    pub count: u8,
}

impl Block {
    /// A block of `words` words (1..=64) starting at `addr`.
    pub fn of_words(addr: u16, words: usize) -> Self {
        let words = words.clamp(1, 64) as u8;
        Self { addr, count: (0o100 - words) & 0o77 }
    }

    /// Number of words moved. A count of 0 moves 64 words.
    pub fn words(self) -> usize {
        0o100 - usize::from(self.count & 0o77)
    }
}

/// Decoded Digiac instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Halt.
    Hlt,

    // ==================== Arithmetic ====================

    /// A := A AND operand
    And(Operand),

    /// Clear and add: A := operand (CLS when negated)
    Cla(Operand),

    /// A := A + operand (SUB when negated)
    Add(Operand),

    /// (A, B) := A * operand
    Mlt(Operand),

    /// B := (A << 24) / operand, A := remainder
    Div(Operand),

    // ==================== Store ====================

    /// [addr] := A
    Sta(Operand),

    /// [addr] := B
    Stb(Operand),

    // ==================== Control Flow ====================

    /// PC := addr
    Jmp { addr: u16 },

    /// Branch if A is negative and non-zero.
    BrMinus { addr: u16 },

    /// Branch if A is positive and non-zero.
    BrPlus { addr: u16 },

    /// Branch if A is zero (either sign).
    Brz { addr: u16 },

    // ==================== Input/Output ====================

    /// Type Alpha: print a block of packed characters on the typewriter.
    TypeAlpha(Block),

    /// Read Tape: read a block of words from the paper tape reader.
    ReadTape(Block),

    /// Type In: read characters from the keyboard into a block.
    TypeIn(Block),

    /// Punch Tape: punch a block of words on the paper tape punch.
    PunchTape(Block),
}

/// Opcode values (octal).
struct Opcode;

impl Opcode {
    const HLT: u8 = 0o00;
    const AND: u8 = 0o04;
    const CLA: u8 = 0o10;
    const ADD: u8 = 0o14;
    const MLT: u8 = 0o20;
    const DIV: u8 = 0o24;
    const STA: u8 = 0o30;
    const STB: u8 = 0o34;
    const JMP: u8 = 0o44;
    const BR_MINUS: u8 = 0o45;
    const BR_PLUS: u8 = 0o46;
    const BRZ: u8 = 0o47;
    const TA: u8 = 0o54;
    const RT: u8 = 0o60;
    const TI: u8 = 0o63;
    const PT: u8 = 0o64;
}

impl Instruction {
    /// Whether this instruction talks to a peripheral.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Instruction::TypeAlpha(_)
                | Instruction::ReadTape(_)
                | Instruction::TypeIn(_)
                | Instruction::PunchTape(_)
        )
    }
}

/// Decode an instruction word.
///
/// The four-opcode groups (AND through STB) select their sign handling
/// with the low two opcode bits. Opcodes outside the table fail.
pub fn decode(word: Word) -> Result<Instruction, DecodeError> {
    let opcode = word.opcode();
    let count = word.count();
    let addr = word.address();

    let operand = Operand {
        addr,
        sign: SignControl::from_opcode(opcode),
        count,
    };
    let block = Block { addr, count };

    let instruction = match opcode {
        Opcode::HLT => Instruction::Hlt,
        op if op & !0b11 == Opcode::AND => Instruction::And(operand),
        op if op & !0b11 == Opcode::CLA => Instruction::Cla(operand),
        op if op & !0b11 == Opcode::ADD => Instruction::Add(operand),
        op if op & !0b11 == Opcode::MLT => Instruction::Mlt(operand),
        op if op & !0b11 == Opcode::DIV => Instruction::Div(operand),
        op if op & !0b11 == Opcode::STA => Instruction::Sta(operand),
        op if op & !0b11 == Opcode::STB => Instruction::Stb(operand),
        Opcode::JMP => Instruction::Jmp { addr },
        Opcode::BR_MINUS => Instruction::BrMinus { addr },
        Opcode::BR_PLUS => Instruction::BrPlus { addr },
        Opcode::BRZ => Instruction::Brz { addr },
        Opcode::TA => Instruction::TypeAlpha(block),
        Opcode::RT => Instruction::ReadTape(block),
        Opcode::TI => Instruction::TypeIn(block),
        Opcode::PT => Instruction::PunchTape(block),
        _ => return Err(DecodeError::InvalidOpcode(opcode)),
    };

    Ok(instruction)
}

/// Encode an instruction back to a word.
pub fn encode(instr: &Instruction) -> Word {
    let grouped = |base: u8, op: &Operand| {
        Word::from_fields(base | op.sign.bits(), op.count, op.addr)
    };

    match instr {
        Instruction::Hlt => Word::from_fields(Opcode::HLT, 0, 0),
        Instruction::And(op) => grouped(Opcode::AND, op),
        Instruction::Cla(op) => grouped(Opcode::CLA, op),
        Instruction::Add(op) => grouped(Opcode::ADD, op),
        Instruction::Mlt(op) => grouped(Opcode::MLT, op),
        Instruction::Div(op) => grouped(Opcode::DIV, op),
        Instruction::Sta(op) => grouped(Opcode::STA, op),
        Instruction::Stb(op) => grouped(Opcode::STB, op),
        Instruction::Jmp { addr } => Word::from_fields(Opcode::JMP, 0, *addr),
        Instruction::BrMinus { addr } => Word::from_fields(Opcode::BR_MINUS, 0, *addr),
        Instruction::BrPlus { addr } => Word::from_fields(Opcode::BR_PLUS, 0, *addr),
        Instruction::Brz { addr } => Word::from_fields(Opcode::BRZ, 0, *addr),
        Instruction::TypeAlpha(b) => Word::from_fields(Opcode::TA, b.count, b.addr),
        Instruction::ReadTape(b) => Word::from_fields(Opcode::RT, b.count, b.addr),
        Instruction::TypeIn(b) => Word::from_fields(Opcode::TI, b.count, b.addr),
        Instruction::PunchTape(b) => Word::from_fields(Opcode::PT, b.count, b.addr),
    }
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid or unknown opcode {0:02o}")]
    InvalidOpcode(u8),
}
