//! CPU execution engine for the Digiac-3080.
//!
//! Implements the fetch-decode-execute-advance cycle and all instruction
//! behaviors. A cycle either completes (registers, memory and PC all
//! updated) or faults, in which case PC and the instruction count are left
//! pointing at the faulting instruction so it can be fixed and retried.
//!
//! An I/O block that faults part-way keeps the words it already moved: the
//! retry picks up at the word that failed rather than the start of the
//! block, so a tape or keyboard that has moved on is not read twice.

use std::fmt;

use crate::cpu::decode::{self, Block, DecodeError, Instruction, Operand};
use crate::cpu::memory::MemoryError;
use crate::cpu::registers::{next_address, ADDRESS_MASK};
use crate::cpu::{Memory, Registers};
use crate::device::{DeviceError, DeviceManager, Slot};
use crate::word::{arith, charset, Word};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// Waiting for a run or step.
    Ready,
    /// Inside a run.
    Running,
    /// Stopped by HLT.
    Halted,
    /// Stopped by a fault.
    Faulted,
}

/// Kind of memory access made during a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Fetch,
    Read,
    Write,
}

/// One memory access made during a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryAccess {
    pub addr: u16,
    pub kind: Access,
}

/// What an instruction did, for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// HLT; `at` is the address after the halt.
    Halted { at: u16 },
    /// A was loaded.
    Accumulator(Word),
    /// A and B were loaded together (MLT, DIV).
    Registers { a: Word, b: Word },
    /// A word was stored.
    Stored { addr: u16, value: Word },
    /// PC was loaded.
    Jumped { to: u16 },
    /// A conditional branch fell through.
    NoBranch,
    /// An I/O block completed; `next` is the address after the block.
    Transfer { next: u16 },
    /// Read Tape ran off the end of the tape.
    EndOfTape { next: u16 },
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Halted { at } => write!(f, "HALTED at {:04o}", at),
            Effect::Accumulator(a) => write!(f, "A      <- {}", a),
            Effect::Registers { a, b } => {
                let sign = if a.is_negative() { '-' } else { '+' };
                write!(f, "AB: {}{:08o} {:08o}", sign, a.magnitude(), b.magnitude())
            }
            Effect::Stored { addr, value } => write!(f, "[{:04o}] <- {}", addr, value),
            Effect::Jumped { to } => write!(f, "PC     <-      {:04o}", to),
            Effect::NoBranch => f.write_str("no branch"),
            Effect::Transfer { next } => write!(f, "next addr:     {:04o}", next),
            Effect::EndOfTape { next } => write!(f, "end of tape, next addr: {:04o}", next),
        }
    }
}

/// A completed instruction cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Executed {
    /// Address the instruction was fetched from.
    pub pc: u16,
    /// The instruction word.
    pub word: Word,
    pub instruction: Instruction,
    pub effect: Effect,
}

/// The Digiac CPU.
#[derive(Clone)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Word fetched by the most recent cycle.
    last_fetch: Option<Word>,
    /// Memory accesses made by the most recent cycle.
    accesses: Vec<MemoryAccess>,
    /// Progress of an I/O block interrupted by a fault.
    partial: Option<PartialBlock>,
}

/// How far a faulted I/O block got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PartialBlock {
    pc: u16,
    word: Word,
    done: usize,
}

impl Cpu {
    /// Create a new CPU with zeroed state.
    pub fn new() -> Self {
        Self::with_memory(Memory::new())
    }

    /// Create a CPU over existing memory contents.
    pub fn with_memory(mem: Memory) -> Self {
        Self {
            regs: Registers::new(),
            mem,
            state: CpuState::Ready,
            last_fetch: None,
            accesses: Vec::new(),
            partial: None,
        }
    }

    /// Reset registers and clear memory.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.state = CpuState::Ready;
        self.last_fetch = None;
        self.accesses.clear();
        self.partial = None;
    }

    /// Load a program into memory at `start`.
    pub fn load_program(&mut self, start: u16, program: &[Word]) -> Result<(), MemoryError> {
        self.mem.load(usize::from(start), program)
    }

    /// Execute a single instruction.
    ///
    /// On a fault the CPU enters [`CpuState::Faulted`] (or stays
    /// [`CpuState::Ready`] if the operator interrupted a Type In) with PC
    /// and the instruction count unchanged.
    pub fn step(&mut self, devices: &mut DeviceManager) -> Result<Executed, ExecFault> {
        self.accesses.clear();
        self.state = CpuState::Running;
        let pc = self.regs.pc;

        // Fetch
        let word = match self.read(pc, Access::Fetch) {
            Ok(word) => word,
            Err(e) => return Err(self.fault(pc, None, e)),
        };
        self.last_fetch = Some(word);

        // Decode
        let instruction = match decode::decode(word) {
            Ok(instruction) => instruction,
            Err(e) => return Err(self.fault(pc, Some(word), e.into())),
        };

        // Partial progress only carries over to a retry of the same instruction.
        if self.partial.is_some_and(|p| p.pc != pc || p.word != word) {
            self.partial = None;
        }

        // Execute
        let (effect, jump) = match self.execute(instruction, devices) {
            Ok(result) => result,
            Err(e) => return Err(self.fault(pc, Some(word), e)),
        };

        // Advance
        self.regs.pc = match jump {
            Some(target) => target & ADDRESS_MASK,
            None => next_address(pc),
        };
        self.regs.instruction_count += 1;

        if instruction == Instruction::Hlt {
            self.state = CpuState::Halted;
        }

        trace!(pc = pc, word = %word, effect = %effect, "cycle");
        Ok(Executed { pc, word, instruction, effect })
    }

    fn fault(&mut self, pc: u16, word: Option<Word>, error: CpuError) -> ExecFault {
        self.state = if error.is_interrupt() {
            CpuState::Ready
        } else {
            CpuState::Faulted
        };
        ExecFault { pc, word, error }
    }

    /// Execute a decoded instruction, returning its effect and any jump target.
    fn execute(
        &mut self,
        instr: Instruction,
        devices: &mut DeviceManager,
    ) -> Result<(Effect, Option<u16>), CpuError> {
        let effect = match instr {
            Instruction::Hlt => Effect::Halted { at: next_address(self.regs.pc) },

            // ==================== Arithmetic ====================

            Instruction::And(op) => {
                let operand = self.operand(op)?;
                self.regs.a = arith::and(self.regs.a, operand);
                Effect::Accumulator(self.regs.a)
            }

            Instruction::Cla(op) => {
                self.regs.a = self.operand(op)?;
                Effect::Accumulator(self.regs.a)
            }

            Instruction::Add(op) => {
                let operand = self.operand(op)?;
                let (sum, overflow) = arith::add(self.regs.a, operand);
                if overflow {
                    trace!(pc = self.regs.pc, "accumulator overflow");
                }
                self.regs.a = sum;
                Effect::Accumulator(sum)
            }

            Instruction::Mlt(op) => {
                let operand = self.operand(op)?;
                let (high, low) = arith::multiply(self.regs.a, operand);
                self.regs.a = high;
                self.regs.b = low;
                Effect::Registers { a: high, b: low }
            }

            Instruction::Div(op) => {
                let divisor = self.operand(op)?;
                let (remainder, quotient) =
                    arith::divide(self.regs.a, divisor).ok_or(CpuError::DivideCheck)?;
                self.regs.a = remainder;
                self.regs.b = quotient;
                Effect::Registers { a: remainder, b: quotient }
            }

            // ==================== Store ====================

            Instruction::Sta(op) => self.store(op, self.regs.a)?,
            Instruction::Stb(op) => self.store(op, self.regs.b)?,

            // ==================== Control Flow ====================

            Instruction::Jmp { addr } => return Ok((Effect::Jumped { to: addr }, Some(addr))),

            Instruction::BrMinus { addr } => {
                let a = self.regs.a;
                return Ok(branch(a.is_negative() && !a.is_zero(), addr));
            }

            Instruction::BrPlus { addr } => {
                let a = self.regs.a;
                return Ok(branch(!a.is_negative() && !a.is_zero(), addr));
            }

            Instruction::Brz { addr } => return Ok(branch(self.regs.a.is_zero(), addr)),

            // ==================== Input/Output ====================

            Instruction::TypeAlpha(block) => {
                let mut text = String::with_capacity(block.words() * 4);
                let next = self.for_each_word(block, |cpu, addr| {
                    let word = cpu.read(addr, Access::Read)?;
                    charset::type_word(word, &mut text);
                    Ok(true)
                })?;
                devices.type_text(&text)?;
                Effect::Transfer { next }
            }

            Instruction::ReadTape(block) => {
                let mut at_end = false;
                let next = self.for_each_word(block, |cpu, addr| {
                    match devices.read(Slot::TapeReader)? {
                        Some(word) => cpu.write(addr, word)?,
                        None => at_end = true,
                    }
                    Ok(!at_end)
                })?;
                if at_end {
                    Effect::EndOfTape { next }
                } else {
                    Effect::Transfer { next }
                }
            }

            Instruction::TypeIn(block) => {
                let next = self.for_each_word(block, |cpu, addr| {
                    let word = devices
                        .read(Slot::Console)?
                        .ok_or(DeviceError::EndOfInput(Slot::Console))?;
                    cpu.write(addr, word)?;
                    Ok(true)
                })?;
                Effect::Transfer { next }
            }

            Instruction::PunchTape(block) => {
                let next = self.for_each_word(block, |cpu, addr| {
                    let word = cpu.read(addr, Access::Read)?;
                    devices.write(Slot::TapePunch, word)?;
                    Ok(true)
                })?;
                Effect::Transfer { next }
            }
        };

        Ok((effect, None))
    }

    /// Visit the addresses of an I/O block in order, wrapping at the top
    /// of memory. The visitor returns `false` to stop early. Returns the
    /// address after the last word transferred.
    ///
    /// If the same instruction faulted part-way last time, the words it
    /// finished are skipped.
    fn for_each_word<F>(&mut self, block: Block, mut visit: F) -> Result<u16, CpuError>
    where
        F: FnMut(&mut Self, u16) -> Result<bool, CpuError>,
    {
        let pc = self.regs.pc;
        let word = self.last_fetch.unwrap_or_default();
        let skip = match self.partial.take() {
            Some(partial) if partial.pc == pc && partial.word == word => partial.done,
            _ => 0,
        };
        if skip > 0 {
            debug!(pc = pc, words = skip, "continuing a partial I/O block");
        }

        let mut addr = block.addr.wrapping_add(skip as u16) & ADDRESS_MASK;
        for done in skip..block.words() {
            match visit(self, addr) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    self.partial = Some(PartialBlock { pc, word, done });
                    return Err(e);
                }
            }
            addr = next_address(addr);
        }
        Ok(addr)
    }

    /// Fetch a memory operand, applying its sign control and shift.
    fn operand(&mut self, op: Operand) -> Result<Word, CpuError> {
        let word = self.read(op.addr, Access::Read)?;
        Ok(arith::shift(op.sign.apply(word), op.count))
    }

    /// Store a register through an operand's sign control and shift.
    fn store(&mut self, op: Operand, register: Word) -> Result<Effect, CpuError> {
        let value = arith::shift(op.sign.apply(register), op.count);
        self.write(op.addr, value)?;
        Ok(Effect::Stored { addr: op.addr, value })
    }

    fn read(&mut self, addr: u16, kind: Access) -> Result<Word, CpuError> {
        self.accesses.push(MemoryAccess { addr, kind });
        Ok(self.mem.read(usize::from(addr))?)
    }

    fn write(&mut self, addr: u16, value: Word) -> Result<(), CpuError> {
        self.accesses.push(MemoryAccess { addr, kind: Access::Write });
        Ok(self.mem.write(usize::from(addr), value)?)
    }

    /// The word fetched by the most recent cycle.
    pub fn last_fetch(&self) -> Option<Word> {
        self.last_fetch
    }

    /// Memory accesses made by the most recent cycle, in order.
    pub fn accesses(&self) -> &[MemoryAccess] {
        &self.accesses
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is faulted.
    pub fn is_faulted(&self) -> bool {
        self.state == CpuState::Faulted
    }
}

fn branch(taken: bool, addr: u16) -> (Effect, Option<u16>) {
    if taken {
        (Effect::Jumped { to: addr }, Some(addr))
    } else {
        (Effect::NoBranch, None)
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("regs", &self.regs)
            .field("mem", &self.mem)
            .finish()
    }
}

/// A fault raised by an instruction, with where it happened.
#[derive(Debug)]
pub struct ExecFault {
    /// Address of the faulting instruction.
    pub pc: u16,
    /// The instruction word, if it could be fetched.
    pub word: Option<Word>,
    pub error: CpuError,
}

impl std::error::Error for ExecFault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl fmt::Display for ExecFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.word {
            Some(word) => write!(f, "{} at {:04o} ({})", self.error, self.pc, word),
            None => write!(f, "{} at {:04o}", self.error, self.pc),
        }
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Error)]
pub enum CpuError {
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("divide check: zero divisor")]
    DivideCheck,
}

impl CpuError {
    /// Whether the operator interrupted the instruction.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, CpuError::Device(DeviceError::Interrupted))
    }
}
