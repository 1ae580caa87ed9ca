//! Execution tracing.

use std::cell::RefCell;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

use crate::asm::format_instruction;
use crate::cpu::{Effect, Executed, Instruction, Registers};
use crate::word::Word;
use tracing::{info, warn};

/// One executed instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    /// Instruction count after this instruction.
    pub count: u64,
    pub pc: u16,
    pub word: Word,
    pub instruction: Instruction,
    /// Registers after execution.
    pub registers: Registers,
    pub effect: Effect,
}

impl TraceRecord {
    pub fn new(executed: &Executed, registers: &Registers) -> Self {
        Self {
            count: registers.instruction_count,
            pc: executed.pc,
            word: executed.word,
            instruction: executed.instruction,
            registers: registers.clone(),
            effect: executed.effect,
        }
    }
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>5}  {:04o}: {:08o} .. {}",
            self.count,
            self.pc,
            self.word.magnitude(),
            self.effect
        )
    }
}

/// Receives trace records while tracing is enabled.
pub trait TraceSink {
    fn record(&mut self, record: &TraceRecord);
}

/// Sends records to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl TraceSink for LogSink {
    fn record(&mut self, record: &TraceRecord) {
        info!(
            target: "digiac::trace",
            count = record.count,
            pc = %format!("{:04o}", record.pc),
            word = %record.word,
            instruction = %format_instruction(&record.instruction),
            a = %record.registers.a,
            b = %record.registers.b,
            "{}",
            record.effect
        );
    }
}

/// Writes one line per record.
pub struct WriterSink<W: Write> {
    out: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> TraceSink for WriterSink<W> {
    fn record(&mut self, record: &TraceRecord) {
        if let Err(e) = writeln!(self.out, "{}", record) {
            warn!(error = %e, "failed to write trace record");
        }
    }
}

/// Keeps records in memory; clones share the same list.
#[derive(Debug, Default, Clone)]
pub struct TraceBuffer(Rc<RefCell<Vec<TraceRecord>>>);

impl TraceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TraceRecord> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

impl TraceSink for TraceBuffer {
    fn record(&mut self, record: &TraceRecord) {
        self.0.borrow_mut().push(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::Operand;

    fn sample() -> TraceRecord {
        let mut registers = Registers::new();
        registers.a = Word::from_i64(5);
        registers.instruction_count = 2;
        TraceRecord {
            count: 2,
            pc: 0o10,
            word: Word::parse_octal("10000020").unwrap(),
            instruction: Instruction::Cla(Operand::new(0o20)),
            registers,
            effect: Effect::Accumulator(Word::from_i64(5)),
        }
    }

    #[test]
    fn test_record_display() {
        assert_eq!(
            sample().to_string(),
            "    2  0010: 10000020 .. A      <- +00000005"
        );
    }

    #[test]
    fn test_writer_sink() {
        let mut sink = WriterSink::new(Vec::new());
        sink.record(&sample());
        sink.record(&sample());
        let text = String::from_utf8(sink.out).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_buffer_shared() {
        let buffer = TraceBuffer::new();
        let mut sink: Box<dyn TraceSink> = Box::new(buffer.clone());
        sink.record(&sample());
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.records()[0].pc, 0o10);
    }
}
