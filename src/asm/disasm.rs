//! Disassembler for Digiac programs.
//!
//! Renders instruction words in the mnemonic form used by the trace and
//! by tape listings.
//!
//! Operand notation:
//! - sign control is a suffix on the mnemonic: `-` negate, `M` magnitude,
//!   `-M` negative magnitude (negated CLA and ADD are written CLS and SUB)
//! - a shift follows the address as `<<n` or `>>n`
//! - I/O blocks show their word count as `xN`

use crate::cpu::decode::{decode, Block, Instruction, Operand};
use crate::word::arith::SignControl;
use crate::word::{charset, Word};

/// Disassemble a single instruction word to text.
pub fn disassemble_instruction(word: Word) -> String {
    match decode(word) {
        Ok(decoded) => format_instruction(&decoded),
        Err(_) => "???".to_string(),
    }
}

/// Disassemble a run of words loaded at `start`.
///
/// Each line shows the address, the word, its mnemonic and its text.
pub fn disassemble(words: &[Word], start: u16) -> String {
    let mut output = String::new();

    for (offset, word) in words.iter().enumerate() {
        let addr = (usize::from(start) + offset) % crate::cpu::MEMORY_SIZE;
        output.push_str(&format!(
            "{:04o}: {}  {:<16} {}\n",
            addr,
            word,
            disassemble_instruction(*word),
            charset::word_chars(*word)
        ));
    }

    output
}

/// Format a decoded instruction as assembly text.
pub fn format_instruction(instr: &Instruction) -> String {
    match instr {
        Instruction::Hlt => "HLT".to_string(),

        // Arithmetic
        Instruction::And(op) => format_operand("AND", None, op),
        Instruction::Cla(op) => format_operand("CLA", Some("CLS"), op),
        Instruction::Add(op) => format_operand("ADD", Some("SUB"), op),
        Instruction::Mlt(op) => format_operand("MLT", None, op),
        Instruction::Div(op) => format_operand("DIV", None, op),

        // Store
        Instruction::Sta(op) => format_operand("STA", None, op),
        Instruction::Stb(op) => format_operand("STB", None, op),

        // Control
        Instruction::Jmp { addr } => format!("JMP  {:04o}", addr),
        Instruction::BrMinus { addr } => format!("BR-  {:04o}", addr),
        Instruction::BrPlus { addr } => format!("BR+  {:04o}", addr),
        Instruction::Brz { addr } => format!("BRZ  {:04o}", addr),

        // I/O
        Instruction::TypeAlpha(block) => format_block("TA", block),
        Instruction::ReadTape(block) => format_block("RT", block),
        Instruction::TypeIn(block) => format_block("TI", block),
        Instruction::PunchTape(block) => format_block("PT", block),
    }
}

/// Mnemonic with sign suffix, address and shift.
fn format_operand(base: &str, negated: Option<&str>, op: &Operand) -> String {
    let mnemonic = match (op.sign, negated) {
        (SignControl::AsIs, _) => base.to_string(),
        (SignControl::Negate, Some(alias)) => alias.to_string(),
        (SignControl::Negate, None) => format!("{}-", base),
        (SignControl::Magnitude, _) => format!("{}M", base),
        (SignControl::NegativeMagnitude, _) => format!("{}-M", base),
    };

    let mut text = format!("{:<4} {:04o}", mnemonic, op.addr);
    match op.count {
        0 => {}
        n if n < 0o40 => text.push_str(&format!(" <<{}", n)),
        n => text.push_str(&format!(" >>{}", 0o100 - n)),
    }
    text
}

fn format_block(mnemonic: &str, block: &Block) -> String {
    format!("{:<4} {:04o} x{}", mnemonic, block.addr, block.words())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::encode;

    fn w(s: &str) -> Word {
        Word::parse_octal(s).unwrap()
    }

    #[test]
    fn test_disassemble_hlt() {
        let hlt = encode(&Instruction::Hlt);
        assert_eq!(disassemble_instruction(hlt), "HLT");
    }

    #[test]
    fn test_disassemble_aliases() {
        assert_eq!(disassemble_instruction(w("10000010")), "CLA  0010");
        assert_eq!(disassemble_instruction(w("11000010")), "CLS  0010");
        assert_eq!(disassemble_instruction(w("15000011")), "SUB  0011");
        assert_eq!(disassemble_instruction(w("05000011")), "AND- 0011");
        assert_eq!(disassemble_instruction(w("32000012")), "STAM 0012");
        assert_eq!(disassemble_instruction(w("37000012")), "STB-M 0012");
    }

    #[test]
    fn test_disassemble_shift() {
        assert_eq!(disassemble_instruction(w("10030010")), "CLA  0010 <<3");
        assert_eq!(disassemble_instruction(w("30770011")), "STA  0011 >>1");
    }

    #[test]
    fn test_disassemble_io_and_branches() {
        assert_eq!(disassemble_instruction(w("54750002")), "TA   0002 x3");
        assert_eq!(disassemble_instruction(w("60000100")), "RT   0100 x64");
        assert_eq!(disassemble_instruction(w("45000003")), "BR-  0003");
        assert_eq!(disassemble_instruction(w("50000000")), "???");
    }

    #[test]
    fn test_disassemble_listing() {
        let listing = disassemble(&[w("54750002"), w("0"), w("30253434")], 0);
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("0000: +54750002  TA   0002 x3"));
        assert!(lines[2].starts_with("0002: +30253434"));
        assert!(lines[2].ends_with("HELL"));
    }
}
