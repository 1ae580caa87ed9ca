//! Tape listings.
//!
//! A tape is a series of blocks separated by runs of blank frames. The
//! listing shows each block as a table of words with their octal value
//! and the four characters they would type.

use std::fmt::Write as _;

use crate::tape::codec::{frame_value, TapeError, BLANK_FRAME, FRAMES_PER_WORD, ZERO_FRAME};
use crate::word::{charset, Word};

/// A run of words between blank gaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapeBlock {
    /// Blank frames before the block.
    pub leader: usize,
    pub words: Vec<Word>,
}

/// A tape split into its blocks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TapeImage {
    pub blocks: Vec<TapeBlock>,
    /// Blank frames after the last block.
    pub trailer: usize,
    /// Total frames on the tape.
    pub length: usize,
}

impl TapeImage {
    /// Split a tape into blocks.
    ///
    /// Unlike [`crate::tape::codec::load`], a block may only end on a word
    /// boundary: a blank frame inside a word is reported as truncation.
    pub fn parse(bytes: &[u8]) -> Result<Self, TapeError> {
        let mut image = TapeImage { length: bytes.len(), ..Default::default() };
        let mut pos = 0;

        loop {
            let start = pos;
            while pos < bytes.len() && bytes[pos] == BLANK_FRAME {
                pos += 1;
            }
            let gap = pos - start;
            if pos == bytes.len() {
                image.trailer = gap;
                return Ok(image);
            }

            let mut words = Vec::new();
            while pos < bytes.len() && bytes[pos] != BLANK_FRAME {
                let mut digits = [0u8; FRAMES_PER_WORD];
                for (i, digit) in digits.iter_mut().enumerate() {
                    let offset = pos + i;
                    let frame = *bytes.get(offset).ok_or(TapeError::Truncated { offset })?;
                    *digit = frame_value(frame, offset)?.ok_or(TapeError::Truncated { offset })?;
                }
                let negative = bytes[pos] != ZERO_FRAME;
                let codes = [digits[1], digits[2], digits[3], digits[4]];
                words.push(Word::new(negative, Word::from_char_codes(codes).magnitude()));
                pos += FRAMES_PER_WORD;
            }

            image.blocks.push(TapeBlock { leader: gap, words });
        }
    }

    /// Every word on the tape, in order.
    pub fn words(&self) -> impl Iterator<Item = Word> + '_ {
        self.blocks.iter().flat_map(|b| b.words.iter().copied())
    }
}

/// Render a tape listing. Addresses restart at zero for each block.
pub fn listing(name: &str, bytes: &[u8]) -> Result<String, TapeError> {
    let image = TapeImage::parse(bytes)?;
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "File: {} raw data length: {}", name, image.length);
    for block in &image.blocks {
        let _ = writeln!(out, "removed {} leading zero bytes", block.leader);
        let _ = writeln!(out, "  Addr    Octal     Char");
        let _ = writeln!(out, "  ====  =========   ====");
        for (addr, word) in block.words.iter().enumerate() {
            let _ = writeln!(
                out,
                ". {:04o}  {}   {}",
                addr,
                word,
                charset::word_chars(*word)
            );
        }
    }
    let _ = writeln!(out, "removed final {} zero bytes", image.trailer);

    Ok(out)
}
