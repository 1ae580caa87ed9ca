//! The `.ptp` paper tape format.
//!
//! Each byte of a tape file is one frame:
//!
//! - `0x00` is blank tape (leader, trailer, or a gap) and is skipped
//! - `0x01..=0x3F` carry a six-bit value
//! - `0x40` is a punched zero, so that zero is distinguishable from blank
//! - anything above `0x40` is not a valid frame
//!
//! A word occupies five non-blank frames: a sign frame (`0x40` for plus,
//! any other value for minus) followed by four six-bit digits, most
//! significant first.

use std::io::{self, Read, Write};

use crate::word::Word;
use thiserror::Error;

/// Blank tape.
pub const BLANK_FRAME: u8 = 0x00;

/// A punched zero; also the plus sign.
pub const ZERO_FRAME: u8 = 0x40;

/// The minus sign frame written by the punch (the typewriter '-' code).
pub const MINUS_FRAME: u8 = 0o12;

/// Frames per word.
pub const FRAMES_PER_WORD: usize = 5;

/// Blank frames punched before and after a dumped image.
pub const LEADER_FRAMES: usize = 16;

/// The six-bit value of a frame, or `None` for blank tape.
pub fn frame_value(frame: u8, offset: usize) -> Result<Option<u8>, TapeError> {
    match frame {
        BLANK_FRAME => Ok(None),
        ZERO_FRAME => Ok(Some(0)),
        f if f < ZERO_FRAME => Ok(Some(f)),
        f => Err(TapeError::InvalidFrame { offset, frame: f }),
    }
}

/// The five frames that record `word`.
pub fn word_frames(word: Word) -> [u8; FRAMES_PER_WORD] {
    let digit = |code: u8| if code == 0 { ZERO_FRAME } else { code };
    let sign = if word.is_negative() { MINUS_FRAME } else { ZERO_FRAME };
    let [c0, c1, c2, c3] = word.char_codes();
    [sign, digit(c0), digit(c1), digit(c2), digit(c3)]
}

/// Reads words from a stream of frames.
///
/// Blank frames are skipped wherever they occur, including between the
/// frames of a word.
pub struct TapeReader<R> {
    frames: io::Bytes<R>,
    offset: usize,
}

impl<R: Read> TapeReader<R> {
    pub fn new(inner: R) -> Self {
        Self { frames: inner.bytes(), offset: 0 }
    }

    /// Byte offset of the next frame.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Read the next word, or `None` at the end of the tape.
    ///
    /// Running out of tape part-way through a word is an error.
    pub fn next_word(&mut self) -> Result<Option<Word>, TapeError> {
        let mut negative = false;
        let mut magnitude = 0u32;
        let mut seen = 0;

        while seen < FRAMES_PER_WORD {
            let Some(frame) = self.frames.next() else {
                if seen == 0 {
                    return Ok(None);
                }
                return Err(TapeError::Truncated { offset: self.offset });
            };
            let frame = frame?;
            let offset = self.offset;
            self.offset += 1;

            let Some(value) = frame_value(frame, offset)? else {
                continue;
            };
            if seen == 0 {
                negative = frame != ZERO_FRAME;
            } else {
                magnitude = (magnitude << 6) | u32::from(value);
            }
            seen += 1;
        }

        Ok(Some(Word::new(negative, magnitude)))
    }
}

impl<R: Read> Iterator for TapeReader<R> {
    type Item = Result<Word, TapeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_word().transpose()
    }
}

/// Punches words as frames.
pub struct TapePunch<W: Write> {
    inner: W,
    punched: usize,
}

impl<W: Write> TapePunch<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, punched: 0 }
    }

    /// Run out `frames` of blank tape.
    pub fn leader(&mut self, frames: usize) -> io::Result<()> {
        self.inner.write_all(&vec![BLANK_FRAME; frames])
    }

    pub fn punch(&mut self, word: Word) -> io::Result<()> {
        self.inner.write_all(&word_frames(word))?;
        self.punched += 1;
        Ok(())
    }

    /// Words punched so far.
    pub fn punched(&self) -> usize {
        self.punched
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Parse a whole tape into its words.
pub fn load(bytes: &[u8]) -> Result<Vec<Word>, TapeError> {
    TapeReader::new(bytes).collect()
}

/// Punch `words` between blank leader and trailer.
pub fn dump(words: &[Word]) -> Vec<u8> {
    let mut punch = TapePunch::new(Vec::with_capacity(
        words.len() * FRAMES_PER_WORD + 2 * LEADER_FRAMES,
    ));
    // Writes into a Vec cannot fail.
    let _ = punch.leader(LEADER_FRAMES);
    for &word in words {
        let _ = punch.punch(word);
    }
    let _ = punch.leader(LEADER_FRAMES);
    punch.into_inner()
}

/// Errors that can occur while reading tape.
#[derive(Debug, Error)]
pub enum TapeError {
    #[error("unexpected tape frame 0x{frame:02X} at offset {offset}")]
    InvalidFrame { offset: usize, frame: u8 },

    #[error("tape ends part-way through a word at offset {offset}")]
    Truncated { offset: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn words(raw: &[&str]) -> Vec<Word> {
        raw.iter().map(|s| Word::parse_octal(s).unwrap()).collect()
    }

    #[test]
    fn test_word_frames() {
        let w = Word::parse_octal("30253400").unwrap();
        assert_eq!(word_frames(w), [0x40, 0o30, 0o25, 0o34, 0x40]);

        let neg = Word::parse_octal("-00000001").unwrap();
        assert_eq!(word_frames(neg), [MINUS_FRAME, 0x40, 0x40, 0x40, 1]);
    }

    #[test]
    fn test_load_skips_blank_frames() {
        let tape = [0, 0, 0x40, 0o30, 0, 0o25, 0o34, 0o34, 0, 0];
        assert_eq!(load(&tape).unwrap(), words(&["30253434"]));
    }

    #[test]
    fn test_any_non_plus_sign_is_minus() {
        let tape = [0x3F, 0x40, 0x40, 0x40, 0x05];
        assert_eq!(load(&tape).unwrap(), words(&["-00000005"]));
    }

    #[test]
    fn test_invalid_frame() {
        let tape = [0, 0x40, 0x41, 1, 1, 1];
        let err = load(&tape).unwrap_err();
        assert!(matches!(err, TapeError::InvalidFrame { offset: 2, frame: 0x41 }));
    }

    #[test]
    fn test_truncated() {
        let tape = [0x40, 1, 2, 0];
        let err = load(&tape).unwrap_err();
        assert!(matches!(err, TapeError::Truncated { offset: 4 }));
    }

    #[test]
    fn test_empty_tape() {
        assert!(load(&[]).unwrap().is_empty());
        assert!(load(&[0; 40]).unwrap().is_empty());
    }

    #[test]
    fn test_dump_layout() {
        let image = words(&["54750002", "0"]);
        let tape = dump(&image);
        assert_eq!(tape.len(), 2 * LEADER_FRAMES + 2 * FRAMES_PER_WORD);
        assert!(tape[..LEADER_FRAMES].iter().all(|&f| f == BLANK_FRAME));
        assert_eq!(&tape[LEADER_FRAMES..LEADER_FRAMES + 5], &[0x40, 0o54, 0o75, 0x40, 0o02]);
        assert!(tape[tape.len() - LEADER_FRAMES..].iter().all(|&f| f == BLANK_FRAME));
    }

    #[test]
    fn test_reader_reports_end() {
        let tape = dump(&words(&["1", "2"]));
        let mut reader = TapeReader::new(tape.as_slice());
        assert_eq!(reader.next_word().unwrap(), Some(Word::positive(1)));
        assert_eq!(reader.next_word().unwrap(), Some(Word::positive(2)));
        assert_eq!(reader.next_word().unwrap(), None);
        assert_eq!(reader.offset(), tape.len());
    }

    #[test]
    fn test_dump_of_load_is_canonical() {
        let tape = dump(&words(&["-12345670", "77777777"]));
        assert_eq!(dump(&load(&tape).unwrap()), tape);
    }

    proptest! {
        #[test]
        fn load_inverts_dump(raw in prop::collection::vec((any::<bool>(), 0u32..=Word::MAX_MAGNITUDE), 0..200)) {
            let image: Vec<Word> = raw.into_iter().map(|(neg, mag)| Word::new(neg, mag)).collect();
            prop_assert_eq!(load(&dump(&image)).unwrap(), image);
        }

        #[test]
        fn arbitrary_bytes_never_panic(tape in prop::collection::vec(any::<u8>(), 0..256)) {
            let _ = load(&tape);
        }
    }
}
