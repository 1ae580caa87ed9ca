//! Paper tape reader and punch.

use std::io::{Read, Write};

use crate::tape::codec::{TapePunch, TapeReader, LEADER_FRAMES};
use crate::tape::TapeError;
use crate::word::Word;

pub(crate) struct Reader {
    tape: TapeReader<Box<dyn Read>>,
    words_read: usize,
}

impl Reader {
    pub(crate) fn new(source: Box<dyn Read>) -> Self {
        Self { tape: TapeReader::new(source), words_read: 0 }
    }

    pub(crate) fn next_word(&mut self) -> Result<Option<Word>, TapeError> {
        let word = self.tape.next_word()?;
        if word.is_some() {
            self.words_read += 1;
        }
        Ok(word)
    }

    pub(crate) fn words_read(&self) -> usize {
        self.words_read
    }
}

pub(crate) struct Punch {
    tape: TapePunch<Box<dyn Write>>,
}

impl Punch {
    /// Start a tape, running out the leader.
    pub(crate) fn new(sink: Box<dyn Write>) -> std::io::Result<Self> {
        let mut tape = TapePunch::new(sink);
        tape.leader(LEADER_FRAMES)?;
        Ok(Self { tape })
    }

    pub(crate) fn punch(&mut self, word: Word) -> std::io::Result<()> {
        self.tape.punch(word)
    }

    pub(crate) fn flush(&mut self) -> std::io::Result<()> {
        self.tape.flush()
    }

    /// Run out the trailer and flush.
    pub(crate) fn finish(&mut self) -> std::io::Result<usize> {
        self.tape.leader(LEADER_FRAMES)?;
        self.tape.flush()?;
        Ok(self.tape.punched())
    }
}
