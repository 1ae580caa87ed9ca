//! Digiac memory subsystem.
//!
//! The Digiac-3080 had 4096 words of core, addressed by a 12-bit field
//! (0000 to 7777 octal).

use crate::word::Word;
use rand::Rng;
use thiserror::Error;

/// The number of words of memory.
pub const MEMORY_SIZE: usize = 0o10000;

/// Digiac memory: 4096 sign-magnitude words.
#[derive(Clone)]
pub struct Memory {
    cells: Vec<Word>,
}

impl Memory {
    /// Create a new memory with all cells zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![Word::zero(); MEMORY_SIZE],
        }
    }

    /// Create a memory with random contents, as core looked at power-on.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let mut mem = Self::new();
        mem.randomize(rng);
        mem
    }

    /// Read a word.
    #[inline]
    pub fn read(&self, addr: usize) -> Result<Word, MemoryError> {
        self.cells
            .get(addr)
            .copied()
            .ok_or(MemoryError::AddressOutOfRange(addr))
    }

    /// Write a word.
    #[inline]
    pub fn write(&mut self, addr: usize, value: Word) -> Result<(), MemoryError> {
        let cell = self
            .cells
            .get_mut(addr)
            .ok_or(MemoryError::AddressOutOfRange(addr))?;
        *cell = value;
        Ok(())
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.cells.fill(Word::zero());
    }

    /// Fill every cell with a random sign and magnitude.
    pub fn randomize<R: Rng>(&mut self, rng: &mut R) {
        for cell in &mut self.cells {
            *cell = Word::new(rng.gen(), rng.gen_range(0..=Word::MAX_MAGNITUDE));
        }
    }

    /// Copy a sequence of words into memory starting at `start_addr`.
    ///
    /// Nothing is written if the sequence would run past the end of memory.
    pub fn load(&mut self, start_addr: usize, words: &[Word]) -> Result<(), MemoryError> {
        if start_addr >= MEMORY_SIZE {
            return Err(MemoryError::AddressOutOfRange(start_addr));
        }
        let available = MEMORY_SIZE - start_addr;
        if words.len() > available {
            return Err(MemoryError::ImageTooLarge {
                start: start_addr,
                size: words.len(),
                available,
            });
        }

        self.cells[start_addr..start_addr + words.len()].copy_from_slice(words);
        Ok(())
    }

    /// Copy `count` words starting at `start_addr` out of memory.
    pub fn dump(&self, start_addr: usize, count: usize) -> Result<Vec<Word>, MemoryError> {
        let end = start_addr
            .checked_add(count)
            .filter(|&end| end <= MEMORY_SIZE)
            .ok_or(MemoryError::AddressOutOfRange(
                start_addr.saturating_add(count).saturating_sub(1),
            ))?;
        Ok(self.cells[start_addr..end].to_vec())
    }

    /// All cells, in address order.
    pub fn cells(&self) -> &[Word] {
        &self.cells
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only count non-zero cells
        let non_zero = self.cells.iter().filter(|cell| !cell.is_zero()).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Address is outside valid memory range.
    #[error("memory address {0:o} out of range (0000-7777)")]
    AddressOutOfRange(usize),

    /// A tape image does not fit in memory.
    #[error("{size} words at {start:04o} exceed the {available} words available")]
    ImageTooLarge { start: usize, size: usize, available: usize },
}
