//! Sign-magnitude arithmetic.
//!
//! All results keep only the low 24 bits of the magnitude. The sign is taken
//! from the exact result, so an overflowing add still has the right sign.
//! Operations that can lose bits report it alongside the result.

use crate::word::Word;

/// Sign handling selected by the low two opcode bits of the
/// load/arithmetic/store group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignControl {
    /// Use the sign as stored.
    AsIs,
    /// Invert the sign (CLS, SUB).
    Negate,
    /// Force positive.
    Magnitude,
    /// Force negative.
    NegativeMagnitude,
}

impl SignControl {
    /// Decode from the low two bits of an opcode.
    pub fn from_opcode(opcode: u8) -> Self {
        match opcode & 0b11 {
            0 => SignControl::AsIs,
            1 => SignControl::Negate,
            2 => SignControl::Magnitude,
            _ => SignControl::NegativeMagnitude,
        }
    }

    /// The low two opcode bits for this control.
    pub fn bits(self) -> u8 {
        match self {
            SignControl::AsIs => 0,
            SignControl::Negate => 1,
            SignControl::Magnitude => 2,
            SignControl::NegativeMagnitude => 3,
        }
    }

    /// Apply to a word, leaving the magnitude alone.
    pub fn apply(self, word: Word) -> Word {
        match self {
            SignControl::AsIs => word,
            SignControl::Negate => -word,
            SignControl::Magnitude => word.with_sign(false),
            SignControl::NegativeMagnitude => word.with_sign(true),
        }
    }
}

/// Shift a magnitude by an instruction count field.
///
/// Counts below 0o40 shift left by the count. Counts of 0o40 and above
/// shift right by `0o100 - count`, i.e. they are negative six-bit shift
/// amounts.
pub fn shift_magnitude(magnitude: u32, count: u8) -> u32 {
    let count = u32::from(count & 0o77);
    let wide = u64::from(magnitude);
    let shifted = if count & 0o40 != 0 {
        wide >> (0o100 - count)
    } else {
        wide << count
    };
    (shifted & u64::from(Word::MAGNITUDE_MASK)) as u32
}

/// Shift a word's magnitude, keeping its sign.
pub fn shift(word: Word, count: u8) -> Word {
    word.with_magnitude(shift_magnitude(word.magnitude(), count))
}

/// Add two words, returning (result, overflow).
///
/// A zero result is positive.
pub fn add(a: Word, b: Word) -> (Word, bool) {
    let sum = a.to_i64() + b.to_i64();
    let overflow = sum.unsigned_abs() > u64::from(Word::MAX_MAGNITUDE);
    (Word::from_i64(sum), overflow)
}

/// Subtract two words (a - b), returning (result, overflow).
#[inline]
pub fn subtract(a: Word, b: Word) -> (Word, bool) {
    add(a, -b)
}

/// Multiply two words into a 48-bit product, returned as (high, low).
///
/// Both halves carry the sign of the product.
pub fn multiply(a: Word, b: Word) -> (Word, Word) {
    let negative = a.is_negative() != b.is_negative();
    let product = u64::from(a.magnitude()) * u64::from(b.magnitude());
    let high = (product >> Word::MAGNITUDE_BITS) as u32;
    let low = (product & u64::from(Word::MAGNITUDE_MASK)) as u32;
    (Word::new(negative, high), Word::new(negative, low))
}

/// Fractional divide: `(a << 24) / b`, returned as (remainder, quotient).
///
/// Returns `None` when the divisor is zero. Quotient bits beyond 24 are
/// lost, which happens whenever `|a| >= |b|`.
pub fn divide(a: Word, b: Word) -> Option<(Word, Word)> {
    if b.is_zero() {
        return None;
    }
    let negative = a.is_negative() != b.is_negative();
    let dividend = u64::from(a.magnitude()) << Word::MAGNITUDE_BITS;
    let divisor = u64::from(b.magnitude());
    let quotient = (dividend / divisor) as u32;
    let remainder = (dividend % divisor) as u32;
    Some((Word::new(negative, remainder), Word::new(negative, quotient)))
}

/// Logical AND of magnitudes.
///
/// The result takes the accumulator's sign when the operand is negative,
/// and is positive otherwise.
pub fn and(acc: Word, operand: Word) -> Word {
    let negative = operand.is_negative() && acc.is_negative();
    Word::new(negative, acc.magnitude() & operand.magnitude())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(v: i64) -> Word {
        Word::from_i64(v)
    }

    #[test]
    fn test_add_basic() {
        assert_eq!(add(w(10), w(5)), (w(15), false));
        assert_eq!(add(w(10), w(-15)), (w(-5), false));
        assert_eq!(add(w(-3), w(3)).0, Word::zero());
    }

    #[test]
    fn test_add_wraps() {
        let (result, overflow) = add(w(0o77777777), w(2));
        assert!(overflow);
        assert!(!result.is_negative());
        assert_eq!(result.magnitude(), 1);

        let (result, overflow) = add(w(-0o77777777), w(-1));
        assert!(overflow);
        assert!(result.is_negative());
        assert_eq!(result.magnitude(), 0);
    }

    #[test]
    fn test_subtract() {
        assert_eq!(subtract(w(10), w(4)).0, w(6));
        assert_eq!(subtract(w(4), w(10)).0, w(-6));
    }

    #[test]
    fn test_multiply() {
        let (high, low) = multiply(w(123), w(456));
        assert_eq!(high, Word::zero());
        assert_eq!(low, w(56088));

        let (high, low) = multiply(w(1 << 20), w(-(1 << 20)));
        assert_eq!(high, Word::new(true, 1 << 16));
        assert_eq!(low, Word::new(true, 0));
    }

    #[test]
    fn test_divide() {
        // 1/2 as a 24-bit binary fraction.
        let (rem, quot) = divide(w(1), w(2)).unwrap();
        assert_eq!(quot, Word::positive(1 << 23));
        assert_eq!(rem, Word::zero());

        let (rem, quot) = divide(w(-1), w(3)).unwrap();
        assert!(quot.is_negative());
        assert_eq!(quot.magnitude(), 0o25252525);
        assert_eq!(rem.magnitude(), 1);

        assert_eq!(divide(w(5), Word::new(true, 0)), None);
    }

    #[test]
    fn test_and() {
        assert_eq!(and(w(0o7070), w(0o0770)), w(0o0070));
        assert_eq!(and(w(-0o17), w(-0o3)), w(-0o3));
        assert_eq!(and(w(-0o17), w(0o3)), w(0o3));
        assert_eq!(and(w(0o17), w(-0o3)), w(0o3));
    }

    #[test]
    fn test_shift_left() {
        assert_eq!(shift_magnitude(1, 3), 0o10);
        assert_eq!(shift_magnitude(0o77777777, 6), 0o77777700);
        assert_eq!(shift_magnitude(5, 0), 5);
    }

    #[test]
    fn test_shift_right() {
        // 0o77 is a right shift by one.
        assert_eq!(shift_magnitude(0o10, 0o77), 0o4);
        // 0o40 is a right shift by 32, which clears a 24-bit magnitude.
        assert_eq!(shift_magnitude(0o77777777, 0o40), 0);
        assert_eq!(shift(w(-0o100), 0o72).to_i64(), -0o1);
    }

    #[test]
    fn test_sign_control() {
        let neg = w(-7);
        let pos = w(7);
        assert_eq!(SignControl::AsIs.apply(neg), neg);
        assert_eq!(SignControl::Negate.apply(neg), pos);
        assert_eq!(SignControl::Magnitude.apply(neg), pos);
        assert_eq!(SignControl::NegativeMagnitude.apply(pos), neg);

        for op in 0o10..0o14u8 {
            assert_eq!(SignControl::from_opcode(op).bits(), op & 3);
        }
    }
}
