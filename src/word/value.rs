//! The Digiac-3080 word.
//!
//! A word is a sign bit and a 24-bit magnitude. Operators read and wrote
//! words as a sign followed by eight octal digits, so that is how they are
//! displayed and parsed here.
//!
//! When a word is executed as an instruction the magnitude splits into
//! three fields (the sign is ignored):
//!
//! ```text
//!   bits 23..18   opcode   (2 octal digits)
//!   bits 17..12   count    (2 octal digits)
//!   bits 11..0    address  (4 octal digits)
//! ```

use std::fmt;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// A sign-magnitude word.
///
/// Stored as `sign << 24 | magnitude`, the same layout the machine's
/// memory dumps use. Negative zero is representable and distinct from
/// positive zero as a bit pattern.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32")]
pub struct Word(u32);

impl Word {
    /// Number of magnitude bits.
    pub const MAGNITUDE_BITS: u32 = 24;

    /// Mask selecting the magnitude.
    pub const MAGNITUDE_MASK: u32 = 0x00FF_FFFF;

    /// The sign bit (set = negative).
    pub const SIGN_BIT: u32 = 1 << 24;

    /// Largest magnitude: 0o77777777.
    pub const MAX_MAGNITUDE: u32 = Self::MAGNITUDE_MASK;

    /// Positive zero.
    #[inline]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Build a word from a sign and a magnitude.
    ///
    /// Magnitude bits above the 24th are discarded; this is the machine's
    /// overflow policy (wrap modulo 2^24).
    #[inline]
    pub const fn new(negative: bool, magnitude: u32) -> Self {
        let sign = if negative { Self::SIGN_BIT } else { 0 };
        Self(sign | (magnitude & Self::MAGNITUDE_MASK))
    }

    /// Positive word with the given magnitude.
    #[inline]
    pub const fn positive(magnitude: u32) -> Self {
        Self::new(false, magnitude)
    }

    /// Reconstruct a word from its raw `sign << 24 | magnitude` layout.
    /// Bits above the sign bit are ignored.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw & (Self::SIGN_BIT | Self::MAGNITUDE_MASK))
    }

    /// The raw `sign << 24 | magnitude` layout.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Build an instruction word from its fields.
    ///
    /// Each field is truncated to its width.
    pub const fn from_fields(opcode: u8, count: u8, address: u16) -> Self {
        let magnitude = ((opcode as u32 & 0o77) << 18)
            | ((count as u32 & 0o77) << 12)
            | (address as u32 & 0o7777);
        Self(magnitude)
    }

    /// Create from a signed integer, wrapping the magnitude.
    pub fn from_i64(value: i64) -> Self {
        let magnitude = (value.unsigned_abs() & Self::MAGNITUDE_MASK as u64) as u32;
        Self::new(value < 0, magnitude)
    }

    /// Convert to a signed integer. Negative zero becomes 0.
    pub fn to_i64(self) -> i64 {
        let magnitude = i64::from(self.magnitude());
        if self.is_negative() { -magnitude } else { magnitude }
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 & Self::SIGN_BIT != 0
    }

    #[inline]
    pub const fn magnitude(self) -> u32 {
        self.0 & Self::MAGNITUDE_MASK
    }

    /// True for both positive and negative zero.
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.magnitude() == 0
    }

    /// Same magnitude, given sign.
    #[inline]
    pub const fn with_sign(self, negative: bool) -> Self {
        Self::new(negative, self.magnitude())
    }

    /// Same sign, given magnitude (wrapped).
    #[inline]
    pub const fn with_magnitude(self, magnitude: u32) -> Self {
        Self::new(self.is_negative(), magnitude)
    }

    /// Opcode field (bits 23..18).
    #[inline]
    pub const fn opcode(self) -> u8 {
        ((self.0 >> 18) & 0o77) as u8
    }

    /// Count field (bits 17..12).
    #[inline]
    pub const fn count(self) -> u8 {
        ((self.0 >> 12) & 0o77) as u8
    }

    /// Address field (bits 11..0).
    #[inline]
    pub const fn address(self) -> u16 {
        (self.0 & 0o7777) as u16
    }

    /// The four 6-bit character codes of the magnitude, most significant first.
    pub fn char_codes(self) -> [u8; 4] {
        let m = self.magnitude();
        [
            ((m >> 18) & 0o77) as u8,
            ((m >> 12) & 0o77) as u8,
            ((m >> 6) & 0o77) as u8,
            (m & 0o77) as u8,
        ]
    }

    /// Pack four 6-bit character codes into a positive word.
    pub fn from_char_codes(codes: [u8; 4]) -> Self {
        let magnitude = codes
            .iter()
            .fold(0u32, |acc, &c| (acc << 6) | u32::from(c & 0o77));
        Self::positive(magnitude)
    }

    /// Parse an operator-entered octal value such as `30253434` or `-12`.
    ///
    /// A leading `+` or `-` selects the sign; the digits must fit in
    /// 24 bits.
    pub fn parse_octal(s: &str) -> Result<Self, ParseError> {
        let s = s.trim();
        let (negative, digits) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };

        if digits.is_empty() {
            return Err(ParseError::Empty);
        }
        if let Some(c) = digits.chars().find(|c| !matches!(c, '0'..='7')) {
            return Err(ParseError::InvalidDigit(c));
        }

        let magnitude = u32::from_str_radix(digits, 8)
            .map_err(|_| ParseError::OutOfRange(s.to_string()))?;
        if magnitude > Self::MAX_MAGNITUDE {
            return Err(ParseError::OutOfRange(s.to_string()));
        }

        Ok(Self::new(negative, magnitude))
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word({})", self)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { '-' } else { '+' };
        write!(f, "{}{:08o}", sign, self.magnitude())
    }
}

impl fmt::Octal for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Octal::fmt(&self.magnitude(), f)
    }
}

impl std::ops::Neg for Word {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self.with_sign(!self.is_negative())
    }
}

impl std::str::FromStr for Word {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_octal(s)
    }
}

impl TryFrom<u32> for Word {
    type Error = ParseError;

    /// Accepts only the raw layout; unlike [`Word::from_raw`], stray high
    /// bits are an error.
    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        if raw & !(Self::SIGN_BIT | Self::MAGNITUDE_MASK) != 0 {
            return Err(ParseError::RawOutOfRange(raw));
        }
        Ok(Self(raw))
    }
}

/// Errors that can occur when parsing octal words.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty value")]
    Empty,

    #[error("invalid octal digit '{0}'")]
    InvalidDigit(char),

    #[error("value {0} does not fit in 24 bits")]
    OutOfRange(String),

    #[error("raw word {0:#o} has bits above the sign bit")]
    RawOutOfRange(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_checks_width() {
        let word: Word = serde_json::from_str("16777221").unwrap();
        assert_eq!(word, Word::new(true, 5));
        assert_eq!(serde_json::to_string(&word).unwrap(), "16777221");

        assert!(serde_json::from_str::<Word>("33554432").is_err());
        assert_eq!(Word::try_from(1 << 25), Err(ParseError::RawOutOfRange(1 << 25)));
    }

    #[test]
    fn test_word_zero() {
        let zero = Word::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_negative());
        assert_eq!(format!("{}", zero), "+00000000");
    }

    #[test]
    fn test_negative_zero() {
        let neg_zero = Word::new(true, 0);
        assert!(neg_zero.is_zero());
        assert!(neg_zero.is_negative());
        assert_ne!(neg_zero, Word::zero());
        assert_eq!(neg_zero.to_i64(), 0);
        assert_eq!(format!("{}", neg_zero), "-00000000");
    }

    #[test]
    fn test_magnitude_wraps() {
        let w = Word::new(false, 0o1_0000_0005);
        assert_eq!(w.magnitude(), 5);

        let w = Word::from_i64(-(1 << 24) - 3);
        assert!(w.is_negative());
        assert_eq!(w.magnitude(), 3);
    }

    #[test]
    fn test_i64_conversion() {
        assert_eq!(Word::from_i64(42).to_i64(), 42);
        assert_eq!(Word::from_i64(-42).to_i64(), -42);
        assert_eq!(Word::from_i64(0o77777777).to_i64(), 0o77777777);
    }

    #[test]
    fn test_fields() {
        let w = Word::parse_octal("54750002").unwrap();
        assert_eq!(w.opcode(), 0o54);
        assert_eq!(w.count(), 0o75);
        assert_eq!(w.address(), 0o0002);
        assert_eq!(Word::from_fields(0o54, 0o75, 0o0002), w);
    }

    #[test]
    fn test_sign_ignored_by_fields() {
        let w = Word::parse_octal("-44000017").unwrap();
        assert_eq!(w.opcode(), 0o44);
        assert_eq!(w.address(), 0o17);
    }

    #[test]
    fn test_char_codes() {
        let w = Word::parse_octal("30253434").unwrap();
        assert_eq!(w.char_codes(), [0o30, 0o25, 0o34, 0o34]);
        assert_eq!(Word::from_char_codes(w.char_codes()), w);
    }

    #[test]
    fn test_parse_octal() {
        assert_eq!(Word::parse_octal("0").unwrap(), Word::zero());
        assert_eq!(Word::parse_octal("-12").unwrap(), Word::new(true, 0o12));
        assert_eq!(Word::parse_octal("+77777777").unwrap().magnitude(), 0o77777777);

        assert_eq!(Word::parse_octal(""), Err(ParseError::Empty));
        assert_eq!(Word::parse_octal("-"), Err(ParseError::Empty));
        assert_eq!(Word::parse_octal("128"), Err(ParseError::InvalidDigit('8')));
        assert!(matches!(Word::parse_octal("100000000"), Err(ParseError::OutOfRange(_))));
    }

    #[test]
    fn test_display_roundtrip() {
        for s in ["+00000000", "-00000001", "+54750002", "-77777777"] {
            let w: Word = s.parse().unwrap();
            assert_eq!(format!("{}", w), s);
        }
    }

    #[test]
    fn test_negation() {
        let w = Word::from_i64(7);
        assert_eq!((-w).to_i64(), -7);
        assert_eq!(-(-w), w);
    }
}
