//! Sign-magnitude machine words.
//!
//! This module provides the core value types of the Digiac-3080:
//! - [`Word`] - a sign bit plus a 24-bit magnitude, shown as eight octal digits
//! - [`charset`] - the 6-bit typewriter code packed four to a word
//! - [`arith`] - arithmetic with the machine's wrap-around overflow policy

mod value;
pub mod arith;
pub mod charset;

pub use value::{ParseError, Word};
