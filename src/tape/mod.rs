//! Paper tape images.
//!
//! - `codec`: frame-level reading and punching of `.ptp` files
//! - `listing`: block structure and human-readable dumps

pub mod codec;
pub mod listing;

pub use codec::{dump, load, TapeError, TapePunch, TapeReader};
pub use listing::{listing, TapeBlock, TapeImage};
