//! Wire codecs for the two SPI buses on a Merlin2 board.
//!
//! The canceller IC speaks a 32-bit register protocol with a 16-bit
//! word-index header ([`canceller`]), the LTC55xx downconverters an 8-bit
//! protocol with single-byte commands ([`downconverter`]). Tap coefficients
//! have their own sign-magnitude register encoding ([`tap`]).
//!
//! Everything in this crate is pure: building and parsing byte frames,
//! no transport access.

pub mod canceller;
pub mod downconverter;
pub mod tap;
