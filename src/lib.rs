//! Rust native driver for Merlin2 self-interference canceller boards.
//!
//! A Merlin2 board carries a Merlin2b canceller IC (two delay lines, four
//! FIR filter banks with programmable complex tap weights) and two LTC55xx
//! I/Q demodulators used as downmixers. All devices sit on SPI chip
//! selects of a host bridge, with two extra GPIO lines for the canceller's
//! RESETN and APLS (weight latch) pins.
//!
//! ## Usage overview
//!
//! The crate is transport agnostic: implement [`interface::SpiPort`] and
//! [`interface::GpioPin`] for whatever bridge drives the board, then hand
//! the ports to [`board::merlin2::Merlin2`] or to the individual chip
//! drivers in [`hardware`].
//!
//! A typical bring-up is `setup()` (reset, probe, bandgap and path
//! configuration), followed by repeated `set_weights()` / `apply()` cycles
//! while an adaptation loop converges. Written weights only take effect on
//! `apply()`, which pulses the APLS latch pin.
//!
//! Datasheets for the downconverters are available at the following
//! resources:
//! ### LTC5594
//! [LTC5594 Product Page](https://www.analog.com/en/products/ltc5594.html)
//! ### LTC5586
//! [LTC5586 Product Page](https://www.analog.com/en/products/ltc5586.html)
//!
//! The canceller IC itself has no public datasheet; the register layout
//! encoded in [`hardware::merlin2b`] is the reference.

pub mod board;
pub mod hardware;
pub mod interface;

pub use merlin2_globals::range::Range;
pub use merlin2_globals::weights::{Complex64, Weights};
pub use merlin2_globals::{Bandwidth, Error, IqOffset, Result};
