//! Types shared between the wire codecs and the device drivers.

pub mod range;
pub mod weights;

use thiserror::Error;

/// Errors common to all Merlin2 hardware layers.
#[derive(Error, Debug)]
pub enum Error {
    /// An argument failed validation before any bus traffic happened.
    #[error("invalid argument: {0}")]
    Argument(&'static str),
    /// A value lies outside the legal domain of its register field.
    #[error("out of range: {0}")]
    OutOfRange(&'static str),
    /// The device answered, but its identity registers did not match.
    #[error("device probe failed")]
    ProbeFailed,
    /// No entry of the LO matching table covers the requested frequency.
    #[error("no matching LO band for {mhz:.1} MHz")]
    NoMatchingBand { mhz: f64 },
    /// Failure reported by the underlying SPI or GPIO transport.
    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Baseband bandwidth settings supported by the canceller delay lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bandwidth {
    Mhz20,
    Mhz40,
    Mhz80,
}

impl Bandwidth {
    pub fn from_hz(hz: f64) -> Result<Self> {
        match hz {
            hz if hz == 20e6 => Ok(Self::Mhz20),
            hz if hz == 40e6 => Ok(Self::Mhz40),
            hz if hz == 80e6 => Ok(Self::Mhz80),
            _ => Err(Error::Argument("bandwidth must be 20e6, 40e6 or 80e6 Hz")),
        }
    }

    pub fn hz(&self) -> f64 {
        match self {
            Self::Mhz20 => 20e6,
            Self::Mhz40 => 40e6,
            Self::Mhz80 => 80e6,
        }
    }
}

/// A DC offset pair in normalized units, one value per I/Q rail.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IqOffset {
    pub i: f64,
    pub q: f64,
}

impl IqOffset {
    pub fn new(i: f64, q: f64) -> Self {
        Self { i, q }
    }
}
