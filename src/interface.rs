//! Transport seam between the chip drivers and the host bridge.
//!
//! Each device on the board owns one SPI chip select and, for the
//! canceller, two GPIO lines. Bridge backends implement these traits and
//! map their native failures to [`Error::Transport`].
//!
//! [`Error::Transport`]: merlin2_globals::Error::Transport

use merlin2_globals::Result;

/// One SPI chip select, half-duplex as seen by the devices on this board.
pub trait SpiPort {
    /// Shifts out a complete command frame.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Shifts out a command frame, then clocks in `response_len` bytes.
    fn query(&mut self, command: &[u8], response_len: usize) -> Result<Vec<u8>>;
}

/// A single GPIO line in output direction.
pub trait GpioPin {
    /// Drives the line. `true` asserts the line in its logical sense,
    /// active-low inversion is the backend's business.
    fn set(&mut self, level: bool) -> Result<()>;

    /// Reads back the driven level.
    fn get(&mut self) -> Result<bool>;
}
