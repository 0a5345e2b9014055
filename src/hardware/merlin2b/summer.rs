use super::Merlin2b;
use crate::interface::{GpioPin, SpiPort};
use merlin2_globals::Result;

const REG_CTRL: u16 = 0x0;

/// Second stage summer combining the two filter banks of one output.
pub struct Summer<'a, Spi, Gpio> {
    ic: &'a mut Merlin2b<Spi, Gpio>,
    base: u16,
}

impl<'a, Spi: SpiPort, Gpio: GpioPin> Summer<'a, Spi, Gpio> {
    pub(crate) fn new(ic: &'a mut Merlin2b<Spi, Gpio>, base: u16) -> Self {
        Self { ic, base }
    }

    /// The register bit is active low.
    pub fn set_enable(&mut self, enable: bool) -> Result<()> {
        self.ic
            .write_field(self.base + REG_CTRL, (!enable) as u32, 0, 0x1)
    }

    pub fn enable(&mut self) -> Result<bool> {
        Ok(self.ic.read_field(self.base + REG_CTRL, 0, 0x1)? == 0)
    }
}
