use super::{Merlin2b, TAPS_PER_FILTER};
use crate::interface::{GpioPin, SpiPort};
use merlin2_globals::Result;
use merlin2_wire::tap::TapWord;

const REG_CTRL: u16 = 0x0;
const REG_TAPS: u16 = 0x4;

/// One physical FIR filter bank of 12 complex taps.
pub struct Filter<'a, Spi, Gpio> {
    ic: &'a mut Merlin2b<Spi, Gpio>,
    base: u16,
}

impl<'a, Spi: SpiPort, Gpio: GpioPin> Filter<'a, Spi, Gpio> {
    pub(crate) fn new(ic: &'a mut Merlin2b<Spi, Gpio>, base: u16) -> Self {
        Self { ic, base }
    }

    pub fn set_enable(&mut self, enable: bool) -> Result<()> {
        self.ic
            .write_field(self.base + REG_CTRL, enable as u32, 0, 0x1)
    }

    pub fn enable(&mut self) -> Result<bool> {
        Ok(self.ic.read_field(self.base + REG_CTRL, 0, 0x1)? != 0)
    }

    /// First stage summer enable. The register bit is active low.
    pub fn set_summer_enable(&mut self, enable: bool) -> Result<()> {
        self.ic
            .write_field(self.base + REG_CTRL, (!enable) as u32, 1, 0x2)
    }

    pub fn summer_enable(&mut self) -> Result<bool> {
        Ok(self.ic.read_field(self.base + REG_CTRL, 1, 0x2)? == 0)
    }

    /// Routes tap 1 around the first stage summer.
    pub fn set_tap_bypass(&mut self, bypass: bool) -> Result<()> {
        let word = if bypass { 0x7 } else { 0x0 };
        self.ic.write_field(self.base + REG_CTRL, word, 2, 0x1C)
    }

    pub fn tap_bypass(&mut self) -> Result<bool> {
        Ok(self.ic.read_field(self.base + REG_CTRL, 2, 0x1C)? != 0)
    }

    /// Writes all 12 tap registers in one bus frame.
    pub fn set_weights(&mut self, taps: &[TapWord; TAPS_PER_FILTER]) -> Result<()> {
        let words: Vec<u32> = taps.iter().map(TapWord::pack).collect();
        self.ic.write_words(self.base + REG_TAPS, &words)
    }

    pub fn get_weights(&mut self) -> Result<[TapWord; TAPS_PER_FILTER]> {
        let words = self
            .ic
            .read_words(self.base + REG_TAPS, TAPS_PER_FILTER)?;
        let mut taps = [TapWord::ZERO; TAPS_PER_FILTER];
        for (tap, word) in taps.iter_mut().zip(words) {
            *tap = TapWord::unpack(word);
        }
        Ok(taps)
    }
}
