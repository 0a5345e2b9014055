use super::Merlin2b;
use crate::interface::{GpioPin, SpiPort};
use merlin2_globals::{Bandwidth, Error, Result};

const REG_CTRL: u16 = 0x0;
const REG_CONFIG: u16 = 0x4;
const REG_GAIN_BASE: u16 = 0x8;

/// Gain steps in dB for the two low-delay taps, in register code order.
const LOW_DELAY_GAINS: [f64; 3] = [-4.0, -2.0, 0.0];
/// Gain steps in dB for the nine high-delay taps.
const HIGH_DELAY_GAINS: [f64; 3] = [-2.0, 0.0, 2.0];

/// One analog delay line feeding a pair of filter banks.
///
/// Taps are grouped into three enable groups (1-3, 4-7, 8-11); per tap a
/// coarse gain preconditions the delayed signal ahead of the weight DACs.
pub struct DelayGroup<'a, Spi, Gpio> {
    ic: &'a mut Merlin2b<Spi, Gpio>,
    base: u16,
}

impl<'a, Spi: SpiPort, Gpio: GpioPin> DelayGroup<'a, Spi, Gpio> {
    pub(crate) fn new(ic: &'a mut Merlin2b<Spi, Gpio>, base: u16) -> Self {
        Self { ic, base }
    }

    /// Selects the feed: the line's own input, or the other line's tail
    /// when chaining.
    pub fn set_input_select(&mut self, chained: bool) -> Result<()> {
        self.ic
            .write_field(self.base + REG_CTRL, chained as u32, 0, 0x1)
    }

    pub fn input_select(&mut self) -> Result<bool> {
        Ok(self.ic.read_field(self.base + REG_CTRL, 0, 0x1)? != 0)
    }

    pub fn set_bandwidth(&mut self, bandwidth: Bandwidth) -> Result<()> {
        let code = match bandwidth {
            Bandwidth::Mhz80 => 0x0,
            Bandwidth::Mhz40 => 0x1,
            Bandwidth::Mhz20 => 0x3,
        };
        self.ic.write_field(self.base + REG_CONFIG, code, 0, 0x3)
    }

    pub fn bandwidth(&mut self) -> Result<Bandwidth> {
        match self.ic.read_field(self.base + REG_CONFIG, 0, 0x3)? {
            0x0 => Ok(Bandwidth::Mhz80),
            0x1 => Ok(Bandwidth::Mhz40),
            0x3 => Ok(Bandwidth::Mhz20),
            _ => Err(Error::OutOfRange("undefined bandwidth code in register")),
        }
    }

    /// Enables the three tap groups.
    pub fn set_enable(&mut self, groups: [bool; 3]) -> Result<()> {
        let word = groups
            .iter()
            .enumerate()
            .fold(0u32, |w, (pos, enable)| w | (*enable as u32) << pos);
        self.ic.write_field(self.base + REG_CONFIG, word, 2, 0x1C)
    }

    pub fn enable(&mut self) -> Result<[bool; 3]> {
        let word = self.ic.read_word(self.base + REG_CONFIG)?;
        Ok([word & 0x4 != 0, word & 0x8 != 0, word & 0x10 != 0])
    }

    /// RC time constant calibration, [0, 31].
    pub fn set_rc_cal(&mut self, value: u8) -> Result<()> {
        if value > 31 {
            return Err(Error::OutOfRange("rc calibration must lie in [0, 31]"));
        }
        self.ic
            .write_field(self.base + REG_CONFIG, value as u32, 5, 0x3E0)
    }

    pub fn rc_cal(&mut self) -> Result<u8> {
        Ok(self.ic.read_field(self.base + REG_CONFIG, 5, 0x3E0)? as u8)
    }

    /// Per-tap gain profile in dB, 11 entries. The first two taps accept
    /// {-4, -2, 0}, the remaining nine {-2, 0, 2}.
    pub fn set_gains(&mut self, gains: &[f64]) -> Result<()> {
        if gains.len() != 11 {
            return Err(Error::Argument("gain profile needs 11 entries per line"));
        }
        let mut codes = [0u32; 11];
        for (index, gain) in gains.iter().enumerate() {
            codes[index] = gain_code(table_for(index), *gain)?;
        }
        for (index, code) in codes.iter().enumerate() {
            self.ic
                .write_field(self.base + REG_GAIN_BASE + index as u16 * 4, *code, 0, 0x3)?;
        }
        Ok(())
    }

    pub fn gains(&mut self) -> Result<[f64; 11]> {
        let mut gains = [0f64; 11];
        for (index, gain) in gains.iter_mut().enumerate() {
            let code = self
                .ic
                .read_field(self.base + REG_GAIN_BASE + index as u16 * 4, 0, 0x3)?;
            *gain = *table_for(index)
                .get(code as usize)
                .ok_or(Error::OutOfRange("undefined gain code in register"))?;
        }
        Ok(gains)
    }
}

fn table_for(index: usize) -> &'static [f64; 3] {
    if index < 2 {
        &LOW_DELAY_GAINS
    } else {
        &HIGH_DELAY_GAINS
    }
}

fn gain_code(table: &[f64; 3], gain: f64) -> Result<u32> {
    table
        .iter()
        .position(|entry| *entry == gain)
        .map(|code| code as u32)
        .ok_or(Error::OutOfRange(
            "gain must be one of the supported dB steps",
        ))
}
