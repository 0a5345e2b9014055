use super::{Merlin2b, check_normalized, dc_value, dc_word};
use crate::interface::{GpioPin, SpiPort};
use merlin2_globals::{IqOffset, Result};

const REG_DC_OFFSET: u16 = 0x18;

/// Output driver block behind the second stage summer.
pub struct Output<'a, Spi, Gpio> {
    ic: &'a mut Merlin2b<Spi, Gpio>,
    base: u16,
    // the second output instance wires its DC offset DACs MSB first
    bit_reversed: bool,
}

impl<'a, Spi: SpiPort, Gpio: GpioPin> Output<'a, Spi, Gpio> {
    pub(crate) fn new(ic: &'a mut Merlin2b<Spi, Gpio>, base: u16, bit_reversed: bool) -> Self {
        Self {
            ic,
            base,
            bit_reversed,
        }
    }

    /// Offsets are normalized to [-1, +1] and quantized to 7 bits.
    pub fn set_dc_offset(&mut self, offset: IqOffset) -> Result<()> {
        check_normalized(offset)?;
        let mut i_word = dc_word(offset.i);
        let mut q_word = dc_word(offset.q);
        if self.bit_reversed {
            i_word = rev7(i_word);
            q_word = rev7(q_word);
        }
        let word = (i_word & 0x7F) << 8 | (q_word & 0x7F) << 16 | 0x3;
        self.ic.write_word(self.base + REG_DC_OFFSET, word)
    }

    pub fn dc_offset(&mut self) -> Result<IqOffset> {
        let word = self.ic.read_word(self.base + REG_DC_OFFSET)?;
        let mut i_word = word >> 8 & 0x7F;
        let mut q_word = word >> 16 & 0x7F;
        if self.bit_reversed {
            i_word = rev7(i_word);
            q_word = rev7(q_word);
        }
        Ok(IqOffset::new(dc_value(i_word), dc_value(q_word)))
    }
}

/// Reverses the low 7 bits.
fn rev7(word: u32) -> u32 {
    word.reverse_bits() >> 25
}
