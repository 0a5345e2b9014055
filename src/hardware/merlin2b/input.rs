use super::{Merlin2b, check_normalized, dc_value, dc_word};
use crate::interface::{GpioPin, SpiPort};
use merlin2_globals::{Error, IqOffset, Result};

/// Realizable VGA gain steps in dB, in register code order.
pub const VGA_GAIN_TABLE: [f64; 8] = [6.92, 4.72, 2.96, 1.50, 0.25, -0.84, -1.81, -2.68];

const REG_CTRL: u16 = 0x0;
const REG_POS_TRIM: u16 = 0x4;
const REG_DC_OFFSET: u16 = 0x8;
const REG_NEG_TRIM: u16 = 0xC;

/// Input conditioning block: VGA and DC offset compensation ahead of one
/// delay line.
pub struct Input<'a, Spi, Gpio> {
    ic: &'a mut Merlin2b<Spi, Gpio>,
    base: u16,
}

impl<'a, Spi: SpiPort, Gpio: GpioPin> Input<'a, Spi, Gpio> {
    pub(crate) fn new(ic: &'a mut Merlin2b<Spi, Gpio>, base: u16) -> Self {
        Self { ic, base }
    }

    pub fn set_vga_enable(&mut self, enable: bool) -> Result<()> {
        self.ic
            .write_field(self.base + REG_CTRL, enable as u32, 0, 0x1)
    }

    pub fn vga_enable(&mut self) -> Result<bool> {
        Ok(self.ic.read_field(self.base + REG_CTRL, 0, 0x1)? != 0)
    }

    /// Picks the closest entry of [`VGA_GAIN_TABLE`].
    pub fn set_vga_gain(&mut self, gain: f64) -> Result<()> {
        let min = VGA_GAIN_TABLE[VGA_GAIN_TABLE.len() - 1];
        let max = VGA_GAIN_TABLE[0];
        if !(min..=max).contains(&gain) {
            return Err(Error::OutOfRange("vga gain must lie in [-2.68, 6.92] dB"));
        }
        let mut code = 0;
        for (index, entry) in VGA_GAIN_TABLE.iter().enumerate() {
            if (entry - gain).abs() < (VGA_GAIN_TABLE[code] - gain).abs() {
                code = index;
            }
        }
        self.ic
            .write_field(self.base + REG_CTRL, code as u32, 2, 0x1C)
    }

    pub fn vga_gain(&mut self) -> Result<f64> {
        let code = self.ic.read_field(self.base + REG_CTRL, 2, 0x1C)?;
        Ok(VGA_GAIN_TABLE[code as usize & 0x7])
    }

    /// Offsets are normalized to [-1, +1] and quantized to 7 bits.
    pub fn set_dc_offset(&mut self, offset: IqOffset) -> Result<()> {
        check_normalized(offset)?;
        let word = (dc_word(offset.i) & 0x7F) << 8 | (dc_word(offset.q) & 0x7F) << 16 | 0x3;
        self.ic.write_word(self.base + REG_DC_OFFSET, word)
    }

    pub fn dc_offset(&mut self) -> Result<IqOffset> {
        let word = self.ic.read_word(self.base + REG_DC_OFFSET)?;
        Ok(IqOffset::new(
            dc_value(word >> 8 & 0x7F),
            dc_value(word >> 16 & 0x7F),
        ))
    }

    pub fn set_pos_gain_trim(&mut self, i: u8, q: u8) -> Result<()> {
        self.write_trim(REG_POS_TRIM, i, q)
    }

    pub fn pos_gain_trim(&mut self) -> Result<(u8, u8)> {
        self.read_trim(REG_POS_TRIM)
    }

    pub fn set_neg_gain_trim(&mut self, i: u8, q: u8) -> Result<()> {
        self.write_trim(REG_NEG_TRIM, i, q)
    }

    pub fn neg_gain_trim(&mut self) -> Result<(u8, u8)> {
        self.read_trim(REG_NEG_TRIM)
    }

    fn write_trim(&mut self, reg: u16, i: u8, q: u8) -> Result<()> {
        if i > 15 || q > 15 {
            return Err(Error::OutOfRange("gain trim must lie in [0, 15]"));
        }
        self.ic
            .write_word(self.base + reg, i as u32 | (q as u32) << 8)
    }

    fn read_trim(&mut self, reg: u16) -> Result<(u8, u8)> {
        let word = self.ic.read_word(self.base + reg)?;
        Ok(((word & 0xF) as u8, (word >> 8 & 0xF) as u8))
    }
}
