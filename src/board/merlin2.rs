//! Board-level facade: one Merlin2b canceller plus two downmixers.
//!
//! The board owns the chip drivers and exposes the combined bring-up and
//! tuning surface an adaptation loop works against. Chip-level failures
//! are wrapped with which-device context on the way up.

use crate::hardware::ltc5594::{Demodulator, LoFreq};
use crate::hardware::merlin2b::{Merlin2b, NUM_CHANNELS};
use crate::interface::{GpioPin, SpiPort};
use anyhow::{Context, Result};
use merlin2_globals::range::Range;
use merlin2_globals::weights::Weights;
use merlin2_globals::{Bandwidth, Error, IqOffset};

pub struct Merlin2<Spi, Gpio, Dm> {
    pub ic: Merlin2b<Spi, Gpio>,
    pub downmixers: [Dm; NUM_CHANNELS],
}

impl<Spi, Gpio, Dm> Merlin2<Spi, Gpio, Dm>
where
    Spi: SpiPort,
    Gpio: GpioPin,
    Dm: Demodulator,
{
    pub fn new(ic: Merlin2b<Spi, Gpio>, downmixers: [Dm; NUM_CHANNELS]) -> Self {
        Self { ic, downmixers }
    }

    /// Resets and probes every IC on the board.
    pub fn init(&mut self) -> Result<()> {
        self.ic.init().context("failed to initialize canceller")?;
        for (index, dm) in self.downmixers.iter_mut().enumerate() {
            dm.regs()
                .init()
                .with_context(|| format!("failed to initialize downmixer {index}"))?;
        }
        Ok(())
    }

    pub fn reset(&mut self) -> Result<()> {
        self.ic.reset()?;
        for dm in &mut self.downmixers {
            dm.regs().reset()?;
        }
        Ok(())
    }

    /// Tests SPI communication to all ICs.
    pub fn probe(&mut self) -> Result<bool> {
        if !self.ic.probe()? {
            return Ok(false);
        }
        for dm in &mut self.downmixers {
            if !dm.regs().probe()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Brings up the canceller signal path and matches both downmixer LO
    /// ports to the operating frequency.
    pub fn setup(
        &mut self,
        num_inputs: usize,
        num_outputs: usize,
        bandwidth: Bandwidth,
        lo_freq: LoFreq,
        chain: bool,
    ) -> Result<()> {
        self.ic
            .setup(num_inputs, num_outputs, bandwidth, chain)
            .context("failed to set up canceller")?;
        for (index, dm) in self.downmixers.iter_mut().enumerate() {
            dm.regs()
                .setup(lo_freq)
                .with_context(|| format!("failed to set up downmixer {index}"))?;
        }
        Ok(())
    }

    /// Latches written weights into the active filter.
    pub fn apply(&mut self) -> Result<()> {
        Ok(self.ic.apply()?)
    }

    pub fn set_weights(&mut self, weights: &Weights, apply: bool) -> Result<Weights> {
        Ok(self.ic.set_weights(weights, apply)?)
    }

    pub fn get_weights(&mut self) -> Result<Weights> {
        Ok(self.ic.get_weights()?)
    }

    pub fn clear_weights(&mut self, apply: bool) -> Result<Weights> {
        Ok(self.ic.clear_weights(apply)?)
    }

    pub fn set_vga_gain(&mut self, gain: f64, input: Option<usize>) -> Result<()> {
        Ok(self.ic.set_vga_gain(gain, input)?)
    }

    pub fn get_vga_gain(&mut self, input: usize) -> Result<f64> {
        Ok(self.ic.get_vga_gain(input)?)
    }

    pub fn vga_gain_table(&self) -> [f64; 8] {
        Merlin2b::<Spi, Gpio>::vga_gain_table()
    }

    pub fn set_gain_profile(&mut self, gains: &[f64]) -> Result<()> {
        Ok(self.ic.set_gain_profile(gains)?)
    }

    pub fn get_gain_profile(&mut self) -> Result<Vec<f64>> {
        Ok(self.ic.get_gain_profile()?)
    }

    pub fn set_input_dc_offset(
        &mut self,
        offset: IqOffset,
        input: Option<usize>,
    ) -> Result<IqOffset> {
        Ok(self.ic.set_input_dc_offset(offset, input)?)
    }

    pub fn get_input_dc_offset(&mut self, input: usize) -> Result<IqOffset> {
        Ok(self.ic.get_input_dc_offset(input)?)
    }

    pub fn set_output_dc_offset(
        &mut self,
        offset: IqOffset,
        output: Option<usize>,
    ) -> Result<IqOffset> {
        Ok(self.ic.set_output_dc_offset(offset, output)?)
    }

    pub fn get_output_dc_offset(&mut self, output: usize) -> Result<IqOffset> {
        Ok(self.ic.get_output_dc_offset(output)?)
    }

    pub fn set_downmixer_gain(&mut self, gain: f64, input: Option<usize>) -> Result<()> {
        for dm in self.selected(input)? {
            dm.regs().set_vga_gain(gain)?;
        }
        Ok(())
    }

    pub fn get_downmixer_gain(&mut self, input: usize) -> Result<f64> {
        Ok(self.downmixer(input)?.regs().vga_gain()?)
    }

    pub fn downmixer_gain_range(&self) -> Range {
        Range::new(8.0, 15.0, 1.0)
    }

    /// IQ imbalance correction: 6-bit gain trim and 9-bit phase trim.
    pub fn set_downmixer_iq_correction(
        &mut self,
        gain: u8,
        phase: u16,
        input: Option<usize>,
    ) -> Result<()> {
        for dm in self.selected(input)? {
            dm.regs().set_iq_gain_trim(gain)?;
            dm.regs().set_iq_phase_trim(phase)?;
        }
        Ok(())
    }

    pub fn get_downmixer_iq_correction(&mut self, input: usize) -> Result<(u8, u16)> {
        let regs = self.downmixer(input)?.regs();
        Ok((regs.iq_gain_trim()?, regs.iq_phase_trim()?))
    }

    pub fn set_downmixer_im2_correction(
        &mut self,
        i: u8,
        q: u8,
        input: Option<usize>,
    ) -> Result<()> {
        for dm in self.selected(input)? {
            dm.regs().set_im2_trim(i, q)?;
        }
        Ok(())
    }

    pub fn get_downmixer_im2_correction(&mut self, input: usize) -> Result<(u8, u8)> {
        Ok(self.downmixer(input)?.regs().im2_trim()?)
    }

    /// Normalized DC offset over the raw offset DAC bytes. Returns the
    /// offset as quantized by the 8-bit registers.
    pub fn set_downmixer_dc_offset(
        &mut self,
        offset: IqOffset,
        input: Option<usize>,
    ) -> Result<IqOffset> {
        if offset.i.abs() > 1.0 || offset.q.abs() > 1.0 {
            return Err(Error::OutOfRange("dc offset components must lie in [-1, +1]").into());
        }
        let i_word = ((offset.i + 1.0) * 128.0).round().clamp(0.0, 255.0) as u8;
        let q_word = ((offset.q + 1.0) * 128.0).round().clamp(0.0, 255.0) as u8;
        for dm in self.selected(input)? {
            dm.regs().set_dc_offset(i_word, q_word)?;
        }
        self.get_downmixer_dc_offset(input.unwrap_or(NUM_CHANNELS - 1))
    }

    pub fn get_downmixer_dc_offset(&mut self, input: usize) -> Result<IqOffset> {
        let (i_word, q_word) = self.downmixer(input)?.regs().dc_offset()?;
        Ok(IqOffset::new(
            i_word as f64 / 128.0 - 1.0,
            q_word as f64 / 128.0 - 1.0,
        ))
    }

    fn downmixer(&mut self, input: usize) -> Result<&mut Dm> {
        self.downmixers
            .get_mut(input)
            .ok_or_else(|| Error::Argument("downmixer index must be 0 or 1").into())
    }

    fn selected(&mut self, input: Option<usize>) -> Result<&mut [Dm]> {
        match input {
            Some(index) => Ok(std::slice::from_mut(self.downmixer(index)?)),
            None => Ok(&mut self.downmixers),
        }
    }
}
