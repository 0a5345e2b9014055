//! Merlin2b canceller IC.
//!
//! The chip exposes a flat 32-bit register file addressed by byte
//! (word-aligned, up to 0x7FFC) over a raw SPI framing, see
//! [`merlin2_wire::canceller`]. Functional blocks live at fixed base
//! offsets inside that file; [`Input`], [`DelayGroup`], [`Filter`],
//! [`Summer`] and [`Output`] are short-lived accessors that add the base
//! offset to every access.
//!
//! Weight updates are double-buffered in hardware: writes land in a
//! shadow bank and only become active when the APLS pin is pulsed via
//! [`Merlin2b::apply`].

pub mod delay_group;
pub mod filter;
pub mod input;
pub mod output;
pub mod summer;

pub use delay_group::DelayGroup;
pub use filter::Filter;
pub use input::Input;
pub use output::Output;
pub use summer::Summer;

use crate::interface::{GpioPin, SpiPort};
use merlin2_globals::weights::{Complex64, Weights};
use merlin2_globals::{Bandwidth, Error, IqOffset, Result};
use merlin2_wire::canceller::{self, ReadFrame, WriteFrame};
use merlin2_wire::tap::TapWord;
use std::thread::sleep;
use std::time::Duration;

/// Delay lines, inputs and outputs per chip.
pub const NUM_CHANNELS: usize = 2;
/// Taps per physical filter bank.
pub const TAPS_PER_FILTER: usize = 12;
/// Taps per logical column when two filter banks are chained. One tap is
/// lost at the seam, its slot in the second bank is force-disconnected.
pub const TAPS_CHAINED: usize = 2 * TAPS_PER_FILTER - 1;

const INPUT_BASES: [u16; NUM_CHANNELS] = [0x3004, 0x3014];
const DELAY_BASES: [u16; NUM_CHANNELS] = [0x0004, 0x1004];
const FILTER_BASES: [[u16; NUM_CHANNELS]; NUM_CHANNELS] = [[0x0038, 0x006C], [0x1038, 0x106C]];
const SUMMER_BASES: [u16; NUM_CHANNELS] = [0x00A0, 0x10A0];
const OUTPUT_BASES: [u16; NUM_CHANNELS] = [0x3024, 0x3040];

/// Identity registers checked by [`Merlin2b::probe`], one per SPI slave
/// inside the chip.
const PROBE_MAGIC: [(u16, u32); 3] = [
    (0x0000, 0xABCD0100),
    (0x1000, 0x12340101),
    (0x3000, 0x9ABC0103),
];

const REG_BANDGAP: u16 = 0x2004;
const REG_LO_CTRL: u16 = 0x200C;

const DEFAULT_GAIN_PROFILE: [f64; 11] =
    [0.0, 0.0, 0.0, -2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];

pub(crate) fn check_normalized(offset: IqOffset) -> Result<()> {
    if offset.i.abs() > 1.0 || offset.q.abs() > 1.0 {
        return Err(Error::OutOfRange("dc offset components must lie in [-1, +1]"));
    }
    Ok(())
}

/// Maps a normalized offset in [-1, +1] onto the 7-bit register scale.
pub(crate) fn dc_word(value: f64) -> u32 {
    ((value + 1.0) / 2.0 * 127.0).round() as u32
}

pub(crate) fn dc_value(word: u32) -> f64 {
    (word as f64 / 127.0) * 2.0 - 1.0
}

fn check_field(position: u32, mask: u32) -> Result<()> {
    if position >= 32 {
        return Err(Error::Argument("bit position must be below 32"));
    }
    if mask == 0 {
        return Err(Error::Argument("mask must be nonzero"));
    }
    if (mask as u64) << position > u32::MAX as u64 {
        return Err(Error::Argument("mask shifted past bit 31"));
    }
    Ok(())
}

fn check_channel(index: usize) -> Result<()> {
    if index >= NUM_CHANNELS {
        return Err(Error::Argument("channel index must be 0 or 1"));
    }
    Ok(())
}

pub struct Merlin2b<Spi, Gpio> {
    spi: Spi,
    resetn: Gpio,
    apls: Gpio,
    chained: bool,
}

impl<Spi: SpiPort, Gpio: GpioPin> Merlin2b<Spi, Gpio> {
    pub fn new(spi: Spi, resetn: Gpio, apls: Gpio) -> Self {
        Self {
            spi,
            resetn,
            apls,
            chained: false,
        }
    }

    /// True after a chained [`Merlin2b::setup`], selects the (23, 2)
    /// weight shape instead of (12, 4).
    pub fn chained(&self) -> bool {
        self.chained
    }

    /// Writes `data` to consecutive registers starting at `addr`.
    ///
    /// With the full mask this is a plain write. A partial `mask` turns it
    /// into a read-modify-write: the current words are fetched, the new
    /// values are shifted to `position`, masked in, and written back with
    /// a single write frame. `mask` is given in final bit positions, i.e.
    /// already shifted.
    pub fn write(&mut self, addr: u16, data: &[u32], position: u32, mask: u32) -> Result<()> {
        let index = canceller::word_index(addr)?;
        check_field(position, mask)?;
        if data.is_empty() {
            return Err(Error::Argument("write needs at least one data word"));
        }
        let words = if mask == u32::MAX {
            data.to_vec()
        } else {
            let current = self.read_frame(index, data.len())?;
            data.iter()
                .zip(current)
                .map(|(new, old)| (new << position) & mask | old & !mask)
                .collect()
        };
        log::trace!("write 0x{addr:04X}: {words:08X?}");
        self.spi.write(&Vec::from(WriteFrame::new(index, &words)))
    }

    /// Reads `length` consecutive registers starting at `addr`, returning
    /// each word masked and shifted down to `position`.
    pub fn read(&mut self, addr: u16, length: usize, position: u32, mask: u32) -> Result<Vec<u32>> {
        let index = canceller::word_index(addr)?;
        check_field(position, mask)?;
        if length == 0 || length >= 8192 {
            return Err(Error::Argument("read length must lie in [1, 8191]"));
        }
        let words = self.read_frame(index, length)?;
        log::trace!("read 0x{addr:04X}: {words:08X?}");
        Ok(words.into_iter().map(|w| (w & mask) >> position).collect())
    }

    fn read_frame(&mut self, word_index: u16, length: usize) -> Result<Vec<u32>> {
        let command: Vec<u8> = ReadFrame::new(word_index).into();
        let response = self
            .spi
            .query(&command, length * canceller::WORD_BYTES)?;
        canceller::unpack_words(&response)
    }

    pub fn write_word(&mut self, addr: u16, value: u32) -> Result<()> {
        self.write(addr, &[value], 0, u32::MAX)
    }

    pub fn write_words(&mut self, addr: u16, words: &[u32]) -> Result<()> {
        self.write(addr, words, 0, u32::MAX)
    }

    pub fn write_field(&mut self, addr: u16, value: u32, position: u32, mask: u32) -> Result<()> {
        self.write(addr, &[value], position, mask)
    }

    pub fn read_word(&mut self, addr: u16) -> Result<u32> {
        self.read_field(addr, 0, u32::MAX)
    }

    pub fn read_words(&mut self, addr: u16, length: usize) -> Result<Vec<u32>> {
        self.read(addr, length, 0, u32::MAX)
    }

    pub fn read_field(&mut self, addr: u16, position: u32, mask: u32) -> Result<u32> {
        Ok(self.read(addr, 1, position, mask)?[0])
    }

    pub fn input(&mut self, index: usize) -> Result<Input<'_, Spi, Gpio>> {
        check_channel(index)?;
        Ok(Input::new(self, INPUT_BASES[index]))
    }

    pub fn delay_group(&mut self, index: usize) -> Result<DelayGroup<'_, Spi, Gpio>> {
        check_channel(index)?;
        Ok(DelayGroup::new(self, DELAY_BASES[index]))
    }

    pub fn filter(&mut self, input: usize, output: usize) -> Result<Filter<'_, Spi, Gpio>> {
        check_channel(input)?;
        check_channel(output)?;
        Ok(Filter::new(self, FILTER_BASES[input][output]))
    }

    pub fn summer(&mut self, index: usize) -> Result<Summer<'_, Spi, Gpio>> {
        check_channel(index)?;
        Ok(Summer::new(self, SUMMER_BASES[index]))
    }

    pub fn output(&mut self, index: usize) -> Result<Output<'_, Spi, Gpio>> {
        check_channel(index)?;
        // the second output instance stores its DC offset fields bit-reversed
        Ok(Output::new(self, OUTPUT_BASES[index], index == 1))
    }

    /// Hard reset via the RESETN pin. Drops APLS first so no stale latch
    /// pulse can fire during the reset.
    pub fn reset(&mut self) -> Result<()> {
        self.apls.set(false)?;
        self.resetn.set(true)?;
        sleep(Duration::from_millis(1));
        self.resetn.set(false)?;
        sleep(Duration::from_millis(1));
        Ok(())
    }

    /// Latches the shadow weight bank into the active filter by pulsing
    /// the APLS pin.
    pub fn apply(&mut self) -> Result<()> {
        self.apls.set(true)?;
        self.apls.set(false)
    }

    /// Checks the identity registers of all three internal SPI slaves.
    ///
    /// A mismatch is a negative result, not an error; only transport
    /// failures propagate as errors.
    pub fn probe(&mut self) -> Result<bool> {
        for (addr, expected) in PROBE_MAGIC {
            let word = self.read_word(addr)?;
            if word != expected {
                log::debug!("identity register 0x{addr:04X}: 0x{word:08X}, expected 0x{expected:08X}");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Resets the chip and verifies SPI communication.
    pub fn init(&mut self) -> Result<()> {
        self.reset()?;
        if !self.probe()? {
            log::error!("canceller did not answer probe after reset");
            return Err(Error::ProbeFailed);
        }
        Ok(())
    }

    /// Full bring-up: reset, probe, bandgap enable toggle, LO buffers off,
    /// delay line and signal path configuration, all weights cleared.
    ///
    /// `num_inputs` and `num_outputs` select how many of the two channels
    /// take part; `chain` cascades the two delay lines into one long
    /// filter per output.
    pub fn setup(
        &mut self,
        num_inputs: usize,
        num_outputs: usize,
        bandwidth: Bandwidth,
        chain: bool,
    ) -> Result<()> {
        if !(1..=NUM_CHANNELS).contains(&num_inputs) {
            return Err(Error::Argument("num_inputs must be 1 or 2"));
        }
        if !(1..=NUM_CHANNELS).contains(&num_outputs) {
            return Err(Error::Argument("num_outputs must be 1 or 2"));
        }
        log::debug!(
            "setup: {num_inputs} in, {num_outputs} out, {} Hz, chain {chain}",
            bandwidth.hz()
        );
        self.init()?;
        // Bandgap bring-up: toggle the enable bit
        self.write_word(REG_BANDGAP, 0x1990E)?;
        sleep(Duration::from_millis(10));
        self.write_word(REG_BANDGAP, 0x1990F)?;
        // LO in / out buffers off
        self.write_word(REG_LO_CTRL, 0x7)?;
        for line in 0..NUM_CHANNELS {
            let fed = line < num_inputs || chain;
            {
                let mut delay = self.delay_group(line)?;
                delay.set_input_select(chain)?;
                delay.set_bandwidth(bandwidth)?;
                delay.set_enable([fed; 3])?;
                delay.set_rc_cal(0x10)?;
                delay.set_gains(&DEFAULT_GAIN_PROFILE)?;
            }
            let mut input = self.input(line)?;
            input.set_dc_offset(IqOffset::default())?;
            input.set_vga_enable(line < num_inputs)?;
            input.set_vga_gain(0.0)?;
        }
        for inp in 0..NUM_CHANNELS {
            for out in 0..NUM_CHANNELS {
                self.filter(inp, out)?.set_enable(true)?;
                // summer enable and tap bypass control lines are swapped
                // between the i0o1 and i1o0 paths, hence the flipped
                // indexing
                self.filter(out, inp)?.set_summer_enable(out < num_outputs)?;
                self.filter(out, inp)?.set_tap_bypass(true)?;
            }
        }
        for out in 0..NUM_CHANNELS {
            self.summer(out)?.set_enable(out < num_outputs)?;
            self.output(out)?.set_dc_offset(IqOffset::default())?;
            self.write_field(OUTPUT_BASES[out], 0x0, 0, 0x3)?;
        }
        self.chained = chain;
        self.clear_weights(true)?;
        Ok(())
    }

    /// Expected weight matrix shape, `(taps, columns)`.
    pub fn weight_shape(&self) -> (usize, usize) {
        if self.chained {
            (TAPS_CHAINED, NUM_CHANNELS)
        } else {
            (TAPS_PER_FILTER, NUM_CHANNELS * NUM_CHANNELS)
        }
    }

    /// Writes a full weight matrix into the shadow bank.
    ///
    /// Components are quantized to 8-bit magnitudes; the returned matrix
    /// holds the values as the hardware will realize them. In chained mode
    /// each column spans both filter banks of its output, with tap 0 of
    /// the second bank force-disconnected as the seam.
    pub fn set_weights(&mut self, weights: &Weights, apply: bool) -> Result<Weights> {
        let (num_taps, num_columns) = self.weight_shape();
        if weights.taps() != num_taps || weights.lines() != num_columns {
            return Err(Error::Argument("weight matrix has the wrong shape"));
        }
        let mut mapped = Weights::zeros(num_taps, num_columns);
        let mut fixed = vec![vec![(0i16, 0i16); num_taps]; num_columns];
        for col in 0..num_columns {
            for tap in 0..num_taps {
                let w = weights[(tap, col)];
                let i = (w.re * 255.0).round() as i16;
                let q = (w.im * 255.0).round() as i16;
                fixed[col][tap] = (i, q);
                mapped[(tap, col)] = Complex64::new(i as f64 / 255.0, q as f64 / 255.0);
            }
        }
        let mut banks = [[TapWord::ZERO; TAPS_PER_FILTER]; 4];
        if self.chained {
            for col in 0..NUM_CHANNELS {
                for tap in 0..TAPS_PER_FILTER {
                    let (i, q) = fixed[col][tap];
                    banks[col][tap] = TapWord::new(i, q, false)?;
                }
                // seam between the two banks of this column
                banks[col + 2][0] = TapWord::ZERO.with_disconnect(true);
                for tap in TAPS_PER_FILTER..TAPS_CHAINED {
                    let (i, q) = fixed[col][tap];
                    banks[col + 2][tap - TAPS_PER_FILTER + 1] = TapWord::new(i, q, false)?;
                }
            }
        } else {
            for col in 0..num_columns {
                for tap in 0..TAPS_PER_FILTER {
                    let (i, q) = fixed[col][tap];
                    banks[col][tap] = TapWord::new(i, q, false)?;
                }
            }
        }
        // tap 11 routing is crossed between the i0o0 and i0o1 banks
        let tmp = banks[0][TAPS_PER_FILTER - 1];
        banks[0][TAPS_PER_FILTER - 1] = banks[1][TAPS_PER_FILTER - 1];
        banks[1][TAPS_PER_FILTER - 1] = tmp;
        for inp in 0..NUM_CHANNELS {
            for out in 0..NUM_CHANNELS {
                let bank = banks[inp * 2 + out];
                self.filter(inp, out)?.set_weights(&bank)?;
            }
        }
        if apply {
            self.apply()?;
        }
        Ok(mapped)
    }

    /// Reads the weight matrix back from the shadow bank, undoing the
    /// tap 11 crossing and the chained-mode bank split.
    pub fn get_weights(&mut self) -> Result<Weights> {
        let mut banks = [[TapWord::ZERO; TAPS_PER_FILTER]; 4];
        for inp in 0..NUM_CHANNELS {
            for out in 0..NUM_CHANNELS {
                banks[inp * 2 + out] = self.filter(inp, out)?.get_weights()?;
            }
        }
        let tmp = banks[0][TAPS_PER_FILTER - 1];
        banks[0][TAPS_PER_FILTER - 1] = banks[1][TAPS_PER_FILTER - 1];
        banks[1][TAPS_PER_FILTER - 1] = tmp;
        let (num_taps, num_columns) = self.weight_shape();
        let mut weights = Weights::zeros(num_taps, num_columns);
        if self.chained {
            for col in 0..NUM_CHANNELS {
                for tap in 0..TAPS_PER_FILTER {
                    weights[(tap, col)] = tap_value(banks[col][tap]);
                }
                for tap in TAPS_PER_FILTER..TAPS_CHAINED {
                    weights[(tap, col)] = tap_value(banks[col + 2][tap - TAPS_PER_FILTER + 1]);
                }
            }
        } else {
            for col in 0..num_columns {
                for tap in 0..TAPS_PER_FILTER {
                    weights[(tap, col)] = tap_value(banks[col][tap]);
                }
            }
        }
        Ok(weights)
    }

    /// Writes zeros to every tap. Returns the mapped (all-zero) matrix.
    pub fn clear_weights(&mut self, apply: bool) -> Result<Weights> {
        let (num_taps, num_columns) = self.weight_shape();
        self.set_weights(&Weights::zeros(num_taps, num_columns), apply)
    }

    pub fn set_vga_gain(&mut self, gain: f64, input: Option<usize>) -> Result<()> {
        match input {
            Some(index) => self.input(index)?.set_vga_gain(gain),
            None => {
                for index in 0..NUM_CHANNELS {
                    self.input(index)?.set_vga_gain(gain)?;
                }
                Ok(())
            }
        }
    }

    pub fn get_vga_gain(&mut self, input: usize) -> Result<f64> {
        self.input(input)?.vga_gain()
    }

    /// The realizable VGA gain steps in dB, ascending.
    pub fn vga_gain_table() -> [f64; 8] {
        let mut table = input::VGA_GAIN_TABLE;
        table.sort_by(f64::total_cmp);
        table
    }

    /// Sets the gain-delay profile, 11 entries per delay line.
    ///
    /// Standalone, the 11 entries are broadcast to both lines. Chained,
    /// 22 entries are expected and split across the two lines.
    pub fn set_gain_profile(&mut self, gains: &[f64]) -> Result<()> {
        let expected = if self.chained { 22 } else { 11 };
        if gains.len() != expected {
            return Err(Error::Argument("gain profile has the wrong length"));
        }
        if self.chained {
            self.delay_group(0)?.set_gains(&gains[..11])?;
            self.delay_group(1)?.set_gains(&gains[11..])
        } else {
            for line in 0..NUM_CHANNELS {
                self.delay_group(line)?.set_gains(gains)?;
            }
            Ok(())
        }
    }

    /// Reads the gain-delay profile back, 22 entries when chained.
    pub fn get_gain_profile(&mut self) -> Result<Vec<f64>> {
        let mut gains = self.delay_group(0)?.gains()?.to_vec();
        if self.chained {
            gains.extend(self.delay_group(1)?.gains()?);
        }
        Ok(gains)
    }

    /// Returns the offset as quantized by the 7-bit registers.
    pub fn set_input_dc_offset(&mut self, offset: IqOffset, input: Option<usize>) -> Result<IqOffset> {
        let readback = match input {
            Some(index) => {
                self.input(index)?.set_dc_offset(offset)?;
                index
            }
            None => {
                for index in 0..NUM_CHANNELS {
                    self.input(index)?.set_dc_offset(offset)?;
                }
                NUM_CHANNELS - 1
            }
        };
        self.input(readback)?.dc_offset()
    }

    pub fn get_input_dc_offset(&mut self, input: usize) -> Result<IqOffset> {
        self.input(input)?.dc_offset()
    }

    /// Returns the offset as quantized by the 7-bit registers.
    pub fn set_output_dc_offset(&mut self, offset: IqOffset, output: Option<usize>) -> Result<IqOffset> {
        let readback = match output {
            Some(index) => {
                self.output(index)?.set_dc_offset(offset)?;
                index
            }
            None => {
                for index in 0..NUM_CHANNELS {
                    self.output(index)?.set_dc_offset(offset)?;
                }
                NUM_CHANNELS - 1
            }
        };
        self.output(readback)?.dc_offset()
    }

    pub fn get_output_dc_offset(&mut self, output: usize) -> Result<IqOffset> {
        self.output(output)?.dc_offset()
    }
}

fn tap_value(tap: TapWord) -> Complex64 {
    Complex64::new(tap.i() as f64 / 255.0, tap.q() as f64 / 255.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    // (base, span in bytes) for every block instance
    fn block_spans() -> Vec<(u16, u16)> {
        let mut spans = Vec::new();
        for base in INPUT_BASES {
            spans.push((base, 0x10));
        }
        for base in DELAY_BASES {
            spans.push((base, 0x34));
        }
        for bases in FILTER_BASES {
            for base in bases {
                spans.push((base, 0x34));
            }
        }
        for base in SUMMER_BASES {
            spans.push((base, 0x4));
        }
        for base in OUTPUT_BASES {
            spans.push((base, 0x1C));
        }
        spans
    }

    #[test]
    fn block_address_ranges_are_disjoint() {
        let spans = block_spans();
        for (index, (base_a, len_a)) in spans.iter().enumerate() {
            assert_eq!(0, base_a % 4);
            assert!(base_a + len_a <= 0x7FFC + 4);
            for (base_b, len_b) in &spans[index + 1..] {
                let disjoint = base_a + len_a <= *base_b || base_b + len_b <= *base_a;
                assert!(
                    disjoint,
                    "blocks at 0x{base_a:04X} and 0x{base_b:04X} overlap"
                );
            }
        }
    }

    #[test]
    fn probe_registers_lie_outside_block_spans() {
        for (addr, _) in PROBE_MAGIC {
            for (base, len) in block_spans() {
                assert!(addr < base || addr >= base + len);
            }
        }
    }
}
