//! LTC5594 and LTC5586 I/Q demodulators, used as downmixers ahead of the
//! canceller's observation inputs.
//!
//! Both chips share an 8-bit register file, addresses 0x00 to 0x17, over a
//! single-byte SPI command framing, see [`merlin2_wire::downconverter`].
//! The LTC5586 adds an RF input switch and a step attenuator on top of the
//! LTC5594 register map.

use crate::interface::SpiPort;
use merlin2_globals::range::Range;
use merlin2_globals::{Error, Result};
use merlin2_wire::downconverter::{ADDR_MAX, ReadFrame, WriteFrame};

const PROBE_VALUE: u8 = 0xF0;

/// LO frequency selector for [`Ltc5594::setup`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoFreq {
    Hz(f64),
    /// Mid-band matching settings, usable without knowing the LO yet.
    Default,
}

impl From<f64> for LoFreq {
    fn from(hz: f64) -> Self {
        Self::Hz(hz)
    }
}

/// LO port matching settings for one band: band select, two match
/// capacitor codes and the inductor code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoMatch {
    pub band: u8,
    pub cf1: u8,
    pub lf1: u8,
    pub cf2: u8,
}

struct LoRange {
    low_mhz: f64,
    high_mhz: f64,
    value: LoMatch,
}

const fn lo_range(low_mhz: f64, high_mhz: f64, band: u8, cf1: u8, lf1: u8, cf2: u8) -> LoRange {
    LoRange {
        low_mhz,
        high_mhz,
        value: LoMatch { band, cf1, lf1, cf2 },
    }
}

const LO_MATCH_DEFAULT: LoMatch = LoMatch {
    band: 1,
    cf1: 8,
    lf1: 3,
    cf2: 3,
};

/// Single-ended LO matching settings per frequency band. Bounds are
/// inclusive on both ends; on a shared edge the first entry wins.
const LO_TABLE: [LoRange; 16] = [
    lo_range(300.0, 339.0, 0, 31, 3, 31),
    lo_range(339.0, 398.0, 0, 21, 3, 24),
    lo_range(398.0, 419.0, 0, 14, 3, 23),
    lo_range(419.0, 556.0, 0, 17, 2, 31),
    lo_range(556.0, 625.0, 0, 10, 2, 23),
    lo_range(625.0, 801.0, 0, 15, 1, 31),
    lo_range(801.0, 831.0, 0, 14, 1, 27),
    lo_range(831.0, 1046.0, 0, 8, 1, 21),
    lo_range(1046.0, 1242.0, 1, 31, 3, 31),
    lo_range(1242.0, 1411.0, 1, 21, 3, 28),
    lo_range(1411.0, 1696.0, 1, 17, 2, 26),
    lo_range(1696.0, 2070.0, 1, 15, 1, 31),
    lo_range(2070.0, 2470.0, 1, 8, 1, 21),
    lo_range(2470.0, 2980.0, 1, 2, 1, 10),
    lo_range(2980.0, 3500.0, 1, 1, 0, 19),
    lo_range(3500.0, 9000.0, 1, 0, 0, 0),
];

/// Looks up the matching settings for an LO frequency.
pub fn lo_match(lo_freq: LoFreq) -> Result<LoMatch> {
    match lo_freq {
        LoFreq::Default => Ok(LO_MATCH_DEFAULT),
        LoFreq::Hz(hz) => {
            let mhz = hz / 1e6;
            LO_TABLE
                .iter()
                .find(|range| range.low_mhz <= mhz && mhz <= range.high_mhz)
                .map(|range| range.value)
                .ok_or(Error::NoMatchingBand { mhz })
        }
    }
}

pub struct Ltc5594<Spi> {
    spi: Spi,
}

impl<Spi: SpiPort> Ltc5594<Spi> {
    pub fn new(spi: Spi) -> Self {
        Self { spi }
    }

    pub fn write(&mut self, addr: u8, data: u8) -> Result<()> {
        self.write_field(addr, data, 0, 0xFF)
    }

    pub fn read(&mut self, addr: u8) -> Result<u8> {
        self.read_field(addr, 0, 0xFF)
    }

    /// Field write with read-modify-write for partial masks. `mask` is
    /// given in final bit positions.
    pub fn write_field(&mut self, addr: u8, value: u8, position: u32, mask: u8) -> Result<()> {
        check_access(addr, position)?;
        let mut data = (((value as u32) << position) as u8) & mask;
        if mask != 0xFF {
            data |= self.read(addr)? & !mask;
        }
        log::trace!("downconverter write 0x{addr:02X}: 0x{data:02X}");
        self.spi.write(&Vec::from(WriteFrame::new(addr, data)))
    }

    pub fn read_field(&mut self, addr: u8, position: u32, mask: u8) -> Result<u8> {
        check_access(addr, position)?;
        let command: Vec<u8> = ReadFrame::new(addr).into();
        let response = self.spi.query(&command, 1)?;
        let byte = response
            .first()
            .copied()
            .ok_or_else(|| Error::Transport("empty downconverter response".into()))?;
        Ok((byte & mask) >> position)
    }

    /// Soft reset via the self-clearing reset bit.
    pub fn reset(&mut self) -> Result<()> {
        self.write_field(0x16, 1, 3, 0x08)
    }

    /// Reads the status register and compares it against its fixed value.
    pub fn probe(&mut self) -> Result<bool> {
        Ok(self.read(0x16)? == PROBE_VALUE)
    }

    pub fn init(&mut self) -> Result<()> {
        self.reset()?;
        if !self.probe()? {
            log::error!("downconverter did not answer probe after reset");
            return Err(Error::ProbeFailed);
        }
        Ok(())
    }

    /// Reset, probe and LO port matching for the given LO frequency.
    pub fn setup(&mut self, lo_freq: LoFreq) -> Result<()> {
        self.init()?;
        let m = lo_match(lo_freq)?;
        self.set_lo_band(m.band)?;
        self.set_lo_cf(m.cf1, m.cf2)?;
        self.set_lo_lf(m.lf1)
    }

    /// IF VGA gain in dB, [8, 15] in 1 dB steps.
    pub fn set_vga_gain(&mut self, gain: f64) -> Result<()> {
        if !(8.0..=15.0).contains(&gain) {
            return Err(Error::OutOfRange("vga gain must lie in [8, 15] dB"));
        }
        self.write_field(0x15, (gain - 8.0).round() as u8, 4, 0x70)
    }

    pub fn vga_gain(&mut self) -> Result<f64> {
        Ok(self.read_field(0x15, 4, 0x70)? as f64 + 8.0)
    }

    pub fn vga_gain_range(&self) -> Range {
        Range::new(8.0, 15.0, 1.0)
    }

    pub fn set_vga_im3_trim(&mut self, cc: u8, ic: u8) -> Result<()> {
        if cc > 3 || ic > 3 {
            return Err(Error::OutOfRange("vga im3 trim values must lie in [0, 3]"));
        }
        self.write_field(0x15, cc << 2 | ic, 0, 0xF)
    }

    pub fn vga_im3_trim(&mut self) -> Result<(u8, u8)> {
        let data = self.read_field(0x15, 0, 0xF)?;
        Ok((data >> 2 & 0x3, data & 0x3))
    }

    pub fn set_lo_band(&mut self, band: u8) -> Result<()> {
        if band > 1 {
            return Err(Error::OutOfRange("lo band must be 0 or 1"));
        }
        self.write_field(0x13, band, 7, 0x80)
    }

    pub fn lo_band(&mut self) -> Result<u8> {
        self.read_field(0x13, 7, 0x80)
    }

    pub fn set_lo_cf(&mut self, cf1: u8, cf2: u8) -> Result<()> {
        if cf1 > 31 || cf2 > 31 {
            return Err(Error::OutOfRange("lo match capacitor codes must lie in [0, 31]"));
        }
        self.write_field(0x12, cf1, 0, 0x1F)?;
        self.write_field(0x13, cf2, 0, 0x1F)
    }

    pub fn lo_cf(&mut self) -> Result<(u8, u8)> {
        Ok((
            self.read_field(0x12, 0, 0x1F)?,
            self.read_field(0x13, 0, 0x1F)?,
        ))
    }

    pub fn set_lo_lf(&mut self, value: u8) -> Result<()> {
        if value > 3 {
            return Err(Error::OutOfRange("lo match inductor code must lie in [0, 3]"));
        }
        self.write_field(0x13, value, 5, 0x60)
    }

    pub fn lo_lf(&mut self) -> Result<u8> {
        self.read_field(0x13, 5, 0x60)
    }

    pub fn set_lo_vcm(&mut self, value: u8) -> Result<()> {
        if value > 7 {
            return Err(Error::OutOfRange("lo common mode code must lie in [0, 7]"));
        }
        self.write_field(0x12, value, 5, 0xE0)
    }

    pub fn lo_vcm(&mut self) -> Result<u8> {
        self.read_field(0x12, 5, 0xE0)
    }

    pub fn set_chip_id(&mut self, value: u8) -> Result<()> {
        if value > 3 {
            return Err(Error::OutOfRange("chip id must lie in [0, 3]"));
        }
        self.write_field(0x17, value, 2, 0xC0)
    }

    pub fn chip_id(&mut self) -> Result<u8> {
        self.read_field(0x17, 2, 0xC0)
    }

    /// Raw I and Q offset DAC bytes.
    pub fn set_dc_offset(&mut self, i: u8, q: u8) -> Result<()> {
        self.write(0x0E, i)?;
        self.write(0x0F, q)
    }

    pub fn dc_offset(&mut self) -> Result<(u8, u8)> {
        Ok((self.read(0x0E)?, self.read(0x0F)?))
    }

    pub fn set_iq_gain_trim(&mut self, trim: u8) -> Result<()> {
        if trim > 63 {
            return Err(Error::OutOfRange("iq gain trim must lie in [0, 63]"));
        }
        self.write_field(0x11, trim, 2, 0xFC)
    }

    pub fn iq_gain_trim(&mut self) -> Result<u8> {
        self.read_field(0x11, 2, 0xFC)
    }

    /// 9-bit phase trim split over two registers, LSB in 0x15 bit 7.
    pub fn set_iq_phase_trim(&mut self, value: u16) -> Result<()> {
        if value > 511 {
            return Err(Error::OutOfRange("iq phase trim must lie in [0, 511]"));
        }
        self.write_field(0x15, (value & 1) as u8, 7, 0x80)?;
        self.write_field(0x14, (value >> 1) as u8, 0, 0xFF)
    }

    pub fn iq_phase_trim(&mut self) -> Result<u16> {
        Ok((self.read(0x14)? as u16) << 1 | self.read_field(0x15, 7, 0x80)? as u16)
    }

    /// (ix, iy, qx, qy) byte quadruple.
    pub fn set_hd2_trim(&mut self, values: [u8; 4]) -> Result<()> {
        self.write_quad([0x0D, 0x0C, 0x0B, 0x0A], values)
    }

    pub fn hd2_trim(&mut self) -> Result<[u8; 4]> {
        self.read_quad([0x0D, 0x0C, 0x0B, 0x0A])
    }

    pub fn set_hd3_trim(&mut self, values: [u8; 4]) -> Result<()> {
        self.write_quad([0x09, 0x08, 0x07, 0x06], values)
    }

    pub fn hd3_trim(&mut self) -> Result<[u8; 4]> {
        self.read_quad([0x09, 0x08, 0x07, 0x06])
    }

    pub fn set_im2_trim(&mut self, i: u8, q: u8) -> Result<()> {
        self.write(0x05, i)?;
        self.write(0x04, q)
    }

    pub fn im2_trim(&mut self) -> Result<(u8, u8)> {
        Ok((self.read(0x05)?, self.read(0x04)?))
    }

    pub fn set_im3_trim(&mut self, values: [u8; 4]) -> Result<()> {
        self.write_quad([0x03, 0x02, 0x01, 0x00], values)
    }

    pub fn im3_trim(&mut self) -> Result<[u8; 4]> {
        self.read_quad([0x03, 0x02, 0x01, 0x00])
    }

    pub fn set_input_im3_trim(&mut self, cc: u8, ic: u8) -> Result<()> {
        if cc > 3 || ic > 7 {
            return Err(Error::OutOfRange("input im3 trim values out of range"));
        }
        self.write_field(0x11, cc, 0, 0x03)?;
        self.write_field(0x10, ic, 0, 0x07)
    }

    pub fn input_im3_trim(&mut self) -> Result<(u8, u8)> {
        Ok((
            self.read_field(0x11, 0, 0x03)?,
            self.read_field(0x10, 0, 0x07)?,
        ))
    }

    fn write_quad(&mut self, addrs: [u8; 4], values: [u8; 4]) -> Result<()> {
        for (addr, value) in addrs.into_iter().zip(values) {
            self.write(addr, value)?;
        }
        Ok(())
    }

    fn read_quad(&mut self, addrs: [u8; 4]) -> Result<[u8; 4]> {
        let mut values = [0u8; 4];
        for (addr, value) in addrs.into_iter().zip(values.iter_mut()) {
            *value = self.read(addr)?;
        }
        Ok(values)
    }
}

fn check_access(addr: u8, position: u32) -> Result<()> {
    if addr > ADDR_MAX {
        return Err(Error::Argument("register address exceeds 0x17"));
    }
    if position > 7 {
        return Err(Error::Argument("bit position must be below 8"));
    }
    Ok(())
}

/// Access to the LTC5594 register map shared by both chip variants.
pub trait Demodulator {
    type Spi: SpiPort;

    fn regs(&mut self) -> &mut Ltc5594<Self::Spi>;
}

impl<Spi: SpiPort> Demodulator for Ltc5594<Spi> {
    type Spi = Spi;

    fn regs(&mut self) -> &mut Ltc5594<Spi> {
        self
    }
}

/// LTC5586 variant: LTC5594 register map plus RF input switch and step
/// attenuator.
pub struct Ltc5586<Spi> {
    inner: Ltc5594<Spi>,
}

impl<Spi: SpiPort> Ltc5586<Spi> {
    pub fn new(spi: Spi) -> Self {
        Self {
            inner: Ltc5594::new(spi),
        }
    }

    /// RF switch input select, ANDed with the RFSW pin by the chip.
    pub fn set_input_select(&mut self, second: bool) -> Result<()> {
        self.inner.write_field(0x17, second as u8, 0, 0x01)
    }

    pub fn input_select(&mut self) -> Result<bool> {
        Ok(self.inner.read_field(0x17, 0, 0x01)? != 0)
    }

    /// RF step attenuator in dB, [0, 31] in 1 dB steps.
    pub fn set_atten(&mut self, db: f64) -> Result<()> {
        if !(0.0..=31.0).contains(&db) {
            return Err(Error::OutOfRange("attenuation must lie in [0, 31] dB"));
        }
        self.inner.write_field(0x10, db.round() as u8, 3, 0xF8)
    }

    pub fn atten(&mut self) -> Result<f64> {
        Ok(self.inner.read_field(0x10, 3, 0xF8)? as f64)
    }

    pub fn atten_range(&self) -> Range {
        Range::new(0.0, 31.0, 1.0)
    }
}

impl<Spi: SpiPort> Demodulator for Ltc5586<Spi> {
    type Spi = Spi;

    fn regs(&mut self) -> &mut Ltc5594<Spi> {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lo_match_covers_all_bands() {
        for range in &LO_TABLE {
            let mid = (range.low_mhz + range.high_mhz) / 2.0 * 1e6;
            assert_eq!(range.value, lo_match(LoFreq::Hz(mid)).unwrap());
        }
    }

    #[test]
    fn shared_edges_resolve_to_the_first_entry() {
        // 339 MHz is the top of the first range and the bottom of the next
        assert_eq!(
            LoMatch { band: 0, cf1: 31, lf1: 3, cf2: 31 },
            lo_match(LoFreq::Hz(339e6)).unwrap()
        );
        // 1046 MHz still matches the last band 0 range, not the band 1 one
        assert_eq!(
            LoMatch { band: 0, cf1: 8, lf1: 1, cf2: 21 },
            lo_match(LoFreq::Hz(1046e6)).unwrap()
        );
    }

    #[test]
    fn bounds_are_inclusive() {
        assert_eq!(0, lo_match(LoFreq::Hz(300e6)).unwrap().band);
        assert_eq!(0, lo_match(LoFreq::Hz(9000e6)).unwrap().cf1);
        assert!(matches!(
            lo_match(LoFreq::Hz(299e6)),
            Err(Error::NoMatchingBand { .. })
        ));
        assert!(matches!(
            lo_match(LoFreq::Hz(9001e6)),
            Err(Error::NoMatchingBand { .. })
        ));
    }

    #[test]
    fn default_entry_is_mid_band() {
        assert_eq!(LO_MATCH_DEFAULT, lo_match(LoFreq::Default).unwrap());
    }
}
