#![allow(dead_code)]

use libmerlin2_rs::hardware::merlin2b::Merlin2b;
use libmerlin2_rs::interface::{GpioPin, SpiPort};
use merlin2_globals::Result;
use merlin2_wire::{canceller, downconverter};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Once;

pub fn logging_init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

/// Simulated canceller register file behind the 32-bit SPI framing.
///
/// Clones share the register file, so a test can keep a handle for
/// peeking after moving the port into a driver.
#[derive(Clone)]
pub struct SimCanceller {
    regs: Rc<RefCell<HashMap<u16, u32>>>,
}

impl SimCanceller {
    pub fn new() -> Self {
        let mut regs = HashMap::new();
        // identity words of the three internal SPI slaves
        regs.insert(0x0000, 0xABCD0100);
        regs.insert(0x1000, 0x12340101);
        regs.insert(0x3000, 0x9ABC0103);
        Self {
            regs: Rc::new(RefCell::new(regs)),
        }
    }

    /// Empty register file, answers every probe read with zero.
    pub fn blank() -> Self {
        Self {
            regs: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    pub fn peek(&self, addr: u16) -> u32 {
        *self.regs.borrow().get(&addr).unwrap_or(&0)
    }

    pub fn poke(&self, addr: u16, value: u32) {
        self.regs.borrow_mut().insert(addr, value);
    }
}

impl SpiPort for SimCanceller {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let frame = canceller::WriteFrame::parse(data.to_vec())?;
        let base = frame.word_index();
        let mut regs = self.regs.borrow_mut();
        for (offset, word) in frame.words().into_iter().enumerate() {
            regs.insert((base + offset as u16) * 4, word);
        }
        Ok(())
    }

    fn query(&mut self, command: &[u8], response_len: usize) -> Result<Vec<u8>> {
        let frame = canceller::ReadFrame::parse(command)?;
        let base = frame.word_index();
        let regs = self.regs.borrow();
        let words: Vec<u32> = (0..response_len / canceller::WORD_BYTES)
            .map(|offset| *regs.get(&((base + offset as u16) * 4)).unwrap_or(&0))
            .collect();
        Ok(canceller::pack_words(&words))
    }
}

/// Simulated GPIO output line counting rising edges.
#[derive(Clone, Default)]
pub struct SimPin {
    level: Rc<Cell<bool>>,
    rising_edges: Rc<Cell<usize>>,
}

impl SimPin {
    pub fn level(&self) -> bool {
        self.level.get()
    }

    pub fn rising_edges(&self) -> usize {
        self.rising_edges.get()
    }
}

impl GpioPin for SimPin {
    fn set(&mut self, level: bool) -> Result<()> {
        if level && !self.level.get() {
            self.rising_edges.set(self.rising_edges.get() + 1);
        }
        self.level.set(level);
        Ok(())
    }

    fn get(&mut self) -> Result<bool> {
        Ok(self.level.get())
    }
}

/// Simulated LTC55xx register file behind the 8-bit SPI framing.
///
/// Register 0x16 reads back the fixed status value; writing its reset bit
/// clears the register file.
#[derive(Clone)]
pub struct SimDownconverter {
    regs: Rc<RefCell<[u8; 0x18]>>,
    status: u8,
}

impl SimDownconverter {
    pub fn new() -> Self {
        Self::with_status(0xF0)
    }

    /// A chip answering the probe with the wrong status byte.
    pub fn with_status(status: u8) -> Self {
        Self {
            regs: Rc::new(RefCell::new([0u8; 0x18])),
            status,
        }
    }

    pub fn peek(&self, addr: u8) -> u8 {
        self.regs.borrow()[addr as usize]
    }
}

impl SpiPort for SimDownconverter {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let frame = downconverter::WriteFrame::parse(data)?;
        if frame.addr() == 0x16 {
            if frame.data() & 0x08 != 0 {
                *self.regs.borrow_mut() = [0u8; 0x18];
            }
        } else {
            self.regs.borrow_mut()[frame.addr() as usize] = frame.data();
        }
        Ok(())
    }

    fn query(&mut self, command: &[u8], response_len: usize) -> Result<Vec<u8>> {
        let frame = downconverter::ReadFrame::parse(command)?;
        let byte = if frame.addr() == 0x16 {
            self.status
        } else {
            self.regs.borrow()[frame.addr() as usize]
        };
        Ok(vec![byte; response_len])
    }
}

/// A canceller driver over fresh sims, with handles to the register file
/// and the APLS pin.
pub fn sim_canceller() -> (Merlin2b<SimCanceller, SimPin>, SimCanceller, SimPin) {
    let bus = SimCanceller::new();
    let resetn = SimPin::default();
    let apls = SimPin::default();
    let device = Merlin2b::new(bus.clone(), resetn, apls.clone());
    (device, bus, apls)
}
