use merlin2_globals::{Error, Result};

/// Largest magnitude a tap component can hold.
pub const MAG_MAX: i16 = 255;

const SIGN_BIT: u32 = 0x100;
const COMPONENT_MASK: u32 = 0x1FF;
const Q_SHIFT: u32 = 9;
const DISCONNECT_SHIFT: u32 = 28;

/// One FIR tap coefficient in its hardware register form.
///
/// ```text
///      +----------+----+-----------+---------+---------+
///  Bit | 31 .. 29 | 28 | 27 .. 18  | 17 .. 9 | 8 .. 0  |
///      +----------+----+-----------+---------+---------+
///      | reserved | dc | reserved  |    Q    |    I    |
///      +----------+----+-----------+---------+---------+
/// ```
///
/// Each component is sign-magnitude, not two's complement: a negative
/// value `-m` is stored as `0x100 | m`. The encoder never emits the
/// degenerate negative zero `0x100`, but the decoder accepts it and maps
/// it to 0. Bit 28 disconnects the tap from the delay line regardless of
/// its coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapWord {
    i: i16,
    q: i16,
    disconnect: bool,
}

impl TapWord {
    pub const ZERO: Self = Self {
        i: 0,
        q: 0,
        disconnect: false,
    };

    /// Components must lie in `[-255, 255]`.
    pub fn new(i: i16, q: i16, disconnect: bool) -> Result<Self> {
        if i.abs() > MAG_MAX || q.abs() > MAG_MAX {
            return Err(Error::OutOfRange("tap component magnitude exceeds 255"));
        }
        Ok(Self { i, q, disconnect })
    }

    pub fn i(&self) -> i16 {
        self.i
    }

    pub fn q(&self) -> i16 {
        self.q
    }

    pub fn disconnect(&self) -> bool {
        self.disconnect
    }

    pub fn with_disconnect(self, disconnect: bool) -> Self {
        Self { disconnect, ..self }
    }

    pub fn pack(&self) -> u32 {
        encode_component(self.i)
            | encode_component(self.q) << Q_SHIFT
            | (self.disconnect as u32) << DISCONNECT_SHIFT
    }

    pub fn unpack(word: u32) -> Self {
        Self {
            i: decode_component(word & COMPONENT_MASK),
            q: decode_component(word >> Q_SHIFT & COMPONENT_MASK),
            disconnect: word >> DISCONNECT_SHIFT & 1 != 0,
        }
    }
}

fn encode_component(value: i16) -> u32 {
    if value < 0 {
        SIGN_BIT | (-value) as u32
    } else {
        value as u32
    }
}

fn decode_component(bits: u32) -> i16 {
    if bits & SIGN_BIT != 0 {
        -((bits & !SIGN_BIT) as i16)
    } else {
        bits as i16
    }
}
