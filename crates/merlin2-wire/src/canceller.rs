use merlin2_globals::{Error, Result};

/// Width of one canceller register in bytes.
pub const WORD_BYTES: usize = 4;
/// Highest valid register byte address.
pub const ADDR_MAX: u16 = 0x7FFC;
/// Set in the header word index to request a read instead of a write.
pub const READ_FLAG: u16 = 0x2000;

/// Converts a register byte address into the on-wire word index.
///
/// Addresses are byte addresses of 32-bit registers, so they must be
/// multiples of four and at most [`ADDR_MAX`].
pub fn word_index(addr: u16) -> Result<u16> {
    if addr % 4 != 0 {
        return Err(Error::Argument("register address must be a multiple of 4"));
    }
    if addr > ADDR_MAX {
        return Err(Error::Argument("register address exceeds 0x7ffc"));
    }
    Ok(addr / 4)
}

/// Register write command.
///
/// ```text
///              +--------------+--------------------------------+
///  Byte offset |    0 - 1     |          2 .. 2 + 4*N          |
///              +--------------+--------------------------------+
///        Field |  word index  |  N data words, 32 bit each     |
///              +--------------+--------------------------------+
/// ```
///
/// All fields are big endian. Consecutive words land in consecutive
/// registers starting at the word index.
pub struct WriteFrame {
    buf: Vec<u8>,
}

impl WriteFrame {
    pub fn new(word_index: u16, words: &[u32]) -> Self {
        let mut buf = Vec::with_capacity(2 + words.len() * WORD_BYTES);
        buf.extend_from_slice(&word_index.to_be_bytes());
        for word in words {
            buf.extend_from_slice(&word.to_be_bytes());
        }
        Self { buf }
    }

    /// Parses a frame received on the wire, e.g. by a bus simulator.
    pub fn parse(buf: Vec<u8>) -> Result<Self> {
        if buf.len() < 2 + WORD_BYTES || (buf.len() - 2) % WORD_BYTES != 0 {
            return Err(Error::Argument("malformed canceller write frame"));
        }
        let frame = Self { buf };
        if frame.word_index() & READ_FLAG != 0 {
            return Err(Error::Argument("read flag set in canceller write frame"));
        }
        Ok(frame)
    }

    pub fn word_index(&self) -> u16 {
        u16::from_be_bytes([self.buf[0], self.buf[1]])
    }

    pub fn words(&self) -> Vec<u32> {
        unpack_words(&self.buf[2..]).unwrap_or_default()
    }
}

impl From<WriteFrame> for Vec<u8> {
    fn from(frame: WriteFrame) -> Self {
        frame.buf
    }
}

/// Register read command.
///
/// ```text
///              +-------------------------+
///  Byte offset |          0 - 1          |
///              +-------------------------+
///        Field |  0x2000 OR word index   |
///              +-------------------------+
/// ```
///
/// Big endian. The response carries the requested number of 32-bit big
/// endian words starting at the word index, with no header of its own.
pub struct ReadFrame {
    buf: [u8; 2],
}

impl ReadFrame {
    pub fn new(word_index: u16) -> Self {
        Self {
            buf: (word_index | READ_FLAG).to_be_bytes(),
        }
    }

    pub fn parse(buf: &[u8]) -> Result<Self> {
        let buf: [u8; 2] = buf
            .try_into()
            .map_err(|_| Error::Argument("malformed canceller read frame"))?;
        if u16::from_be_bytes(buf) & READ_FLAG == 0 {
            return Err(Error::Argument("read flag missing in canceller read frame"));
        }
        Ok(Self { buf })
    }

    pub fn word_index(&self) -> u16 {
        u16::from_be_bytes(self.buf) & !READ_FLAG
    }
}

impl From<ReadFrame> for Vec<u8> {
    fn from(frame: ReadFrame) -> Self {
        frame.buf.to_vec()
    }
}

/// Packs words into the big endian payload layout of a read response.
pub fn pack_words(words: &[u32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(words.len() * WORD_BYTES);
    for word in words {
        buf.extend_from_slice(&word.to_be_bytes());
    }
    buf
}

/// Unpacks the payload of a read response.
pub fn unpack_words(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.len() % WORD_BYTES != 0 {
        return Err(Error::Transport(format!(
            "canceller response length {} is not a multiple of {WORD_BYTES}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(WORD_BYTES)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}
