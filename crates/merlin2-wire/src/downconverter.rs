use merlin2_globals::{Error, Result};

/// Highest valid register address on the downconverter bus.
pub const ADDR_MAX: u8 = 0x17;
/// Set in the command byte to request a read instead of a write.
pub const READ_FLAG: u8 = 0x80;

/// Register write command.
///
/// ```text
///              +-----------+--------+
///  Byte offset |     0     |   1    |
///              +-----------+--------+
///        Field |  address  |  data  |
///              +-----------+--------+
/// ```
pub struct WriteFrame {
    buf: [u8; 2],
}

impl WriteFrame {
    pub fn new(addr: u8, data: u8) -> Self {
        Self { buf: [addr, data] }
    }

    pub fn parse(buf: &[u8]) -> Result<Self> {
        let buf: [u8; 2] = buf
            .try_into()
            .map_err(|_| Error::Argument("malformed downconverter write frame"))?;
        if buf[0] & READ_FLAG != 0 {
            return Err(Error::Argument("read flag set in downconverter write frame"));
        }
        Ok(Self { buf })
    }

    pub fn addr(&self) -> u8 {
        self.buf[0]
    }

    pub fn data(&self) -> u8 {
        self.buf[1]
    }
}

impl From<WriteFrame> for Vec<u8> {
    fn from(frame: WriteFrame) -> Self {
        frame.buf.to_vec()
    }
}

/// Register read command.
///
/// ```text
///              +--------------------+
///  Byte offset |         0          |
///              +--------------------+
///        Field |  0x80 OR address   |
///              +--------------------+
/// ```
///
/// The response is the single register byte.
pub struct ReadFrame {
    buf: [u8; 1],
}

impl ReadFrame {
    pub fn new(addr: u8) -> Self {
        Self {
            buf: [READ_FLAG | addr],
        }
    }

    pub fn parse(buf: &[u8]) -> Result<Self> {
        let buf: [u8; 1] = buf
            .try_into()
            .map_err(|_| Error::Argument("malformed downconverter read frame"))?;
        if buf[0] & READ_FLAG == 0 {
            return Err(Error::Argument(
                "read flag missing in downconverter read frame",
            ));
        }
        Ok(Self { buf })
    }

    pub fn addr(&self) -> u8 {
        self.buf[0] & !READ_FLAG
    }
}

impl From<ReadFrame> for Vec<u8> {
    fn from(frame: ReadFrame) -> Self {
        frame.buf.to_vec()
    }
}
