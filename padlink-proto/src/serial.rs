//! Serial link frame codec for UART-attached controllers.
//!
//! Binary, fixed-size frames with a CRC-8/SMBUS trailer:
//!
//! ```text
//! [0xA5][player][buttons: u32 LE][lx][ly][rx][ry][l2][r2][crc8]
//! ```
//!
//! The checksum covers everything between the sync byte and the trailer.
//! The parser hunts for sync byte-by-byte, so it resynchronizes after
//! line noise at the cost of at most one frame.

use crc::{Crc, CRC_8_SMBUS};

use crate::types::{Buttons, InputEvent};

const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// Frame sync byte.
pub const FRAME_SYNC: u8 = 0xA5;

/// Total frame size in bytes.
pub const FRAME_SIZE: usize = 13;

/// Error type for frame decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// First byte is not [`FRAME_SYNC`].
    BadSync,
    /// Trailer does not match the payload.
    BadCrc,
    /// Fewer than [`FRAME_SIZE`] bytes.
    Truncated,
}

/// Serialize an event into a frame buffer.
///
/// Motion/pressure data does not travel over the serial link.
pub fn encode_frame(event: &InputEvent, buf: &mut [u8; FRAME_SIZE]) {
    buf[0] = FRAME_SYNC;
    buf[1] = event.player_index;
    buf[2..6].copy_from_slice(&event.buttons.raw().to_le_bytes());
    buf[6] = event.lx;
    buf[7] = event.ly;
    buf[8] = event.rx;
    buf[9] = event.ry;
    buf[10] = event.l2;
    buf[11] = event.r2;
    buf[12] = CRC8.checksum(&buf[1..12]);
}

/// Decode one complete frame.
pub fn decode_frame(buf: &[u8]) -> Result<InputEvent, FrameError> {
    if buf.len() < FRAME_SIZE {
        return Err(FrameError::Truncated);
    }
    if buf[0] != FRAME_SYNC {
        return Err(FrameError::BadSync);
    }
    if CRC8.checksum(&buf[1..12]) != buf[12] {
        return Err(FrameError::BadCrc);
    }

    let mut event = InputEvent::neutral(buf[1]);
    event.buttons = Buttons(u32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]));
    event.lx = buf[6];
    event.ly = buf[7];
    event.rx = buf[8];
    event.ry = buf[9];
    event.l2 = buf[10];
    event.r2 = buf[11];
    Ok(event)
}

/// Byte-at-a-time frame assembler with sync hunting.
pub struct FrameParser {
    buf: [u8; FRAME_SIZE],
    len: usize,
}

impl FrameParser {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buf: [0; FRAME_SIZE],
            len: 0,
        }
    }

    /// Feed one byte; returns a decoded event when a frame completes.
    ///
    /// A CRC failure discards the frame and restarts the sync hunt.
    pub fn push(&mut self, byte: u8) -> Option<InputEvent> {
        if self.len == 0 && byte != FRAME_SYNC {
            return None;
        }
        self.buf[self.len] = byte;
        self.len += 1;
        if self.len < FRAME_SIZE {
            return None;
        }
        self.len = 0;
        decode_frame(&self.buf).ok()
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}
