//! CRC-32 checksum for the flash settings frame.
//!
//! Uses CRC-32/ISO-HDLC (the common "CRC32") with a lookup table.

use crc::{Crc, CRC_32_ISO_HDLC};

/// CRC-32/ISO-HDLC calculator.
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Calculate the CRC-32 checksum of a byte slice.
#[inline]
#[must_use]
pub fn calculate_crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}
