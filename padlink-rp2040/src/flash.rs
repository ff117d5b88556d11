//! Settings sector over the on-board QSPI flash.
//!
//! The record lives in the last erase sector of flash, far above any
//! firmware image. Erase/program go through embassy-rp's blocking flash
//! ops, which pause the other core via the intercore FIFO while XIP is
//! unavailable — the chip vendor's lockout protocol, assumed correct.

use embassy_rp::flash::{Async, Flash, ERASE_SIZE};
use embassy_rp::peripherals::FLASH;
use padlink_core::{SectorFlash, StorageError};
use padlink_proto::RECORD_SIZE;

use crate::config::FLASH_SIZE;

/// Byte offset of the settings sector: the last sector of flash.
pub const SETTINGS_OFFSET: u32 = (FLASH_SIZE - ERASE_SIZE) as u32;

/// QSPI page size: program granularity.
const PAGE_SIZE: usize = 256;

/// Record image padded to whole pages.
const PROGRAM_SIZE: usize = RECORD_SIZE.next_multiple_of(PAGE_SIZE);

pub struct SettingsFlash<'d> {
    flash: Flash<'d, FLASH, Async, FLASH_SIZE>,
}

impl<'d> SettingsFlash<'d> {
    #[must_use]
    pub fn new(flash: Flash<'d, FLASH, Async, FLASH_SIZE>) -> Self {
        Self { flash }
    }

    /// The 8-byte board unique id (from the flash chip).
    pub fn board_id(&mut self) -> [u8; 8] {
        let mut id = [0u8; 8];
        if self.flash.blocking_unique_id(&mut id).is_err() {
            defmt::warn!("flash unique id unavailable, serial falls back to zero");
        }
        id
    }
}

impl SectorFlash for SettingsFlash<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<(), StorageError> {
        self.flash
            .blocking_read(SETTINGS_OFFSET, buf)
            .map_err(|_| StorageError::Io)
    }

    fn erase_and_program(&mut self, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > PROGRAM_SIZE {
            return Err(StorageError::Encode);
        }

        let mut image = [0xFFu8; PROGRAM_SIZE];
        image[..data.len()].copy_from_slice(data);

        self.flash
            .blocking_erase(SETTINGS_OFFSET, SETTINGS_OFFSET + ERASE_SIZE as u32)
            .map_err(|_| StorageError::Io)?;
        self.flash
            .blocking_write(SETTINGS_OFFSET, &image)
            .map_err(|_| StorageError::Io)
    }
}
