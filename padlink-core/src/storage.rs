//! Settings store: the flash-resident record and its commit policy.
//!
//! One dedicated sector holds one [`SettingsRecord`]. All writes go
//! through [`SectorFlash::erase_and_program`], the multicore-safe
//! primitive that parks the other core across the erase/program interval
//! (tens of milliseconds — the only blocking the main loop tolerates).
//!
//! Two commit paths:
//! - [`SettingsStore::save_now`]: synchronous, verified by read-back.
//!   Used by the USB mode-change protocol, which must not reboot into a
//!   sector that did not take the write.
//! - [`SettingsStore::mark_dirty`] + [`SettingsStore::task`]: deferred
//!   commit a short settle time later, used by profile hotkey switches so
//!   a combo does not stall the 1 kHz loop mid-game.

use padlink_proto::{RecordError, SettingsRecord, RECORD_SIZE};

/// Delay between marking dirty and the deferred commit.
const COMMIT_SETTLE_MS: u32 = 500;

/// Error type for settings persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Flash erase or program failed.
    Io,
    /// Read-back after programming did not match.
    Verify,
    /// Record did not fit the staging buffer.
    Encode,
}

impl From<RecordError> for StorageError {
    fn from(_: RecordError) -> Self {
        StorageError::Encode
    }
}

/// The one-sector flash seam.
///
/// Implementations must make `erase_and_program` safe to call while the
/// other core executes from flash (the rp2040 backend parks it).
pub trait SectorFlash {
    /// Read the start of the sector into `buf`.
    fn read(&mut self, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Erase the sector and program `data` at its start.
    fn erase_and_program(&mut self, data: &[u8]) -> Result<(), StorageError>;
}

/// In-memory copy of the settings with explicit commit.
pub struct SettingsStore<F: SectorFlash> {
    flash: F,
    record: SettingsRecord,
    dirty_since_ms: Option<u32>,
}

impl<F: SectorFlash> SettingsStore<F> {
    /// Create the store and load the record; falls back to defaults when
    /// the sector is absent or corrupt.
    ///
    /// Returns the store and whether a valid record was found.
    pub fn load(flash: F) -> (Self, bool) {
        let mut store = Self {
            flash,
            record: SettingsRecord::default(),
            dirty_since_ms: None,
        };
        let loaded = store.reload();
        (store, loaded)
    }

    /// Re-read the sector. `false` (and defaults) on bad magic/CRC.
    pub fn reload(&mut self) -> bool {
        let mut buf = [0u8; RECORD_SIZE];
        if self.flash.read(&mut buf).is_err() {
            self.record = SettingsRecord::default();
            return false;
        }
        match SettingsRecord::parse(&buf) {
            Ok(record) => {
                self.record = record;
                true
            }
            Err(_) => {
                self.record = SettingsRecord::default();
                false
            }
        }
    }

    #[must_use]
    pub fn record(&self) -> &SettingsRecord {
        &self.record
    }

    #[must_use]
    pub fn record_mut(&mut self) -> &mut SettingsRecord {
        &mut self.record
    }

    /// Schedule a deferred commit of the current record.
    pub fn mark_dirty(&mut self, now_ms: u32) {
        if self.dirty_since_ms.is_none() {
            self.dirty_since_ms = Some(now_ms);
        }
    }

    /// Synchronous commit: serialize, erase+program, read back and verify.
    /// Complete before return — a subsequent [`reload`](Self::reload) sees
    /// the new record.
    pub fn save_now(&mut self) -> Result<(), StorageError> {
        let mut buf = [0u8; RECORD_SIZE];
        self.record.serialize(&mut buf)?;
        self.flash
            .erase_and_program(&buf)
            .map_err(|_| StorageError::Io)?;

        let mut verify = [0u8; RECORD_SIZE];
        self.flash.read(&mut verify)?;
        if verify != buf {
            return Err(StorageError::Verify);
        }
        self.dirty_since_ms = None;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Deferred-commit tick. Failures stay dirty and retry next settle.
    pub fn task(&mut self, now_ms: u32) {
        if let Some(since) = self.dirty_since_ms {
            if now_ms.wrapping_sub(since) >= COMMIT_SETTLE_MS && self.save_now().is_err() {
                self.dirty_since_ms = Some(now_ms);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// In-memory sector for host tests.
    pub struct MemoryFlash {
        pub sector: [u8; RECORD_SIZE],
        pub fail_writes: bool,
        pub writes: u32,
    }

    impl MemoryFlash {
        pub fn erased() -> Self {
            Self {
                sector: [0xFF; RECORD_SIZE],
                fail_writes: false,
                writes: 0,
            }
        }
    }

    impl SectorFlash for MemoryFlash {
        fn read(&mut self, buf: &mut [u8]) -> Result<(), StorageError> {
            let n = buf.len().min(self.sector.len());
            buf[..n].copy_from_slice(&self.sector[..n]);
            Ok(())
        }

        fn erase_and_program(&mut self, data: &[u8]) -> Result<(), StorageError> {
            if self.fail_writes {
                return Err(StorageError::Io);
            }
            self.writes += 1;
            self.sector = [0xFF; RECORD_SIZE];
            let n = data.len().min(self.sector.len());
            self.sector[..n].copy_from_slice(&data[..n]);
            Ok(())
        }
    }
}
