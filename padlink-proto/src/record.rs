//! Flash settings record: byte-exact layout, framing and profile slots.
//!
//! The record is the single persisted structure of the firmware. It lives in
//! one dedicated flash sector and is only ever rewritten as a whole:
//!
//! ```text
//! [magic: u32 LE][version: u16 LE][reserved: u16]
//! [usb_output_mode: u8][active_profile_index: u8]
//! [profile slot 0][profile slot 1]
//! [crc32: u32 LE]
//! ```
//!
//! Each profile slot is:
//!
//! ```text
//! [remap: 32 bytes, src bit -> dst bit]
//! [sens_left: u8][sens_right: u8][flags: u8][rule_count: u8]
//! [4 x combo rule: [mask: u32 LE][hold_ms: u16 LE][action: u8][arg: u8]]
//! ```
//!
//! The CRC covers every byte before it. A record with bad magic, bad CRC or
//! an unknown version is treated as absent; callers fall back to
//! [`SettingsRecord::default()`]. The stored mode byte is deliberately kept
//! raw — validating it against the registered mode set is the USB device
//! manager's job.

use crate::crc::calculate_crc32;

/// "PADL" in little-endian byte order.
pub const RECORD_MAGIC: u32 = 0x4C44_4150;

/// Bump on ANY layout change, else stale sectors would parse as garbage.
pub const RECORD_VERSION: u16 = 1;

/// Number of custom profile slots persisted.
pub const PROFILE_SLOTS: usize = 2;

/// Combo rules per custom profile.
pub const COMBO_RULES: usize = 4;

/// Remap table entries (one per possible button bit).
pub const REMAP_ENTRIES: usize = 32;

const HEADER_SIZE: usize = 4 + 2 + 2 + 1 + 1;
const RULE_SIZE: usize = 4 + 2 + 1 + 1;
const SLOT_SIZE: usize = REMAP_ENTRIES + 4 + COMBO_RULES * RULE_SIZE;

/// Total serialized record size in bytes.
pub const RECORD_SIZE: usize = HEADER_SIZE + PROFILE_SLOTS * SLOT_SIZE + 4;

/// Default hold time for profile-switch combos, in milliseconds.
pub const DEFAULT_COMBO_HOLD_MS: u16 = 2000;

/// Profile behavior flags.
pub mod flags {
    pub const SWAP_STICKS: u8 = 1 << 0;
    pub const INVERT_LY: u8 = 1 << 1;
    pub const INVERT_RY: u8 = 1 << 2;
}

/// Error type for record encode/decode operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordError {
    /// The buffer is too small to hold or contain a record.
    BufferTooSmall,
    /// Magic number mismatch (sector never written or wrong content).
    BadMagic,
    /// Unknown layout version.
    BadVersion,
    /// Checksum mismatch (torn or corrupted write).
    BadCrc,
}

/// Action performed when a combo rule fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ComboAction {
    /// Slot unused.
    #[default]
    None,
    /// Press the button with this bit index for as long as the combo holds.
    Synthesize(u8),
    /// Switch the active profile to this index.
    SwitchProfile(u8),
}

impl ComboAction {
    const TAG_NONE: u8 = 0;
    const TAG_SYNTHESIZE: u8 = 1;
    const TAG_SWITCH_PROFILE: u8 = 2;

    fn to_wire(self) -> (u8, u8) {
        match self {
            ComboAction::None => (Self::TAG_NONE, 0),
            ComboAction::Synthesize(bit) => (Self::TAG_SYNTHESIZE, bit),
            ComboAction::SwitchProfile(idx) => (Self::TAG_SWITCH_PROFILE, idx),
        }
    }

    fn from_wire(action: u8, arg: u8) -> Self {
        match action {
            Self::TAG_SYNTHESIZE => ComboAction::Synthesize(arg),
            Self::TAG_SWITCH_PROFILE => ComboAction::SwitchProfile(arg),
            _ => ComboAction::None,
        }
    }
}

/// One combo rule: a button chord held for a dwell time triggers an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ComboRule {
    /// Button bits that must all be held (raw [`Buttons`](crate::Buttons) mask).
    pub mask: u32,
    /// Continuous hold time before the rule fires.
    pub hold_ms: u16,
    pub action: ComboAction,
}

impl Default for ComboRule {
    fn default() -> Self {
        Self {
            mask: 0,
            hold_ms: DEFAULT_COMBO_HOLD_MS,
            action: ComboAction::None,
        }
    }
}

/// A custom profile: remap table, stick sensitivity, flags and combo rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CustomProfile {
    /// src bit index -> dst bit index. Identity by default.
    pub remap: [u8; REMAP_ENTRIES],
    /// Left stick sensitivity in percent (100 = unscaled).
    pub sens_left: u8,
    /// Right stick sensitivity in percent.
    pub sens_right: u8,
    /// Bitwise OR of [`flags`] values.
    pub flags: u8,
    /// Number of valid entries in `rules`.
    pub rule_count: u8,
    pub rules: [ComboRule; COMBO_RULES],
}

impl CustomProfile {
    /// Identity profile: no remap, 100% sensitivity, no flags, no combos.
    #[must_use]
    pub fn identity() -> Self {
        let mut remap = [0u8; REMAP_ENTRIES];
        for (i, slot) in remap.iter_mut().enumerate() {
            *slot = i as u8;
        }
        Self {
            remap,
            sens_left: 100,
            sens_right: 100,
            flags: 0,
            rule_count: 0,
            rules: [ComboRule::default(); COMBO_RULES],
        }
    }

    /// Active combo rules.
    #[must_use]
    pub fn active_rules(&self) -> &[ComboRule] {
        let n = (self.rule_count as usize).min(COMBO_RULES);
        &self.rules[..n]
    }

    fn serialize_into(&self, buf: &mut [u8]) {
        buf[..REMAP_ENTRIES].copy_from_slice(&self.remap);
        let mut pos = REMAP_ENTRIES;
        buf[pos] = self.sens_left;
        buf[pos + 1] = self.sens_right;
        buf[pos + 2] = self.flags;
        buf[pos + 3] = self.rule_count.min(COMBO_RULES as u8);
        pos += 4;
        for rule in &self.rules {
            buf[pos..pos + 4].copy_from_slice(&rule.mask.to_le_bytes());
            buf[pos + 4..pos + 6].copy_from_slice(&rule.hold_ms.to_le_bytes());
            let (action, arg) = rule.action.to_wire();
            buf[pos + 6] = action;
            buf[pos + 7] = arg;
            pos += RULE_SIZE;
        }
    }

    fn parse_from(buf: &[u8]) -> Self {
        let mut profile = Self::identity();
        profile.remap.copy_from_slice(&buf[..REMAP_ENTRIES]);
        let mut pos = REMAP_ENTRIES;
        profile.sens_left = buf[pos];
        profile.sens_right = buf[pos + 1];
        profile.flags = buf[pos + 2];
        profile.rule_count = buf[pos + 3].min(COMBO_RULES as u8);
        pos += 4;
        for rule in profile.rules.iter_mut() {
            rule.mask = u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]]);
            rule.hold_ms = u16::from_le_bytes([buf[pos + 4], buf[pos + 5]]);
            rule.action = ComboAction::from_wire(buf[pos + 6], buf[pos + 7]);
            pos += RULE_SIZE;
        }
        profile
    }
}

impl Default for CustomProfile {
    fn default() -> Self {
        Self::identity()
    }
}

/// The persisted settings record.
///
/// `usb_output_mode` is kept as the raw stored byte; the USB device manager
/// validates it against its registry and falls back to the default mode when
/// it does not resolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SettingsRecord {
    pub usb_output_mode: u8,
    pub active_profile_index: u8,
    pub profiles: [CustomProfile; PROFILE_SLOTS],
}

impl Default for SettingsRecord {
    fn default() -> Self {
        Self {
            usb_output_mode: 0, // HID
            active_profile_index: 0,
            profiles: [CustomProfile::identity(); PROFILE_SLOTS],
        }
    }
}

impl SettingsRecord {
    /// Serialize the record, including magic, version and CRC trailer.
    ///
    /// Returns the number of bytes written (always [`RECORD_SIZE`]).
    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize, RecordError> {
        if buf.len() < RECORD_SIZE {
            return Err(RecordError::BufferTooSmall);
        }
        buf[0..4].copy_from_slice(&RECORD_MAGIC.to_le_bytes());
        buf[4..6].copy_from_slice(&RECORD_VERSION.to_le_bytes());
        buf[6..8].copy_from_slice(&[0, 0]);
        buf[8] = self.usb_output_mode;
        buf[9] = self.active_profile_index;
        let mut pos = HEADER_SIZE;
        for profile in &self.profiles {
            profile.serialize_into(&mut buf[pos..pos + SLOT_SIZE]);
            pos += SLOT_SIZE;
        }
        let crc = calculate_crc32(&buf[..pos]);
        buf[pos..pos + 4].copy_from_slice(&crc.to_le_bytes());
        Ok(RECORD_SIZE)
    }

    /// Parse a record from a sector image, verifying magic, version and CRC.
    pub fn parse(buf: &[u8]) -> Result<Self, RecordError> {
        if buf.len() < RECORD_SIZE {
            return Err(RecordError::BufferTooSmall);
        }
        let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if magic != RECORD_MAGIC {
            return Err(RecordError::BadMagic);
        }
        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version != RECORD_VERSION {
            return Err(RecordError::BadVersion);
        }
        let crc_pos = RECORD_SIZE - 4;
        let stored = u32::from_le_bytes([
            buf[crc_pos],
            buf[crc_pos + 1],
            buf[crc_pos + 2],
            buf[crc_pos + 3],
        ]);
        if calculate_crc32(&buf[..crc_pos]) != stored {
            return Err(RecordError::BadCrc);
        }

        let mut record = Self {
            usb_output_mode: buf[8],
            active_profile_index: buf[9],
            ..Self::default()
        };
        let mut pos = HEADER_SIZE;
        for profile in record.profiles.iter_mut() {
            *profile = CustomProfile::parse_from(&buf[pos..pos + SLOT_SIZE]);
            pos += SLOT_SIZE;
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> SettingsRecord {
        let mut record = SettingsRecord {
            usb_output_mode: 2, // Switch
            active_profile_index: 1,
            ..SettingsRecord::default()
        };
        record.profiles[0].remap[4] = 7; // B1 -> B4
        record.profiles[0].sens_left = 80;
        record.profiles[0].flags = flags::INVERT_LY | flags::SWAP_STICKS;
        record.profiles[0].rule_count = 1;
        record.profiles[0].rules[0] = ComboRule {
            mask: 0x0000_3000, // S1 | S2
            hold_ms: 2000,
            action: ComboAction::SwitchProfile(1),
        };
        record
    }

    #[test]
    fn test_roundtrip() {
        let record = sample_record();
        let mut buf = [0u8; RECORD_SIZE];
        let len = record.serialize(&mut buf).unwrap();
        assert_eq!(len, RECORD_SIZE);
        let parsed = SettingsRecord::parse(&buf).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_header_layout_is_byte_exact() {
        let record = sample_record();
        let mut buf = [0u8; RECORD_SIZE];
        record.serialize(&mut buf).unwrap();
        assert_eq!(&buf[0..4], &RECORD_MAGIC.to_le_bytes());
        assert_eq!(&buf[4..6], &RECORD_VERSION.to_le_bytes());
        assert_eq!(buf[8], 2);
        assert_eq!(buf[9], 1);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut buf = [0u8; RECORD_SIZE];
        sample_record().serialize(&mut buf).unwrap();
        buf[0] ^= 0xFF;
        assert_eq!(SettingsRecord::parse(&buf), Err(RecordError::BadMagic));
    }

    #[test]
    fn test_corrupt_payload_rejected() {
        let mut buf = [0u8; RECORD_SIZE];
        sample_record().serialize(&mut buf).unwrap();
        buf[HEADER_SIZE + 3] ^= 0x01;
        assert_eq!(SettingsRecord::parse(&buf), Err(RecordError::BadCrc));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut buf = [0u8; RECORD_SIZE];
        sample_record().serialize(&mut buf).unwrap();
        buf[4] = 0xEE;
        // CRC still matches the payload, so recompute it for the bumped version.
        let crc_pos = RECORD_SIZE - 4;
        let crc = calculate_crc32(&buf[..crc_pos]);
        buf[crc_pos..].copy_from_slice(&crc.to_le_bytes());
        assert_eq!(SettingsRecord::parse(&buf), Err(RecordError::BadVersion));
    }

    #[test]
    fn test_erased_sector_reads_as_bad_magic() {
        let buf = [0xFFu8; RECORD_SIZE];
        assert_eq!(SettingsRecord::parse(&buf), Err(RecordError::BadMagic));
    }

    #[test]
    fn test_rule_count_clamped() {
        let mut record = SettingsRecord::default();
        record.profiles[0].rule_count = 200;
        let mut buf = [0u8; RECORD_SIZE];
        record.serialize(&mut buf).unwrap();
        let parsed = SettingsRecord::parse(&buf).unwrap();
        assert_eq!(parsed.profiles[0].rule_count as usize, COMBO_RULES);
    }
}
