//! USB output mode identities and shared descriptor plumbing.
//!
//! Each mode module owns its wire report struct, button mapping and
//! descriptor byte arrays. This module holds what they share: the mode id
//! enumeration persisted in flash, the device-descriptor builder and the
//! string-descriptor index map.

pub mod hid;
pub mod kbmouse;
pub mod switch;
pub mod xinput;

/// Emulated USB device identity, persisted by id in the settings record.
///
/// The discriminants are wire-stable: they are what `usb_output_mode`
/// stores in flash, so renumbering would silently change every user's
/// configured mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum UsbOutputMode {
    #[default]
    Hid = 0,
    XInput = 1,
    Switch = 2,
    Ps3 = 3,
    PsClassic = 4,
    Ps4 = 5,
    XboxOriginal = 6,
    XboxOne = 7,
    Xac = 8,
    KeyboardMouse = 9,
    GcAdapter = 10,
}

/// Number of mode ids (registry slots).
pub const USB_OUTPUT_MODE_COUNT: usize = 11;

impl UsbOutputMode {
    /// Decode a persisted mode byte. Unknown values yield `None`; the
    /// caller falls back to the default mode.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Hid),
            1 => Some(Self::XInput),
            2 => Some(Self::Switch),
            3 => Some(Self::Ps3),
            4 => Some(Self::PsClassic),
            5 => Some(Self::Ps4),
            6 => Some(Self::XboxOriginal),
            7 => Some(Self::XboxOne),
            8 => Some(Self::Xac),
            9 => Some(Self::KeyboardMouse),
            10 => Some(Self::GcAdapter),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// USB device identity: the numbers that differ per emulated device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceIdentity {
    pub vid: u16,
    pub pid: u16,
    pub bcd_device: u16,
    /// `bcdUSB`; `0x0110` forces full-speed-only enumeration (USB 1.1).
    pub bcd_usb: u16,
}

/// String descriptor index assignment, shared by every mode.
pub mod string_index {
    pub const LANGUAGE: u8 = 0;
    pub const MANUFACTURER: u8 = 1;
    pub const PRODUCT: u8 = 2;
    /// 12 hex characters derived from the board unique id.
    pub const SERIAL: u8 = 3;
    pub const CDC_DATA: u8 = 4;
    pub const CDC_DEBUG: u8 = 5;
}

/// Length of the serial string: 12 hex characters.
pub const SERIAL_STRING_LEN: usize = 12;

/// Derive the USB serial string from the 8-byte board unique id: the
/// first 12 uppercase hex characters.
#[must_use]
pub fn serial_from_board_id(board_id: &[u8; 8]) -> [u8; SERIAL_STRING_LEN] {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = [b'0'; SERIAL_STRING_LEN];
    for (i, slot) in out.iter_mut().enumerate() {
        let byte = board_id[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0F };
        *slot = HEX[nibble as usize];
    }
    out
}

/// Build a standard 18-byte USB device descriptor for the given identity.
///
/// String indices follow [`string_index`]: manufacturer 1, product 2,
/// serial 3. One configuration.
#[must_use]
pub const fn device_descriptor(identity: DeviceIdentity) -> [u8; 18] {
    [
        18,   // bLength
        0x01, // bDescriptorType (Device)
        (identity.bcd_usb & 0xFF) as u8,
        (identity.bcd_usb >> 8) as u8,
        0x00, // bDeviceClass (interface defined)
        0x00, // bDeviceSubClass
        0x00, // bDeviceProtocol
        64,   // bMaxPacketSize0
        (identity.vid & 0xFF) as u8,
        (identity.vid >> 8) as u8,
        (identity.pid & 0xFF) as u8,
        (identity.pid >> 8) as u8,
        (identity.bcd_device & 0xFF) as u8,
        (identity.bcd_device >> 8) as u8,
        string_index::MANUFACTURER,
        string_index::PRODUCT,
        string_index::SERIAL,
        1, // bNumConfigurations
    ]
}

/// Encode a string as a UTF-16LE string descriptor with the
/// length-prefixed header, returning the descriptor length.
///
/// Characters outside the BMP become `?`; the identity strings only use
/// Latin-1. Truncates to the buffer.
///
/// # Panics
///
/// Panics if `buf.len() < 2` (no room for the header).
pub fn encode_string_descriptor(s: &str, buf: &mut [u8]) -> usize {
    let max_chars = (buf.len().saturating_sub(2)) / 2;
    let mut total = 2;
    buf[1] = 0x03; // bDescriptorType (String)
    for (i, ch) in s.chars().take(max_chars).enumerate() {
        let code = u16::try_from(ch as u32).unwrap_or(b'?' as u16);
        buf[2 + i * 2..2 + i * 2 + 2].copy_from_slice(&code.to_le_bytes());
        total += 2;
    }
    buf[0] = total as u8;
    total
}

/// The language-id string descriptor (index 0): US English.
pub const LANGUAGE_DESCRIPTOR: [u8; 4] = [0x04, 0x03, 0x09, 0x04];
