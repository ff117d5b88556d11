//! Wire-level data model for the padlink controller firmware.
//!
//! This crate defines everything that crosses a wire or a flash sector,
//! without any platform dependency. It can be used both in embedded
//! `no_std` environments and on host for testing.
//!
//! # Overview
//!
//! - [`types`]: the normalized event model ([`InputEvent`], [`Buttons`],
//!   [`ProfileOutput`])
//! - [`hat`]: d-pad to HID hat-switch encoding
//! - [`record`]: the persisted settings record ([`SettingsRecord`],
//!   [`CustomProfile`], combo rules) with magic/version/CRC framing
//! - [`crc`]: CRC-32 checksum used by the record frame
//! - [`modes`]: per-mode USB wire formats and descriptors
//!   ([`UsbOutputMode`], Switch/XInput/HID/KeyboardMouse reports)
//! - [`serial`]: binary frame codec for UART-attached controllers
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting (for embedded logging)
//!
//! # No-std Support
//!
//! This crate is `#![no_std]` by default and uses no heap allocations.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod crc;
pub mod hat;
pub mod modes;
pub mod record;
pub mod serial;
pub mod types;

// Re-export main types at crate root
pub use hat::encode_hat;
pub use modes::{
    serial_from_board_id, DeviceIdentity, UsbOutputMode, SERIAL_STRING_LEN, USB_OUTPUT_MODE_COUNT,
};
pub use record::{
    ComboAction, ComboRule, CustomProfile, RecordError, SettingsRecord, DEFAULT_COMBO_HOLD_MS,
    RECORD_SIZE,
};
pub use types::{Buttons, InputEvent, ProfileOutput, AXIS_CENTER, MAX_PLAYERS, TRIGGER_REST};
