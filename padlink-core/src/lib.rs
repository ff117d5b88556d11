//! Platform-agnostic pipeline of the padlink controller firmware.
//!
//! Inputs publish normalized events to the [`router`]; the active output
//! buffers them (latest wins), runs them through the [`profile`] engine
//! and emits protocol reports. Feedback flows the other way: rumble and
//! LED state pulled from the active output and pushed to inputs that can
//! act on it.
//!
//! # Overview
//!
//! - [`router`]: per-target taps, synchronous publish
//! - [`interface`]: input/output backend traits and the app contract
//! - [`profile`]: remapping, calibration and combo hotkeys
//! - [`usbd`]: USB device mode registry, manager and built-in modes
//! - [`players`]: player slots and the LED service
//! - [`feedback`]: host feedback plane
//! - [`storage`]: flash-resident settings store
//! - [`sched`]: Core-0 loop order and Core-1 task discovery
//!
//! Everything hardware-shaped sits behind a trait
//! ([`storage::SectorFlash`], [`usbd::ReportSink`],
//! [`usbd::manager::SystemReset`], [`players::LedDriver`]), so the whole
//! pipeline runs and tests on the host.
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

pub mod feedback;
pub mod interface;
pub mod players;
pub mod profile;
pub mod router;
pub mod sched;
pub mod storage;
pub mod usbd;

// Re-export main types at crate root
pub use feedback::{FeedbackPlane, OutputFeedback};
pub use interface::{App, InputBackend, NullApp, OutputBackend, OutputTarget};
pub use players::{LedDriver, LedService, PlayerManager};
pub use profile::{BuiltinProfile, ProfileEngine, PROFILE_COUNT};
pub use router::{EventSink, Router};
pub use sched::{find_core1_task, run_once, Services};
pub use storage::{SectorFlash, SettingsStore, StorageError};
pub use usbd::manager::{ModeChangeError, SystemReset, UsbdManager, MODE_CHANGE_RESET_MS};
pub use usbd::output::UsbDeviceOutput;
pub use usbd::{ClassDriver, ModeRegistry, ModeStrings, PendingEvents, ReportSink, UsbSpeed, UsbdMode};

// Re-export the wire-level crate so firmware only needs one dependency.
pub use padlink_proto as proto;
