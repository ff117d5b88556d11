//! RP2040 firmware glue for the padlink controller adapter.
//!
//! The pipeline itself lives in [`padlink_core`]; this crate supplies the
//! hardware behind its trait seams and the bring-up sequence:
//!
//! - [`flash`]: settings sector over the on-board QSPI flash, with the
//!   other core parked across erase/program
//! - [`dispatch`]: Core-1 launch, task handoff and idle loop
//! - [`reset`]: watchdog-armed reboot for USB mode changes
//! - [`usb`]: embassy-usb device wiring and the report sink bridging the
//!   synchronous Core-0 loop to the async HID writer
//! - [`input`]: the UART input backend
//! - [`chord`]: the mode-cycle maintenance chord watcher
//!
//! # Features
//!
//! - **`dev-panic`** (default): `panic-probe` (prints panic info via RTT)
//! - **`prod-panic`**: `panic-reset` (silent reboot)
//! - **`usb-host`**: reserve the PIO USB host port pins; the host driver
//!   itself plugs in as an input backend
//! - **`dual-role`**: native port device + PIO port host
//! - **`btstack`**: reserved for a Bluetooth transport

#![no_std]

#[cfg(all(feature = "dev-panic", feature = "prod-panic"))]
compile_error!("Cannot enable both `dev-panic` and `prod-panic` features - pick one panic strategy");

#[cfg(feature = "btstack")]
compile_error!("The `btstack` transport is not implemented yet");

use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::{UART1, USB};

pub mod chord;
pub mod config;
pub mod dispatch;
pub mod flash;
pub mod input;
pub mod reset;
pub mod usb;

bind_interrupts!(pub struct Irqs {
    UART1_IRQ => embassy_rp::uart::InterruptHandler<UART1>;
    USBCTRL_IRQ => embassy_rp::usb::InterruptHandler<USB>;
});
