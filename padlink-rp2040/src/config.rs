//! Board configuration: pins, flash layout, loop timing.

/// Total QSPI flash size (Pico and most RP2040 boards carry 2 MiB).
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

/// UART input link.
pub const UART_BAUD: u32 = 115_200;
// UART1: GPIO 8 = TX, GPIO 9 = RX (wired in main)

/// On-board LED (player LED fallback).
pub const LED_PIN: u8 = 25;

/// PIO USB host port D+/D- (D- must be D+ + 1).
///
/// Only reserved with the `usb-host` feature; override per board here.
#[cfg(feature = "usb-host")]
pub const PIO_USB_DP_PIN: u8 = 6;
#[cfg(feature = "usb-host")]
pub const PIO_USB_DM_PIN: u8 = 7;

/// Target main-loop cadence: one iteration per millisecond sustains
/// 1 kHz polling.
pub const LOOP_INTERVAL_US: u64 = 1000;
