//! Input backend implementations.
//!
//! USB-host and native console inputs plug in as external backends; the
//! UART link is the one carried here.

pub mod uart;

pub use uart::{uart_reader_task, UartInputBackend, UartPipe};
