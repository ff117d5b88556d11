//! UART input backend: binary-framed controller state over a serial link.
//!
//! An async reader task drains the UART byte-by-byte into a pipe; the
//! cooperative `task` empties the pipe through the frame parser and
//! publishes complete events to the router. Frame format lives in
//! [`padlink_proto::serial`].
//!
//! # Pins
//!
//! UART1 by default: GPIO 8 = TX, GPIO 9 = RX.

use defmt::warn;
use embassy_rp::uart::{Async, UartRx};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pipe::Pipe;
use padlink_core::{InputBackend, OutputTarget, Router};
use padlink_proto::serial::FrameParser;

/// Byte pipe between the async UART reader and the cooperative task.
pub type UartPipe = Pipe<CriticalSectionRawMutex, 64>;

/// Drain the UART into the pipe.
///
/// Reads one byte at a time: frames are short and the parser resyncs on
/// its own, so there is nothing to gain from batching.
#[embassy_executor::task]
pub async fn uart_reader_task(mut rx: UartRx<'static, Async>, pipe: &'static UartPipe) {
    let mut byte = [0u8; 1];
    loop {
        match rx.read(&mut byte).await {
            Ok(()) => {
                pipe.write(&byte).await;
            }
            Err(e) => {
                warn!("uart: read error: {:?}", e);
            }
        }
    }
}

/// The cooperative side: parse frames, publish events.
pub struct UartInputBackend {
    pipe: &'static UartPipe,
    parser: FrameParser,
    target: OutputTarget,
}

impl UartInputBackend {
    #[must_use]
    pub fn new(pipe: &'static UartPipe, target: OutputTarget) -> Self {
        Self {
            pipe,
            parser: FrameParser::new(),
            target,
        }
    }
}

impl InputBackend for UartInputBackend {
    fn name(&self) -> &'static str {
        "uart"
    }

    fn init(&mut self) {
        self.parser = FrameParser::new();
    }

    fn task(&mut self, router: &Router<'_>, _now_ms: u32) {
        let mut chunk = [0u8; 16];
        loop {
            let Ok(n) = self.pipe.try_read(&mut chunk) else {
                return;
            };
            for &byte in &chunk[..n] {
                if let Some(event) = self.parser.push(byte) {
                    router.publish(self.target, &event);
                }
            }
        }
    }
}
