//! Watchdog-armed reboot, the USB mode-change primitive.

use embassy_rp::peripherals::WATCHDOG;
use embassy_rp::watchdog::Watchdog;
use embassy_time::Duration;
use padlink_core::SystemReset;

pub struct WatchdogReset {
    watchdog: Watchdog,
}

impl WatchdogReset {
    #[must_use]
    pub fn new(watchdog: WATCHDOG) -> Self {
        Self {
            watchdog: Watchdog::new(watchdog),
        }
    }
}

impl SystemReset for WatchdogReset {
    fn reset(&mut self, timeout_ms: u32) {
        defmt::info!("watchdog reset armed ({} ms)", timeout_ms);
        self.watchdog
            .start(Duration::from_millis(timeout_ms as u64));
        loop {
            cortex_m::asm::nop();
        }
    }
}
