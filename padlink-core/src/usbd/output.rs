//! The USB device seen as an output backend.
//!
//! Binds the mode manager, the profile engine and the report sink into
//! one [`OutputBackend`] so the scheduler and feedback plane treat USB
//! like any other output. The pending-event slots live outside this
//! struct (shared with the router tap), so publishing and draining never
//! alias.

use padlink_proto::{ProfileOutput, SettingsRecord, UsbOutputMode};

use crate::feedback::OutputFeedback;
use crate::interface::{OutputBackend, OutputTarget};
use crate::profile::ProfileEngine;
use crate::usbd::manager::UsbdManager;
use crate::usbd::{PendingEvents, ReportSink};

pub struct UsbDeviceOutput<'m, 'p, S: ReportSink> {
    manager: UsbdManager<'m>,
    engine: ProfileEngine,
    pending: &'p PendingEvents,
    sink: S,
}

impl<'m, 'p, S: ReportSink> UsbDeviceOutput<'m, 'p, S> {
    #[must_use]
    pub fn new(manager: UsbdManager<'m>, pending: &'p PendingEvents, sink: S) -> Self {
        Self {
            manager,
            engine: ProfileEngine::new(),
            pending,
            sink,
        }
    }

    /// Resolve the active mode and profiles from the persisted record.
    pub fn bring_up(&mut self, record: &SettingsRecord) -> UsbOutputMode {
        self.engine = ProfileEngine::from_record(record);
        self.manager.bring_up(record)
    }

    #[must_use]
    pub fn manager(&self) -> &UsbdManager<'m> {
        &self.manager
    }

    #[must_use]
    pub fn manager_mut(&mut self) -> &mut UsbdManager<'m> {
        &mut self.manager
    }

    /// Install the post-profile telemetry tap.
    pub fn set_telemetry_tap(&mut self, tap: fn(&ProfileOutput)) {
        self.engine.set_telemetry_tap(tap);
    }

    /// Profile switch fired by a combo, to be persisted by the caller.
    pub fn take_profile_switch(&mut self) -> Option<u8> {
        self.engine.take_pending_switch()
    }
}

impl<S: ReportSink> OutputBackend for UsbDeviceOutput<'_, '_, S> {
    fn name(&self) -> &'static str {
        "usb-device"
    }

    fn target(&self) -> OutputTarget {
        OutputTarget::UsbDevice
    }

    fn init(&mut self) {}

    fn task(&mut self, now_ms: u32) {
        self.manager
            .task(&mut self.sink, &mut self.engine, self.pending, now_ms);
    }

    fn feedback(&mut self) -> Option<OutputFeedback> {
        self.manager.feedback()
    }

    fn rumble(&self) -> Option<(u8, u8)> {
        self.manager.rumble()
    }

    fn profile_count(&self) -> u8 {
        self.engine.profile_count()
    }

    fn active_profile(&self) -> u8 {
        self.engine.active_profile()
    }

    fn set_active_profile(&mut self, index: u8) {
        self.engine.set_active_profile(index);
    }

    fn profile_name(&self, index: u8) -> &'static str {
        self.engine.profile_name(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Router;
    use crate::usbd::manager::testing::CaptureSink;
    use crate::usbd::modes::SwitchMode;
    use crate::usbd::ModeRegistry;
    use padlink_proto::{Buttons, InputEvent};

    #[test]
    fn test_output_backend_drains_router_tap() {
        let mut switch = SwitchMode::default();
        let mut registry = ModeRegistry::new();
        registry.register(&mut switch);
        let manager = UsbdManager::new(registry, *b"0123456789AB");

        let pending = PendingEvents::new();
        let mut output = UsbDeviceOutput::new(manager, &pending, CaptureSink::ready());
        output.bring_up(&SettingsRecord {
            usb_output_mode: UsbOutputMode::Switch.as_u8(),
            ..SettingsRecord::default()
        });

        let mut router = Router::new();
        router.set_tap(OutputTarget::UsbDevice, &pending);

        let mut ev = InputEvent::neutral(0);
        ev.buttons = Buttons::B4;
        router.publish(OutputTarget::UsbDevice, &ev);

        output.task(0);
        assert_eq!(output.sink.writes.len(), 1);
        // Switch X = 0x0008
        assert_eq!(output.sink.writes[0].1[0], 0x08);
    }

    #[test]
    fn test_profile_accessors_reach_engine() {
        let registry = ModeRegistry::new();
        let manager = UsbdManager::new(registry, *b"0123456789AB");
        let pending = PendingEvents::new();
        let mut output = UsbDeviceOutput::new(manager, &pending, CaptureSink::ready());

        assert_eq!(output.profile_count(), 3);
        output.set_active_profile(2);
        assert_eq!(output.active_profile(), 2);
        assert_eq!(output.profile_name(2), "custom 2");
    }
}
