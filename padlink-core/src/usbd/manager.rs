//! USB device manager: active-mode resolution, per-tick dispatch and the
//! persist-and-reboot mode change protocol.
//!
//! The device stack cannot change its descriptors once enumerated, so a
//! mode change never happens live: the new mode id is committed to flash,
//! verified, and the watchdog reboots the firmware into `main`, which
//! brings the stack up under the new identity.

use padlink_proto::modes::hid::HID_REPORT_DESCRIPTOR;
use padlink_proto::modes::{encode_string_descriptor, string_index, LANGUAGE_DESCRIPTOR};
use padlink_proto::{SettingsRecord, UsbOutputMode, MAX_PLAYERS, SERIAL_STRING_LEN};

use crate::feedback::OutputFeedback;
use crate::interface::OutputTarget;
use crate::profile::{BuiltinProfile, ProfileEngine};
use crate::storage::{SectorFlash, SettingsStore, StorageError};
use crate::usbd::{ClassDriver, ModeRegistry, PendingEvents, ReportSink, UsbSpeed, UsbdMode};

/// Watchdog timeout armed before the mode-change reboot.
pub const MODE_CHANGE_RESET_MS: u32 = 100;

/// Reset seam for the mode-change protocol.
///
/// On hardware this arms the watchdog and spins until it bites, so the
/// call never returns. Test doubles record the arm and return.
pub trait SystemReset {
    fn reset(&mut self, timeout_ms: u32);
}

/// Error type for [`UsbdManager::change_mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModeChangeError {
    /// Target id is not in the registry.
    Unsupported,
    /// Flash commit failed; the old mode keeps working.
    Storage(StorageError),
    /// Read-back after the commit did not contain the new mode.
    Verify,
}

/// The USB device subsystem head: registry, active mode and dispatch.
pub struct UsbdManager<'m> {
    registry: ModeRegistry<'m>,
    current: UsbOutputMode,
    serial: [u8; SERIAL_STRING_LEN],
}

impl<'m> UsbdManager<'m> {
    /// Create the manager over an already-populated registry.
    ///
    /// `serial` is the 12-hex-character board id served as string
    /// descriptor index 3.
    #[must_use]
    pub fn new(registry: ModeRegistry<'m>, serial: [u8; SERIAL_STRING_LEN]) -> Self {
        Self {
            registry,
            current: UsbOutputMode::default(),
            serial,
        }
    }

    /// Resolve the active mode from the persisted record and init it.
    ///
    /// An unknown or unregistered persisted id falls back to the default
    /// mode; the stale byte gets overwritten on the next save.
    pub fn bring_up(&mut self, record: &SettingsRecord) -> UsbOutputMode {
        let mut mode = UsbOutputMode::from_raw(record.usb_output_mode).unwrap_or_default();
        if !self.registry.contains(mode) {
            mode = UsbOutputMode::default();
        }
        self.current = mode;
        if let Some(active) = self.registry.get_mut(mode) {
            active.init();
        }
        mode
    }

    #[must_use]
    pub const fn current_mode(&self) -> UsbOutputMode {
        self.current
    }

    fn active(&self) -> Option<&dyn UsbdMode> {
        self.registry.get(self.current)
    }

    fn active_mut(&mut self) -> Option<&mut (dyn UsbdMode + 'm)> {
        self.registry.get_mut(self.current)
    }

    /// One cooperative tick: run the active mode's task, then drain the
    /// pending events through the profile engine into wire reports.
    ///
    /// The device stack pump itself is external (it runs in the firmware
    /// layer before this is called). When the mode is not ready the
    /// pending events stay queued for the next tick.
    pub fn task(
        &mut self,
        sink: &mut dyn ReportSink,
        engine: &mut ProfileEngine,
        pending: &PendingEvents,
        now_ms: u32,
    ) {
        let Some(mode) = self.registry.get_mut(self.current) else {
            return;
        };

        let mut out_buf = [0u8; 64];
        while let Some((report_id, len)) = sink.read_output(&mut out_buf) {
            mode.handle_output(report_id, &out_buf[..len.min(out_buf.len())]);
        }

        mode.task(sink);

        if !mode.is_ready(sink) {
            return;
        }

        let builtin = BuiltinProfile::for_target(OutputTarget::UsbDevice);
        for player in 0..MAX_PLAYERS as u8 {
            if let Some(event) = pending.take(player) {
                let out = engine.apply(player, &event, Some(builtin), now_ms);
                let _ = mode.send_report(sink, player, &event, &out);
            }
        }
    }

    /// The next registered mode after the current one, wrapping around.
    ///
    /// Returns the current mode when it is the only one registered.
    #[must_use]
    pub fn next_registered_mode(&self) -> UsbOutputMode {
        let count = padlink_proto::USB_OUTPUT_MODE_COUNT as u8;
        let mut raw = self.current.as_u8();
        for _ in 0..count {
            raw = (raw + 1) % count;
            if let Some(candidate) = UsbOutputMode::from_raw(raw) {
                if self.registry.contains(candidate) {
                    return candidate;
                }
            }
        }
        self.current
    }

    /// Persist-and-reboot mode change.
    ///
    /// Aborts without resetting when the target is unknown or the flash
    /// write fails, leaving the running mode untouched.
    pub fn change_mode<F: SectorFlash, R: SystemReset>(
        &mut self,
        target: UsbOutputMode,
        store: &mut SettingsStore<F>,
        reset: &mut R,
    ) -> Result<(), ModeChangeError> {
        if !self.registry.contains(target) {
            return Err(ModeChangeError::Unsupported);
        }

        let previous = store.record().usb_output_mode;
        store.record_mut().usb_output_mode = target.as_u8();
        if let Err(e) = store.save_now() {
            store.record_mut().usb_output_mode = previous;
            return Err(ModeChangeError::Storage(e));
        }

        if !store.reload() || store.record().usb_output_mode != target.as_u8() {
            store.record_mut().usb_output_mode = previous;
            return Err(ModeChangeError::Verify);
        }

        reset.reset(MODE_CHANGE_RESET_MS);
        Ok(())
    }

    // --- Descriptor dispatch (device stack callbacks forward here) ---

    #[must_use]
    pub fn device_identity(&self) -> Option<padlink_proto::DeviceIdentity> {
        Some(self.active()?.device_identity())
    }

    #[must_use]
    pub fn strings(&self) -> Option<crate::usbd::ModeStrings> {
        Some(self.active()?.strings())
    }

    #[must_use]
    pub fn device_descriptor(&self) -> [u8; 18] {
        match self.active() {
            Some(mode) => mode.device_descriptor(),
            None => [0; 18],
        }
    }

    #[must_use]
    pub fn config_descriptor(&self) -> &'static [u8] {
        match self.active() {
            Some(mode) => mode.config_descriptor(),
            None => &[],
        }
    }

    /// The active mode's report descriptor, or the generic gamepad
    /// descriptor when the mode declares none.
    #[must_use]
    pub fn report_descriptor(&self) -> &'static [u8] {
        self.active()
            .and_then(UsbdMode::report_descriptor)
            .unwrap_or(HID_REPORT_DESCRIPTOR)
    }

    #[must_use]
    pub fn class_driver(&self) -> ClassDriver {
        self.active()
            .map(UsbdMode::class_driver)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn usb_speed(&self) -> UsbSpeed {
        self.active().map(UsbdMode::usb_speed).unwrap_or_default()
    }

    /// Serve a string descriptor by index into `buf`, returning the
    /// descriptor length. Unknown indices yield `None` (stack stalls the
    /// request).
    pub fn string_descriptor(&self, index: u8, buf: &mut [u8]) -> Option<usize> {
        match index {
            string_index::LANGUAGE => {
                let n = LANGUAGE_DESCRIPTOR.len();
                buf.get_mut(..n)?.copy_from_slice(&LANGUAGE_DESCRIPTOR);
                Some(n)
            }
            string_index::MANUFACTURER => {
                let strings = self.active()?.strings();
                Some(encode_string_descriptor(strings.manufacturer, buf))
            }
            string_index::PRODUCT => {
                let strings = self.active()?.strings();
                Some(encode_string_descriptor(strings.product, buf))
            }
            string_index::SERIAL => {
                let serial = core::str::from_utf8(&self.serial).unwrap_or("000000000000");
                Some(encode_string_descriptor(serial, buf))
            }
            string_index::CDC_DATA => Some(encode_string_descriptor("padlink data", buf)),
            string_index::CDC_DEBUG => Some(encode_string_descriptor("padlink debug", buf)),
            _ => None,
        }
    }

    /// SET_REPORT / OUT endpoint data from the host.
    pub fn handle_output(&mut self, report_id: u8, data: &[u8]) {
        if let Some(mode) = self.active_mut() {
            mode.handle_output(report_id, data);
        }
    }

    /// GET_REPORT request from the host.
    pub fn get_report(&mut self, report_id: u8, buf: &mut [u8]) -> Option<usize> {
        self.active_mut()?.get_report(report_id, buf)
    }

    /// Feedback snapshot from the active mode.
    pub fn feedback(&mut self) -> Option<OutputFeedback> {
        self.active_mut()?.feedback()
    }

    #[must_use]
    pub fn rumble(&self) -> Option<(u8, u8)> {
        self.active()?.rumble()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Report sink that records writes and can replay host OUT reports.
    pub struct CaptureSink {
        pub is_ready: bool,
        pub writes: std::vec::Vec<(u8, std::vec::Vec<u8>)>,
        pub host_reports: std::collections::VecDeque<(u8, std::vec::Vec<u8>)>,
    }

    impl CaptureSink {
        pub fn ready() -> Self {
            Self {
                is_ready: true,
                writes: std::vec::Vec::new(),
                host_reports: std::collections::VecDeque::new(),
            }
        }

        pub fn busy() -> Self {
            Self {
                is_ready: false,
                ..Self::ready()
            }
        }

        /// Queue a host OUT report for the next task tick to pick up.
        pub fn push_host_report(&mut self, report_id: u8, data: &[u8]) {
            self.host_reports.push_back((report_id, data.to_vec()));
        }
    }

    impl ReportSink for CaptureSink {
        fn ready(&self) -> bool {
            self.is_ready
        }

        fn write(&mut self, report_id: u8, data: &[u8]) -> bool {
            if !self.is_ready {
                return false;
            }
            self.writes.push((report_id, data.to_vec()));
            true
        }

        fn read_output(&mut self, buf: &mut [u8]) -> Option<(u8, usize)> {
            let (report_id, data) = self.host_reports.pop_front()?;
            let n = data.len().min(buf.len());
            buf[..n].copy_from_slice(&data[..n]);
            Some((report_id, n))
        }
    }

    /// Reset double that records the armed timeout.
    #[derive(Default)]
    pub struct MockReset {
        pub armed_ms: Option<u32>,
    }

    impl SystemReset for MockReset {
        fn reset(&mut self, timeout_ms: u32) {
            self.armed_ms = Some(timeout_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{CaptureSink, MockReset};
    use super::*;
    use crate::router::{EventSink, Router};
    use crate::storage::testing::MemoryFlash;
    use crate::usbd::modes::{HidMode, SwitchMode};
    use padlink_proto::{Buttons, InputEvent};

    fn serial() -> [u8; SERIAL_STRING_LEN] {
        *b"E463A8574B3D"
    }

    #[test]
    fn test_switch_mode_end_to_end_report() {
        // S1: mode=Switch, B1 pressed, sticks centered.
        let mut switch = SwitchMode::default();
        let mut registry = ModeRegistry::new();
        registry.register(&mut switch);
        let mut manager = UsbdManager::new(registry, serial());

        let mut record = SettingsRecord::default();
        record.usb_output_mode = UsbOutputMode::Switch.as_u8();
        assert_eq!(manager.bring_up(&record), UsbOutputMode::Switch);

        let pending = PendingEvents::new();
        let mut router = Router::new();
        router.set_tap(OutputTarget::UsbDevice, &pending);

        let mut event = InputEvent::neutral(0);
        event.buttons = Buttons::B1;
        router.publish(OutputTarget::UsbDevice, &event);

        let mut sink = CaptureSink::ready();
        let mut engine = ProfileEngine::new();
        manager.task(&mut sink, &mut engine, &pending, 0);

        assert_eq!(sink.writes.len(), 1);
        assert_eq!(
            sink.writes[0].1.as_slice(),
            &[0x02, 0x00, 0x08, 0x80, 0x80, 0x80, 0x80, 0x00]
        );
    }

    #[test]
    fn test_dpad_diagonal_hat() {
        // S2: DU+DR encodes as hat 0x01.
        let mut switch = SwitchMode::default();
        let mut registry = ModeRegistry::new();
        registry.register(&mut switch);
        let mut manager = UsbdManager::new(registry, serial());
        manager.bring_up(&SettingsRecord {
            usb_output_mode: UsbOutputMode::Switch.as_u8(),
            ..SettingsRecord::default()
        });

        let pending = PendingEvents::new();
        let mut event = InputEvent::neutral(0);
        event.buttons = Buttons::DPAD_UP | Buttons::DPAD_RIGHT;
        pending.deliver(&event);

        let mut sink = CaptureSink::ready();
        let mut engine = ProfileEngine::new();
        manager.task(&mut sink, &mut engine, &pending, 0);

        assert_eq!(sink.writes[0].1[2], 0x01);
    }

    #[test]
    fn test_latest_wins_through_router() {
        // S5: two publishes before one task tick; only B is observed.
        let mut switch = SwitchMode::default();
        let mut registry = ModeRegistry::new();
        registry.register(&mut switch);
        let mut manager = UsbdManager::new(registry, serial());
        manager.bring_up(&SettingsRecord {
            usb_output_mode: UsbOutputMode::Switch.as_u8(),
            ..SettingsRecord::default()
        });

        let pending = PendingEvents::new();
        let mut router = Router::new();
        router.set_tap(OutputTarget::UsbDevice, &pending);

        let mut a = InputEvent::neutral(0);
        a.buttons = Buttons::B1;
        let mut b = InputEvent::neutral(0);
        b.buttons = Buttons::B2;
        router.publish(OutputTarget::UsbDevice, &a);
        router.publish(OutputTarget::UsbDevice, &b);

        let mut sink = CaptureSink::ready();
        let mut engine = ProfileEngine::new();
        manager.task(&mut sink, &mut engine, &pending, 0);

        // Exactly one report, and it is B2 (Switch A = 0x0004).
        assert_eq!(sink.writes.len(), 1);
        assert_eq!(sink.writes[0].1[0], 0x04);
    }

    #[test]
    fn test_not_ready_keeps_pending_event() {
        let mut hid = HidMode::new();
        let mut registry = ModeRegistry::new();
        registry.register(&mut hid);
        let mut manager = UsbdManager::new(registry, serial());
        manager.bring_up(&SettingsRecord::default());

        let pending = PendingEvents::new();
        pending.deliver(&InputEvent::neutral(0));

        let mut sink = CaptureSink::busy();
        let mut engine = ProfileEngine::new();
        manager.task(&mut sink, &mut engine, &pending, 0);
        assert!(sink.writes.is_empty());

        // Event survived the not-ready tick.
        sink.is_ready = true;
        manager.task(&mut sink, &mut engine, &pending, 1);
        assert_eq!(sink.writes.len(), 1);
    }

    #[test]
    fn test_unregistered_persisted_mode_boots_default() {
        // Invariant 4: persisted mode not in registry -> default mode.
        let mut hid = HidMode::new();
        let mut registry = ModeRegistry::new();
        registry.register(&mut hid);
        let mut manager = UsbdManager::new(registry, serial());

        let record = SettingsRecord {
            usb_output_mode: UsbOutputMode::GcAdapter.as_u8(), // never registered
            ..SettingsRecord::default()
        };
        assert_eq!(manager.bring_up(&record), UsbOutputMode::Hid);

        let record = SettingsRecord {
            usb_output_mode: 0xEE, // not even a known id
            ..SettingsRecord::default()
        };
        assert_eq!(manager.bring_up(&record), UsbOutputMode::Hid);
    }

    #[test]
    fn test_mode_change_persists_and_arms_watchdog() {
        // S3: HID -> Switch.
        let mut hid = HidMode::new();
        let mut switch = SwitchMode::default();
        let mut registry = ModeRegistry::new();
        registry.register(&mut hid);
        registry.register(&mut switch);
        let mut manager = UsbdManager::new(registry, serial());
        manager.bring_up(&SettingsRecord::default());
        assert_eq!(manager.current_mode(), UsbOutputMode::Hid);

        let (mut store, _) = SettingsStore::load(MemoryFlash::erased());
        let mut reset = MockReset::default();
        manager
            .change_mode(UsbOutputMode::Switch, &mut store, &mut reset)
            .unwrap();

        assert_eq!(
            store.record().usb_output_mode,
            UsbOutputMode::Switch.as_u8()
        );
        assert_eq!(reset.armed_ms, Some(MODE_CHANGE_RESET_MS));

        // "After reboot": a fresh manager over the persisted record comes
        // up as Switch with Switch's descriptors.
        let mut switch2 = SwitchMode::default();
        let mut hid2 = HidMode::new();
        let mut registry2 = ModeRegistry::new();
        registry2.register(&mut hid2);
        registry2.register(&mut switch2);
        let mut manager2 = UsbdManager::new(registry2, serial());
        assert!(store.reload());
        assert_eq!(manager2.bring_up(store.record()), UsbOutputMode::Switch);
        assert_eq!(
            manager2.device_descriptor(),
            SwitchMode::default().device_descriptor()
        );
    }

    #[test]
    fn test_mode_change_to_unsupported_aborts() {
        let mut hid = HidMode::new();
        let mut registry = ModeRegistry::new();
        registry.register(&mut hid);
        let mut manager = UsbdManager::new(registry, serial());
        manager.bring_up(&SettingsRecord::default());

        let (mut store, _) = SettingsStore::load(MemoryFlash::erased());
        let mut reset = MockReset::default();
        let err = manager
            .change_mode(UsbOutputMode::Ps4, &mut store, &mut reset)
            .unwrap_err();
        assert_eq!(err, ModeChangeError::Unsupported);
        assert_eq!(reset.armed_ms, None);
    }

    #[test]
    fn test_mode_change_flash_failure_keeps_old_mode() {
        let mut hid = HidMode::new();
        let mut switch = SwitchMode::default();
        let mut registry = ModeRegistry::new();
        registry.register(&mut hid);
        registry.register(&mut switch);
        let mut manager = UsbdManager::new(registry, serial());
        manager.bring_up(&SettingsRecord::default());

        let (mut store, _) = SettingsStore::load(MemoryFlash::erased());
        store.flash_mut().fail_writes = true;
        let mut reset = MockReset::default();

        let err = manager
            .change_mode(UsbOutputMode::Switch, &mut store, &mut reset)
            .unwrap_err();
        assert!(matches!(err, ModeChangeError::Storage(_)));
        assert_eq!(reset.armed_ms, None, "no reset after a failed commit");
        assert_eq!(store.record().usb_output_mode, UsbOutputMode::Hid.as_u8());
        assert_eq!(manager.current_mode(), UsbOutputMode::Hid);
    }

    #[test]
    fn test_string_descriptor_dispatch() {
        let mut switch = SwitchMode::default();
        let mut registry = ModeRegistry::new();
        registry.register(&mut switch);
        let mut manager = UsbdManager::new(registry, serial());
        manager.bring_up(&SettingsRecord {
            usb_output_mode: UsbOutputMode::Switch.as_u8(),
            ..SettingsRecord::default()
        });

        let mut buf = [0u8; 64];
        let n = manager.string_descriptor(0, &mut buf).unwrap();
        assert_eq!(&buf[..n], &[0x04, 0x03, 0x09, 0x04]);

        let n = manager.string_descriptor(2, &mut buf).unwrap();
        // "POKKEN CONTROLLER" as UTF-16LE with header
        assert_eq!(n, 2 + "POKKEN CONTROLLER".len() * 2);
        assert_eq!(buf[2], b'P');
        assert_eq!(buf[3], 0x00);

        let n = manager.string_descriptor(3, &mut buf).unwrap();
        assert_eq!(n, 2 + SERIAL_STRING_LEN * 2);
        assert_eq!(buf[2], b'E');

        assert!(manager.string_descriptor(9, &mut buf).is_none());
    }

    #[test]
    fn test_next_registered_mode_cycles() {
        let mut hid = HidMode::new();
        let mut switch = SwitchMode::default();
        let mut registry = ModeRegistry::new();
        registry.register(&mut hid);
        registry.register(&mut switch);
        let mut manager = UsbdManager::new(registry, serial());
        manager.bring_up(&SettingsRecord::default());

        assert_eq!(manager.next_registered_mode(), UsbOutputMode::Switch);

        let mut only = HidMode::new();
        let mut registry = ModeRegistry::new();
        registry.register(&mut only);
        let mut manager = UsbdManager::new(registry, serial());
        manager.bring_up(&SettingsRecord::default());
        assert_eq!(manager.next_registered_mode(), UsbOutputMode::Hid);
    }

    #[test]
    fn test_host_rumble_flows_to_feedback() {
        use crate::usbd::modes::XInputMode;

        let mut xinput = XInputMode::new();
        let mut registry = ModeRegistry::new();
        registry.register(&mut xinput);
        let mut manager = UsbdManager::new(registry, serial());
        manager.bring_up(&SettingsRecord {
            usb_output_mode: UsbOutputMode::XInput.as_u8(),
            ..SettingsRecord::default()
        });

        let pending = PendingEvents::new();
        let mut sink = CaptureSink::ready();
        sink.push_host_report(0, &[0x00, 0x08, 0x00, 0xCC, 0x11, 0x00, 0x00, 0x00]);

        let mut engine = ProfileEngine::new();
        manager.task(&mut sink, &mut engine, &pending, 0);

        let fb = manager.feedback().unwrap();
        assert!(fb.dirty);
        assert_eq!((fb.rumble_left, fb.rumble_right), (0xCC, 0x11));
    }

    #[test]
    fn test_report_descriptor_fallback() {
        use crate::usbd::modes::XInputMode;

        let mut xinput = XInputMode::new();
        let mut registry = ModeRegistry::new();
        registry.register(&mut xinput);
        let mut manager = UsbdManager::new(registry, serial());
        manager.bring_up(&SettingsRecord {
            usb_output_mode: UsbOutputMode::XInput.as_u8(),
            ..SettingsRecord::default()
        });

        // XInput declares no report descriptor; the generic one serves.
        assert_eq!(manager.report_descriptor(), HID_REPORT_DESCRIPTOR);
        assert_eq!(manager.class_driver(), ClassDriver::Vendor);
    }
}
