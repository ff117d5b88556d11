//! Keyboard/Mouse mode.
//!
//! Unlike the gamepad modes this one is not purely event-driven: a held
//! stick must keep producing relative mouse deltas, so the mode emits a
//! mouse report every tick from the last profiled state even when no new
//! event arrived.

use padlink_proto::modes::kbmouse::{
    build_keyboard_report, build_mouse_report, KeyboardReport, KBMOUSE_CONFIG_DESCRIPTOR,
    KBMOUSE_IDENTITY, KBMOUSE_MANUFACTURER, KBMOUSE_PRODUCT, KBMOUSE_REPORT_DESCRIPTOR,
    REPORT_ID_KEYBOARD, REPORT_ID_MOUSE,
};
use padlink_proto::{DeviceIdentity, InputEvent, ProfileOutput, UsbOutputMode};

use crate::usbd::{ModeStrings, ReportSink, UsbdMode};

pub struct KbMouseMode {
    last: ProfileOutput,
    keyboard: KeyboardReport,
}

impl KbMouseMode {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: ProfileOutput::neutral(),
            keyboard: KeyboardReport {
                modifier: 0,
                keys: [0; 6],
            },
        }
    }
}

impl Default for KbMouseMode {
    fn default() -> Self {
        Self::new()
    }
}

impl UsbdMode for KbMouseMode {
    fn name(&self) -> &'static str {
        "kbmouse"
    }

    fn mode_id(&self) -> UsbOutputMode {
        UsbOutputMode::KeyboardMouse
    }

    fn device_identity(&self) -> DeviceIdentity {
        KBMOUSE_IDENTITY
    }

    fn config_descriptor(&self) -> &'static [u8] {
        KBMOUSE_CONFIG_DESCRIPTOR
    }

    fn report_descriptor(&self) -> Option<&'static [u8]> {
        Some(KBMOUSE_REPORT_DESCRIPTOR)
    }

    fn strings(&self) -> ModeStrings {
        ModeStrings {
            manufacturer: KBMOUSE_MANUFACTURER,
            product: KBMOUSE_PRODUCT,
        }
    }

    fn report_len(&self) -> usize {
        KeyboardReport::SIZE
    }

    fn init(&mut self) {
        self.last = ProfileOutput::neutral();
        self.keyboard = KeyboardReport::default();
    }

    /// Idle mouse report: continuous pointer movement from the held
    /// stick, independent of new events.
    fn task(&mut self, sink: &mut dyn ReportSink) {
        if sink.ready() {
            let mouse = build_mouse_report(&self.last);
            let _ = sink.write(REPORT_ID_MOUSE, &mouse.as_bytes());
        }
    }

    fn send_report(
        &mut self,
        sink: &mut dyn ReportSink,
        _player: u8,
        _event: &InputEvent,
        out: &ProfileOutput,
    ) -> bool {
        self.last = *out;
        self.keyboard = build_keyboard_report(out);
        sink.write(REPORT_ID_KEYBOARD, &self.keyboard.as_bytes())
    }
}
