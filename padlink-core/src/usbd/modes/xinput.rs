//! XInput mode: Xbox 360 identity over a vendor class interface.

use padlink_proto::modes::xinput::{
    build_report, parse_led, parse_rumble, XInputReport, XINPUT_CONFIG_DESCRIPTOR,
    XINPUT_IDENTITY, XINPUT_MANUFACTURER, XINPUT_PRODUCT,
};
use padlink_proto::{DeviceIdentity, InputEvent, ProfileOutput, UsbOutputMode};

use crate::feedback::OutputFeedback;
use crate::usbd::{ClassDriver, ModeStrings, ReportSink, UsbdMode};

pub struct XInputMode {
    report: XInputReport,
    feedback: OutputFeedback,
}

impl XInputMode {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            report: XInputReport::neutral(),
            feedback: OutputFeedback {
                rumble_left: 0,
                rumble_right: 0,
                led_player: 0,
                led_r: 0,
                led_g: 0,
                led_b: 0,
                dirty: false,
            },
        }
    }
}

impl Default for XInputMode {
    fn default() -> Self {
        Self::new()
    }
}

impl UsbdMode for XInputMode {
    fn name(&self) -> &'static str {
        "xinput"
    }

    fn mode_id(&self) -> UsbOutputMode {
        UsbOutputMode::XInput
    }

    fn device_identity(&self) -> DeviceIdentity {
        XINPUT_IDENTITY
    }

    fn config_descriptor(&self) -> &'static [u8] {
        XINPUT_CONFIG_DESCRIPTOR
    }

    fn class_driver(&self) -> ClassDriver {
        ClassDriver::Vendor
    }

    fn strings(&self) -> ModeStrings {
        ModeStrings {
            manufacturer: XINPUT_MANUFACTURER,
            product: XINPUT_PRODUCT,
        }
    }

    fn report_len(&self) -> usize {
        XInputReport::SIZE
    }

    fn init(&mut self) {
        self.report = XInputReport::neutral();
        self.feedback.dirty = false;
    }

    fn send_report(
        &mut self,
        sink: &mut dyn ReportSink,
        _player: u8,
        _event: &InputEvent,
        out: &ProfileOutput,
    ) -> bool {
        self.report = build_report(out);
        sink.write(0, &self.report.as_bytes())
    }

    fn handle_output(&mut self, _report_id: u8, data: &[u8]) {
        if let Some((left, right)) = parse_rumble(data) {
            self.feedback.rumble_left = left;
            self.feedback.rumble_right = right;
            self.feedback.dirty = true;
        }
        if let Some(pattern) = parse_led(data) {
            self.feedback.led_player = pattern;
            self.feedback.dirty = true;
        }
    }

    fn feedback(&mut self) -> Option<OutputFeedback> {
        let snapshot = self.feedback;
        self.feedback.dirty = false;
        Some(snapshot)
    }

    fn rumble(&self) -> Option<(u8, u8)> {
        Some((self.feedback.rumble_left, self.feedback.rumble_right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usbd::manager::testing::CaptureSink;
    use padlink_proto::Buttons;

    #[test]
    fn test_report_size_matches_declaration() {
        let mut mode = XInputMode::new();
        let mut sink = CaptureSink::ready();
        let mut ev = InputEvent::neutral(0);
        ev.buttons = Buttons::B4 | Buttons::DPAD_DOWN;
        assert!(mode.send_report(&mut sink, 0, &ev, &ProfileOutput::passthrough(&ev)));
        assert_eq!(sink.writes[0].1.len(), mode.report_len());
    }

    #[test]
    fn test_rumble_output_sets_dirty_once() {
        let mut mode = XInputMode::new();
        mode.handle_output(0, &[0x00, 0x08, 0x00, 0xFF, 0x20, 0x00, 0x00, 0x00]);

        let fb = mode.feedback().unwrap();
        assert!(fb.dirty);
        assert_eq!((fb.rumble_left, fb.rumble_right), (0xFF, 0x20));

        // dirty clears on read, values persist
        let fb = mode.feedback().unwrap();
        assert!(!fb.dirty);
        assert_eq!(fb.rumble_left, 0xFF);
    }

    #[test]
    fn test_led_output_updates_player() {
        let mut mode = XInputMode::new();
        mode.handle_output(0, &[0x01, 0x03, 0x06]);
        let fb = mode.feedback().unwrap();
        assert!(fb.dirty);
        assert_eq!(fb.led_player, 0x06);
    }

    #[test]
    fn test_vendor_class_no_hid_descriptor() {
        let mode = XInputMode::new();
        assert_eq!(mode.class_driver(), ClassDriver::Vendor);
        assert!(mode.report_descriptor().is_none());
    }
}
