//! Generic HID gamepad mode — the default identity.

use padlink_proto::modes::hid::{
    build_report, HidReport, HID_CONFIG_DESCRIPTOR, HID_IDENTITY, HID_MANUFACTURER, HID_PRODUCT,
    HID_REPORT_DESCRIPTOR,
};
use padlink_proto::{DeviceIdentity, InputEvent, ProfileOutput, UsbOutputMode};

use crate::usbd::{ModeStrings, ReportSink, UsbdMode};

pub struct HidMode {
    report: HidReport,
}

impl HidMode {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            report: HidReport::neutral(),
        }
    }
}

impl Default for HidMode {
    fn default() -> Self {
        Self::new()
    }
}

impl UsbdMode for HidMode {
    fn name(&self) -> &'static str {
        "hid"
    }

    fn mode_id(&self) -> UsbOutputMode {
        UsbOutputMode::Hid
    }

    fn device_identity(&self) -> DeviceIdentity {
        HID_IDENTITY
    }

    fn config_descriptor(&self) -> &'static [u8] {
        HID_CONFIG_DESCRIPTOR
    }

    fn report_descriptor(&self) -> Option<&'static [u8]> {
        Some(HID_REPORT_DESCRIPTOR)
    }

    fn strings(&self) -> ModeStrings {
        ModeStrings {
            manufacturer: HID_MANUFACTURER,
            product: HID_PRODUCT,
        }
    }

    fn report_len(&self) -> usize {
        HidReport::SIZE
    }

    fn init(&mut self) {
        self.report = HidReport::neutral();
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
}
