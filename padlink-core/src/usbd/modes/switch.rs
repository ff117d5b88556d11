//! Switch mode: Pokken-style 8-byte HID reports.

use padlink_proto::modes::switch::{
    build_report, SwitchIdentity, SwitchReport, SWITCH_CONFIG_DESCRIPTOR,
    SWITCH_REPORT_DESCRIPTOR,
};
use padlink_proto::{DeviceIdentity, InputEvent, ProfileOutput, UsbOutputMode};

use crate::usbd::{ModeStrings, ReportSink, UsbdMode};

pub struct SwitchMode {
    identity: SwitchIdentity,
    report: SwitchReport,
}

impl SwitchMode {
    #[must_use]
    pub const fn new(identity: SwitchIdentity) -> Self {
        Self {
            identity,
            report: SwitchReport::neutral(),
        }
    }

    #[must_use]
    pub const fn identity(&self) -> SwitchIdentity {
        self.identity
    }
}

impl Default for SwitchMode {
    fn default() -> Self {
        Self::new(SwitchIdentity::Pokken)
    }
}

impl UsbdMode for SwitchMode {
    fn name(&self) -> &'static str {
        "switch"
    }

    fn mode_id(&self) -> UsbOutputMode {
        UsbOutputMode::Switch
    }

    fn device_identity(&self) -> DeviceIdentity {
        self.identity.identity()
    }

    fn config_descriptor(&self) -> &'static [u8] {
        SWITCH_CONFIG_DESCRIPTOR
    }

    fn report_descriptor(&self) -> Option<&'static [u8]> {
        Some(SWITCH_REPORT_DESCRIPTOR)
    }

    fn strings(&self) -> ModeStrings {
        ModeStrings {
            manufacturer: self.identity.manufacturer(),
            product: self.identity.product(),
        }
    }

    fn report_len(&self) -> usize {
        SwitchReport::SIZE
    }

    fn init(&mut self) {
        self.report = SwitchReport::neutral();
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
