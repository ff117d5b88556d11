//! USB device subsystem: mode contract, registry and pending events.
//!
//! A "mode" is one emulated USB device identity: descriptors, report
//! builder, class selection and feedback state. The registry is populated
//! once at bring-up and immutable after; the active mode only changes
//! through the persist-and-reboot protocol in
//! [`manager::UsbdManager::change_mode`].
//!
//! Every optional capability on [`UsbdMode`] is a default method: a mode
//! that does not override it simply lacks the feature. Nothing in this
//! module treats a missing capability as an error.

pub mod manager;
pub mod modes;
pub mod output;

use core::cell::RefCell;

use padlink_proto::modes::device_descriptor;
use padlink_proto::{
    DeviceIdentity, InputEvent, ProfileOutput, UsbOutputMode, MAX_PLAYERS, USB_OUTPUT_MODE_COUNT,
};

use crate::feedback::OutputFeedback;
use crate::router::EventSink;

/// Which class driver services the mode's interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClassDriver {
    /// The built-in HID class.
    #[default]
    Hid,
    /// A substituted vendor class (XInput, XID, GIP, GC adapter).
    Vendor,
}

/// Enumeration speed the mode requires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsbSpeed {
    #[default]
    Auto,
    /// Force full-speed enumeration (USB 1.1 hosts, e.g. Xbox OG).
    FullSpeed,
}

/// Mode-specific manufacturer/product strings (descriptor indices 1/2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeStrings {
    pub manufacturer: &'static str,
    pub product: &'static str,
}

/// Endpoint writer handed to modes by the manager.
///
/// The firmware implements this over the real device stack; tests use a
/// capturing sink.
pub trait ReportSink {
    /// Whether the device is configured and the IN endpoint can take a
    /// report.
    fn ready(&self) -> bool;

    /// Queue a report. `report_id` 0 means the mode's reports are
    /// unnumbered. Returns `false` when the endpoint was busy.
    fn write(&mut self, report_id: u8, data: &[u8]) -> bool;

    /// Dequeue a pending host-to-device output report into `buf`,
    /// returning its report id and length. Default: no OUT traffic.
    fn read_output(&mut self, _buf: &mut [u8]) -> Option<(u8, usize)> {
        None
    }
}

/// The capability set of one emulated USB device identity.
pub trait UsbdMode {
    fn name(&self) -> &'static str;

    fn mode_id(&self) -> UsbOutputMode;

    /// VID/PID and version numbers of the emulated device.
    fn device_identity(&self) -> DeviceIdentity;

    fn device_descriptor(&self) -> [u8; 18] {
        device_descriptor(self.device_identity())
    }

    fn config_descriptor(&self) -> &'static [u8];

    /// HID report descriptor. `None` means the generic gamepad
    /// descriptor is served instead.
    fn report_descriptor(&self) -> Option<&'static [u8]> {
        None
    }

    fn class_driver(&self) -> ClassDriver {
        ClassDriver::Hid
    }

    fn usb_speed(&self) -> UsbSpeed {
        UsbSpeed::Auto
    }

    fn strings(&self) -> ModeStrings;

    /// Size of the wire report this mode's `send_report` emits.
    fn report_len(&self) -> usize;

    fn init(&mut self);

    /// Per-tick work beyond report sending (idle reports, auth, ...).
    fn task(&mut self, _sink: &mut dyn ReportSink) {}

    fn is_ready(&self, sink: &dyn ReportSink) -> bool {
        sink.ready()
    }

    /// Build and queue the wire report for one player's event.
    ///
    /// Returns `false` when the report could not be sent (endpoint busy
    /// or device not ready).
    fn send_report(
        &mut self,
        sink: &mut dyn ReportSink,
        player: u8,
        event: &InputEvent,
        out: &ProfileOutput,
    ) -> bool;

    /// Host-to-device output report (rumble, LED assignments, ...).
    fn handle_output(&mut self, _report_id: u8, _data: &[u8]) {}

    /// GET_REPORT request; returns the written length.
    fn get_report(&mut self, _report_id: u8, _buf: &mut [u8]) -> Option<usize> {
        None
    }

    /// Rich feedback snapshot. Implementations clear dirty on read.
    fn feedback(&mut self) -> Option<OutputFeedback> {
        None
    }

    /// Scalar rumble fallback.
    fn rumble(&self) -> Option<(u8, u8)> {
        None
    }
}

/// Fixed-size mode registry indexed by mode id.
///
/// Populated once at startup; `register` on an occupied slot is ignored.
pub struct ModeRegistry<'m> {
    slots: [Option<&'m mut dyn UsbdMode>; USB_OUTPUT_MODE_COUNT],
}

impl<'m> ModeRegistry<'m> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    /// Register a mode under its own id. First registration wins.
    pub fn register(&mut self, mode: &'m mut dyn UsbdMode) {
        let index = mode.mode_id().index();
        if self.slots[index].is_none() {
            self.slots[index] = Some(mode);
        }
    }

    #[must_use]
    pub fn contains(&self, id: UsbOutputMode) -> bool {
        self.slots[id.index()].is_some()
    }

    #[must_use]
    pub fn get(&self, id: UsbOutputMode) -> Option<&dyn UsbdMode> {
        match &self.slots[id.index()] {
            Some(mode) => Some(&**mode),
            None => None,
        }
    }

    #[must_use]
    pub fn get_mut(&mut self, id: UsbOutputMode) -> Option<&mut (dyn UsbdMode + 'm)> {
        match &mut self.slots[id.index()] {
            Some(mode) => Some(&mut **mode),
            None => None,
        }
    }
}

impl Default for ModeRegistry<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Latest-wins pending event slots, one per player.
///
/// This is the USB device output's router tap: the router delivers into
/// it synchronously, the USB task drains it on its tick. A second
/// publish before a consume overwrites — wire reports are snapshots, so
/// an older sample is worthless once a newer one exists.
pub struct PendingEvents {
    slots: RefCell<[Option<InputEvent>; MAX_PLAYERS]>,
}

impl PendingEvents {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: RefCell::new([None; MAX_PLAYERS]),
        }
    }

    /// Consume the pending event for a player, clearing the slot.
    pub fn take(&self, player: u8) -> Option<InputEvent> {
        self.slots
            .borrow_mut()
            .get_mut(player as usize)
            .and_then(Option::take)
    }
}

impl EventSink for PendingEvents {
    fn deliver(&self, event: &InputEvent) {
        if let Some(slot) = self
            .slots
            .borrow_mut()
            .get_mut(event.player_index as usize)
        {
            *slot = Some(*event);
        }
    }
}

impl Default for PendingEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use padlink_proto::Buttons;

    #[test]
    fn test_pending_events_latest_wins() {
        let pending = PendingEvents::new();

        let mut a = InputEvent::neutral(0);
        a.buttons = Buttons::B1;
        let mut b = InputEvent::neutral(0);
        b.buttons = Buttons::B2;

        pending.deliver(&a);
        pending.deliver(&b);

        let got = pending.take(0).unwrap();
        assert_eq!(got.buttons, Buttons::B2);
        assert!(pending.take(0).is_none(), "slot not cleared on consume");
    }

    #[test]
    fn test_pending_events_per_player_slots() {
        let pending = PendingEvents::new();
        pending.deliver(&InputEvent::neutral(1));
        assert!(pending.take(0).is_none());
        assert!(pending.take(1).is_some());
    }

    #[test]
    fn test_registry_first_registration_wins() {
        use super::modes::hid::HidMode;

        let mut first = HidMode::new();
        let mut second = HidMode::new();
        let mut registry = ModeRegistry::new();
        registry.register(&mut first);
        registry.register(&mut second);
        assert!(registry.contains(UsbOutputMode::Hid));
        assert!(!registry.contains(UsbOutputMode::Switch));
    }
}
