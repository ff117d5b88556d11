//! Maintenance chord watcher: a router-tap decorator.
//!
//! Wraps the USB device pending-event sink and watches the raw button
//! state for the mode-cycle chord before events enter the profile
//! engine. The main loop times the hold and performs the actual mode
//! change.

use core::cell::Cell;

use padlink_core::{EventSink, PendingEvents};
use padlink_proto::{Buttons, InputEvent};

/// Hold S1+S2+D-pad-up this long to cycle the USB output mode.
pub const MODE_CYCLE_HOLD_MS: u32 = 3000;

/// The mode-cycle chord.
pub const MODE_CYCLE_CHORD: Buttons =
    Buttons(Buttons::S1.0 | Buttons::S2.0 | Buttons::DPAD_UP.0);

pub struct ChordWatcher<'a> {
    inner: &'a PendingEvents,
    held: Cell<bool>,
}

impl<'a> ChordWatcher<'a> {
    #[must_use]
    pub const fn new(inner: &'a PendingEvents) -> Self {
        Self {
            inner,
            held: Cell::new(false),
        }
    }

    /// Whether the last delivered event carried the full chord.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.get()
    }
}

impl EventSink for ChordWatcher<'_> {
    fn deliver(&self, event: &InputEvent) {
        if event.player_index == 0 {
            self.held.set(event.buttons.contains(MODE_CYCLE_CHORD));
        }
        self.inner.deliver(event);
    }
}
