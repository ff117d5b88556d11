//! Router: distributes input events to the active output's tap.
//!
//! The router is deliberately dumb: one tap per output target, invoked
//! synchronously from `publish`. It never queues — the registered sink
//! decides its own buffering policy (the USB device output, for example,
//! buffers into latest-wins per-player slots). Everything runs on Core 0,
//! so a tap is a plain shared reference with interior mutability and no
//! locking.

use padlink_proto::{InputEvent, MAX_PLAYERS};

use crate::interface::OutputTarget;

/// A sink registered with the router for one output target.
///
/// `deliver` takes `&self`: sinks use interior mutability so that the
/// router tap can be shared with the component that drains it.
pub trait EventSink {
    fn deliver(&self, event: &InputEvent);
}

/// One tap per output target.
pub struct Router<'a> {
    taps: [Option<&'a dyn EventSink>; OutputTarget::COUNT],
}

impl<'a> Router<'a> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            taps: [None; OutputTarget::COUNT],
        }
    }

    /// Register the sink for a target, replacing any previous tap.
    pub fn set_tap(&mut self, target: OutputTarget, sink: &'a dyn EventSink) {
        self.taps[target.index()] = Some(sink);
    }

    /// Deliver an event to the target's tap.
    ///
    /// Silently dropped when no tap is registered or the event carries an
    /// out-of-range player index.
    pub fn publish(&self, target: OutputTarget, event: &InputEvent) {
        if event.player_index as usize >= MAX_PLAYERS {
            return;
        }
        if let Some(sink) = self.taps[target.index()] {
            sink.deliver(event);
        }
    }
}

impl Default for Router<'_> {
    fn default() -> Self {
        Self::new()
    }
}
