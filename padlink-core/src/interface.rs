//! Input and output interface traits.
//!
//! Every input and output backend plugs into the core through these two
//! traits. Optional capabilities are default methods returning `None` or
//! doing nothing: a backend that does not override them simply has that
//! feature disabled, never an error.
//!
//! # `no_std` Compatibility
//!
//! All implementations must be `#![no_std]` compatible with no heap
//! allocation.

use crate::feedback::OutputFeedback;
use crate::router::Router;

/// Output destination id used by the router.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputTarget {
    UsbDevice,
    GameCube,
    PcEngine,
    Uart,
}

impl OutputTarget {
    pub const COUNT: usize = 4;

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// An input backend: polls its hardware and publishes normalized events.
///
/// `task` is called once per main-loop iteration. The backend polls,
/// debounces if necessary, and calls [`Router::publish`] when it observes
/// a new event.
pub trait InputBackend {
    fn name(&self) -> &'static str;

    fn init(&mut self);

    /// Poll the hardware; publish to the router on a new event.
    fn task(&mut self, router: &Router<'_>, now_ms: u32);

    /// Accept host feedback (rumble, LED color). Default: ignored.
    fn apply_feedback(&mut self, _feedback: &OutputFeedback) {}
}

/// An output backend: consumes routed events and drives one target.
///
/// At most one output in the system may return `Some` from `core1_task`;
/// that function is bound to Core 1 at startup and owns it.
pub trait OutputBackend {
    fn name(&self) -> &'static str;

    fn target(&self) -> OutputTarget;

    fn init(&mut self);

    /// One cooperative tick on Core 0.
    fn task(&mut self, now_ms: u32);

    /// Timing-critical Core-1 loop, if this output needs one.
    ///
    /// The function never returns once started.
    fn core1_task(&self) -> Option<fn()> {
        None
    }

    /// Read host feedback. Implementations clear their dirty flag on read.
    fn feedback(&mut self) -> Option<OutputFeedback> {
        None
    }

    /// Scalar rumble fallback for outputs without the richer struct.
    fn rumble(&self) -> Option<(u8, u8)> {
        None
    }

    /// Host-assigned LED pattern for a player, if the protocol carries one.
    fn player_led(&self, _player: u8) -> Option<u8> {
        None
    }

    // Profile accessors. Outputs without a profile engine expose a single
    // fixed profile.

    fn profile_count(&self) -> u8 {
        1
    }

    fn active_profile(&self) -> u8 {
        0
    }

    fn set_active_profile(&mut self, _index: u8) {}

    fn profile_name(&self, _index: u8) -> &'static str {
        "default"
    }

    /// Analog level at which triggers count as pressed, if configurable.
    fn trigger_threshold(&self) -> Option<u8> {
        None
    }
}

/// Product-level hooks run inside the main loop.
///
/// The app also owns the interface arrays; wiring code hands them to the
/// scheduler at startup.
pub trait App {
    fn init(&mut self);

    fn task(&mut self);
}

/// App that does nothing; useful for adapters with no product logic.
pub struct NullApp;

impl App for NullApp {
    fn init(&mut self) {}

    fn task(&mut self) {}
}
