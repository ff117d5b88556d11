//! Host feedback plane: rumble and LED state flowing back from the
//! active output to the inputs that can act on it.
//!
//! Pull model: each tick the plane reads the active output's feedback
//! struct. The `dirty` flag is set by the producing side whenever the host
//! updates state and clears on read, so a quiet host costs nothing.

use crate::interface::{InputBackend, OutputBackend};
use crate::players::LedService;

/// Feedback snapshot from the host side of the active output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputFeedback {
    pub rumble_left: u8,
    pub rumble_right: u8,
    /// Player LED pattern as reported by the host (mode specific).
    pub led_player: u8,
    pub led_r: u8,
    pub led_g: u8,
    pub led_b: u8,
    /// Set by the producer when the host updated state since the last read.
    pub dirty: bool,
}

/// Pulls feedback from the active output and fans it out.
pub struct FeedbackPlane {
    last_rumble: (u8, u8),
}

impl FeedbackPlane {
    #[must_use]
    pub const fn new() -> Self {
        Self { last_rumble: (0, 0) }
    }

    /// One tick: read the active output, push fresh state to inputs and
    /// the LED service.
    ///
    /// Falls back to the scalar rumble accessor when the output does not
    /// implement the richer struct; either capability missing simply
    /// disables that part of the plane.
    pub fn tick(
        &mut self,
        output: &mut dyn OutputBackend,
        inputs: &mut [&mut dyn InputBackend],
        leds: &mut LedService,
    ) {
        let feedback = match output.feedback() {
            Some(fb) => fb,
            None => match output.rumble() {
                Some((left, right)) => {
                    let dirty = (left, right) != self.last_rumble;
                    OutputFeedback {
                        rumble_left: left,
                        rumble_right: right,
                        dirty,
                        ..OutputFeedback::default()
                    }
                }
                None => return,
            },
        };

        if !feedback.dirty {
            return;
        }
        self.last_rumble = (feedback.rumble_left, feedback.rumble_right);

        for input in inputs.iter_mut() {
            input.apply_feedback(&feedback);
        }
        leds.apply_feedback(&feedback);
    }
}

impl Default for FeedbackPlane {
    fn default() -> Self {
        Self::new()
    }
}
