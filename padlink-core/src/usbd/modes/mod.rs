//! Built-in USB device modes.
//!
//! These four identities live in the core because the pipeline's own
//! behavior depends on them (default mode, idle mouse reports). The other
//! console identities plug in through [`ModeRegistry`](super::ModeRegistry)
//! from outside.

pub mod hid;
pub mod kbmouse;
pub mod switch;
pub mod xinput;

pub use hid::HidMode;
pub use kbmouse::KbMouseMode;
pub use switch::SwitchMode;
pub use xinput::XInputMode;
