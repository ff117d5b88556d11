//! D-pad to HID hat-switch encoding.
//!
//! HID-style output modes report the d-pad as a single hat byte using the
//! 8-direction-plus-center convention. The encoder is total over all 16
//! d-pad bit subsets: contradictory inputs (both members of an opposite
//! pair held) collapse to center rather than picking a side.

use crate::types::Buttons;

pub const HAT_UP: u8 = 0x00;
pub const HAT_UP_RIGHT: u8 = 0x01;
pub const HAT_RIGHT: u8 = 0x02;
pub const HAT_DOWN_RIGHT: u8 = 0x03;
pub const HAT_DOWN: u8 = 0x04;
pub const HAT_DOWN_LEFT: u8 = 0x05;
pub const HAT_LEFT: u8 = 0x06;
pub const HAT_UP_LEFT: u8 = 0x07;
pub const HAT_CENTER: u8 = 0x08;

/// Encode the d-pad bits of `buttons` as a hat byte.
///
/// Opposite pairs cancel: U+D (and L+R) are treated as neither pressed,
/// so e.g. `U+D+L` encodes as `LEFT` and `U+D` alone as `CENTER`.
#[must_use]
pub fn encode_hat(buttons: Buttons) -> u8 {
    let mut up = buttons.contains(Buttons::DPAD_UP);
    let mut down = buttons.contains(Buttons::DPAD_DOWN);
    let mut left = buttons.contains(Buttons::DPAD_LEFT);
    let mut right = buttons.contains(Buttons::DPAD_RIGHT);

    if up && down {
        up = false;
        down = false;
    }
    if left && right {
        left = false;
        right = false;
    }

    match (up, down, left, right) {
        (true, false, false, false) => HAT_UP,
        (true, false, false, true) => HAT_UP_RIGHT,
        (false, false, false, true) => HAT_RIGHT,
        (false, true, false, true) => HAT_DOWN_RIGHT,
        (false, true, false, false) => HAT_DOWN,
        (false, true, true, false) => HAT_DOWN_LEFT,
        (false, false, true, false) => HAT_LEFT,
        (true, false, true, false) => HAT_UP_LEFT,
        _ => HAT_CENTER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dpad(up: bool, down: bool, left: bool, right: bool) -> Buttons {
        let mut b = Buttons::NONE;
        b.set(Buttons::DPAD_UP, up);
        b.set(Buttons::DPAD_DOWN, down);
        b.set(Buttons::DPAD_LEFT, left);
        b.set(Buttons::DPAD_RIGHT, right);
        b
    }

    #[test]
    fn test_canonical_directions() {
        assert_eq!(encode_hat(dpad(true, false, false, false)), HAT_UP);
        assert_eq!(encode_hat(dpad(true, false, false, true)), HAT_UP_RIGHT);
        assert_eq!(encode_hat(dpad(false, false, false, true)), HAT_RIGHT);
        assert_eq!(encode_hat(dpad(false, true, false, true)), HAT_DOWN_RIGHT);
        assert_eq!(encode_hat(dpad(false, true, false, false)), HAT_DOWN);
        assert_eq!(encode_hat(dpad(false, true, true, false)), HAT_DOWN_LEFT);
        assert_eq!(encode_hat(dpad(false, false, true, false)), HAT_LEFT);
        assert_eq!(encode_hat(dpad(true, false, true, false)), HAT_UP_LEFT);
    }

    #[test]
    fn test_empty_set_is_center() {
        assert_eq!(encode_hat(Buttons::NONE), HAT_CENTER);
    }

    #[test]
    fn test_opposite_pairs_cancel() {
        assert_eq!(encode_hat(dpad(true, true, false, false)), HAT_CENTER);
        assert_eq!(encode_hat(dpad(false, false, true, true)), HAT_CENTER);
        assert_eq!(encode_hat(dpad(true, true, true, true)), HAT_CENTER);
        // One axis cancels, the other survives.
        assert_eq!(encode_hat(dpad(true, true, true, false)), HAT_LEFT);
        assert_eq!(encode_hat(dpad(true, false, true, true)), HAT_UP);
    }

    #[test]
    fn test_total_over_all_subsets() {
        // Every one of the 16 subsets must produce a valid hat value.
        for bits in 0u32..16 {
            let b = Buttons(bits); // d-pad occupies the low four bits
            let hat = encode_hat(b);
            assert!(hat <= HAT_CENTER, "invalid hat {hat} for subset {bits:04b}");
        }
    }

    #[test]
    fn test_non_dpad_bits_ignored() {
        let b = dpad(true, false, false, false) | Buttons::B1 | Buttons::R4;
        assert_eq!(encode_hat(b), HAT_UP);
    }
}
