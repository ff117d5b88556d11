//! Player manager and LED service.
//!
//! The player manager tracks which player slots are occupied and which
//! LED each maps to. The LED service turns three signals into something
//! visible: a connection heartbeat, an active-profile indicator blink and
//! the per-player color/pattern coming back from the host through the
//! feedback plane. Animation curves live behind [`LedDriver`].

use padlink_proto::MAX_PLAYERS;

use crate::feedback::OutputFeedback;

/// Hardware seam for the LED service.
pub trait LedDriver {
    fn set_player_led(&mut self, player: u8, on: bool);

    fn set_color(&mut self, r: u8, g: u8, b: u8);
}

/// Tracks occupied player slots and their LED assignment.
pub struct PlayerManager {
    connected: [bool; MAX_PLAYERS],
    led_map: [u8; MAX_PLAYERS],
}

impl PlayerManager {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connected: [false; MAX_PLAYERS],
            led_map: [0, 1, 2, 3],
        }
    }

    /// Claim the lowest free player slot.
    pub fn assign(&mut self) -> Option<u8> {
        for (i, slot) in self.connected.iter_mut().enumerate() {
            if !*slot {
                *slot = true;
                return Some(i as u8);
            }
        }
        None
    }

    /// Release a player slot. Out-of-range indices are ignored.
    pub fn release(&mut self, player: u8) {
        if let Some(slot) = self.connected.get_mut(player as usize) {
            *slot = false;
        }
    }

    #[must_use]
    pub fn is_connected(&self, player: u8) -> bool {
        self.connected
            .get(player as usize)
            .copied()
            .unwrap_or(false)
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn count(&self) -> u8 {
        self.connected.iter().filter(|&&c| c).count() as u8
    }

    /// The LED index a player drives.
    #[must_use]
    pub fn led_for_player(&self, player: u8) -> u8 {
        self.led_map
            .get(player as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Per-tick bookkeeping.
    pub fn task(&mut self) {}
}

impl Default for PlayerManager {
    fn default() -> Self {
        Self::new()
    }
}

const HEARTBEAT_PERIOD_MS: u32 = 1000;
const PROFILE_BLINK_MS: u32 = 150;

/// LED service state.
///
/// Priority per tick: profile indication blinks override the heartbeat;
/// host feedback colors apply independently.
pub struct LedService<'d> {
    driver: Option<&'d mut dyn LedDriver>,
    connected: bool,
    /// Remaining profile-indicator transitions (2 per blink).
    blink_edges: u8,
    next_edge_ms: u32,
    blink_on: bool,
}

impl<'d> LedService<'d> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            driver: None,
            connected: false,
            blink_edges: 0,
            next_edge_ms: 0,
            blink_on: false,
        }
    }

    pub fn set_driver(&mut self, driver: &'d mut dyn LedDriver) {
        self.driver = Some(driver);
    }

    /// Mark the host connection state for the heartbeat.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Blink the player LED `profile_index + 1` times.
    pub fn indicate_profile(&mut self, profile_index: u8, now_ms: u32) {
        self.blink_edges = (profile_index + 1) * 2;
        self.next_edge_ms = now_ms;
        self.blink_on = false;
    }

    /// Host feedback: player pattern and color.
    pub fn apply_feedback(&mut self, feedback: &OutputFeedback) {
        if let Some(driver) = self.driver.as_deref_mut() {
            driver.set_player_led(feedback.led_player, true);
            driver.set_color(feedback.led_r, feedback.led_g, feedback.led_b);
        }
    }

    /// One tick of the service.
    pub fn task(&mut self, now_ms: u32) {
        let Some(driver) = self.driver.as_deref_mut() else {
            return;
        };

        if self.blink_edges > 0 {
            if now_ms.wrapping_sub(self.next_edge_ms) < u32::MAX / 2 {
                self.blink_on = !self.blink_on;
                self.blink_edges -= 1;
                self.next_edge_ms = now_ms.wrapping_add(PROFILE_BLINK_MS);
                driver.set_player_led(0, self.blink_on);
            }
            return;
        }

        if self.connected {
            driver.set_player_led(0, true);
        } else {
            // Heartbeat: half-period on, half-period off.
            let phase = now_ms % HEARTBEAT_PERIOD_MS;
            driver.set_player_led(0, phase < HEARTBEAT_PERIOD_MS / 2);
        }
    }
}

impl Default for LedService<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MockLeds {
        player_led: Option<(u8, bool)>,
        color: Option<(u8, u8, u8)>,
        set_count: u32,
    }

    impl LedDriver for MockLeds {
        fn set_player_led(&mut self, player: u8, on: bool) {
            self.player_led = Some((player, on));
            self.set_count += 1;
        }
        fn set_color(&mut self, r: u8, g: u8, b: u8) {
            self.color = Some((r, g, b));
        }
    }

    /// Lets a test read `MockLeds` state while the driver is still
    /// mutably borrowed by a live `LedService`.
    struct MockLedsHandle(std::rc::Rc<std::cell::RefCell<MockLeds>>);

    impl LedDriver for MockLedsHandle {
        fn set_player_led(&mut self, player: u8, on: bool) {
            self.0.borrow_mut().set_player_led(player, on);
        }
        fn set_color(&mut self, r: u8, g: u8, b: u8) {
            self.0.borrow_mut().set_color(r, g, b);
        }
    }

    #[test]
    fn test_assign_release_cycle() {
        let mut players = PlayerManager::new();
        assert_eq!(players.assign(), Some(0));
        assert_eq!(players.assign(), Some(1));
        assert_eq!(players.count(), 2);
        players.release(0);
        assert!(!players.is_connected(0));
        assert_eq!(players.assign(), Some(0));
    }

    #[test]
    fn test_assign_exhausts() {
        let mut players = PlayerManager::new();
        for _ in 0..MAX_PLAYERS {
            assert!(players.assign().is_some());
        }
        assert_eq!(players.assign(), None);
    }

    #[test]
    fn test_heartbeat_blinks_when_disconnected() {
        let leds = std::rc::Rc::new(std::cell::RefCell::new(MockLeds::default()));
        let mut handle = MockLedsHandle(leds.clone());
        let mut service = LedService::new();
        service.set_driver(&mut handle);

        service.task(100);
        let on_first = leds.borrow().player_led.unwrap().1;
        service.task(600);
        let on_second = leds.borrow().player_led.unwrap().1;
        assert_ne!(on_first, on_second);
    }

    #[test]
    fn test_connected_is_solid() {
        let leds = std::rc::Rc::new(std::cell::RefCell::new(MockLeds::default()));
        let mut handle = MockLedsHandle(leds.clone());
        let mut service = LedService::new();
        service.set_driver(&mut handle);
        service.set_connected(true);

        service.task(100);
        assert_eq!(leds.borrow().player_led, Some((0, true)));
        service.task(600);
        assert_eq!(leds.borrow().player_led, Some((0, true)));
    }

    #[test]
    fn test_profile_blink_count() {
        let leds = std::rc::Rc::new(std::cell::RefCell::new(MockLeds::default()));
        let mut handle = MockLedsHandle(leds.clone());
        let mut service = LedService::new();
        service.set_driver(&mut handle);
        service.set_connected(true);

        service.indicate_profile(1, 0); // 2 blinks = 4 edges
        let mut states = std::vec::Vec::new();
        for step in 0..4 {
            service.task(step * PROFILE_BLINK_MS);
            states.push(leds.borrow().player_led.unwrap().1);
        }
        assert_eq!(states, [true, false, true, false]);

        // Blink sequence exhausted: back to solid (connected).
        service.task(4 * PROFILE_BLINK_MS);
        assert_eq!(leds.borrow().player_led, Some((0, true)));
        assert_eq!(leds.borrow().set_count, 5);
    }

    #[test]
    fn test_feedback_sets_color() {
        let leds = std::rc::Rc::new(std::cell::RefCell::new(MockLeds::default()));
        let mut handle = MockLedsHandle(leds.clone());
        let mut service = LedService::new();
        service.set_driver(&mut handle);

        service.apply_feedback(&OutputFeedback {
            led_player: 2,
            led_r: 10,
            led_g: 20,
            led_b: 30,
            dirty: true,
            ..OutputFeedback::default()
        });
        assert_eq!(leds.borrow().player_led, Some((2, true)));
        assert_eq!(leds.borrow().color, Some((10, 20, 30)));
    }
}
