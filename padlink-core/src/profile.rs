//! Profile engine: button remapping, stick calibration and combo hotkeys.
//!
//! Profiles sit between the raw input event and the wire report. A
//! built-in profile (fixed per output target) runs first, then the active
//! custom profile if one is selected. Combo rules are evaluated against
//! the raw buttons the player physically holds, before any remapping, so
//! a chord means the same thing in every profile.
//!
//! Profile index convention: index 0 is "built-in only"; indices
//! `1..=PROFILE_SLOTS` select a custom slot on top of the built-in table.

use padlink_proto::record::{flags, PROFILE_SLOTS};
use padlink_proto::{
    Buttons, ComboAction, ComboRule, CustomProfile, InputEvent, ProfileOutput, SettingsRecord,
    AXIS_CENTER, MAX_PLAYERS,
};

use crate::interface::OutputTarget;

/// Total selectable profiles: the built-in plus the custom slots.
pub const PROFILE_COUNT: u8 = (1 + PROFILE_SLOTS) as u8;

const fn identity_remap() -> [u8; 32] {
    let mut table = [0u8; 32];
    let mut i = 0;
    while i < 32 {
        table[i] = i as u8;
        i += 1;
    }
    table
}

/// Fixed remap table + combo rules for one output target.
pub struct BuiltinProfile {
    pub remap: [u8; 32],
    pub rules: &'static [ComboRule],
}

/// S1+S2 held for a second synthesizes the home button, which many
/// targets have no physical key for.
const HOME_CHORD: [ComboRule; 1] = [ComboRule {
    mask: Buttons::S1.0 | Buttons::S2.0,
    hold_ms: 1000,
    action: ComboAction::Synthesize(16), // A1
}];

static USB_DEVICE_BUILTIN: BuiltinProfile = BuiltinProfile {
    remap: identity_remap(),
    rules: &HOME_CHORD,
};

static GAMECUBE_BUILTIN: BuiltinProfile = BuiltinProfile {
    // Paddles act as the shoulders the GameCube pad lacks.
    remap: {
        let mut table = identity_remap();
        table[20] = 8; // L4 -> L1
        table[21] = 9; // R4 -> R1
        table
    },
    rules: &HOME_CHORD,
};

static PCENGINE_BUILTIN: BuiltinProfile = BuiltinProfile {
    // Two-button pad: collapse the four face buttons onto I/II.
    remap: {
        let mut table = identity_remap();
        table[6] = 4; // B3 -> B1
        table[7] = 5; // B4 -> B2
        table
    },
    rules: &[],
};

static UART_BUILTIN: BuiltinProfile = BuiltinProfile {
    remap: identity_remap(),
    rules: &[],
};

impl BuiltinProfile {
    /// The fixed profile for an output target.
    #[must_use]
    pub fn for_target(target: OutputTarget) -> &'static BuiltinProfile {
        match target {
            OutputTarget::UsbDevice => &USB_DEVICE_BUILTIN,
            OutputTarget::GameCube => &GAMECUBE_BUILTIN,
            OutputTarget::PcEngine => &PCENGINE_BUILTIN,
            OutputTarget::Uart => &UART_BUILTIN,
        }
    }
}

fn remap_buttons(buttons: Buttons, table: &[u8; 32]) -> Buttons {
    let mut out = 0u32;
    let mut bits = buttons.raw();
    while bits != 0 {
        let src = bits.trailing_zeros() as usize;
        bits &= bits - 1;
        out |= 1 << (table[src] & 31);
    }
    Buttons(out)
}

fn scale_axis(v: u8, sens_pct: u8) -> u8 {
    let centered = v as i32 - AXIS_CENTER as i32;
    let scaled = centered * sens_pct as i32 / 100;
    (AXIS_CENTER as i32 + scaled).clamp(0, 255) as u8
}

/// Combo detection state for one player.
///
/// States: idle, arming (chord held, dwell running), fired (action
/// active until the chord releases).
#[derive(Clone, Copy, Default)]
enum ComboPhase {
    #[default]
    Idle,
    Arming {
        rule: ComboRule,
        since_ms: u32,
    },
    Fired {
        rule: ComboRule,
    },
}

#[derive(Clone, Copy, Default)]
pub struct ComboState {
    phase: ComboPhase,
}

impl ComboState {
    /// Advance the state machine; returns the rule newly fired this tick,
    /// if any.
    fn update(
        &mut self,
        buttons: Buttons,
        builtin_rules: &[ComboRule],
        custom_rules: &[ComboRule],
        now_ms: u32,
    ) -> Option<ComboRule> {
        let best = best_match(buttons, builtin_rules, custom_rules);

        match self.phase {
            ComboPhase::Idle => {
                if let Some(rule) = best {
                    self.phase = ComboPhase::Arming {
                        rule,
                        since_ms: now_ms,
                    };
                }
                None
            }
            ComboPhase::Arming { rule, since_ms } => {
                match best {
                    Some(current) if rules_equal(&current, &rule) => {
                        if now_ms.wrapping_sub(since_ms) >= rule.hold_ms as u32 {
                            self.phase = ComboPhase::Fired { rule };
                            Some(rule)
                        } else {
                            None
                        }
                    }
                    Some(other) => {
                        // A more specific chord took over; restart the dwell.
                        self.phase = ComboPhase::Arming {
                            rule: other,
                            since_ms: now_ms,
                        };
                        None
                    }
                    None => {
                        self.phase = ComboPhase::Idle;
                        None
                    }
                }
            }
            ComboPhase::Fired { rule } => {
                if !buttons.contains(Buttons(rule.mask)) {
                    self.phase = ComboPhase::Idle;
                }
                None
            }
        }
    }

    /// The rule currently held in the fired state, if any.
    fn active(&self) -> Option<ComboRule> {
        match self.phase {
            ComboPhase::Fired { rule } => Some(rule),
            _ => None,
        }
    }
}

fn rules_equal(a: &ComboRule, b: &ComboRule) -> bool {
    a.mask == b.mask && a.hold_ms == b.hold_ms && a.action == b.action
}

/// Pick the matching rule with the largest mask; ties go to the first
/// declared (built-in rules precede custom ones).
fn best_match(
    buttons: Buttons,
    builtin_rules: &[ComboRule],
    custom_rules: &[ComboRule],
) -> Option<ComboRule> {
    let mut best: Option<ComboRule> = None;
    for rule in builtin_rules.iter().chain(custom_rules.iter()) {
        if rule.mask == 0 || !buttons.contains(Buttons(rule.mask)) {
            continue;
        }
        let beats = match &best {
            None => true,
            Some(current) => rule.mask.count_ones() > current.mask.count_ones(),
        };
        if beats {
            best = Some(*rule);
        }
    }
    best
}

/// The profile engine: owns the custom slots, the active index and one
/// combo state per player.
pub struct ProfileEngine {
    profiles: [CustomProfile; PROFILE_SLOTS],
    active: u8,
    combos: [ComboState; MAX_PLAYERS],
    telemetry: Option<fn(&ProfileOutput)>,
    pending_switch: Option<u8>,
}

impl ProfileEngine {
    /// Engine with identity custom slots and the built-in profile active.
    #[must_use]
    pub fn new() -> Self {
        Self {
            profiles: [CustomProfile::identity(); PROFILE_SLOTS],
            active: 0,
            combos: [ComboState::default(); MAX_PLAYERS],
            telemetry: None,
            pending_switch: None,
        }
    }

    /// Engine loaded from the persisted settings record.
    #[must_use]
    pub fn from_record(record: &SettingsRecord) -> Self {
        let mut engine = Self::new();
        engine.profiles = record.profiles;
        engine.set_active_profile(record.active_profile_index);
        engine
    }

    /// Install the post-profile telemetry tap (configuration console).
    pub fn set_telemetry_tap(&mut self, tap: fn(&ProfileOutput)) {
        self.telemetry = Some(tap);
    }

    #[must_use]
    pub const fn profile_count(&self) -> u8 {
        PROFILE_COUNT
    }

    #[must_use]
    pub const fn active_profile(&self) -> u8 {
        self.active
    }

    /// Select a profile; out-of-range indices are ignored.
    pub fn set_active_profile(&mut self, index: u8) {
        if index < PROFILE_COUNT {
            self.active = index;
        }
    }

    #[must_use]
    pub fn profile_name(&self, index: u8) -> &'static str {
        match index {
            0 => "built-in",
            1 => "custom 1",
            2 => "custom 2",
            _ => "?",
        }
    }

    /// Profile switch requested by a combo since the last call, for the
    /// caller to persist.
    pub fn take_pending_switch(&mut self) -> Option<u8> {
        self.pending_switch.take()
    }

    fn active_custom(&self) -> Option<&CustomProfile> {
        match self.active {
            0 => None,
            n => self.profiles.get(n as usize - 1),
        }
    }

    /// Run one event through the profile chain.
    ///
    /// Order: combo detection on the raw buttons, built-in remap, custom
    /// remap + stick scaling/flags, motion/pressure passthrough,
    /// telemetry tap.
    pub fn apply(
        &mut self,
        player: u8,
        event: &InputEvent,
        builtin: Option<&BuiltinProfile>,
        now_ms: u32,
    ) -> ProfileOutput {
        let builtin_rules = builtin.map(|b| b.rules).unwrap_or(&[]);
        let custom = self.active_custom().copied();
        let custom_rules = custom
            .as_ref()
            .map(CustomProfile::active_rules)
            .unwrap_or(&[]);

        let combo_slot = (player as usize).min(MAX_PLAYERS - 1);
        let mut combos = self.combos[combo_slot];
        let fired = combos.update(event.buttons, builtin_rules, custom_rules, now_ms);
        self.combos[combo_slot] = combos;

        if let Some(rule) = fired {
            if let ComboAction::SwitchProfile(index) = rule.action {
                self.set_active_profile(index);
                self.pending_switch = Some(index);
            }
        }

        // The chord itself never reaches the wire while its action holds.
        let mut effective = event.buttons;
        if let Some(rule) = self.combos[combo_slot].active() {
            effective &= !Buttons(rule.mask);
            if let ComboAction::Synthesize(bit) = rule.action {
                effective |= Buttons(1 << (bit & 31));
            }
        }

        let mut out = ProfileOutput::passthrough(event);
        out.buttons = effective;

        if let Some(builtin) = builtin {
            out.buttons = remap_buttons(out.buttons, &builtin.remap);
        }

        if let Some(custom) = &custom {
            out.buttons = remap_buttons(out.buttons, &custom.remap);
            out.lx = scale_axis(out.lx, custom.sens_left);
            out.ly = scale_axis(out.ly, custom.sens_left);
            out.rx = scale_axis(out.rx, custom.sens_right);
            out.ry = scale_axis(out.ry, custom.sens_right);
            if custom.flags & flags::SWAP_STICKS != 0 {
                core::mem::swap(&mut out.lx, &mut out.rx);
                core::mem::swap(&mut out.ly, &mut out.ry);
            }
            if custom.flags & flags::INVERT_LY != 0 {
                out.ly = 255 - out.ly;
            }
            if custom.flags & flags::INVERT_RY != 0 {
                out.ry = 255 - out.ry;
            }
        }

        if let Some(tap) = self.telemetry {
            tap(&out);
        }

        out
    }
}

impl Default for ProfileEngine {
    fn default() -> Self {
        Self::new()
    }
}
