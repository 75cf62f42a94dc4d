//! Chat subsystem settings sourced from the system parameter store.
//!
//! Values live in the externally-owned `Chat` parameter namespace and are
//! injected at call time rather than held as process-wide state, so the core
//! stays testable in isolation. Out-of-range values are clamped; unparsable
//! ones are reported to the caller and leave the default in place.

use serde::{Deserialize, Serialize};

/// Effective chat configuration after parsing and range clamping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSettings {
    /// Client poll spacing in seconds (1-60).
    pub poll_interval_seconds: u64,
    /// Upper bound for a long-poll request in seconds (5-30).
    pub long_poll_timeout_seconds: u64,
    /// Forward transcripts automatically after close.
    pub auto_forward_chat: bool,
    /// Require an explicit staff confirmation before forwarding.
    pub ask_before_forward: bool,
    /// Delay before an automatic forward, in minutes (0 = immediate).
    pub forward_delay_minutes: u64,
    /// Retention window consumed by the external purge job (>= 30).
    pub max_chat_history_days: u32,
}

impl ChatSettings {
    /// Parameter store namespace for all chat settings.
    pub const NAMESPACE: &'static str = "Chat";

    pub const KEY_POLL_INTERVAL: &'static str = "poll_interval_seconds";
    pub const KEY_LONG_POLL_TIMEOUT: &'static str = "long_poll_timeout_seconds";
    pub const KEY_AUTO_FORWARD: &'static str = "auto_forward_chat";
    pub const KEY_ASK_BEFORE_FORWARD: &'static str = "ask_before_forward";
    pub const KEY_FORWARD_DELAY: &'static str = "forward_delay_minutes";
    pub const KEY_MAX_HISTORY_DAYS: &'static str = "max_chat_history_days";

    /// All recognized keys, in documentation order.
    pub const KEYS: [&'static str; 6] = [
        Self::KEY_POLL_INTERVAL,
        Self::KEY_LONG_POLL_TIMEOUT,
        Self::KEY_AUTO_FORWARD,
        Self::KEY_ASK_BEFORE_FORWARD,
        Self::KEY_FORWARD_DELAY,
        Self::KEY_MAX_HISTORY_DAYS,
    ];

    /// Apply a raw parameter value to the corresponding field.
    ///
    /// Returns true iff the key is recognized and the value parsed. Numeric
    /// values are clamped to their documented range; an unparsable value
    /// leaves the field at its current (default) value and returns false.
    pub fn apply_raw(&mut self, key: &str, raw: &str) -> bool {
        match key {
            Self::KEY_POLL_INTERVAL => {
                apply_clamped(raw, 1, 60, &mut self.poll_interval_seconds)
            }
            Self::KEY_LONG_POLL_TIMEOUT => {
                apply_clamped(raw, 5, 30, &mut self.long_poll_timeout_seconds)
            }
            Self::KEY_AUTO_FORWARD => apply_yes_no(raw, &mut self.auto_forward_chat),
            Self::KEY_ASK_BEFORE_FORWARD => apply_yes_no(raw, &mut self.ask_before_forward),
            Self::KEY_FORWARD_DELAY => {
                apply_clamped(raw, 0, u64::MAX, &mut self.forward_delay_minutes)
            }
            Self::KEY_MAX_HISTORY_DAYS => {
                let mut days = u64::from(self.max_chat_history_days);
                let ok = apply_clamped(raw, 30, u64::from(u32::MAX), &mut days);
                self.max_chat_history_days = days as u32;
                ok
            }
            _ => false,
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 3,
            long_poll_timeout_seconds: 10,
            auto_forward_chat: false,
            ask_before_forward: false,
            forward_delay_minutes: 0,
            max_chat_history_days: 365,
        }
    }
}

fn apply_clamped(raw: &str, min: u64, max: u64, field: &mut u64) -> bool {
    match raw.trim().parse::<u64>() {
        Ok(v) => {
            *field = v.clamp(min, max);
            true
        }
        Err(_) => false,
    }
}

fn apply_yes_no(raw: &str, field: &mut bool) -> bool {
    match raw.trim().to_lowercase().as_str() {
        "yes" | "true" | "1" => {
            *field = true;
            true
        }
        "no" | "false" | "0" => {
            *field = false;
            true
        }
        _ => false,
    }
}
