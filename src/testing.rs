//! Scriptable host for tests and demos

use crate::engine::Host;
use crate::stats::ModMask;

/// A [`Host`] whose clock and inputs are set by hand
#[derive(Debug, Clone)]
pub struct TestHost {
    now: u32,
    wpm: u16,
    mods: ModMask,
    default_layers: u32,
}

impl Default for TestHost {
    fn default() -> Self {
        Self::at(0)
    }
}

impl TestHost {
    /// Host whose clock reads `now`
    pub fn at(now: u32) -> Self {
        Self {
            now,
            wpm: 0,
            mods: ModMask::empty(),
            default_layers: 1,
        }
    }

    pub fn set_now(&mut self, now: u32) {
        self.now = now;
    }

    /// Move the clock forward, wrapping like a hardware timer
    pub fn advance(&mut self, ms: u32) {
        self.now = self.now.wrapping_add(ms);
    }

    pub fn set_wpm(&mut self, wpm: u16) {
        self.wpm = wpm;
    }

    pub fn set_modifiers(&mut self, mods: ModMask) {
        self.mods = mods;
    }

    pub fn set_default_layer_state(&mut self, state: u32) {
        self.default_layers = state;
    }
}

impl Host for TestHost {
    fn now_ms(&self) -> u32 {
        self.now
    }

    fn current_wpm(&self) -> u16 {
        self.wpm
    }

    fn modifiers(&self) -> ModMask {
        self.mods
    }

    fn default_layer_state(&self) -> u32 {
        self.default_layers
    }
}
