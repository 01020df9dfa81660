//! The desktop stand-in for keyboard firmware

use super::event::{MonotonicClock, RawKeyEvent};
use super::state::KeyboardState;
use crate::engine::Host;
use crate::stats::ModMask;

/// Host backed by the process clock and the polled keyboard state
#[derive(Debug, Clone, Default)]
pub struct SystemHost {
    clock: MonotonicClock,
    state: KeyboardState,
}

impl SystemHost {
    pub fn new(clock: MonotonicClock) -> Self {
        Self {
            clock,
            state: KeyboardState::new(),
        }
    }

    pub fn clock(&self) -> MonotonicClock {
        self.clock
    }

    pub fn state(&self) -> &KeyboardState {
        &self.state
    }

    /// Feed a host key transition into modifier and speed tracking
    pub fn observe(&mut self, event: &RawKeyEvent) {
        self.state.process_event(event);
    }

    pub fn tick(&mut self) {
        let now = self.clock.now_ms();
        self.state.tick(now);
    }
}

impl Host for SystemHost {
    fn now_ms(&self) -> u32 {
        self.clock.now_ms()
    }

    fn current_wpm(&self) -> u16 {
        self.state.wpm()
    }

    fn modifiers(&self) -> ModMask {
        self.state.modifiers()
    }
}
