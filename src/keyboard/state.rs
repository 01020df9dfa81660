//! Keyboard state tracking: held modifiers and a typing-speed estimate

use device_query::Keycode;

use super::event::RawKeyEvent;
use super::layout;
use crate::stats::ModMask;
use crate::utils::elapsed_ms;

const CHARS_PER_WORD: u32 = 5;
/// Window averaged by the speed meter
const SPEED_SAMPLES: u32 = 5;
const SPEED_WINDOW_MS: u32 = 1_000;

/// Instantaneous WPM from presses per one-second window, averaged over the
/// last few windows. An idle window drops the estimate to zero at once.
#[derive(Debug, Clone, Default)]
pub struct SpeedMeter {
    presses: u32,
    wpm: u16,
    windows: u32,
    window_start: Option<u32>,
}

impl SpeedMeter {
    pub fn record_press(&mut self) {
        self.presses = self.presses.saturating_add(1);
    }

    /// Close every window that ended before `now`
    pub fn update(&mut self, now: u32) {
        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            return;
        };
        if elapsed_ms(now, start) < SPEED_WINDOW_MS {
            return;
        }
        self.window_start = Some(now);

        self.windows = (self.windows + 1).min(SPEED_SAMPLES);
        let instant = self.presses * 60 / CHARS_PER_WORD;
        self.presses = 0;

        if instant == 0 {
            self.windows = 0;
            self.wpm = 0;
            return;
        }
        let avg = (u32::from(self.wpm) * (self.windows - 1) + instant) / self.windows;
        self.wpm = avg.min(u32::from(u16::MAX)) as u16;
    }

    pub fn wpm(&self) -> u16 {
        self.wpm
    }
}

/// Overall keyboard state
#[derive(Debug, Clone, Default)]
pub struct KeyboardState {
    /// Keys currently down
    held: Vec<Keycode>,
    mods: ModMask,
    meter: SpeedMeter,
    /// Host key presses seen, mapped or not
    total_presses: u64,
}

impl KeyboardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a key event and update state
    pub fn process_event(&mut self, event: &RawKeyEvent) {
        if let Some(modifier) = layout::modifier_of(event.key) {
            if event.pressed {
                self.mods.insert(modifier);
            } else {
                self.mods.remove(modifier);
            }
        }

        if event.pressed {
            self.total_presses += 1;
            if !self.held.contains(&event.key) {
                self.held.push(event.key);
            }
            if layout::modifier_of(event.key).is_none() {
                self.meter.record_press();
            }
        } else {
            self.held.retain(|k| *k != event.key);
        }
    }

    pub fn tick(&mut self, now: u32) {
        self.meter.update(now);
    }

    /// Modifiers held right now
    pub fn modifiers(&self) -> ModMask {
        self.mods
    }

    pub fn wpm(&self) -> u16 {
        self.meter.wpm()
    }

    /// Get all currently pressed keys
    pub fn held_keys(&self) -> &[Keycode] {
        &self.held
    }

    pub fn total_presses(&self) -> u64 {
        self.total_presses
    }
}
