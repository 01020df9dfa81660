//! Key events and the desktop key listener

use std::sync::mpsc;
use std::time::Instant;

use device_query::{DeviceQuery, DeviceState, Keycode};

use super::layout;

/// A matrix transition, the engine's only input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub row: u8,
    pub col: u8,
    /// `true` on press, `false` on release
    pub pressed: bool,
    /// Host clock reading in milliseconds
    pub timestamp: u32,
}

impl KeyEvent {
    pub fn new(row: u8, col: u8, pressed: bool, timestamp: u32) -> Self {
        Self {
            row,
            col,
            pressed,
            timestamp,
        }
    }

    pub fn press(row: u8, col: u8, timestamp: u32) -> Self {
        Self::new(row, col, true, timestamp)
    }

    pub fn release(row: u8, col: u8, timestamp: u32) -> Self {
        Self::new(row, col, false, timestamp)
    }
}

/// A host key transition, before it is placed on the matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawKeyEvent {
    pub key: Keycode,
    pub pressed: bool,
    pub timestamp: u32,
}

impl RawKeyEvent {
    /// The matrix event for this key, `None` if it has no slot
    pub fn to_matrix(&self) -> Option<KeyEvent> {
        let pos = layout::position_of(self.key)?;
        Some(KeyEvent::new(pos.row, pos.col, self.pressed, self.timestamp))
    }
}

/// Millisecond clock starting at zero when created, wrapping like a
/// firmware timer
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u32 {
        // truncation is the wraparound
        self.epoch.elapsed().as_millis() as u32
    }
}

/// Keyboard listener that polls for key state changes
pub struct KeyboardListener {
    device_state: DeviceState,
    last_keys: Vec<Keycode>,
    clock: MonotonicClock,
    event_tx: mpsc::Sender<RawKeyEvent>,
}

impl KeyboardListener {
    /// Create a new keyboard listener stamping events with `clock`
    pub fn new(clock: MonotonicClock, event_tx: mpsc::Sender<RawKeyEvent>) -> Self {
        Self {
            device_state: DeviceState::new(),
            last_keys: Vec::new(),
            clock,
            event_tx,
        }
    }

    /// Poll for keyboard state changes.
    /// Returns the number of events generated
    pub fn poll(&mut self) -> usize {
        let current_keys = self.device_state.get_keys();
        let events = diff_keys(&self.last_keys, &current_keys, self.clock.now_ms());

        for event in &events {
            let _ = self.event_tx.send(*event);
        }

        self.last_keys = current_keys;
        events.len()
    }
}

/// Presses for keys new in `current`, then releases for keys gone from it
fn diff_keys(previous: &[Keycode], current: &[Keycode], timestamp: u32) -> Vec<RawKeyEvent> {
    let pressed = current
        .iter()
        .filter(|key| !previous.contains(key))
        .map(|&key| RawKeyEvent {
            key,
            pressed: true,
            timestamp,
        });
    let released = previous
        .iter()
        .filter(|key| !current.contains(key))
        .map(|&key| RawKeyEvent {
            key,
            pressed: false,
            timestamp,
        });
    pressed.chain(released).collect()
}
