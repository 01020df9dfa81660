//! Modifier keys and the 8-bit modifier mask

use serde::{Deserialize, Serialize};

/// One of the eight HID modifier keys.
///
/// The discriminant is both the counter slot and the bit position in the
/// HID modifier byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modifier {
    LCtrl = 0,
    LShift = 1,
    LAlt = 2,
    LGui = 3,
    RCtrl = 4,
    RShift = 5,
    RAlt = 6,
    RGui = 7,
}

/// Number of modifier counters
pub const MODIFIER_COUNT: usize = 8;

impl Modifier {
    pub const ALL: [Modifier; MODIFIER_COUNT] = [
        Self::LCtrl,
        Self::LShift,
        Self::LAlt,
        Self::LGui,
        Self::RCtrl,
        Self::RShift,
        Self::RAlt,
        Self::RGui,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn bit(self) -> u8 {
        1 << (self as u8)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::LCtrl => "LCtrl",
            Self::LShift => "LShift",
            Self::LAlt => "LAlt",
            Self::LGui => "LGui",
            Self::RCtrl => "RCtrl",
            Self::RShift => "RShift",
            Self::RAlt => "RAlt",
            Self::RGui => "RGui",
        }
    }
}

/// Set of modifiers held during a key press
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ModMask(pub u8);

impl ModMask {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn contains(self, modifier: Modifier) -> bool {
        self.0 & modifier.bit() != 0
    }

    pub fn insert(&mut self, modifier: Modifier) {
        self.0 |= modifier.bit();
    }

    pub fn remove(&mut self, modifier: Modifier) {
        self.0 &= !modifier.bit();
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Held modifiers in counter-slot order
    pub fn iter(self) -> impl Iterator<Item = Modifier> {
        Modifier::ALL.into_iter().filter(move |m| self.contains(*m))
    }
}

impl From<u8> for ModMask {
    fn from(bits: u8) -> Self {
        Self(bits)
    }
}

impl std::ops::BitOr for ModMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
