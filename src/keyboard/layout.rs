//! Virtual 5x14 matrix for a desktop ANSI keyboard
//!
//! The desktop monitor has no real switch matrix, so every key the host
//! reports is placed on a fixed grid laid out like a split board: columns
//! 0-6 are the left hand, 7-13 the right. Keys without a slot are not
//! counted.

use device_query::Keycode;

use crate::matrix::{Matrix, Position};
use crate::stats::Modifier;

pub const ROWS: usize = 5;
pub const COLS: usize = 14;

/// Geometry of the virtual matrix
pub type HostMatrix = Matrix<ROWS, COLS>;

/// Key placement: keycode, row, column, label
struct Slot(Keycode, u8, u8, &'static str);

const SLOTS: &[Slot] = &[
    // Row 0: number row
    Slot(Keycode::Grave, 0, 0, "`"),
    Slot(Keycode::Key1, 0, 1, "1"),
    Slot(Keycode::Key2, 0, 2, "2"),
    Slot(Keycode::Key3, 0, 3, "3"),
    Slot(Keycode::Key4, 0, 4, "4"),
    Slot(Keycode::Key5, 0, 5, "5"),
    Slot(Keycode::Key6, 0, 6, "6"),
    Slot(Keycode::Key7, 0, 7, "7"),
    Slot(Keycode::Key8, 0, 8, "8"),
    Slot(Keycode::Key9, 0, 9, "9"),
    Slot(Keycode::Key0, 0, 10, "0"),
    Slot(Keycode::Minus, 0, 11, "-"),
    Slot(Keycode::Equal, 0, 12, "="),
    Slot(Keycode::Backspace, 0, 13, "Bksp"),
    // Row 1: top letter row
    Slot(Keycode::Tab, 1, 0, "Tab"),
    Slot(Keycode::Q, 1, 1, "Q"),
    Slot(Keycode::W, 1, 2, "W"),
    Slot(Keycode::E, 1, 3, "E"),
    Slot(Keycode::R, 1, 4, "R"),
    Slot(Keycode::T, 1, 5, "T"),
    Slot(Keycode::Y, 1, 7, "Y"),
    Slot(Keycode::U, 1, 8, "U"),
    Slot(Keycode::I, 1, 9, "I"),
    Slot(Keycode::O, 1, 10, "O"),
    Slot(Keycode::P, 1, 11, "P"),
    Slot(Keycode::LeftBracket, 1, 12, "["),
    Slot(Keycode::RightBracket, 1, 13, "]"),
    // Row 2: home row
    Slot(Keycode::CapsLock, 2, 0, "Caps"),
    Slot(Keycode::A, 2, 1, "A"),
    Slot(Keycode::S, 2, 2, "S"),
    Slot(Keycode::D, 2, 3, "D"),
    Slot(Keycode::F, 2, 4, "F"),
    Slot(Keycode::G, 2, 5, "G"),
    Slot(Keycode::H, 2, 7, "H"),
    Slot(Keycode::J, 2, 8, "J"),
    Slot(Keycode::K, 2, 9, "K"),
    Slot(Keycode::L, 2, 10, "L"),
    Slot(Keycode::Semicolon, 2, 11, ";"),
    Slot(Keycode::Apostrophe, 2, 12, "'"),
    Slot(Keycode::Enter, 2, 13, "Enter"),
    // Row 3: bottom letter row
    Slot(Keycode::LShift, 3, 0, "Shift"),
    Slot(Keycode::Z, 3, 1, "Z"),
    Slot(Keycode::X, 3, 2, "X"),
    Slot(Keycode::C, 3, 3, "C"),
    Slot(Keycode::V, 3, 4, "V"),
    Slot(Keycode::B, 3, 5, "B"),
    Slot(Keycode::N, 3, 7, "N"),
    Slot(Keycode::M, 3, 8, "M"),
    Slot(Keycode::Comma, 3, 9, ","),
    Slot(Keycode::Dot, 3, 10, "."),
    Slot(Keycode::Slash, 3, 11, "/"),
    Slot(Keycode::RShift, 3, 12, "Shift"),
    Slot(Keycode::BackSlash, 3, 13, "\\"),
    // Row 4: modifiers, thumbs and arrows
    Slot(Keycode::LControl, 4, 0, "Ctrl"),
    Slot(Keycode::LMeta, 4, 1, "Gui"),
    Slot(Keycode::LAlt, 4, 2, "Alt"),
    Slot(Keycode::Escape, 4, 3, "Esc"),
    Slot(Keycode::Space, 4, 6, "Space"),
    Slot(Keycode::RAlt, 4, 7, "AltGr"),
    Slot(Keycode::RMeta, 4, 8, "Gui"),
    Slot(Keycode::Left, 4, 9, "←"),
    Slot(Keycode::Down, 4, 10, "↓"),
    Slot(Keycode::Up, 4, 11, "↑"),
    Slot(Keycode::Right, 4, 12, "→"),
    Slot(Keycode::RControl, 4, 13, "Ctrl"),
];

/// Matrix slot of a host key, `None` for keys the grid does not cover
pub fn position_of(key: Keycode) -> Option<Position> {
    SLOTS
        .iter()
        .find(|slot| slot.0 == key)
        .map(|slot| Position::new(slot.1, slot.2))
}

/// Keycap label at a matrix slot, empty for unused slots
pub fn label(row: u8, col: u8) -> &'static str {
    SLOTS
        .iter()
        .find(|slot| slot.1 == row && slot.2 == col)
        .map(|slot| slot.3)
        .unwrap_or("")
}

/// The HID modifier a host key stands for
pub fn modifier_of(key: Keycode) -> Option<Modifier> {
    match key {
        Keycode::LControl => Some(Modifier::LCtrl),
        Keycode::LShift => Some(Modifier::LShift),
        Keycode::LAlt => Some(Modifier::LAlt),
        Keycode::LMeta => Some(Modifier::LGui),
        Keycode::RControl => Some(Modifier::RCtrl),
        Keycode::RShift => Some(Modifier::RShift),
        Keycode::RAlt => Some(Modifier::RAlt),
        Keycode::RMeta => Some(Modifier::RGui),
        _ => None,
    }
}
