//! Theme color definitions for the UI
//!
//! Dark and light palettes, plus the cold-to-hot ramp used by the heatmap.

use crate::config::Theme;
use ratatui::style::Color;

/// Complete color palette for the UI
#[derive(Debug, Clone, Copy)]
pub struct ThemeColors {
    /// Main background
    pub bg: Color,
    /// Primary foreground text
    pub fg: Color,
    /// Dimmed/secondary text
    pub dim: Color,
    /// Accent color (headings, active tab)
    pub accent: Color,
    /// Values that look healthy
    pub good: Color,
    /// Values worth a second look
    pub warn: Color,
    /// Unused key background
    pub key_idle: Color,
    /// Coldest used key
    pub heat_low: Color,
    /// Most used key
    pub heat_high: Color,
    /// Key label text on cold keys
    pub key_text: Color,
    /// Key label text on hot keys
    pub key_text_hot: Color,
}

impl ThemeColors {
    /// Create a color palette for the given theme variant
    pub fn from_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self::dark(),
            Theme::Light => Self::light(),
        }
    }

    pub fn dark() -> Self {
        Self {
            bg: Color::Rgb(22, 22, 30),
            fg: Color::Rgb(200, 200, 210),
            dim: Color::Rgb(90, 90, 110),
            accent: Color::Rgb(80, 200, 220),
            good: Color::Rgb(80, 200, 120),
            warn: Color::Rgb(240, 180, 80),
            key_idle: Color::Rgb(40, 40, 50),
            heat_low: Color::Rgb(40, 70, 120),
            heat_high: Color::Rgb(240, 90, 60),
            key_text: Color::Rgb(180, 180, 190),
            key_text_hot: Color::Rgb(20, 20, 25),
        }
    }

    /// High contrast for bright terminals
    pub fn light() -> Self {
        Self {
            bg: Color::Rgb(245, 245, 248),
            fg: Color::Rgb(30, 30, 40),
            dim: Color::Rgb(130, 130, 150),
            accent: Color::Rgb(0, 130, 160),
            good: Color::Rgb(30, 150, 70),
            warn: Color::Rgb(180, 120, 0),
            key_idle: Color::Rgb(220, 220, 228),
            heat_low: Color::Rgb(170, 200, 240),
            heat_high: Color::Rgb(210, 50, 40),
            key_text: Color::Rgb(50, 50, 60),
            key_text_hot: Color::Rgb(255, 255, 255),
        }
    }

    /// Heatmap color for a key at `ratio` of the busiest key's count.
    ///
    /// Zero maps to the idle color; anything above interpolates from
    /// `heat_low` to `heat_high`.
    pub fn heat(&self, ratio: f64) -> Color {
        if ratio <= 0.0 {
            return self.key_idle;
        }
        let t = ratio.min(1.0);
        match (self.heat_low, self.heat_high) {
            (Color::Rgb(r0, g0, b0), Color::Rgb(r1, g1, b1)) => {
                Color::Rgb(lerp(r0, r1, t), lerp(g0, g1, t), lerp(b0, b1, t))
            }
            (low, high) => {
                if t < 0.5 {
                    low
                } else {
                    high
                }
            }
        }
    }

    /// Label color that stays readable on `heat(ratio)`
    pub fn heat_text(&self, ratio: f64) -> Color {
        if ratio >= 0.5 {
            self.key_text_hot
        } else {
            self.key_text
        }
    }
}

fn lerp(a: u8, b: u8, t: f64) -> u8 {
    let v = f64::from(a) + (f64::from(b) - f64::from(a)) * t;
    v.round().clamp(0.0, 255.0) as u8
}
