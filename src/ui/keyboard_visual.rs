//! Press heatmap drawn over the key matrix

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    widgets::Widget,
};

use super::theme::ThemeColors;

const KEY_WIDTH: u16 = 5;
/// Columns between the two halves
const SPLIT_GAP: u16 = 2;

/// Heatmap of per-position press counts
pub struct KeyboardVisual<'a, const ROWS: usize, const COLS: usize> {
    positions: &'a [[u16; COLS]; ROWS],
    label: fn(u8, u8) -> &'static str,
    colors: ThemeColors,
    /// Slot of the last press, drawn bold
    highlight: Option<(u8, u8)>,
}

impl<'a, const ROWS: usize, const COLS: usize> KeyboardVisual<'a, ROWS, COLS> {
    pub fn new(
        positions: &'a [[u16; COLS]; ROWS],
        label: fn(u8, u8) -> &'static str,
        colors: ThemeColors,
    ) -> Self {
        Self {
            positions,
            label,
            colors,
            highlight: None,
        }
    }

    pub fn highlight(mut self, slot: Option<(u8, u8)>) -> Self {
        self.highlight = slot;
        self
    }

    fn busiest(&self) -> u16 {
        self.positions
            .iter()
            .flat_map(|row| row.iter().copied())
            .max()
            .unwrap_or(0)
    }

    /// Width needed to draw every column
    pub fn required_width() -> u16 {
        COLS as u16 * KEY_WIDTH + SPLIT_GAP
    }

    fn column_x(area: Rect, col: usize) -> u16 {
        let gap = if col >= COLS / 2 { SPLIT_GAP } else { 0 };
        area.x + col as u16 * KEY_WIDTH + gap
    }
}

impl<const ROWS: usize, const COLS: usize> Widget for KeyboardVisual<'_, ROWS, COLS> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < Self::required_width() || area.height < ROWS as u16 {
            buf.set_string(
                area.x,
                area.y,
                "⌨ Window too small",
                Style::default().fg(self.colors.key_text),
            );
            return;
        }

        let busiest = self.busiest();
        for (row, counts) in self.positions.iter().enumerate() {
            let y = area.y + row as u16;
            for (col, &count) in counts.iter().enumerate() {
                let label = (self.label)(row as u8, col as u8);
                if label.is_empty() && count == 0 {
                    continue;
                }
                let ratio = if busiest == 0 {
                    0.0
                } else {
                    f64::from(count) / f64::from(busiest)
                };

                let mut style = Style::default()
                    .bg(self.colors.heat(ratio))
                    .fg(self.colors.heat_text(ratio));
                if self.highlight == Some((row as u8, col as u8)) {
                    style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
                }

                let text: String = label.chars().take(KEY_WIDTH as usize - 1).collect();
                let cell = format!("{:^w$}", text, w = KEY_WIDTH as usize - 1);
                buf.set_string(Self::column_x(area, col), y, cell, style);
            }
        }
    }
}
