//! Custom TUI widgets

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use super::theme::ThemeColors;

/// How a figure should be colored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Good,
    Warn,
}

/// A labelled value in a stats panel
#[derive(Debug, Clone, PartialEq)]
pub struct StatLine {
    pub label: String,
    pub value: String,
    pub tone: Tone,
}

impl StatLine {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            tone: Tone::Plain,
        }
    }

    pub fn good(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tone: Tone::Good,
            ..Self::new(label, value)
        }
    }

    pub fn warn(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tone: Tone::Warn,
            ..Self::new(label, value)
        }
    }

    /// Section heading, rendered without a value
    pub fn heading(label: impl Into<String>) -> Self {
        Self::new(label, "")
    }

    fn is_heading(&self) -> bool {
        self.value.is_empty()
    }
}

/// Bordered list of [`StatLine`]s
pub struct StatsPanel<'a> {
    lines: &'a [StatLine],
    title: &'a str,
    colors: ThemeColors,
}

impl<'a> StatsPanel<'a> {
    pub fn new(lines: &'a [StatLine], title: &'a str, colors: ThemeColors) -> Self {
        Self {
            lines,
            title,
            colors,
        }
    }
}

impl Widget for StatsPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(format!(" {} ", self.title))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.colors.dim));

        let inner = block.inner(area);
        block.render(area, buf);

        let label_width = self
            .lines
            .iter()
            .filter(|l| !l.is_heading())
            .map(|l| l.label.len())
            .max()
            .unwrap_or(0);

        for (i, stat) in self.lines.iter().enumerate() {
            let y = inner.y + i as u16;
            if y >= inner.y + inner.height {
                break;
            }

            if stat.is_heading() {
                let style = Style::default()
                    .fg(self.colors.accent)
                    .add_modifier(Modifier::BOLD);
                buf.set_string(inner.x + 1, y, &stat.label, style);
                continue;
            }

            let color = match stat.tone {
                Tone::Plain => self.colors.fg,
                Tone::Good => self.colors.good,
                Tone::Warn => self.colors.warn,
            };
            let line = Line::from(vec![
                Span::styled(
                    format!("  {:<w$}  ", stat.label, w = label_width),
                    Style::default().fg(self.colors.dim),
                ),
                Span::styled(stat.value.as_str(), Style::default().fg(color)),
            ]);
            buf.set_line(inner.x, y, &line, inner.width);
        }
    }
}

/// Widget for the help screen
pub struct HelpPanel {
    colors: ThemeColors,
}

impl HelpPanel {
    pub fn new(colors: ThemeColors) -> Self {
        Self { colors }
    }
}

const HELP_TEXT: &[&str] = &[
    "",
    " NAVIGATION",
    " Tab / Shift+Tab  : Switch views",
    " 1-5              : Jump to a view",
    " q / Esc          : Save and quit",
    "",
    " STATISTICS",
    " n                : Start a new session",
    " R                : Reset all counters",
    " s                : Save counters now",
    " e                : Export report to JSON",
    " ?                : Show this help",
    "",
    " VIEWS",
    " 1. Overview      : Totals, speed and hand balance",
    " 2. Heatmap       : Presses per key",
    " 3. Layers        : Layer and modifier usage",
    " 4. Pairs         : Most frequent key pairs",
    "",
    " Counters are saved every couple of minutes while you type.",
];

impl Widget for HelpPanel {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Help - Typing Stats ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.colors.accent));

        let inner = block.inner(area);
        block.render(area, buf);

        for (i, line) in HELP_TEXT.iter().enumerate() {
            if i as u16 >= inner.height {
                break;
            }
            let heading = line
                .trim_start()
                .split(' ')
                .next()
                .is_some_and(|w| !w.is_empty() && w.chars().all(|c| c.is_ascii_uppercase()));
            let style = if heading {
                Style::default()
                    .fg(self.colors.warn)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(self.colors.fg)
            };
            buf.set_string(inner.x, inner.y + i as u16, line, style);
        }
    }
}

/// Status bar widget
pub struct StatusBar<'a> {
    storage: &'a str,
    view: &'a str,
    session: &'a str,
    presses: u32,
    message: Option<&'a str>,
    colors: ThemeColors,
}

impl<'a> StatusBar<'a> {
    pub fn new(
        storage: &'a str,
        view: &'a str,
        session: &'a str,
        presses: u32,
        colors: ThemeColors,
    ) -> Self {
        Self {
            storage,
            view,
            session,
            presses,
            message: None,
            colors,
        }
    }

    pub fn message(mut self, message: Option<&'a str>) -> Self {
        self.message = message;
        self
    }
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bg_style = Style::default().bg(self.colors.dim).fg(self.colors.bg);
        for x in area.x..area.x + area.width {
            buf.set_string(x, area.y, " ", bg_style);
        }

        let left = format!(" {} | {} ", self.view, self.storage);
        buf.set_string(area.x, area.y, &left, bg_style.add_modifier(Modifier::BOLD));

        if let Some(msg) = self.message {
            let msg_style = bg_style.fg(self.colors.warn);
            let msg_x = area.x + (area.width / 2).saturating_sub(msg.len() as u16 / 2);
            buf.set_string(msg_x, area.y, msg, msg_style);
        }

        let right = format!(" Session {} | Presses: {} ", self.session, self.presses);
        let right_x = area.x + area.width.saturating_sub(right.len() as u16);
        buf.set_string(right_x, area.y, &right, bg_style);
    }
}

/// Tab bar widget
pub struct TabBar<'a> {
    tabs: &'a [&'a str],
    selected: usize,
    colors: ThemeColors,
}

impl<'a> TabBar<'a> {
    pub fn new(tabs: &'a [&'a str], selected: usize, colors: ThemeColors) -> Self {
        Self {
            tabs,
            selected,
            colors,
        }
    }
}

impl Widget for TabBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let end = area.x + area.width;
        let idle = Style::default().fg(self.colors.fg).bg(self.colors.key_idle);
        let active = Style::default()
            .fg(self.colors.bg)
            .bg(self.colors.accent)
            .add_modifier(Modifier::BOLD);

        let mut x = area.x;
        for (i, tab) in self.tabs.iter().enumerate() {
            let label = format!(" {} {} ", i + 1, tab);
            let width = label.len() as u16;
            if x + width > end {
                break;
            }
            let style = if i == self.selected { active } else { idle };
            buf.set_string(x, area.y, &label, style);
            x += width + 1;
        }
    }
}

/// Horizontal bar chart row: `label [#####     ] value`
pub struct BarRow<'a> {
    label: &'a str,
    value: u64,
    max: u64,
    colors: ThemeColors,
}

impl<'a> BarRow<'a> {
    pub fn new(label: &'a str, value: u64, max: u64, colors: ThemeColors) -> Self {
        Self {
            label,
            value,
            max,
            colors,
        }
    }

    fn ratio(&self) -> f64 {
        if self.max == 0 {
            0.0
        } else {
            self.value as f64 / self.max as f64
        }
    }
}

impl Widget for BarRow<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width < 20 {
            return;
        }
        let label = format!("{:<8}", self.label);
        let value = format!(" {}", self.value);
        let bar_width = area
            .width
            .saturating_sub(label.len() as u16 + value.len() as u16 + 2);
        let filled = (f64::from(bar_width) * self.ratio()).round() as u16;

        buf.set_string(area.x, area.y, &label, Style::default().fg(self.colors.fg));
        let bar_x = area.x + label.len() as u16;
        buf.set_string(bar_x, area.y, "[", Style::default().fg(self.colors.dim));
        for i in 0..bar_width {
            let (symbol, color) = if i < filled {
                ("█", self.colors.heat(self.ratio()))
            } else {
                (" ", self.colors.dim)
            };
            buf.set_string(bar_x + 1 + i, area.y, symbol, Style::default().fg(color));
        }
        buf.set_string(
            bar_x + 1 + bar_width,
            area.y,
            "]",
            Style::default().fg(self.colors.dim),
        );
        buf.set_string(
            bar_x + 2 + bar_width,
            area.y,
            &value,
            Style::default().fg(self.colors.accent),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(widget: impl Widget, width: u16, height: u16) -> Buffer {
        let area = Rect::new(0, 0, width, height);
        let mut buf = Buffer::empty(area);
        widget.render(area, &mut buf);
        buf
    }

    fn row_text(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width)
            .map(|x| buf[(x, y)].symbol().to_string())
            .collect()
    }

    #[test]
    fn stat_line_tones() {
        assert_eq!(StatLine::new("a", "1").tone, Tone::Plain);
        assert_eq!(StatLine::good("a", "1").tone, Tone::Good);
        assert_eq!(StatLine::warn("a", "1").tone, Tone::Warn);
        assert!(StatLine::heading("Speed").is_heading());
    }

    #[test]
    fn stats_panel_aligns_values() {
        let lines = [StatLine::new("WPM", "42"), StatLine::new("Presses", "7")];
        let buf = render(StatsPanel::new(&lines, "Overview", ThemeColors::dark()), 30, 4);
        assert!(row_text(&buf, 1).contains("WPM      42"));
        assert!(row_text(&buf, 2).contains("Presses  7"));
    }

    #[test]
    fn tab_bar_numbers_tabs() {
        let buf = render(TabBar::new(&["Overview", "Heatmap"], 1, ThemeColors::dark()), 40, 1);
        let text = row_text(&buf, 0);
        assert!(text.starts_with(" 1 Overview "));
        assert!(text.contains(" 2 Heatmap "));
    }

    #[test]
    fn bar_row_fills_proportionally() {
        let buf = render(BarRow::new("L0", 5, 10, ThemeColors::dark()), 30, 1);
        let text = row_text(&buf, 0);
        let filled = text.matches('█').count();
        // 30 - 8 label - 2 value - 2 brackets = 18 cells
        assert_eq!(filled, 9);
        assert!(text.ends_with(" 5"));
    }

    #[test]
    fn bar_row_empty_when_max_is_zero() {
        let buf = render(BarRow::new("L0", 0, 0, ThemeColors::dark()), 30, 1);
        assert_eq!(row_text(&buf, 0).matches('█').count(), 0);
    }
}
