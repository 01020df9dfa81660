//! Main application state and logic

use std::path::Path;
use std::time::Instant;

use device_query::Keycode;

use super::theme::ThemeColors;
use super::widgets::StatLine;
use crate::config::Config;
use crate::engine::Engine;
use crate::keyboard::layout::{self, COLS, ROWS};
use crate::keyboard::{RawKeyEvent, SystemHost};
use crate::report::StatsReport;
use crate::stats::{Modifier, MAX_LAYERS};
use crate::storage::{Persistence, StoreState};

/// Layer reached while AltGr is held
pub const ALTGR_LAYER: u8 = 1;

/// Current view/tab in the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppView {
    Overview,
    Heatmap,
    Layers,
    Pairs,
    Help,
}

impl AppView {
    const ALL: [AppView; 5] = [
        Self::Overview,
        Self::Heatmap,
        Self::Layers,
        Self::Pairs,
        Self::Help,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::Heatmap => "Heatmap",
            Self::Layers => "Layers",
            Self::Pairs => "Pairs",
            Self::Help => "Help",
        }
    }

    pub fn all() -> &'static [AppView] {
        &Self::ALL
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// View at `index`, clamped to the last one
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }
}

/// Application running state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Running,
    Quitting,
}

/// The dashboard around a typing statistics engine
pub struct App<P: Persistence> {
    pub view: AppView,
    pub state: AppState,
    pub config: Config,
    pub colors: ThemeColors,
    pub engine: Engine<SystemHost, P, ROWS, COLS>,
    /// Slot of the most recent counted press
    pub last_press: Option<(u8, u8)>,
    status_message: Option<String>,
    status_time: Option<Instant>,
}

impl<P: Persistence> App<P> {
    /// Wrap `engine`, initializing it if the caller has not
    pub fn new(config: Config, mut engine: Engine<SystemHost, P, ROWS, COLS>) -> Self {
        engine.init();
        Self {
            view: AppView::Overview,
            state: AppState::Running,
            colors: ThemeColors::from_theme(config.ui.theme),
            config,
            engine,
            last_press: None,
            status_message: None,
            status_time: None,
        }
    }

    /// Route one host key transition through the host state and the engine
    pub fn process_event(&mut self, event: &RawKeyEvent) {
        if self.state != AppState::Running {
            return;
        }

        // A modifier or layer key is counted under the state before it
        if let Some(matrix_event) = event.to_matrix() {
            if self.engine.on_key_event(matrix_event) {
                self.last_press = Some((matrix_event.row, matrix_event.col));
            }
        }

        self.engine.host_mut().observe(event);

        if event.key == Keycode::RAlt {
            let state = if event.pressed { 1 << ALTGR_LAYER } else { 0 };
            self.engine.on_layer_change(state);
        }
    }

    /// Periodic work: speed estimate, WPM sampling and debounced saving
    pub fn tick(&mut self) {
        self.engine.host_mut().tick();
        self.engine.on_tick();
    }

    pub fn next_view(&mut self) {
        let next = (self.view.index() + 1) % AppView::all().len();
        self.view = AppView::from_index(next);
    }

    pub fn prev_view(&mut self) {
        let len = AppView::all().len();
        self.view = AppView::from_index((self.view.index() + len - 1) % len);
    }

    /// Save and request quit
    pub fn quit(&mut self) {
        if !self.engine.flush() {
            log::warn!("counters could not be saved on exit");
        }
        self.state = AppState::Quitting;
    }

    pub fn new_session(&mut self) {
        self.engine.start_new_session();
        self.last_press = None;
        self.set_status("New session started");
    }

    pub fn reset_all(&mut self) {
        self.engine.reset_all();
        self.last_press = None;
        self.set_status("All statistics reset");
    }

    pub fn save_now(&mut self) {
        if self.engine.flush() {
            self.set_status("Counters saved");
        } else {
            self.set_status("Save failed, see log");
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_time = Some(Instant::now());
    }

    /// Status message if still valid (within 3 seconds)
    pub fn status(&self) -> Option<&str> {
        match (&self.status_message, self.status_time) {
            (Some(msg), Some(time)) if time.elapsed().as_secs() < 3 => Some(msg),
            _ => None,
        }
    }

    /// Session length as `mm:ss`
    pub fn session_formatted(&self) -> String {
        let secs = (self.engine.session_minutes() * 60.0) as u64;
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }

    pub fn storage_label(&self) -> &'static str {
        match self.engine.persistence().state() {
            StoreState::Unloaded => "not loaded",
            StoreState::LoadedValid => "saved",
            StoreState::LoadedDefault => "fresh",
            StoreState::Dirty => "unsaved",
            StoreState::Flushing => "saving",
        }
    }

    /// Lines for the panel under the current view
    pub fn current_lines(&self) -> Vec<StatLine> {
        match self.view {
            AppView::Overview => self.overview_lines(),
            AppView::Layers => self.layer_lines(),
            AppView::Pairs => self.pair_lines(),
            AppView::Heatmap => self.top_key_lines(),
            AppView::Help => Vec::new(),
        }
    }

    fn overview_lines(&self) -> Vec<StatLine> {
        let Some(summary) = self.engine.summary() else {
            return vec![StatLine::warn("Engine", "not initialized")];
        };
        let analysis = self.engine.analysis();

        let mut lines = vec![
            StatLine::heading("Presses"),
            StatLine::new("Lifetime", summary.total_lifetime_presses.to_string()),
            StatLine::new("Session", summary.session_presses.to_string()),
            StatLine::new("Session time", self.session_formatted()),
        ];

        #[cfg(feature = "wpm-tracking")]
        lines.extend([
            StatLine::heading("Speed"),
            StatLine::good("Current WPM", summary.current_wpm.to_string()),
            StatLine::new("Average WPM", summary.avg_wpm.to_string()),
            StatLine::new("Session peak", summary.session_max_wpm.to_string()),
            StatLine::new("Lifetime peak", summary.max_wpm.to_string()),
        ]);

        lines.extend([
            StatLine::heading("Balance"),
            StatLine::new(
                "Left / right",
                format!(
                    "{:.0}% / {:.0}%",
                    summary.left_hand_ratio * 100.0,
                    analysis.right_hand_ratio() * 100.0
                ),
            ),
            StatLine::new("Key entropy", format!("{:.2} bits", analysis.key_entropy())),
        ]);

        #[cfg(feature = "advanced-analysis")]
        {
            let hand = analysis.hand_balance_score();
            let line = format!("{:.0}%", hand * 100.0);
            lines.push(if hand >= 0.8 {
                StatLine::good("Hand balance", line)
            } else {
                StatLine::warn("Hand balance", line)
            });
            lines.extend([
                StatLine::new(
                    "Finger balance",
                    format!("{:.0}%", analysis.finger_balance_score() * 100.0),
                ),
                StatLine::new("Same finger", analysis.same_finger_presses().to_string()),
                StatLine::new("Rolls", analysis.finger_rolls().to_string()),
                StatLine::new("Alternations", analysis.hand_alternations().to_string()),
                StatLine::new(
                    "Rhythm σ",
                    format!("{:.0} ms", analysis.rhythm_variance().sqrt()),
                ),
            ]);
        }

        if let Some(pos) = summary.most_used_position {
            lines.push(StatLine::new(
                "Favourite key",
                key_name(pos.row, pos.col),
            ));
        }

        lines
    }

    fn top_key_lines(&self) -> Vec<StatLine> {
        let mut top = [(crate::matrix::Position::new(0, 0), 0u16); 8];
        let n = self.engine.analysis().top_positions(&mut top);
        let mut lines = vec![StatLine::heading("Top keys")];
        lines.extend(
            top[..n]
                .iter()
                .map(|(pos, count)| StatLine::new(key_name(pos.row, pos.col), count.to_string())),
        );
        lines
    }

    fn layer_lines(&self) -> Vec<StatLine> {
        let counters = self.engine.counters();
        let mut lines = vec![StatLine::heading("Layers")];
        for layer in 0..MAX_LAYERS as u8 {
            let presses = counters.layers[layer as usize];
            #[cfg(feature = "layer-time")]
            let time_ms = self.engine.layer_time_ms(layer);
            #[cfg(not(feature = "layer-time"))]
            let time_ms = 0u32;
            if presses == 0 && time_ms == 0 && layer != self.engine.active_layer() {
                continue;
            }
            let mut value = format!("{presses} presses");
            if cfg!(feature = "layer-time") {
                value.push_str(&format!(", {:.1} min", f64::from(time_ms) / 60_000.0));
            }
            let label = format!("Layer {layer}");
            lines.push(if layer == self.engine.active_layer() {
                StatLine::good(label, value)
            } else {
                StatLine::new(label, value)
            });
        }

        lines.push(StatLine::heading("Modifiers"));
        lines.extend(
            Modifier::ALL
                .iter()
                .map(|m| StatLine::new(m.name(), counters.modifiers[m.index()].to_string())),
        );
        lines
    }

    #[cfg(feature = "bigram-stats")]
    fn pair_lines(&self) -> Vec<StatLine> {
        use crate::keyboard::layout::HostMatrix;
        use crate::stats::Bigram;

        let mut pairs = [Bigram::default(); 16];
        let n = self.engine.analysis().top_bigrams(&mut pairs);
        let name = |index: u8| match HostMatrix::from_index(u16::from(index)) {
            Some(pos) => key_name(pos.row, pos.col),
            None => format!("#{index}"),
        };

        let mut lines = vec![StatLine::heading("Most frequent pairs")];
        lines.extend(pairs[..n].iter().map(|b| {
            StatLine::new(
                format!("{} → {}", name(b.first), name(b.second)),
                b.count.to_string(),
            )
        }));
        if n == 0 {
            lines.push(StatLine::new("No pairs yet", "-"));
        }
        lines
    }

    #[cfg(not(feature = "bigram-stats"))]
    fn pair_lines(&self) -> Vec<StatLine> {
        vec![StatLine::warn("Pairs", "not tracked in this build")]
    }

    /// Build a report of the current counters, `None` before init
    pub fn generate_report(&self) -> Option<StatsReport> {
        let summary = self.engine.summary()?;
        Some(StatsReport::new(
            &self.engine.analysis(),
            summary,
            self.engine.session_minutes(),
            layout::label,
        ))
    }

    /// Export a report to a JSON file
    pub fn export_report(&mut self, path: &Path) -> std::io::Result<()> {
        let Some(report) = self.generate_report() else {
            return Err(std::io::Error::other("engine not initialized"));
        };
        report.export_json(path)?;
        self.set_status(format!("Exported to {}", path.display()));
        Ok(())
    }
}

fn key_name(row: u8, col: u8) -> String {
    match layout::label(row, col) {
        "" => format!("r{row}c{col}"),
        label => label.to_string(),
    }
}
