//! Statistics report and export functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::analysis::{Analysis, Summary};
use crate::matrix::Position;
#[cfg(feature = "bigram-stats")]
use crate::matrix::Matrix;
#[cfg(feature = "bigram-stats")]
use crate::stats::{Bigram, MAX_BIGRAMS};
use crate::stats::{Modifier, MAX_LAYERS};

/// Keys listed in the report
pub const TOP_KEYS: usize = 10;
/// Key pairs listed in the report
pub const TOP_BIGRAMS: usize = 10;

/// Complete statistics report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsReport {
    /// Report metadata
    pub metadata: ReportMetadata,
    /// The engine summary
    pub summary: Summary,
    /// Bits of entropy in the per-key distribution
    pub key_entropy: f64,
    pub right_hand_ratio: f64,
    pub top_keys: Vec<KeyEntry>,
    #[cfg(feature = "bigram-stats")]
    pub top_bigrams: Vec<BigramEntry>,
    pub layers: Vec<LayerEntry>,
    pub modifiers: Vec<ModifierEntry>,
    #[cfg(feature = "advanced-analysis")]
    pub advanced: AdvancedEntry,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Report generation timestamp
    pub generated_at: String,
    /// Application version
    pub version: String,
    /// Matrix dimensions as `ROWSxCOLS`
    pub matrix: String,
    /// Current session length in minutes
    pub session_minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEntry {
    pub row: u8,
    pub col: u8,
    pub label: String,
    pub presses: u16,
}

#[cfg(feature = "bigram-stats")]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BigramEntry {
    pub first: String,
    pub second: String,
    pub count: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerEntry {
    pub layer: u8,
    pub presses: u32,
    #[cfg(feature = "layer-time")]
    pub time_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierEntry {
    pub name: String,
    pub presses: u32,
}

#[cfg(feature = "advanced-analysis")]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedEntry {
    pub hand_balance: f64,
    pub finger_balance: f64,
    pub same_finger_presses: u32,
    pub finger_rolls: u32,
    pub hand_alternations: u32,
    pub rhythm_variance_ms2: f64,
}

/// Key label for a matrix slot, falling back to `r<row>c<col>`
fn key_label(label: fn(u8, u8) -> &'static str, pos: Position) -> String {
    match label(pos.row, pos.col) {
        "" => format!("r{}c{}", pos.row, pos.col),
        name => name.to_string(),
    }
}

impl StatsReport {
    /// Build a report from a live analysis view.
    ///
    /// `label` names matrix slots; `session_minutes` and `summary` come from
    /// the engine since they need the host clock and WPM.
    pub fn new<const ROWS: usize, const COLS: usize>(
        analysis: &Analysis<'_, ROWS, COLS>,
        summary: Summary,
        session_minutes: f64,
        label: fn(u8, u8) -> &'static str,
    ) -> Self {
        let now: DateTime<Utc> = Utc::now();

        let mut top = [(Position::new(0, 0), 0u16); TOP_KEYS];
        let n = analysis.top_positions(&mut top);
        let top_keys = top[..n]
            .iter()
            .map(|&(pos, presses)| KeyEntry {
                row: pos.row,
                col: pos.col,
                label: key_label(label, pos),
                presses,
            })
            .collect();

        #[cfg(feature = "bigram-stats")]
        let top_bigrams = {
            let mut pairs = [Bigram::default(); TOP_BIGRAMS];
            let n = analysis.top_bigrams(&mut pairs[..TOP_BIGRAMS.min(MAX_BIGRAMS)]);
            let name = |index: u8| match Matrix::<ROWS, COLS>::from_index(u16::from(index)) {
                Some(pos) => key_label(label, pos),
                None => format!("#{index}"),
            };
            pairs[..n]
                .iter()
                .map(|b| BigramEntry {
                    first: name(b.first),
                    second: name(b.second),
                    count: b.count,
                })
                .collect()
        };

        let counters = analysis.counters();
        let layers = (0..MAX_LAYERS as u8)
            .map(|layer| LayerEntry {
                layer,
                presses: counters.layers[layer as usize],
                #[cfg(feature = "layer-time")]
                time_ms: analysis.layer_time_ms(layer),
            })
            .collect();

        let modifiers = Modifier::ALL
            .iter()
            .map(|m| ModifierEntry {
                name: m.name().to_string(),
                presses: counters.modifiers[m.index()],
            })
            .collect();

        Self {
            metadata: ReportMetadata {
                generated_at: now.to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                matrix: format!("{ROWS}x{COLS}"),
                session_minutes,
            },
            summary,
            key_entropy: analysis.key_entropy(),
            right_hand_ratio: analysis.right_hand_ratio(),
            top_keys,
            #[cfg(feature = "bigram-stats")]
            top_bigrams,
            layers,
            modifiers,
            #[cfg(feature = "advanced-analysis")]
            advanced: AdvancedEntry {
                hand_balance: analysis.hand_balance_score(),
                finger_balance: analysis.finger_balance_score(),
                same_finger_presses: analysis.same_finger_presses(),
                finger_rolls: analysis.finger_rolls(),
                hand_alternations: analysis.hand_alternations(),
                rhythm_variance_ms2: analysis.rhythm_variance(),
            },
        }
    }

    /// Export report to JSON file
    pub fn export_json(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Export report to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
