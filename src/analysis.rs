//! Read-only analysis over the counter store
//!
//! Everything here is computed on demand from the live counters; nothing is
//! cached and nothing is written back.

use serde::{Deserialize, Serialize};

#[cfg(feature = "advanced-analysis")]
use crate::matrix::FINGERS_PER_HAND;
use crate::matrix::{Hand, Matrix, Position};
#[cfg(feature = "bigram-stats")]
use crate::stats::Bigram;
use crate::stats::{CounterStore, Counters, Modifier};
use crate::utils::elapsed_ms;

/// `1 / ln 2`, turns natural logs into bits
const INV_LN_2: f64 = 1.442_695_040_888_963_4;

/// Immutable snapshot handed to renderers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_lifetime_presses: u32,
    pub session_presses: u32,
    #[cfg(feature = "wpm-tracking")]
    pub current_wpm: u16,
    #[cfg(feature = "wpm-tracking")]
    pub avg_wpm: u16,
    #[cfg(feature = "wpm-tracking")]
    pub max_wpm: u16,
    #[cfg(feature = "wpm-tracking")]
    pub session_max_wpm: u16,
    pub left_hand_ratio: f64,
    pub most_used_layer: Option<u8>,
    pub most_used_modifier: Option<Modifier>,
    pub most_used_position: Option<Position>,
}

/// Index and value of the largest non-zero entry; the first one wins ties
fn scan_max(values: impl Iterator<Item = u64>) -> Option<(usize, u64)> {
    let mut best: Option<(usize, u64)> = None;
    for (i, v) in values.enumerate() {
        if v == 0 {
            continue;
        }
        match best {
            Some((_, top)) if v <= top => {}
            _ => best = Some((i, v)),
        }
    }
    best
}

/// Index and value of the smallest entry, optionally skipping zeros; the
/// first one wins ties
fn scan_min(values: impl Iterator<Item = u64>, nonzero_only: bool) -> Option<(usize, u64)> {
    let mut best: Option<(usize, u64)> = None;
    for (i, v) in values.enumerate() {
        if nonzero_only && v == 0 {
            continue;
        }
        match best {
            Some((_, low)) if v >= low => {}
            _ => best = Some((i, v)),
        }
    }
    best
}

/// Shannon entropy in bits of `counts` against `total`
fn entropy(counts: impl Iterator<Item = u64>, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    let mut h = 0.0;
    for count in counts.filter(|&c| c > 0) {
        let p = count as f64 / total;
        h -= p * p.ln() * INV_LN_2;
    }
    h
}

/// Borrowed view that answers questions about the counters
#[derive(Debug, Clone, Copy)]
pub struct Analysis<'a, const ROWS: usize, const COLS: usize> {
    store: &'a CounterStore<ROWS, COLS>,
}

impl<'a, const ROWS: usize, const COLS: usize> Analysis<'a, ROWS, COLS> {
    pub fn new(store: &'a CounterStore<ROWS, COLS>) -> Self {
        Self { store }
    }

    pub fn counters(&self) -> &'a Counters<ROWS, COLS> {
        self.store.counters()
    }

    // ---- Hands ----

    /// Share of hand-classified presses made by the left hand
    pub fn left_hand_ratio(&self) -> f64 {
        let left = f64::from(self.store.hand(Hand::Left));
        let right = f64::from(self.store.hand(Hand::Right));
        if left + right == 0.0 {
            return 0.0;
        }
        left / (left + right)
    }

    pub fn right_hand_ratio(&self) -> f64 {
        1.0 - self.left_hand_ratio()
    }

    // ---- Keys ----

    /// Bits of entropy in the per-key distribution.
    ///
    /// 0.0 with no presses or a single key in use; `log2(n)` when `n` keys
    /// share the presses evenly.
    pub fn key_entropy(&self) -> f64 {
        let c = self.counters();
        entropy(
            c.position_counts().map(u64::from),
            u64::from(c.total_presses),
        )
    }

    pub fn most_used_position(&self) -> Option<(Position, u16)> {
        let (i, v) = scan_max(self.counters().position_counts().map(u64::from))?;
        Some((Matrix::<ROWS, COLS>::from_index(i as u16)?, v as u16))
    }

    pub fn least_used_position(&self, nonzero_only: bool) -> Option<(Position, u16)> {
        let (i, v) = scan_min(
            self.counters().position_counts().map(u64::from),
            nonzero_only,
        )?;
        Some((Matrix::<ROWS, COLS>::from_index(i as u16)?, v as u16))
    }

    /// Busiest keys, best first; ties go to the lower index.
    /// Returns how many slots of `out` were filled.
    pub fn top_positions(&self, out: &mut [(Position, u16)]) -> usize {
        let mut written = 0;
        let mut ceiling: Option<(u16, usize)> = None;

        for slot in out.iter_mut() {
            let mut best: Option<(u16, usize)> = None;
            for (i, count) in self.counters().position_counts().enumerate() {
                if count == 0 {
                    continue;
                }
                // strictly after the previous pick in (count desc, index asc)
                if let Some((c, idx)) = ceiling {
                    if count > c || (count == c && i <= idx) {
                        continue;
                    }
                }
                match best {
                    Some((b, _)) if count <= b => {}
                    _ => best = Some((count, i)),
                }
            }

            let Some((count, i)) = best else { break };
            let Some(pos) = Matrix::<ROWS, COLS>::from_index(i as u16) else { break };
            *slot = (pos, count);
            ceiling = Some((count, i));
            written += 1;
        }

        written
    }

    // ---- Layers ----

    pub fn most_used_layer(&self) -> Option<(u8, u32)> {
        let (i, v) = scan_max(self.counters().layers.iter().map(|&v| u64::from(v)))?;
        Some((i as u8, v as u32))
    }

    pub fn least_used_layer(&self, nonzero_only: bool) -> Option<(u8, u32)> {
        let (i, v) = scan_min(
            self.counters().layers.iter().map(|&v| u64::from(v)),
            nonzero_only,
        )?;
        Some((i as u8, v as u32))
    }

    #[cfg(feature = "layer-time")]
    pub fn layer_time_ms(&self, layer: u8) -> u32 {
        self.store.layer_time(layer)
    }

    /// Share of the recorded dwell time spent on `layer`
    #[cfg(feature = "layer-time")]
    pub fn layer_time_ratio(&self, layer: u8) -> f64 {
        let total: u64 = self
            .counters()
            .layer_time_ms
            .iter()
            .map(|&ms| u64::from(ms))
            .sum();
        if total == 0 {
            return 0.0;
        }
        f64::from(self.store.layer_time(layer)) / total as f64
    }

    // ---- Modifiers ----

    pub fn most_used_modifier(&self) -> Option<(Modifier, u32)> {
        let (i, v) = scan_max(self.counters().modifiers.iter().map(|&v| u64::from(v)))?;
        Some((Modifier::from_index(i)?, v as u32))
    }

    pub fn least_used_modifier(&self, nonzero_only: bool) -> Option<(Modifier, u32)> {
        let (i, v) = scan_min(
            self.counters().modifiers.iter().map(|&v| u64::from(v)),
            nonzero_only,
        )?;
        Some((Modifier::from_index(i)?, v as u32))
    }

    // ---- Bigrams ----

    #[cfg(feature = "bigram-stats")]
    pub fn top_bigrams(&self, out: &mut [Bigram]) -> usize {
        self.counters().bigrams.top_k(out)
    }

    #[cfg(feature = "bigram-stats")]
    pub fn most_used_bigram(&self) -> Option<Bigram> {
        self.counters().bigrams.most_used()
    }

    // ---- Session ----

    /// Minutes since the session began, 0.0 if none ever did
    pub fn session_minutes(&self, now: u32) -> f64 {
        let c = self.counters();
        if !c.session_started() {
            return 0.0;
        }
        f64::from(elapsed_ms(now, c.session_start_time)) / 60_000.0
    }

    // ---- Advanced ----

    /// 1.0 for perfectly even hands, 0.0 for one hand only or no presses
    #[cfg(feature = "advanced-analysis")]
    pub fn hand_balance_score(&self) -> f64 {
        let total = self.store.hand(Hand::Left) as u64 + self.store.hand(Hand::Right) as u64;
        if total == 0 {
            return 0.0;
        }
        1.0 - 2.0 * (self.left_hand_ratio() - 0.5).abs()
    }

    /// Presses per estimated finger, left pinky first, right index last
    #[cfg(feature = "advanced-analysis")]
    pub fn finger_counts(&self) -> [u64; 2 * FINGERS_PER_HAND] {
        let mut fingers = [0u64; 2 * FINGERS_PER_HAND];
        for (r, row) in self.counters().positions.iter().enumerate() {
            for (c, &count) in row.iter().enumerate() {
                if let Some((hand, finger)) =
                    Matrix::<ROWS, COLS>::classify_finger(r as u8, c as u8)
                {
                    let slot = match hand {
                        Hand::Right => FINGERS_PER_HAND + finger as usize,
                        _ => finger as usize,
                    };
                    fingers[slot] += u64::from(count);
                }
            }
        }
        fingers
    }

    /// Entropy of the per-finger distribution scaled into `[0, 1]`
    #[cfg(feature = "advanced-analysis")]
    pub fn finger_balance_score(&self) -> f64 {
        let fingers = self.finger_counts();
        let total: u64 = fingers.iter().sum();
        let max_bits = (fingers.len() as f64).log2();
        (entropy(fingers.into_iter(), total) / max_bits).clamp(0.0, 1.0)
    }

    #[cfg(feature = "advanced-analysis")]
    pub fn same_finger_presses(&self) -> u32 {
        self.counters().same_finger_presses
    }

    #[cfg(feature = "advanced-analysis")]
    pub fn finger_rolls(&self) -> u32 {
        self.counters().finger_rolls
    }

    #[cfg(feature = "advanced-analysis")]
    pub fn hand_alternations(&self) -> u32 {
        self.counters().hand_alternations
    }

    /// Variance of the gaps between presses this session, in ms²
    #[cfg(feature = "advanced-analysis")]
    pub fn rhythm_variance(&self) -> f64 {
        self.store.rhythm_variance()
    }

    // ---- Summary ----

    pub fn summary(&self, #[allow(unused_variables)] current_wpm: u16) -> Summary {
        let c = self.counters();
        Summary {
            total_lifetime_presses: c.total_presses,
            session_presses: c.session_presses,
            #[cfg(feature = "wpm-tracking")]
            current_wpm,
            #[cfg(feature = "wpm-tracking")]
            avg_wpm: c.wpm.avg_wpm_ema,
            #[cfg(feature = "wpm-tracking")]
            max_wpm: c.wpm.max_wpm,
            #[cfg(feature = "wpm-tracking")]
            session_max_wpm: c.wpm.session_max_wpm,
            left_hand_ratio: self.left_hand_ratio(),
            most_used_layer: self.most_used_layer().map(|(layer, _)| layer),
            most_used_modifier: self.most_used_modifier().map(|(m, _)| m),
            most_used_position: self.most_used_position().map(|(p, _)| p),
        }
    }
}
