//! Usage counters and the store that mutates them

#[cfg(feature = "bigram-stats")]
pub mod bigram;
pub mod modifier;
#[cfg(feature = "advanced-analysis")]
pub mod sequence;
#[cfg(feature = "wpm-tracking")]
pub mod wpm;

#[cfg(feature = "bigram-stats")]
pub use bigram::{Bigram, BigramTable, MAX_BIGRAMS};
pub use modifier::{ModMask, Modifier, MODIFIER_COUNT};
#[cfg(feature = "wpm-tracking")]
pub use wpm::{EmaFactor, WpmStats};

use crate::matrix::{Hand, Matrix};
use crate::utils::Saturating;

/// Number of layers with their own counters
pub const MAX_LAYERS: usize = 8;

/// Everything that survives a power cycle.
///
/// Plain data: all mutation goes through [`CounterStore`], which keeps the
/// dirty flag and the saturation rules.
#[derive(Debug, Clone, PartialEq)]
pub struct Counters<const ROWS: usize, const COLS: usize> {
    /// Lifetime presses, never touched by a session start
    pub total_presses: u32,
    #[cfg(feature = "wpm-tracking")]
    pub wpm: WpmStats,
    pub session_presses: u32,
    /// Clock reading when the session began, 0 if none ever did
    pub session_start_time: u32,
    pub left_hand_presses: u32,
    pub right_hand_presses: u32,
    #[cfg(feature = "advanced-analysis")]
    pub same_finger_presses: u32,
    #[cfg(feature = "advanced-analysis")]
    pub finger_rolls: u32,
    #[cfg(feature = "advanced-analysis")]
    pub hand_alternations: u32,
    /// Presses per matrix position, `[row][col]`
    pub positions: [[u16; COLS]; ROWS],
    /// Presses made while each modifier was held, indexed by [`Modifier`]
    pub modifiers: [u32; MODIFIER_COUNT],
    /// Presses per active layer
    pub layers: [u32; MAX_LAYERS],
    /// Milliseconds spent on each layer
    #[cfg(feature = "layer-time")]
    pub layer_time_ms: [u32; MAX_LAYERS],
    #[cfg(feature = "bigram-stats")]
    pub bigrams: BigramTable<MAX_BIGRAMS>,
}

impl<const ROWS: usize, const COLS: usize> Counters<ROWS, COLS> {
    pub fn new() -> Self {
        Self {
            total_presses: 0,
            #[cfg(feature = "wpm-tracking")]
            wpm: WpmStats::default(),
            session_presses: 0,
            session_start_time: 0,
            left_hand_presses: 0,
            right_hand_presses: 0,
            #[cfg(feature = "advanced-analysis")]
            same_finger_presses: 0,
            #[cfg(feature = "advanced-analysis")]
            finger_rolls: 0,
            #[cfg(feature = "advanced-analysis")]
            hand_alternations: 0,
            positions: [[0; COLS]; ROWS],
            modifiers: [0; MODIFIER_COUNT],
            layers: [0; MAX_LAYERS],
            #[cfg(feature = "layer-time")]
            layer_time_ms: [0; MAX_LAYERS],
            #[cfg(feature = "bigram-stats")]
            bigrams: BigramTable::new(),
        }
    }

    /// Position counters in linear-index order
    pub fn position_counts(&self) -> impl Iterator<Item = u16> + '_ {
        self.positions.iter().flat_map(|row| row.iter().copied())
    }

    pub fn session_started(&self) -> bool {
        self.session_start_time != 0
    }
}

impl<const ROWS: usize, const COLS: usize> Default for Counters<ROWS, COLS> {
    fn default() -> Self {
        Self::new()
    }
}

/// The single in-memory copy of the counters plus transient tracking state
#[derive(Debug, Clone)]
pub struct CounterStore<const ROWS: usize, const COLS: usize> {
    counters: Counters<ROWS, COLS>,
    dirty: bool,
    /// Linear index of the previous press, for bigrams
    last_index: Option<u16>,
    #[cfg(feature = "advanced-analysis")]
    sequence: sequence::SequenceTracker,
}

impl<const ROWS: usize, const COLS: usize> Default for CounterStore<ROWS, COLS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const ROWS: usize, const COLS: usize> CounterStore<ROWS, COLS> {
    pub fn new() -> Self {
        Self::from_counters(Counters::new())
    }

    /// Wrap counters restored from storage. Starts clean.
    pub fn from_counters(counters: Counters<ROWS, COLS>) -> Self {
        Self {
            counters,
            dirty: false,
            last_index: None,
            #[cfg(feature = "advanced-analysis")]
            sequence: sequence::SequenceTracker::default(),
        }
    }

    pub fn counters(&self) -> &Counters<ROWS, COLS> {
        &self.counters
    }

    // ---- Dirty tracking ----

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    // ---- Positions ----

    pub fn position(&self, row: u8, col: u8) -> u16 {
        if !Matrix::<ROWS, COLS>::contains(row, col) {
            return 0;
        }
        self.counters.positions[row as usize][col as usize]
    }

    pub fn position_at(&self, index: u16) -> u16 {
        match Matrix::<ROWS, COLS>::from_index(index) {
            Some(pos) => self.position(pos.row, pos.col),
            None => 0,
        }
    }

    pub fn increment_position(&mut self, row: u8, col: u8) {
        if !Matrix::<ROWS, COLS>::contains(row, col) {
            return;
        }
        self.counters.positions[row as usize][col as usize].bump();
        self.dirty = true;
    }

    pub fn increment_position_at(&mut self, index: u16) {
        if let Some(pos) = Matrix::<ROWS, COLS>::from_index(index) {
            self.increment_position(pos.row, pos.col);
        }
    }

    // ---- Layers ----

    pub fn layer(&self, layer: u8) -> u32 {
        self.counters
            .layers
            .get(layer as usize)
            .copied()
            .unwrap_or(0)
    }

    pub fn increment_layer(&mut self, layer: u8) {
        if let Some(count) = self.counters.layers.get_mut(layer as usize) {
            count.bump();
            self.dirty = true;
        }
    }

    #[cfg(feature = "layer-time")]
    pub fn layer_time(&self, layer: u8) -> u32 {
        self.counters
            .layer_time_ms
            .get(layer as usize)
            .copied()
            .unwrap_or(0)
    }

    #[cfg(feature = "layer-time")]
    pub fn add_layer_time(&mut self, layer: u8, ms: u32) {
        if let Some(total) = self.counters.layer_time_ms.get_mut(layer as usize) {
            total.bump_by(ms);
            self.dirty = true;
        }
    }

    // ---- Modifiers ----

    pub fn modifier(&self, slot: usize) -> u32 {
        self.counters.modifiers.get(slot).copied().unwrap_or(0)
    }

    pub fn increment_modifier(&mut self, slot: usize) {
        if let Some(count) = self.counters.modifiers.get_mut(slot) {
            count.bump();
            self.dirty = true;
        }
    }

    // ---- Hands ----

    pub fn hand(&self, hand: Hand) -> u32 {
        match hand {
            Hand::Left => self.counters.left_hand_presses,
            Hand::Right => self.counters.right_hand_presses,
            Hand::Unknown => 0,
        }
    }

    pub fn increment_hand(&mut self, hand: Hand) {
        match hand {
            Hand::Left => self.counters.left_hand_presses.bump(),
            Hand::Right => self.counters.right_hand_presses.bump(),
            Hand::Unknown => return,
        };
        self.dirty = true;
    }

    // ---- WPM ----

    /// Fold an instantaneous WPM sample into the extrema and the average
    #[cfg(feature = "wpm-tracking")]
    pub fn sample_wpm(&mut self, wpm: u16, factor: EmaFactor) {
        if self.counters.wpm.sample(wpm, factor) {
            self.dirty = true;
        }
    }

    // ---- Transient analysis ----

    /// Population variance of inter-press intervals this session
    #[cfg(feature = "advanced-analysis")]
    pub fn rhythm_variance(&self) -> f64 {
        self.sequence.rhythm().variance()
    }

    #[cfg(feature = "advanced-analysis")]
    pub fn rhythm(&self) -> &sequence::Rhythm {
        self.sequence.rhythm()
    }

    /// Count one physical key press.
    ///
    /// Returns `false`, changing nothing, when the coordinate lies outside
    /// the matrix.
    pub fn record_key_event(
        &mut self,
        row: u8,
        col: u8,
        active_layer: u8,
        mods: ModMask,
        #[allow(unused_variables)] timestamp: u32,
    ) -> bool {
        let Some(index) = Matrix::<ROWS, COLS>::to_index(row, col) else {
            return false;
        };

        self.counters.total_presses.bump();
        self.counters.session_presses.bump();
        self.dirty = true;

        self.increment_hand(Matrix::<ROWS, COLS>::classify_hand(row, col));
        self.increment_position(row, col);
        self.increment_layer(active_layer);
        for modifier in mods.iter() {
            self.increment_modifier(modifier.index());
        }

        #[cfg(feature = "bigram-stats")]
        self.record_bigram(index);

        #[cfg(feature = "advanced-analysis")]
        self.record_sequence(index, row, col, timestamp);

        self.last_index = Some(index);
        true
    }

    #[cfg(feature = "bigram-stats")]
    fn record_bigram(&mut self, index: u16) {
        let Some(prev) = self.last_index else { return };
        if prev == index {
            return;
        }
        // Table entries are byte wide; larger matrices lose the tail positions
        if let (Ok(first), Ok(second)) = (u8::try_from(prev), u8::try_from(index)) {
            self.counters.bigrams.record_sequence(first, second);
        }
    }

    #[cfg(feature = "advanced-analysis")]
    fn record_sequence(&mut self, index: u16, row: u8, col: u8, timestamp: u32) {
        use sequence::Transition;

        let finger = Matrix::<ROWS, COLS>::classify_finger(row, col);
        match self.sequence.observe(index, finger, timestamp) {
            Transition::SameFinger => self.counters.same_finger_presses.bump(),
            Transition::Roll => self.counters.finger_rolls.bump(),
            Transition::Alternation => self.counters.hand_alternations.bump(),
            Transition::Other => false,
        };
    }

    /// Zero the session-scoped fields and stamp a new start time.
    ///
    /// `now` of 0 would read as "never started", so it is stored as 1.
    pub fn start_session(&mut self, now: u32) {
        self.counters.session_presses = 0;
        self.counters.session_start_time = now.max(1);
        #[cfg(feature = "wpm-tracking")]
        self.counters.wpm.reset_session();
        #[cfg(feature = "advanced-analysis")]
        self.sequence.reset_session();
        self.dirty = true;
    }

    /// Replace every counter with zero and forget transient state
    pub fn reset(&mut self) {
        self.counters = Counters::new();
        self.last_index = None;
        #[cfg(feature = "advanced-analysis")]
        self.sequence.clear();
        self.dirty = true;
    }
}
