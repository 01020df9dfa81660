//! The engine facade: the only entry points a host firmware loop calls
//!
//! ```
//! use typing_stats::engine::{Engine, EngineConfig};
//! use typing_stats::keyboard::KeyEvent;
//! use typing_stats::storage::Volatile;
//! use typing_stats::testing::TestHost;
//!
//! let mut engine: Engine<_, _, 4, 12> =
//!     Engine::new(TestHost::default(), Volatile::default(), EngineConfig::default());
//! engine.init();
//!
//! engine.on_key_event(KeyEvent::press(1, 3, 10));
//! engine.on_tick();
//!
//! let summary = engine.summary().unwrap();
//! assert_eq!(summary.total_lifetime_presses, 1);
//! ```

use serde::{Deserialize, Serialize};

use crate::analysis::{Analysis, Summary};
use crate::keyboard::KeyEvent;
use crate::stats::{CounterStore, Counters, ModMask};
#[cfg(feature = "wpm-tracking")]
use crate::stats::{wpm::SampleClock, EmaFactor};
use crate::storage::{LoadOutcome, Persistence};
#[cfg(feature = "layer-time")]
use crate::utils::elapsed_ms;

/// Callbacks into the surrounding firmware
pub trait Host {
    /// Free-running millisecond clock, wrapping at `u32::MAX`
    fn now_ms(&self) -> u32;

    /// Instantaneous typing speed, as estimated by the host
    fn current_wpm(&self) -> u16 {
        0
    }

    /// Modifiers held right now
    fn modifiers(&self) -> ModMask {
        ModMask::empty()
    }

    /// Bitmask of default layers, OR-ed into every layer state
    fn default_layer_state(&self) -> u32 {
        1
    }
}

/// Behaviour knobs of the engine itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Start a fresh session on every boot instead of resuming the stored one
    pub auto_new_session_on_boot: bool,
    #[cfg(feature = "wpm-tracking")]
    pub ema: EmaFactor,
    #[cfg(feature = "wpm-tracking")]
    pub wpm_sample_interval_ms: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_new_session_on_boot: true,
            #[cfg(feature = "wpm-tracking")]
            ema: EmaFactor::default(),
            #[cfg(feature = "wpm-tracking")]
            wpm_sample_interval_ms: crate::stats::wpm::DEFAULT_SAMPLE_INTERVAL_MS,
        }
    }
}

/// Active layer for a layer bitmask: the highest set bit wins
pub fn highest_layer(state: u32) -> u8 {
    match state {
        0 => 0,
        s => (31 - s.leading_zeros()) as u8,
    }
}

/// Typing statistics engine for a `ROWS` x `COLS` matrix
pub struct Engine<H, P, const ROWS: usize, const COLS: usize> {
    host: H,
    persistence: P,
    store: CounterStore<ROWS, COLS>,
    config: EngineConfig,
    initialized: bool,
    /// Accepted presses, wrapping; only the flush debounce reads it
    event_counter: u32,
    layer_state: u32,
    active_layer: u8,
    #[cfg(feature = "layer-time")]
    layer_since: u32,
    #[cfg(feature = "wpm-tracking")]
    sampler: SampleClock,
}

impl<H, P, const ROWS: usize, const COLS: usize> Engine<H, P, ROWS, COLS>
where
    H: Host,
    P: Persistence,
{
    pub fn new(host: H, persistence: P, config: EngineConfig) -> Self {
        Self {
            host,
            persistence,
            store: CounterStore::new(),
            config,
            initialized: false,
            event_counter: 0,
            layer_state: 0,
            active_layer: 0,
            #[cfg(feature = "layer-time")]
            layer_since: 0,
            #[cfg(feature = "wpm-tracking")]
            sampler: SampleClock::new(config.wpm_sample_interval_ms),
        }
    }

    /// Load persisted counters and get ready for events. Safe to call twice.
    pub fn init(&mut self) -> Option<LoadOutcome> {
        if self.initialized {
            return None;
        }

        let now = self.host.now_ms();
        let outcome = self
            .persistence
            .load(&mut self.store, now, self.event_counter);

        self.active_layer = highest_layer(self.layer_state | self.host.default_layer_state());
        #[cfg(feature = "layer-time")]
        {
            self.layer_since = now;
        }
        #[cfg(feature = "wpm-tracking")]
        self.sampler.seed(now);

        if self.config.auto_new_session_on_boot || !self.store.counters().session_started() {
            self.store.start_session(now);
            log::debug!("typing session started at {now} ms");
        }

        self.initialized = true;
        log::info!(
            "typing stats initialized ({outcome:?}, {} lifetime presses)",
            self.store.counters().total_presses
        );
        Some(outcome)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Count a key press. Releases, events before `init` and coordinates
    /// outside the matrix are ignored; returns whether the press was counted.
    pub fn on_key_event(&mut self, event: KeyEvent) -> bool {
        if !self.initialized || !event.pressed {
            return false;
        }

        self.sync_active_layer();
        let mods = self.host.modifiers();
        let counted = self.store.record_key_event(
            event.row,
            event.col,
            self.active_layer,
            mods,
            event.timestamp,
        );
        if counted {
            self.event_counter = self.event_counter.wrapping_add(1);
        }
        counted
    }

    /// Periodic housekeeping: WPM sampling and the flush debounce
    pub fn on_tick(&mut self) {
        if !self.initialized {
            return;
        }
        let now = self.host.now_ms();

        #[cfg(feature = "wpm-tracking")]
        if self.sampler.poll(now) {
            self.store.sample_wpm(self.host.current_wpm(), self.config.ema);
        }

        self.persistence
            .maybe_flush(&mut self.store, now, self.event_counter);
    }

    /// Track a layer-state change and hand the state back unchanged.
    /// Before `init` the state is only remembered.
    pub fn on_layer_change(&mut self, state: u32) -> u32 {
        self.layer_state = state;
        if self.initialized {
            self.sync_active_layer();
        }
        state
    }

    /// Recompute the active layer from the cached layer state and the
    /// host's default layers, closing the dwell window when it moved
    fn sync_active_layer(&mut self) {
        let layer = highest_layer(self.layer_state | self.host.default_layer_state());
        if layer != self.active_layer {
            #[cfg(feature = "layer-time")]
            self.close_layer_window(self.host.now_ms());
            self.active_layer = layer;
        }
    }

    /// Credit the open dwell window to the active layer and start a new one
    #[cfg(feature = "layer-time")]
    fn close_layer_window(&mut self, now: u32) {
        let span = elapsed_ms(now, self.layer_since);
        if span > 0 {
            self.store.add_layer_time(self.active_layer, span);
        }
        self.layer_since = now;
    }

    /// Zero session presses and the session WPM peak; lifetime figures stay
    pub fn start_new_session(&mut self) {
        if !self.initialized {
            return;
        }
        let now = self.host.now_ms();
        self.store.start_session(now);
        log::debug!("typing session started at {now} ms");
    }

    /// Erase every statistic, begin a new session and write the empty
    /// record out immediately
    pub fn reset_all(&mut self) {
        if !self.initialized {
            return;
        }
        let now = self.host.now_ms();

        self.store.reset();
        self.store.start_session(now);
        #[cfg(feature = "layer-time")]
        {
            self.layer_since = now;
        }

        match self.persistence.save(&mut self.store, now, self.event_counter) {
            Ok(()) => log::info!("typing stats reset"),
            Err(e) => log::warn!("typing stats reset, but the write failed: {e}"),
        }
    }

    /// Write the counters out now, for example before power-off.
    /// Returns whether the write succeeded.
    pub fn flush(&mut self) -> bool {
        if !self.initialized {
            return false;
        }
        let now = self.host.now_ms();
        #[cfg(feature = "layer-time")]
        self.close_layer_window(now);

        match self.persistence.save(&mut self.store, now, self.event_counter) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("typing stats flush failed: {e}");
                false
            }
        }
    }

    // ---- Queries ----

    pub fn summary(&self) -> Option<Summary> {
        if !self.initialized {
            return None;
        }
        Some(self.analysis().summary(self.host.current_wpm()))
    }

    pub fn analysis(&self) -> Analysis<'_, ROWS, COLS> {
        Analysis::new(&self.store)
    }

    pub fn counters(&self) -> &Counters<ROWS, COLS> {
        self.store.counters()
    }

    pub fn store(&self) -> &CounterStore<ROWS, COLS> {
        &self.store
    }

    pub fn session_minutes(&self) -> f64 {
        self.analysis().session_minutes(self.host.now_ms())
    }

    /// Dwell time on `layer`, including the window still open
    #[cfg(feature = "layer-time")]
    pub fn layer_time_ms(&self, layer: u8) -> u32 {
        let stored = self.store.layer_time(layer);
        if self.initialized && layer == self.active_layer {
            stored.saturating_add(elapsed_ms(self.host.now_ms(), self.layer_since))
        } else {
            stored
        }
    }

    pub fn active_layer(&self) -> u8 {
        self.active_layer
    }

    pub fn layer_state(&self) -> u32 {
        self.layer_state
    }

    pub fn event_counter(&self) -> u32 {
        self.event_counter
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn persistence_mut(&mut self) -> &mut P {
        &mut self.persistence
    }

    /// Tear the engine down, returning its collaborators
    pub fn into_parts(self) -> (H, P) {
        (self.host, self.persistence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Modifier;
    use crate::storage::{StoreState, Volatile};
    use crate::testing::TestHost;

    type TestEngine = Engine<TestHost, Volatile, 4, 12>;

    fn engine() -> TestEngine {
        Engine::new(TestHost::at(1_000), Volatile::default(), EngineConfig::default())
    }

    #[test]
    fn highest_layer_picks_top_bit() {
        assert_eq!(highest_layer(0), 0);
        assert_eq!(highest_layer(0b1), 0);
        assert_eq!(highest_layer(0b1010), 3);
        assert_eq!(highest_layer(1 << 31), 31);
    }

    #[test]
    fn nothing_happens_before_init() {
        let mut engine = engine();
        assert!(!engine.on_key_event(KeyEvent::press(0, 0, 0)));
        engine.on_tick();
        engine.start_new_session();
        engine.reset_all();
        assert!(!engine.flush());
        assert_eq!(engine.on_layer_change(0b100), 0b100);
        assert_eq!(engine.summary(), None);
        assert_eq!(engine.counters(), &Counters::new());
        assert_eq!(engine.persistence().state(), StoreState::Unloaded);
    }

    #[test]
    fn init_is_idempotent() {
        let mut engine = engine();
        assert_eq!(engine.init(), Some(LoadOutcome::Defaulted));
        engine.on_key_event(KeyEvent::press(0, 0, 0));
        assert_eq!(engine.init(), None);
        assert_eq!(engine.counters().total_presses, 1);
    }

    #[test]
    fn init_starts_session() {
        let mut engine = engine();
        engine.init();
        assert_eq!(engine.counters().session_start_time, 1_000);
    }

    #[test]
    fn releases_ignored() {
        let mut engine = engine();
        engine.init();
        assert!(!engine.on_key_event(KeyEvent::release(0, 0, 5)));
        assert_eq!(engine.counters().total_presses, 0);
        assert_eq!(engine.event_counter(), 0);
    }

    #[test]
    fn out_of_matrix_press_not_counted() {
        let mut engine = engine();
        engine.init();
        assert!(!engine.on_key_event(KeyEvent::press(4, 0, 5)));
        assert_eq!(engine.event_counter(), 0);
    }

    #[test]
    fn presses_use_host_modifiers_and_active_layer() {
        let mut engine = engine();
        engine.init();
        engine.host_mut().set_modifiers(ModMask(Modifier::RCtrl.bit()));
        engine.on_layer_change(0b100);
        engine.on_key_event(KeyEvent::press(2, 7, 0));

        let c = engine.counters();
        assert_eq!(c.layers[2], 1);
        assert_eq!(c.modifiers[Modifier::RCtrl.index()], 1);
        assert_eq!(c.right_hand_presses, 1);
    }

    #[test]
    fn default_layer_is_ored_in() {
        let mut engine = engine();
        engine.host_mut().set_default_layer_state(0b1000);
        engine.init();
        assert_eq!(engine.active_layer(), 3);
        assert_eq!(engine.on_layer_change(0b10), 0b10);
        assert_eq!(engine.active_layer(), 3);
        assert_eq!(engine.layer_state(), 0b10);
    }

    #[test]
    fn default_layer_change_is_seen_at_press_time() {
        let mut engine = engine();
        engine.init();
        engine.host_mut().set_default_layer_state(0b100);
        engine.on_key_event(KeyEvent::press(0, 0, 1_000));

        let layers = engine.counters().layers;
        assert_eq!(layers[2], 1);
        assert_eq!(layers[0], 0);
        assert_eq!(engine.active_layer(), 2);
    }

    #[test]
    fn layer_state_before_init_is_kept() {
        let mut engine = engine();
        assert_eq!(engine.on_layer_change(0b10), 0b10);
        engine.init();
        assert_eq!(engine.active_layer(), 1);
        engine.on_key_event(KeyEvent::press(1, 1, 1_000));
        assert_eq!(engine.counters().layers[1], 1);
    }

    #[test]
    fn session_reset_keeps_lifetime() {
        let mut engine = engine();
        engine.init();
        for col in 0..6 {
            engine.on_key_event(KeyEvent::press(1, col, 0));
        }
        engine.host_mut().advance(30_000);
        engine.start_new_session();

        let c = engine.counters();
        assert_eq!(c.total_presses, 6);
        assert_eq!(c.session_presses, 0);
        assert_eq!(c.session_start_time, 31_000);
        assert_eq!(engine.session_minutes(), 0.0);
    }

    #[test]
    fn reset_all_zeroes_and_restarts_session() {
        let mut engine = engine();
        engine.init();
        engine.on_key_event(KeyEvent::press(1, 1, 0));
        engine.host_mut().advance(5_000);
        engine.reset_all();

        let c = engine.counters();
        assert_eq!(c.total_presses, 0);
        assert_eq!(c.session_start_time, 6_000);
        assert!(!engine.store().is_dirty());
    }

    #[cfg(feature = "wpm-tracking")]
    #[test]
    fn tick_samples_wpm_on_cadence() {
        let mut engine = engine();
        engine.init();
        engine.host_mut().set_wpm(80);

        engine.on_tick();
        assert_eq!(engine.counters().wpm.max_wpm, 0);

        engine.host_mut().advance(50);
        engine.on_tick();
        assert_eq!(engine.counters().wpm.max_wpm, 80);
        assert_eq!(engine.counters().wpm.avg_wpm_ema, 10);

        engine.host_mut().advance(10);
        engine.on_tick();
        assert_eq!(engine.counters().wpm.avg_wpm_ema, 10);

        let summary = engine.summary().unwrap();
        assert_eq!(summary.current_wpm, 80);
        assert_eq!(summary.session_max_wpm, 80);
    }

    #[cfg(feature = "wpm-tracking")]
    #[test]
    fn new_session_clears_session_peak_only() {
        let mut engine = engine();
        engine.init();
        engine.host_mut().set_wpm(120);
        engine.host_mut().advance(50);
        engine.on_tick();
        engine.start_new_session();

        let wpm = engine.counters().wpm;
        assert_eq!(wpm.max_wpm, 120);
        assert_eq!(wpm.session_max_wpm, 0);
    }

    #[cfg(feature = "layer-time")]
    #[test]
    fn layer_dwell_time() {
        let mut engine = engine();
        engine.init();

        engine.host_mut().advance(2_000);
        engine.on_layer_change(0b10);
        engine.host_mut().advance(500);
        engine.on_layer_change(0b10);
        engine.host_mut().advance(500);
        engine.on_layer_change(0);

        assert_eq!(engine.store().layer_time(0), 2_000);
        assert_eq!(engine.store().layer_time(1), 1_000);

        engine.host_mut().advance(250);
        assert_eq!(engine.layer_time_ms(0), 2_250);
        assert_eq!(engine.layer_time_ms(1), 1_000);

        engine.flush();
        assert_eq!(engine.store().layer_time(0), 2_250);
    }

    #[cfg(feature = "layer-time")]
    #[test]
    fn default_layer_switch_closes_dwell_window() {
        let mut engine = engine();
        engine.init();

        engine.host_mut().advance(3_000);
        engine.host_mut().set_default_layer_state(0b100);
        let now = engine.host().now_ms();
        engine.on_key_event(KeyEvent::press(0, 0, now));

        assert_eq!(engine.store().layer_time(0), 3_000);
        engine.host_mut().advance(400);
        assert_eq!(engine.layer_time_ms(2), 400);
    }
}
