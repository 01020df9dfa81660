//! Integration tests for Typing Stats
//!
//! These tests drive the engine the way firmware would: key events, ticks
//! and layer changes against a host clock, with counters persisted to an
//! in-memory or file-backed block medium.

#![cfg(feature = "persistent-storage")]

use typing_stats::analysis::Analysis;
use typing_stats::config::Config;
use typing_stats::engine::{Engine, EngineConfig, Host};
use typing_stats::keyboard::KeyEvent;
use typing_stats::report::StatsReport;
use typing_stats::stats::{CounterStore, Counters, ModMask, Modifier};
use typing_stats::storage::codec::{self, CRC_OFFSET};
use typing_stats::storage::{
    BlockStore, FileStorage, FlushPolicy, LoadOutcome, MemStorage, Persistence, StoreState,
    DEFAULT_OFFSET,
};
use typing_stats::testing::TestHost;

const ROWS: usize = 4;
const COLS: usize = 12;
const CAPACITY: usize = 1024;

type StatsEngine<S> = Engine<TestHost, BlockStore<S>, ROWS, COLS>;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn engine_with(storage: MemStorage, now: u32, config: EngineConfig) -> StatsEngine<MemStorage> {
    let store = BlockStore::new(storage, DEFAULT_OFFSET, FlushPolicy::default());
    Engine::new(TestHost::at(now), store, config)
}

/// Initialized engine on blank (erased) flash
fn fresh_engine(now: u32) -> StatsEngine<MemStorage> {
    let mut engine = engine_with(MemStorage::erased(CAPACITY), now, EngineConfig::default());
    assert_eq!(engine.init(), Some(LoadOutcome::Defaulted));
    engine
}

/// Press at the host's current time
fn press<S>(engine: &mut StatsEngine<S>, row: u8, col: u8) -> bool
where
    S: embedded_storage::Storage,
    S::Error: core::fmt::Debug,
{
    let now = engine.host().now_ms();
    engine.on_key_event(KeyEvent::press(row, col, now))
}

/// Press a sequence of linear indices, `step_ms` apart, ticking after each
fn type_indices(engine: &mut StatsEngine<MemStorage>, indices: &[u16], step_ms: u32) {
    for &index in indices {
        let row = (index as usize / COLS) as u8;
        let col = (index as usize % COLS) as u8;
        engine.host_mut().advance(step_ms);
        press(engine, row, col);
        engine.on_tick();
    }
}

fn stored_blob(engine: &StatsEngine<MemStorage>) -> Vec<u8> {
    let start = DEFAULT_OFFSET as usize;
    let end = start + codec::encoded_len::<ROWS, COLS>();
    engine.persistence().storage().as_bytes()[start..end].to_vec()
}

/// Encode `counters` into a fresh medium and return the blob bytes
fn encode_bytes(counters: &Counters<ROWS, COLS>) -> Vec<u8> {
    let mut storage = MemStorage::new(CAPACITY);
    codec::encode(&mut storage, 0, counters).unwrap();
    storage.as_bytes()[..codec::encoded_len::<ROWS, COLS>()].to_vec()
}

// ---------------------------------------------------------------------------
// Persistence round trip
// ---------------------------------------------------------------------------

#[test]
fn counters_survive_a_restart() {
    let mut first = fresh_engine(1_000);
    first.host_mut().set_modifiers(ModMask(Modifier::LCtrl.bit()));
    type_indices(&mut first, &[5, 12, 5, 30], 120);
    first.host_mut().set_modifiers(ModMask::empty());
    first.on_layer_change(1 << 2);
    type_indices(&mut first, &[40, 41], 200);
    first.host_mut().set_wpm(64);
    first.host_mut().advance(100);
    first.on_tick();
    assert!(first.flush());

    let saved = first.counters().clone();
    let (host, store) = first.into_parts();

    let config = EngineConfig {
        auto_new_session_on_boot: false,
        ..EngineConfig::default()
    };
    let mut second = engine_with(store.into_inner(), host.now_ms(), config);
    assert_eq!(second.init(), Some(LoadOutcome::Restored));
    assert_eq!(second.persistence().state(), StoreState::LoadedValid);
    assert_eq!(second.counters(), &saved);

    let counters = second.counters();
    assert_eq!(counters.total_presses, 6);
    assert_eq!(counters.layers[2], 2);
    assert_eq!(counters.modifiers[Modifier::LCtrl.index()], 4);
}

#[test]
fn restored_blob_matches_stored_checksum() {
    let mut engine = fresh_engine(1);
    type_indices(&mut engine, &[0, 1, 2, 3], 50);
    assert!(engine.flush());

    let expected = codec::checksum(engine.counters());
    let decoded = codec::decode::<_, ROWS, COLS>(
        engine.persistence_mut().storage_mut(),
        DEFAULT_OFFSET,
    )
    .unwrap();
    assert_eq!(decoded.crc, expected);
    assert_eq!(&decoded.counters, engine.counters());

    let blob = stored_blob(&engine);
    assert_eq!(&blob[..4], &codec::MAGIC.to_le_bytes());
    assert_eq!(&blob[CRC_OFFSET..CRC_OFFSET + 4], &expected.to_le_bytes());
}

#[test]
fn file_backed_counters_survive_reopen() {
    let path = std::env::temp_dir().join(format!(
        "typing-stats-it-{}/stats.bin",
        std::process::id()
    ));
    let capacity = DEFAULT_OFFSET as usize + codec::encoded_len::<ROWS, COLS>();

    {
        let storage = FileStorage::open(&path, capacity).unwrap();
        let store = BlockStore::new(storage, DEFAULT_OFFSET, FlushPolicy::default());
        let mut engine: StatsEngine<FileStorage> =
            Engine::new(TestHost::at(10), store, EngineConfig::default());
        assert_eq!(engine.init(), Some(LoadOutcome::Defaulted));
        press(&mut engine, 2, 3);
        press(&mut engine, 2, 8);
        assert!(engine.flush());
    }

    let storage = FileStorage::open(&path, capacity).unwrap();
    let store = BlockStore::new(storage, DEFAULT_OFFSET, FlushPolicy::default());
    let mut engine: StatsEngine<FileStorage> =
        Engine::new(TestHost::at(20), store, EngineConfig::default());
    assert_eq!(engine.init(), Some(LoadOutcome::Restored));
    assert_eq!(engine.counters().total_presses, 2);
    assert_eq!(engine.counters().positions[2][8], 1);

    if let Some(dir) = path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
}

// ---------------------------------------------------------------------------
// Corruption recovery
// ---------------------------------------------------------------------------

/// Storage holding a valid blob with a few presses in it
fn valid_storage() -> MemStorage {
    let mut engine = fresh_engine(1_000);
    type_indices(&mut engine, &[1, 2, 3, 14, 15], 80);
    assert!(engine.flush());
    let (_, store) = engine.into_parts();
    store.into_inner()
}

fn assert_recovers_from_flipped_bit(byte: usize) {
    let mut storage = valid_storage();
    storage.as_bytes_mut()[DEFAULT_OFFSET as usize + byte] ^= 0x01;

    let mut engine = engine_with(storage, 5_000, EngineConfig::default());
    assert_eq!(engine.init(), Some(LoadOutcome::Defaulted));
    assert_eq!(engine.counters().total_presses, 0);
    assert_eq!(engine.persistence().flush_count(), 1);
    assert_eq!(engine.persistence().state(), StoreState::LoadedDefault);

    let decoded = codec::decode::<_, ROWS, COLS>(
        engine.persistence_mut().storage_mut(),
        DEFAULT_OFFSET,
    )
    .unwrap();
    assert_eq!(decoded.counters, Counters::new());
    assert_eq!(decoded.crc, codec::checksum(&Counters::<ROWS, COLS>::new()));
}

#[test]
fn flipped_crc_bit_resets_to_defaults() {
    assert_recovers_from_flipped_bit(CRC_OFFSET);
    assert_recovers_from_flipped_bit(CRC_OFFSET + 3);
}

#[test]
fn flipped_magic_bit_resets_to_defaults() {
    assert_recovers_from_flipped_bit(0);
}

#[test]
fn flipped_version_bit_resets_to_defaults() {
    assert_recovers_from_flipped_bit(4);
}

#[test]
fn flipped_payload_bit_resets_to_defaults() {
    assert_recovers_from_flipped_bit(codec::positions_offset() + 2);
}

#[test]
fn valid_blob_is_not_rewritten_on_boot() {
    let storage = valid_storage();
    let writes_before = storage.write_count();

    let config = EngineConfig {
        auto_new_session_on_boot: false,
        ..EngineConfig::default()
    };
    let mut engine = engine_with(storage, 9_000, config);
    assert_eq!(engine.init(), Some(LoadOutcome::Restored));
    assert_eq!(engine.persistence().flush_count(), 0);
    assert_eq!(engine.persistence().storage().write_count(), writes_before);
    assert!(!engine.store().is_dirty());
}

// ---------------------------------------------------------------------------
// Saturation
// ---------------------------------------------------------------------------

#[test]
fn saturating_position_only_touches_its_own_bytes() {
    let mut counters = Counters::<ROWS, COLS>::new();
    counters.positions[0][0] = u16::MAX - 1;
    counters.positions[0][1] = 7;
    let mut store = CounterStore::from_counters(counters);
    let before = encode_bytes(store.counters());

    for _ in 0..3 {
        store.increment_position(0, 0);
    }
    let after = encode_bytes(store.counters());

    let target = codec::positions_offset();
    assert_eq!(&after[target..target + 2], &[0xFF, 0xFF]);
    for (i, (a, b)) in before.iter().zip(after.iter()).enumerate() {
        let in_crc = (CRC_OFFSET..CRC_OFFSET + 4).contains(&i);
        let in_target = (target..target + 2).contains(&i);
        if !in_crc && !in_target {
            assert_eq!(a, b, "byte {i} changed");
        }
    }
    assert_eq!(store.position(0, 1), 7);
}

#[test]
fn saturated_lifetime_total_keeps_counting_the_session() {
    let mut counters = Counters::<ROWS, COLS>::new();
    counters.total_presses = u32::MAX;
    let mut store = CounterStore::from_counters(counters);

    assert!(store.record_key_event(1, 1, 0, ModMask::empty(), 0));
    assert_eq!(store.counters().total_presses, u32::MAX);
    assert_eq!(store.counters().session_presses, 1);
    assert_eq!(store.counters().left_hand_presses, 1);
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[test]
fn new_session_isolates_session_count() {
    let mut engine = fresh_engine(100);
    type_indices(&mut engine, &[0, 1, 2, 3, 4], 10);

    let mut last_total = engine.counters().total_presses;
    for round in 1..=3u32 {
        engine.start_new_session();
        assert_eq!(engine.counters().session_presses, 0);

        for i in 0..round * 2 {
            press(&mut engine, 1, (i % 12) as u8);
            let total = engine.counters().total_presses;
            assert!(total > last_total);
            last_total = total;
        }
        assert_eq!(engine.counters().session_presses, round * 2);
        assert!(engine.counters().total_presses >= engine.counters().session_presses);
    }
    assert_eq!(engine.counters().total_presses, 5 + 2 + 4 + 6);
}

#[test]
fn reset_all_starts_from_zero_and_persists() {
    let mut engine = fresh_engine(100);
    type_indices(&mut engine, &[7, 8, 9], 10);
    let flushes = engine.persistence().flush_count();

    engine.reset_all();
    assert_eq!(engine.counters().total_presses, 0);
    assert!(engine.counters().session_started());
    assert_eq!(engine.persistence().flush_count(), flushes + 1);
    assert!(!engine.store().is_dirty());
}

#[test]
fn uninitialized_engine_ignores_everything() {
    let mut engine = engine_with(MemStorage::erased(CAPACITY), 0, EngineConfig::default());
    assert!(!press(&mut engine, 0, 0));
    assert!(engine.summary().is_none());
    assert!(!engine.flush());
    engine.on_tick();
    assert_eq!(engine.persistence().state(), StoreState::Unloaded);
    assert_eq!(engine.persistence().storage().write_count(), 0);
}

#[test]
fn default_layer_switch_counts_on_new_layer() {
    let mut engine = fresh_engine(1_000);
    press(&mut engine, 0, 0);

    engine.host_mut().set_default_layer_state(0b100);
    engine.host_mut().advance(50);
    press(&mut engine, 0, 1);
    engine.on_layer_change(0b10);
    press(&mut engine, 0, 2);

    let layers = engine.counters().layers;
    assert_eq!(layers[0], 1);
    assert_eq!(layers[2], 2);
    assert_eq!(layers[1], 0);
}

// ---------------------------------------------------------------------------
// Bigrams and analysis
// ---------------------------------------------------------------------------

#[cfg(feature = "bigram-stats")]
#[test]
fn bigram_sequence_is_deterministic() {
    use typing_stats::stats::Bigram;

    let mut engine = fresh_engine(1);
    type_indices(&mut engine, &[5, 12, 5, 12, 5, 12], 100);

    let analysis = engine.analysis();
    let bigrams = &analysis.counters().bigrams;
    assert_eq!(bigrams.len(), 2);

    let mut top = [Bigram::default(); 1];
    assert_eq!(analysis.top_bigrams(&mut top), 1);
    assert_eq!((top[0].first, top[0].second, top[0].count), (5, 12, 3));

    let mut all = [Bigram::default(); 4];
    assert_eq!(analysis.top_bigrams(&mut all), 2);
    assert_eq!((all[1].first, all[1].second, all[1].count), (12, 5, 2));

    type_indices(&mut engine, &[7], 100);
    let mut all = [Bigram::default(); 4];
    assert_eq!(engine.analysis().top_bigrams(&mut all), 3);
    assert_eq!((all[2].first, all[2].second, all[2].count), (12, 7, 1));
}

#[test]
fn entropy_boundaries() {
    let mut store = CounterStore::<ROWS, COLS>::new();
    assert_eq!(Analysis::new(&store).key_entropy(), 0.0);

    for _ in 0..10 {
        store.record_key_event(2, 2, 0, ModMask::empty(), 0);
    }
    assert_eq!(Analysis::new(&store).key_entropy(), 0.0);

    for _ in 0..10 {
        store.record_key_event(3, 9, 0, ModMask::empty(), 0);
    }
    let bits = Analysis::new(&store).key_entropy();
    assert!((bits - 1.0).abs() < 1e-12, "entropy was {bits}");
}

#[test]
fn summary_reflects_engine_state() {
    let mut engine = fresh_engine(1);
    engine.host_mut().set_modifiers(ModMask(Modifier::RShift.bit()));
    type_indices(&mut engine, &[0, 1, 13, 18], 100);

    let summary = engine.summary().unwrap();
    assert_eq!(summary.total_lifetime_presses, 4);
    assert_eq!(summary.session_presses, 4);
    assert_eq!(summary.left_hand_ratio, 0.75);
    assert_eq!(summary.most_used_modifier, Some(Modifier::RShift));
    assert_eq!(summary.most_used_layer, Some(0));
}

#[test]
fn report_from_engine_serializes() {
    let mut engine = fresh_engine(1);
    type_indices(&mut engine, &[0, 0, 1], 100);

    let report = StatsReport::new(
        &engine.analysis(),
        engine.summary().unwrap(),
        engine.session_minutes(),
        |_, _| "",
    );
    assert_eq!(report.top_keys[0].label, "r0c0");
    assert_eq!(report.top_keys[0].presses, 2);
    let json = report.to_json().unwrap();
    assert!(json.contains("\"total_lifetime_presses\": 3"));
}

// ---------------------------------------------------------------------------
// Flush debounce
// ---------------------------------------------------------------------------

#[test]
fn event_threshold_flushes_first() {
    let mut engine = fresh_engine(1_000);
    assert_eq!(engine.persistence().flush_count(), 1);

    // 1999 presses in well under 10 s
    for i in 0..1_999u32 {
        engine.host_mut().advance(5);
        press(&mut engine, 0, (i % 2) as u8);
        engine.on_tick();
    }
    assert_eq!(engine.persistence().flush_count(), 1);
    assert!(engine.store().is_dirty());

    engine.host_mut().advance(5);
    press(&mut engine, 0, 0);
    engine.on_tick();
    assert_eq!(engine.persistence().flush_count(), 2);
    assert!(!engine.store().is_dirty());
    assert_eq!(engine.persistence().state(), StoreState::LoadedValid);
}

#[test]
fn time_threshold_flushes_with_few_events() {
    let mut engine = fresh_engine(1_000);
    type_indices(&mut engine, &[3, 4, 5, 6, 7], 1_000);

    engine.host_mut().set_now(1_000 + 119_000);
    engine.on_tick();
    assert_eq!(engine.persistence().flush_count(), 1);
    assert!(engine.store().is_dirty());

    engine.host_mut().set_now(1_000 + 121_000);
    engine.on_tick();
    assert_eq!(engine.persistence().flush_count(), 2);
    assert_eq!(engine.persistence().last_flush_ms(), 122_000);
}

#[test]
fn clean_store_is_never_flushed() {
    let config = EngineConfig {
        auto_new_session_on_boot: false,
        ..EngineConfig::default()
    };
    let mut engine = engine_with(valid_storage(), 0, config);
    engine.init();

    engine.host_mut().advance(10 * 60_000);
    engine.on_tick();
    assert_eq!(engine.persistence().flush_count(), 0);
}

#[test]
fn config_thresholds_drive_the_debounce() {
    let mut config = Config::default();
    config.stats.flush_events = 10;
    config.stats.flush_interval_secs = 3_600;

    let store = BlockStore::new(
        MemStorage::erased(CAPACITY),
        config.storage.offset,
        config.flush_policy(),
    );
    let mut engine: StatsEngine<MemStorage> =
        Engine::new(TestHost::at(1), store, config.engine_config());
    engine.init();

    type_indices(&mut engine, &[1; 9], 10);
    assert_eq!(engine.persistence().flush_count(), 1);
    type_indices(&mut engine, &[2], 10);
    assert_eq!(engine.persistence().flush_count(), 2);
}

#[test]
fn flush_survives_clock_wraparound() {
    let mut engine = fresh_engine(u32::MAX - 30_000);
    type_indices(&mut engine, &[9], 10);

    // 100 s later the clock has wrapped past zero
    engine.host_mut().set_now(69_990);
    engine.on_tick();
    assert_eq!(engine.persistence().flush_count(), 1);

    engine.host_mut().set_now(91_000);
    engine.on_tick();
    assert_eq!(engine.persistence().flush_count(), 2);
}
