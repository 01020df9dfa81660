//! Persistence of the counter store to a non-volatile block
//!
//! [`BlockStore`] keeps one checksummed blob at a fixed offset of any
//! `embedded-storage` medium and writes it back on a debounced schedule.
//! [`Volatile`] is the stand-in when nothing should survive a power cycle.

#[cfg(feature = "persistent-storage")]
pub mod backend;
#[cfg(feature = "persistent-storage")]
pub mod codec;
#[cfg(feature = "persistent-storage")]
pub mod crc;

#[cfg(feature = "persistent-storage")]
pub use backend::{FileStorage, MemStorage};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stats::CounterStore;
#[cfg(feature = "persistent-storage")]
use crate::utils::elapsed_ms;

/// Default byte offset of the blob on the medium
pub const DEFAULT_OFFSET: u32 = 0x200;

/// Failure talking to the storage medium
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage read failed at offset {offset:#x}")]
    Read { offset: u32 },
    #[error("storage write failed at offset {offset:#x}")]
    Write { offset: u32 },
    #[error("storage too small: {needed} bytes at offset {offset:#x} exceed capacity {capacity}")]
    Capacity {
        offset: u32,
        needed: usize,
        capacity: usize,
    },
}

/// When a dirty store is written back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushPolicy {
    /// Flush once this much time has passed since the last flush
    pub interval_ms: u32,
    /// Flush once this many events arrived since the last flush
    pub event_threshold: u32,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 120_000,
            event_threshold: 2_000,
        }
    }
}

impl FlushPolicy {
    /// Either threshold is enough
    pub fn is_due(&self, since_flush_ms: u32, events_since_flush: u32) -> bool {
        since_flush_ms >= self.interval_ms || events_since_flush >= self.event_threshold
    }
}

/// Lifecycle of the persisted copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Unloaded,
    /// The medium holds the same counters as memory
    LoadedValid,
    /// The medium held nothing usable; defaults are in memory
    LoadedDefault,
    /// Memory is ahead of the medium
    Dirty,
    /// A write is in progress
    Flushing,
}

/// What `load` found on the medium
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A valid blob was restored
    Restored,
    /// Nothing valid was found; the store holds zeroed defaults
    Defaulted,
}

/// Where the counter store lives between boots
pub trait Persistence {
    /// Fill `store` from the medium, falling back to defaults
    fn load<const ROWS: usize, const COLS: usize>(
        &mut self,
        store: &mut CounterStore<ROWS, COLS>,
        now: u32,
        event_counter: u32,
    ) -> LoadOutcome;

    /// Write the store back unconditionally
    fn save<const ROWS: usize, const COLS: usize>(
        &mut self,
        store: &mut CounterStore<ROWS, COLS>,
        now: u32,
        event_counter: u32,
    ) -> Result<(), StorageError>;

    /// Write the store back if it is dirty and a flush threshold was crossed.
    /// Returns whether a flush succeeded.
    fn maybe_flush<const ROWS: usize, const COLS: usize>(
        &mut self,
        store: &mut CounterStore<ROWS, COLS>,
        now: u32,
        event_counter: u32,
    ) -> bool;

    fn state(&self) -> StoreState;
}

// ---- Block store ----

/// Checksummed blob at a fixed offset of a block medium
#[cfg(feature = "persistent-storage")]
#[derive(Debug)]
pub struct BlockStore<S> {
    storage: S,
    offset: u32,
    policy: FlushPolicy,
    state: StoreState,
    last_flush_ms: u32,
    events_at_flush: u32,
    flushes: u32,
}

#[cfg(feature = "persistent-storage")]
impl<S> BlockStore<S>
where
    S: embedded_storage::Storage,
    S::Error: core::fmt::Debug,
{
    pub fn new(storage: S, offset: u32, policy: FlushPolicy) -> Self {
        Self {
            storage,
            offset,
            policy,
            state: StoreState::Unloaded,
            last_flush_ms: 0,
            events_at_flush: 0,
            flushes: 0,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_inner(self) -> S {
        self.storage
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    /// Successful writes since this store was created
    pub fn flush_count(&self) -> u32 {
        self.flushes
    }

    pub fn last_flush_ms(&self) -> u32 {
        self.last_flush_ms
    }
}

#[cfg(feature = "persistent-storage")]
impl<S> Persistence for BlockStore<S>
where
    S: embedded_storage::Storage,
    S::Error: core::fmt::Debug,
{
    fn load<const ROWS: usize, const COLS: usize>(
        &mut self,
        store: &mut CounterStore<ROWS, COLS>,
        now: u32,
        event_counter: u32,
    ) -> LoadOutcome {
        self.last_flush_ms = now;
        self.events_at_flush = event_counter;

        match codec::decode::<S, ROWS, COLS>(&mut self.storage, self.offset) {
            Ok(decoded) => {
                *store = CounterStore::from_counters(decoded.counters);
                self.state = StoreState::LoadedValid;
                log::info!(
                    "restored typing stats (crc {:#010x}, {} lifetime presses)",
                    decoded.crc,
                    store.counters().total_presses
                );
                LoadOutcome::Restored
            }
            Err(e) => {
                log::warn!("stored typing stats unusable, starting from zero: {e}");
                store.reset();
                match self.save(store, now, event_counter) {
                    // Written, but still defaults until the first press
                    Ok(()) => self.state = StoreState::LoadedDefault,
                    Err(e) => log::warn!("could not write fresh typing stats: {e}"),
                }
                LoadOutcome::Defaulted
            }
        }
    }

    fn save<const ROWS: usize, const COLS: usize>(
        &mut self,
        store: &mut CounterStore<ROWS, COLS>,
        now: u32,
        event_counter: u32,
    ) -> Result<(), StorageError> {
        self.state = StoreState::Flushing;
        match codec::encode(&mut self.storage, self.offset, store.counters()) {
            Ok(crc) => {
                store.clear_dirty();
                self.last_flush_ms = now;
                self.events_at_flush = event_counter;
                self.flushes = self.flushes.saturating_add(1);
                self.state = StoreState::LoadedValid;
                log::debug!("flushed typing stats at {now} ms (crc {crc:#010x})");
                Ok(())
            }
            Err(e) => {
                store.mark_dirty();
                self.state = StoreState::Dirty;
                Err(e)
            }
        }
    }

    fn maybe_flush<const ROWS: usize, const COLS: usize>(
        &mut self,
        store: &mut CounterStore<ROWS, COLS>,
        now: u32,
        event_counter: u32,
    ) -> bool {
        if !store.is_dirty() {
            return false;
        }
        self.state = StoreState::Dirty;

        let since_flush = elapsed_ms(now, self.last_flush_ms);
        let events = event_counter.wrapping_sub(self.events_at_flush);
        if !self.policy.is_due(since_flush, events) {
            return false;
        }

        match self.save(store, now, event_counter) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("typing stats flush failed, will retry: {e}");
                false
            }
        }
    }

    fn state(&self) -> StoreState {
        self.state
    }
}

// ---- Volatile ----

/// Keeps nothing: every boot starts from zero and flushing does nothing
#[derive(Debug, Clone, Copy)]
pub struct Volatile {
    state: StoreState,
}

impl Default for Volatile {
    fn default() -> Self {
        Self {
            state: StoreState::Unloaded,
        }
    }
}

impl Persistence for Volatile {
    fn load<const ROWS: usize, const COLS: usize>(
        &mut self,
        store: &mut CounterStore<ROWS, COLS>,
        _now: u32,
        _event_counter: u32,
    ) -> LoadOutcome {
        *store = CounterStore::new();
        self.state = StoreState::LoadedDefault;
        LoadOutcome::Defaulted
    }

    fn save<const ROWS: usize, const COLS: usize>(
        &mut self,
        store: &mut CounterStore<ROWS, COLS>,
        _now: u32,
        _event_counter: u32,
    ) -> Result<(), StorageError> {
        store.clear_dirty();
        Ok(())
    }

    fn maybe_flush<const ROWS: usize, const COLS: usize>(
        &mut self,
        _store: &mut CounterStore<ROWS, COLS>,
        _now: u32,
        _event_counter: u32,
    ) -> bool {
        false
    }

    fn state(&self) -> StoreState {
        self.state
    }
}
