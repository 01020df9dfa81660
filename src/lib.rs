//! Typing Stats - keyboard usage statistics with checksummed persistence
//!
//! Counts key presses per matrix position, layer and modifier, keeps
//! smoothed typing speed, a bounded table of key pairs and a few hand and
//! finger estimates. Counters survive restarts as a single checksummed blob
//! on a block storage medium and are written back on a debounce.
//!
//! The [`Engine`] is the entry point; [`ui`] and the `typing-stats` binary
//! put it behind a terminal dashboard fed by the desktop keyboard.

pub mod analysis;
pub mod config;
pub mod engine;
pub mod keyboard;
pub mod matrix;
pub mod report;
pub mod stats;
pub mod storage;
pub mod testing;
pub mod ui;
pub mod utils;

pub use analysis::{Analysis, Summary};
pub use config::Config;
pub use engine::{Engine, EngineConfig, Host};
pub use keyboard::KeyEvent;
pub use matrix::{Finger, Hand, Matrix, Position};
pub use stats::{CounterStore, Counters, ModMask, Modifier};
#[cfg(feature = "persistent-storage")]
pub use storage::BlockStore;
pub use storage::{FlushPolicy, LoadOutcome, Persistence, StorageError, StoreState, Volatile};
