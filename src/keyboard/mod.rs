//! Key events and the desktop keyboard host

mod event;
mod host;
pub mod layout;
mod state;

pub use event::{KeyEvent, KeyboardListener, MonotonicClock, RawKeyEvent};
pub use host::SystemHost;
pub use state::{KeyboardState, SpeedMeter};
