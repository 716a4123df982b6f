// src/utils/mod.rs
pub mod clock;
pub mod fsio;
pub mod lockfile;
pub mod logbook;

pub use clock::{Clock, FixedClock, SystemClock};
pub use fsio::{write_atomic, Snapshot};
pub use lockfile::LockGuard;
