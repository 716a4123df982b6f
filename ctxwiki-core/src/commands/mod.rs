// src/commands/mod.rs
pub mod init;
pub mod update;
mod api;

pub use api::Commands;

pub use init::{ensure_initialized, InitReport};
pub use update::{review_files, SessionNote, SessionUpdate, TargetMerge, UpdateOutcome};
