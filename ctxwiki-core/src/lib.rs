// src/lib.rs
//! Wiki consolidation engine: merges per-session knowledge proposals into a
//! persistent, bounded, three-section project wiki plus a separate
//! architecture overview, with a review gate and all-or-nothing commits.

pub mod commands;
pub mod config;
pub mod error;
pub mod services;
pub mod utils;
pub mod wiki;

pub use error::{WikiError, WikiResult};
pub use wiki::{ArchitectureDocument, DecisionEntry, WikiDocument, WorkEntry};
