//! vchamber - virtual chamber simulation engine
//!
//! Chambers stand in for farms: each holds one reward source and produces
//! rewards at a rank-driven rate, online every tick and offline on login.
//! The engine never simulates occurrences one by one; it samples a bounded
//! number of weighted draws and commits each flush atomically.
//!
//! Everything host-specific (loot rolls, prices, ranks, ledgers, recipes) is
//! reached through the traits in [`host`].

pub mod chamber;
pub mod core;
pub mod host;
pub mod loot;
pub mod simulation;

pub use crate::chamber::{AccountId, Chamber, ChamberRoster, ItemId, ItemStack, SourceIdentity};
pub use crate::core::{ChamberEngine, EngineConfig, FlushReport, PassReport, SkipReason};
pub use crate::host::Host;
