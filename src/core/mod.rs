//! Engine core: configuration, the rate model, clocks and the scheduler.

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod rate;
pub mod scheduler;

pub use clock::{ElapsedTimeSource, TickClock, WallClock};
pub use config::{EngineConfig, StatGrowth};
pub use error::{ChamberError, SkipReason};
pub use rate::{rate_for, DampingCurve, Rate};
pub use scheduler::{ChamberEngine, FlushReport, PassReport};
