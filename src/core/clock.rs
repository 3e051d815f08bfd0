//! Elapsed-time sources for the two scheduling legs.
//!
//! Both legs feed the same occurrence formula in the scheduler; they differ only
//! in which marker they read, how far they may look back and how they move the
//! marker afterwards.

use super::config::EngineConfig;
use super::error::SkipReason;
use crate::chamber::Chamber;
use chrono::Utc;

pub trait ElapsedTimeSource {
    /// Short label for logs and reports.
    fn label(&self) -> &'static str;

    /// Whole intervals elapsed since the chamber's marker, already clamped to
    /// this leg's bound.
    fn elapsed_occurrences(
        &self,
        chamber: &Chamber,
        interval_ticks: u64,
        config: &EngineConfig,
    ) -> Result<u64, SkipReason>;

    /// Move the chamber's marker after `occurrences` were taken. Called on every
    /// scheduling attempt that got past the pause check, including skips.
    fn commit(&self, chamber: &mut Chamber, occurrences: u64, interval_ticks: u64);

    /// Representative draws per flush on this leg.
    fn sample_cap(&self, config: &EngineConfig) -> u32;
}

/// Online leg: engine ticks while the owner's session is active.
#[derive(Debug, Clone, Copy)]
pub struct TickClock {
    pub current_tick: u64,
}

impl ElapsedTimeSource for TickClock {
    fn label(&self) -> &'static str {
        "online"
    }

    fn elapsed_occurrences(
        &self,
        chamber: &Chamber,
        interval_ticks: u64,
        config: &EngineConfig,
    ) -> Result<u64, SkipReason> {
        let elapsed = self.current_tick.saturating_sub(chamber.last_scheduled_tick);
        let occurrences = elapsed / interval_ticks.max(1);
        Ok(occurrences.min(config.online_occurrence_ceiling))
    }

    fn commit(&self, chamber: &mut Chamber, occurrences: u64, interval_ticks: u64) {
        // Only whole intervals are consumed; the remainder carries into the next tick.
        let advance = occurrences.saturating_mul(interval_ticks.max(1));
        chamber.last_scheduled_tick = chamber.last_scheduled_tick.saturating_add(advance);
    }

    fn sample_cap(&self, config: &EngineConfig) -> u32 {
        config.online_sample_cap
    }
}

/// Offline leg: real time since the chamber was last seen.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    pub now_millis: i64,
}

impl WallClock {
    pub fn now() -> Self {
        Self {
            now_millis: Utc::now().timestamp_millis(),
        }
    }
}

impl ElapsedTimeSource for WallClock {
    fn label(&self) -> &'static str {
        "offline"
    }

    fn elapsed_occurrences(
        &self,
        chamber: &Chamber,
        interval_ticks: u64,
        config: &EngineConfig,
    ) -> Result<u64, SkipReason> {
        let marker = chamber.last_wall_clock_millis.ok_or(SkipReason::NoMarker)?;
        let elapsed = self.now_millis.saturating_sub(marker);
        if elapsed < 0 {
            return Err(SkipReason::ClockRegression {
                behind_millis: -elapsed,
            });
        }
        let window = elapsed.min(config.max_backfill_millis.max(0));
        Ok(u64::try_from(window / config.interval_millis(interval_ticks)).unwrap_or(0))
    }

    fn commit(&self, chamber: &mut Chamber, _occurrences: u64, _interval_ticks: u64) {
        // Offline gaps are coarse; the sub-interval remainder is dropped.
        chamber.last_wall_clock_millis = Some(self.now_millis);
    }

    fn sample_cap(&self, config: &EngineConfig) -> u32 {
        config.offline_sample_cap
    }
}
