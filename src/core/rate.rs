//! Rate model: how often a chamber fires and how many occurrences each firing is worth.
//!
//! Pure functions of the ranks and config; safe to call every tick.

use super::config::EngineConfig;
use super::constants::{DAMPING_KNEE, DAMPING_MAX_EXPONENT};
use serde::{Deserialize, Serialize};

/// Maps an unbounded thread rank to a bounded batch exponent.
///
/// `exponent(r) = r` for `r <= knee`, then `knee + floor(sqrt(r - knee))`,
/// never above `max_exponent`. Monotonic non-decreasing in `r`. With the
/// default cap of 32 a batch is at most 2^32, so `occurrences * batch` stays
/// far inside `u64` and `Decimal` for any occurrence ceiling in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DampingCurve {
    pub knee: u32,
    pub max_exponent: u32,
}

impl Default for DampingCurve {
    fn default() -> Self {
        Self {
            knee: DAMPING_KNEE,
            max_exponent: DAMPING_MAX_EXPONENT,
        }
    }
}

impl DampingCurve {
    pub fn exponent(&self, rank: u32) -> u32 {
        // Hard ceiling on the shift so a bad config cannot overflow 2^e.
        let cap = self.max_exponent.min(62);
        let raw = if rank <= self.knee {
            rank
        } else {
            let excess = (rank - self.knee) as f64;
            self.knee.saturating_add(excess.sqrt().floor() as u32)
        };
        raw.min(cap)
    }
}

/// Effective firing rate of one chamber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    pub interval_ticks: u64,
    pub batch_size: u64,
}

/// Ticks between firings.
pub fn interval_ticks(config: &EngineConfig, speed_rank: u32, overclock_rank: u32) -> u64 {
    if speed_rank >= config.max_speed_rank {
        return 1;
    }
    let exponent = i32::try_from(speed_rank).unwrap_or(i32::MAX);
    let raw = config.base_interval_ticks as f64 * config.interval_decay.powi(exponent)
        / (1.0 + overclock_rank as f64);
    if !raw.is_finite() || raw < 1.0 {
        return 1;
    }
    (raw.round() as u64).max(1)
}

/// Occurrences represented by one firing: `2^damped(thread_rank)`.
pub fn batch_size(config: &EngineConfig, thread_rank: u32) -> u64 {
    1u64 << config.damping.exponent(thread_rank)
}

pub fn rate_for(config: &EngineConfig, speed_rank: u32, thread_rank: u32, overclock_rank: u32) -> Rate {
    Rate {
        interval_ticks: interval_ticks(config, speed_rank, overclock_rank),
        batch_size: batch_size(config, thread_rank),
    }
}
