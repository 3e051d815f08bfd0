//! Representative sampling: a bounded number of resolver draws stands in for
//! an arbitrarily large number of occurrences.
//!
//! Every draw is weighted by `scale = total_units / sample_size`, so the
//! expected totals match resolving every occurrence one by one.

use super::accumulator::{saturating_mul, Accumulator};
use crate::chamber::{AccountId, Chamber, ItemId};
use crate::core::config::EngineConfig;
use crate::core::constants::SCALE_DECIMAL_PLACES;
use crate::host::{Ability, Host, ResolveRequest};
use crate::loot::filter::{process_lines, LootContext, LootTally};
use rand::RngCore;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplePlan {
    pub sample_size: u32,
    /// Occurrences represented by each draw
    pub scale: Decimal,
}

/// Split `total_units` into at most `cap` weighted draws. `None` when there is
/// nothing to draw.
pub fn sample_plan(total_units: u64, cap: u32) -> Option<SamplePlan> {
    if total_units == 0 || cap == 0 {
        return None;
    }
    let sample_size = total_units.min(cap as u64) as u32;
    let scale = (Decimal::from(total_units) / Decimal::from(sample_size)).round_dp(SCALE_DECIMAL_PLACES);
    Some(SamplePlan { sample_size, scale })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleOutcome {
    pub draws: u32,
    pub scale: Decimal,
    pub loot: LootTally,
    /// Bartering draws dropped for lack of input
    pub unfunded: u32,
}

/// Spend buffered input for one barter draw. Returns the draw's weight,
/// capped at the input actually consumed, or `None` when the buffer is dry.
fn fund_barter(chamber: &mut Chamber, currency: &ItemId, scale: Decimal) -> Option<Decimal> {
    let whole = scale.floor().to_u64().unwrap_or(u64::MAX).max(1);
    let taken = chamber.take_input(currency, whole);
    if taken == 0 {
        return None;
    }
    if taken < whole {
        Some(Decimal::from(taken))
    } else {
        Some(scale)
    }
}

/// Run the draws for one flush, writing storage directly and every
/// cross-entity effect into `acc`.
#[allow(clippy::too_many_arguments)]
pub fn run_sample(
    chamber: &mut Chamber,
    owner: AccountId,
    total_units: u64,
    cap: u32,
    host: &Host<'_>,
    config: &EngineConfig,
    acc: &mut Accumulator,
    rng: &mut dyn RngCore,
) -> SampleOutcome {
    let Some(plan) = sample_plan(total_units, cap) else {
        return SampleOutcome::default();
    };

    let creature = chamber.source.is_creature();
    let bartering = creature && chamber.bartering_mode && host.unlocked(owner, Ability::BarteringProtocol);
    // Kills only; a barter is a trade
    let kills = creature && !bartering;

    let luck = host.rank(owner, Ability::LuckInjection) as f32 * config.luck_per_rank;
    let looting = if kills {
        host.rank(owner, Ability::RecursiveLooting)
    } else {
        0
    };
    let soul_reap = if kills { host.rank(owner, Ability::SoulReap) } else { 0 };
    let feeds_satiety = kills && !host.unlocked(owner, Ability::IsolatedSandbox);
    let loot_ctx = LootContext {
        owner,
        prices: host.prices,
        direct_liquidation: chamber.direct_liquidation && host.unlocked(owner, Ability::DirectLiquidation),
        advanced_filtering: host.unlocked(owner, Ability::AdvancedFiltering),
    };

    let mut outcome = SampleOutcome {
        draws: plan.sample_size,
        scale: plan.scale,
        ..Default::default()
    };

    for _ in 0..plan.sample_size {
        let scale = if bartering {
            match fund_barter(chamber, &config.bartering_currency, plan.scale) {
                Some(scale) => scale,
                None => {
                    outcome.unfunded += 1;
                    continue;
                }
            }
        } else {
            plan.scale
        };

        let occurrence = {
            let request = ResolveRequest {
                source: &chamber.source,
                tool: chamber.tool_snapshot.as_ref(),
                source_snapshot: chamber.source_snapshot.as_ref(),
                luck,
                looting,
                bartering,
            };
            host.resolver.resolve(&request, rng)
        };

        acc.add_occurrences(scale);
        if !bartering {
            acc.add_energy(saturating_mul(Decimal::from(occurrence.experience), scale));
        }

        if soul_reap > 0 {
            let weight = saturating_mul(Decimal::from(soul_reap), scale);
            for growth in &config.on_kill_growth {
                acc.add_stat(&growth.stat, saturating_mul(growth.per_rank, weight));
            }
        }
        if feeds_satiety {
            acc.add_satiety(saturating_mul(config.satiety_per_occurrence, scale));
        }

        let tally = process_lines(chamber, occurrence.lines, scale, &loot_ctx, acc, rng);
        outcome.loot.merge(tally);
    }

    outcome
}
