//! Chamber scheduling: the per-tick online pass and the per-login offline
//! catch-up, both driving the same flush pipeline.
//!
//! A flush is: elapsed occurrences -> weighted sampling -> condensation ->
//! storage cap -> one atomic apply. Skips never abort a roster pass; they are
//! logged and reported per chamber.

use super::clock::{ElapsedTimeSource, TickClock, WallClock};
use super::config::EngineConfig;
use super::error::SkipReason;
use super::rate::{rate_for, Rate};
use crate::chamber::{AccountId, Chamber, ChamberRoster, CondensationMode, ItemStack};
use crate::host::{AccountLedger, Ability, Host};
use crate::loot::{condense, enforce_cap, sort_by_identity, CondensationCache};
use crate::simulation::{run_sample, Accumulator, AppliedDeltas, SampleOutcome};
use rand::RngCore;

/// Everything one successful flush did.
#[derive(Debug, Clone)]
pub struct FlushReport {
    /// "online" or "offline"
    pub leg: &'static str,
    pub rate: Rate,
    pub occurrences: u64,
    /// Occurrences times batch size
    pub total_units: u64,
    pub sample: SampleOutcome,
    pub condensed: bool,
    pub evicted: Vec<ItemStack>,
    pub applied: AppliedDeltas,
}

/// Outcome of one pass over a roster, keyed by chamber index.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub flushes: Vec<(usize, FlushReport)>,
    pub skipped: Vec<(usize, SkipReason)>,
}

impl PassReport {
    pub fn total_units(&self) -> u64 {
        self.flushes
            .iter()
            .fold(0u64, |acc, (_, f)| acc.saturating_add(f.total_units))
    }

    pub fn skipped_for(&self, reason: &SkipReason) -> usize {
        self.skipped.iter().filter(|(_, r)| r == reason).count()
    }
}

/// Owns configuration and caches for one server instance.
#[derive(Debug, Default)]
pub struct ChamberEngine {
    pub config: EngineConfig,
    condensation: CondensationCache,
}

impl ChamberEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            condensation: CondensationCache::new(),
        }
    }

    pub fn condensation_cache(&self) -> &CondensationCache {
        &self.condensation
    }

    /// Effective rate after clamping the chamber's dials to the owner's ranks.
    pub fn effective_rate(&self, owner: AccountId, chamber: &Chamber, host: &Host<'_>) -> Rate {
        let speed = chamber.speed_rank.min(host.rank(owner, Ability::ClockSpeed));
        let thread = chamber.thread_rank.min(host.rank(owner, Ability::MultiThread));
        let overclock = host.rank(owner, Ability::SystemOverclock);
        rate_for(&self.config, speed, thread, overclock)
    }

    /// Schedule one chamber against `clock`.
    ///
    /// Paused chambers are left untouched. Otherwise the clock marker is
    /// always committed, even when the call ends up skipping.
    pub fn schedule(
        &self,
        owner: AccountId,
        chamber: &mut Chamber,
        clock: &dyn ElapsedTimeSource,
        host: &Host<'_>,
        ledger: &mut dyn AccountLedger,
        rng: &mut dyn RngCore,
    ) -> Result<FlushReport, SkipReason> {
        if chamber.paused {
            return Err(SkipReason::Paused);
        }

        let rate = self.effective_rate(owner, chamber, host);
        let elapsed = clock.elapsed_occurrences(chamber, rate.interval_ticks, &self.config);
        clock.commit(chamber, *elapsed.as_ref().unwrap_or(&0), rate.interval_ticks);

        let occurrences = match elapsed {
            Ok(0) => return Err(SkipReason::NothingElapsed),
            Ok(n) => n,
            Err(reason) => {
                if let SkipReason::ClockRegression { behind_millis } = reason {
                    tracing::warn!(
                        source = %chamber.source,
                        behind_millis,
                        "Wall clock went backwards, marker reset"
                    );
                }
                return Err(reason);
            }
        };

        if !host.resolver.can_resolve(&chamber.source) {
            tracing::warn!(source = %chamber.source, "Skipping chamber with unresolvable source");
            return Err(SkipReason::Unresolvable(chamber.source.clone()));
        }

        let total_units = occurrences.saturating_mul(rate.batch_size);
        let mut acc = Accumulator::new();
        let sample = run_sample(
            chamber,
            owner,
            total_units,
            clock.sample_cap(&self.config),
            host,
            &self.config,
            &mut acc,
            rng,
        );
        if sample.unfunded > 0 {
            tracing::debug!(source = %chamber.source, unfunded = sample.unfunded, "Bartering input ran out");
        }

        let condensed = chamber.condensation != CondensationMode::Off
            && host.unlocked(owner, Ability::LootCondensation)
            && condense(
                &mut chamber.storage,
                chamber.condensation,
                &self.condensation,
                host.recipes,
            );

        let evicted = enforce_cap(&mut chamber.storage, self.config.max_storage, host.prices, owner);
        if !evicted.is_empty() {
            tracing::debug!(source = %chamber.source, evicted = evicted.len(), "Storage over cap");
        }
        if self.config.sort_storage_after_flush {
            sort_by_identity(&mut chamber.storage);
        }

        let applied = acc.apply(chamber, owner, ledger, host.ranks, &self.config);

        tracing::debug!(
            leg = clock.label(),
            source = %chamber.source,
            occurrences,
            total_units,
            draws = sample.draws,
            scale = %sample.scale,
            currency = %applied.currency,
            "Flushed chamber"
        );

        Ok(FlushReport {
            leg: clock.label(),
            rate,
            occurrences,
            total_units,
            sample,
            condensed,
            evicted,
            applied,
        })
    }

    /// One online tick over a whole roster, in roster order.
    pub fn run_online_tick(
        &self,
        roster: &mut ChamberRoster,
        current_tick: u64,
        now_millis: i64,
        host: &Host<'_>,
        ledger: &mut dyn AccountLedger,
        rng: &mut dyn RngCore,
    ) -> PassReport {
        let owner = roster.owner;
        let clock = TickClock { current_tick };
        let mut report = PassReport::default();

        for (index, chamber) in roster.chambers.iter_mut().enumerate() {
            if !chamber.paused {
                // Catch-up after this session only covers time spent away.
                chamber.last_wall_clock_millis = Some(now_millis);
            }
            match self.schedule(owner, chamber, &clock, host, ledger, rng) {
                Ok(flush) => report.flushes.push((index, flush)),
                Err(reason) => report.skipped.push((index, reason)),
            }
        }
        report
    }

    /// Backfill the real time a chamber spent without an online session.
    ///
    /// Without `OfflinePersistence` the marker is moved to `now_millis` and
    /// nothing is simulated.
    pub fn trigger_offline_catchup(
        &self,
        owner: AccountId,
        chamber: &mut Chamber,
        now_millis: i64,
        host: &Host<'_>,
        ledger: &mut dyn AccountLedger,
        rng: &mut dyn RngCore,
    ) -> Result<FlushReport, SkipReason> {
        if chamber.paused {
            return Err(SkipReason::Paused);
        }
        if !host.unlocked(owner, Ability::OfflinePersistence) {
            chamber.last_wall_clock_millis = Some(now_millis);
            return Err(SkipReason::OfflineLocked);
        }

        let away_millis = chamber
            .last_wall_clock_millis
            .map(|marker| now_millis.saturating_sub(marker));
        let clock = WallClock { now_millis };
        let flush = self.schedule(owner, chamber, &clock, host, ledger, rng)?;

        tracing::info!(
            source = %chamber.source,
            away_millis = away_millis.unwrap_or(0),
            occurrences = flush.occurrences,
            total_units = flush.total_units,
            currency = %flush.applied.currency,
            stored_lines = chamber.storage.len(),
            "Offline catch-up"
        );
        Ok(flush)
    }

    /// Offline catch-up for every chamber in a roster.
    pub fn catch_up_roster(
        &self,
        roster: &mut ChamberRoster,
        now_millis: i64,
        host: &Host<'_>,
        ledger: &mut dyn AccountLedger,
        rng: &mut dyn RngCore,
    ) -> PassReport {
        let owner = roster.owner;
        let mut report = PassReport::default();
        for (index, chamber) in roster.chambers.iter_mut().enumerate() {
            match self.trigger_offline_catchup(owner, chamber, now_millis, host, ledger, rng) {
                Ok(flush) => report.flushes.push((index, flush)),
                Err(reason) => report.skipped.push((index, reason)),
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chamber::{FilterAction, FilterRule, ItemId, SourceIdentity};
    use crate::host::memory::{
        LootEntry, LootTable, PriceTable, RecipeBook, RecordingLedger, StaticRanks, TableResolver,
    };
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rust_decimal::Decimal;

    struct Fixture {
        resolver: TableResolver,
        prices: PriceTable,
        ranks: StaticRanks,
        recipes: RecipeBook,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                resolver: TableResolver::new().with(
                    piglin(),
                    LootTable::new(4).with(LootEntry::new("gold_nugget", 1.0, 1, 1)),
                ),
                prices: PriceTable::new(Decimal::ONE),
                ranks: StaticRanks::new(),
                recipes: RecipeBook::new(),
            }
        }

        fn host(&self) -> Host<'_> {
            Host {
                resolver: &self.resolver,
                prices: &self.prices,
                ranks: &self.ranks,
                recipes: &self.recipes,
            }
        }
    }

    fn piglin() -> SourceIdentity {
        SourceIdentity::Creature("piglin".into())
    }

    #[test]
    fn test_one_base_interval_is_one_occurrence() {
        let fx = Fixture::new();
        let engine = ChamberEngine::default();
        let owner = AccountId::new_random();
        let mut chamber = Chamber::new(piglin(), 0, 0);
        let mut ledger = RecordingLedger::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let flush = engine
            .schedule(owner, &mut chamber, &TickClock { current_tick: 1200 }, &fx.host(), &mut ledger, &mut rng)
            .unwrap();
        assert_eq!(flush.occurrences, 1);
        assert_eq!(flush.applied.occurrences, Decimal::ONE);
        assert_eq!(chamber.last_scheduled_tick, 1200);
        assert_eq!(chamber.update_version, 1);
    }

    #[test]
    fn test_short_elapsed_keeps_marker() {
        let fx = Fixture::new();
        let engine = ChamberEngine::default();
        let mut chamber = Chamber::new(piglin(), 0, 0);
        let mut ledger = RecordingLedger::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let result = engine.schedule(
            AccountId::new_random(),
            &mut chamber,
            &TickClock { current_tick: 1199 },
            &fx.host(),
            &mut ledger,
            &mut rng,
        );
        assert_eq!(result.unwrap_err(), SkipReason::NothingElapsed);
        assert_eq!(chamber.last_scheduled_tick, 0);
        assert_eq!(chamber.update_version, 0);
    }

    #[test]
    fn test_dials_clamped_to_ranks() {
        let mut fx = Fixture::new();
        fx.ranks.set(Ability::ClockSpeed, 1);
        let engine = ChamberEngine::default();
        let mut chamber = Chamber::new(piglin(), 0, 0);
        chamber.speed_rank = 20;
        chamber.thread_rank = 5;
        let rate = engine.effective_rate(AccountId::new_random(), &chamber, &fx.host());
        assert_eq!(rate.interval_ticks, 960);
        assert_eq!(rate.batch_size, 1);
    }

    #[test]
    fn test_unresolvable_source_skips_and_commits() {
        let fx = Fixture::new();
        let engine = ChamberEngine::default();
        let mut chamber = Chamber::new(SourceIdentity::Creature("removed_mob".into()), 0, 0);
        let mut ledger = RecordingLedger::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let result = engine.schedule(
            AccountId::new_random(),
            &mut chamber,
            &TickClock { current_tick: 2400 },
            &fx.host(),
            &mut ledger,
            &mut rng,
        );
        assert!(matches!(result, Err(SkipReason::Unresolvable(_))));
        assert_eq!(chamber.last_scheduled_tick, 2400);
        assert!(chamber.storage.is_empty());
    }

    #[test]
    fn test_online_pass_continues_past_skips() {
        let mut fx = Fixture::new();
        fx.ranks.set(Ability::AdvancedFiltering, 1);
        let engine = ChamberEngine::default();
        let mut roster = ChamberRoster::new(AccountId::new_random());
        roster.capture(Chamber::new(SourceIdentity::Creature("removed_mob".into()), 0, 0));
        let mut paused = Chamber::new(piglin(), 0, 0);
        paused.pause();
        roster.capture(paused);
        let mut voiding = Chamber::new(piglin(), 0, 0);
        voiding
            .filter_rules
            .push(FilterRule::by_id("gold_nugget", FilterAction::Void));
        roster.capture(voiding);

        let mut ledger = RecordingLedger::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let report = engine.run_online_tick(&mut roster, 1200, 60_000, &fx.host(), &mut ledger, &mut rng);

        assert_eq!(report.flushes.len(), 1);
        assert_eq!(report.flushes[0].0, 2);
        assert_eq!(report.skipped_for(&SkipReason::Paused), 1);
        assert!(roster.chambers[2].storage.is_empty());
        assert_eq!(roster.chambers[1].last_wall_clock_millis, Some(0));
        assert_eq!(roster.chambers[2].last_wall_clock_millis, Some(60_000));
    }

    #[test]
    fn test_offline_locked_rebases_without_simulating() {
        let fx = Fixture::new();
        let engine = ChamberEngine::default();
        let owner = AccountId::new_random();
        let mut chamber = Chamber::new(piglin(), 0, 0);
        let mut ledger = RecordingLedger::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let result =
            engine.trigger_offline_catchup(owner, &mut chamber, 3_600_000, &fx.host(), &mut ledger, &mut rng);
        assert_eq!(result.unwrap_err(), SkipReason::OfflineLocked);
        assert_eq!(chamber.last_wall_clock_millis, Some(3_600_000));
        assert!(chamber.storage.is_empty());
    }

    #[test]
    fn test_offline_catchup_simulates_elapsed_time() {
        let mut fx = Fixture::new();
        fx.ranks.set(Ability::OfflinePersistence, 1);
        let engine = ChamberEngine::default();
        let owner = AccountId::new_random();
        let mut chamber = Chamber::new(piglin(), 0, 0);
        let mut ledger = RecordingLedger::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        // One hour away at the base 60s interval
        let flush = engine
            .trigger_offline_catchup(owner, &mut chamber, 3_600_000, &fx.host(), &mut ledger, &mut rng)
            .unwrap();
        assert_eq!(flush.occurrences, 60);
        assert_eq!(flush.leg, "offline");
        assert_eq!(chamber.stored_count(&ItemId::from("gold_nugget")), 60);
        assert_eq!(chamber.last_wall_clock_millis, Some(3_600_000));
        assert_eq!(ledger.totals(owner).lifetime_occurrences, Decimal::from(60));
    }

    #[test]
    fn test_condensation_requires_rank() {
        let mut fx = Fixture::new();
        fx.recipes = RecipeBook::new().with_pair("gold_nugget", "gold_ingot", 9);
        let engine = ChamberEngine::default();
        let owner = AccountId::new_random();
        let mut ledger = RecordingLedger::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let mut chamber = Chamber::new(piglin(), 0, 0);
        chamber.condensation = CondensationMode::Safe;
        let clock = TickClock { current_tick: 1200 * 10 };
        let flush = engine
            .schedule(owner, &mut chamber, &clock, &fx.host(), &mut ledger, &mut rng)
            .unwrap();
        assert!(!flush.condensed);
        assert_eq!(chamber.stored_count(&ItemId::from("gold_nugget")), 10);

        fx.ranks.set(Ability::LootCondensation, 1);
        let mut chamber = Chamber::new(piglin(), 0, 0);
        chamber.condensation = CondensationMode::Safe;
        let flush = engine
            .schedule(owner, &mut chamber, &clock, &fx.host(), &mut ledger, &mut rng)
            .unwrap();
        assert!(flush.condensed);
        assert_eq!(chamber.stored_count(&ItemId::from("gold_ingot")), 1);
        assert_eq!(chamber.stored_count(&ItemId::from("gold_nugget")), 1);
    }
}
