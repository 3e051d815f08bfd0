//! Transient aggregate of one flush's cross-entity effects.

use crate::chamber::{AccountId, Chamber};
use crate::core::config::EngineConfig;
use crate::host::{Ability, AccountLedger, RankProvider};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Accumulator {
    pub currency: Decimal,
    /// Experience-equivalent energy
    pub energy: Decimal,
    pub occurrences: Decimal,
    pub permanent_stats: BTreeMap<String, Decimal>,
    /// Raised satiety of the chamber's source
    pub satiety: Decimal,
}

/// What `Accumulator::apply` committed, for reporting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedDeltas {
    pub currency: Decimal,
    pub energy: Decimal,
    pub secondary_currency: Decimal,
    pub occurrences: Decimal,
    /// Satiety level of the source after the flush, when it changed
    pub satiety: Option<Decimal>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_currency(&mut self, amount: Decimal) {
        self.currency = saturating_add(self.currency, amount);
    }

    pub fn add_energy(&mut self, amount: Decimal) {
        self.energy = saturating_add(self.energy, amount);
    }

    pub fn add_occurrences(&mut self, amount: Decimal) {
        self.occurrences = saturating_add(self.occurrences, amount);
    }

    pub fn add_satiety(&mut self, amount: Decimal) {
        self.satiety = saturating_add(self.satiety, amount);
    }

    pub fn add_stat(&mut self, stat: &str, delta: Decimal) {
        let entry = self
            .permanent_stats
            .entry(stat.to_string())
            .or_insert(Decimal::ZERO);
        *entry = saturating_add(*entry, delta);
    }

    /// Commit every delta at once and bump the chamber version exactly once.
    /// Consumes the accumulator so a flush cannot be applied twice.
    pub fn apply(
        self,
        chamber: &mut Chamber,
        owner: AccountId,
        ledger: &mut dyn AccountLedger,
        ranks: &dyn RankProvider,
        config: &EngineConfig,
    ) -> AppliedDeltas {
        let mut applied = AppliedDeltas {
            energy: self.energy,
            ..Default::default()
        };

        if self.currency > Decimal::ZERO {
            ledger.credit_currency(owner, self.currency);
            applied.currency = self.currency;
        }

        chamber.pending_energy = saturating_add(chamber.pending_energy, self.energy.max(Decimal::ZERO));
        let conversion_rank = ranks.active_rank(owner, Ability::EnergyConversion);
        if conversion_rank > 0 {
            let cost = Decimal::from((config.energy_exchange_base / conversion_rank as u64).max(1));
            if chamber.pending_energy >= cost {
                let whole = (chamber.pending_energy / cost).floor();
                chamber.pending_energy %= cost;
                ledger.credit_secondary_currency(owner, whole);
                applied.secondary_currency = whole;
            }
        }

        for (stat, delta) in &self.permanent_stats {
            if !delta.is_zero() {
                ledger.credit_permanent_stat(owner, stat, *delta);
            }
        }

        if self.occurrences > Decimal::ZERO {
            ledger.credit_lifetime_occurrences(owner, self.occurrences);
            applied.occurrences = self.occurrences;
        }

        if self.satiety > Decimal::ZERO {
            let current = ledger.satiety(owner, &chamber.source);
            let level = saturating_add(current, self.satiety).min(config.max_satiety);
            if level != current {
                ledger.set_satiety(owner, &chamber.source, level);
                applied.satiety = Some(level);
            }
        }

        chamber.update_version = chamber.update_version.wrapping_add(1);
        applied
    }
}

pub(crate) fn saturating_add(a: Decimal, b: Decimal) -> Decimal {
    a.checked_add(b).unwrap_or(Decimal::MAX)
}

pub(crate) fn saturating_mul(a: Decimal, b: Decimal) -> Decimal {
    a.checked_mul(b).unwrap_or(Decimal::MAX)
}
