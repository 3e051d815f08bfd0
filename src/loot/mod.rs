//! What happens to rewards after they are rolled: filtering and liquidation,
//! the storage cap, and recipe condensation.

pub mod capper;
pub mod condensation;
pub mod filter;

pub use capper::{enforce_cap, sort_by_identity};
pub use condensation::{condense, CondensationCache, CondensationRecipe};
pub use filter::{process_lines, LootContext, LootTally};
