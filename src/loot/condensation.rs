//! Recipe-based compaction of stored loot (nuggets into ingots, ingots into blocks).
//!
//! Recipe discovery goes through the host catalog, which can be slow, so every
//! answer is cached per identity, including "no recipe". The cache belongs to
//! the engine instance and is invalidated explicitly when the catalog changes.

use crate::chamber::{merge_into, CondensationMode, ItemId, ItemStack};
use crate::host::RecipeCatalog;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CondensationRecipe {
    pub result: ItemId,
    pub input_count: u32,
    pub output_count: u32,
    /// The result crafts back into exactly `input_count` of the input
    pub reversible: bool,
}

#[derive(Debug, Default)]
pub struct CondensationCache {
    recipes: RwLock<HashMap<ItemId, Option<CondensationRecipe>>>,
}

impl CondensationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached recipe for `input`, asking the catalog on first sight only.
    pub fn lookup(&self, input: &ItemId, catalog: &dyn RecipeCatalog) -> Option<CondensationRecipe> {
        if let Some(entry) = self.recipes.read().get(input) {
            return entry.clone();
        }
        let discovered = discover(input, catalog);
        if discovered.is_none() {
            tracing::trace!(item = %input, "no condensation recipe");
        }
        self.recipes
            .write()
            .entry(input.clone())
            .or_insert(discovered)
            .clone()
    }

    /// Resolve recipes ahead of time so flushes only hit the cache.
    pub fn prime<'a>(&self, inputs: impl IntoIterator<Item = &'a ItemId>, catalog: &dyn RecipeCatalog) {
        for input in inputs {
            self.lookup(input, catalog);
        }
    }

    pub fn invalidate(&self, input: &ItemId) {
        self.recipes.write().remove(input);
    }

    pub fn clear(&self) {
        self.recipes.write().clear();
    }

    pub fn contains(&self, input: &ItemId) -> bool {
        self.recipes.read().contains_key(input)
    }

    /// Cached identities, hits and misses alike.
    pub fn len(&self) -> usize {
        self.recipes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.read().is_empty()
    }
}

fn discover(input: &ItemId, catalog: &dyn RecipeCatalog) -> Option<CondensationRecipe> {
    let uniform = catalog.find_uniform_recipe(input)?;
    // Must strictly shrink the stack, otherwise repeated passes never settle.
    if uniform.input_count < 2 || uniform.output_count == 0 || uniform.output_count >= uniform.input_count {
        return None;
    }
    let reversible = catalog
        .find_inverse(&uniform.result)
        .is_some_and(|inv| inv.result == *input && inv.count == uniform.input_count);
    Some(CondensationRecipe {
        result: uniform.result,
        input_count: uniform.input_count,
        output_count: uniform.output_count,
        reversible,
    })
}

/// Condense untagged stacks until a pass produces nothing. Returns whether
/// storage changed.
///
/// Every accepted recipe strictly shrinks the total count, so the loop
/// terminates and a second call is always a no-op.
pub fn condense(
    storage: &mut Vec<ItemStack>,
    mode: CondensationMode,
    cache: &CondensationCache,
    catalog: &dyn RecipeCatalog,
) -> bool {
    if mode == CondensationMode::Off {
        return false;
    }

    let mut changed = false;
    loop {
        let mut produced: Vec<ItemStack> = Vec::new();

        for stack in storage.iter_mut() {
            if stack.data.is_some() {
                continue;
            }
            let Some(recipe) = cache.lookup(&stack.id, catalog) else {
                continue;
            };
            if mode == CondensationMode::Safe && !recipe.reversible {
                continue;
            }
            let input = recipe.input_count as u64;
            let groups = stack.count / input;
            if groups == 0 {
                continue;
            }
            stack.count %= input;
            produced.push(ItemStack::new(
                recipe.result.clone(),
                groups.saturating_mul(recipe.output_count as u64),
            ));
        }

        if produced.is_empty() {
            break;
        }
        changed = true;
        storage.retain(|s| !s.is_empty());
        for stack in produced {
            merge_into(storage, stack);
        }
    }
    changed
}
