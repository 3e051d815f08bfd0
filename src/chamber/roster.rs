//! An account's chambers, held in the stable order they are scheduled in.

use super::types::Chamber;
use crate::core::error::ChamberError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Owning account, as seen by the host's ledgers and rank lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub Uuid);

impl AccountId {
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChamberRoster {
    pub owner: AccountId,
    pub chambers: Vec<Chamber>,
}

impl ChamberRoster {
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            chambers: Vec::new(),
        }
    }

    /// Add a newly captured chamber at the end of the schedule. Returns its index.
    pub fn capture(&mut self, chamber: Chamber) -> usize {
        self.chambers.push(chamber);
        self.chambers.len() - 1
    }

    /// Release (or sell) a chamber, handing it back to the caller.
    pub fn release(&mut self, index: usize) -> Result<Chamber, ChamberError> {
        if index >= self.chambers.len() {
            return Err(ChamberError::NoSuchChamber {
                index,
                len: self.chambers.len(),
            });
        }
        Ok(self.chambers.remove(index))
    }

    /// Destroy trailing chambers beyond `capacity`. Returns the removed ones.
    pub fn enforce_capacity(&mut self, capacity: usize) -> Vec<Chamber> {
        if self.chambers.len() <= capacity {
            return Vec::new();
        }
        self.chambers.split_off(capacity)
    }

    /// Stable copy for readers (UI) that must not observe a pass in progress.
    pub fn snapshot(&self) -> Vec<Chamber> {
        self.chambers.clone()
    }

    pub fn len(&self) -> usize {
        self.chambers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chambers.is_empty()
    }
}
