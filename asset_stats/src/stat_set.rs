//! In-memory accumulator of per-asset deltas for one processing cycle

use crate::delta::StatDelta;
use crate::error::IngestResult;
use crate::ledger::{ClaimableBalanceEntry, TrustLineEntry};
use crate::models::{AssetKey, AssetStat};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Collection of asset stat deltas keyed by asset identity.
///
/// An asset is present only while at least one of its account counts or
/// balances is non-zero.
#[derive(Debug, Default, Clone)]
pub struct AssetStatSet {
    stats: HashMap<AssetKey, StatDelta>,
}

impl AssetStatSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate a trust line change
    pub fn add_trustline(
        &mut self,
        pre: Option<&TrustLineEntry>,
        post: Option<&TrustLineEntry>,
    ) -> IngestResult<()> {
        let (key, delta) = StatDelta::for_trustline(pre, post)?;
        self.add_delta(key, &delta);
        Ok(())
    }

    /// Accumulate a claimable balance change. Native claimable balances are ignored.
    pub fn add_claimable_balance(
        &mut self,
        pre: Option<&ClaimableBalanceEntry>,
        post: Option<&ClaimableBalanceEntry>,
    ) -> IngestResult<()> {
        if let Some((key, delta)) = StatDelta::for_claimable_balance(pre, post)? {
            self.add_delta(key, &delta);
        }
        Ok(())
    }

    /// Merge a delta into the entry for `key`.
    ///
    /// Counts and amounts may legitimately disagree in sign after a merge
    /// (e.g. an issuer minting leaves accounts at zero and amount positive);
    /// the entry is only dropped once all of them are zero.
    pub fn add_delta(&mut self, key: AssetKey, delta: &StatDelta) {
        if delta.is_zero() {
            return;
        }

        match self.stats.entry(key) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().merge(delta);
                if occupied.get().is_zero() {
                    occupied.remove();
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(delta.clone());
            }
        }
    }

    pub fn get(&self, key: &AssetKey) -> Option<&StatDelta> {
        self.stats.get(key)
    }

    /// Take an asset out of the set as a row
    pub fn remove(&mut self, key: &AssetKey) -> Option<AssetStat> {
        self.stats
            .remove(key)
            .map(|delta| delta.to_asset_stat(key))
    }

    /// All accumulated assets as rows, ordered by asset identity
    pub fn all(&self) -> Vec<AssetStat> {
        self.deltas()
            .into_iter()
            .map(|(key, delta)| delta.to_asset_stat(key))
            .collect()
    }

    /// All accumulated deltas, ordered by asset identity
    pub fn deltas(&self) -> Vec<(&AssetKey, &StatDelta)> {
        let mut deltas: Vec<_> = self.stats.iter().collect();
        deltas.sort_by(|a, b| a.0.cmp(b.0));
        deltas
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    pub fn clear(&mut self) {
        self.stats.clear();
    }
}
