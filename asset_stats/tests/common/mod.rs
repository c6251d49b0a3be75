//! Shared helpers for integration tests

#![allow(dead_code)]

use asset_stats_ingest::{
    Asset, AssetKey, AssetStat, AssetStatLookup, AssetStatStore, ClaimableBalanceEntry,
    IngestError, IngestResult, LedgerEntry, LedgerEntryData, TrustLineEntry,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub const ISSUER: &str = "GISSUER";

#[derive(Debug, Default)]
struct Inner {
    rows: BTreeMap<AssetKey, AssetStat>,
    calls: usize,
    fail_on: Option<usize>,
}

/// Store keeping rows in memory. Clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<AssetStat>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.lock().unwrap();
            for row in rows {
                inner.rows.insert(row.key(), row);
            }
        }
        store
    }

    pub fn row(&self, key: &AssetKey) -> Option<AssetStat> {
        self.inner.lock().unwrap().rows.get(key).cloned()
    }

    pub fn rows(&self) -> Vec<AssetStat> {
        self.inner.lock().unwrap().rows.values().cloned().collect()
    }

    /// Number of store calls made so far
    pub fn calls(&self) -> usize {
        self.inner.lock().unwrap().calls
    }

    /// Make the next call fail with a connection error
    pub fn fail_next_call(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_on = Some(inner.calls + 1);
    }

    /// Make the `n`th call from now fail with a connection error
    pub fn fail_nth_call(&self, n: usize) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_on = Some(inner.calls + n);
    }

    fn begin(&self) -> IngestResult<std::sync::MutexGuard<'_, Inner>> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls += 1;
        if inner.fail_on == Some(inner.calls) {
            inner.fail_on = None;
            return Err(IngestError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(inner)
    }
}

#[async_trait]
impl AssetStatStore for MemoryStore {
    async fn get_asset_stat(&self, key: &AssetKey) -> IngestResult<AssetStatLookup> {
        let inner = self.begin()?;
        Ok(match inner.rows.get(key) {
            Some(row) => AssetStatLookup::Found(row.clone()),
            None => AssetStatLookup::NotFound,
        })
    }

    async fn insert_asset_stat(&self, stat: &AssetStat) -> IngestResult<u64> {
        let mut inner = self.begin()?;
        if inner.rows.contains_key(&stat.key()) {
            return Ok(0);
        }
        inner.rows.insert(stat.key(), stat.clone());
        Ok(1)
    }

    async fn update_asset_stat(&self, stat: &AssetStat) -> IngestResult<u64> {
        let mut inner = self.begin()?;
        match inner.rows.get_mut(&stat.key()) {
            Some(row) => {
                *row = stat.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn remove_asset_stat(&self, key: &AssetKey) -> IngestResult<u64> {
        let mut inner = self.begin()?;
        Ok(inner.rows.remove(key).map_or(0, |_| 1))
    }

    async fn insert_asset_stats(&self, stats: &[AssetStat], _batch_size: usize) -> IngestResult<u64> {
        let mut inner = self.begin()?;
        let mut inserted = 0;
        for stat in stats {
            if inner.rows.insert(stat.key(), stat.clone()).is_none() {
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

pub fn usd() -> Asset {
    Asset::credit("USD", ISSUER)
}

pub fn trustline(account: &str, asset: Asset, balance: i64, flags: u32) -> LedgerEntry {
    LedgerEntry::new(
        100,
        LedgerEntryData::Trustline(TrustLineEntry {
            account_id: account.to_string(),
            asset,
            balance,
            limit: i64::MAX,
            flags,
        }),
    )
}

pub fn claimable_balance(id: &str, asset: Asset, amount: i64) -> LedgerEntry {
    LedgerEntry::new(
        100,
        LedgerEntryData::ClaimableBalance(ClaimableBalanceEntry {
            balance_id: id.to_string(),
            asset,
            amount,
        }),
    )
}
