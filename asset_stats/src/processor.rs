use crate::compactor::ChangeCompactor;
use crate::config::{IngestConfig, ProcessingMode};
use crate::delta::{Balances, StatDelta};
use crate::error::{IngestError, IngestResult, StateError, StoreOperation};
use crate::ledger::{Change, LedgerEntryType};
use crate::models::{AssetKey, AssetStat};
use crate::repository::{AssetStatLookup, AssetStatStore};
use crate::stat_set::AssetStatSet;
use tracing::{debug, error, info};

/// Lifecycle of a processing cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    /// Accepting changes
    Idle,
    /// A state error was hit; nothing is accepted until `reinitialize`
    Halted,
}

/// Rows written by a successful commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub inserted: u64,
    pub updated: u64,
    pub removed: u64,
}

impl CommitSummary {
    pub fn total(&self) -> u64 {
        self.inserted + self.updated + self.removed
    }
}

enum Reconciled {
    Inserted,
    Updated,
    Removed,
}

/// Folds trust line and claimable balance changes into per-asset stats and
/// writes them to the store.
pub struct AssetStatsProcessor<S> {
    store: S,
    config: IngestConfig,
    compactor: ChangeCompactor,
    stats: AssetStatSet,
    state: CycleState,
}

impl<S: AssetStatStore> AssetStatsProcessor<S> {
    /// Create a processor over `store`
    pub fn new(store: S, config: IngestConfig) -> IngestResult<Self> {
        config.validate()?;

        Ok(Self {
            store,
            config,
            compactor: ChangeCompactor::new(),
            stats: AssetStatSet::new(),
            state: CycleState::Idle,
        })
    }

    pub fn mode(&self) -> ProcessingMode {
        self.config.mode
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Distinct ledger entries waiting in the cache
    pub fn pending_changes(&self) -> usize {
        self.compactor.size()
    }

    /// Deltas accumulated in the current cycle
    pub fn accumulated(&self) -> &AssetStatSet {
        &self.stats
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Drop all in-memory state and accept changes again
    pub fn reinitialize(&mut self) {
        self.reset();
        self.state = CycleState::Idle;
    }

    /// Feed one ledger entry change.
    ///
    /// Only trust lines and claimable balances are considered. In incremental
    /// mode the processor commits on its own once the cache holds more than
    /// `max_batch_size` distinct entries.
    pub async fn process_change(&mut self, change: Change) -> IngestResult<()> {
        self.ensure_idle()?;

        if !matches!(
            change.entry_type,
            LedgerEntryType::Trustline | LedgerEntryType::ClaimableBalance
        ) {
            return Ok(());
        }

        match self.config.mode {
            ProcessingMode::Incremental => {
                if let Err(e) = self.compactor.add_change(change) {
                    return Err(self.halt_on_state_error(e));
                }

                if self.compactor.size() > self.config.max_batch_size {
                    info!(
                        "Change cache holds {} entries (limit {}), flushing",
                        self.compactor.size(),
                        self.config.max_batch_size
                    );
                    self.commit().await?;
                }
                Ok(())
            }
            ProcessingMode::Bulk => {
                if let Err(e) = change.kind() {
                    return Err(self.halt_on_state_error(e));
                }
                if change.pre.is_some() || change.post.is_none() {
                    return Err(IngestError::InsertOnlyViolation);
                }

                if let Err(e) = accumulate(&mut self.stats, &change) {
                    return Err(self.halt_on_state_error(e));
                }
                Ok(())
            }
        }
    }

    /// Write everything gathered in this cycle to the store.
    ///
    /// Each asset leaves the accumulator as soon as its row is written. On
    /// success the processor starts a fresh cycle. A state error halts the
    /// processor with the unwritten deltas kept for inspection. Any other
    /// error leaves the unwritten deltas in place, so calling `commit` again
    /// picks up at the asset that failed.
    pub async fn commit(&mut self) -> IngestResult<CommitSummary> {
        self.ensure_idle()?;

        let summary = match self.config.mode {
            ProcessingMode::Bulk => self.commit_bulk().await?,
            ProcessingMode::Incremental => self.commit_incremental().await?,
        };

        info!(
            "Committed asset stats: {} inserted, {} updated, {} removed",
            summary.inserted, summary.updated, summary.removed
        );

        self.reset();
        Ok(summary)
    }

    async fn commit_bulk(&mut self) -> IngestResult<CommitSummary> {
        let rows = self.stats.all();
        if rows.is_empty() {
            return Ok(CommitSummary::default());
        }

        let inserted = self
            .store
            .insert_asset_stats(&rows, self.config.bulk_insert_batch_size)
            .await?;

        Ok(CommitSummary {
            inserted,
            ..CommitSummary::default()
        })
    }

    async fn commit_incremental(&mut self) -> IngestResult<CommitSummary> {
        // Drained changes cannot be replayed, so a failure here is terminal.
        for change in self.compactor.drain_changes() {
            if let Err(e) = accumulate(&mut self.stats, &change) {
                error!("Failed to accumulate change {:?}: {}", change.ledger_key(), e);
                self.state = CycleState::Halted;
                return Err(e);
            }
        }

        let mut summary = CommitSummary::default();

        let keys: Vec<AssetKey> = self
            .stats
            .deltas()
            .into_iter()
            .map(|(key, _)| key.clone())
            .collect();

        for key in keys {
            let outcome = match self.stats.get(&key) {
                Some(delta) => reconcile(&self.store, &key, delta).await,
                None => continue,
            };

            match outcome {
                Ok(Reconciled::Inserted) => summary.inserted += 1,
                Ok(Reconciled::Updated) => summary.updated += 1,
                Ok(Reconciled::Removed) => summary.removed += 1,
                Err(e) if e.is_state_error() => {
                    error!("Asset stats diverged from ledger for {}: {}", key, e);
                    self.state = CycleState::Halted;
                    return Err(e);
                }
                Err(e) => {
                    error!("Failed to reconcile asset stat for {}: {}", key, e);
                    return Err(e);
                }
            }

            // persisted; a later commit in this cycle must skip it
            self.stats.remove(&key);
        }

        Ok(summary)
    }

    fn ensure_idle(&self) -> IngestResult<()> {
        match self.state {
            CycleState::Idle => Ok(()),
            CycleState::Halted => Err(IngestError::ProcessorHalted),
        }
    }

    fn halt_on_state_error(&mut self, e: IngestError) -> IngestError {
        if e.is_state_error() {
            error!("Asset stats processor halted: {}", e);
            self.state = CycleState::Halted;
        }
        e
    }

    fn reset(&mut self) {
        self.compactor = ChangeCompactor::new();
        self.stats = AssetStatSet::new();
    }
}

/// Fold one change into the accumulator
fn accumulate(stats: &mut AssetStatSet, change: &Change) -> IngestResult<()> {
    match change.entry_type {
        LedgerEntryType::Trustline => {
            let (pre, post) = change.trustlines()?;
            stats.add_trustline(pre, post)
        }
        LedgerEntryType::ClaimableBalance => {
            let (pre, post) = change.claimable_balances()?;
            stats.add_claimable_balance(pre, post)
        }
        other => Err(StateError::UnexpectedEntryType(other).into()),
    }
}

/// Merge one accumulated delta into the persisted row
async fn reconcile<S: AssetStatStore>(
    store: &S,
    key: &AssetKey,
    delta: &StatDelta,
) -> IngestResult<Reconciled> {
    match store.get_asset_stat(key).await? {
        AssetStatLookup::NotFound => {
            if let Some(category) = delta.accounts.negative_category() {
                return Err(StateError::NegativeAccounts {
                    asset: key.clone(),
                    category,
                }
                .into());
            }

            debug!("Inserting asset stat for {}", key);
            let rows = store.insert_asset_stat(&delta.to_asset_stat(key)).await?;
            expect_one_row(rows, StoreOperation::Insert, key)?;
            Ok(Reconciled::Inserted)
        }
        AssetStatLookup::Found(row) => {
            let balances = Balances::parse(&row.balances)?.add(&delta.balances);
            let accounts = row.accounts.add(&delta.accounts);

            if accounts.is_zero() {
                if !balances.is_zero() {
                    return Err(StateError::NonZeroBalance { asset: key.clone() }.into());
                }

                debug!("Removing asset stat for {}", key);
                let rows = store.remove_asset_stat(key).await?;
                expect_one_row(rows, StoreOperation::Remove, key)?;
                Ok(Reconciled::Removed)
            } else {
                debug!("Updating asset stat for {}", key);
                let updated = AssetStat::new(key, accounts, balances.to_persisted());
                let rows = store.update_asset_stat(&updated).await?;
                expect_one_row(rows, StoreOperation::Update, key)?;
                Ok(Reconciled::Updated)
            }
        }
    }
}

fn expect_one_row(rows: u64, operation: StoreOperation, key: &AssetKey) -> IngestResult<()> {
    if rows != 1 {
        return Err(StateError::RowsAffected {
            rows,
            operation,
            asset: key.clone(),
        }
        .into());
    }
    Ok(())
}
