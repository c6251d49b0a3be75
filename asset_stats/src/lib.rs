pub mod compactor;
pub mod config;
pub mod delta;
pub mod error;
pub mod ledger;
pub mod models;
pub mod processor;
pub mod repository;
pub mod stat_set;

pub use compactor::ChangeCompactor;
pub use config::*;
pub use delta::{Balances, Category, StatDelta};
pub use error::{IngestError, IngestResult, StateError, StoreOperation};
pub use ledger::{
    Asset, Change, ChangeKind, ClaimableBalanceEntry, LedgerEntry, LedgerEntryData,
    LedgerEntryType, LedgerKey, OtherEntry, TrustLineEntry,
};
pub use models::{
    AssetKey, AssetStat, AssetStatAccounts, AssetStatBalances, AssetStatQuery, AssetType, Order,
};
pub use processor::{AssetStatsProcessor, CommitSummary, CycleState};
pub use repository::{AssetStatLookup, AssetStatStore, PgAssetStatRepository};
pub use stat_set::AssetStatSet;

pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
