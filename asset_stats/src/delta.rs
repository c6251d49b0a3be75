//! Signed per-category deltas computed from individual ledger changes.
//!
//! A present "pre" entry contributes `-1` account and `-balance` to its
//! category, a present "post" entry `+1` and `+balance`. An update is the sum
//! of both and may therefore move an account between categories when the
//! trust line's authorization changed.

use crate::error::{IngestError, IngestResult, StateError};
use crate::ledger::{
    ClaimableBalanceEntry, TrustLineEntry, TRUSTLINE_AUTHORIZED_FLAG,
    TRUSTLINE_AUTHORIZED_TO_MAINTAIN_LIABILITIES_FLAG,
};
use crate::models::{AssetKey, AssetStat, AssetStatAccounts, AssetStatBalances};
use num_bigint::BigInt;
use num_traits::Zero;
use std::fmt;

/// Bucket a balance or account is counted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Authorized,
    AuthorizedToMaintainLiabilities,
    Unauthorized,
    ClaimableBalances,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Authorized,
        Category::AuthorizedToMaintainLiabilities,
        Category::Unauthorized,
        Category::ClaimableBalances,
    ];

    /// Category of a trust line, matched on the whole flag word.
    ///
    /// Only the exact authorized and authorized-to-maintain-liabilities values
    /// count as such; any other combination (e.g. authorized with clawback
    /// enabled) is unauthorized.
    pub fn from_trustline_flags(flags: u32) -> Self {
        match flags {
            TRUSTLINE_AUTHORIZED_FLAG => Category::Authorized,
            TRUSTLINE_AUTHORIZED_TO_MAINTAIN_LIABILITIES_FLAG => {
                Category::AuthorizedToMaintainLiabilities
            }
            _ => Category::Unauthorized,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Authorized => "Authorized",
            Category::AuthorizedToMaintainLiabilities => "AuthorizedToMaintainLiabilities",
            Category::Unauthorized => "Unauthorized",
            Category::ClaimableBalances => "ClaimableBalances",
        };
        f.write_str(name)
    }
}

/// Unbounded-precision balances per category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Balances {
    pub authorized: BigInt,
    pub authorized_to_maintain_liabilities: BigInt,
    pub unauthorized: BigInt,
    pub claimable_balances: BigInt,
}

impl Balances {
    /// Parse the decimal text of a persisted row
    pub fn parse(balances: &AssetStatBalances) -> IngestResult<Self> {
        Ok(Self {
            authorized: parse_amount(&balances.authorized)?,
            authorized_to_maintain_liabilities: parse_amount(
                &balances.authorized_to_maintain_liabilities,
            )?,
            unauthorized: parse_amount(&balances.unauthorized)?,
            claimable_balances: parse_amount(&balances.claimable_balances)?,
        })
    }

    pub fn get(&self, category: Category) -> &BigInt {
        match category {
            Category::Authorized => &self.authorized,
            Category::AuthorizedToMaintainLiabilities => &self.authorized_to_maintain_liabilities,
            Category::Unauthorized => &self.unauthorized,
            Category::ClaimableBalances => &self.claimable_balances,
        }
    }

    fn get_mut(&mut self, category: Category) -> &mut BigInt {
        match category {
            Category::Authorized => &mut self.authorized,
            Category::AuthorizedToMaintainLiabilities => {
                &mut self.authorized_to_maintain_liabilities
            }
            Category::Unauthorized => &mut self.unauthorized,
            Category::ClaimableBalances => &mut self.claimable_balances,
        }
    }

    pub fn add_to_category(&mut self, category: Category, amount: &BigInt) {
        *self.get_mut(category) += amount;
    }

    pub fn add(&self, other: &Balances) -> Balances {
        Balances {
            authorized: &self.authorized + &other.authorized,
            authorized_to_maintain_liabilities: &self.authorized_to_maintain_liabilities
                + &other.authorized_to_maintain_liabilities,
            unauthorized: &self.unauthorized + &other.unauthorized,
            claimable_balances: &self.claimable_balances + &other.claimable_balances,
        }
    }

    pub fn is_zero(&self) -> bool {
        Category::ALL.iter().all(|c| self.get(*c).is_zero())
    }

    /// Decimal text form stored in the database
    pub fn to_persisted(&self) -> AssetStatBalances {
        AssetStatBalances {
            authorized: self.authorized.to_string(),
            authorized_to_maintain_liabilities: self.authorized_to_maintain_liabilities.to_string(),
            claimable_balances: self.claimable_balances.to_string(),
            unauthorized: self.unauthorized.to_string(),
        }
    }
}

fn parse_amount(text: &str) -> IngestResult<BigInt> {
    text.parse::<BigInt>()
        .map_err(|_| IngestError::InvalidBalance(text.to_string()))
}

/// Net effect of one or more changes on a single asset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatDelta {
    pub accounts: AssetStatAccounts,
    pub balances: Balances,
}

impl StatDelta {
    fn record(&mut self, category: Category, accounts: i32, amount: BigInt) {
        self.accounts.add_to_category(category, accounts);
        self.balances.add_to_category(category, &amount);
    }

    /// Subtract an entry that no longer exists in this form
    pub fn remove_entry(&mut self, category: Category, amount: i64) {
        self.record(category, -1, -BigInt::from(amount));
    }

    /// Add an entry that now exists in this form
    pub fn add_entry(&mut self, category: Category, amount: i64) {
        self.record(category, 1, BigInt::from(amount));
    }

    /// Fieldwise merge
    pub fn merge(&mut self, other: &StatDelta) {
        self.accounts = self.accounts.add(&other.accounts);
        self.balances = self.balances.add(&other.balances);
    }

    pub fn is_zero(&self) -> bool {
        self.accounts.is_zero() && self.balances.is_zero()
    }

    /// Delta of a trust line change
    pub fn for_trustline(
        pre: Option<&TrustLineEntry>,
        post: Option<&TrustLineEntry>,
    ) -> IngestResult<(AssetKey, StatDelta)> {
        let asset = match (pre, post) {
            (_, Some(post)) => &post.asset,
            (Some(pre), None) => &pre.asset,
            (None, None) => return Err(StateError::EmptyChange.into()),
        };

        let mut delta = StatDelta::default();
        if let Some(pre) = pre {
            delta.remove_entry(Category::from_trustline_flags(pre.flags), pre.balance);
        }
        if let Some(post) = post {
            delta.add_entry(Category::from_trustline_flags(post.flags), post.balance);
        }

        Ok((asset.key()?, delta))
    }

    /// Delta of a claimable balance change, `None` for the native asset
    pub fn for_claimable_balance(
        pre: Option<&ClaimableBalanceEntry>,
        post: Option<&ClaimableBalanceEntry>,
    ) -> IngestResult<Option<(AssetKey, StatDelta)>> {
        let asset = match (pre, post) {
            (_, Some(post)) => &post.asset,
            (Some(pre), None) => &pre.asset,
            (None, None) => return Err(StateError::EmptyChange.into()),
        };
        if asset.is_native() {
            return Ok(None);
        }

        let mut delta = StatDelta::default();
        if let Some(pre) = pre {
            delta.remove_entry(Category::ClaimableBalances, pre.amount);
        }
        if let Some(post) = post {
            delta.add_entry(Category::ClaimableBalances, post.amount);
        }

        Ok(Some((asset.key()?, delta)))
    }

    /// Persisted row holding exactly this delta
    pub fn to_asset_stat(&self, key: &AssetKey) -> AssetStat {
        AssetStat::new(key, self.accounts, self.balances.to_persisted())
    }
}
