/// Data models for asset identities and persisted asset stats
use crate::delta::Category;
use crate::error::{IngestError, IngestResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Asset class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Native,
    #[serde(rename = "credit_alphanum4")]
    CreditAlphanum4,
    #[serde(rename = "credit_alphanum12")]
    CreditAlphanum12,
}

impl AssetType {
    /// Integer code used in the `asset_type` column
    pub fn as_i32(self) -> i32 {
        match self {
            AssetType::Native => 0,
            AssetType::CreditAlphanum4 => 1,
            AssetType::CreditAlphanum12 => 2,
        }
    }

    pub fn from_i32(value: i32) -> IngestResult<Self> {
        match value {
            0 => Ok(AssetType::Native),
            1 => Ok(AssetType::CreditAlphanum4),
            2 => Ok(AssetType::CreditAlphanum12),
            other => Err(IngestError::InvalidAsset(format!(
                "unknown asset type {}",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssetType::Native => "native",
            AssetType::CreditAlphanum4 => "credit_alphanum4",
            AssetType::CreditAlphanum12 => "credit_alphanum12",
        }
    }

    pub fn parse(value: &str) -> IngestResult<Self> {
        match value {
            "native" => Ok(AssetType::Native),
            "credit_alphanum4" => Ok(AssetType::CreditAlphanum4),
            "credit_alphanum12" => Ok(AssetType::CreditAlphanum12),
            other => Err(IngestError::InvalidAsset(format!(
                "unknown asset type {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Asset identity: one persisted row per key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetKey {
    pub asset_type: AssetType,
    pub asset_code: String,
    pub asset_issuer: String,
}

impl AssetKey {
    pub fn new(asset_type: AssetType, asset_code: &str, asset_issuer: &str) -> Self {
        Self {
            asset_type,
            asset_code: asset_code.to_string(),
            asset_issuer: asset_issuer.to_string(),
        }
    }

    /// Cursor used by list queries, `{code}_{issuer}_{type}`
    pub fn paging_token(&self) -> String {
        format!(
            "{}_{}_{}",
            self.asset_code, self.asset_issuer, self.asset_type
        )
    }

    /// Inverse of [`AssetKey::paging_token`]
    pub fn from_paging_token(token: &str) -> IngestResult<Self> {
        let mut parts = token.splitn(3, '_');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(code), Some(issuer), Some(asset_type)) => {
                Ok(Self::new(AssetType::parse(asset_type)?, code, issuer))
            }
            _ => Err(IngestError::InvalidAsset(format!(
                "invalid paging token {:?}",
                token
            ))),
        }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.asset_type {
            AssetType::Native => write!(f, "native"),
            asset_type => write!(
                f,
                "{}/{}/{}",
                asset_type, self.asset_code, self.asset_issuer
            ),
        }
    }
}

/// Number of accounts per category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetStatAccounts {
    pub authorized: i32,
    pub authorized_to_maintain_liabilities: i32,
    pub claimable_balances: i32,
    pub unauthorized: i32,
}

impl AssetStatAccounts {
    pub fn get(&self, category: Category) -> i32 {
        match category {
            Category::Authorized => self.authorized,
            Category::AuthorizedToMaintainLiabilities => self.authorized_to_maintain_liabilities,
            Category::Unauthorized => self.unauthorized,
            Category::ClaimableBalances => self.claimable_balances,
        }
    }

    pub fn add_to_category(&mut self, category: Category, count: i32) {
        match category {
            Category::Authorized => self.authorized += count,
            Category::AuthorizedToMaintainLiabilities => {
                self.authorized_to_maintain_liabilities += count
            }
            Category::Unauthorized => self.unauthorized += count,
            Category::ClaimableBalances => self.claimable_balances += count,
        }
    }

    pub fn add(&self, other: &AssetStatAccounts) -> AssetStatAccounts {
        AssetStatAccounts {
            authorized: self.authorized + other.authorized,
            authorized_to_maintain_liabilities: self.authorized_to_maintain_liabilities
                + other.authorized_to_maintain_liabilities,
            claimable_balances: self.claimable_balances + other.claimable_balances,
            unauthorized: self.unauthorized + other.unauthorized,
        }
    }

    pub fn is_zero(&self) -> bool {
        Category::ALL.iter().all(|c| self.get(*c) == 0)
    }

    /// First category holding a negative count
    pub fn negative_category(&self) -> Option<Category> {
        Category::ALL.into_iter().find(|c| self.get(*c) < 0)
    }
}

/// Balances per category as exact decimal text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetStatBalances {
    pub authorized: String,
    pub authorized_to_maintain_liabilities: String,
    pub claimable_balances: String,
    pub unauthorized: String,
}

impl Default for AssetStatBalances {
    fn default() -> Self {
        Self {
            authorized: "0".to_string(),
            authorized_to_maintain_liabilities: "0".to_string(),
            claimable_balances: "0".to_string(),
            unauthorized: "0".to_string(),
        }
    }
}

/// A row of the `exp_asset_stats` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetStat {
    pub asset_type: AssetType,
    pub asset_code: String,
    pub asset_issuer: String,
    pub accounts: AssetStatAccounts,
    pub balances: AssetStatBalances,
    /// Mirrors `balances.authorized`
    pub amount: String,
    /// Mirrors `accounts.authorized`
    pub num_accounts: i32,
}

impl AssetStat {
    /// Build a row, deriving `amount` and `num_accounts` from the authorized category
    pub fn new(key: &AssetKey, accounts: AssetStatAccounts, balances: AssetStatBalances) -> Self {
        Self {
            asset_type: key.asset_type,
            asset_code: key.asset_code.clone(),
            asset_issuer: key.asset_issuer.clone(),
            amount: balances.authorized.clone(),
            num_accounts: accounts.authorized,
            accounts,
            balances,
        }
    }

    pub fn key(&self) -> AssetKey {
        AssetKey::new(self.asset_type, &self.asset_code, &self.asset_issuer)
    }

    pub fn paging_token(&self) -> String {
        self.key().paging_token()
    }
}

/// Sort direction for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

/// Query parameters for listing asset stats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetStatQuery {
    /// Filter by asset code
    pub asset_code: Option<String>,

    /// Filter by asset issuer
    pub asset_issuer: Option<String>,

    /// Paging token of the last row already seen
    pub cursor: Option<String>,

    /// Sort direction
    pub order: Order,

    /// Maximum number of rows
    pub limit: i64,
}

impl AssetStatQuery {
    pub fn new() -> Self {
        Self {
            asset_code: None,
            asset_issuer: None,
            cursor: None,
            order: Order::Asc,
            limit: 10,
        }
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.asset_code = Some(code.to_string());
        self
    }

    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.asset_issuer = Some(issuer.to_string());
        self
    }

    pub fn with_page(mut self, cursor: Option<String>, order: Order, limit: i64) -> Self {
        self.cursor = cursor;
        self.order = order;
        self.limit = limit;
        self
    }

    /// Decoded cursor, if any
    pub fn cursor_key(&self) -> IngestResult<Option<AssetKey>> {
        self.cursor
            .as_deref()
            .map(AssetKey::from_paging_token)
            .transpose()
    }
}

impl Default for AssetStatQuery {
    fn default() -> Self {
        Self::new()
    }
}
