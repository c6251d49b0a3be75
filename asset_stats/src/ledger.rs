//! Decoded ledger entries and the change records fed to the processor.
//!
//! Only trust lines and claimable balances are modelled field by field; every
//! other entry kind is carried as [`OtherEntry`] so that feeds containing the
//! full range of ledger entry kinds can be passed through unchanged.

use crate::error::{IngestError, IngestResult, StateError};
use crate::models::{AssetKey, AssetType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trust line flag: the holder is authorized to transact
pub const TRUSTLINE_AUTHORIZED_FLAG: u32 = 0x1;
/// Trust line flag: the holder may only maintain offers and liabilities
pub const TRUSTLINE_AUTHORIZED_TO_MAINTAIN_LIABILITIES_FLAG: u32 = 0x2;
/// Trust line flag: the issuer may claw the balance back
pub const TRUSTLINE_CLAWBACK_ENABLED_FLAG: u32 = 0x4;

const MAX_ALPHANUM4_CODE: usize = 4;
const MAX_ALPHANUM12_CODE: usize = 12;

/// Ledger entry kinds appearing in the change feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LedgerEntryType {
    Account,
    Trustline,
    Offer,
    Data,
    ClaimableBalance,
    LiquidityPool,
}

impl fmt::Display for LedgerEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LedgerEntryType::Account => "LedgerEntryTypeAccount",
            LedgerEntryType::Trustline => "LedgerEntryTypeTrustline",
            LedgerEntryType::Offer => "LedgerEntryTypeOffer",
            LedgerEntryType::Data => "LedgerEntryTypeData",
            LedgerEntryType::ClaimableBalance => "LedgerEntryTypeClaimableBalance",
            LedgerEntryType::LiquidityPool => "LedgerEntryTypeLiquidityPool",
        };
        f.write_str(name)
    }
}

/// An asset as it appears inside ledger entries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    Native,
    CreditAlphanum4 { code: String, issuer: String },
    CreditAlphanum12 { code: String, issuer: String },
}

impl Asset {
    pub fn credit(code: &str, issuer: &str) -> Self {
        if code.len() <= MAX_ALPHANUM4_CODE {
            Asset::CreditAlphanum4 {
                code: code.to_string(),
                issuer: issuer.to_string(),
            }
        } else {
            Asset::CreditAlphanum12 {
                code: code.to_string(),
                issuer: issuer.to_string(),
            }
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native)
    }

    /// Extract the asset identity, validating the code for its class.
    ///
    /// Codes are stored NUL-padded on the ledger, so trailing NULs are
    /// stripped before validation.
    pub fn key(&self) -> IngestResult<AssetKey> {
        match self {
            Asset::Native => Ok(AssetKey::new(AssetType::Native, "", "")),
            Asset::CreditAlphanum4 { code, issuer } => {
                let code = validate_code(code, 1, MAX_ALPHANUM4_CODE)?;
                validate_issuer(issuer)?;
                Ok(AssetKey::new(AssetType::CreditAlphanum4, code, issuer))
            }
            Asset::CreditAlphanum12 { code, issuer } => {
                let code = validate_code(code, MAX_ALPHANUM4_CODE + 1, MAX_ALPHANUM12_CODE)?;
                validate_issuer(issuer)?;
                Ok(AssetKey::new(AssetType::CreditAlphanum12, code, issuer))
            }
        }
    }
}

fn validate_code(code: &str, min: usize, max: usize) -> IngestResult<&str> {
    let trimmed = code.trim_end_matches('\0');
    if trimmed.len() < min || trimmed.len() > max {
        return Err(IngestError::InvalidAsset(format!(
            "asset code {:?} must be {}-{} characters",
            trimmed, min, max
        )));
    }
    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(IngestError::InvalidAsset(format!(
            "asset code {:?} must be ASCII alphanumeric",
            trimmed
        )));
    }
    Ok(trimmed)
}

fn validate_issuer(issuer: &str) -> IngestResult<()> {
    if issuer.is_empty() {
        return Err(IngestError::InvalidAsset(
            "credit asset is missing an issuer".to_string(),
        ));
    }
    Ok(())
}

/// Trust line entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLineEntry {
    pub account_id: String,
    pub asset: Asset,
    pub balance: i64,
    pub limit: i64,
    pub flags: u32,
}

/// Claimable balance entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimableBalanceEntry {
    pub balance_id: String,
    pub asset: Asset,
    pub amount: i64,
}

/// Any entry kind the engine does not aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherEntry {
    pub entry_type: LedgerEntryType,
    /// Opaque identifier, unique within `entry_type`
    pub id: String,
}

/// Closed set of entry payloads the engine dispatches on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEntryData {
    Trustline(TrustLineEntry),
    ClaimableBalance(ClaimableBalanceEntry),
    Other(OtherEntry),
}

impl LedgerEntryData {
    pub fn entry_type(&self) -> LedgerEntryType {
        match self {
            LedgerEntryData::Trustline(_) => LedgerEntryType::Trustline,
            LedgerEntryData::ClaimableBalance(_) => LedgerEntryType::ClaimableBalance,
            LedgerEntryData::Other(other) => other.entry_type,
        }
    }
}

/// A ledger entry snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub last_modified_ledger_seq: u32,
    pub data: LedgerEntryData,
}

impl LedgerEntry {
    pub fn new(last_modified_ledger_seq: u32, data: LedgerEntryData) -> Self {
        Self {
            last_modified_ledger_seq,
            data,
        }
    }

    /// Key uniquely identifying the entry on the ledger
    pub fn key(&self) -> LedgerKey {
        match &self.data {
            LedgerEntryData::Trustline(tl) => LedgerKey::Trustline {
                account_id: tl.account_id.clone(),
                asset: tl.asset.clone(),
            },
            LedgerEntryData::ClaimableBalance(cb) => LedgerKey::ClaimableBalance {
                balance_id: cb.balance_id.clone(),
            },
            LedgerEntryData::Other(other) => LedgerKey::Other {
                entry_type: other.entry_type,
                id: other.id.clone(),
            },
        }
    }
}

/// Identity of a ledger entry, independent of its contents
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LedgerKey {
    Trustline { account_id: String, asset: Asset },
    ClaimableBalance { balance_id: String },
    Other { entry_type: LedgerEntryType, id: String },
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerKey::Trustline { account_id, asset } => match asset.key() {
                Ok(key) => write!(f, "trustline {}/{}", account_id, key),
                Err(_) => write!(f, "trustline {}/{:?}", account_id, asset),
            },
            LedgerKey::ClaimableBalance { balance_id } => {
                write!(f, "claimable balance {}", balance_id)
            }
            LedgerKey::Other { entry_type, id } => write!(f, "{} {}", entry_type, id),
        }
    }
}

/// Net classification of a change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Removed,
}

/// A single ledger entry change: the entry before and after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub entry_type: LedgerEntryType,
    pub pre: Option<LedgerEntry>,
    pub post: Option<LedgerEntry>,
}

impl Change {
    pub fn created(post: LedgerEntry) -> Self {
        Self {
            entry_type: post.data.entry_type(),
            pre: None,
            post: Some(post),
        }
    }

    pub fn updated(pre: LedgerEntry, post: LedgerEntry) -> Self {
        Self {
            entry_type: post.data.entry_type(),
            pre: Some(pre),
            post: Some(post),
        }
    }

    pub fn removed(pre: LedgerEntry) -> Self {
        Self {
            entry_type: pre.data.entry_type(),
            pre: Some(pre),
            post: None,
        }
    }

    /// Classify the change. Both sides missing is a contract violation.
    pub fn kind(&self) -> IngestResult<ChangeKind> {
        match (&self.pre, &self.post) {
            (None, Some(_)) => Ok(ChangeKind::Created),
            (Some(_), Some(_)) => Ok(ChangeKind::Updated),
            (Some(_), None) => Ok(ChangeKind::Removed),
            (None, None) => Err(StateError::EmptyChange.into()),
        }
    }

    /// Key of the changed entry
    pub fn ledger_key(&self) -> IngestResult<LedgerKey> {
        self.post
            .as_ref()
            .or(self.pre.as_ref())
            .map(LedgerEntry::key)
            .ok_or_else(|| StateError::EmptyChange.into())
    }

    /// Both sides as trust lines, checking they match the declared type
    pub fn trustlines(&self) -> IngestResult<(Option<&TrustLineEntry>, Option<&TrustLineEntry>)> {
        Ok((
            as_trustline(self.pre.as_ref())?,
            as_trustline(self.post.as_ref())?,
        ))
    }

    /// Both sides as claimable balances, checking they match the declared type
    pub fn claimable_balances(
        &self,
    ) -> IngestResult<(Option<&ClaimableBalanceEntry>, Option<&ClaimableBalanceEntry>)> {
        Ok((
            as_claimable_balance(self.pre.as_ref())?,
            as_claimable_balance(self.post.as_ref())?,
        ))
    }
}

fn as_trustline(entry: Option<&LedgerEntry>) -> IngestResult<Option<&TrustLineEntry>> {
    match entry.map(|e| &e.data) {
        None => Ok(None),
        Some(LedgerEntryData::Trustline(tl)) => Ok(Some(tl)),
        Some(other) => Err(StateError::EntryTypeMismatch {
            expected: LedgerEntryType::Trustline,
            actual: other.entry_type(),
        }
        .into()),
    }
}

fn as_claimable_balance(
    entry: Option<&LedgerEntry>,
) -> IngestResult<Option<&ClaimableBalanceEntry>> {
    match entry.map(|e| &e.data) {
        None => Ok(None),
        Some(LedgerEntryData::ClaimableBalance(cb)) => Ok(Some(cb)),
        Some(other) => Err(StateError::EntryTypeMismatch {
            expected: LedgerEntryType::ClaimableBalance,
            actual: other.entry_type(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn trustline(balance: i64) -> LedgerEntry {
        LedgerEntry::new(
            10,
            LedgerEntryData::Trustline(TrustLineEntry {
                account_id: "GHOLDER".to_string(),
                asset: Asset::credit("USD", "GISSUER"),
                balance,
                limit: i64::MAX,
                flags: TRUSTLINE_AUTHORIZED_FLAG,
            }),
        )
    }

    #[test]
    fn test_asset_key_extraction() {
        let key = Asset::credit("USD", "GISSUER").key().unwrap();
        assert_eq!(key.asset_type, AssetType::CreditAlphanum4);
        assert_eq!(key.asset_code, "USD");

        let key = Asset::credit("LONGCODE", "GISSUER").key().unwrap();
        assert_eq!(key.asset_type, AssetType::CreditAlphanum12);

        let native = Asset::Native.key().unwrap();
        assert_eq!(native.asset_type, AssetType::Native);
        assert!(native.asset_code.is_empty());
        assert!(native.asset_issuer.is_empty());
    }

    #[test]
    fn test_asset_key_strips_padding() {
        let asset = Asset::CreditAlphanum4 {
            code: "EUR\0".to_string(),
            issuer: "GISSUER".to_string(),
        };
        assert_eq!(asset.key().unwrap().asset_code, "EUR");
    }

    #[test]
    fn test_asset_key_rejects_invalid_codes() {
        let too_long = Asset::CreditAlphanum4 {
            code: "TOOLONG".to_string(),
            issuer: "GISSUER".to_string(),
        };
        assert_matches!(too_long.key(), Err(IngestError::InvalidAsset(_)));

        let too_short = Asset::CreditAlphanum12 {
            code: "ABC".to_string(),
            issuer: "GISSUER".to_string(),
        };
        assert_matches!(too_short.key(), Err(IngestError::InvalidAsset(_)));

        let no_issuer = Asset::CreditAlphanum4 {
            code: "USD".to_string(),
            issuer: String::new(),
        };
        assert_matches!(no_issuer.key(), Err(IngestError::InvalidAsset(_)));

        let symbols = Asset::credit("U$D", "GISSUER");
        assert_matches!(symbols.key(), Err(IngestError::InvalidAsset(_)));
    }

    #[test]
    fn test_change_kind() {
        assert_eq!(Change::created(trustline(1)).kind().unwrap(), ChangeKind::Created);
        assert_eq!(
            Change::updated(trustline(1), trustline(2)).kind().unwrap(),
            ChangeKind::Updated
        );
        assert_eq!(Change::removed(trustline(1)).kind().unwrap(), ChangeKind::Removed);

        let empty = Change {
            entry_type: LedgerEntryType::Trustline,
            pre: None,
            post: None,
        };
        assert_matches!(empty.kind(), Err(IngestError::State(StateError::EmptyChange)));
        assert_matches!(
            empty.ledger_key(),
            Err(IngestError::State(StateError::EmptyChange))
        );
    }

    #[test]
    fn test_ledger_key_ignores_contents() {
        assert_eq!(trustline(1).key(), trustline(500).key());
    }

    #[test]
    fn test_trustlines_type_mismatch() {
        let change = Change::created(trustline(5));
        let (pre, post) = change.trustlines().unwrap();
        assert!(pre.is_none());
        assert_eq!(post.unwrap().balance, 5);

        assert_matches!(
            change.claimable_balances(),
            Err(IngestError::State(StateError::EntryTypeMismatch {
                expected: LedgerEntryType::ClaimableBalance,
                actual: LedgerEntryType::Trustline,
            }))
        );
    }
}
