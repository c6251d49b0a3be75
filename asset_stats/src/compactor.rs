//! Coalescing of ledger entry changes.
//!
//! [`ChangeCompactor`] keeps one net change per ledger entry. When several
//! changes touch the same entry within a batch they collapse into the minimal
//! diff between the first "pre" and the last "post":
//!
//! - Created + Updated = Created (with final value)
//! - Created + Removed = no change (entry never existed before the batch)
//! - Updated + Updated = Updated (original pre, final post)
//! - Updated + Removed = Removed (original pre)
//! - Removed + Created = Updated (original pre, new post)
//!
//! Every other sequence means the feed is out of order and is rejected.

use crate::error::{IngestError, IngestResult};
use crate::ledger::{Change, ChangeKind, LedgerKey};
use std::collections::HashMap;

/// Working set of net changes keyed by ledger entry
#[derive(Debug, Default)]
pub struct ChangeCompactor {
    /// Net change per entry
    changes: HashMap<LedgerKey, Change>,

    /// Keys in the order they were first seen. May hold keys whose change
    /// was cancelled, or repeats of a key seen again after a cancel; both are
    /// skipped on drain.
    order: Vec<LedgerKey>,
}

impl ChangeCompactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a change into the working set
    pub fn add_change(&mut self, change: Change) -> IngestResult<()> {
        let incoming = change.kind()?;
        let key = change.ledger_key()?;

        let Some(existing) = self.changes.get_mut(&key) else {
            self.order.push(key.clone());
            self.changes.insert(key, change);
            return Ok(());
        };

        match (existing.kind()?, incoming) {
            (ChangeKind::Created, ChangeKind::Updated) => {
                existing.post = change.post;
            }
            (ChangeKind::Created, ChangeKind::Removed) => {
                self.changes.remove(&key);
            }
            (ChangeKind::Updated, ChangeKind::Updated)
            | (ChangeKind::Updated, ChangeKind::Removed)
            | (ChangeKind::Removed, ChangeKind::Created) => {
                existing.post = change.post;
            }
            (previous, incoming) => {
                return Err(IngestError::InvalidChangeSequence {
                    key: key.to_string(),
                    reason: format!("{:?} cannot follow {:?}", incoming, previous),
                });
            }
        }

        Ok(())
    }

    /// Number of distinct entries in the working set
    pub fn size(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Net changes in first-seen order. Leaves the working set empty.
    pub fn drain_changes(&mut self) -> Vec<Change> {
        let mut changes = std::mem::take(&mut self.changes);
        std::mem::take(&mut self.order)
            .into_iter()
            .filter_map(|key| changes.remove(&key))
            .collect()
    }
}
