//! In-memory account store.
//!
//! Holds accounts for the lifetime of the process only. Useful for tests and
//! for hosts that persist credentials elsewhere.

use std::collections::BTreeMap;

use async_trait::async_trait;
use certward_common::AccountId;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::AccountStore;
use crate::account::AccountRecord;
use crate::error::StoreError;

/// Account store backed by a map keyed by account id.
///
/// `get_account` returns the account with the lowest id.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<BTreeMap<AccountId, AccountRecord>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn get_account(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<AccountRecord>, StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        Ok(self.accounts.read().values().next().cloned())
    }

    async fn save_account(
        &self,
        account: &AccountRecord,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        account.id.check_file_safe()?;
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        self.accounts
            .write()
            .insert(account.id.clone(), account.clone());
        debug!(account_id = %account.id, "Saved account information in memory");
        Ok(())
    }
}
