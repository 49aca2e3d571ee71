//! Account store implementations.

mod filesystem;
mod memory;

pub use filesystem::{FileSystemAccountStore, ACCOUNTS_DIR};
pub use memory::MemoryAccountStore;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::account::AccountRecord;
use crate::error::StoreError;

/// Persistence for the account of one certificate authority.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Load the stored account, if any.
    ///
    /// A missing account is `Ok(None)`. Cancellation yields
    /// [`StoreError::Cancelled`].
    async fn get_account(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<AccountRecord>, StoreError>;

    /// Store `account`, replacing any stored account with the same id.
    async fn save_account(
        &self,
        account: &AccountRecord,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError>;
}
