//! Certward ACME account persistence
//!
//! Stores the account a client registered with a certificate authority so it
//! can be reused across restarts. Accounts are partitioned by the authority's
//! directory URL: an account created against a staging directory never
//! shadows or overwrites the production one.
//!
//! # Components
//!
//! - [`AccountRecord`] - the persisted account
//! - [`AccountStore`] - get/save contract shared by all backends
//! - [`FileSystemAccountStore`] - JSON files under
//!   `<root>/accounts/<authority-host>/<authority-path>/`
//! - [`MemoryAccountStore`] - process-local backend
//! - [`CertificateAuthorityConfiguration`] - source of the directory URL
//!
//! # Example
//!
//! ```no_run
//! use certward_acme::{AccountRecord, AccountStore, FileSystemAccountStore};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = Url::parse("https://acme-staging-v02.api.letsencrypt.org/directory")?;
//! let store = FileSystemAccountStore::new("/var/lib/certward", &directory)?;
//! let cancel = CancellationToken::new();
//!
//! if store.get_account(&cancel).await?.is_none() {
//!     let account = AccountRecord::new("1234").with_email("admin@example.com");
//!     store.save_account(&account, &cancel).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod authority;
pub mod error;
pub mod store;

pub use account::AccountRecord;
pub use authority::{AuthorityEndpoint, CertificateAuthorityConfiguration};
pub use error::StoreError;
pub use store::{AccountStore, FileSystemAccountStore, MemoryAccountStore, ACCOUNTS_DIR};
