//! Filesystem account store.
//!
//! # Directory Structure
//!
//! ```text
//! <root>/
//! └── accounts/
//!     ├── acme-v02.api.letsencrypt.org/
//!     │   └── directory/
//!     │       └── <account-id>.json
//!     └── acme-staging-v02.api.letsencrypt.org/
//!         └── directory/
//!             └── <account-id>.json
//! ```
//!
//! Every `*.json` file in the authority's directory is a candidate; the first
//! one that parses as an [`AccountRecord`] is the account. Which file is
//! "first" follows directory enumeration order and is not defined when more
//! than one file parses.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::AccountStore;
use crate::account::AccountRecord;
use crate::authority::{AuthorityEndpoint, CertificateAuthorityConfiguration};
use crate::error::StoreError;

/// Fixed directory under the storage root holding all authorities.
pub const ACCOUNTS_DIR: &str = "accounts";

/// Account store rooted at `<root>/accounts/<authority-host>/<authority-path>`.
#[derive(Debug, Clone)]
pub struct FileSystemAccountStore {
    account_dir: PathBuf,
}

impl FileSystemAccountStore {
    /// Create a store for `authority` under `root`.
    ///
    /// Creates the account directory (and parents) and restricts it to the
    /// owner on Unix.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory URL has no usable host or path, or
    /// if the directory cannot be created.
    pub fn new(
        root: impl AsRef<Path>,
        authority: &dyn CertificateAuthorityConfiguration,
    ) -> Result<Self, StoreError> {
        let account_dir = Self::account_dir_for(root.as_ref(), authority)?;

        std::fs::create_dir_all(&account_dir).map_err(StoreError::io(&account_dir))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&account_dir, std::fs::Permissions::from_mode(0o700))
                .map_err(StoreError::io(&account_dir))?;
        }

        debug!(
            path = %account_dir.display(),
            directory_url = %authority.directory_url(),
            "Initialized account store"
        );

        Ok(Self { account_dir })
    }

    /// Open the store for `authority` under `root` without touching the
    /// filesystem.
    ///
    /// A missing account directory reads as no account and is created by the
    /// first save.
    pub fn open(
        root: impl AsRef<Path>,
        authority: &dyn CertificateAuthorityConfiguration,
    ) -> Result<Self, StoreError> {
        let account_dir = Self::account_dir_for(root.as_ref(), authority)?;
        Ok(Self { account_dir })
    }

    /// Create a store rooted at the directory of the running executable.
    pub fn with_default_root(
        authority: &dyn CertificateAuthorityConfiguration,
    ) -> Result<Self, StoreError> {
        let root = Self::default_root()?;
        Self::new(root, authority)
    }

    /// Directory of the running executable.
    pub fn default_root() -> Result<PathBuf, StoreError> {
        let exe = std::env::current_exe()
            .map_err(StoreError::io(Path::new("<current executable>")))?;
        Ok(exe
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Account directory for `authority` under `root`, without touching the
    /// filesystem.
    pub fn account_dir_for(
        root: &Path,
        authority: &dyn CertificateAuthorityConfiguration,
    ) -> Result<PathBuf, StoreError> {
        let endpoint = AuthorityEndpoint::from_directory_url(authority.directory_url())?;
        Ok(root.join(ACCOUNTS_DIR).join(endpoint.relative_dir()))
    }

    /// Directory this store reads and writes.
    pub fn account_dir(&self) -> &Path {
        &self.account_dir
    }

    fn account_path(&self, account: &AccountRecord) -> PathBuf {
        self.account_dir.join(account.file_name())
    }

    /// Read one candidate file. Parse failures are `Ok(None)`; I/O failures
    /// are errors.
    async fn read_candidate(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<AccountRecord>, StoreError> {
        let content = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StoreError::Cancelled),
            read = fs::read(path) => read.map_err(StoreError::io(path))?,
        };

        match serde_json::from_slice::<AccountRecord>(&content) {
            Ok(account) => Ok(Some(account)),
            Err(e) => {
                trace!(
                    path = %path.display(),
                    error = %e,
                    "Skipping file that does not hold account information"
                );
                Ok(None)
            }
        }
    }
}

fn is_json_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("json")
}

/// Open `path` for a truncating write, owner-only on Unix before any byte is
/// written. An existing file keeps its inode but loses wider permissions.
async fn create_private_file(path: &Path) -> std::io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    options.mode(0o600);

    let file = options.open(path).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600)).await?;
    }

    Ok(file)
}

#[async_trait]
impl AccountStore for FileSystemAccountStore {
    async fn get_account(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<AccountRecord>, StoreError> {
        trace!(path = %self.account_dir.display(), "Looking for account information");

        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        let mut entries = match fs::read_dir(&self.account_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    path = %self.account_dir.display(),
                    "Account directory does not exist"
                );
                return Ok(None);
            }
            Err(e) => return Err(StoreError::io(&self.account_dir)(e)),
        };

        loop {
            let entry = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(StoreError::Cancelled),
                next = entries.next_entry() => next.map_err(StoreError::io(&self.account_dir))?,
            };
            let Some(entry) = entry else {
                break;
            };

            let path = entry.path();
            if !is_json_file(&path) {
                continue;
            }
            // Follows symlinks, unlike DirEntry::file_type.
            let metadata = match fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    trace!(path = %path.display(), "Skipping dangling or removed entry");
                    continue;
                }
                Err(e) => return Err(StoreError::io(&path)(e)),
            };
            if !metadata.is_file() {
                continue;
            }

            trace!(path = %path.display(), "Parsing file for account information");

            if let Some(account) = self.read_candidate(&path, cancel).await? {
                debug!(
                    path = %path.display(),
                    account_id = %account.id,
                    "Loaded account information"
                );
                return Ok(Some(account));
            }
        }

        debug!(
            path = %self.account_dir.display(),
            "Could not find account information"
        );
        Ok(None)
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

        fs::create_dir_all(&self.account_dir)
            .await
            .map_err(StoreError::io(&self.account_dir))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.account_dir, std::fs::Permissions::from_mode(0o700))
                .await
                .map_err(StoreError::io(&self.account_dir))?;
        }

        let path = self.account_path(account);
        trace!(path = %path.display(), "Saving account information");

        let content = serde_json::to_vec_pretty(account).map_err(|source| StoreError::Serialize {
            id: account.id.clone(),
            source,
        })?;

        let mut file = create_private_file(&path)
            .await
            .map_err(StoreError::io(&path))?;

        // Truncating write; a cancelled or failed write can leave a partial
        // file, already restricted to the owner.
        let write = async {
            file.write_all(&content).await?;
            file.flush().await
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StoreError::Cancelled),
            written = write => written.map_err(StoreError::io(&path))?,
        }

        debug!(
            path = %path.display(),
            account_id = %account.id,
            "Saved account information"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certward_config::{LETS_ENCRYPT_PRODUCTION, LETS_ENCRYPT_STAGING};
    use proptest::prelude::*;
    use tempfile::TempDir;
    use url::Url;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn setup_store(directory: &str) -> (TempDir, FileSystemAccountStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSystemAccountStore::new(temp_dir.path(), &url(directory)).unwrap();
        (temp_dir, store)
    }

    fn sample_account(id: &str) -> AccountRecord {
        AccountRecord::new(id)
            .with_email("admin@example.com")
            .with_account_url(format!("https://acme.example.test/acct/{id}"))
            .with_private_key(vec![0x30, 0x82, 0x01, 0x0a])
    }

    #[test]
    fn test_store_creates_authority_directory() {
        let (temp_dir, store) = setup_store(LETS_ENCRYPT_PRODUCTION);

        let expected = temp_dir
            .path()
            .join("accounts")
            .join("acme-v02.api.letsencrypt.org")
            .join("directory");
        assert_eq!(store.account_dir(), expected);
        assert!(expected.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_account_directory_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let (_temp_dir, store) = setup_store(LETS_ENCRYPT_PRODUCTION);

        let mode = std::fs::metadata(store.account_dir()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[tokio::test]
    async fn test_save_then_get_round_trip() {
        let (_temp_dir, store) = setup_store(LETS_ENCRYPT_STAGING);
        let cancel = CancellationToken::new();
        let account = sample_account("1001");

        store.save_account(&account, &cancel).await.unwrap();
        let loaded = store.get_account(&cancel).await.unwrap();

        assert_eq!(loaded, Some(account));
    }

    #[tokio::test]
    async fn test_file_uses_id_and_camel_case() {
        let (_temp_dir, store) = setup_store(LETS_ENCRYPT_STAGING);
        let cancel = CancellationToken::new();

        store.save_account(&sample_account("77"), &cancel).await.unwrap();

        let raw = std::fs::read_to_string(store.account_dir().join("77.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["id"], "77");
        assert!(json.get("emailAddresses").is_some());
        assert!(json.get("privateKey").is_some());
        assert!(json.get("email_addresses").is_none());
    }

    #[tokio::test]
    async fn test_saving_twice_overwrites() {
        let (_temp_dir, store) = setup_store(LETS_ENCRYPT_STAGING);
        let cancel = CancellationToken::new();

        let long = sample_account("5").with_email("a-much-longer-address@example.com");
        store.save_account(&long, &cancel).await.unwrap();
        let short = AccountRecord::new("5");
        store.save_account(&short, &cancel).await.unwrap();

        let files: Vec<_> = std::fs::read_dir(store.account_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(files.len(), 1);

        // Truncated, not overwritten in place.
        let loaded = store.get_account(&cancel).await.unwrap().unwrap();
        assert_eq!(loaded, short);
    }

    #[tokio::test]
    async fn test_get_on_empty_directory() {
        let (_temp_dir, store) = setup_store(LETS_ENCRYPT_PRODUCTION);
        let cancel = CancellationToken::new();

        assert!(store.get_account(&cancel).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_on_removed_directory() {
        let (_temp_dir, store) = setup_store(LETS_ENCRYPT_PRODUCTION);
        std::fs::remove_dir_all(store.account_dir()).unwrap();
        let cancel = CancellationToken::new();

        assert!(store.get_account(&cancel).await.unwrap().is_none());

        // Saving recreates it.
        store.save_account(&sample_account("9"), &cancel).await.unwrap();
        assert!(store.get_account(&cancel).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalid_json_is_skipped() {
        let (_temp_dir, store) = setup_store(LETS_ENCRYPT_PRODUCTION);
        let cancel = CancellationToken::new();

        std::fs::write(store.account_dir().join("aaa.json"), "{ not json").unwrap();
        std::fs::write(store.account_dir().join("zzz.json"), r#"{"unrelated": true}"#).unwrap();
        std::fs::write(store.account_dir().join("notes.txt"), "ignored").unwrap();
        store.save_account(&sample_account("42"), &cancel).await.unwrap();

        let loaded = store.get_account(&cancel).await.unwrap().unwrap();
        assert_eq!(loaded.id.as_str(), "42");
    }

    #[tokio::test]
    async fn test_only_invalid_files() {
        let (_temp_dir, store) = setup_store(LETS_ENCRYPT_PRODUCTION);
        let cancel = CancellationToken::new();

        std::fs::write(store.account_dir().join("broken.json"), "null").unwrap();
        std::fs::create_dir(store.account_dir().join("nested.json")).unwrap();

        assert!(store.get_account(&cancel).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_legacy_file_name_is_found() {
        let (_temp_dir, store) = setup_store(LETS_ENCRYPT_PRODUCTION);
        let cancel = CancellationToken::new();

        std::fs::write(
            store.account_dir().join("account.json"),
            r#"{"id": 314, "emailAddresses": ["ops@example.com"], "privateKey": "AQID"}"#,
        )
        .unwrap();

        let loaded = store.get_account(&cancel).await.unwrap().unwrap();
        assert_eq!(loaded.id.as_str(), "314");
        assert_eq!(loaded.private_key, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_staging_and_production_are_isolated() {
        let temp_dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let production =
            FileSystemAccountStore::new(temp_dir.path(), &url(LETS_ENCRYPT_PRODUCTION)).unwrap();
        let staging =
            FileSystemAccountStore::new(temp_dir.path(), &url(LETS_ENCRYPT_STAGING)).unwrap();

        assert_ne!(production.account_dir(), staging.account_dir());

        staging.save_account(&sample_account("staging-1"), &cancel).await.unwrap();
        assert!(production.get_account(&cancel).await.unwrap().is_none());

        production.save_account(&sample_account("prod-1"), &cancel).await.unwrap();
        assert_eq!(
            staging.get_account(&cancel).await.unwrap().unwrap().id.as_str(),
            "staging-1"
        );
        assert_eq!(
            production.get_account(&cancel).await.unwrap().unwrap().id.as_str(),
            "prod-1"
        );
    }

    #[tokio::test]
    async fn test_cancelled_operations() {
        let (_temp_dir, store) = setup_store(LETS_ENCRYPT_PRODUCTION);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(store.get_account(&cancel).await.unwrap_err().is_cancelled());
        assert!(store
            .save_account(&sample_account("1"), &cancel)
            .await
            .unwrap_err()
            .is_cancelled());
        assert!(!store.account_dir().join("1.json").exists());
    }

    fn cancel_soon(cancel: &CancellationToken) {
        let cancel = cancel.clone();
        tokio::spawn(async move { cancel.cancel() });
    }

    #[tokio::test]
    async fn test_scan_cancelled_after_start() {
        let (_temp_dir, store) = setup_store(LETS_ENCRYPT_PRODUCTION);
        for i in 0..64 {
            std::fs::write(store.account_dir().join(format!("junk{i}.json")), "{}").unwrap();
        }
        store
            .save_account(&sample_account("1"), &CancellationToken::new())
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        cancel_soon(&cancel);
        let result = store.get_account(&cancel).await;

        assert!(cancel.is_cancelled());
        assert!(matches!(result, Err(StoreError::Cancelled)));
    }

    #[tokio::test]
    async fn test_read_cancelled_after_start() {
        let (_temp_dir, store) = setup_store(LETS_ENCRYPT_PRODUCTION);
        store
            .save_account(&sample_account("1"), &CancellationToken::new())
            .await
            .unwrap();
        let path = store.account_dir().join("1.json");

        let cancel = CancellationToken::new();
        cancel_soon(&cancel);
        let result = store.read_candidate(&path, &cancel).await;

        assert!(matches!(result, Err(StoreError::Cancelled)));
    }

    #[tokio::test]
    async fn test_write_cancelled_after_start() {
        let (_temp_dir, store) = setup_store(LETS_ENCRYPT_PRODUCTION);
        let account = sample_account("1").with_private_key(vec![0x5a; 8 * 1024 * 1024]);

        let cancel = CancellationToken::new();
        cancel_soon(&cancel);
        let err = store.save_account(&account, &cancel).await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(store
            .get_account(&CancellationToken::new())
            .await
            .unwrap()
            .is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancelled_write_leaves_private_file() {
        use std::os::unix::fs::PermissionsExt;
        let (_temp_dir, store) = setup_store(LETS_ENCRYPT_PRODUCTION);
        let path = store.account_dir().join("1.json");
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let account = sample_account("1").with_private_key(vec![0x5a; 32 * 1024 * 1024]);
        let cancel = CancellationToken::new();
        cancel_soon(&cancel);
        let err = store.save_account(&account, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let (_temp_dir, store) = setup_store(LETS_ENCRYPT_PRODUCTION);
        let path = store.account_dir().join("7.json");
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        store
            .save_account(&sample_account("7"), &CancellationToken::new())
            .await
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_links_are_skipped() {
        let (temp_dir, store) = setup_store(LETS_ENCRYPT_PRODUCTION);
        let cancel = CancellationToken::new();

        for i in 0..20 {
            std::os::unix::fs::symlink(
                temp_dir.path().join(format!("missing{i}")),
                store.account_dir().join(format!("stale{i}.json")),
            )
            .unwrap();
        }
        store.save_account(&sample_account("1"), &cancel).await.unwrap();

        let loaded = store.get_account(&cancel).await.unwrap().unwrap();
        assert_eq!(loaded.id.as_str(), "1");
    }

    #[tokio::test]
    async fn test_open_does_not_create() {
        let temp_dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let store =
            FileSystemAccountStore::open(temp_dir.path(), &url(LETS_ENCRYPT_STAGING)).unwrap();

        assert!(!temp_dir.path().join(ACCOUNTS_DIR).exists());
        assert!(store.get_account(&cancel).await.unwrap().is_none());
        assert!(!temp_dir.path().join(ACCOUNTS_DIR).exists());

        store.save_account(&sample_account("3"), &cancel).await.unwrap();
        assert!(store.account_dir().is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(store.account_dir()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[tokio::test]
    async fn test_rejects_unsafe_id() {
        let (_temp_dir, store) = setup_store(LETS_ENCRYPT_PRODUCTION);
        let cancel = CancellationToken::new();

        let err = store
            .save_account(&AccountRecord::new("../escape"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidAccountId(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_candidate_is_an_error() {
        use std::os::unix::fs::PermissionsExt;
        let (_temp_dir, store) = setup_store(LETS_ENCRYPT_PRODUCTION);
        let cancel = CancellationToken::new();

        let path = store.account_dir().join("locked.json");
        std::fs::write(&path, r#"{"id":"1"}"#).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores file modes; nothing to assert there.
        if std::fs::read(&path).is_ok() {
            return;
        }
        let err = store.get_account(&cancel).await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn test_account_dir_for_does_not_create() {
        let temp_dir = TempDir::new().unwrap();
        let dir = FileSystemAccountStore::account_dir_for(
            temp_dir.path(),
            &url("https://localhost:14000/dir"),
        )
        .unwrap();

        assert_eq!(dir, temp_dir.path().join("accounts").join("localhost:14000").join("dir"));
        assert!(!dir.exists());
    }

    proptest! {
        #[test]
        fn prop_distinct_endpoints_get_distinct_dirs(
            host_a in "[a-z]{1,10}\\.test",
            host_b in "[a-z]{1,10}\\.test",
            path_a in proptest::collection::vec("[a-z0-9]{1,8}", 1..4),
            path_b in proptest::collection::vec("[a-z0-9]{1,8}", 1..4),
        ) {
            let root = Path::new("/srv/certward");
            let a = url(&format!("https://{}/{}", host_a, path_a.join("/")));
            let b = url(&format!("https://{}/{}", host_b, path_b.join("/")));

            let dir_a = FileSystemAccountStore::account_dir_for(root, &a).unwrap();
            let dir_b = FileSystemAccountStore::account_dir_for(root, &b).unwrap();

            prop_assert_eq!(a == b, dir_a == dir_b);
            prop_assert!(dir_a.starts_with(root.join(ACCOUNTS_DIR)));
        }
    }
}
