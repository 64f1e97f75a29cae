//! Durable credential storage.
//!
//! The lifecycle manager loads credentials before every connection attempt
//! and persists every update before processing the next transport event.
//! A persist always replaces the whole set.

use async_trait::async_trait;
use gate_types::Credentials;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// File name of the credential set inside the data directory.
pub const CREDENTIALS_FILE: &str = "creds.json";

/// Credential store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be decoded.
    #[error("corrupt credentials: {0}")]
    Corrupt(String),

    /// Injected failure (memory store).
    #[error("persist failed: {0}")]
    Injected(String),
}

/// Durable storage for the session's credential set.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the stored set, or [`Credentials::empty()`] if nothing is stored.
    async fn load(&self) -> Result<Credentials, StoreError>;

    /// Durably replace the stored set. Completes only once the write is
    /// durable.
    async fn persist(&self, credentials: &Credentials) -> Result<(), StoreError>;

    /// Erase the stored set.
    async fn reset(&self) -> Result<(), StoreError>;
}

/// Credentials in a JSON file under a private data directory.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    /// Store credentials in `dir`, creating it on first persist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The data directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the credentials file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Credentials, StoreError> {
        let contents = match tokio::fs::read(self.path()).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Credentials::empty())
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&contents).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    async fn persist(&self, credentials: &Credentials) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        set_dir_permissions_0700(&self.dir).await?;

        let contents = serde_json::to_vec_pretty(credentials)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        // Write-then-rename so readers never see a partial file
        let target = self.path();
        let tmp = self.dir.join(format!("{}.tmp", CREDENTIALS_FILE));
        {
            let mut file = tokio::fs::File::create(&tmp).await?;
            set_file_permissions_0600(&tmp).await?;
            file.write_all(&contents).await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&tmp, &target).await?;
        sync_dir(&self.dir).await?;

        tracing::debug!(
            path = %target.display(),
            revision = credentials.revision,
            "credentials persisted"
        );
        Ok(())
    }

    async fn reset(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path()).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        sync_dir(&self.dir).await?;
        tracing::info!(path = %self.path().display(), "credentials erased");
        Ok(())
    }
}

/// Make a rename durable by syncing its directory. No-op on non-Unix.
async fn sync_dir(dir: &Path) -> Result<(), StoreError> {
    #[cfg(unix)]
    {
        tokio::fs::File::open(dir).await?.sync_all().await?;
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
    }
    Ok(())
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> Result<(), StoreError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Set directory permissions to 0700 (owner only) on Unix.
/// No-op on non-Unix platforms.
async fn set_dir_permissions_0700(path: &Path) -> Result<(), StoreError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700)).await?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// In-memory store for tests.
///
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    credentials: Credentials,
    persist_count: usize,
    fail_next_persist: Option<String>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-loaded with `credentials`.
    pub fn with_credentials(credentials: Credentials) -> Self {
        let store = Self::new();
        store.lock().credentials = credentials;
        store
    }

    /// Snapshot of the stored set.
    pub fn snapshot(&self) -> Credentials {
        self.lock().credentials.clone()
    }

    /// Number of successful persists.
    pub fn persist_count(&self) -> usize {
        self.lock().persist_count
    }

    /// Cause the next persist() to fail with the given error.
    pub fn fail_next_persist(&self, error: &str) {
        self.lock().fail_next_persist = Some(error.to_string());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Credentials, StoreError> {
        Ok(self.snapshot())
    }

    async fn persist(&self, credentials: &Credentials) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_persist.take() {
            return Err(StoreError::Injected(error));
        }
        inner.credentials = credentials.clone();
        inner.persist_count += 1;
        Ok(())
    }

    async fn reset(&self) -> Result<(), StoreError> {
        self.lock().credentials = Credentials::empty();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_types::Jid;
    use tempfile::tempdir;

    fn registered() -> Credentials {
        Credentials::new(
            Jid::parse("15550001111@s.whatsapp.net"),
            vec![0x42u8; 32],
        )
        .with_revision(3)
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("auth_info"));

        let loaded = store.load().await.unwrap();
        assert!(loaded.is_empty());
        assert!(!loaded.is_registered());
    }

    #[tokio::test]
    async fn persist_then_load_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("auth_info"));

        store.persist(&registered()).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, registered());
        assert_eq!(loaded.revision, 3);
        assert!(!store.dir().join("creds.json.tmp").exists());
    }

    #[tokio::test]
    async fn persisting_twice_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());

        store.persist(&registered()).await.unwrap();
        store.persist(&registered()).await.unwrap();

        assert_eq!(store.load().await.unwrap(), registered());
    }

    #[tokio::test]
    async fn persist_replaces_whole_set() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());

        store.persist(&registered()).await.unwrap();
        let replacement = Credentials::new(None, vec![1]).with_revision(4);
        store.persist(&replacement).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, replacement);
        assert!(loaded.me.is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        tokio::fs::write(store.path(), b"{not json").await.unwrap();

        let result = store.load().await;
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }

    #[tokio::test]
    async fn reset_erases_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        store.persist(&registered()).await.unwrap();

        store.reset().await.unwrap();
        store.reset().await.unwrap();

        assert!(store.load().await.unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn credentials_file_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("auth_info"));
        store.persist(&registered()).await.unwrap();

        let perms = tokio::fs::metadata(store.path()).await.unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o600, "file should be 0600");

        let perms = tokio::fs::metadata(store.dir()).await.unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o700, "dir should be 0700");
    }

    #[tokio::test]
    async fn memory_store_injected_failure() {
        let store = MemoryCredentialStore::new();
        store.fail_next_persist("disk full");

        let result = store.persist(&registered()).await;
        assert!(matches!(result, Err(StoreError::Injected(_))));
        assert!(store.load().await.unwrap().is_empty());

        store.persist(&registered()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), registered());
        assert_eq!(store.persist_count(), 1);
    }

    #[tokio::test]
    async fn memory_store_clone_shares_state() {
        let store = MemoryCredentialStore::new();
        let other = store.clone();
        store.persist(&registered()).await.unwrap();

        assert_eq!(other.snapshot(), registered());
        other.reset().await.unwrap();
        assert!(store.snapshot().is_empty());
    }
}
