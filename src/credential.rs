//! Bearer token persistence.
//!
//! One slot per profile. The file-backed store survives process restarts;
//! the memory store is for tests and hosts that manage persistence themselves.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::StoreError;
use crate::types::Credential;

const TOKEN_FILE: &str = "token";

/// Distinguishes temp files of concurrent saves within one process.
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Persistent single-slot bearer token storage.
///
/// Tokens are opaque: no shape validation happens here. `clear` must be
/// safe to call when nothing is stored.
pub trait CredentialStore: Send + Sync {
    /// Replace the stored token.
    fn save(&self, token: &Credential) -> Result<(), StoreError>;

    /// The stored token, if any.
    fn load(&self) -> Result<Option<Credential>, StoreError>;

    /// Remove the stored token. Idempotent.
    fn clear(&self) -> Result<(), StoreError>;
}

/// Token kept in `<profile_dir>/token`.
///
/// # Example
///
/// ```no_run
/// use movieapp_client::{Credential, CredentialStore, FileCredentialStore};
///
/// let store = FileCredentialStore::new("/home/me/.config/movieapp");
/// store.save(&Credential::new("tok1"))?;
/// assert!(store.load()?.is_some());
/// store.clear()?;
/// # Ok::<(), movieapp_client::StoreError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    profile_dir: PathBuf,
}

impl FileCredentialStore {
    /// The directory is created lazily on the first `save`.
    #[must_use]
    pub fn new(profile_dir: impl Into<PathBuf>) -> Self {
        Self {
            profile_dir: profile_dir.into(),
        }
    }

    #[must_use]
    pub fn profile_dir(&self) -> &Path {
        &self.profile_dir
    }

    #[must_use]
    pub fn token_path(&self) -> PathBuf {
        self.profile_dir.join(TOKEN_FILE)
    }

    /// A fresh sibling of the token file, unique per process and save.
    fn temp_path(&self) -> PathBuf {
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        self.profile_dir
            .join(format!(".{TOKEN_FILE}.{}.{seq}.tmp", std::process::id()))
    }
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, token: &Credential) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.profile_dir)
            .map_err(|e| StoreError::io(&self.profile_dir, e))?;

        let temp = self.temp_path();
        let mut file = open_private(&temp).map_err(|e| StoreError::io(&temp, e))?;
        let written = file
            .write_all(token.expose().as_bytes())
            .and_then(|()| file.sync_all());
        drop(file);
        if let Err(e) = written {
            let _ = std::fs::remove_file(&temp);
            return Err(StoreError::io(&temp, e));
        }

        // rename replaces atomically, so a reader never sees a half-written token
        let path = self.token_path();
        if let Err(e) = std::fs::rename(&temp, &path) {
            let _ = std::fs::remove_file(&temp);
            return Err(StoreError::io(&path, e));
        }
        tracing::debug!(path = %path.display(), "Credential saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<Credential>, StoreError> {
        let path = self.token_path();
        match std::fs::read_to_string(&path) {
            Ok(raw) => {
                let token = raw.trim();
                Ok((!token.is_empty()).then(|| Credential::new(token)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    fn clear(&self) -> Result<(), StoreError> {
        let path = self.token_path();
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Credential cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::File::create(path)
}

/// In-process token slot. Clones share the slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    slot: Arc<Mutex<Option<Credential>>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `token`, as after an earlier login.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(Credential::new(token)))),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, token: &Credential) -> Result<(), StoreError> {
        *self.slot.lock() = Some(token.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<Credential>, StoreError> {
        Ok(self.slot.lock().clone())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.slot.lock().take();
        Ok(())
    }
}
