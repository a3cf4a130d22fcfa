use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::error;

use crate::account::CredentialRecord;
use crate::errors::{AuthError, Result};
use crate::store::CredentialStore;

/// Per-account credential store on disk.
///
/// One directory per account name holding a single serialized record, so a
/// user can inspect or delete accounts with ordinary file tools:
///
/// ```text
/// ~/.config/jx-launcher/accounts/
/// ├── Zezima/
/// │   └── credentials.json
/// └── AltAccount/
///     └── credentials.json
/// ```
#[derive(Debug)]
pub struct FileCredentialStore {
    root: PathBuf,
}

const RECORD_FILE: &str = "credentials.json";

impl FileCredentialStore {
    /// Open (and create if needed) a store rooted at the given directory.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            std::fs::set_permissions(&root, perms)?;
        }

        Ok(Self { root })
    }

    /// Default store root for the current platform
    pub fn default_root() -> Result<PathBuf> {
        let project_dirs = directories::ProjectDirs::from("", "", "jx-launcher").ok_or_else(
            || AuthError::InvalidState("could not determine config directory".to_string()),
        )?;
        Ok(project_dirs.config_dir().join("accounts"))
    }

    fn record_path(&self, account: &str) -> PathBuf {
        self.root.join(account).join(RECORD_FILE)
    }

    async fn load_from_disk(&self, account: &str) -> Result<Option<CredentialRecord>> {
        let path = self.record_path(account);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        let record: CredentialRecord = serde_json::from_str(&content)
            .map_err(|e| AuthError::Decode(format!("stored credential record: {}", e)))?;
        Ok(Some(record))
    }

    async fn save_to_disk(&self, account: &str, record: &CredentialRecord) -> Result<()> {
        let path = self.record_path(account);
        fs::create_dir_all(self.root.join(account)).await?;

        let json = serde_json::to_string_pretty(record)?;

        // Atomic write: temp file in the same directory, then rename.
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, json).await?;
        fs::rename(&temp_path, &path).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self, account: &str) -> Option<CredentialRecord> {
        match self.load_from_disk(account).await {
            Ok(record) => record,
            Err(e) => {
                error!("Failed to load credentials for {}: {}", account, e);
                None
            }
        }
    }

    async fn save(&self, account: &str, record: &CredentialRecord) -> Result<()> {
        self.save_to_disk(account, record).await
    }

    async fn remove(&self, account: &str) -> Result<()> {
        let dir = self.root.join(account);
        if dir.exists() {
            fs::remove_dir_all(&dir).await?;
        }
        Ok(())
    }

    async fn list_accounts(&self) -> Vec<String> {
        let mut accounts = Vec::new();

        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                error!("Failed to read accounts directory: {}", e);
                return accounts;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.is_dir() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    accounts.push(name.to_string());
                }
            }
        }

        accounts.sort();
        accounts
    }
}
