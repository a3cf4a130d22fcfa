use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::account::CredentialRecord;
use crate::errors::Result;

/// Trait for persisting per-account credential records
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load a record by account name
    async fn load(&self, account: &str) -> Option<CredentialRecord>;

    /// Save a record by account name
    async fn save(&self, account: &str, record: &CredentialRecord) -> Result<()>;

    /// Remove an account and its record
    async fn remove(&self, account: &str) -> Result<()>;

    /// List all stored account names
    async fn list_accounts(&self) -> Vec<String>;
}

/// In-memory credential store for testing and simple use cases
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    records: Arc<RwLock<HashMap<String, CredentialRecord>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self, account: &str) -> Option<CredentialRecord> {
        self.records.read().ok()?.get(account).cloned()
    }

    async fn save(&self, account: &str, record: &CredentialRecord) -> Result<()> {
        self.records
            .write()
            .map_err(|_| crate::errors::AuthError::InvalidState("lock poisoned".to_string()))?
            .insert(account.to_string(), record.clone());
        Ok(())
    }

    async fn remove(&self, account: &str) -> Result<()> {
        self.records
            .write()
            .map_err(|_| crate::errors::AuthError::InvalidState("lock poisoned".to_string()))?
            .remove(account);
        Ok(())
    }

    async fn list_accounts(&self) -> Vec<String> {
        self.records
            .read()
            .ok()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default()
    }
}
