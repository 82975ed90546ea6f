//! Auxiliary key-value state store
//!
//! Holds the handful of values that must survive restarts (today: the
//! vector store id). The local backend is a single JSON file of string
//! pairs, rewritten whole under a process-wide mutex.

use async_trait::async_trait;
use slated_core::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// Key under which the provisioned vector store id is persisted
pub const VECTOR_STORE_KEY: &str = "vectorStoreId";

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// JSON-file backed state store
pub struct LocalStateStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_map(&self) -> Result<BTreeMap<String, String>> {
        match fs::read(&self.path).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_map().await?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut map = self.read_map().await?;
        map.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        debug!("Writing state file: {}", self.path.display());
        fs::write(&self.path, serde_json::to_vec_pretty(&map)?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStateStore::new(dir.path().join("state.json"));
        assert_eq!(store.get(VECTOR_STORE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStateStore::new(dir.path().join("nested/state.json"));

        store.set(VECTOR_STORE_KEY, "vs_1").await.unwrap();
        store.set("other", "x").await.unwrap();

        assert_eq!(
            store.get(VECTOR_STORE_KEY).await.unwrap(),
            Some("vs_1".to_string())
        );

        // Overwrite keeps the other key intact
        store.set(VECTOR_STORE_KEY, "vs_2").await.unwrap();
        assert_eq!(
            store.get(VECTOR_STORE_KEY).await.unwrap(),
            Some("vs_2".to_string())
        );
        assert_eq!(store.get("other").await.unwrap(), Some("x".to_string()));
    }
}
