//! Persistence layer for the charging tables
//!
//! Every table is a CSV document stored under a flat key in a blob store.
//! The store is a trait so the web service and the export service can run
//! against a data directory in production and an in-memory map in tests.

use crate::config::StorageConfig;
use crate::error::{ChargeLogError, Result};
use crate::logging::get_logger;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

pub mod tables;

pub use tables::{
    ChargingLogRecord, HomeTariffRow, Location, OpenSessionRow, PublicTariffRow, Table,
    VehicleRow, load_or_create, read_table, write_table,
};

/// Key/value store holding raw table bytes
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch a blob, `None` when the key does not exist
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a blob, replacing any previous content
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Build the store selected by the configuration
pub fn store_from_config(config: &StorageConfig) -> Result<Arc<dyn BlobStore>> {
    match config.backend.as_str() {
        "fs" => Ok(Arc::new(FsBlobStore::new(&config.root))),
        "memory" => Ok(Arc::new(MemoryBlobStore::new())),
        other => Err(ChargeLogError::config(format!(
            "unknown storage backend: {}",
            other
        ))),
    }
}

/// Keys are relative paths without parent references
fn check_key(key: &str) -> Result<&Path> {
    let path = Path::new(key);
    if key.is_empty() {
        return Err(ChargeLogError::storage("empty key"));
    }
    let clean = path
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !clean {
        return Err(ChargeLogError::storage(format!("rejected key: {}", key)));
    }
    Ok(path)
}

/// Blobs as files under a root directory
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        Ok(self.root.join(check_key(key)?))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ChargeLogError::storage(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Readers must never see a half-written table
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            ChargeLogError::storage(format!("failed to replace {}: {}", path.display(), e))
        })?;

        get_logger("persistence").debug(&format!("Wrote {} ({} bytes)", key, bytes.len()));
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}

/// Blobs in a process-local map
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        check_key(key)?;
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        check_key(key)?;
        self.blobs.write().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        Ok(self.blobs.read().await.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_validation() {
        assert!(check_key("charging_log.csv").is_ok());
        assert!(check_key("archive/2024.csv").is_ok());
        assert!(check_key("").is_err());
        assert!(check_key("/etc/passwd").is_err());
        assert!(check_key("../secrets.csv").is_err());
        assert!(check_key("a/../../b.csv").is_err());
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryBlobStore::new();
        assert!(store.get("config.csv").await.unwrap().is_none());
        assert!(!store.exists("config.csv").await.unwrap());

        store.put("config.csv", b"BatteryCapacity_kWh\n64\n".to_vec()).await.unwrap();
        assert!(store.exists("config.csv").await.unwrap());
        assert_eq!(
            store.get("config.csv").await.unwrap().unwrap(),
            b"BatteryCapacity_kWh\n64\n"
        );
    }

    #[tokio::test]
    async fn test_fs_store_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().join("data"));

        store.put("charging_log.csv", b"first".to_vec()).await.unwrap();
        store.put("charging_log.csv", b"second".to_vec()).await.unwrap();

        assert_eq!(store.get("charging_log.csv").await.unwrap().unwrap(), b"second");
        assert!(!dir.path().join("data/charging_log.csv.tmp").exists());
        assert!(store.get("missing.csv").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fs_store_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        let err = store.put("../outside.csv", Vec::new()).await.unwrap_err();
        assert!(matches!(err, ChargeLogError::Storage { .. }));
    }

    #[test]
    fn test_store_from_config() {
        let mut config = StorageConfig::default();
        config.backend = "memory".to_string();
        assert!(store_from_config(&config).is_ok());
        config.backend = "s3".to_string();
        assert!(store_from_config(&config).is_err());
    }
}
