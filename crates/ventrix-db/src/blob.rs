//! # Blob Storage
//!
//! Image bytes live outside SQLite; rows only keep the URI returned by
//! [`BlobStore::store`].
//!
//! ```text
//! ┌───────────────────┐   store("producto/7.png", bytes)   ┌──────────────────────┐
//! │ LifecycleManager  │ ─────────────────────────────────► │ BlobStore            │
//! │                   │ ◄───────────────────────────────── │  FsBlobStore         │
//! │ productos.imagen  │   "/imagenes/producto/7.png"       │  MemoryBlobStore     │
//! └───────────────────┘                                    └──────────────────────┘
//! ```
//!
//! Keys are relative, `/`-separated paths. Deleting a missing key succeeds.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Where image bytes are written.
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug {
    /// Writes `bytes` under `key`, replacing any previous content, and
    /// returns the URI to persist on the entity.
    async fn store(&self, key: &str, bytes: &[u8]) -> DbResult<String>;

    /// Removes the blob under `key`.
    async fn delete(&self, key: &str) -> DbResult<()>;

    /// Recovers the key from a URI this store returned, `None` for URIs it
    /// doesn't own.
    fn key_from_uri(&self, uri: &str) -> Option<String>;
}

/// Key of a restaurant logo.
pub fn restaurante_key(id: &str, extension: &str) -> String {
    format!("restaurante/{}.{}", id, extension)
}

/// Key of a product image.
pub fn producto_key(id_producto: i64, extension: &str) -> String {
    format!("producto/{}.{}", id_producto, extension)
}

fn check_key(key: &str) -> DbResult<()> {
    let path = Path::new(key);
    let relative = !key.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if !relative {
        return Err(DbError::Blob(format!("invalid blob key: {}", key)));
    }
    Ok(())
}

// =============================================================================
// Filesystem
// =============================================================================

/// Stores blobs as files under a root directory.
///
/// URIs are `{base_uri}/{key}`, typically the path the web server exposes
/// the directory under.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    base_uri: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, base_uri: impl Into<String>) -> Self {
        FsBlobStore {
            root: root.into(),
            base_uri: base_uri.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &str) -> DbResult<PathBuf> {
        check_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn store(&self, key: &str, bytes: &[u8]) -> DbResult<String> {
        let path = self.path_of(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DbError::Blob(format!("{}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| DbError::Blob(format!("{}: {}", path.display(), e)))?;

        debug!(key = %key, size = bytes.len(), "Blob stored");
        Ok(format!("{}/{}", self.base_uri, key))
    }

    async fn delete(&self, key: &str) -> DbResult<()> {
        let path = self.path_of(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = %key, "Blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DbError::Blob(format!("{}: {}", path.display(), e))),
        }
    }

    fn key_from_uri(&self, uri: &str) -> Option<String> {
        uri.strip_prefix(&self.base_uri)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|key| check_key(key).is_ok())
            .map(str::to_string)
    }
}

// =============================================================================
// In-memory
// =============================================================================

const MEMORY_SCHEME: &str = "memory://";

/// Keeps blobs in a map. For tests and ephemeral setups.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.lock().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.blobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.lock().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn store(&self, key: &str, bytes: &[u8]) -> DbResult<String> {
        check_key(key)?;
        self.blobs
            .lock()
            .await
            .insert(key.to_string(), bytes.to_vec());
        Ok(format!("{}{}", MEMORY_SCHEME, key))
    }

    async fn delete(&self, key: &str) -> DbResult<()> {
        self.blobs.lock().await.remove(key);
        Ok(())
    }

    fn key_from_uri(&self, uri: &str) -> Option<String> {
        uri.strip_prefix(MEMORY_SCHEME).map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fs_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "/imagenes/");

        let uri = store.store("producto/7.png", b"\x89PNG").await.unwrap();
        assert_eq!(uri, "/imagenes/producto/7.png");
        assert_eq!(
            std::fs::read(dir.path().join("producto/7.png")).unwrap(),
            b"\x89PNG"
        );

        let key = store.key_from_uri(&uri).unwrap();
        assert_eq!(key, "producto/7.png");

        store.delete(&key).await.unwrap();
        assert!(!dir.path().join("producto/7.png").exists());

        // deleting again is fine
        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "/imagenes");

        assert!(store.store("../fuera.png", b"x").await.is_err());
        assert!(store.store("/etc/passwd", b"x").await.is_err());
        assert!(store.store("", b"x").await.is_err());
        assert_eq!(store.key_from_uri("/imagenes/../fuera.png"), None);
        assert_eq!(store.key_from_uri("https://cdn.example.com/a.png"), None);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryBlobStore::new();
        let uri = store.store(&restaurante_key("r1", "webp"), b"logo").await.unwrap();
        assert_eq!(uri, "memory://restaurante/r1.webp");
        assert_eq!(store.get("restaurante/r1.webp").await, Some(b"logo".to_vec()));

        let key = store.key_from_uri(&uri).unwrap();
        store.delete(&key).await.unwrap();
        assert!(store.is_empty().await);
    }
}
