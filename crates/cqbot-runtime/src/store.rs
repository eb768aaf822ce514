//! Per-bot JSON document store.
//!
//! Each bot owns one document at `<data dir>/<bot name>.json`. The document
//! is a JSON object kept in memory; every mutation writes the whole file
//! back before returning.
//!
//! Mutations are async and write with `tokio::fs`, so a handler that saves
//! state does not block a runtime worker. Writes are serialized in mutation
//! order; reads only take the in-memory lock and never wait for the disk.
//!
//! ```rust,ignore
//! let count = bot.store().update(|doc| {
//!     let next = doc.get("count").and_then(Value::as_u64).unwrap_or(0) + 1;
//!     doc.insert("count".into(), next.into());
//!     next
//! }).await?;
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::{StoreError, StoreResult};

pub type Document = Map<String, Value>;

/// A bot's persistent document.
#[derive(Debug)]
pub struct DocumentStore {
    path: PathBuf,
    document: Mutex<Document>,
    /// Held from mutation to rename so files land in mutation order.
    writing: tokio::sync::Mutex<()>,
}

impl DocumentStore {
    /// Opens `<dir>/<name>.json`, creating `dir` if missing.
    ///
    /// A missing file opens as an empty document; nothing is written until
    /// the first mutation.
    pub fn open(dir: impl AsRef<Path>, name: &str) -> StoreResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

        let path = dir.join(format!("{name}.json"));
        let document = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes)? {
                Value::Object(map) => map,
                _ => return Err(StoreError::NotAnObject(path)),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Document::new(),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        debug!(path = %path.display(), keys = document.len(), "Opened document store");

        Ok(Self {
            path,
            document: Mutex::new(document),
            writing: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A copy of the whole document.
    pub fn read(&self) -> Document {
        self.document.lock().clone()
    }

    /// Fills in top-level keys that are missing, then writes.
    ///
    /// Existing keys are never overwritten.
    pub async fn defaults(&self, defaults: Value) -> StoreResult<()> {
        let Value::Object(defaults) = defaults else {
            return Err(StoreError::NotAnObject(self.path.clone()));
        };
        self.update(|doc| {
            for (key, value) in defaults {
                doc.entry(key).or_insert(value);
            }
        })
        .await
    }

    /// Deserializes one key. `Ok(None)` if it is absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let value = self.document.lock().get(key).cloned();
        value
            .map(serde_json::from_value)
            .transpose()
            .map_err(StoreError::from)
    }

    /// Sets one key and writes.
    pub async fn set<T: Serialize + Send>(&self, key: &str, value: T) -> StoreResult<()> {
        let value = serde_json::to_value(value)?;
        self.update(|doc| {
            doc.insert(key.to_string(), value);
        })
        .await
    }

    /// Mutates the document under the lock and writes it.
    ///
    /// The in-memory document keeps the change even if the write fails.
    pub async fn update<R>(&self, f: impl FnOnce(&mut Document) -> R) -> StoreResult<R> {
        let _writing = self.writing.lock().await;
        let (result, bytes) = {
            let mut document = self.document.lock();
            let result = f(&mut document);
            (result, serde_json::to_vec_pretty(&*document))
        };
        self.write(bytes?).await?;
        Ok(result)
    }

    /// Writes through a sibling temp file so readers never see a torn file.
    async fn write(&self, bytes: Vec<u8>) -> StoreResult<()> {
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        trace!(path = %self.path.display(), "Wrote document store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_open_creates_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("nested").join("data");
        let store = DocumentStore::open(&dir, "echo").unwrap();
        assert!(dir.is_dir());
        assert_eq!(store.path(), dir.join("echo.json"));
        assert!(store.read().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_set_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path(), "counter").unwrap();
        store.set("count", 3).await.unwrap();

        let on_disk: Value =
            serde_json::from_slice(&fs::read(dir.path().join("counter.json")).unwrap()).unwrap();
        assert_eq!(on_disk, json!({"count": 3}));

        let reopened = DocumentStore::open(dir.path(), "counter").unwrap();
        assert_eq!(reopened.get::<u32>("count").unwrap(), Some(3));
        assert_eq!(reopened.get::<u32>("missing").unwrap(), None);
    }

    #[tokio::test]
    async fn test_defaults_never_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path(), "bot").unwrap();
        store.set("greeting", "hey").await.unwrap();

        store
            .defaults(json!({"greeting": "hello", "admins": [1, 2]}))
            .await
            .unwrap();
        assert_eq!(
            Value::Object(store.read()),
            json!({"greeting": "hey", "admins": [1, 2]})
        );

        assert!(matches!(
            store.defaults(json!([1])).await,
            Err(StoreError::NotAnObject(_))
        ));
    }

    #[tokio::test]
    async fn test_update_returns_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path(), "bot").unwrap();
        let next = store
            .update(|doc| {
                let n = doc.get("n").and_then(Value::as_u64).unwrap_or(0) + 1;
                doc.insert("n".into(), n.into());
                n
            })
            .await
            .unwrap();
        assert_eq!(next, 1);
        assert_eq!(store.get::<u64>("n").unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_wrong_type_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path(), "bot").unwrap();
        store.set("name", "echo").await.unwrap();
        assert!(matches!(store.get::<u32>("name"), Err(StoreError::Json(_))));
    }

    #[tokio::test]
    async fn test_concurrent_updates_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(DocumentStore::open(dir.path(), "bot").unwrap());
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let store = std::sync::Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .update(|doc| {
                            let n = doc.get("n").and_then(Value::as_u64).unwrap_or(0) + 1;
                            doc.insert("n".into(), n.into());
                        })
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let reopened = DocumentStore::open(dir.path(), "bot").unwrap();
        assert_eq!(reopened.get::<u64>("n").unwrap(), Some(16));
    }

    #[test]
    fn test_non_object_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.json"), "[1, 2, 3]").unwrap();
        assert!(matches!(
            DocumentStore::open(dir.path(), "bad"),
            Err(StoreError::NotAnObject(_))
        ));
    }
}
