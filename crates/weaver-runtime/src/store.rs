//! JSON key-value storage.
//!
//! A [`JsonStore`] keeps one JSON file per named collection under its
//! root directory; each file holds a single object mapping string keys to
//! arbitrary JSON values. An absent file is an empty collection and is
//! created on first write. There is no schema versioning.
//!
//! Every mutation is a full read-modify-write of the owning collection
//! file. Overlapping mutations of the same collection from concurrently
//! executing handlers race at the file level and the last writer wins;
//! callers that need atomic increments or per-key ordering must serialize
//! access themselves (e.g. behind their own `tokio::sync::Mutex`).

use std::path::PathBuf;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::fs;

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A collection file holds something other than a JSON object.
    #[error("collection '{collection}' is corrupt: {reason}")]
    Corrupt {
        /// The collection name.
        collection: String,
        /// What went wrong.
        reason: String,
    },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

type Collection = Map<String, Value>;

/// A directory of JSON collections.
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    /// Creates a store rooted at `root`. The directory is created lazily
    /// on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store's root directory.
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn file_path(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{collection}.json"))
    }

    async fn read_collection(&self, collection: &str) -> StoreResult<Collection> {
        let path = self.file_path(collection);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Collection::new()),
            Err(err) => return Err(err.into()),
        };

        let value: Value =
            serde_json::from_slice(&bytes).map_err(|err| StoreError::Corrupt {
                collection: collection.to_string(),
                reason: err.to_string(),
            })?;
        match value {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::Corrupt {
                collection: collection.to_string(),
                reason: format!("expected an object, found {other}"),
            }),
        }
    }

    async fn write_collection(&self, collection: &str, data: &Collection) -> StoreResult<()> {
        fs::create_dir_all(&self.root).await?;
        let json = serde_json::to_vec_pretty(&Value::Object(data.clone())).map_err(|err| {
            StoreError::Corrupt {
                collection: collection.to_string(),
                reason: err.to_string(),
            }
        })?;
        fs::write(self.file_path(collection), json).await?;
        Ok(())
    }

    /// Reads a value.
    pub async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.read_collection(collection).await?.remove(key))
    }

    /// Writes a value.
    pub async fn set(
        &self,
        collection: &str,
        key: &str,
        value: impl Into<Value>,
    ) -> StoreResult<()> {
        let mut data = self.read_collection(collection).await?;
        data.insert(key.to_string(), value.into());
        self.write_collection(collection, &data).await
    }

    /// Returns whether a key exists.
    pub async fn has(&self, collection: &str, key: &str) -> StoreResult<bool> {
        Ok(self.read_collection(collection).await?.contains_key(key))
    }

    /// Removes a key. Returns whether it was present.
    pub async fn delete(&self, collection: &str, key: &str) -> StoreResult<bool> {
        let mut data = self.read_collection(collection).await?;
        let removed = data.remove(key).is_some();
        if removed {
            self.write_collection(collection, &data).await?;
        }
        Ok(removed)
    }

    /// Reads a whole collection.
    pub async fn all(&self, collection: &str) -> StoreResult<Map<String, Value>> {
        self.read_collection(collection).await
    }

    /// Empties a collection.
    pub async fn clear(&self, collection: &str) -> StoreResult<()> {
        self.write_collection(collection, &Collection::new()).await
    }

    /// Applies `updater` to the current value of a key (or `None`) and
    /// stores the result. Returns the stored value.
    pub async fn update<F>(&self, collection: &str, key: &str, updater: F) -> StoreResult<Value>
    where
        F: FnOnce(Option<Value>) -> Value,
    {
        let mut data = self.read_collection(collection).await?;
        let updated = updater(data.remove(key));
        data.insert(key.to_string(), updated.clone());
        self.write_collection(collection, &data).await?;
        Ok(updated)
    }

    /// Increments a numeric field inside a stored object, creating the
    /// object and the field as needed. Returns the updated object.
    pub async fn increment(
        &self,
        collection: &str,
        key: &str,
        field: &str,
        amount: i64,
    ) -> StoreResult<Value> {
        let field = field.to_string();
        self.update(collection, key, move |value| {
            let mut object = match value {
                Some(Value::Object(map)) => map,
                _ => Map::new(),
            };
            let current = object.get(&field).and_then(Value::as_i64).unwrap_or(0);
            object.insert(field, Value::from(current + amount));
            Value::Object(object)
        })
        .await
    }

    /// Appends a value to a stored array, creating the array as needed.
    /// Returns the updated array.
    pub async fn push(
        &self,
        collection: &str,
        key: &str,
        value: impl Into<Value>,
    ) -> StoreResult<Value> {
        let value = value.into();
        self.update(collection, key, move |current| match current {
            Some(Value::Array(mut items)) => {
                items.push(value);
                Value::Array(items)
            }
            Some(other) => other,
            None => Value::Array(vec![value]),
        })
        .await
    }

    /// Removes all occurrences of a value from a stored array. Returns
    /// the updated array.
    pub async fn pull(&self, collection: &str, key: &str, value: &Value) -> StoreResult<Value> {
        let value = value.clone();
        self.update(collection, key, move |current| match current {
            Some(Value::Array(items)) => {
                Value::Array(items.into_iter().filter(|item| *item != value).collect())
            }
            Some(other) => other,
            None => Value::Array(Vec::new()),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn store() -> (tempfile::TempDir, JsonStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let (_dir, store) = store();
        store.set("users", "john", json!({"age": 30})).await.unwrap();
        assert_eq!(store.get("users", "john").await.unwrap(), Some(json!({"age": 30})));
        assert_eq!(store.get("users", "jane").await.unwrap(), None);
    }

    #[tokio::test]
    async fn absent_collection_is_empty() {
        let (_dir, store) = store();
        assert_eq!(store.get("nothing", "k").await.unwrap(), None);
        assert!(!store.has("nothing", "k").await.unwrap());
        assert!(store.all("nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_then_has_is_false() {
        let (_dir, store) = store();
        store.set("c", "k", json!(1)).await.unwrap();
        assert!(store.has("c", "k").await.unwrap());
        assert!(store.delete("c", "k").await.unwrap());
        assert!(!store.has("c", "k").await.unwrap());
        assert!(!store.delete("c", "k").await.unwrap());
    }

    #[tokio::test]
    async fn push_accumulates_in_order() {
        let (_dir, store) = store();
        store.push("c", "k", json!(1)).await.unwrap();
        let updated = store.push("c", "k", json!(2)).await.unwrap();
        assert_eq!(updated, json!([1, 2]));
        assert_eq!(store.get("c", "k").await.unwrap(), Some(json!([1, 2])));
    }

    #[tokio::test]
    async fn pull_removes_all_occurrences() {
        let (_dir, store) = store();
        for v in [1, 2, 1, 3] {
            store.push("c", "k", json!(v)).await.unwrap();
        }
        let updated = store.pull("c", "k", &json!(1)).await.unwrap();
        assert_eq!(updated, json!([2, 3]));
    }

    #[tokio::test]
    async fn increment_creates_and_accumulates() {
        let (_dir, store) = store();
        let first = store.increment("c", "k", "score", 5).await.unwrap();
        assert_eq!(first, json!({"score": 5}));
        let second = store.increment("c", "k", "score", 3).await.unwrap();
        assert_eq!(second, json!({"score": 8}));
    }

    #[tokio::test]
    async fn update_receives_current_value() {
        let (_dir, store) = store();
        store.set("c", "k", json!({"a": 1})).await.unwrap();
        let updated = store
            .update("c", "k", |value| {
                let mut map = match value {
                    Some(Value::Object(map)) => map,
                    _ => Map::new(),
                };
                map.insert("b".to_string(), json!(2));
                Value::Object(map)
            })
            .await
            .unwrap();
        assert_eq!(updated, json!({"a": 1, "b": 2}));
    }

    #[tokio::test]
    async fn clear_empties_the_collection() {
        let (_dir, store) = store();
        store.set("c", "k", json!(1)).await.unwrap();
        store.clear("c").await.unwrap();
        assert!(store.all("c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_collection_is_reported() {
        let (dir, store) = store();
        tokio::fs::write(dir.path().join("bad.json"), b"[1, 2]").await.unwrap();
        assert!(matches!(
            store.get("bad", "k").await.unwrap_err(),
            StoreError::Corrupt { .. }
        ));
    }
}
