use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::Error;
use crate::store::{BlobStore, Document, DocumentStore};

/// In-memory document store used by tests and `AppState::fake()`.
///
/// `fail_next()` arms a one-shot injected failure so tests can exercise
/// the abort-without-rollback policy of the workflows.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, BTreeMap<String, Document>>>,
    fail_next: AtomicBool,
    pub get_calls: AtomicU64,
}

impl MemoryStore {
    pub fn fail_next(&self) {
        self.fail_next.store(true, AtomicOrdering::SeqCst);
    }

    fn take_failure(&self) -> Result<(), Error> {
        if self.fail_next.swap(false, AtomicOrdering::SeqCst) {
            return Err(Error::Remote("injected store failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, Error> {
        self.take_failure()?;
        self.get_calls.fetch_add(1, AtomicOrdering::Relaxed);
        let collections = self.collections.lock().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn add(&self, collection: &str, fields: Document) -> Result<String, Error> {
        self.take_failure()?;
        let id = Uuid::new_v4().simple().to_string();
        let mut collections = self.collections.lock().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Document) -> Result<(), Error> {
        self.take_failure()?;
        let mut collections = self.collections.lock().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<(), Error> {
        self.take_failure()?;
        let mut collections = self.collections.lock().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| Error::not_found(format!("document {collection}/{id}")))?;
        for (key, value) in fields {
            doc.insert(key, value);
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), Error> {
        self.take_failure()?;
        let mut collections = self.collections.lock().await;
        if let Some(docs) = collections.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn query_ordered(
        &self,
        collection: &str,
        order_by: &str,
        descending: bool,
    ) -> Result<Vec<(String, Document)>, Error> {
        self.take_failure()?;
        let collections = self.collections.lock().await;
        let mut rows: Vec<(String, Document)> = collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| (id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(|(_, a), (_, b)| wire_cmp(a.get(order_by), b.get(order_by)));
        if descending {
            rows.reverse();
        }
        Ok(rows)
    }
}

/// Order two wire values the way the real store would: numbers
/// numerically, strings lexically, documents missing the field last.
fn wire_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), Some(_)) => Ordering::Equal,
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// In-memory blob store counterpart to [`MemoryStore`].
#[derive(Default)]
pub struct MemoryBlobs {
    objects: Mutex<HashMap<String, Bytes>>,
    fail_next: AtomicBool,
}

impl MemoryBlobs {
    pub fn fail_next(&self) {
        self.fail_next.store(true, AtomicOrdering::SeqCst);
    }

    fn take_failure(&self) -> Result<(), Error> {
        if self.fail_next.swap(false, AtomicOrdering::SeqCst) {
            return Err(Error::Remote("injected blob failure".into()));
        }
        Ok(())
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.objects.lock().await.contains_key(path)
    }

    pub async fn object_count(&self) -> usize {
        self.objects.lock().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobs {
    async fn upload(&self, path: &str, bytes: Bytes) -> Result<(), Error> {
        self.take_failure()?;
        self.objects.lock().await.insert(path.to_string(), bytes);
        Ok(())
    }

    async fn url(&self, path: &str) -> Result<String, Error> {
        self.take_failure()?;
        if !self.objects.lock().await.contains_key(path) {
            return Err(Error::not_found(format!("blob {path}")));
        }
        Ok(format!("https://blobs.test/{path}"))
    }

    async fn delete(&self, path: &str) -> Result<(), Error> {
        self.take_failure()?;
        // Deleting a missing object succeeds, matching S3 semantics.
        self.objects.lock().await.remove(path);
        Ok(())
    }
}
