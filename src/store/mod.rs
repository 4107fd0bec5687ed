use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Map, Value};

use crate::error::{DecodeError, Error};

pub mod memory;
pub mod postgres;
pub mod s3;

/// A remote document as stored: loosely typed, schema-less.
pub type Document = Map<String, Value>;

/// Collection holding recipe posts.
pub const POSTS: &str = "posts";
/// Collection holding user profiles, keyed by auth UID.
pub const USERS: &str = "Users";
/// Collection holding auth credentials, keyed by auth UID.
pub(crate) const CREDENTIALS: &str = "Credentials";

/// Blob key prefix for post images.
pub const POST_IMAGES: &str = "post_images";
/// Blob key prefix for profile pictures.
pub const PROFILE_IMAGES: &str = "profile_images";

/// Document CRUD against the remote store.
///
/// `update` merges partial fields into an existing document and fails
/// with `NotFound` when the document is absent; `set` writes the whole
/// document at a caller-chosen key, creating it if needed. `delete` on
/// a missing document succeeds.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, Error>;

    /// Insert a new document and return its assigned id.
    async fn add(&self, collection: &str, fields: Document) -> Result<String, Error>;

    async fn set(&self, collection: &str, id: &str, fields: Document) -> Result<(), Error>;

    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<(), Error>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), Error>;

    /// Fetch an entire collection ordered by one top-level field.
    async fn query_ordered(
        &self,
        collection: &str,
        order_by: &str,
        descending: bool,
    ) -> Result<Vec<(String, Document)>, Error>;
}

/// Binary object storage for post and profile images.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: Bytes) -> Result<(), Error>;

    /// Download URL for an uploaded blob.
    async fn url(&self, path: &str) -> Result<String, Error>;

    async fn delete(&self, path: &str) -> Result<(), Error>;
}

/// Read a required string field out of a raw document.
pub(crate) fn required_str(fields: &Document, key: &'static str) -> Result<String, DecodeError> {
    match fields.get(key) {
        None => Err(DecodeError::MissingField(key)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(DecodeError::WrongType(key)),
    }
}

/// Read an optional string field; a present value of the wrong type is
/// ignored, matching how the remote schema has historically been read.
pub(crate) fn optional_str(fields: &Document, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_owned)
}
