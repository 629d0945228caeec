//! Object storage interface
//!
//! The handler talks to storage only through [`ObjectStore`]. `randpic-aws`
//! implements it on top of `aws-sdk-s3`; [`MemoryStore`] keeps objects in
//! process for tests and local runs.

use crate::error::StdError;

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },
    #[error("storage backend error: {0}")]
    Backend(StdError),
}

impl StoreError {
    pub fn backend(err: impl Into<StdError>) -> Self {
        Self::Backend(err.into())
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type StoreResult<T = ()> = Result<T, StoreError>;

/// Object storage used by the handler
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Returns a URL granting read access to `bucket/key` for `ttl`
    async fn presigned_get_url(&self, bucket: &str, key: &str, ttl: Duration) -> StoreResult<String>;

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes>;

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes, content_type: Option<&str>) -> StoreResult;

    /// Lists every key in `bucket`
    async fn list_objects(&self, bucket: &str) -> StoreResult<Vec<String>>;
}

#[async_trait::async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    async fn presigned_get_url(&self, bucket: &str, key: &str, ttl: Duration) -> StoreResult<String> {
        (**self).presigned_get_url(bucket, key, ttl).await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        (**self).get_object(bucket, key).await
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes, content_type: Option<&str>) -> StoreResult {
        (**self).put_object(bucket, key, body, content_type).await
    }

    async fn list_objects(&self, bucket: &str) -> StoreResult<Vec<String>> {
        (**self).list_objects(bucket).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: Option<String>,
}

/// In-memory object store
///
/// Presigned URLs use the `memory://` scheme and are not signed.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<(String, String), StoredObject>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Bytes>, content_type: Option<&str>) {
        let object = StoredObject {
            body: body.into(),
            content_type: content_type.map(str::to_owned),
        };
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        objects.insert((bucket.to_owned(), key.to_owned()), object);
    }

    #[must_use]
    pub fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        objects.get(&(bucket.to_owned(), key.to_owned())).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStore {
    async fn presigned_get_url(&self, bucket: &str, key: &str, ttl: Duration) -> StoreResult<String> {
        Ok(format!(
            "memory://{}/{}?X-Amz-Expires={}",
            urlencoding::encode(bucket),
            urlencoding::encode(key),
            ttl.as_secs()
        ))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        match self.get(bucket, key) {
            Some(object) => Ok(object.body),
            None => Err(StoreError::NotFound {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            }),
        }
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes, content_type: Option<&str>) -> StoreResult {
        self.insert(bucket, key, body, content_type);
        Ok(())
    }

    async fn list_objects(&self, bucket: &str) -> StoreResult<Vec<String>> {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        let keys = objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        Ok(keys)
    }
}
