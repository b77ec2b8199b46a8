//! Binary asset storage (labels, bottle photos). Records hold only the returned document id.

use crate::error::AppError;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub content_type: Option<String>,
    pub attributes: HashMap<String, String>,
}

impl DocumentMetadata {
    pub fn with_content_type(content_type: impl Into<String>) -> Self {
        DocumentMetadata {
            content_type: Some(content_type.into()),
            attributes: HashMap::new(),
        }
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store `bytes`; returns the new document id.
    async fn save(&self, bytes: Vec<u8>, metadata: DocumentMetadata) -> Result<String, AppError>;

    async fn load(&self, id: &str) -> Result<Option<Vec<u8>>, AppError>;

    /// `true` when a document was removed.
    async fn delete(&self, id: &str) -> Result<bool, AppError>;
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<HashMap<String, (Vec<u8>, DocumentMetadata)>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(&self, id: &str) -> Option<DocumentMetadata> {
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|(_, m)| m.clone())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn save(&self, bytes: Vec<u8>, metadata: DocumentMetadata) -> Result<String, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), (bytes, metadata));
        Ok(id)
    }

    async fn load(&self, id: &str) -> Result<Option<Vec<u8>>, AppError> {
        Ok(self
            .docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|(b, _)| b.clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        Ok(self
            .docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some())
    }
}

/// Documents as objects under `<prefix><id>` in one bucket.
pub struct S3DocumentStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl S3DocumentStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        S3DocumentStore {
            client,
            bucket: bucket.into(),
            prefix: "documents/".into(),
        }
    }

    /// Client from the standard AWS environment (credentials, region, endpoint).
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(aws_sdk_s3::Client::new(&config), bucket)
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }
}

fn storage_error(e: impl std::fmt::Display) -> AppError {
    AppError::Storage(e.to_string())
}

#[async_trait]
impl DocumentStore for S3DocumentStore {
    async fn save(&self, bytes: Vec<u8>, metadata: DocumentMetadata) -> Result<String, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let key = self.key(&id);
        tracing::debug!(bucket = %self.bucket, key = %key, size = bytes.len(), "put document");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .set_content_type(metadata.content_type)
            .set_metadata(Some(metadata.attributes).filter(|m| !m.is_empty()))
            .send()
            .await
            .map_err(storage_error)?;
        Ok(id)
    }

    async fn load(&self, id: &str) -> Result<Option<Vec<u8>>, AppError> {
        let out = match self.client.get_object().bucket(&self.bucket).key(self.key(id)).send().await {
            Ok(out) => out,
            Err(err) => {
                if err.as_service_error().map(|e| e.is_no_such_key()).unwrap_or(false) {
                    return Ok(None);
                }
                return Err(storage_error(err));
            }
        };
        let data = out.body.collect().await.map_err(storage_error)?;
        Ok(Some(data.into_bytes().to_vec()))
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let key = self.key(id);
        if let Err(err) = self.client.head_object().bucket(&self.bucket).key(&key).send().await {
            if err.as_service_error().map(|e| e.is_not_found()).unwrap_or(false) {
                return Ok(false);
            }
            return Err(storage_error(err));
        }
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(storage_error)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryDocumentStore::new();
        let meta = DocumentMetadata::with_content_type("image/png").attribute("entity", "Drink");
        let id = store.save(vec![1, 2, 3], meta.clone()).await.unwrap();
        assert_eq!(store.load(&id).await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(store.metadata(&id), Some(meta));
        assert!(store.delete(&id).await.unwrap());
        assert!(!store.delete(&id).await.unwrap());
        assert_eq!(store.load(&id).await.unwrap(), None);
    }
}
