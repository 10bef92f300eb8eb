use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StorageError;

/// A decoded document and the ETag it was read at.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub value: T,
    pub etag: Option<String>,
}

/// One JSON document at a fixed bucket/key.
#[derive(Debug, Clone)]
pub struct StateObject {
    client: Client,
    bucket: String,
    key: String,
}

impl StateObject {
    pub fn new(client: Client, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Fetch and decode the document. `Ok(None)` when the key does not exist.
    pub async fn load<T: DeserializeOwned>(&self) -> Result<Option<Versioned<T>>, StorageError> {
        let resp = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                let err = e.into_service_error();
                if err.is_no_such_key() {
                    return Ok(None);
                }
                return Err(self.get_err(err.to_string()));
            }
        };

        let etag = resp.e_tag().map(String::from);
        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| self.get_err(e.to_string()))?
            .into_bytes();

        let value = serde_json::from_slice(&body)?;
        Ok(Some(Versioned { value, etag }))
    }

    /// Encode and overwrite the document. Returns the new ETag.
    pub async fn save<T: Serialize>(&self, value: &T) -> Result<String, StorageError> {
        let body = serde_json::to_vec_pretty(value)?;
        let resp = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .content_type("application/json")
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::PutObject {
                bucket: self.bucket.clone(),
                key: self.key.clone(),
                message: e.into_service_error().to_string(),
            })?;

        tracing::debug!(bucket = %self.bucket, key = %self.key, "state object written");
        Ok(resp.e_tag().unwrap_or_default().to_string())
    }

    fn get_err(&self, message: String) -> StorageError {
        StorageError::GetObject {
            bucket: self.bucket.clone(),
            key: self.key.clone(),
            message,
        }
    }
}
