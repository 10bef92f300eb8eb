use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("S3 GetObject s3://{bucket}/{key}: {message}")]
    GetObject {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("S3 PutObject s3://{bucket}/{key}: {message}")]
    PutObject {
        bucket: String,
        key: String,
        message: String,
    },
}
