use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown resource type name: {0}")]
    UnknownTypeName(String),

    #[error("invalid inputs for {type_name}: {message}")]
    InvalidInputs { type_name: String, message: String },
}
