use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionerError {
    #[error("resource not found: {resource_type}/{resource_id}")]
    ResourceNotFound {
        resource_type: String,
        resource_id: String,
    },

    #[error("{operation} failed: {message}")]
    RemoteCall { operation: String, message: String },

    #[error("packaging failed: {0}")]
    Packaging(#[from] PackagingError),

    #[error("state error: {0}")]
    State(String),

    #[error(transparent)]
    Core(#[from] cirrus_core::CoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProvisionerError {
    /// Prepend resource identity to the error message.
    pub fn with_resource(self, label: &str, name: &str) -> Self {
        match self {
            Self::RemoteCall { operation, message } => Self::RemoteCall {
                operation,
                message: format!("{label} ({name}): {message}"),
            },
            Self::State(msg) => Self::State(format!("{label} ({name}): {msg}")),
            other => other,
        }
    }

    /// True for a remote "does not exist" response.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ResourceNotFound { .. })
    }
}

/// Failure while turning a code tree into a deployable archive.
#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("code source lists no directory")]
    EmptySource,

    #[error("source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("cannot derive archive name for {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("archive write failed: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Walk the full error chain and join all causes into one string.
///
/// AWS SDK errors often have terse `Display` impls (e.g. "service error")
/// but useful detail in the source chain.
pub fn format_err_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

/// Wrap an SDK failure for `operation` as a [`ProvisionerError::RemoteCall`].
pub(crate) fn remote_err(operation: &str, err: &dyn std::error::Error) -> ProvisionerError {
    ProvisionerError::RemoteCall {
        operation: operation.to_string(),
        message: format_err_chain(err),
    }
}
