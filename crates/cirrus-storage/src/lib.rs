//! cirrus-storage
//!
//! S3 copy of the state document. Thin wrapper around the AWS S3 SDK.

pub mod error;
pub mod object;

pub use crate::error::StorageError;
pub use crate::object::{StateObject, Versioned};
