//! cirrus-core
//!
//! Pure domain types: typed resource specs, instances, persisted state, and
//! the type-name registry. No AWS SDK dependency; this is the shared
//! vocabulary between the drivers and whatever orchestrates them.

pub mod addr;
pub mod error;
pub mod instance;
pub mod registry;
pub mod spec;
pub mod state;

pub use crate::addr::ResourceAddr;
pub use crate::error::CoreError;
pub use crate::instance::Instance;
pub use crate::registry::ResourceKind;
pub use crate::spec::ResourceSpec;
pub use crate::state::PersistedState;
