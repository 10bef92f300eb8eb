//! cirrus-provisioner
//!
//! Reconciliation core for ECS services, ECS task definitions, and
//! functions. Each driver turns a desired spec plus its last persisted
//! state into create / update / replace / delete calls against an injected
//! remote client, then records what it observed.
//!
//! Public API:
//! - [`Driver`]: `deploy` / `remove` / `get` for one resource kind
//! - [`Drivers`]: routes a tagged [`cirrus_core::ResourceSpec`] to its driver
//! - [`StateStore`] and [`StatePersistence`]: keyed state, local disk + S3
//! - [`package::pack`]: directory tree to deployable zip archive

pub mod context;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod package;
pub mod persistence;
pub mod remote;
pub mod resources;
pub mod state;

pub use crate::context::{Context, StateStore};
pub use crate::dispatch::Drivers;
pub use crate::driver::{BoxFuture, Driver};
pub use crate::error::{PackagingError, ProvisionerError};
pub use crate::persistence::StatePersistence;
pub use crate::state::ProvisionerState;
