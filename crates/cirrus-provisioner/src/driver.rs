use std::future::Future;
use std::pin::Pin;

use cirrus_core::Instance;
use serde::Serialize;

use crate::context::Context;
use crate::error::ProvisionerError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The lifecycle contract every resource driver implements.
///
/// Each driver holds its remote client handle and reconciles one resource
/// kind. Desired state comes in as `spec`; the driver's persisted state is
/// read and written through `ctx`. A fresh [`Instance`] is returned from
/// every call.
///
/// Methods return boxed futures so drivers can call each other's lifecycle
/// methods (e.g. `deploy` → `remove` on replacement).
pub trait Driver: Send + Sync {
    type Spec: Serialize + Send + Sync;

    /// The resource type name this driver handles (e.g. "AwsEcsService").
    fn type_name(&self) -> &'static str;

    /// Create, update, or replace the remote resource to match `spec`.
    fn deploy<'a>(
        &'a self,
        spec: &'a Self::Spec,
        previous: Option<&'a Instance>,
        ctx: &'a Context,
    ) -> BoxFuture<'a, Result<Instance, ProvisionerError>>;

    /// Tear down whatever persisted state says exists. No-op when nothing
    /// has been recorded.
    fn remove<'a>(
        &'a self,
        spec: &'a Self::Spec,
        previous: Option<&'a Instance>,
        ctx: &'a Context,
    ) -> BoxFuture<'a, Result<Instance, ProvisionerError>>;

    /// Refresh persisted state from the remote system. Never mutates the
    /// remote resource.
    fn get<'a>(
        &'a self,
        spec: &'a Self::Spec,
        previous: Option<&'a Instance>,
        ctx: &'a Context,
    ) -> BoxFuture<'a, Result<Instance, ProvisionerError>>;
}
