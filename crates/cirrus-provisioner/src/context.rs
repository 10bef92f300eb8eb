use std::sync::Arc;

use cirrus_core::{PersistedState, ResourceAddr};

use crate::driver::BoxFuture;
use crate::error::ProvisionerError;

/// Keyed persistence of last-known resource state.
///
/// `get_state` returns an empty state for addresses never written. Saving
/// an empty state clears the entry.
pub trait StateStore: Send + Sync {
    fn get_state<'a>(
        &'a self,
        addr: &'a ResourceAddr,
    ) -> BoxFuture<'a, Result<PersistedState, ProvisionerError>>;

    fn save_state<'a>(
        &'a self,
        addr: &'a ResourceAddr,
        state: PersistedState,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>>;
}

/// Per-instance handle passed to every driver call: the instance's state
/// address plus the store behind it.
#[derive(Clone)]
pub struct Context {
    addr: ResourceAddr,
    store: Arc<dyn StateStore>,
}

impl Context {
    pub fn new(addr: ResourceAddr, store: Arc<dyn StateStore>) -> Self {
        Self { addr, store }
    }

    pub fn addr(&self) -> &ResourceAddr {
        &self.addr
    }

    pub fn instance_id(&self) -> &str {
        &self.addr.instance_id
    }

    pub async fn get_state(&self) -> Result<PersistedState, ProvisionerError> {
        self.store.get_state(&self.addr).await
    }

    pub async fn save_state(&self, state: PersistedState) -> Result<(), ProvisionerError> {
        self.store.save_state(&self.addr, state).await
    }

    pub async fn clear_state(&self) -> Result<(), ProvisionerError> {
        self.save_state(PersistedState::new()).await
    }
}
