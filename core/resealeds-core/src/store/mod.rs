//! The remote store port.
//!
//! The store is the authority on identity and ordering. Adapters validate
//! whatever they read through `resealeds_protocol`'s decoders before handing
//! records back, so the view never sees a malformed row.

mod memory;

pub use memory::MemoryStore;

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use resealeds_protocol::{MonitoredProduct, NewProduct};

use crate::error::StoreError;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Reads the whole catalog, ascending by id. No pagination or filtering.
    async fn list_products(&self) -> Result<Vec<MonitoredProduct>, StoreError>;

    /// Writes one product and returns it with the id the store assigned.
    async fn insert_product(&self, draft: NewProduct) -> Result<MonitoredProduct, StoreError>;
}

/// Shared handle to a store.
///
/// The view reloads only when it is given a handle with a different identity;
/// rebinding a clone of the current handle is a no-op.
#[derive(Clone)]
pub struct StoreHandle(Arc<dyn CatalogStore>);

impl StoreHandle {
    pub fn new<S>(store: S) -> Self
    where
        S: CatalogStore + 'static,
    {
        Self(Arc::new(store))
    }

    pub fn from_arc(store: Arc<dyn CatalogStore>) -> Self {
        Self(store)
    }

    pub fn same_as(&self, other: &StoreHandle) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.0) as *const (),
            Arc::as_ptr(&other.0) as *const (),
        )
    }
}

impl Deref for StoreHandle {
    type Target = dyn CatalogStore;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StoreHandle")
            .field(&(Arc::as_ptr(&self.0) as *const ()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity() {
        let handle = StoreHandle::new(MemoryStore::new());
        let clone = handle.clone();
        assert!(handle.same_as(&clone));
    }

    #[test]
    fn distinct_stores_differ() {
        let first = StoreHandle::new(MemoryStore::new());
        let second = StoreHandle::new(MemoryStore::new());
        assert!(!first.same_as(&second));
    }

    #[test]
    fn from_arc_keeps_identity() {
        let store: Arc<dyn CatalogStore> = Arc::new(MemoryStore::new());
        let first = StoreHandle::from_arc(Arc::clone(&store));
        let second = StoreHandle::from_arc(store);
        assert!(first.same_as(&second));
    }
}
