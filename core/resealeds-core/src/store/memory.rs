use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use resealeds_protocol::{MonitoredProduct, NewProduct, ProductId};

use super::CatalogStore;
use crate::error::StoreError;

/// In-memory catalog table. Ids are assigned like a serial column: one past
/// the largest id ever stored.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: Mutex<Table>,
}

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<ProductId, MonitoredProduct>,
    last_id: i64,
    reads: usize,
    fail_read: Option<StoreError>,
    fail_write: Option<StoreError>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products<I>(products: I) -> Self
    where
        I: IntoIterator<Item = MonitoredProduct>,
    {
        let store = Self::new();
        {
            let mut table = store.lock();
            for product in products {
                table.last_id = table.last_id.max(product.id.get());
                table.rows.insert(product.id, product);
            }
        }
        store
    }

    /// Makes the next read fail with `err`.
    pub fn fail_next_read(&self, err: StoreError) {
        self.lock().fail_read = Some(err);
    }

    /// Makes the next write fail with `err`.
    pub fn fail_next_write(&self, err: StoreError) {
        self.lock().fail_write = Some(err);
    }

    pub fn read_count(&self) -> usize {
        self.lock().reads
    }

    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Table> {
        self.table
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_products(&self) -> Result<Vec<MonitoredProduct>, StoreError> {
        let mut table = self.lock();
        table.reads += 1;
        if let Some(err) = table.fail_read.take() {
            return Err(err);
        }
        Ok(table.rows.values().cloned().collect())
    }

    async fn insert_product(&self, draft: NewProduct) -> Result<MonitoredProduct, StoreError> {
        draft.validate()?;
        let mut table = self.lock();
        if let Some(err) = table.fail_write.take() {
            return Err(err);
        }
        let id = ProductId::new(table.last_id + 1)
            .ok_or_else(|| StoreError::Unavailable("id sequence exhausted".to_string()))?;
        table.last_id = id.get();
        let product = draft.confirm(id);
        table.rows.insert(id, product.clone());
        Ok(product)
    }
}
