//! SQLite persistence for the monitored-products catalog.
//!
//! The table mirrors the remote catalog: a serial `id` the database assigns,
//! plus the three display columns. Every read goes back through the protocol
//! decoders, so a hand-edited row surfaces as a decode error rather than a
//! broken view.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use resealeds_core::{CatalogStore, StoreError};
use resealeds_protocol::{decode_products, MonitoredProduct, NewProduct, ProductId, ProductRow};
use rusqlite::{params, Connection, OpenFlags};

pub struct Db {
    path: PathBuf,
}

impl Db {
    pub fn new(path: PathBuf) -> Result<Self, StoreError> {
        let db = Self { path };
        db.init_schema()?;
        Ok(db)
    }

    pub fn list_products(&self) -> Result<Vec<MonitoredProduct>, StoreError> {
        let rows = self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name, img, price FROM monitored_products ORDER BY id ASC")
                .map_err(|err| unavailable("prepare products query", err))?;

            let rows = stmt
                .query_map([], |row| {
                    Ok(ProductRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        img: row.get(2)?,
                        price: row.get(3)?,
                    })
                })
                .map_err(|err| unavailable("read product rows", err))?;

            let mut products = Vec::new();
            for row in rows {
                products.push(row.map_err(|err| unavailable("decode product row", err))?);
            }
            Ok(products)
        })?;

        Ok(decode_products(rows)?)
    }

    pub fn insert_product(&self, draft: NewProduct) -> Result<MonitoredProduct, StoreError> {
        draft.validate()?;
        let raw_id = self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO monitored_products (name, img, price, created_at) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![draft.name, draft.img, draft.price, Utc::now().to_rfc3339()],
            )
            .map_err(|err| unavailable("insert product", err))?;
            Ok(conn.last_insert_rowid())
        })?;

        let id = ProductId::try_from(raw_id)?;
        Ok(draft.confirm(id))
    }

    #[cfg(test)]
    fn count_products(&self) -> Result<usize, StoreError> {
        let count = self.with_connection(|conn| {
            conn.query_row("SELECT COUNT(*) FROM monitored_products", [], |row| {
                row.get::<_, i64>(0)
            })
            .map_err(|err| unavailable("count products", err))
        })?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.with_connection(|conn| {
            conn.execute_batch(
                "BEGIN;
                 CREATE TABLE IF NOT EXISTS monitored_products (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    img TEXT NOT NULL,
                    price REAL NOT NULL,
                    created_at TEXT NOT NULL
                 );
                 COMMIT;",
            )
            .map_err(|err| unavailable("initialize schema", err))
        })
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.open()?;
        op(&mut conn)
    }

    fn open(&self) -> Result<Connection, StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                StoreError::Unavailable(format!("Failed to create catalog data dir: {}", err))
            })?;
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

        let conn = Connection::open_with_flags(&self.path, flags)
            .map_err(|err| unavailable("open sqlite db", err))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|err| unavailable("enable WAL", err))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|err| unavailable("set busy_timeout", err))?;

        Ok(conn)
    }
}

fn unavailable(action: &str, err: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(format!("Failed to {}: {}", action, err))
}

/// [`CatalogStore`] over a local SQLite file. Connections are opened per
/// call on the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Db>,
}

impl SqliteStore {
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        Ok(Self {
            db: Arc::new(Db::new(path)?),
        })
    }

    async fn run_blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Db) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|err| StoreError::Unavailable(format!("sqlite task failed: {}", err)))?
    }
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn list_products(&self) -> Result<Vec<MonitoredProduct>, StoreError> {
        self.run_blocking(|db| db.list_products()).await
    }

    async fn insert_product(&self, draft: NewProduct) -> Result<MonitoredProduct, StoreError> {
        self.run_blocking(move |db| db.insert_product(draft)).await
    }
}
