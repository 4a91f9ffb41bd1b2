//! # resealeds-core
//!
//! Shared logic for the monitored-products catalog: session tracking, the
//! catalog view, and the store port its adapters implement.
//!
//! ## Design Principles
//!
//! - **Store is authoritative**: ids and ordering come from the store; the
//!   view never assigns an id or reorders beyond ascending merge.
//! - **Signed-out wins**: a sign-out observed at any point discards reads and
//!   writes issued before it.
//! - **Pure model, thin runtime**: [`CatalogViewModel`] is synchronous and
//!   testable on its own; [`CatalogView`] drives it from a tokio task.
//! - **Graceful degradation**: a missing or malformed config yields defaults.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use resealeds_core::{CatalogView, MemoryStore, SessionFeed, SessionObserver, StoreHandle, ViewConfig};
//!
//! let feed = SessionFeed::new();
//! let observer = SessionObserver::new(&feed);
//! let view = CatalogView::mount(StoreHandle::new(MemoryStore::new()), &observer, ViewConfig::default())?;
//! let snapshot = view.settled().await?;
//! ```

pub mod config;
pub mod error;
pub mod session;
pub mod store;
pub mod view;

pub use config::*;
pub use error::{CatalogError, MergeError, Result, SessionError, StoreError};
pub use session::{
    next_state, AuthState, ProviderSignal, Session, SessionFeed, SessionObserver,
    SessionTransition, Subscription,
};
pub use store::{CatalogStore, MemoryStore, StoreHandle};
pub use view::*;
