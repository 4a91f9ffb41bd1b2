//! The catalog view: ordered product list, session gating, and the runtime
//! that keeps both current.

mod merge;
mod model;
mod runtime;
mod snapshot;

pub use merge::{merge_confirmed, MergeOutcome};
pub use model::{AddTicket, CatalogViewModel, DiscardReason, LoadOutcome, LoadTicket};
pub use runtime::{AddReceipt, CatalogView};
pub use snapshot::{render_lines, CatalogSnapshot, LOGIN_PROMPT};
