//! HTTP surface: delta ingestion, file listing, consumer login and health.

mod error;
mod routes;
pub mod types;

pub use error::ApiError;
pub use routes::build_router;

use std::sync::Arc;

use crate::cache::DeltaCache;
use crate::session::SessionStoreRef;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<DeltaCache>,
    pub sessions: SessionStoreRef,
    /// Expected value of the `key` header on login. `None` disables login.
    pub login_key: Option<Arc<str>>,
    pub log_incoming_delta: bool,
}
