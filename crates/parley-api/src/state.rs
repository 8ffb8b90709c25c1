use std::sync::Arc;

use parley_db::Database;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
}

impl AppStateInner {
    pub fn new(db: Database) -> AppState {
        Arc::new(Self { db })
    }
}

/// Run a database call off the async runtime.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> parley_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    let out = tokio::task::spawn_blocking(move || f(&state.db)).await?;
    Ok(out?)
}
