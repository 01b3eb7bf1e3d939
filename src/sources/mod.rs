//! Data source implementations and backend selection

pub mod local;
pub mod remote;

pub use local::{LocalSource, NoApiBook};
pub use remote::RemoteSource;

use crate::{
    constants::keys, error::RequestError, provider::MarketDataProvider, session::Session,
    source::DataSource, store::KeyValueStore,
};
use std::sync::Arc;

/// Selects the data source once, from the stored offline-mode flag
///
/// Offline mode uses the local book; otherwise a stored session is required.
pub async fn connect(
    store: Arc<dyn KeyValueStore>,
    pricing: Arc<dyn MarketDataProvider>,
) -> Result<Arc<dyn DataSource>, RequestError> {
    if store.get_non_empty(keys::NO_API_MODE).await?.is_some() {
        tracing::info!("Using offline data source");
        return Ok(Arc::new(LocalSource::new(store, pricing)));
    }

    let session = Session::load(store.as_ref())
        .await?
        .ok_or_else(|| RequestError::validation("Not logged in."))?;

    tracing::info!(api = %session.api, username = %session.username, "Using remote data source");
    Ok(Arc::new(RemoteSource::new(session, pricing)?))
}
