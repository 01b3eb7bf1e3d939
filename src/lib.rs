//! # Portfolio Tracker SDK
//!
//! Data layer for a cryptocurrency portfolio dashboard: market listings and
//! global statistics from CoinGecko, holdings reconciled with activity, and a
//! watchlist. Holdings, activity and the watchlist live either on a remote
//! backend or, in offline mode, as a JSON document in the local key-value
//! store.
//!
//! ## Usage
//!
//! ```no_run
//! use portfolio_tracker_sdk::{Dashboard, FileStore, KeyValueStore};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open("settings.json").await?);
//! let dashboard = Arc::new(Dashboard::connect(store).await?);
//!
//! let outcome = dashboard.refresh().await?;
//! for failure in &outcome.failures {
//!     eprintln!("{}", failure);
//! }
//!
//! // Keep refreshing every 20 seconds while the screen is focused
//! let _poller = dashboard.start_default_polling();
//! # Ok(())
//! # }
//! ```

pub mod activity;
pub mod constants;
pub mod dashboard;
pub mod error;
pub mod market;
pub mod metrics;
pub mod provider;
pub mod providers;
pub mod reconcile;
pub mod session;
pub mod settings;
pub mod sorting;
pub mod source;
pub mod sources;
pub mod store;
pub mod types;
pub mod view;

// Re-export commonly used types
pub use dashboard::{Dashboard, RefreshOutcome, WatchlistAddOutcome};
pub use error::{DashboardError, RequestError, StorageError};
pub use metrics::RequestMetrics;
pub use provider::MarketDataProvider;
pub use reconcile::{HoldingsReconciler, HoldingsSummary, ReconciliationMode};
pub use session::Session;
pub use settings::DashboardSettings;
pub use source::DataSource;
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use types::{ActivityEvent, ActivityKind, CoinLookup, Holding, MarketCoin};
pub use view::DashboardView;
