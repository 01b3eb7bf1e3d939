//! Dashboard service
//!
//! Owns the view-model and rebuilds it from scratch on every refresh.

use crate::{
    constants::REFRESH_INTERVAL_SECS,
    error::{DashboardError, RequestError},
    market::MarketFetcher,
    metrics::{MetricsCollector, RequestMetrics},
    provider::MarketDataProvider,
    providers::CoinGeckoProvider,
    reconcile::HoldingsReconciler,
    settings::DashboardSettings,
    source::DataSource,
    sources,
    store::KeyValueStore,
    types::{CoinKey, CoinLookup, CoinMatch},
    view::{
        render_global, render_holdings, render_market, DashboardView, GlobalPanel, HoldingsPanel,
        MarketPanel,
    },
};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Result of one refresh cycle
#[derive(Debug)]
pub struct RefreshOutcome {
    /// The view after the refresh (unchanged when not applied)
    pub view: Arc<DashboardView>,
    /// Panels that failed; their previous contents were kept
    pub failures: Vec<DashboardError>,
    /// False when the view was unfocused or a newer refresh had already landed
    pub applied: bool,
}

/// Outcome of adding a coin to the watchlist by symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchlistAddOutcome {
    Added { id: String, message: String },
    /// Several coins share the symbol; pass one to `choose_watchlist_match`
    ChooseFrom(Vec<CoinMatch>),
}

struct PanelMetrics {
    market: MetricsCollector,
    global: MetricsCollector,
    holdings: MetricsCollector,
}

/// The dashboard screen's data layer
pub struct Dashboard {
    store: Arc<dyn KeyValueStore>,
    source: Arc<dyn DataSource>,
    market: MarketFetcher,
    reconciler: HoldingsReconciler,
    view_tx: watch::Sender<Arc<DashboardView>>,
    focused: AtomicBool,
    next_sequence: AtomicU64,
    last_applied: Mutex<u64>,
    metrics: PanelMetrics,
}

impl Dashboard {
    /// Creates a dashboard over an already selected data source
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        source: Arc<dyn DataSource>,
        pricing: Arc<dyn MarketDataProvider>,
    ) -> Self {
        let (view_tx, _) = watch::channel(Arc::new(DashboardView::default()));

        Self {
            store,
            market: MarketFetcher::new(pricing.clone()),
            reconciler: HoldingsReconciler::new(source.clone(), pricing),
            source,
            view_tx,
            focused: AtomicBool::new(true),
            next_sequence: AtomicU64::new(0),
            last_applied: Mutex::new(0),
            metrics: PanelMetrics {
                market: MetricsCollector::new("market"),
                global: MetricsCollector::new("global"),
                holdings: MetricsCollector::new("holdings"),
            },
        }
    }

    /// Selects the data source from `store` and prices through CoinGecko
    pub async fn connect(store: Arc<dyn KeyValueStore>) -> Result<Self, RequestError> {
        let pricing: Arc<dyn MarketDataProvider> = Arc::new(CoinGeckoProvider::new()?);
        let source = sources::connect(store.clone(), pricing.clone()).await?;
        Ok(Self::new(store, source, pricing))
    }

    /// The data source selected at startup
    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    /// The current view-model
    pub fn view(&self) -> Arc<DashboardView> {
        self.view_tx.borrow().clone()
    }

    /// Subscribes to view-model updates
    pub fn subscribe(&self) -> watch::Receiver<Arc<DashboardView>> {
        self.view_tx.subscribe()
    }

    pub fn is_focused(&self) -> bool {
        self.focused.load(Ordering::SeqCst)
    }

    /// Marks the screen as visible or hidden; hidden screens drop results
    pub fn set_focused(&self, focused: bool) {
        self.focused.store(focused, Ordering::SeqCst);
    }

    /// Resets every panel to its loading state, e.g. after settings change
    pub fn reset(&self) {
        self.view_tx.send_replace(Arc::new(DashboardView::default()));
    }

    /// Rebuilds the view-model from a fresh settings snapshot
    ///
    /// Market, global and holdings panels load concurrently. A failed panel
    /// keeps its previous contents and is reported in the outcome. Results
    /// are dropped when the screen is unfocused or a newer refresh has
    /// already been applied.
    pub async fn refresh(&self) -> Result<RefreshOutcome, RequestError> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let settings = DashboardSettings::load(self.store.as_ref()).await?;

        tracing::debug!(sequence, currency = %settings.currency, "Refreshing dashboard");

        let (market, global, holdings) = futures::join!(
            timed(&self.metrics.market, self.load_market(&settings)),
            timed(&self.metrics.global, self.load_global(&settings)),
            timed(&self.metrics.holdings, self.load_holdings(&settings)),
        );

        let mut failures = Vec::new();
        let market = market.map_err(DashboardError::Market);
        let global = global.map_err(DashboardError::Global);
        let holdings = holdings.map_err(DashboardError::Holdings);

        let market = market.map_err(|e| failures.push(e)).ok();
        let global = global.map_err(|e| failures.push(e)).ok();
        let holdings = holdings.map_err(|e| failures.push(e)).ok();

        for failure in &failures {
            tracing::warn!(sequence, error = %failure, "Dashboard panel refresh failed");
        }

        let applied = self
            .apply(sequence, &settings.theme, market, global, holdings)
            .await;

        Ok(RefreshOutcome {
            view: self.view(),
            failures,
            applied,
        })
    }

    /// Applies loaded panels unless the result is stale or unwanted
    async fn apply(
        &self,
        sequence: u64,
        theme: &str,
        market: Option<MarketPanel>,
        global: Option<GlobalPanel>,
        holdings: Option<HoldingsPanel>,
    ) -> bool {
        if !self.is_focused() {
            tracing::debug!(sequence, "Dashboard not focused, dropping refresh");
            return false;
        }

        let mut last_applied = self.last_applied.lock().await;
        if sequence <= *last_applied {
            tracing::debug!(
                sequence,
                last_applied = *last_applied,
                "Discarding out-of-order refresh"
            );
            return false;
        }
        *last_applied = sequence;

        self.view_tx.send_modify(|current| {
            let mut view = current.as_ref().clone();
            if let Some(market) = market {
                view.market = market;
            }
            if let Some(global) = global {
                view.global = Some(global);
            }
            if let Some(holdings) = holdings {
                view.holdings = holdings;
            }
            view.theme = theme.to_string();
            view.refreshed_at = Some(chrono::Utc::now());
            *current = Arc::new(view);
        });

        true
    }

    async fn load_market(&self, settings: &DashboardSettings) -> Result<MarketPanel, RequestError> {
        let watchlist = if settings.watchlist_on_dashboard {
            Some(self.source.read_watchlist().await?)
        } else {
            None
        };

        let coins = self
            .market
            .fetch(
                &settings.currency,
                watchlist.as_ref(),
                settings.market_sort,
                settings.market_order,
            )
            .await?;

        Ok(render_market(&coins, settings))
    }

    async fn load_global(&self, settings: &DashboardSettings) -> Result<GlobalPanel, RequestError> {
        let stats = self.market.fetch_global(&settings.currency).await?;
        Ok(render_global(&stats))
    }

    async fn load_holdings(&self, settings: &DashboardSettings) -> Result<HoldingsPanel, RequestError> {
        let summary = self
            .reconciler
            .load(settings.holdings_mode, &settings.currency)
            .await?;
        Ok(render_holdings(&summary, settings))
    }

    /// Starts refreshing in the background while the screen is focused
    pub fn start_polling(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let dashboard = Arc::clone(self);

        tokio::spawn(async move {
            tracing::info!(
                refresh_interval_secs = interval.as_secs(),
                "Starting dashboard polling"
            );

            loop {
                sleep(interval).await;

                if !dashboard.is_focused() {
                    continue;
                }

                if let Err(e) = dashboard.refresh().await {
                    tracing::warn!(error = %e, "Dashboard refresh failed");
                }
            }
        })
    }

    /// Starts polling at the default interval
    pub fn start_default_polling(self: &Arc<Self>) -> JoinHandle<()> {
        self.start_polling(Duration::from_secs(REFRESH_INTERVAL_SECS))
    }

    /// Adds a coin to the watchlist by symbol
    pub async fn add_to_watchlist(&self, symbol: &str) -> Result<WatchlistAddOutcome, RequestError> {
        let symbol = symbol.trim().to_lowercase();
        if symbol.is_empty() {
            return Err(RequestError::validation("Please fill out the symbol field."));
        }

        match self.source.resolve_coin(CoinKey::Symbol, &symbol).await? {
            CoinLookup::Resolved { id, .. } => {
                let message = self.source.create_watchlist(&id, &symbol).await?;
                self.refresh_after_edit().await;
                Ok(WatchlistAddOutcome::Added { id, message })
            }
            CoinLookup::Matches(matches) => Ok(WatchlistAddOutcome::ChooseFrom(matches)),
        }
    }

    /// Completes an ambiguous add with the coin the user picked
    pub async fn choose_watchlist_match(&self, choice: &CoinMatch) -> Result<String, RequestError> {
        let message = self
            .source
            .create_watchlist(&choice.id, &choice.symbol)
            .await?;
        self.refresh_after_edit().await;
        Ok(message)
    }

    pub async fn remove_from_watchlist(&self, id: &str) -> Result<String, RequestError> {
        let message = self.source.delete_watchlist(id).await?;
        self.refresh_after_edit().await;
        Ok(message)
    }

    async fn refresh_after_edit(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "Dashboard refresh after watchlist edit failed");
        }
    }

    /// Latency and success metrics per panel
    pub async fn metrics(&self) -> Vec<RequestMetrics> {
        vec![
            self.metrics.market.get_metrics().await,
            self.metrics.global.get_metrics().await,
            self.metrics.holdings.get_metrics().await,
        ]
    }
}

/// Runs `fut`, recording its latency and outcome in `collector`
async fn timed<T, F>(collector: &MetricsCollector, fut: F) -> Result<T, RequestError>
where
    F: Future<Output = Result<T, RequestError>>,
{
    let start = Instant::now();
    let result = fut.await;
    collector.record_request(start.elapsed(), result.is_ok()).await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::keys;
    use crate::provider::mock::MockProvider;
    use crate::source::mock::MockSource;
    use crate::store::MemoryStore;
    use crate::types::{ActivityEvent, ActivityKind};

    struct Fixture {
        dashboard: Dashboard,
        source: Arc<MockSource>,
        pricing: Arc<MockProvider>,
    }

    fn fixture(entries: &[(&str, &str)]) -> Fixture {
        let store = Arc::new(MemoryStore::with_entries(entries.iter().copied()));
        let source = Arc::new(MockSource::new());
        let pricing = Arc::new(MockProvider::new());
        pricing.set_coin("bitcoin", "btc", 50_000.0, Some(1.0));
        pricing.set_coin("ethereum", "eth", 2_000.0, Some(-2.0));
        pricing.set_global(2.0e12, 1.5);

        let dashboard = Dashboard::new(store, source.clone(), pricing.clone());
        Fixture {
            dashboard,
            source,
            pricing,
        }
    }

    #[tokio::test]
    async fn test_refresh_builds_all_panels() {
        let fx = fixture(&[(keys::THEME, "Dark")]);
        fx.source.set_holding("bitcoin", "btc", 2.0);

        let outcome = fx.dashboard.refresh().await.unwrap();
        assert!(outcome.applied);
        assert!(outcome.failures.is_empty());

        let view = outcome.view;
        assert_eq!(view.theme, "Dark");
        assert!(view.refreshed_at.is_some());
        assert!(matches!(view.market, MarketPanel::Listing { ref rows, editable: false } if rows.len() == 2));
        assert_eq!(view.global.as_ref().unwrap().change, "(1.5%)");
        match &view.holdings {
            HoldingsPanel::Listing { rows, total_value } => {
                assert_eq!(rows.len(), 1);
                assert_eq!(total_value, "$100,000.00");
            }
            other => panic!("unexpected holdings panel: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_holdings_panel() {
        let fx = fixture(&[]);
        let outcome = fx.dashboard.refresh().await.unwrap();
        assert_eq!(outcome.view.holdings, HoldingsPanel::Empty);
    }

    #[tokio::test]
    async fn test_failed_panel_keeps_previous_contents() {
        let fx = fixture(&[]);
        fx.source.set_holding("bitcoin", "btc", 1.0);
        let first = fx.dashboard.refresh().await.unwrap();

        fx.source.set_failing(true);
        let second = fx.dashboard.refresh().await.unwrap();

        assert!(second.applied);
        assert_eq!(second.failures.len(), 1);
        assert!(matches!(second.failures[0], DashboardError::Holdings(RequestError::Timeout)));
        assert_eq!(second.view.holdings, first.view.holdings);
    }

    #[tokio::test]
    async fn test_pricing_outage_reports_every_panel() {
        let fx = fixture(&[]);
        fx.source.set_holding("bitcoin", "btc", 1.0);
        fx.pricing.set_failing(true);

        let outcome = fx.dashboard.refresh().await.unwrap();
        assert_eq!(outcome.failures.len(), 3);
        assert_eq!(outcome.view.market, MarketPanel::Loading);

        let metrics = fx.dashboard.metrics().await;
        assert!(metrics.iter().all(|m| m.failed_requests == 1));
    }

    #[tokio::test]
    async fn test_unfocused_refresh_is_dropped() {
        let fx = fixture(&[]);
        fx.dashboard.set_focused(false);

        let outcome = fx.dashboard.refresh().await.unwrap();
        assert!(!outcome.applied);
        assert_eq!(*outcome.view, DashboardView::default());
    }

    #[tokio::test]
    async fn test_out_of_order_result_is_discarded() {
        let fx = fixture(&[]);
        let market = MarketPanel::Listing {
            rows: Vec::new(),
            editable: true,
        };

        assert!(fx.dashboard.apply(2, "Light", Some(market.clone()), None, None).await);
        assert!(!fx.dashboard.apply(1, "Light", Some(MarketPanel::Loading), None, None).await);
        assert_eq!(fx.dashboard.view().market, market);
    }

    #[tokio::test]
    async fn test_watchlist_mode_lists_watchlist() {
        let fx = fixture(&[(keys::DASHBOARD_WATCHLIST, "enabled")]);
        fx.source.set_watch("ethereum", "eth");

        let outcome = fx.dashboard.refresh().await.unwrap();
        match &outcome.view.market {
            MarketPanel::Listing { rows, editable } => {
                assert!(*editable);
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].symbol, "ETH");
            }
            other => panic!("unexpected market panel: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mixed_mode_refresh() {
        let fx = fixture(&[(keys::TRANSACTIONS_AFFECT_HOLDINGS, "mixed")]);
        fx.source.set_holding("bitcoin", "btc", 1.0);
        fx.source
            .push_activity(ActivityEvent::new("1", "ethereum", "eth", ActivityKind::Buy, 5.0));

        let outcome = fx.dashboard.refresh().await.unwrap();
        match &outcome.view.holdings {
            HoldingsPanel::Listing { rows, total_value } => {
                let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
                assert_eq!(ids, vec!["ethereum", "bitcoin"]);
                assert_eq!(total_value, "$60,000.00");
            }
            other => panic!("unexpected holdings panel: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_add_to_watchlist_flows() {
        let fx = fixture(&[]);

        assert!(matches!(
            fx.dashboard.add_to_watchlist("  ").await,
            Err(RequestError::Validation(_))
        ));

        fx.source.set_lookup(CoinLookup::Resolved {
            id: "bitcoin".into(),
            symbol: "btc".into(),
        });
        let outcome = fx.dashboard.add_to_watchlist("BTC").await.unwrap();
        assert!(matches!(outcome, WatchlistAddOutcome::Added { ref id, .. } if id == "bitcoin"));
        assert!(fx.source.watchlist.lock().unwrap().contains_key("bitcoin"));

        let candidates = vec![
            CoinMatch {
                id: "uniswap".into(),
                symbol: "uni".into(),
            },
            CoinMatch {
                id: "unicorn-token".into(),
                symbol: "uni".into(),
            },
        ];
        fx.source.set_lookup(CoinLookup::Matches(candidates.clone()));
        let outcome = fx.dashboard.add_to_watchlist("uni").await.unwrap();
        assert_eq!(outcome, WatchlistAddOutcome::ChooseFrom(candidates.clone()));

        fx.dashboard.choose_watchlist_match(&candidates[1]).await.unwrap();
        fx.dashboard.remove_from_watchlist("bitcoin").await.unwrap();

        let watchlist = fx.source.watchlist.lock().unwrap().clone();
        assert_eq!(watchlist.keys().collect::<Vec<_>>(), vec!["unicorn-token"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_refreshes_only_while_focused() {
        let fx = fixture(&[]);
        let dashboard = Arc::new(fx.dashboard);
        dashboard.set_focused(false);

        let handle = dashboard.start_polling(Duration::from_secs(20));
        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(dashboard.view().refreshed_at, None);

        dashboard.set_focused(true);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(dashboard.view().refreshed_at.is_some());

        handle.abort();
    }
}
