//! Holdings reconciliation
//!
//! Base holdings from a data source are combined with deltas folded from the
//! activity log according to a [`ReconciliationMode`], then priced in one
//! batched market lookup.
//!
//! ```text
//! DataSource::read_holdings ──┐
//!                             ├─ reconcile(mode) ─ price_holdings ─ HoldingsSummary
//! DataSource::read_activity ──┘   (fold_activity)
//! ```

use crate::{
    activity::fold_activity,
    constants::HOLDINGS_PAGE_SIZE,
    error::RequestError,
    provider::{MarketDataProvider, MarketQuery},
    source::DataSource,
    types::{DeltaMap, Holding, HoldingEntry, HoldingMap},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How activity affects the holdings shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationMode {
    /// Holdings are used as-is
    #[default]
    Disabled,
    /// Activity deltas are added on top of holdings
    Mixed,
    /// Holdings are replaced by positive activity deltas
    Override,
}

impl ReconciliationMode {
    /// Parses a persisted value, falling back to disabled
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "mixed" => ReconciliationMode::Mixed,
            "override" => ReconciliationMode::Override,
            _ => ReconciliationMode::Disabled,
        }
    }

    /// Whether this mode needs the activity log
    pub fn uses_activity(&self) -> bool {
        !matches!(self, ReconciliationMode::Disabled)
    }
}

/// Combines base holdings with activity deltas
///
/// - `Disabled` returns `base` unchanged.
/// - `Mixed` returns every id of `base` and `deltas` once, with
///   amount = base + delta (a missing side counts as zero).
/// - `Override` returns only the deltas with a positive amount.
pub fn reconcile(base: &HoldingMap, mode: ReconciliationMode, deltas: &DeltaMap) -> HoldingMap {
    match mode {
        ReconciliationMode::Disabled => base.clone(),
        ReconciliationMode::Mixed => {
            let mut merged = base.clone();
            for (id, delta) in deltas {
                merged
                    .entry(id.clone())
                    .or_insert_with(|| HoldingEntry::new(delta.symbol.clone(), 0.0))
                    .amount += delta.amount;
            }
            merged
        }
        ReconciliationMode::Override => deltas
            .iter()
            .filter(|(_, delta)| delta.amount > 0.0)
            .map(|(id, delta)| (id.clone(), HoldingEntry::new(delta.symbol.clone(), delta.amount)))
            .collect(),
    }
}

/// Priced holdings ready for display
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HoldingsSummary {
    /// Sorted by value, highest first
    pub holdings: Vec<Holding>,
    pub total_value: f64,
}

impl HoldingsSummary {
    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }
}

/// Prices reconciled holdings with a single batched market lookup
///
/// Amounts and values are clamped at zero. Coins the pricing service does
/// not return are left out. A failed lookup fails the whole call.
pub async fn price_holdings(
    pricing: &dyn MarketDataProvider,
    currency: &str,
    holdings: &HoldingMap,
) -> Result<HoldingsSummary, RequestError> {
    if holdings.is_empty() {
        return Ok(HoldingsSummary::default());
    }

    let query = MarketQuery::Ids {
        ids: holdings.keys().cloned().collect(),
        per_page: HOLDINGS_PAGE_SIZE,
    };
    let coins = pricing.fetch_markets(currency, &query).await?;

    let mut priced: Vec<Holding> = coins
        .into_iter()
        .filter_map(|coin| {
            let entry = holdings.get(&coin.id)?;
            let amount = entry.amount.max(0.0);
            Some(Holding {
                symbol: entry.symbol.to_uppercase(),
                amount,
                price: coin.current_price,
                value: (coin.current_price * amount).max(0.0),
                change: coin.price_change_percentage_24h,
                image: coin.image,
                id: coin.id,
            })
        })
        .collect();

    if priced.len() < holdings.len() {
        let missing: Vec<&String> = holdings
            .keys()
            .filter(|id| !priced.iter().any(|h| &h.id == *id))
            .collect();
        tracing::warn!(
            ?missing,
            currency,
            "No market data for some holdings, leaving them out"
        );
    }

    priced.sort_by(|a, b| b.value.total_cmp(&a.value));
    let total_value = priced.iter().map(|h| h.value).sum();

    Ok(HoldingsSummary {
        holdings: priced,
        total_value,
    })
}

/// Loads, reconciles and prices holdings for one refresh
pub struct HoldingsReconciler {
    source: Arc<dyn DataSource>,
    pricing: Arc<dyn MarketDataProvider>,
}

impl HoldingsReconciler {
    pub fn new(source: Arc<dyn DataSource>, pricing: Arc<dyn MarketDataProvider>) -> Self {
        Self { source, pricing }
    }

    /// Reconciled, unpriced holdings
    pub async fn reconciled(&self, mode: ReconciliationMode) -> Result<HoldingMap, RequestError> {
        let base = self.source.read_holdings().await?;
        if !mode.uses_activity() {
            return Ok(base);
        }

        let events = self.source.read_activity().await?;
        let deltas = fold_activity(&events);

        tracing::debug!(
            mode = ?mode,
            base = base.len(),
            deltas = deltas.len(),
            "Reconciling holdings with activity"
        );

        Ok(reconcile(&base, mode, &deltas))
    }

    /// Reconciled holdings priced in `currency`
    pub async fn load(&self, mode: ReconciliationMode, currency: &str) -> Result<HoldingsSummary, RequestError> {
        let holdings = self.reconciled(mode).await?;
        price_holdings(self.pricing.as_ref(), currency, &holdings).await
    }
}
