//! User preferences for the dashboard, loaded once per refresh cycle

use crate::{
    constants::{keys, DEFAULT_CURRENCY, DEFAULT_THEME},
    error::StorageError,
    reconcile::ReconciliationMode,
    sorting::{HoldingsSortKey, MarketSortKey, SortOrder},
    store::KeyValueStore,
};
use serde::{Deserialize, Serialize};

/// Snapshot of every persisted dashboard preference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSettings {
    /// Lower-cased currency code
    pub currency: String,
    /// List the watchlist instead of the top coins
    pub watchlist_on_dashboard: bool,
    /// Show market cap / value and 24h change columns
    pub additional_columns: bool,
    /// Color rows by the direction of their 24h change
    pub highlight_price_change: bool,
    pub holdings_mode: ReconciliationMode,
    pub market_sort: MarketSortKey,
    pub market_order: SortOrder,
    pub holdings_sort: HoldingsSortKey,
    pub holdings_order: SortOrder,
    pub theme: String,
    pub offline_mode: bool,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            currency: DEFAULT_CURRENCY.to_string(),
            watchlist_on_dashboard: false,
            additional_columns: false,
            highlight_price_change: false,
            holdings_mode: ReconciliationMode::Disabled,
            market_sort: MarketSortKey::MarketCap,
            market_order: SortOrder::Descending,
            holdings_sort: HoldingsSortKey::Coin,
            holdings_order: SortOrder::Descending,
            theme: DEFAULT_THEME.to_string(),
            offline_mode: false,
        }
    }
}

impl DashboardSettings {
    /// Reads every preference from `store`, defaulting missing or blank values
    pub async fn load(store: &dyn KeyValueStore) -> Result<Self, StorageError> {
        let defaults = Self::default();

        let currency = store
            .get_non_empty(keys::CURRENCY)
            .await?
            .map(|c| c.trim().to_lowercase())
            .unwrap_or(defaults.currency);

        let settings = Self {
            currency,
            watchlist_on_dashboard: enabled(store, keys::DASHBOARD_WATCHLIST).await?,
            additional_columns: enabled(store, keys::ADDITIONAL_COLUMNS).await?,
            highlight_price_change: enabled(store, keys::HIGHLIGHT_PRICE_CHANGE).await?,
            holdings_mode: store
                .get_non_empty(keys::TRANSACTIONS_AFFECT_HOLDINGS)
                .await?
                .map(|v| ReconciliationMode::parse(&v))
                .unwrap_or(defaults.holdings_mode),
            market_sort: store
                .get_non_empty(keys::MARKET_SORTING)
                .await?
                .map(|v| MarketSortKey::parse(&v))
                .unwrap_or(defaults.market_sort),
            market_order: store
                .get_non_empty(keys::MARKET_SORT_ORDER)
                .await?
                .map(|v| SortOrder::parse(&v))
                .unwrap_or(defaults.market_order),
            holdings_sort: store
                .get_non_empty(keys::HOLDINGS_SORTING)
                .await?
                .map(|v| HoldingsSortKey::parse(&v))
                .unwrap_or(defaults.holdings_sort),
            holdings_order: store
                .get_non_empty(keys::HOLDINGS_SORT_ORDER)
                .await?
                .map(|v| SortOrder::parse(&v))
                .unwrap_or(defaults.holdings_order),
            theme: store
                .get_non_empty(keys::THEME)
                .await?
                .unwrap_or(defaults.theme),
            offline_mode: store.get_non_empty(keys::NO_API_MODE).await?.is_some(),
        };

        Ok(settings)
    }
}

/// Toggles are stored as "enabled" / "disabled"
async fn enabled(store: &dyn KeyValueStore, key: &str) -> Result<bool, StorageError> {
    Ok(store
        .get_non_empty(key)
        .await?
        .is_some_and(|v| v.trim() == "enabled"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_defaults_for_empty_store() {
        let settings = DashboardSettings::load(&MemoryStore::new()).await.unwrap();
        assert_eq!(settings, DashboardSettings::default());
    }

    #[tokio::test]
    async fn test_load_all_keys() {
        let store = MemoryStore::with_entries([
            (keys::CURRENCY, "EUR"),
            (keys::DASHBOARD_WATCHLIST, "enabled"),
            (keys::ADDITIONAL_COLUMNS, "enabled"),
            (keys::HIGHLIGHT_PRICE_CHANGE, "disabled"),
            (keys::TRANSACTIONS_AFFECT_HOLDINGS, "mixed"),
            (keys::MARKET_SORTING, "price"),
            (keys::MARKET_SORT_ORDER, "ascending"),
            (keys::HOLDINGS_SORTING, "value"),
            (keys::HOLDINGS_SORT_ORDER, "descending"),
            (keys::THEME, "Dark"),
            (keys::NO_API_MODE, "enabled"),
        ]);

        let settings = DashboardSettings::load(&store).await.unwrap();
        assert_eq!(settings.currency, "eur");
        assert!(settings.watchlist_on_dashboard);
        assert!(settings.additional_columns);
        assert!(!settings.highlight_price_change);
        assert_eq!(settings.holdings_mode, ReconciliationMode::Mixed);
        assert_eq!(settings.market_sort, MarketSortKey::Price);
        assert_eq!(settings.market_order, SortOrder::Ascending);
        assert_eq!(settings.holdings_sort, HoldingsSortKey::Value);
        assert_eq!(settings.holdings_order, SortOrder::Descending);
        assert_eq!(settings.theme, "Dark");
        assert!(settings.offline_mode);
    }
}
