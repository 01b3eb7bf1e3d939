//! Market listings and global statistics for the dashboard

use crate::{
    constants::{MARKET_TOP_COINS, WATCHLIST_PAGE_SIZE},
    error::RequestError,
    provider::{MarketDataProvider, MarketQuery},
    sorting::{rank_coins, MarketSortKey, SortOrder},
    types::{GlobalStats, RankedCoin, WatchlistMap},
};
use std::sync::Arc;

/// Fetches and ranks market listings
pub struct MarketFetcher {
    pricing: Arc<dyn MarketDataProvider>,
}

impl MarketFetcher {
    pub fn new(pricing: Arc<dyn MarketDataProvider>) -> Self {
        Self { pricing }
    }

    /// Lists the top coins, or exactly the watchlist members when given
    ///
    /// An empty watchlist yields an empty listing without a request.
    pub async fn fetch(
        &self,
        currency: &str,
        watchlist: Option<&WatchlistMap>,
        key: MarketSortKey,
        order: SortOrder,
    ) -> Result<Vec<RankedCoin>, RequestError> {
        let query = match watchlist {
            Some(watchlist) if watchlist.is_empty() => return Ok(Vec::new()),
            Some(watchlist) => MarketQuery::Ids {
                ids: watchlist.keys().cloned().collect(),
                per_page: WATCHLIST_PAGE_SIZE,
            },
            None => MarketQuery::Top(MARKET_TOP_COINS),
        };

        let coins = self.pricing.fetch_markets(currency, &query).await?;

        tracing::debug!(
            count = coins.len(),
            provider = self.pricing.provider_name(),
            watchlist = watchlist.is_some(),
            "Fetched market listing"
        );

        Ok(rank_coins(coins, key, order))
    }

    /// Total market cap in `currency` and its 24h change
    pub async fn fetch_global(&self, currency: &str) -> Result<GlobalStats, RequestError> {
        self.pricing.fetch_global(currency).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockProvider;
    use crate::types::WatchlistEntry;

    fn fetcher() -> (MarketFetcher, Arc<MockProvider>) {
        let pricing = Arc::new(MockProvider::new());
        pricing.set_coin("bitcoin", "btc", 60_000.0, Some(1.0));
        pricing.set_coin("ethereum", "eth", 3_000.0, Some(4.0));
        pricing.set_coin("solana", "sol", 150.0, Some(-3.0));
        (MarketFetcher::new(pricing.clone()), pricing)
    }

    #[tokio::test]
    async fn test_top_listing_ranked_by_market_cap() {
        let (fetcher, pricing) = fetcher();

        let ranked = fetcher
            .fetch("usd", None, MarketSortKey::MarketCap, SortOrder::Descending)
            .await
            .unwrap();

        let ids: Vec<_> = ranked.iter().map(|r| (r.rank, r.coin.id.as_str())).collect();
        assert_eq!(ids, vec![(1, "bitcoin"), (2, "ethereum"), (3, "solana")]);
        assert_eq!(pricing.queries(), vec![MarketQuery::Top(MARKET_TOP_COINS)]);
    }

    #[tokio::test]
    async fn test_watchlist_listing() {
        let (fetcher, pricing) = fetcher();
        let mut watchlist = WatchlistMap::new();
        watchlist.insert("solana".into(), WatchlistEntry { symbol: "sol".into() });
        watchlist.insert("ethereum".into(), WatchlistEntry { symbol: "eth".into() });

        let ranked = fetcher
            .fetch("usd", Some(&watchlist), MarketSortKey::Change, SortOrder::Ascending)
            .await
            .unwrap();

        let ids: Vec<_> = ranked.iter().map(|r| r.coin.id.as_str()).collect();
        assert_eq!(ids, vec!["solana", "ethereum"]);
        assert!(matches!(
            pricing.queries().as_slice(),
            [MarketQuery::Ids { per_page: WATCHLIST_PAGE_SIZE, .. }]
        ));
    }

    #[tokio::test]
    async fn test_empty_watchlist_skips_request() {
        let (fetcher, pricing) = fetcher();
        let ranked = fetcher
            .fetch("usd", Some(&WatchlistMap::new()), MarketSortKey::Price, SortOrder::Descending)
            .await
            .unwrap();

        assert!(ranked.is_empty());
        assert!(pricing.queries().is_empty());
    }

    #[tokio::test]
    async fn test_global_stats() {
        let (fetcher, pricing) = fetcher();
        pricing.set_global(2.5e12, -0.8);

        let stats = fetcher.fetch_global("eur").await.unwrap();
        assert_eq!(stats.currency, "eur");
        assert_eq!(stats.change_24h, -0.8);
    }
}
