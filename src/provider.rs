//! Provider abstraction for the public pricing service

use crate::{
    error::RequestError,
    types::{GlobalStats, MarketCoin, SearchCoin},
};
use async_trait::async_trait;

/// Which coins a market listing should contain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketQuery {
    /// The top `n` coins by market cap
    Top(usize),
    /// Exactly these coin ids, in pages of `per_page`
    Ids { ids: Vec<String>, per_page: usize },
}

/// Trait for market data providers
///
/// Every call is a single batched request; implementations never fan out
/// per coin.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetches market listings priced in `currency`
    async fn fetch_markets(
        &self,
        currency: &str,
        query: &MarketQuery,
    ) -> Result<Vec<MarketCoin>, RequestError>;

    /// Fetches aggregate market statistics for `currency`
    async fn fetch_global(&self, currency: &str) -> Result<GlobalStats, RequestError>;

    /// Searches coins by free-text query
    async fn search(&self, query: &str) -> Result<Vec<SearchCoin>, RequestError>;

    /// Returns the name of this provider
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock provider for testing
    #[derive(Default)]
    pub struct MockProvider {
        coins: Arc<Mutex<Vec<MarketCoin>>>,
        search_results: Arc<Mutex<Vec<SearchCoin>>>,
        global: Arc<Mutex<Option<GlobalStats>>>,
        failing: Arc<Mutex<bool>>,
        queries: Arc<Mutex<Vec<MarketQuery>>>,
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_coin(&self, id: &str, symbol: &str, price: f64, change: Option<f64>) {
            let coin = MarketCoin {
                id: id.to_string(),
                symbol: symbol.to_lowercase(),
                name: id.to_string(),
                image: format!("https://img.example/{}.png", id),
                current_price: price,
                market_cap: price * 1_000.0,
                price_change_percentage_24h: change,
                market_cap_change_percentage_24h: change,
            };
            let mut coins = self.coins.lock().unwrap();
            coins.retain(|c| c.id != id);
            coins.push(coin);
        }

        pub fn set_search_results(&self, results: &[(&str, &str)]) {
            *self.search_results.lock().unwrap() = results
                .iter()
                .map(|(id, symbol)| SearchCoin {
                    id: id.to_string(),
                    symbol: symbol.to_string(),
                    name: id.to_string(),
                })
                .collect();
        }

        pub fn set_global(&self, market_cap: f64, change_24h: f64) {
            *self.global.lock().unwrap() = Some(GlobalStats {
                currency: "usd".to_string(),
                market_cap,
                change_24h,
            });
        }

        pub fn set_failing(&self, failing: bool) {
            *self.failing.lock().unwrap() = failing;
        }

        /// Market queries received so far
        pub fn queries(&self) -> Vec<MarketQuery> {
            self.queries.lock().unwrap().clone()
        }

        fn check(&self) -> Result<(), RequestError> {
            if *self.failing.lock().unwrap() {
                Err(RequestError::RateLimitExceeded)
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl MarketDataProvider for MockProvider {
        async fn fetch_markets(
            &self,
            _currency: &str,
            query: &MarketQuery,
        ) -> Result<Vec<MarketCoin>, RequestError> {
            self.queries.lock().unwrap().push(query.clone());
            self.check()?;
            let coins = self.coins.lock().unwrap();
            Ok(match query {
                MarketQuery::Top(n) => coins.iter().take(*n).cloned().collect(),
                MarketQuery::Ids { ids, .. } => coins
                    .iter()
                    .filter(|c| ids.contains(&c.id))
                    .cloned()
                    .collect(),
            })
        }

        async fn fetch_global(&self, currency: &str) -> Result<GlobalStats, RequestError> {
            self.check()?;
            self.global
                .lock()
                .unwrap()
                .clone()
                .map(|g| GlobalStats {
                    currency: currency.to_string(),
                    ..g
                })
                .ok_or_else(|| RequestError::invalid_response("no global data"))
        }

        async fn search(&self, _query: &str) -> Result<Vec<SearchCoin>, RequestError> {
            self.check()?;
            Ok(self.search_results.lock().unwrap().clone())
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }
    }
}
