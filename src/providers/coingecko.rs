//! CoinGecko market data provider implementation

use crate::{
    constants::{
        COINGECKO_API_URL, COINGECKO_GLOBAL_ENDPOINT, COINGECKO_MARKETS_ENDPOINT,
        COINGECKO_SEARCH_ENDPOINT, REQUEST_TIMEOUT_SECS, USER_AGENT,
    },
    error::RequestError,
    provider::{MarketDataProvider, MarketQuery},
    types::{GlobalStats, MarketCoin, SearchCoin},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// CoinGecko API response for global statistics
#[derive(Debug, Deserialize)]
struct GlobalResponse {
    data: GlobalData,
}

#[derive(Debug, Deserialize)]
struct GlobalData {
    total_market_cap: HashMap<String, f64>,
    market_cap_change_percentage_24h_usd: f64,
}

/// CoinGecko API response for search queries
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    coins: Vec<SearchCoin>,
}

/// CoinGecko market data provider
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
}

impl CoinGeckoProvider {
    /// Creates a new CoinGecko provider
    pub fn new() -> Result<Self, RequestError> {
        Self::with_base_url(COINGECKO_API_URL)
    }

    /// Creates a provider against a different API root (proxies, tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, RequestError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(RequestError::NetworkError)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Builds the query parameters for a market listing
    fn market_params(currency: &str, query: &MarketQuery) -> Vec<(&'static str, String)> {
        let per_page = match query {
            MarketQuery::Top(n) => *n,
            MarketQuery::Ids { per_page, .. } => *per_page,
        };

        let mut params = vec![
            ("vs_currency", currency.to_lowercase()),
            ("order", "market_cap_desc".to_string()),
            ("per_page", per_page.to_string()),
            ("page", "1".to_string()),
            ("sparkline", "false".to_string()),
        ];

        if let MarketQuery::Ids { ids, .. } = query {
            params.push(("ids", ids.join(",")));
        }

        params
    }

    /// Extracts the statistics for `currency` from a global response
    fn parse_global(response: GlobalResponse, currency: &str) -> Result<GlobalStats, RequestError> {
        let currency = currency.to_lowercase();
        let market_cap = response
            .data
            .total_market_cap
            .get(&currency)
            .copied()
            .ok_or_else(|| {
                RequestError::invalid_response(format!(
                    "No total market cap for currency {}",
                    currency
                ))
            })?;

        Ok(GlobalStats {
            currency,
            market_cap,
            change_24h: response.data.market_cap_change_percentage_24h_usd,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, RequestError> {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!(url = %url, "Requesting CoinGecko");

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(RequestError::from_transport)?;

        // Check for rate limiting
        if response.status().as_u16() == 429 {
            return Err(RequestError::RateLimitExceeded);
        }

        // Check for other errors
        if !response.status().is_success() {
            return Err(RequestError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let response_text = response
            .text()
            .await
            .map_err(RequestError::from_transport)?;

        serde_json::from_str(&response_text).map_err(|e| {
            RequestError::InvalidResponse(format!(
                "Failed to parse CoinGecko response: {}. Response: {}",
                e, response_text
            ))
        })
    }
}

#[async_trait]
impl MarketDataProvider for CoinGeckoProvider {
    async fn fetch_markets(
        &self,
        currency: &str,
        query: &MarketQuery,
    ) -> Result<Vec<MarketCoin>, RequestError> {
        if let MarketQuery::Ids { ids, .. } = query {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
        }

        let params = Self::market_params(currency, query);
        let coins: Vec<MarketCoin> = self.get_json(COINGECKO_MARKETS_ENDPOINT, &params).await?;

        tracing::debug!(count = coins.len(), "Fetched market listing from CoinGecko");

        Ok(coins)
    }

    async fn fetch_global(&self, currency: &str) -> Result<GlobalStats, RequestError> {
        let response: GlobalResponse = self.get_json(COINGECKO_GLOBAL_ENDPOINT, &[]).await?;
        Self::parse_global(response, currency)
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchCoin>, RequestError> {
        let params = [("query", query.to_string())];
        let response: SearchResponse = self.get_json(COINGECKO_SEARCH_ENDPOINT, &params).await?;
        Ok(response.coins)
    }

    fn provider_name(&self) -> &'static str {
        "coingecko"
    }
}
