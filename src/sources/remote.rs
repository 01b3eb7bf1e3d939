//! Remote backend data source

use crate::{
    constants::{IMPORT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS, USER_AGENT},
    error::RequestError,
    provider::MarketDataProvider,
    session::Session,
    source::{
        decode_records, lookup_from_matches, matching_coins, normalize_lookup_value, require,
        validate_amount, DataSource,
    },
    types::{
        ActivityEvent, CoinKey, CoinLookup, CoinMatch, HoldingMap, ImportRows, WatchlistMap,
    },
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Data source backed by the portfolio REST backend
pub struct RemoteSource {
    client: Client,
    session: Session,
    pricing: Arc<dyn MarketDataProvider>,
}

impl RemoteSource {
    /// Creates a remote source for an authenticated session
    pub fn new(session: Session, pricing: Arc<dyn MarketDataProvider>) -> Result<Self, RequestError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(RequestError::NetworkError)?;

        Ok(Self {
            client,
            session,
            pricing,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.session.api, path)
    }

    fn read_params(&self) -> [(&'static str, &str); 3] {
        [
            ("platform", "app"),
            ("token", self.session.token.as_str()),
            ("username", self.session.username.as_str()),
        ]
    }

    /// Builds a JSON body carrying the credentials plus `fields`
    fn body(&self, fields: Value) -> Value {
        let mut body = json!({
            "token": self.session.token,
            "username": self.session.username,
        });
        if let (Some(body), Value::Object(fields)) = (body.as_object_mut(), fields) {
            body.extend(fields);
        }
        body
    }

    async fn read_collection<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<BTreeMap<String, T>, RequestError> {
        let request = self.client.get(self.endpoint(path)).query(&self.read_params());
        let response = send(request, REQUEST_TIMEOUT_SECS).await?;
        decode_collection(check_error(response)?)
    }

    async fn mutate(&self, request: RequestBuilder, timeout_secs: u64) -> Result<String, RequestError> {
        let response = send(request, timeout_secs).await?;
        expect_message(check_error(response)?)
    }
}

/// Sends a request and decodes the JSON body within `timeout_secs`
pub(crate) async fn send(request: RequestBuilder, timeout_secs: u64) -> Result<Value, RequestError> {
    let exchange = async {
        let response = request
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(RequestError::from_transport)?;

        let status = response.status();
        let text = response.text().await.map_err(RequestError::from_transport)?;

        serde_json::from_str::<Value>(&text).map_err(|e| {
            RequestError::InvalidResponse(format!(
                "Failed to parse backend response (HTTP {}): {}. Response: {}",
                status, e, text
            ))
        })
    };

    tokio::time::timeout(Duration::from_secs(timeout_secs), exchange)
        .await
        .map_err(|_| RequestError::Timeout)?
}

/// Turns an `error` field into an ApiError
pub(crate) fn check_error(response: Value) -> Result<Value, RequestError> {
    match response.get("error") {
        Some(Value::String(message)) => Err(RequestError::api(message.clone())),
        Some(other) => Err(RequestError::api(other.to_string())),
        None => Ok(response),
    }
}

/// Extracts the confirmation message of a successful mutation
fn expect_message(response: Value) -> Result<String, RequestError> {
    match response.get("message") {
        Some(Value::String(message)) => Ok(message.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(RequestError::invalid_response(format!(
            "Missing confirmation message: {}",
            response
        ))),
    }
}

/// Decodes a keyed collection; the backend sends `[]` when it is empty
fn decode_collection<T: DeserializeOwned>(response: Value) -> Result<BTreeMap<String, T>, RequestError> {
    decode_records("collection", response)
        .map(|records| records.decoded)
        .map_err(|e| RequestError::invalid_response(format!("Malformed collection: {}", e)))
}

/// Decodes the backend's answer to a coin lookup
fn decode_lookup(response: Value, symbol: &str) -> Result<CoinLookup, RequestError> {
    if let Some(id) = response.get("id").and_then(Value::as_str) {
        let symbol = response
            .get("symbol")
            .and_then(Value::as_str)
            .unwrap_or(symbol)
            .to_lowercase();
        return Ok(CoinLookup::Resolved {
            id: id.to_string(),
            symbol,
        });
    }

    let Some(matches) = response.get("matches") else {
        return Err(RequestError::NotFound(format!("No coins found for {}.", symbol)));
    };

    // Each match is a single-entry object mapping symbol to id
    let entries: Vec<&Value> = match matches {
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().collect(),
        _ => Vec::new(),
    };

    let found: Vec<CoinMatch> = entries
        .into_iter()
        .filter_map(Value::as_object)
        .filter_map(|entry| entry.iter().next())
        .filter_map(|(symbol, id)| {
            id.as_str().map(|id| CoinMatch {
                id: id.to_string(),
                symbol: symbol.to_lowercase(),
            })
        })
        .collect();

    if found.is_empty() {
        Err(RequestError::NotFound(format!("No coins found for {}.", symbol)))
    } else {
        Ok(CoinLookup::Matches(found))
    }
}

#[async_trait]
impl DataSource for RemoteSource {
    async fn read_holdings(&self) -> Result<HoldingMap, RequestError> {
        let holdings = self.read_collection("holdings/read.php").await?;
        tracing::debug!(count = holdings.len(), "Read holdings from backend");
        Ok(holdings)
    }

    async fn read_activity(&self) -> Result<Vec<ActivityEvent>, RequestError> {
        let records: BTreeMap<String, ActivityEvent> =
            self.read_collection("activity/read.php").await?;

        let mut events: Vec<ActivityEvent> = records
            .into_iter()
            .map(|(tx_id, mut event)| {
                event.tx_id = tx_id;
                event
            })
            .collect();
        crate::activity::sort_chronologically(&mut events);

        tracing::debug!(count = events.len(), "Read activity from backend");
        Ok(events)
    }

    async fn read_watchlist(&self) -> Result<WatchlistMap, RequestError> {
        self.read_collection("watchlist/read.php").await
    }

    async fn create_watchlist(&self, id: &str, symbol: &str) -> Result<String, RequestError> {
        require("Coin ID", id)?;
        let request = self
            .client
            .post(self.endpoint("watchlist/create.php"))
            .json(&self.body(json!({ "id": id, "symbol": symbol })));
        self.mutate(request, REQUEST_TIMEOUT_SECS).await
    }

    async fn delete_watchlist(&self, id: &str) -> Result<String, RequestError> {
        require("Coin ID", id)?;
        let request = self
            .client
            .delete(self.endpoint("watchlist/delete.php"))
            .json(&self.body(json!({ "id": id })));
        self.mutate(request, REQUEST_TIMEOUT_SECS).await
    }

    async fn resolve_coin(&self, key: CoinKey, value: &str) -> Result<CoinLookup, RequestError> {
        let value = normalize_lookup_value(key, value);
        require("Coin", &value)?;

        // The backend is only asked once the pricing service knows the coin
        let results = self.pricing.search(&value).await?;
        let matches = matching_coins(&results, key, &value);
        if matches.is_empty() {
            return lookup_from_matches(&matches, &value);
        }

        let request = self
            .client
            .get(self.endpoint("coins/read.php"))
            .query(&[
                (key.as_str(), value.as_str()),
                ("token", self.session.token.as_str()),
                ("username", self.session.username.as_str()),
            ]);
        let response = check_error(send(request, REQUEST_TIMEOUT_SECS).await?)?;
        decode_lookup(response, &value)
    }

    async fn import_rows(&self, rows: &ImportRows) -> Result<String, RequestError> {
        let (path, rows_json) = match rows {
            ImportRows::Holdings(rows) => ("holdings/import.php", serde_json::to_value(rows)),
            ImportRows::Activity(rows) => ("activity/import.php", serde_json::to_value(rows)),
        };
        let rows_json = rows_json
            .map_err(|e| RequestError::invalid_response(format!("Unserializable rows: {}", e)))?;

        tracing::info!(kind = rows.kind(), count = rows.len(), "Importing rows to backend");

        let request = self
            .client
            .post(self.endpoint(path))
            .json(&self.body(json!({ "rows": rows_json })));
        self.mutate(request, IMPORT_TIMEOUT_SECS).await
    }

    async fn create_holding(
        &self,
        id: &str,
        symbol: &str,
        amount: f64,
    ) -> Result<String, RequestError> {
        require("Coin ID", id)?;
        validate_amount(amount)?;
        let request = self
            .client
            .post(self.endpoint("holdings/create.php"))
            .json(&self.body(json!({ "id": id, "symbol": symbol, "amount": amount })));
        self.mutate(request, REQUEST_TIMEOUT_SECS).await
    }

    async fn update_holding(&self, id: &str, amount: f64) -> Result<String, RequestError> {
        require("Coin ID", id)?;
        validate_amount(amount)?;
        let request = self
            .client
            .put(self.endpoint("holdings/update.php"))
            .json(&self.body(json!({ "id": id, "amount": amount })));
        self.mutate(request, REQUEST_TIMEOUT_SECS).await
    }

    fn source_name(&self) -> &'static str {
        "remote"
    }
}
