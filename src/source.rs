//! Data source abstraction over the remote backend and the offline book

use crate::{
    error::RequestError,
    types::{
        ActivityEvent, CoinKey, CoinLookup, CoinMatch, HoldingMap, ImportRows, SearchCoin,
        WatchlistMap,
    },
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Uniform read/write access to a user's portfolio data
///
/// Both implementations return structurally identical values so callers
/// never branch on the backend in use.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Reads base holdings keyed by coin id
    async fn read_holdings(&self) -> Result<HoldingMap, RequestError>;

    /// Reads the activity log in chronological order
    async fn read_activity(&self) -> Result<Vec<ActivityEvent>, RequestError>;

    /// Reads the watchlist keyed by coin id
    async fn read_watchlist(&self) -> Result<WatchlistMap, RequestError>;

    /// Adds a coin to the watchlist, returning the confirmation message
    async fn create_watchlist(&self, id: &str, symbol: &str) -> Result<String, RequestError>;

    /// Removes a coin from the watchlist, returning the confirmation message
    async fn delete_watchlist(&self, id: &str) -> Result<String, RequestError>;

    /// Resolves a coin by symbol or id
    async fn resolve_coin(&self, key: CoinKey, value: &str) -> Result<CoinLookup, RequestError>;

    /// Imports holdings or activity rows, returning the confirmation message
    async fn import_rows(&self, rows: &ImportRows) -> Result<String, RequestError>;

    /// Creates a holding, returning the confirmation message
    async fn create_holding(
        &self,
        id: &str,
        symbol: &str,
        amount: f64,
    ) -> Result<String, RequestError>;

    /// Updates a holding's amount, returning the confirmation message
    async fn update_holding(&self, id: &str, amount: f64) -> Result<String, RequestError>;

    /// Returns the name of this source
    fn source_name(&self) -> &'static str;
}

/// A keyed collection split into decoded records and records kept raw
#[derive(Debug)]
pub(crate) struct Records<T> {
    pub decoded: BTreeMap<String, T>,
    pub unreadable: Map<String, Value>,
}

/// Decodes a keyed collection record by record
///
/// `null` and `[]` are empty collections. Arrays are keyed by index. A record
/// that does not decode is logged and kept raw in `unreadable`; anything
/// other than an object, array or null is rejected.
pub(crate) fn decode_records<T: DeserializeOwned>(
    collection: &str,
    value: Value,
) -> Result<Records<T>, String> {
    let entries: Vec<(String, Value)> = match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, item)| !item.is_null())
            .map(|(index, item)| (index.to_string(), item))
            .collect(),
        Value::Object(map) => map.into_iter().collect(),
        other => return Err(format!("{} is not a collection: {}", collection, other)),
    };

    let mut records = Records {
        decoded: BTreeMap::new(),
        unreadable: Map::new(),
    };
    for (key, item) in entries {
        match serde_json::from_value::<T>(item.clone()) {
            Ok(record) => {
                records.decoded.insert(key, record);
            }
            Err(e) => {
                tracing::warn!(collection, key = %key, error = %e, "Skipping unreadable record");
                records.unreadable.insert(key, item);
            }
        }
    }
    Ok(records)
}

/// Rejects blank identifiers
pub(crate) fn require(field: &str, value: &str) -> Result<(), RequestError> {
    if value.trim().is_empty() {
        return Err(RequestError::validation(format!("{} must not be empty.", field)));
    }
    Ok(())
}

/// Rejects negative or non-finite amounts
pub(crate) fn validate_amount(amount: f64) -> Result<(), RequestError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(RequestError::validation(
            "Amount must be a non-negative number.",
        ));
    }
    Ok(())
}

/// Normalizes user input for a coin lookup
pub(crate) fn normalize_lookup_value(key: CoinKey, value: &str) -> String {
    match key {
        CoinKey::Symbol => value.trim().to_lowercase(),
        CoinKey::Id => value.trim().to_string(),
    }
}

/// Search results that match `value` on `key`
pub(crate) fn matching_coins<'a>(
    results: &'a [SearchCoin],
    key: CoinKey,
    value: &str,
) -> Vec<&'a SearchCoin> {
    results
        .iter()
        .filter(|coin| match key {
            CoinKey::Symbol => coin.symbol.trim().to_lowercase() == value,
            CoinKey::Id => coin.id == value,
        })
        .collect()
}

/// Builds a lookup from matching search results
pub(crate) fn lookup_from_matches(matches: &[&SearchCoin], value: &str) -> Result<CoinLookup, RequestError> {
    match matches {
        [] => Err(RequestError::NotFound(format!("No coins found for {}.", value))),
        [coin] => Ok(CoinLookup::Resolved {
            id: coin.id.clone(),
            symbol: coin.symbol.trim().to_lowercase(),
        }),
        many => Ok(CoinLookup::Matches(
            many.iter()
                .map(|coin| CoinMatch {
                    id: coin.id.clone(),
                    symbol: coin.symbol.trim().to_lowercase(),
                })
                .collect(),
        )),
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::types::{HoldingEntry, WatchlistEntry};
    use std::sync::{Arc, Mutex};

    /// In-memory data source for testing
    #[derive(Default)]
    pub struct MockSource {
        pub holdings: Arc<Mutex<HoldingMap>>,
        pub activity: Arc<Mutex<Vec<ActivityEvent>>>,
        pub watchlist: Arc<Mutex<WatchlistMap>>,
        pub lookup: Arc<Mutex<Option<CoinLookup>>>,
        failing: Arc<Mutex<bool>>,
        activity_reads: Arc<Mutex<usize>>,
    }

    impl MockSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_holding(&self, id: &str, symbol: &str, amount: f64) {
            self.holdings
                .lock()
                .unwrap()
                .insert(id.to_string(), HoldingEntry::new(symbol, amount));
        }

        pub fn push_activity(&self, event: ActivityEvent) {
            self.activity.lock().unwrap().push(event);
        }

        pub fn set_watch(&self, id: &str, symbol: &str) {
            self.watchlist.lock().unwrap().insert(
                id.to_string(),
                WatchlistEntry {
                    symbol: symbol.to_string(),
                },
            );
        }

        pub fn set_lookup(&self, lookup: CoinLookup) {
            *self.lookup.lock().unwrap() = Some(lookup);
        }

        pub fn set_failing(&self, failing: bool) {
            *self.failing.lock().unwrap() = failing;
        }

        pub fn activity_reads(&self) -> usize {
            *self.activity_reads.lock().unwrap()
        }

        fn check(&self) -> Result<(), RequestError> {
            if *self.failing.lock().unwrap() {
                Err(RequestError::Timeout)
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl DataSource for MockSource {
        async fn read_holdings(&self) -> Result<HoldingMap, RequestError> {
            self.check()?;
            Ok(self.holdings.lock().unwrap().clone())
        }

        async fn read_activity(&self) -> Result<Vec<ActivityEvent>, RequestError> {
            self.check()?;
            *self.activity_reads.lock().unwrap() += 1;
            Ok(self.activity.lock().unwrap().clone())
        }

        async fn read_watchlist(&self) -> Result<WatchlistMap, RequestError> {
            self.check()?;
            Ok(self.watchlist.lock().unwrap().clone())
        }

        async fn create_watchlist(&self, id: &str, symbol: &str) -> Result<String, RequestError> {
            self.check()?;
            self.set_watch(id, symbol);
            Ok("Asset added to watchlist.".to_string())
        }

        async fn delete_watchlist(&self, id: &str) -> Result<String, RequestError> {
            self.check()?;
            self.watchlist.lock().unwrap().remove(id);
            Ok("Asset removed from watchlist.".to_string())
        }

        async fn resolve_coin(&self, _key: CoinKey, value: &str) -> Result<CoinLookup, RequestError> {
            self.check()?;
            self.lookup
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| RequestError::NotFound(value.to_string()))
        }

        async fn import_rows(&self, rows: &ImportRows) -> Result<String, RequestError> {
            self.check()?;
            Ok(format!("Imported {} {} rows.", rows.len(), rows.kind()))
        }

        async fn create_holding(
            &self,
            id: &str,
            symbol: &str,
            amount: f64,
        ) -> Result<String, RequestError> {
            self.check()?;
            self.set_holding(id, symbol, amount);
            Ok("Asset created.".to_string())
        }

        async fn update_holding(&self, id: &str, amount: f64) -> Result<String, RequestError> {
            self.check()?;
            let mut holdings = self.holdings.lock().unwrap();
            let entry = holdings
                .get_mut(id)
                .ok_or_else(|| RequestError::api("Asset not found."))?;
            entry.amount = amount;
            Ok("Asset updated.".to_string())
        }

        fn source_name(&self) -> &'static str {
            "mock"
        }
    }
}
