//! Offline ("NoAPI") data source backed by a JSON book in the key-value store

use crate::{
    constants::keys,
    error::{RequestError, StorageError},
    provider::MarketDataProvider,
    source::{
        decode_records, lookup_from_matches, matching_coins, normalize_lookup_value, require,
        validate_amount, DataSource,
    },
    store::KeyValueStore,
    types::{
        ActivityEvent, CoinKey, CoinLookup, HoldingEntry, HoldingMap, ImportRows, WatchlistEntry,
        WatchlistMap,
    },
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// The offline book persisted under the `NoAPI` key
///
/// Keys this SDK does not manage are carried through unchanged, and so are
/// records that could not be decoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NoApiBook {
    pub holdings: HoldingMap,
    /// Transactions keyed by transaction id
    pub activity: BTreeMap<String, ActivityEvent>,
    pub watchlist: WatchlistMap,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    unreadable: BTreeMap<String, Map<String, Value>>,
}

impl NoApiBook {
    /// Parses a stored book; missing or invalid JSON yields an empty book
    pub fn parse(data: Option<&str>) -> Self {
        Self::try_parse(data).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Offline data is not valid JSON, starting from an empty book");
            Self::default()
        })
    }

    /// Parses a stored book, failing only when the document itself is unreadable
    ///
    /// Missing or blank data is an empty book. Each collection may be an
    /// object, `[]` or `null`; records that do not decode are kept aside and
    /// written back untouched by `to_json`.
    pub fn try_parse(data: Option<&str>) -> Result<Self, serde_json::Error> {
        let Some(data) = data.filter(|d| !d.trim().is_empty()) else {
            return Ok(Self::default());
        };

        let mut fields = match serde_json::from_str::<Value>(data)? {
            Value::Object(fields) => fields,
            Value::Null => return Ok(Self::default()),
            Value::Array(items) if items.is_empty() => return Ok(Self::default()),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "expected an object, found {}",
                    other
                )))
            }
        };

        let mut book = Self::default();
        book.holdings = book.take_collection(&mut fields, "holdings")?;
        book.activity = book.take_collection(&mut fields, "activity")?;
        book.watchlist = book.take_collection(&mut fields, "watchlist")?;
        book.extra = fields;
        Ok(book)
    }

    fn take_collection<T: DeserializeOwned>(
        &mut self,
        fields: &mut Map<String, Value>,
        name: &str,
    ) -> Result<BTreeMap<String, T>, serde_json::Error> {
        let value = fields.remove(name).unwrap_or(Value::Null);
        let records = decode_records(name, value)
            .map_err(<serde_json::Error as serde::de::Error>::custom)?;
        if !records.unreadable.is_empty() {
            self.unreadable.insert(name.to_string(), records.unreadable);
        }
        Ok(records.decoded)
    }

    /// Number of records that could not be decoded
    pub fn unreadable_count(&self) -> usize {
        self.unreadable.values().map(Map::len).sum()
    }

    /// Serializes the book, restoring records that could not be decoded
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        for (name, records) in &self.unreadable {
            if let Some(Value::Object(collection)) = value.get_mut(name) {
                for (key, record) in records {
                    collection
                        .entry(key.clone())
                        .or_insert_with(|| record.clone());
                }
            }
        }
        serde_json::to_string(&value)
    }

    /// Activity with transaction ids filled in, in chronological order
    pub fn activity_log(&self) -> Vec<ActivityEvent> {
        let mut events: Vec<ActivityEvent> = self
            .activity
            .iter()
            .map(|(tx_id, event)| ActivityEvent {
                tx_id: tx_id.clone(),
                ..event.clone()
            })
            .collect();
        crate::activity::sort_chronologically(&mut events);
        events
    }

    pub fn create_holding(&mut self, id: &str, symbol: &str, amount: f64) -> Result<String, RequestError> {
        if self.holdings.contains_key(id) {
            return Err(RequestError::api("Asset already exists."));
        }
        self.holdings
            .insert(id.to_string(), HoldingEntry::new(symbol, amount));
        Ok("Asset created.".to_string())
    }

    pub fn update_holding(&mut self, id: &str, amount: f64) -> Result<String, RequestError> {
        let entry = self
            .holdings
            .get_mut(id)
            .ok_or_else(|| RequestError::api("Asset not found."))?;
        entry.amount = amount;
        Ok("Asset updated.".to_string())
    }

    pub fn create_watchlist(&mut self, id: &str, symbol: &str) -> Result<String, RequestError> {
        if self.watchlist.contains_key(id) {
            return Err(RequestError::api("Asset already in watchlist."));
        }
        self.watchlist.insert(
            id.to_string(),
            WatchlistEntry {
                symbol: symbol.to_string(),
            },
        );
        Ok("Asset added to watchlist.".to_string())
    }

    pub fn delete_watchlist(&mut self, id: &str) -> Result<String, RequestError> {
        if self.watchlist.remove(id).is_none() {
            return Err(RequestError::api("Asset not found in watchlist."));
        }
        Ok("Asset removed from watchlist.".to_string())
    }

    /// Imports rows; holdings are upserted, activity gets fresh transaction ids
    pub fn import(&mut self, rows: &ImportRows) -> Result<String, RequestError> {
        match rows {
            ImportRows::Holdings(rows) => {
                for row in rows {
                    require("Coin ID", &row.id)?;
                    validate_amount(row.amount)?;
                }
                for row in rows {
                    self.holdings
                        .insert(row.id.clone(), HoldingEntry::new(row.symbol.clone(), row.amount));
                }
                Ok("Holdings have been imported.".to_string())
            }
            ImportRows::Activity(rows) => {
                for row in rows {
                    require("Coin ID", &row.id)?;
                    validate_amount(row.amount)?;
                }
                for row in rows {
                    let tx_id = Uuid::new_v4().to_string();
                    let event = ActivityEvent {
                        tx_id: tx_id.clone(),
                        ..row.clone()
                    };
                    self.activity.insert(tx_id, event);
                }
                Ok("Activity has been imported.".to_string())
            }
        }
    }
}

/// Data source that keeps everything on the device
pub struct LocalSource {
    store: Arc<dyn KeyValueStore>,
    pricing: Arc<dyn MarketDataProvider>,
    // Serializes read-modify-write cycles on the stored book
    write_lock: Mutex<()>,
}

impl LocalSource {
    pub fn new(store: Arc<dyn KeyValueStore>, pricing: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            store,
            pricing,
            write_lock: Mutex::new(()),
        }
    }

    /// Loads the current book from the store
    pub async fn load_book(&self) -> Result<NoApiBook, RequestError> {
        let data = self.store.get(keys::NO_API_DATA).await?;
        Ok(NoApiBook::parse(data.as_deref()))
    }

    async fn save_book(&self, book: &NoApiBook) -> Result<(), RequestError> {
        let data = book.to_json().map_err(StorageError::from)?;
        self.store.set(keys::NO_API_DATA, &data).await?;
        Ok(())
    }

    /// Applies `op` to the stored book and persists it on success
    ///
    /// Refuses to write when stored data exists but cannot be parsed, so a
    /// corrupted book is never replaced by an empty one.
    async fn modify<F>(&self, op: F) -> Result<String, RequestError>
    where
        F: FnOnce(&mut NoApiBook) -> Result<String, RequestError> + Send,
    {
        let _guard = self.write_lock.lock().await;
        let data = self.store.get(keys::NO_API_DATA).await?;
        let mut book = NoApiBook::try_parse(data.as_deref()).map_err(|e| {
            tracing::error!(error = %e, "Offline data is unreadable, refusing to overwrite it");
            StorageError::Unreadable(e.to_string())
        })?;

        let message = op(&mut book)?;
        self.save_book(&book).await?;
        Ok(message)
    }
}

#[async_trait]
impl DataSource for LocalSource {
    async fn read_holdings(&self) -> Result<HoldingMap, RequestError> {
        Ok(self.load_book().await?.holdings)
    }

    async fn read_activity(&self) -> Result<Vec<ActivityEvent>, RequestError> {
        Ok(self.load_book().await?.activity_log())
    }

    async fn read_watchlist(&self) -> Result<WatchlistMap, RequestError> {
        Ok(self.load_book().await?.watchlist)
    }

    async fn create_watchlist(&self, id: &str, symbol: &str) -> Result<String, RequestError> {
        require("Coin ID", id)?;
        self.modify(|book| book.create_watchlist(id, symbol)).await
    }

    async fn delete_watchlist(&self, id: &str) -> Result<String, RequestError> {
        require("Coin ID", id)?;
        self.modify(|book| book.delete_watchlist(id)).await
    }

    async fn resolve_coin(&self, key: CoinKey, value: &str) -> Result<CoinLookup, RequestError> {
        let value = normalize_lookup_value(key, value);
        require("Coin", &value)?;

        let results = self.pricing.search(&value).await?;
        let matches = matching_coins(&results, key, &value);
        lookup_from_matches(&matches, &value)
    }

    async fn import_rows(&self, rows: &ImportRows) -> Result<String, RequestError> {
        tracing::info!(kind = rows.kind(), count = rows.len(), "Importing rows to offline book");
        self.modify(|book| book.import(rows)).await
    }

    async fn create_holding(
        &self,
        id: &str,
        symbol: &str,
        amount: f64,
    ) -> Result<String, RequestError> {
        require("Coin ID", id)?;
        validate_amount(amount)?;
        self.modify(|book| book.create_holding(id, symbol, amount)).await
    }

    async fn update_holding(&self, id: &str, amount: f64) -> Result<String, RequestError> {
        require("Coin ID", id)?;
        validate_amount(amount)?;
        self.modify(|book| book.update_holding(id, amount)).await
    }

    fn source_name(&self) -> &'static str {
        "local"
    }
}
