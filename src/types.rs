//! Types shared by the data sources, the pricing provider and the dashboard

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Base holdings keyed by coin id
pub type HoldingMap = BTreeMap<String, HoldingEntry>;

/// Activity-derived deltas keyed by coin id
pub type DeltaMap = BTreeMap<String, ActivityDelta>;

/// Watchlist keyed by coin id
pub type WatchlistMap = BTreeMap<String, WatchlistEntry>;

/// A market listing entry from the pricing service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCoin {
    /// Pricing service identifier (e.g. "bitcoin")
    pub id: String,
    /// Ticker symbol as returned by the service (usually lower case)
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub current_price: f64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub market_cap: f64,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub market_cap_change_percentage_24h: Option<f64>,
}

/// A coin ranked for display
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCoin {
    /// 1-based position after sorting
    pub rank: usize,
    pub coin: MarketCoin,
}

/// Aggregate market statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub currency: String,
    /// Total market cap in `currency`
    pub market_cap: f64,
    /// 24h market cap change percentage
    pub change_24h: f64,
}

/// A coin returned by the pricing service search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCoin {
    pub id: String,
    pub symbol: String,
    #[serde(default)]
    pub name: String,
}

/// A base holding record as stored by a data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingEntry {
    pub symbol: String,
    #[serde(deserialize_with = "flexible_f64")]
    pub amount: f64,
}

impl HoldingEntry {
    pub fn new(symbol: impl Into<String>, amount: f64) -> Self {
        Self {
            symbol: symbol.into(),
            amount,
        }
    }
}

/// Kind of an activity transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Buy,
    Sell,
    Transfer,
    /// Any kind this SDK does not interpret; never changes an amount
    #[serde(other)]
    Other,
}

/// A logged transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Transaction id; filled from the record key when reading a book
    #[serde(rename = "txID", default)]
    pub tx_id: String,
    /// Coin id
    pub id: String,
    pub symbol: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(deserialize_with = "flexible_f64")]
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(
        default,
        deserialize_with = "flexible_f64_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub fee: Option<f64>,
    #[serde(
        default,
        deserialize_with = "flexible_f64_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl ActivityEvent {
    /// Creates a bare event with no optional details
    pub fn new(
        tx_id: impl Into<String>,
        id: impl Into<String>,
        symbol: impl Into<String>,
        kind: ActivityKind,
        amount: f64,
    ) -> Self {
        Self {
            tx_id: tx_id.into(),
            id: id.into(),
            symbol: symbol.into(),
            kind,
            amount,
            date: None,
            fee: None,
            price: None,
            notes: None,
            exchange: None,
            pair: None,
            from: None,
            to: None,
        }
    }

    /// Sets the transaction date
    pub fn on(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }
}

/// Net amount accumulated from activity for one coin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDelta {
    pub symbol: String,
    pub amount: f64,
}

/// A watchlist entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub symbol: String,
}

/// A fully priced holding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub id: String,
    /// Upper-cased symbol
    pub symbol: String,
    pub amount: f64,
    pub price: f64,
    /// `price * amount`, never negative
    pub value: f64,
    /// 24h price change percentage, `None` when the service has none
    pub change: Option<f64>,
    pub image: String,
}

/// Field used to resolve a coin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoinKey {
    Symbol,
    Id,
}

impl CoinKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoinKey::Symbol => "symbol",
            CoinKey::Id => "id",
        }
    }
}

/// A candidate coin for an ambiguous symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinMatch {
    pub id: String,
    pub symbol: String,
}

/// Outcome of resolving a coin symbol or id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoinLookup {
    /// Exactly one coin matched
    Resolved { id: String, symbol: String },
    /// Several coins share the symbol; the user has to pick one
    Matches(Vec<CoinMatch>),
}

/// A holdings row to import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingRow {
    pub id: String,
    pub symbol: String,
    #[serde(deserialize_with = "flexible_f64")]
    pub amount: f64,
}

/// Rows to import, tagged by what they import into
#[derive(Debug, Clone, PartialEq)]
pub enum ImportRows {
    Holdings(Vec<HoldingRow>),
    Activity(Vec<ActivityEvent>),
}

impl ImportRows {
    /// Name of the imported collection
    pub fn kind(&self) -> &'static str {
        match self {
            ImportRows::Holdings(_) => "holdings",
            ImportRows::Activity(_) => "activity",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ImportRows::Holdings(rows) => rows.len(),
            ImportRows::Activity(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Numbers stored by the backend may arrive as JSON numbers or strings
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

impl NumberOrString {
    fn into_f64<E: serde::de::Error>(self) -> Result<f64, E> {
        match self {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| E::custom(format!("invalid number: {:?}", s))),
        }
    }
}

fn flexible_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    NumberOrString::deserialize(deserializer)?.into_f64()
}

fn flexible_f64_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::String(s)) if s.trim().is_empty() => Ok(None),
        Some(value) => value.into_f64().map(Some),
    }
}

fn zero_if_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}
