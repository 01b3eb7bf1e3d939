//! Display ordering for market and holdings tables
//!
//! All sorts are stable: rows with identical keys keep their relative order
//! in both directions.

use crate::types::{Holding, MarketCoin, RankedCoin};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    /// Parses a persisted value; anything other than "descending" sorts ascending
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("descending") {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

/// Market table sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarketSortKey {
    /// First character of the symbol
    Coin,
    Price,
    #[default]
    MarketCap,
    /// 24h price change
    Change,
}

impl MarketSortKey {
    /// Parses a persisted value, falling back to market cap
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "coin" => MarketSortKey::Coin,
            "price" => MarketSortKey::Price,
            "change" => MarketSortKey::Change,
            _ => MarketSortKey::MarketCap,
        }
    }

    fn compare(self, a: &MarketCoin, b: &MarketCoin) -> Ordering {
        match self {
            MarketSortKey::Coin => first_char(&a.symbol).cmp(&first_char(&b.symbol)),
            MarketSortKey::Price => a.current_price.total_cmp(&b.current_price),
            MarketSortKey::MarketCap => a.market_cap.total_cmp(&b.market_cap),
            MarketSortKey::Change => change_key(a.price_change_percentage_24h)
                .total_cmp(&change_key(b.price_change_percentage_24h)),
        }
    }
}

/// Holdings table sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HoldingsSortKey {
    /// First character of the symbol
    #[default]
    Coin,
    Amount,
    Value,
    /// 24h price change
    Change,
}

impl HoldingsSortKey {
    /// Parses a persisted value, falling back to coin
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "amount" => HoldingsSortKey::Amount,
            "value" => HoldingsSortKey::Value,
            "change" => HoldingsSortKey::Change,
            _ => HoldingsSortKey::Coin,
        }
    }

    fn compare(self, a: &Holding, b: &Holding) -> Ordering {
        match self {
            HoldingsSortKey::Coin => first_char(&a.symbol).cmp(&first_char(&b.symbol)),
            HoldingsSortKey::Amount => a.amount.total_cmp(&b.amount),
            HoldingsSortKey::Value => a.value.total_cmp(&b.value),
            HoldingsSortKey::Change => change_key(a.change).total_cmp(&change_key(b.change)),
        }
    }
}

/// Sorts coins and assigns 1-based ranks in display order
pub fn rank_coins(mut coins: Vec<MarketCoin>, key: MarketSortKey, order: SortOrder) -> Vec<RankedCoin> {
    coins.sort_by(|a, b| order.apply(key.compare(a, b)));
    coins
        .into_iter()
        .enumerate()
        .map(|(index, coin)| RankedCoin {
            rank: index + 1,
            coin,
        })
        .collect()
}

/// Sorts priced holdings in place
pub fn sort_holdings(holdings: &mut [Holding], key: HoldingsSortKey, order: SortOrder) {
    holdings.sort_by(|a, b| order.apply(key.compare(a, b)));
}

fn first_char(symbol: &str) -> Option<char> {
    symbol.chars().next().map(|c| c.to_ascii_lowercase())
}

// Missing changes sort below every known change.
fn change_key(change: Option<f64>) -> f64 {
    change.filter(|c| !c.is_nan()).unwrap_or(f64::NEG_INFINITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coin(id: &str, symbol: &str, price: f64, market_cap: f64, change: Option<f64>) -> MarketCoin {
        MarketCoin {
            id: id.to_string(),
            symbol: symbol.to_string(),
            name: id.to_string(),
            image: String::new(),
            current_price: price,
            market_cap,
            price_change_percentage_24h: change,
            market_cap_change_percentage_24h: None,
        }
    }

    fn holding(id: &str, symbol: &str, amount: f64, value: f64) -> Holding {
        Holding {
            id: id.to_string(),
            symbol: symbol.to_string(),
            amount,
            price: 0.0,
            value,
            change: None,
            image: String::new(),
        }
    }

    #[test]
    fn test_parse_defaults() {
        assert_eq!(SortOrder::parse("descending"), SortOrder::Descending);
        assert_eq!(SortOrder::parse("ascending"), SortOrder::Ascending);
        assert_eq!(SortOrder::parse("whatever"), SortOrder::Ascending);
        assert_eq!(MarketSortKey::parse("marketCap"), MarketSortKey::MarketCap);
        assert_eq!(MarketSortKey::parse(""), MarketSortKey::MarketCap);
        assert_eq!(HoldingsSortKey::parse("value"), HoldingsSortKey::Value);
        assert_eq!(HoldingsSortKey::parse("bogus"), HoldingsSortKey::Coin);
    }

    #[test]
    fn test_rank_by_market_cap_descending() {
        let coins = vec![
            coin("eth", "eth", 3000.0, 400.0, Some(1.0)),
            coin("btc", "btc", 60000.0, 1200.0, Some(-2.0)),
            coin("sol", "sol", 150.0, 70.0, None),
        ];

        let ranked = rank_coins(coins, MarketSortKey::MarketCap, SortOrder::Descending);
        let ids: Vec<_> = ranked.iter().map(|r| (r.rank, r.coin.id.as_str())).collect();
        assert_eq!(ids, vec![(1, "btc"), (2, "eth"), (3, "sol")]);
    }

    #[test]
    fn test_rank_by_change_puts_missing_last_when_descending() {
        let coins = vec![
            coin("sol", "sol", 150.0, 70.0, None),
            coin("btc", "btc", 60000.0, 1200.0, Some(-2.0)),
            coin("eth", "eth", 3000.0, 400.0, Some(1.0)),
        ];

        let ranked = rank_coins(coins, MarketSortKey::Change, SortOrder::Descending);
        let ids: Vec<_> = ranked.iter().map(|r| r.coin.id.as_str()).collect();
        assert_eq!(ids, vec!["eth", "btc", "sol"]);
    }

    #[test]
    fn test_coin_sort_is_stable_in_both_directions() {
        let coins = vec![
            coin("bitcoin", "btc", 1.0, 1.0, None),
            coin("ada", "ada", 1.0, 1.0, None),
            coin("bnb", "bnb", 1.0, 1.0, None),
            coin("bch", "bch", 1.0, 1.0, None),
        ];

        let asc = rank_coins(coins.clone(), MarketSortKey::Coin, SortOrder::Ascending);
        let ids: Vec<_> = asc.iter().map(|r| r.coin.id.as_str()).collect();
        assert_eq!(ids, vec!["ada", "bitcoin", "bnb", "bch"]);

        let desc = rank_coins(coins, MarketSortKey::Coin, SortOrder::Descending);
        let ids: Vec<_> = desc.iter().map(|r| r.coin.id.as_str()).collect();
        assert_eq!(ids, vec!["bitcoin", "bnb", "bch", "ada"]);
    }

    #[test]
    fn test_sort_holdings_by_amount_ascending() {
        let mut holdings = vec![
            holding("btc", "BTC", 2.0, 10.0),
            holding("eth", "ETH", 0.5, 20.0),
            holding("sol", "SOL", 2.0, 5.0),
        ];

        sort_holdings(&mut holdings, HoldingsSortKey::Amount, SortOrder::Ascending);
        let ids: Vec<_> = holdings.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["eth", "btc", "sol"]);
    }
}
