//! View-model for the dashboard screen
//!
//! Everything a renderer needs is precomputed here from the fetched data and
//! the settings snapshot of the same refresh; no widget code lives in this
//! crate.

use crate::{
    constants::currency_symbol,
    reconcile::HoldingsSummary,
    settings::DashboardSettings,
    sorting::sort_holdings,
    types::{GlobalStats, RankedCoin},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a 24h change, used to color rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Highlight {
    Positive,
    None,
    Negative,
}

impl Highlight {
    pub fn from_change(change: Option<f64>) -> Self {
        match change {
            Some(c) if c > 0.0 => Highlight::Positive,
            Some(c) if c == 0.0 => Highlight::None,
            _ => Highlight::Negative,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRow {
    pub rank: usize,
    pub id: String,
    /// Upper-cased symbol
    pub symbol: String,
    pub image: String,
    pub price: String,
    /// Present when additional columns are enabled
    pub market_cap: Option<String>,
    /// Present when additional columns are enabled
    pub change: Option<String>,
    /// Present when price change highlighting is enabled
    pub highlight: Option<Highlight>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingRow {
    pub rank: usize,
    pub id: String,
    pub symbol: String,
    pub image: String,
    pub amount: String,
    /// Present when additional columns are enabled
    pub value: Option<String>,
    /// Present when additional columns are enabled
    pub change: Option<String>,
    pub highlight: Option<Highlight>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum MarketPanel {
    #[default]
    Loading,
    Listing {
        rows: Vec<MarketRow>,
        /// Watchlist mode: rows can be removed and coins added
        editable: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum HoldingsPanel {
    #[default]
    Loading,
    /// "No Holdings Found."
    Empty,
    Listing {
        rows: Vec<HoldingRow>,
        total_value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalPanel {
    pub market_cap: String,
    /// e.g. "(-1.2%)"
    pub change: String,
}

/// The complete dashboard state for one refresh
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DashboardView {
    pub market: MarketPanel,
    pub global: Option<GlobalPanel>,
    pub holdings: HoldingsPanel,
    pub theme: String,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Builds the market panel from ranked coins
pub fn render_market(coins: &[RankedCoin], settings: &DashboardSettings) -> MarketPanel {
    let symbol = currency_symbol(&settings.currency);

    let rows = coins
        .iter()
        .map(|ranked| {
            let coin = &ranked.coin;
            MarketRow {
                rank: ranked.rank,
                id: coin.id.clone(),
                symbol: coin.symbol.to_uppercase(),
                image: coin.image.clone(),
                price: format!("{}{}", symbol, format_price(coin.current_price)),
                market_cap: settings
                    .additional_columns
                    .then(|| format!("{}{}", symbol, abbreviate(coin.market_cap))),
                change: settings
                    .additional_columns
                    .then(|| format!("{}%", format_change(coin.price_change_percentage_24h))),
                highlight: settings
                    .highlight_price_change
                    .then(|| Highlight::from_change(coin.market_cap_change_percentage_24h)),
            }
        })
        .collect();

    MarketPanel::Listing {
        rows,
        editable: settings.watchlist_on_dashboard,
    }
}

/// Builds the holdings panel, applying the configured display order
pub fn render_holdings(summary: &HoldingsSummary, settings: &DashboardSettings) -> HoldingsPanel {
    if summary.is_empty() {
        return HoldingsPanel::Empty;
    }

    let symbol = currency_symbol(&settings.currency);
    let mut holdings = summary.holdings.clone();
    sort_holdings(&mut holdings, settings.holdings_sort, settings.holdings_order);

    let rows = holdings
        .into_iter()
        .enumerate()
        .map(|(index, holding)| HoldingRow {
            rank: index + 1,
            amount: separate_thousands(holding.amount, None),
            value: settings
                .additional_columns
                .then(|| format!("{}{}", symbol, abbreviate(holding.value))),
            change: settings
                .additional_columns
                .then(|| format!("{}%", format_change(holding.change))),
            highlight: settings
                .highlight_price_change
                .then(|| Highlight::from_change(holding.change)),
            id: holding.id,
            symbol: holding.symbol,
            image: holding.image,
        })
        .collect();

    HoldingsPanel::Listing {
        rows,
        total_value: format!("{}{}", symbol, separate_thousands(summary.total_value, Some(2))),
    }
}

/// Builds the global statistics card
pub fn render_global(stats: &GlobalStats) -> GlobalPanel {
    GlobalPanel {
        market_cap: format!(
            "{}{}",
            currency_symbol(&stats.currency),
            separate_thousands(stats.market_cap, Some(0))
        ),
        change: format!("({:.1}%)", stats.change_24h),
    }
}

/// Signed percentage with two decimals, "-" when unknown
pub fn format_change(change: Option<f64>) -> String {
    match change {
        Some(c) if c.is_finite() => {
            let text = format!("{:.2}", c);
            if text.starts_with('-') {
                text
            } else {
                format!("+{}", text)
            }
        }
        _ => "-".to_string(),
    }
}

fn format_price(price: f64) -> String {
    if price > 1.0 {
        separate_thousands(price, Some(2))
    } else {
        separate_thousands(price, None)
    }
}

/// Formats with thousands separators; `None` keeps up to 8 decimals
pub fn separate_thousands(value: f64, decimals: Option<usize>) -> String {
    let text = match decimals {
        Some(d) => format!("{:.*}", d, value),
        None => {
            let text = format!("{:.8}", value);
            text.trim_end_matches('0').trim_end_matches('.').to_string()
        }
    };

    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    match fraction {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

/// Compact form for large figures (e.g. 1.23B)
pub fn abbreviate(value: f64) -> String {
    const UNITS: [(f64, &str); 4] = [(1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "K")];

    for (scale, unit) in UNITS {
        if value.abs() >= scale {
            return format!("{:.2}{}", value / scale, unit);
        }
    }
    format!("{:.2}", value)
}
