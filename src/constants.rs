//! Constants for the portfolio tracker SDK
//!
//! Endpoints, timeouts, page sizes and the defaults applied to missing
//! user settings are centralized here. User preferences themselves live in
//! the key-value store and are read through `settings::DashboardSettings`.

/// How often the dashboard refreshes while focused (in seconds)
pub const REFRESH_INTERVAL_SECS: u64 = 20;

/// Timeout for login and session verification (in seconds)
pub const SESSION_TIMEOUT_SECS: u64 = 5;

/// Timeout for data imports (in seconds)
pub const IMPORT_TIMEOUT_SECS: u64 = 10;

/// Timeout for all other backend and pricing requests (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Number of coins listed on the dashboard when the watchlist is disabled
pub const MARKET_TOP_COINS: usize = 10;

/// Page size when listing watchlist members
pub const WATCHLIST_PAGE_SIZE: usize = 100;

/// Page size when pricing holdings
pub const HOLDINGS_PAGE_SIZE: usize = 250;

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko endpoint for market listings
pub const COINGECKO_MARKETS_ENDPOINT: &str = "/coins/markets";

/// CoinGecko endpoint for global market statistics
pub const COINGECKO_GLOBAL_ENDPOINT: &str = "/global";

/// CoinGecko endpoint for coin search
pub const COINGECKO_SEARCH_ENDPOINT: &str = "/search";

/// User agent for HTTP requests
pub const USER_AGENT: &str = "portfolio-tracker-sdk/0.1.0";

/// Currency used when none is configured
pub const DEFAULT_CURRENCY: &str = "usd";

/// Theme used when none is configured
pub const DEFAULT_THEME: &str = "Light";

/// Persisted setting keys
pub mod keys {
    pub const CURRENCY: &str = "currency";
    pub const DASHBOARD_WATCHLIST: &str = "dashboardWatchlist";
    pub const ADDITIONAL_COLUMNS: &str = "additionalDashboardColumns";
    pub const HIGHLIGHT_PRICE_CHANGE: &str = "highlightPriceChange";
    pub const TRANSACTIONS_AFFECT_HOLDINGS: &str = "transactionsAffectHoldings";
    pub const MARKET_SORTING: &str = "dashboardMarketSorting";
    pub const MARKET_SORT_ORDER: &str = "dashboardMarketSortOrder";
    pub const HOLDINGS_SORTING: &str = "dashboardHoldingsSorting";
    pub const HOLDINGS_SORT_ORDER: &str = "dashboardHoldingsSortOrder";
    pub const THEME: &str = "theme";
    pub const API: &str = "api";
    pub const TOKEN: &str = "token";
    pub const USERNAME: &str = "username";
    pub const NO_API_MODE: &str = "NoAPIMode";
    pub const NO_API_DATA: &str = "NoAPI";
}

/// Display symbol for a currency code, falling back to the upper-cased code
pub fn currency_symbol(currency: &str) -> String {
    let symbol = match currency.to_lowercase().as_str() {
        "usd" | "aud" | "cad" | "nzd" | "hkd" | "sgd" | "mxn" => "$",
        "eur" => "€",
        "gbp" => "£",
        "jpy" | "cny" => "¥",
        "inr" => "₹",
        "krw" => "₩",
        "rub" => "₽",
        "try" => "₺",
        "chf" => "CHF ",
        "btc" => "₿",
        "eth" => "Ξ",
        other => return format!("{} ", other.to_uppercase()),
    };
    symbol.to_string()
}
