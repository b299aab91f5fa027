//! Ticker → sector lookup.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Sector assigned to tickers missing from the lookup.
pub const UNKNOWN_SECTOR: &str = "Unknown";

/// Built-in sector assignments for widely held tickers.
pub static BUILTIN_SECTORS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    [
        // Technology
        ("AAPL", "Technology"),
        ("MSFT", "Technology"),
        ("NVDA", "Technology"),
        ("AMD", "Technology"),
        ("INTC", "Technology"),
        ("ORCL", "Technology"),
        ("CRM", "Technology"),
        ("ADBE", "Technology"),
        ("AVGO", "Technology"),
        ("CSCO", "Technology"),
        ("IBM", "Technology"),
        ("QCOM", "Technology"),
        // Communication Services
        ("GOOGL", "Communication Services"),
        ("GOOG", "Communication Services"),
        ("META", "Communication Services"),
        ("NFLX", "Communication Services"),
        ("DIS", "Communication Services"),
        ("T", "Communication Services"),
        ("VZ", "Communication Services"),
        // Consumer Cyclical
        ("AMZN", "Consumer Cyclical"),
        ("TSLA", "Consumer Cyclical"),
        ("HD", "Consumer Cyclical"),
        ("NKE", "Consumer Cyclical"),
        ("MCD", "Consumer Cyclical"),
        ("SBUX", "Consumer Cyclical"),
        // Consumer Defensive
        ("WMT", "Consumer Defensive"),
        ("KO", "Consumer Defensive"),
        ("PEP", "Consumer Defensive"),
        ("PG", "Consumer Defensive"),
        ("COST", "Consumer Defensive"),
        // Financials
        ("JPM", "Financials"),
        ("BAC", "Financials"),
        ("WFC", "Financials"),
        ("GS", "Financials"),
        ("MS", "Financials"),
        ("V", "Financials"),
        ("MA", "Financials"),
        ("BRK.B", "Financials"),
        // Healthcare
        ("JNJ", "Healthcare"),
        ("UNH", "Healthcare"),
        ("PFE", "Healthcare"),
        ("MRK", "Healthcare"),
        ("ABBV", "Healthcare"),
        ("LLY", "Healthcare"),
        // Energy
        ("XOM", "Energy"),
        ("CVX", "Energy"),
        ("COP", "Energy"),
        // Industrials
        ("BA", "Industrials"),
        ("CAT", "Industrials"),
        ("GE", "Industrials"),
        ("UPS", "Industrials"),
        // Utilities
        ("NEE", "Utilities"),
        ("DUK", "Utilities"),
        // Real Estate
        ("AMT", "Real Estate"),
        ("PLD", "Real Estate"),
        // Basic Materials
        ("LIN", "Basic Materials"),
        ("NEM", "Basic Materials"),
    ]
    .into_iter()
    .collect()
});

/// Sector lookup with caller overrides layered over the built-in table.
#[derive(Debug, Clone, Default)]
pub struct SectorMap {
    overrides: HashMap<String, String>,
    builtin: bool,
}

impl SectorMap {
    /// Lookup backed by [`BUILTIN_SECTORS`].
    pub fn builtin() -> Self {
        Self {
            overrides: HashMap::new(),
            builtin: true,
        }
    }

    /// Lookup with no entries: every ticker maps to [`UNKNOWN_SECTOR`] until assigned.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Assign (or reassign) a ticker's sector.
    pub fn insert(&mut self, ticker: &str, sector: &str) {
        self.overrides
            .insert(ticker.trim().to_uppercase(), sector.to_string());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, ticker: &str, sector: &str) -> Self {
        self.insert(ticker, sector);
        self
    }

    /// Sector for a ticker, `"Unknown"` when unmapped.
    pub fn sector_for(&self, ticker: &str) -> &str {
        let key = ticker.trim().to_uppercase();
        if let Some(sector) = self.overrides.get(&key) {
            return sector;
        }
        if self.builtin {
            if let Some(sector) = BUILTIN_SECTORS.get(key.as_str()) {
                return sector;
            }
        }
        UNKNOWN_SECTOR
    }
}

impl FromIterator<(String, String)> for SectorMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut map = Self::empty();
        for (ticker, sector) in iter {
            map.insert(&ticker, &sector);
        }
        map
    }
}
