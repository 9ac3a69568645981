//! Ticker symbols streamed by the recorder.

use std::fmt;

/// Tickers streamed when no override is configured.
pub const DEFAULT_SYMBOLS: &[&str] = &[
    "SPY", "QQQ", "IWM", "AEM", "AEP", "AGI", "AMAT", "AMD", "AMT", "AMZN", "ANET", "APH", "APP", "ATI", "AVGO", "AXP", "CCJ", "CDNS", "CEG",
    "CELH", "CL", "CLS", "CME", "CNM", "CNP", "COST", "CP", "CRBG", "D", "DOCS", "DXCM", "ETN", "EXPE", "FAST", "FLEX", "FTNT", "GEN", "HLT",
    "HON", "HPE", "HWM", "IBKR", "ICE", "KDP", "KMI", "KO", "LIN", "LNT", "LRCX", "MA", "MDLZ", "MDT", "META", "MNST", "MPC", "MSFT", "NDAQ",
    "NEE", "NFLX", "NI", "NKE", "NTNX", "NUE", "NVDA", "NVT", "NWSA", "NXPI", "ORLY", "OTIS", "QSR", "RCL", "ROL", "SCHW", "SFM", "SGI", "SMCI",
    "TJX", "TME", "TPR", "TSCO", "UNP", "USFD", "V", "VLO", "VST", "WEC", "WMB", "WPM", "WYNN", "YUM", "TSLA", "AAPL",
];

/// A ticker symbol, trimmed and upper-cased.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(String);

impl Symbol {
    /// Normalises `value` into a symbol. Returns `None` for blank input.
    pub fn new(value: &str) -> Option<Symbol> {
        let value = value.trim();
        if value.is_empty() {
            None
        } else {
            Some(Symbol(value.to_uppercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns the built-in ticker list.
pub fn default_symbols() -> Vec<Symbol> {
    DEFAULT_SYMBOLS.iter().filter_map(|symbol| Symbol::new(symbol)).collect()
}

/// Parses a comma or whitespace separated list of tickers.
///
/// Duplicates are dropped, keeping the position of the first occurrence.
pub fn parse_symbols(list: &str) -> Vec<Symbol> {
    let mut symbols: Vec<Symbol> = Vec::new();

    for symbol in list.split(|c: char| c == ',' || c.is_whitespace()).filter_map(Symbol::new) {
        if !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }

    symbols
}
