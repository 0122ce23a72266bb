//! Currency codes and the alias book

use crate::error::{Result, TasasError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Maximum accepted code length (covers compound codes like USDT_TRC20)
const MAX_CODE_LEN: usize = 16;

/// A validated currency code as the upstream APIs spell it
///
/// Codes are open-ended: a new code appearing in a provider payload is
/// accepted without any change here. Normalized to uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Validate and normalize a raw code
    pub fn new(code: &str) -> Result<Self> {
        let normalized = code.trim().to_uppercase();
        let valid_len = (2..=MAX_CODE_LEN).contains(&normalized.len());
        let valid_chars = normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
        let starts_alpha = normalized.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
        if valid_len && valid_chars && starts_alpha {
            Ok(Currency(normalized))
        } else {
            Err(TasasError::UnknownCurrency(code.trim().to_string()))
        }
    }

    /// Get the code string
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Cuban peso, the implicit base of ElToque quotes
    pub fn cup() -> Self {
        Currency("CUP".to_string())
    }

    /// US dollar, the implicit base of international quotes
    pub fn usd() -> Self {
        Currency("USD".to_string())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Currency {
    type Err = TasasError;

    fn from_str(s: &str) -> Result<Self> {
        Currency::new(s)
    }
}

/// Alias and display-name mappings between user vocabulary and API codes
///
/// ElToque spells the euro `ECU`, bank transfers `TRX` and Tether
/// `USDT_TRC20`; users type `EUR`, `TRANSFER` and `USDT`. The book maps
/// both directions and carries optional per-currency icon paths.
#[derive(Debug, Clone)]
pub struct CurrencyBook {
    alias_to_api: HashMap<String, String>,
    api_to_display: HashMap<String, String>,
    icons: HashMap<String, String>,
}

impl Default for CurrencyBook {
    fn default() -> Self {
        let mut alias_to_api = HashMap::new();
        alias_to_api.insert("EUR".to_string(), "ECU".to_string());
        alias_to_api.insert("TRANSFER".to_string(), "TRX".to_string());
        alias_to_api.insert("USDT".to_string(), "USDT_TRC20".to_string());

        let mut api_to_display = HashMap::new();
        api_to_display.insert("ECU".to_string(), "EUR".to_string());
        api_to_display.insert("TRX".to_string(), "TRANSFER".to_string());
        api_to_display.insert("USDT_TRC20".to_string(), "USDT".to_string());

        CurrencyBook {
            alias_to_api,
            api_to_display,
            icons: HashMap::new(),
        }
    }
}

impl CurrencyBook {
    /// Build a book with extra alias / display-name / icon overrides
    pub fn with_overrides(
        aliases: &HashMap<String, String>,
        display_names: &HashMap<String, String>,
        icons: &HashMap<String, String>,
    ) -> Self {
        let mut book = CurrencyBook::default();
        for (alias, code) in aliases {
            book.alias_to_api
                .insert(alias.to_uppercase(), code.to_uppercase());
        }
        // Keys are codes; the configured names themselves stay verbatim
        for (code, name) in display_names {
            book.api_to_display.insert(code.to_uppercase(), name.clone());
        }
        for (code, path) in icons {
            book.icons.insert(code.to_uppercase(), path.clone());
        }
        book
    }

    /// Resolve user input to the API code (aliases applied, then validated)
    pub fn resolve(&self, input: &str) -> Result<Currency> {
        let upper = input.trim().to_uppercase();
        match self.alias_to_api.get(&upper) {
            Some(api_code) => Currency::new(api_code),
            None => Currency::new(&upper),
        }
    }

    /// User-facing name for an API code
    pub fn display(&self, currency: &Currency) -> String {
        self.api_to_display
            .get(currency.code())
            .cloned()
            .unwrap_or_else(|| currency.code().to_string())
    }

    /// Icon path for a currency, when one is configured
    pub fn icon(&self, currency: &Currency) -> Option<&str> {
        self.icons.get(currency.code()).map(|s| s.as_str())
    }

    /// The code a comparison looks up on the international side
    ///
    /// Fixed pairings, not affected by display-name overrides.
    pub fn market_code(&self, currency: &Currency) -> Currency {
        match currency.code() {
            "ECU" => Currency("EUR".to_string()),
            "USDT_TRC20" => Currency("USDT".to_string()),
            _ => currency.clone(),
        }
    }

    /// ElToque listing order for the default view
    pub fn eltoque_listing(&self) -> Vec<Currency> {
        ["USD", "ECU", "MLC", "TRX", "USDT_TRC20"]
            .iter()
            .map(|c| Currency(c.to_string()))
            .collect()
    }

    /// Major currencies shown against USD in the international view
    pub fn international_majors(&self) -> Vec<Currency> {
        ["EUR", "GBP", "JPY", "CAD", "AUD", "CHF", "CNY", "HKD"]
            .iter()
            .map(|c| Currency(c.to_string()))
            .collect()
    }

    /// Currencies quoted by both worlds, eligible for comparison
    pub fn compare_set(&self) -> Vec<Currency> {
        ["ECU", "MLC", "USDT_TRC20"]
            .iter()
            .map(|c| Currency(c.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_normalizes_case() {
        assert_eq!(Currency::new("usd").unwrap().code(), "USD");
        assert_eq!(Currency::new(" mlc ").unwrap().code(), "MLC");
    }

    #[test]
    fn test_currency_accepts_compound_codes() {
        assert_eq!(Currency::new("USDT_TRC20").unwrap().code(), "USDT_TRC20");
    }

    #[test]
    fn test_currency_rejects_garbage() {
        assert!(Currency::new("").is_err());
        assert!(Currency::new("X").is_err());
        assert!(Currency::new("U$D").is_err());
        assert!(Currency::new("9USD").is_err());
        assert!(Currency::new("AVERYLONGCODEBEYONDLIMIT").is_err());
    }

    #[test]
    fn test_currency_display() {
        assert_eq!(format!("{}", Currency::new("eur").unwrap()), "EUR");
    }

    #[test]
    fn test_book_resolves_aliases() {
        let book = CurrencyBook::default();
        assert_eq!(book.resolve("eur").unwrap().code(), "ECU");
        assert_eq!(book.resolve("usdt").unwrap().code(), "USDT_TRC20");
        assert_eq!(book.resolve("transfer").unwrap().code(), "TRX");
        assert_eq!(book.resolve("usd").unwrap().code(), "USD");
    }

    #[test]
    fn test_book_display_names() {
        let book = CurrencyBook::default();
        assert_eq!(book.display(&Currency::new("ECU").unwrap()), "EUR");
        assert_eq!(book.display(&Currency::new("USD").unwrap()), "USD");
    }

    #[test]
    fn test_book_overrides() {
        let mut aliases = HashMap::new();
        aliases.insert("euro".to_string(), "ecu".to_string());
        let mut names = HashMap::new();
        names.insert("trx".to_string(), "Transferencia (MN)".to_string());
        let mut icons = HashMap::new();
        icons.insert("USD".to_string(), "images/usd.png".to_string());

        let book = CurrencyBook::with_overrides(&aliases, &names, &icons);
        assert_eq!(book.resolve("EURO").unwrap().code(), "ECU");
        // Configured names keep their spelling
        assert_eq!(
            book.display(&Currency::new("TRX").unwrap()),
            "Transferencia (MN)"
        );
        assert_eq!(
            book.icon(&Currency::new("USD").unwrap()),
            Some("images/usd.png")
        );
        assert_eq!(book.icon(&Currency::new("MLC").unwrap()), None);
    }

    #[test]
    fn test_market_codes_ignore_display_overrides() {
        let aliases = HashMap::new();
        let mut names = HashMap::new();
        names.insert("ECU".to_string(), "Euro".to_string());
        let book = CurrencyBook::with_overrides(&aliases, &names, &HashMap::new());

        assert_eq!(book.display(&Currency::new("ECU").unwrap()), "Euro");
        assert_eq!(book.market_code(&Currency::new("ECU").unwrap()).code(), "EUR");
        assert_eq!(
            book.market_code(&Currency::new("USDT_TRC20").unwrap()).code(),
            "USDT"
        );
        assert_eq!(book.market_code(&Currency::new("MLC").unwrap()).code(), "MLC");
    }

    #[test]
    fn test_listings_are_nonempty_and_ordered() {
        let book = CurrencyBook::default();
        let listing = book.eltoque_listing();
        assert_eq!(listing.first().unwrap().code(), "USD");
        assert!(listing.len() >= 5);
        assert!(book.international_majors().len() >= 8);
        assert_eq!(book.compare_set().len(), 3);
    }
}
