//! Free-text query parsing
//!
//! Turns the text a user types after the trigger keyword into a typed
//! `Query`. The default namespace is the Cuban (ElToque) market; `inter`
//! switches to international quotes; `db` manages the cache. A `YYYY-MM-DD`
//! token anywhere in a listing or conversion sets the target date.
//!
//! Aliases (`eur`, `usdt`, `transfer`) apply only in the ElToque namespace;
//! international codes are taken literally.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::currency::{Currency, CurrencyBook};
use crate::error::{Result, TasasError};
use crate::sources::RateSource;
use crate::trend::TrendWindow;

/// A parsed user query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Empty input: top-level navigation
    Menu,
    /// Usage catalogue
    Help,
    /// All rates from one source on one date
    ListRates { source: RateSource, date: NaiveDate },
    /// One currency's rate on one date
    Rate {
        source: RateSource,
        currency: Currency,
        date: NaiveDate,
    },
    /// Amount conversion inside one source
    Convert {
        source: RateSource,
        amount: Decimal,
        from: Currency,
        to: Currency,
        date: NaiveDate,
    },
    /// Rate movement over a trailing window
    Trend {
        source: RateSource,
        currency: Currency,
        window: TrendWindow,
    },
    /// ElToque vs international, one currency or the whole comparable set
    Compare {
        currency: Option<Currency>,
        date: NaiveDate,
    },
    /// Cache statistics
    DbStatus,
    /// Drop all cached rates
    DbClear,
    /// Re-fetch the recent window into the cache
    DbRebuild,
}

/// Stateless query parser over a currency book
pub struct QueryParser {
    book: CurrencyBook,
}

impl QueryParser {
    pub fn new(book: CurrencyBook) -> Self {
        Self { book }
    }

    /// Parse user text. `today` anchors relative dates and date validation.
    pub fn parse(&self, input: &str, today: NaiveDate) -> Result<Query> {
        let lowered = input.trim().to_lowercase();
        if lowered.is_empty() {
            return Ok(Query::Menu);
        }
        if lowered == "help" || lowered == "?" {
            return Ok(Query::Help);
        }

        let mut tokens: Vec<&str> = lowered.split_whitespace().collect();

        if tokens.first() == Some(&"db") {
            return parse_db(&tokens[1..]);
        }

        let date = self.lift_date(&mut tokens, today)?;

        let source = match tokens.first().copied() {
            Some("inter") | Some("international") => {
                tokens.remove(0);
                RateSource::International
            }
            Some("eltoque") => {
                tokens.remove(0);
                RateSource::Eltoque
            }
            _ => RateSource::Eltoque,
        };

        match tokens.first().copied() {
            Some("history") => self.parse_history(&tokens[1..], source, date),
            Some("trend") => self.parse_trend(&tokens[1..], source, date),
            Some("compare") => self.parse_compare(&tokens[1..], date, today),
            // Currency-first trend, `usd trend 7d`; the leading-keyword form
            // above stays accepted
            Some(code)
                if !looks_like_amount(code) && tokens.get(1).copied() == Some("trend") =>
            {
                let mut rest = vec![code];
                rest.extend_from_slice(&tokens[2..]);
                self.parse_trend(&rest, source, date)
            }
            _ => self.parse_rates(&tokens, source, date, today),
        }
    }

    /// Pull a `YYYY-MM-DD` token out of the token list, if any
    fn lift_date(&self, tokens: &mut Vec<&str>, today: NaiveDate) -> Result<Option<NaiveDate>> {
        let position = tokens.iter().position(|t| looks_like_date(t));
        let Some(position) = position else {
            return Ok(None);
        };
        let token = tokens.remove(position);
        let date = NaiveDate::parse_from_str(token, "%Y-%m-%d")
            .map_err(|_| TasasError::Query(format!("{} is not a valid date", token)))?;
        if date > today {
            return Err(TasasError::Query(format!(
                "{} is in the future, rates only exist for past days",
                date
            )));
        }
        Ok(Some(date))
    }

    fn parse_history(
        &self,
        rest: &[&str],
        source: RateSource,
        date: Option<NaiveDate>,
    ) -> Result<Query> {
        let Some(date) = date else {
            return Err(TasasError::Query(
                "history needs a date, e.g. history 2024-05-01 usd".to_string(),
            ));
        };
        match rest {
            [] => Ok(Query::ListRates { source, date }),
            [code] => Ok(Query::Rate {
                source,
                currency: self.resolve(code, source)?,
                date,
            }),
            _ => Err(TasasError::Query(
                "history takes a date and at most one currency".to_string(),
            )),
        }
    }

    fn parse_trend(
        &self,
        rest: &[&str],
        source: RateSource,
        date: Option<NaiveDate>,
    ) -> Result<Query> {
        if date.is_some() {
            return Err(TasasError::Query(
                "trend windows always end today and do not take a date".to_string(),
            ));
        }
        match rest {
            [] => Err(TasasError::Query(
                "trend needs a currency, e.g. usd trend 30d".to_string(),
            )),
            [code] => Ok(Query::Trend {
                source,
                currency: self.resolve(code, source)?,
                window: TrendWindow::default(),
            }),
            [code, window] => Ok(Query::Trend {
                source,
                currency: self.resolve(code, source)?,
                window: TrendWindow::parse(window).ok_or_else(|| {
                    TasasError::Query(format!(
                        "{} is not a window, expected one of 7d, 30d, 3m, 6m, 1y",
                        window
                    ))
                })?,
            }),
            _ => Err(TasasError::Query(
                "trend takes a currency and an optional window".to_string(),
            )),
        }
    }

    fn parse_compare(
        &self,
        rest: &[&str],
        date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Query> {
        let date = date.unwrap_or(today);
        match rest {
            [] => Ok(Query::Compare {
                currency: None,
                date,
            }),
            [code] => Ok(Query::Compare {
                currency: Some(self.resolve(code, RateSource::Eltoque)?),
                date,
            }),
            _ => Err(TasasError::Query(
                "compare takes at most one currency".to_string(),
            )),
        }
    }

    /// Listing and conversion shapes, after namespaces and commands
    fn parse_rates(
        &self,
        tokens: &[&str],
        source: RateSource,
        date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Query> {
        let date = date.unwrap_or(today);
        match tokens {
            [] => Ok(Query::ListRates { source, date }),
            [code] if !looks_like_amount(code) => Ok(Query::Rate {
                source,
                currency: self.resolve(code, source)?,
                date,
            }),
            [amount, code] if looks_like_amount(amount) => Ok(Query::Convert {
                source,
                amount: parse_amount(amount)?,
                from: self.resolve(code, source)?,
                to: source.base(),
                date,
            }),
            [amount, from, "to", to] if looks_like_amount(amount) => Ok(Query::Convert {
                source,
                amount: parse_amount(amount)?,
                from: self.resolve(from, source)?,
                to: self.resolve(to, source)?,
                date,
            }),
            _ => Err(TasasError::Query(
                "could not read that, try: usd | 100 usd | 100 usd to eur | usd trend 30d | compare | help"
                    .to_string(),
            )),
        }
    }

    fn resolve(&self, code: &str, source: RateSource) -> Result<Currency> {
        match source {
            RateSource::Eltoque => self.book.resolve(code),
            RateSource::International => Currency::new(code),
        }
    }
}

fn parse_db(rest: &[&str]) -> Result<Query> {
    match rest {
        ["status"] => Ok(Query::DbStatus),
        ["clear"] => Ok(Query::DbClear),
        ["rebuild"] => Ok(Query::DbRebuild),
        _ => Err(TasasError::Query(
            "db takes one of: status, clear, rebuild".to_string(),
        )),
    }
}

fn looks_like_date(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| matches!(i, 4 | 7) || b.is_ascii_digit())
}

fn looks_like_amount(token: &str) -> bool {
    token
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '.')
}

fn parse_amount(token: &str) -> Result<Decimal> {
    let normalized = token.replace(',', ".");
    let amount = Decimal::from_str(&normalized)
        .map_err(|_| TasasError::Query(format!("{} is not an amount", token)))?;
    // Zero is a valid amount; only negatives are out
    if amount < Decimal::ZERO {
        return Err(TasasError::Query(format!(
            "{} is not a valid amount",
            token
        )));
    }
    Ok(amount)
}
