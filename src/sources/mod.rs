//! Upstream rate providers
//!
//! Two worlds of quotes:
//! - ElToque TRMI: Cuban informal market, CUP per unit of currency
//! - International: open.er-api.com and exchangerate.host, units per USD

pub mod eltoque;
pub mod international;

pub use eltoque::EltoqueSource;
pub use international::InternationalSource;

use crate::currency::Currency;
use crate::error::{Result, TasasError};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which world a rate belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateSource {
    Eltoque,
    International,
}

impl RateSource {
    /// Stable identifier used in storage and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            RateSource::Eltoque => "eltoque",
            RateSource::International => "international",
        }
    }

    /// Parse a stored identifier
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "eltoque" => Some(RateSource::Eltoque),
            "international" => Some(RateSource::International),
            _ => None,
        }
    }

    /// The currency all quotes from this source are relative to
    pub fn base(&self) -> Currency {
        match self {
            RateSource::Eltoque => Currency::cup(),
            RateSource::International => Currency::usd(),
        }
    }

    /// Both sources
    pub fn all() -> [RateSource; 2] {
        [RateSource::Eltoque, RateSource::International]
    }
}

impl fmt::Display for RateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One quoted rate: `value` of the source's base buys 1 unit of `currency`
/// for ElToque, or 1 USD buys `value` of `currency` internationally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateRecord {
    pub date: NaiveDate,
    pub currency: Currency,
    pub source: RateSource,
    pub value: Decimal,
    pub fetched_at: DateTime<Utc>,
}

impl RateRecord {
    /// Build a record, rejecting non-positive quotes
    pub fn new(
        date: NaiveDate,
        currency: Currency,
        source: RateSource,
        value: Decimal,
        fetched_at: DateTime<Utc>,
    ) -> Result<Self> {
        if value <= Decimal::ZERO {
            return Err(TasasError::Upstream(format!(
                "non-positive rate {} for {} on {}",
                value, currency, date
            )));
        }
        Ok(Self {
            date,
            currency,
            source,
            value,
            fetched_at,
        })
    }
}

/// A provider that can be asked for rates
pub trait RateFetch: Send + Sync {
    /// Which world this provider serves
    fn source(&self) -> RateSource;

    /// Fetch the latest quotes. Never returns an empty set on success.
    fn fetch_current(&self) -> Result<Vec<RateRecord>>;

    /// Fetch quotes for one past date. Never returns an empty set on success.
    fn fetch_historical(&self, date: NaiveDate) -> Result<Vec<RateRecord>>;

    /// Fetch an inclusive date window, one day at a time
    ///
    /// Days that fail are skipped with a warning. The whole window fails
    /// only when no day produced anything.
    fn fetch_window(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<RateRecord>> {
        if start > end {
            return Err(TasasError::Query(format!(
                "window start {} is after end {}",
                start, end
            )));
        }
        let mut records = Vec::new();
        let mut last_error = None;
        let mut day = start;
        while day <= end {
            match self.fetch_historical(day) {
                Ok(mut batch) => records.append(&mut batch),
                Err(e) => {
                    log::warn!("{}: no rates for {}: {}", self.source(), day, e);
                    last_error = Some(e);
                }
            }
            day += Duration::days(1);
        }
        match (records.is_empty(), last_error) {
            (true, Some(e)) => Err(e),
            _ => Ok(records),
        }
    }
}

/// The pair of providers the engine runs against
pub struct ProviderSet {
    eltoque: Box<dyn RateFetch>,
    international: Box<dyn RateFetch>,
}

impl ProviderSet {
    /// Assemble from explicit providers (tests substitute fakes here)
    pub fn new(eltoque: Box<dyn RateFetch>, international: Box<dyn RateFetch>) -> Self {
        Self {
            eltoque,
            international,
        }
    }

    /// Assemble the real HTTP providers from settings
    pub fn from_settings(settings: &crate::config::Settings) -> Result<Self> {
        Ok(Self {
            eltoque: Box::new(EltoqueSource::new(
                settings.api_key.clone(),
                &settings.http,
            )?),
            international: Box::new(InternationalSource::new(&settings.http)?),
        })
    }

    /// Provider for a source
    pub fn get(&self, source: RateSource) -> &dyn RateFetch {
        match source {
            RateSource::Eltoque => self.eltoque.as_ref(),
            RateSource::International => self.international.as_ref(),
        }
    }
}

pub(crate) fn build_client(http: &crate::config::HttpSettings) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_millis(http.timeout_ms))
        .user_agent(concat!("tasas/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| TasasError::Network(format!("Failed to create HTTP client: {}", e)))
}

/// Send a request, retrying transient failures with a fixed backoff
pub(crate) fn send_with_retry(
    request: reqwest::blocking::RequestBuilder,
    retries: u32,
    backoff_ms: u64,
) -> Result<reqwest::blocking::Response> {
    let mut request = request;
    let mut attempt = 0;
    loop {
        let retryable = request.try_clone();
        match request.send() {
            Ok(response) => return Ok(response),
            Err(e) => match retryable {
                Some(next) if attempt < retries => {
                    log::warn!("request failed ({}), retrying in {} ms", e, backoff_ms);
                    std::thread::sleep(std::time::Duration::from_millis(backoff_ms));
                    request = next;
                    attempt += 1;
                }
                _ => return Err(network_error(e)),
            },
        }
    }
}

fn network_error(e: reqwest::Error) -> TasasError {
    if e.is_timeout() {
        TasasError::Network(format!("request timed out: {}", e))
    } else {
        TasasError::Network(e.to_string())
    }
}

/// Map HTTP statuses onto the error taxonomy
pub(crate) fn check_status(
    response: reqwest::blocking::Response,
    what: &str,
) -> Result<reqwest::blocking::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status.as_u16() {
        401 | 403 => Err(TasasError::Auth(format!(
            "{} rejected the request ({})",
            what, status
        ))),
        429 => {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(|s| format!(", retry after {}s", s))
                .unwrap_or_default();
            Err(TasasError::RateLimited(format!(
                "{} throttled the request{}",
                what, retry_after
            )))
        }
        _ => Err(TasasError::Upstream(format!(
            "{} returned {}",
            what, status
        ))),
    }
}

/// Convert a JSON number to a decimal without a detour through binary floats
pub(crate) fn decimal_from_number(n: &serde_json::Number) -> Option<Decimal> {
    use std::str::FromStr;
    Decimal::from_str(&n.to_string()).ok()
}
