//! International rate clients
//!
//! Latest quotes come from open.er-api.com, historical days and whole
//! windows from the exchangerate.host timeseries endpoint. Both are keyless.
//! Quotes are units of currency per 1 USD.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use super::{
    build_client, check_status, decimal_from_number, send_with_retry, RateFetch, RateRecord,
    RateSource,
};
use crate::config::HttpSettings;
use crate::currency::{Currency, CurrencyBook};
use crate::error::{Result, TasasError};

const ER_API_LATEST_URL: &str = "https://open.er-api.com/v6/latest/USD";
const TIMESERIES_BASE_URL: &str = "https://api.exchangerate.host/timeseries";

/// International (USD-based) data source
pub struct InternationalSource {
    client: reqwest::blocking::Client,
    retries: u32,
    backoff_ms: u64,
    /// Codes requested from the timeseries endpoint
    symbols: Vec<Currency>,
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    result: String,
    #[serde(rename = "error-type", default)]
    error_type: Option<String>,
    #[serde(default)]
    rates: HashMap<String, serde_json::Number>,
}

#[derive(Debug, Deserialize)]
struct TimeseriesResponse {
    success: bool,
    #[serde(default)]
    rates: HashMap<String, HashMap<String, serde_json::Number>>,
}

impl InternationalSource {
    /// Create a new international source requesting the major currencies
    pub fn new(http: &HttpSettings) -> Result<Self> {
        Ok(Self {
            client: build_client(http)?,
            retries: http.retries,
            backoff_ms: http.backoff_ms,
            symbols: CurrencyBook::default().international_majors(),
        })
    }

    /// Replace the set of codes requested from the timeseries endpoint
    pub fn with_symbols(mut self, symbols: Vec<Currency>) -> Self {
        self.symbols = symbols;
        self
    }

    fn fetch_latest(&self) -> Result<Vec<RateRecord>> {
        let request = self.client.get(ER_API_LATEST_URL);
        let response = send_with_retry(request, self.retries, self.backoff_ms)?;
        let response = check_status(response, "open.er-api.com")?;
        let payload: LatestResponse = response.json().map_err(|e| {
            TasasError::Upstream(format!("open.er-api.com sent a malformed payload: {}", e))
        })?;

        records_from_latest(Utc::now().date_naive(), &payload)
    }

    fn fetch_timeseries(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<RateRecord>> {
        let symbols = self
            .symbols
            .iter()
            .map(|c| c.code())
            .collect::<Vec<_>>()
            .join(",");
        let request = self.client.get(TIMESERIES_BASE_URL).query(&[
            ("start_date", start.to_string()),
            ("end_date", end.to_string()),
            ("base", "USD".to_string()),
            ("symbols", symbols),
        ]);
        let response = send_with_retry(request, self.retries, self.backoff_ms)?;
        let response = check_status(response, "exchangerate.host")?;
        let payload: TimeseriesResponse = response.json().map_err(|e| {
            TasasError::Upstream(format!("exchangerate.host sent a malformed payload: {}", e))
        })?;

        records_from_timeseries(&payload)
    }
}

impl RateFetch for InternationalSource {
    fn source(&self) -> RateSource {
        RateSource::International
    }

    fn fetch_current(&self) -> Result<Vec<RateRecord>> {
        self.fetch_latest()
    }

    fn fetch_historical(&self, date: NaiveDate) -> Result<Vec<RateRecord>> {
        self.fetch_timeseries(date, date)
    }

    /// One timeseries request covers the whole window
    fn fetch_window(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<RateRecord>> {
        if start > end {
            return Err(TasasError::Query(format!(
                "window start {} is after end {}",
                start, end
            )));
        }
        self.fetch_timeseries(start, end)
    }
}

fn records_from_latest(date: NaiveDate, payload: &LatestResponse) -> Result<Vec<RateRecord>> {
    if payload.result != "success" {
        let reason = payload.error_type.as_deref().unwrap_or("unknown error");
        return Err(TasasError::Upstream(format!(
            "open.er-api.com reported failure: {}",
            reason
        )));
    }
    let fetched_at = Utc::now();
    let mut records = Vec::with_capacity(payload.rates.len());
    for (code, number) in &payload.rates {
        let currency = match Currency::new(code) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("open.er-api.com: skipping entry {:?}: {}", code, e);
                continue;
            }
        };
        let Some(value) = decimal_from_number(number) else {
            log::warn!(
                "open.er-api.com: skipping {}: unreadable value {}",
                code,
                number
            );
            continue;
        };
        match RateRecord::new(date, currency, RateSource::International, value, fetched_at) {
            Ok(record) => records.push(record),
            Err(e) => log::warn!("open.er-api.com: skipping {}: {}", code, e),
        }
    }
    if records.is_empty() {
        return Err(TasasError::Upstream(
            "open.er-api.com sent no usable rates".to_string(),
        ));
    }
    records.sort_by(|a, b| a.currency.cmp(&b.currency));
    Ok(records)
}

fn records_from_timeseries(payload: &TimeseriesResponse) -> Result<Vec<RateRecord>> {
    if !payload.success {
        return Err(TasasError::Upstream(
            "exchangerate.host reported failure".to_string(),
        ));
    }
    let fetched_at = Utc::now();
    let mut records = Vec::new();
    for (date_str, day_rates) in &payload.rates {
        let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") else {
            log::warn!("exchangerate.host: skipping unreadable date {:?}", date_str);
            continue;
        };
        for (code, number) in day_rates {
            let Ok(currency) = Currency::new(code) else {
                log::warn!("exchangerate.host: skipping entry {:?}", code);
                continue;
            };
            let Some(value) = decimal_from_number(number) else {
                log::warn!(
                    "exchangerate.host: skipping {} on {}: unreadable value",
                    code,
                    date
                );
                continue;
            };
            match RateRecord::new(date, currency, RateSource::International, value, fetched_at) {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("exchangerate.host: skipping {} on {}: {}", code, date, e),
            }
        }
    }
    if records.is_empty() {
        return Err(TasasError::Upstream(
            "exchangerate.host sent no usable rates".to_string(),
        ));
    }
    records.sort_by(|a, b| (a.date, &a.currency).cmp(&(b.date, &b.currency)));
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_source_creation() {
        let source = InternationalSource::new(&HttpSettings::default());
        assert!(source.is_ok());
    }

    #[test]
    fn test_latest_payload_parsing() {
        let json = r#"{
            "result": "success",
            "provider": "https://www.exchangerate-api.com",
            "time_last_update_unix": 1714521602,
            "base_code": "USD",
            "rates": {"USD": 1, "EUR": 0.9334, "GBP": 0.7989, "JPY": 157.81}
        }"#;
        let payload: LatestResponse = serde_json::from_str(json).unwrap();
        let records = records_from_latest(d(2024, 5, 1), &payload).unwrap();
        assert_eq!(records.len(), 4);

        let eur = records.iter().find(|r| r.currency.code() == "EUR").unwrap();
        assert_eq!(eur.value, Decimal::from_str("0.9334").unwrap());
        assert_eq!(eur.source, RateSource::International);
    }

    #[test]
    fn test_latest_error_payload() {
        let json = r#"{"result": "error", "error-type": "invalid-key"}"#;
        let payload: LatestResponse = serde_json::from_str(json).unwrap();
        match records_from_latest(d(2024, 5, 1), &payload) {
            Err(TasasError::Upstream(msg)) => assert!(msg.contains("invalid-key")),
            other => panic!("expected Upstream error, got {:?}", other),
        }
    }

    #[test]
    fn test_timeseries_payload_parsing() {
        let json = r#"{
            "success": true,
            "timeseries": true,
            "base": "USD",
            "start_date": "2024-05-01",
            "end_date": "2024-05-02",
            "rates": {
                "2024-05-02": {"EUR": 0.9340, "GBP": 0.7991},
                "2024-05-01": {"EUR": 0.9334, "GBP": 0.7989}
            }
        }"#;
        let payload: TimeseriesResponse = serde_json::from_str(json).unwrap();
        let records = records_from_timeseries(&payload).unwrap();
        assert_eq!(records.len(), 4);
        // Ascending by date, then currency
        assert_eq!(records[0].date, d(2024, 5, 1));
        assert_eq!(records[0].currency.code(), "EUR");
        assert_eq!(records[3].date, d(2024, 5, 2));
        assert_eq!(records[3].currency.code(), "GBP");
    }

    #[test]
    fn test_timeseries_skips_unreadable_dates() {
        let json = r#"{
            "success": true,
            "rates": {
                "not-a-date": {"EUR": 0.9},
                "2024-05-01": {"EUR": 0.9334}
            }
        }"#;
        let payload: TimeseriesResponse = serde_json::from_str(json).unwrap();
        let records = records_from_timeseries(&payload).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date, d(2024, 5, 1));
    }

    #[test]
    fn test_timeseries_failure_payload() {
        let json = r#"{"success": false}"#;
        let payload: TimeseriesResponse = serde_json::from_str(json).unwrap();
        assert!(records_from_timeseries(&payload).is_err());
    }
}
