//! ElToque TRMI client
//!
//! The informal market reference rate published by ElToque. Quotes are CUP
//! per unit of currency. Every request carries a Bearer token and a one-day
//! window; the same endpoint serves current and historical days.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use super::{
    build_client, check_status, decimal_from_number, send_with_retry, RateFetch, RateRecord,
    RateSource,
};
use crate::config::HttpSettings;
use crate::currency::Currency;
use crate::error::{Result, TasasError};

const ELTOQUE_BASE_URL: &str = "https://tasas.eltoque.com/v1/trmi";

/// ElToque TRMI data source
pub struct EltoqueSource {
    api_key: Option<String>,
    client: reqwest::blocking::Client,
    retries: u32,
    backoff_ms: u64,
}

#[derive(Debug, Deserialize)]
struct TrmiResponse {
    tasas: HashMap<String, serde_json::Number>,
}

impl EltoqueSource {
    /// Create a new ElToque source
    pub fn new(api_key: Option<String>, http: &HttpSettings) -> Result<Self> {
        Ok(Self {
            api_key,
            client: build_client(http)?,
            retries: http.retries,
            backoff_ms: http.backoff_ms,
        })
    }

    fn fetch_for_date(&self, date: NaiveDate) -> Result<Vec<RateRecord>> {
        let Some(api_key) = &self.api_key else {
            return Err(TasasError::Auth(
                "ElToque API key is not configured".to_string(),
            ));
        };

        let request = self
            .client
            .get(ELTOQUE_BASE_URL)
            .bearer_auth(api_key)
            .query(&[
                ("date_from", format!("{} 00:00:01", date)),
                ("date_to", format!("{} 23:59:01", date)),
            ]);

        let response = send_with_retry(request, self.retries, self.backoff_ms)?;
        let response = check_status(response, "ElToque")?;
        let payload: TrmiResponse = response.json().map_err(|e| {
            TasasError::Upstream(format!("ElToque sent a malformed payload: {}", e))
        })?;

        records_from_payload(date, &payload)
    }
}

impl RateFetch for EltoqueSource {
    fn source(&self) -> RateSource {
        RateSource::Eltoque
    }

    fn fetch_current(&self) -> Result<Vec<RateRecord>> {
        self.fetch_for_date(Utc::now().date_naive())
    }

    fn fetch_historical(&self, date: NaiveDate) -> Result<Vec<RateRecord>> {
        self.fetch_for_date(date)
    }
}

/// Turn a TRMI payload into records, skipping entries that cannot be used
fn records_from_payload(date: NaiveDate, payload: &TrmiResponse) -> Result<Vec<RateRecord>> {
    let fetched_at = Utc::now();
    let mut records = Vec::with_capacity(payload.tasas.len());
    for (code, number) in &payload.tasas {
        let currency = match Currency::new(code) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("ElToque: skipping entry {:?}: {}", code, e);
                continue;
            }
        };
        let Some(value) = decimal_from_number(number) else {
            log::warn!("ElToque: skipping {}: unreadable value {}", code, number);
            continue;
        };
        match RateRecord::new(date, currency, RateSource::Eltoque, value, fetched_at) {
            Ok(record) => records.push(record),
            Err(e) => log::warn!("ElToque: skipping {}: {}", code, e),
        }
    }
    if records.is_empty() {
        return Err(TasasError::Upstream(
            "ElToque sent no usable rates".to_string(),
        ));
    }
    records.sort_by(|a, b| a.currency.cmp(&b.currency));
    Ok(records)
}
