//! Query execution: read-through cache, conversion, trends, comparison
//!
//! One engine call serves one query cycle. Rates are served from the cache
//! while fresh, fetched otherwise, and written back on success. When a fetch
//! fails but stale cached rates exist, the stale rates are served and marked
//! so the presenter can say so. The engine runs without a store at all when
//! the cache could not be opened; it then fetches on every query.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;

use crate::config::Settings;
use crate::currency::{Currency, CurrencyBook};
use crate::error::{Result, TasasError};
use crate::query::Query;
use crate::sources::{ProviderSet, RateRecord, RateSource};
use crate::store::{RateStore, StoreStatus};
use crate::trend::{TrendSeries, TrendStats, TrendWindow};

/// Pegged at exactly 1 USD per unit for comparison purposes
const PEGGED_TO_USD: [&str; 2] = ["MLC", "USDT_TRC20"];

/// What a query produced, ready for presentation
#[derive(Debug)]
pub enum QueryOutcome {
    Menu,
    Help,
    Rates {
        source: RateSource,
        date: NaiveDate,
        rates: Vec<RateRecord>,
        /// Listed currencies the provider had nothing for
        missing: Vec<Currency>,
        /// Served from stale cache after a failed fetch
        stale: bool,
    },
    Conversion {
        source: RateSource,
        date: NaiveDate,
        amount: Decimal,
        from: Currency,
        to: Currency,
        result: Decimal,
        /// What 1 unit of `from` is worth in `to`
        unit_rate: Decimal,
        stale: bool,
    },
    Trend {
        series: TrendSeries,
        stats: Option<TrendStats>,
    },
    Comparison {
        date: NaiveDate,
        rows: Vec<CompareRow>,
    },
    Status(StoreStatus),
    Cleared {
        removed: usize,
    },
    Rebuilt(RebuildReport),
}

/// One side-by-side row: street value vs international value, in USD per unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareRow {
    pub currency: Currency,
    pub eltoque_usd: Option<Decimal>,
    pub international_usd: Option<Decimal>,
    /// international minus street; positive means the street discounts it
    pub delta: Option<Decimal>,
    pub delta_pct: Option<Decimal>,
}

/// What a cache rebuild managed to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildReport {
    pub days_requested: u32,
    pub eltoque_days_ok: u32,
    pub eltoque_days_failed: u32,
    pub international_ok: bool,
    pub records_stored: usize,
}

/// The query execution core
pub struct RateEngine {
    providers: ProviderSet,
    store: Option<RateStore>,
    book: CurrencyBook,
    ttl_secs: u64,
    rebuild_days: u32,
}

impl RateEngine {
    pub fn new(providers: ProviderSet, store: Option<RateStore>, settings: &Settings) -> Self {
        let book = CurrencyBook::with_overrides(
            &settings.currencies.aliases,
            &settings.currencies.display_names,
            &settings.currencies.icons,
        );
        Self {
            providers,
            store,
            book,
            ttl_secs: settings.cache.ttl_secs,
            rebuild_days: settings.cache.rebuild_days,
        }
    }

    pub fn book(&self) -> &CurrencyBook {
        &self.book
    }

    /// Execute one parsed query
    pub fn execute(&mut self, query: &Query, today: NaiveDate) -> Result<QueryOutcome> {
        match query {
            Query::Menu => Ok(QueryOutcome::Menu),
            Query::Help => Ok(QueryOutcome::Help),
            Query::ListRates { source, date } => self.list_rates(*source, *date),
            Query::Rate {
                source,
                currency,
                date,
            } => self.single_rate(*source, currency, *date),
            Query::Convert {
                source,
                amount,
                from,
                to,
                date,
            } => self.convert(*source, *amount, from.clone(), to.clone(), *date),
            Query::Trend {
                source,
                currency,
                window,
            } => self.trend(*source, currency.clone(), *window, today),
            Query::Compare { currency, date } => self.compare(currency.as_ref(), *date),
            Query::DbStatus => self.db_status(),
            Query::DbClear => self.db_clear(),
            Query::DbRebuild => self.db_rebuild(today, |_, _| {}),
        }
    }

    /// Cached rates for (source, date), fetching when the cache cannot serve
    ///
    /// Returns the records and whether they are stale leftovers after a
    /// failed fetch.
    fn rates_for(
        &mut self,
        source: RateSource,
        date: NaiveDate,
    ) -> Result<(Vec<RateRecord>, bool)> {
        let now = Utc::now();
        if let Some(store) = &self.store {
            if store.is_fresh(date, source, self.ttl_secs, now)? {
                let cached = store.get_rates(date, source)?;
                if !cached.is_empty() {
                    log::debug!("{}: serving {} from cache", source, date);
                    return Ok((cached, false));
                }
            }
        }

        let fetched = if date == now.date_naive() {
            self.providers.get(source).fetch_current()
        } else {
            self.providers.get(source).fetch_historical(date)
        };

        match fetched {
            Ok(records) => {
                if let Some(store) = &mut self.store {
                    store.put_rates(&records)?;
                }
                Ok((records, false))
            }
            Err(e) => {
                if let Some(store) = &self.store {
                    let leftovers = store.get_rates(date, source)?;
                    if !leftovers.is_empty() {
                        log::warn!("{}: fetch failed ({}), serving stale cache", source, e);
                        return Ok((leftovers, true));
                    }
                }
                Err(e)
            }
        }
    }

    fn list_rates(&mut self, source: RateSource, date: NaiveDate) -> Result<QueryOutcome> {
        let (records, stale) = self.rates_for(source, date)?;
        let listing = match source {
            RateSource::Eltoque => self.book.eltoque_listing(),
            RateSource::International => self.book.international_majors(),
        };

        let mut rates = Vec::new();
        let mut missing = Vec::new();
        for currency in &listing {
            match records.iter().find(|r| &r.currency == currency) {
                Some(record) => rates.push(record.clone()),
                None => missing.push(currency.clone()),
            }
        }
        // ElToque is a small world: a code we never listed is worth showing.
        // The international payload is huge, so it stays restricted to majors.
        if source == RateSource::Eltoque {
            let mut extras: Vec<RateRecord> = records
                .iter()
                .filter(|r| !listing.contains(&r.currency))
                .cloned()
                .collect();
            extras.sort_by(|a, b| a.currency.cmp(&b.currency));
            rates.extend(extras);
        }

        Ok(QueryOutcome::Rates {
            source,
            date,
            rates,
            missing,
            stale,
        })
    }

    fn single_rate(
        &mut self,
        source: RateSource,
        currency: &Currency,
        date: NaiveDate,
    ) -> Result<QueryOutcome> {
        let (records, stale) = self.rates_for(source, date)?;
        let record = match records.iter().find(|r| &r.currency == currency) {
            Some(record) => record.clone(),
            None if *currency == source.base() => {
                RateRecord::new(date, currency.clone(), source, Decimal::ONE, Utc::now())?
            }
            None => {
                return Err(TasasError::MissingRate {
                    currency: self.book.display(currency),
                    date: date.to_string(),
                    provider: source.to_string(),
                })
            }
        };
        Ok(QueryOutcome::Rates {
            source,
            date,
            rates: vec![record],
            missing: Vec::new(),
            stale,
        })
    }

    fn convert(
        &mut self,
        source: RateSource,
        amount: Decimal,
        from: Currency,
        to: Currency,
        date: NaiveDate,
    ) -> Result<QueryOutcome> {
        let (records, stale) = self.rates_for(source, date)?;
        let from_value = self.value_of(&records, source, &from, date)?;
        let to_value = self.value_of(&records, source, &to, date)?;

        let result = convert_value(source, amount, from_value, to_value)?;
        let unit_rate = convert_value(source, Decimal::ONE, from_value, to_value)?;

        Ok(QueryOutcome::Conversion {
            source,
            date,
            amount,
            from,
            to,
            result,
            unit_rate,
            stale,
        })
    }

    /// A currency's quoted value within one source's records
    ///
    /// The source's own base is worth exactly 1 and needs no record.
    fn value_of(
        &self,
        records: &[RateRecord],
        source: RateSource,
        currency: &Currency,
        date: NaiveDate,
    ) -> Result<Decimal> {
        if *currency == source.base() {
            return Ok(Decimal::ONE);
        }
        records
            .iter()
            .find(|r| &r.currency == currency)
            .map(|r| r.value)
            .ok_or_else(|| TasasError::MissingRate {
                currency: self.book.display(currency),
                date: date.to_string(),
                provider: source.to_string(),
            })
    }

    fn trend(
        &mut self,
        source: RateSource,
        currency: Currency,
        window: TrendWindow,
        today: NaiveDate,
    ) -> Result<QueryOutcome> {
        let start = window.start(today);

        if self.store.is_none() {
            // Network-only mode, nothing cached to reconcile against
            let records = self.providers.get(source).fetch_window(start, today)?;
            let series = TrendSeries::from_records(currency, source, window, &records);
            let stats = series.stats();
            return Ok(QueryOutcome::Trend { series, stats });
        }

        let mut records = self
            .require_store()?
            .get_range(&currency, source, start, today)?;

        // Every uncached day gets a resolution attempt; days the provider
        // cannot fill stay as gaps in the series
        let missing = missing_dates(&records, start, today);
        if !missing.is_empty() {
            match self.fetch_missing_days(source, &missing, start, today) {
                Ok(fetched) => {
                    let store = self.require_store_mut()?;
                    store.put_rates(&fetched)?;
                    records = store.get_range(&currency, source, start, today)?;
                }
                Err(e) => {
                    log::warn!("{}: trend backfill failed: {}", source, e);
                    if records.is_empty() {
                        return Err(e);
                    }
                }
            }
        }

        let series = TrendSeries::from_records(currency, source, window, &records);
        let stats = series.stats();
        Ok(QueryOutcome::Trend { series, stats })
    }

    /// Fetch the days a trend window is missing. The international source
    /// answers the whole window in one timeseries request; TRMI has no such
    /// endpoint, so each missing day is its own request.
    fn fetch_missing_days(
        &self,
        source: RateSource,
        missing: &[NaiveDate],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RateRecord>> {
        let provider = self.providers.get(source);
        match source {
            RateSource::International => provider.fetch_window(start, end),
            RateSource::Eltoque => {
                let mut records = Vec::new();
                let mut last_err = None;
                for &day in missing {
                    match provider.fetch_historical(day) {
                        Ok(mut day_records) => records.append(&mut day_records),
                        Err(e) => {
                            log::warn!("eltoque: no rates for {}: {}", day, e);
                            last_err = Some(e);
                        }
                    }
                }
                match (records.is_empty(), last_err) {
                    (true, Some(e)) => Err(e),
                    _ => Ok(records),
                }
            }
        }
    }

    fn compare(&mut self, currency: Option<&Currency>, date: NaiveDate) -> Result<QueryOutcome> {
        let candidates = match currency {
            Some(c) => vec![c.clone()],
            None => self.book.compare_set(),
        };

        let eltoque = self
            .rates_for(RateSource::Eltoque, date)
            .map(|(records, _)| records);
        let international = self
            .rates_for(RateSource::International, date)
            .map(|(records, _)| records);
        if let (Err(e), Err(_)) = (&eltoque, &international) {
            return Err(TasasError::Network(format!(
                "neither source is reachable: {}",
                e
            )));
        }

        let usd_cup = eltoque
            .as_ref()
            .ok()
            .and_then(|records| value_in(records, "USD"));

        let mut rows = Vec::new();
        for candidate in candidates {
            let street = match (&eltoque, usd_cup) {
                (Ok(records), Some(usd_cup)) => {
                    value_in(records, candidate.code()).map(|v| v / usd_cup)
                }
                _ => None,
            };

            let official = if PEGGED_TO_USD.contains(&candidate.code()) {
                Some(Decimal::ONE)
            } else {
                // ECU is quoted abroad as EUR
                let abroad = self.book.market_code(&candidate);
                international
                    .as_ref()
                    .ok()
                    .and_then(|records| value_in(records, abroad.code()))
                    .map(|per_usd| Decimal::ONE / per_usd)
            };

            let (delta, delta_pct) = match (street, official) {
                (Some(s), Some(o)) => {
                    let delta = o - s;
                    // Percent change is relative to the street rate
                    let pct = if s.is_zero() {
                        None
                    } else {
                        Some(delta / s * Decimal::from(100))
                    };
                    (Some(delta), pct)
                }
                _ => (None, None),
            };

            rows.push(CompareRow {
                currency: candidate,
                eltoque_usd: street,
                international_usd: official,
                delta,
                delta_pct,
            });
        }

        Ok(QueryOutcome::Comparison { date, rows })
    }

    fn db_status(&self) -> Result<QueryOutcome> {
        let store = self.require_store()?;
        Ok(QueryOutcome::Status(store.status()?))
    }

    fn db_clear(&mut self) -> Result<QueryOutcome> {
        let store = self.require_store_mut()?;
        Ok(QueryOutcome::Cleared {
            removed: store.clear()?,
        })
    }

    /// Re-fetch the trailing window into the cache: one ElToque request per
    /// day plus one international window request. `progress` receives
    /// (done, total) after each ElToque day.
    pub fn db_rebuild<F>(&mut self, today: NaiveDate, mut progress: F) -> Result<QueryOutcome>
    where
        F: FnMut(u64, u64),
    {
        self.require_store()?;
        let days = self.rebuild_days;
        let start = today - chrono::Duration::days(i64::from(days) - 1);

        let mut report = RebuildReport {
            days_requested: days,
            eltoque_days_ok: 0,
            eltoque_days_failed: 0,
            international_ok: false,
            records_stored: 0,
        };

        let mut day = start;
        let mut done = 0u64;
        while day <= today {
            match self.providers.get(RateSource::Eltoque).fetch_historical(day) {
                Ok(records) => {
                    report.records_stored += records.len();
                    self.require_store_mut()?.put_rates(&records)?;
                    report.eltoque_days_ok += 1;
                }
                Err(e) => {
                    log::warn!("rebuild: no ElToque rates for {}: {}", day, e);
                    report.eltoque_days_failed += 1;
                }
            }
            done += 1;
            progress(done, u64::from(days));
            day += chrono::Duration::days(1);
        }

        match self
            .providers
            .get(RateSource::International)
            .fetch_window(start, today)
        {
            Ok(records) => {
                report.records_stored += records.len();
                self.require_store_mut()?.put_rates(&records)?;
                report.international_ok = true;
            }
            Err(e) => log::warn!("rebuild: international window failed: {}", e),
        }

        Ok(QueryOutcome::Rebuilt(report))
    }

    fn require_store(&self) -> Result<&RateStore> {
        self.store
            .as_ref()
            .ok_or_else(|| TasasError::Storage("the rate cache is unavailable".to_string()))
    }

    fn require_store_mut(&mut self) -> Result<&mut RateStore> {
        self.store
            .as_mut()
            .ok_or_else(|| TasasError::Storage("the rate cache is unavailable".to_string()))
    }
}

/// Convert an amount between two currencies quoted in the same source,
/// going through the source's base in exact decimals.
///
/// Amounts the 96-bit decimal range cannot hold come back as query
/// guidance rather than a panic.
pub fn convert_value(
    source: RateSource,
    amount: Decimal,
    from_value: Decimal,
    to_value: Decimal,
) -> Result<Decimal> {
    let converted = match source {
        // Values are CUP per unit: CUP-worth of `from`, divided into `to`
        RateSource::Eltoque => amount
            .checked_mul(from_value)
            .and_then(|in_cup| in_cup.checked_div(to_value)),
        // Values are units per USD: through USD the other way around
        RateSource::International => amount
            .checked_mul(to_value)
            .and_then(|in_usd| in_usd.checked_div(from_value)),
    };
    converted.ok_or_else(|| TasasError::Query(format!("{} is too large to convert", amount)))
}

fn value_in(records: &[RateRecord], code: &str) -> Option<Decimal> {
    records
        .iter()
        .find(|r| r.currency.code() == code)
        .map(|r| r.value)
}

/// Days in `[start, end]` with no record
fn missing_dates(records: &[RateRecord], start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let have: HashSet<NaiveDate> = records.iter().map(|r| r.date).collect();
    let mut missing = Vec::new();
    let mut day = start;
    while day <= end {
        if !have.contains(&day) {
            missing.push(day);
        }
        day += chrono::Duration::days(1);
    }
    missing
}
