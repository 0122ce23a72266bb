//! Durable rate cache with SQLite
//!
//! Every fetched rate lands here before presentation. Keys are
//! (date, currency, source); values are decimal strings so quotes survive
//! storage exactly as the provider sent them. Historical rows never expire;
//! rows for the current day go stale after a TTL.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;

use crate::currency::Currency;
use crate::error::{Result, TasasError};
use crate::sources::{RateRecord, RateSource};

const LAST_UPDATE_KEY: &str = "last_update";

/// Aggregate view of the cache contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStatus {
    pub total_records: usize,
    pub distinct_currencies: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub last_update: Option<DateTime<Utc>>,
}

/// Rate cache with SQLite backend
pub struct RateStore {
    conn: Connection,
}

impl RateStore {
    /// Create or open the cache at path
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)
            .map_err(|e| TasasError::Storage(format!("Failed to open cache: {}", e)))?;

        let mut store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    /// Create in-memory cache (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| TasasError::Storage(format!("Failed to create in-memory cache: {}", e)))?;

        let mut store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&mut self) -> Result<()> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS rates (
                date TEXT NOT NULL,
                currency TEXT NOT NULL,
                source TEXT NOT NULL,
                value TEXT NOT NULL,
                fetched_at TEXT NOT NULL,
                PRIMARY KEY (date, currency, source)
            )",
                [],
            )
            .map_err(|e| TasasError::Storage(format!("Failed to create rates table: {}", e)))?;

        self.conn
            .execute(
                "CREATE INDEX IF NOT EXISTS idx_rates_source_date ON rates(source, date)",
                [],
            )
            .map_err(|e| TasasError::Storage(format!("Failed to create rates index: {}", e)))?;

        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
                [],
            )
            .map_err(|e| TasasError::Storage(format!("Failed to create meta table: {}", e)))?;

        Ok(())
    }

    /// Upsert a batch of rates in one transaction
    ///
    /// Each key is replaced whole so a reader never sees a half-written
    /// record. The batch also bumps the last-update marker.
    pub fn put_rates(&mut self, records: &[RateRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let tx = self
            .conn
            .transaction()
            .map_err(|e| TasasError::Storage(format!("Failed to begin transaction: {}", e)))?;

        for record in records {
            tx.execute(
                "INSERT OR REPLACE INTO rates (date, currency, source, value, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.date.to_string(),
                    record.currency.code(),
                    record.source.as_str(),
                    record.value.to_string(),
                    record.fetched_at.to_rfc3339(),
                ],
            )
            .map_err(|e| TasasError::Storage(format!("Failed to insert rate: {}", e)))?;
        }

        let newest = records.iter().map(|r| r.fetched_at).max();
        if let Some(ts) = newest {
            tx.execute(
                "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
                params![LAST_UPDATE_KEY, ts.to_rfc3339()],
            )
            .map_err(|e| TasasError::Storage(format!("Failed to update meta: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| TasasError::Storage(format!("Failed to commit rates: {}", e)))?;
        Ok(())
    }

    /// All rates for one date and source, ordered by currency
    pub fn get_rates(&self, date: NaiveDate, source: RateSource) -> Result<Vec<RateRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT date, currency, source, value, fetched_at FROM rates
                 WHERE date = ?1 AND source = ?2 ORDER BY currency",
            )
            .map_err(|e| TasasError::Storage(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![date.to_string(), source.as_str()], row_to_parts)
            .map_err(|e| TasasError::Storage(format!("Failed to query rates: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| TasasError::Storage(format!("Failed to read rates: {}", e)))?;

        rows.into_iter().map(parts_to_record).collect()
    }

    /// One rate by full key
    pub fn get_rate(
        &self,
        date: NaiveDate,
        currency: &Currency,
        source: RateSource,
    ) -> Result<Option<RateRecord>> {
        let parts = self
            .conn
            .query_row(
                "SELECT date, currency, source, value, fetched_at FROM rates
                 WHERE date = ?1 AND currency = ?2 AND source = ?3",
                params![date.to_string(), currency.code(), source.as_str()],
                row_to_parts,
            )
            .optional()
            .map_err(|e| TasasError::Storage(format!("Failed to get rate: {}", e)))?;

        parts.map(parts_to_record).transpose()
    }

    /// One currency's rates over an inclusive date window, ascending by date
    pub fn get_range(
        &self,
        currency: &Currency,
        source: RateSource,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RateRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT date, currency, source, value, fetched_at FROM rates
                 WHERE currency = ?1 AND source = ?2 AND date >= ?3 AND date <= ?4
                 ORDER BY date",
            )
            .map_err(|e| TasasError::Storage(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(
                params![
                    currency.code(),
                    source.as_str(),
                    start.to_string(),
                    end.to_string()
                ],
                row_to_parts,
            )
            .map_err(|e| TasasError::Storage(format!("Failed to query range: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| TasasError::Storage(format!("Failed to read range: {}", e)))?;

        rows.into_iter().map(parts_to_record).collect()
    }

    /// Whether cached rates for (date, source) can be served without a fetch
    ///
    /// Rows for a past date are fresh forever. Rows for `now`'s date are
    /// fresh while the newest fetch is strictly younger than the TTL.
    /// No rows means not fresh.
    pub fn is_fresh(
        &self,
        date: NaiveDate,
        source: RateSource,
        ttl_secs: u64,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let newest: Option<String> = self
            .conn
            .query_row(
                "SELECT MAX(fetched_at) FROM rates WHERE date = ?1 AND source = ?2",
                params![date.to_string(), source.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| TasasError::Storage(format!("Failed to check freshness: {}", e)))?;

        let Some(newest) = newest else {
            return Ok(false);
        };
        if date < now.date_naive() {
            return Ok(true);
        }
        let fetched_at = parse_timestamp(&newest)?;
        let age = now.signed_duration_since(fetched_at);
        Ok(age.num_seconds() >= 0 && (age.num_seconds() as u64) < ttl_secs)
    }

    /// Timestamp of the most recent successful batch write
    pub fn last_update(&self) -> Result<Option<DateTime<Utc>>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![LAST_UPDATE_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| TasasError::Storage(format!("Failed to read meta: {}", e)))?;

        value.map(|s| parse_timestamp(&s)).transpose()
    }

    /// Aggregate view for the `db status` query
    pub fn status(&self) -> Result<StoreStatus> {
        let (total, currencies, first, last): (i64, i64, Option<String>, Option<String>) = self
            .conn
            .query_row(
                "SELECT COUNT(*), COUNT(DISTINCT currency), MIN(date), MAX(date) FROM rates",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .map_err(|e| TasasError::Storage(format!("Failed to read status: {}", e)))?;

        Ok(StoreStatus {
            total_records: total as usize,
            distinct_currencies: currencies as usize,
            first_date: first.map(|s| parse_date(&s)).transpose()?,
            last_date: last.map(|s| parse_date(&s)).transpose()?,
            last_update: self.last_update()?,
        })
    }

    /// Drop every cached rate, returning how many rows went away
    pub fn clear(&mut self) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM rates", [])
            .map_err(|e| TasasError::Storage(format!("Failed to clear rates: {}", e)))?;
        self.conn
            .execute("DELETE FROM meta", [])
            .map_err(|e| TasasError::Storage(format!("Failed to clear meta: {}", e)))?;
        Ok(removed)
    }

    /// Total cached rate count
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM rates", [], |row| row.get(0))
            .map_err(|e| TasasError::Storage(format!("Failed to count rates: {}", e)))?;
        Ok(count as usize)
    }
}

type RowParts = (String, String, String, String, String);

fn row_to_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<RowParts> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn parts_to_record(parts: RowParts) -> Result<RateRecord> {
    let (date, currency, source, value, fetched_at) = parts;
    let source = RateSource::parse(&source)
        .ok_or_else(|| TasasError::Storage(format!("Unknown stored source: {}", source)))?;
    let value = Decimal::from_str(&value)
        .map_err(|e| TasasError::Storage(format!("Bad stored value {:?}: {}", value, e)))?;
    RateRecord::new(
        parse_date(&date)?,
        Currency::new(&currency)?,
        source,
        value,
        parse_timestamp(&fetched_at)?,
    )
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| TasasError::Storage(format!("Bad stored date {:?}: {}", s, e)))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TasasError::Storage(format!("Bad stored timestamp {:?}: {}", s, e)))
}
