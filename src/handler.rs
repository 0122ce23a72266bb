//! The host-facing entry point
//!
//! One call per input event: parse the text, execute the query, present the
//! outcome. Every failure path ends in guidance items; nothing escapes to
//! the host as a panic or an empty list. The handler owns no global state,
//! everything it needs is injected at construction.

use chrono::{NaiveDate, Utc};

use crate::config::Settings;
use crate::engine::RateEngine;
use crate::error::{Result, TasasError};
use crate::present::{ChartRenderer, DisplayItem, Presenter, SvgChartRenderer};
use crate::query::QueryParser;
use crate::sources::ProviderSet;
use crate::store::RateStore;

/// Parser, engine and presenter wired together for one process lifetime
pub struct QueryHandler {
    parser: QueryParser,
    engine: RateEngine,
    presenter: Presenter,
}

impl QueryHandler {
    /// Wire the full stack from settings: HTTP providers, SQLite cache,
    /// parser and presenter. A cache that cannot be opened degrades to
    /// network-only operation instead of failing the session.
    pub fn new(settings: &Settings) -> Result<Self> {
        let providers = ProviderSet::from_settings(settings)?;
        let store = match RateStore::new(&settings.resolved_db_path()) {
            Ok(store) => Some(store),
            Err(e) => {
                log::warn!("cache unavailable, running network-only: {}", e);
                None
            }
        };
        Ok(Self::from_parts(
            providers,
            store,
            settings,
            Some(Box::new(SvgChartRenderer::new())),
        ))
    }

    /// Assemble from explicit parts. Tests inject fake providers and an
    /// in-memory store here.
    pub fn from_parts(
        providers: ProviderSet,
        store: Option<RateStore>,
        settings: &Settings,
        chart: Option<Box<dyn ChartRenderer>>,
    ) -> Self {
        let engine = RateEngine::new(providers, store, settings);
        let parser = QueryParser::new(engine.book().clone());
        let mut presenter = Presenter::new(engine.book().clone(), settings.keyword.clone());
        if let Some(chart) = chart {
            presenter = presenter.with_chart(chart);
        }
        QueryHandler {
            parser,
            engine,
            presenter,
        }
    }

    /// One full query cycle anchored at the current date
    pub fn handle_query(&mut self, text: &str) -> Vec<DisplayItem> {
        self.handle_query_at(text, Utc::now().date_naive())
    }

    /// One full query cycle with an explicit `today`
    pub fn handle_query_at(&mut self, text: &str, today: NaiveDate) -> Vec<DisplayItem> {
        // Rejected input is guidance, not a fault, so it is not logged
        let query = match self.parser.parse(text, today) {
            Ok(query) => query,
            Err(e) => return self.presenter.present_error(&e),
        };
        match self.engine.execute(&query, today) {
            Ok(outcome) => self.presenter.present(&outcome),
            Err(e) => {
                if !matches!(e, TasasError::Query(_) | TasasError::UnknownCurrency(_)) {
                    log::warn!("query {:?} failed: {}", text, e);
                }
                self.presenter.present_error(&e)
            }
        }
    }

    /// `db rebuild` with a progress callback, for interactive callers
    pub fn rebuild_with_progress<F>(&mut self, progress: F) -> Vec<DisplayItem>
    where
        F: FnMut(u64, u64),
    {
        let today = Utc::now().date_naive();
        match self.engine.db_rebuild(today, progress) {
            Ok(outcome) => self.presenter.present(&outcome),
            Err(e) => self.presenter.present_error(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::Currency;
    use crate::sources::{RateFetch, RateRecord, RateSource};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    struct FakeSource {
        source: RateSource,
        table: Vec<(&'static str, &'static str)>,
        fail: bool,
    }

    impl RateFetch for FakeSource {
        fn source(&self) -> RateSource {
            self.source
        }

        fn fetch_current(&self) -> Result<Vec<RateRecord>> {
            self.fetch_historical(Utc::now().date_naive())
        }

        fn fetch_historical(&self, date: NaiveDate) -> Result<Vec<RateRecord>> {
            if self.fail {
                return Err(TasasError::Network("unreachable".to_string()));
            }
            self.table
                .iter()
                .map(|(code, value)| {
                    RateRecord::new(
                        date,
                        Currency::new(code).unwrap(),
                        self.source,
                        Decimal::from_str(value).unwrap(),
                        Utc::now(),
                    )
                })
                .collect()
        }
    }

    fn handler(fail: bool) -> QueryHandler {
        let providers = ProviderSet::new(
            Box::new(FakeSource {
                source: RateSource::Eltoque,
                table: vec![("USD", "400"), ("ECU", "420")],
                fail,
            }),
            Box::new(FakeSource {
                source: RateSource::International,
                table: vec![("EUR", "0.8")],
                fail,
            }),
        );
        let store = RateStore::new_in_memory().ok();
        QueryHandler::from_parts(providers, store, &Settings::default(), None)
    }

    #[test]
    fn test_empty_input_yields_menu() {
        let items = handler(false).handle_query("");
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_full_cycle_conversion() {
        let items = handler(false).handle_query("100 usd");
        assert_eq!(items.len(), 1);
        assert!(items[0].title.contains("= 40000.00 CUP"));
    }

    #[test]
    fn test_gibberish_yields_guidance() {
        let items = handler(false).handle_query("!!! ???");
        assert!(!items.is_empty());
        assert_eq!(items[0].title, "Invalid input");
    }

    #[test]
    fn test_network_failure_yields_guidance() {
        let items = handler(true).handle_query("usd");
        assert!(!items.is_empty());
        assert_eq!(items[0].title, "Network error");
    }

    #[test]
    fn test_rebuild_reports_progress() {
        let mut handler = handler(false);
        let mut ticks = 0u64;
        let items = handler.rebuild_with_progress(|done, total| {
            ticks += 1;
            assert!(done <= total);
        });
        assert_eq!(ticks, 30);
        assert!(items[0].title.contains("rebuilt"));
    }

    #[test]
    fn test_no_cycle_is_ever_empty() {
        let inputs = [
            "",
            "help",
            "usd",
            "100 usd to eur",
            "trend usd 7d",
            "compare",
            "db status",
            "db rebuild",
            "2030-01-01 usd",
            "0 usd",
            "garbage ### input",
        ];
        for fail in [false, true] {
            let mut handler = handler(fail);
            for input in inputs {
                let items = handler.handle_query(input);
                assert!(!items.is_empty(), "empty items for {:?}", input);
            }
        }
    }
}
