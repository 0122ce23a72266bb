//! Turning query outcomes into selectable display items
//!
//! The host renders whatever list it receives, so every outcome and every
//! error maps to at least one item here. Rounding to display precision
//! happens in this module and nowhere earlier: ElToque quotes show 2
//! decimals, international quotes 4. Trend charts go through the
//! `ChartRenderer` seam so tests never touch the filesystem.

use std::env;
use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::currency::{Currency, CurrencyBook};
use crate::engine::{CompareRow, QueryOutcome, RebuildReport};
use crate::error::{Result, TasasError};
use crate::sources::{RateRecord, RateSource};
use crate::store::StoreStatus;
use crate::trend::{TrendSeries, TrendStats};

/// One selectable row handed back to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayItem {
    pub title: String,
    pub subtitle: String,
    pub icon: Option<String>,
    pub action: ItemAction,
}

/// What selecting an item does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemAction {
    /// Put text on the clipboard
    Copy(String),
    /// Open a rendered file
    Open(PathBuf),
    /// Replace the query text and keep typing
    SetQuery(String),
}

impl DisplayItem {
    pub fn new(title: impl Into<String>, subtitle: impl Into<String>, action: ItemAction) -> Self {
        DisplayItem {
            title: title.into(),
            subtitle: subtitle.into(),
            icon: None,
            action,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// Draws a trend series to a file and returns its path
pub trait ChartRenderer {
    fn render(&self, series: &TrendSeries) -> Result<PathBuf>;
}

/// Formats outcomes and errors into display items
pub struct Presenter {
    book: CurrencyBook,
    keyword: String,
    chart: Option<Box<dyn ChartRenderer>>,
}

impl Presenter {
    pub fn new(book: CurrencyBook, keyword: impl Into<String>) -> Self {
        Presenter {
            book,
            keyword: keyword.into(),
            chart: None,
        }
    }

    pub fn with_chart(mut self, chart: Box<dyn ChartRenderer>) -> Self {
        self.chart = Some(chart);
        self
    }

    /// Render an outcome. Never returns an empty list.
    pub fn present(&self, outcome: &QueryOutcome) -> Vec<DisplayItem> {
        match outcome {
            QueryOutcome::Menu => self.menu_items(),
            QueryOutcome::Help => self.help_items(),
            QueryOutcome::Rates {
                source,
                date,
                rates,
                missing,
                stale,
            } => self.rates_items(*source, *date, rates, missing, *stale),
            QueryOutcome::Conversion {
                source,
                date,
                amount,
                from,
                to,
                result,
                unit_rate,
                stale,
            } => {
                let from_name = self.book.display(from);
                let to_name = self.book.display(to);
                let result_str = format!("{:.2}", result);
                let rate_str = format_rate(*unit_rate, *source);

                let mut items = Vec::new();
                if *stale {
                    items.push(offline_banner(*date));
                }
                let mut item = DisplayItem::new(
                    format!("{} {} = {} {}", amount, from_name, result_str, to_name),
                    format!("1 {} = {} {} on {}", from_name, rate_str, to_name, date),
                    ItemAction::Copy(result_str),
                );
                if let Some(icon) = self.book.icon(from) {
                    item = item.with_icon(icon);
                }
                items.push(item);
                items
            }
            QueryOutcome::Trend { series, stats } => self.trend_items(series, stats.as_ref()),
            QueryOutcome::Comparison { date, rows } => self.comparison_items(*date, rows),
            QueryOutcome::Status(status) => self.status_items(status),
            QueryOutcome::Cleared { removed } => vec![DisplayItem::new(
                "Cache cleared",
                format!("{} stored rates removed", removed),
                ItemAction::Copy(removed.to_string()),
            )],
            QueryOutcome::Rebuilt(report) => self.rebuilt_items(report),
        }
    }

    /// Render an error as guidance. Never returns an empty list.
    pub fn present_error(&self, error: &TasasError) -> Vec<DisplayItem> {
        let (title, subtitle) = match error {
            TasasError::Query(msg) => ("Invalid input".to_string(), msg.clone()),
            TasasError::UnknownCurrency(code) => (
                format!("Unknown currency: {}", code),
                "Try usd, eur, mlc, transfer or usdt, or an ISO code after inter".to_string(),
            ),
            TasasError::Network(msg) => (
                "Network error".to_string(),
                format!("{}, cached rates are shown when available", msg),
            ),
            TasasError::Auth(_) => (
                "API key problem".to_string(),
                "Set a valid ElToque API key in the settings".to_string(),
            ),
            TasasError::RateLimited(_) => (
                "Rate limit exceeded".to_string(),
                "Please wait a few minutes before trying again".to_string(),
            ),
            TasasError::Upstream(msg) => ("Provider error".to_string(), msg.clone()),
            TasasError::Storage(msg) => (
                "Cache problem".to_string(),
                format!("{}, queries fall back to the network", msg),
            ),
            TasasError::MissingRate { .. } => ("No rate found".to_string(), error.to_string()),
            other => ("Error".to_string(), other.to_string()),
        };
        vec![DisplayItem::new(title, subtitle.clone(), ItemAction::Copy(subtitle))]
    }

    fn menu_items(&self) -> Vec<DisplayItem> {
        vec![
            DisplayItem::new(
                "ElToque rates",
                "Cuban informal market rates in CUP",
                ItemAction::SetQuery(format!("{} eltoque", self.keyword)),
            ),
            DisplayItem::new(
                "International rates",
                "Major currencies against the US dollar",
                ItemAction::SetQuery(format!("{} inter", self.keyword)),
            ),
            DisplayItem::new(
                "Compare rates",
                "ElToque street rates against international markets",
                ItemAction::SetQuery(format!("{} compare", self.keyword)),
            ),
        ]
    }

    fn help_items(&self) -> Vec<DisplayItem> {
        let entries = [
            ("Rates", "Type a currency or nothing: usd, eur, mlc", "usd"),
            ("Conversion", "100 usd, or 100 usd to eur", "100 usd to eur"),
            (
                "International",
                "inter, inter eur, inter 100 usd to jpy",
                "inter 100 usd to jpy",
            ),
            (
                "Historical",
                "history 2024-03-01, or put a date in any query",
                "history 2024-03-01",
            ),
            (
                "Trends",
                "usd trend 30d, windows are 7d, 30d, 3m, 6m, 1y",
                "usd trend 30d",
            ),
            ("Compare", "compare, or compare eur", "compare eur"),
            ("Cache", "db status, db clear, db rebuild", "db status"),
        ];
        entries
            .iter()
            .map(|(title, subtitle, example)| {
                DisplayItem::new(*title, *subtitle, ItemAction::Copy((*example).to_string()))
            })
            .collect()
    }

    fn rates_items(
        &self,
        source: RateSource,
        date: NaiveDate,
        rates: &[RateRecord],
        missing: &[Currency],
        stale: bool,
    ) -> Vec<DisplayItem> {
        let mut items = Vec::new();
        if stale {
            items.push(offline_banner(date));
        }
        if rates.len() + missing.len() > 1 {
            let (title, subtitle) = match source {
                RateSource::Eltoque => (
                    format!("ElToque rates for {}", date),
                    "CUP per unit, informal market".to_string(),
                ),
                RateSource::International => (
                    format!("International rates for {}", date),
                    "Units per 1 USD".to_string(),
                ),
            };
            items.push(DisplayItem::new(title, subtitle, ItemAction::Copy(date.to_string())));
        }
        for record in rates {
            let name = self.book.display(&record.currency);
            let value = format_rate(record.value, source);
            let (title, subtitle) = match source {
                RateSource::Eltoque => (
                    format!("{}: {} CUP", name, value),
                    format!("1 {} = {} CUP on {}", name, value, record.date),
                ),
                RateSource::International => (
                    format!("{}: {}", name, value),
                    format!("1 USD = {} {} on {}", value, name, record.date),
                ),
            };
            let mut item = DisplayItem::new(title, subtitle, ItemAction::Copy(value));
            if let Some(icon) = self.book.icon(&record.currency) {
                item = item.with_icon(icon);
            }
            items.push(item);
        }
        for currency in missing {
            let name = self.book.display(currency);
            items.push(DisplayItem::new(
                format!("{}: no rate", name),
                format!("{} published no {} quote for {}", source, name, date),
                ItemAction::Copy(name),
            ));
        }
        items
    }

    fn trend_items(&self, series: &TrendSeries, stats: Option<&TrendStats>) -> Vec<DisplayItem> {
        let name = self.book.display(&series.currency);
        let label = series.window.label();
        let Some(stats) = stats else {
            return vec![DisplayItem::new(
                format!("Not enough data for a {} trend", name),
                "At least two days are needed, run db rebuild to backfill the cache",
                ItemAction::Copy("db rebuild".to_string()),
            )];
        };

        let change = format_rate(stats.change, series.source);
        let headline = format!("Change: {} ({:.2}%)", change, stats.change_pct);
        let spread = format!(
            "Min: {} | Max: {} | Avg: {}",
            format_rate(stats.min, series.source),
            format_rate(stats.max, series.source),
            format_rate(stats.avg, series.source)
        );
        let span = format!("From {} to {}", stats.first.date, stats.last.date);

        let mut items = vec![
            DisplayItem::new(
                format!("{} trend ({}) {}", name, label, stats.direction().arrow()),
                headline.clone(),
                ItemAction::Copy(format!("{} {}: {}", name, label, headline)),
            ),
            DisplayItem::new(
                format!("Statistics for {}", label),
                spread.clone(),
                ItemAction::Copy(spread),
            ),
            DisplayItem::new(
                format!("Data points: {}", series.len()),
                span.clone(),
                ItemAction::Copy(span),
            ),
        ];
        if let Some(chart) = &self.chart {
            match chart.render(series) {
                Ok(path) => items.push(DisplayItem::new(
                    "Open chart",
                    format!("Line chart for {} over {}", name, label),
                    ItemAction::Open(path),
                )),
                Err(e) => {
                    log::warn!("chart rendering failed: {}", e);
                    items.push(DisplayItem::new(
                        "Chart unavailable",
                        e.to_string(),
                        ItemAction::Copy(e.to_string()),
                    ));
                }
            }
        }
        items
    }

    fn comparison_items(&self, date: NaiveDate, rows: &[CompareRow]) -> Vec<DisplayItem> {
        let mut items = vec![DisplayItem::new(
            "Rate comparison: ElToque vs international",
            format!("USD value of each currency on {}", date),
            ItemAction::Copy(date.to_string()),
        )];
        for row in rows {
            let name = self.book.display(&row.currency);
            let street = row
                .eltoque_usd
                .map(|v| format!("${:.4}", v))
                .unwrap_or_else(|| "unavailable".to_string());
            let official = row
                .international_usd
                .map(|v| format!("${:.4}", v))
                .unwrap_or_else(|| "unavailable".to_string());

            let mut subtitle = format!("ElToque: {} | Int'l: {}", street, official);
            if let (Some(delta), Some(pct)) = (row.delta, row.delta_pct) {
                let word = if delta > Decimal::ZERO {
                    "lower"
                } else if delta < Decimal::ZERO {
                    "higher"
                } else {
                    "equal"
                };
                subtitle.push_str(&format!(" | Diff: {:.2}% {}", pct, word));
            }
            items.push(DisplayItem::new(
                format!("{}: ElToque vs international", name),
                subtitle.clone(),
                ItemAction::Copy(format!("{}: {}", name, subtitle)),
            ));
        }
        items
    }

    fn status_items(&self, status: &StoreStatus) -> Vec<DisplayItem> {
        let span = match (status.first_date, status.last_date) {
            (Some(first), Some(last)) => format!("{} to {}", first, last),
            _ => "empty".to_string(),
        };
        let summary = format!(
            "{} records, {} currencies, {}",
            status.total_records, status.distinct_currencies, span
        );
        let last_update = status
            .last_update
            .map(|ts| ts.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        vec![
            DisplayItem::new("Cache status", summary.clone(), ItemAction::Copy(summary)),
            DisplayItem::new(
                "Last update",
                last_update.clone(),
                ItemAction::Copy(last_update),
            ),
        ]
    }

    fn rebuilt_items(&self, report: &RebuildReport) -> Vec<DisplayItem> {
        let international = if report.international_ok { "ok" } else { "failed" };
        let mut items = vec![DisplayItem::new(
            "Cache rebuilt",
            format!(
                "{}/{} ElToque days fetched, international {}, {} records stored",
                report.eltoque_days_ok, report.days_requested, international, report.records_stored
            ),
            ItemAction::Copy(report.records_stored.to_string()),
        )];
        if report.eltoque_days_failed > 0 {
            items.push(DisplayItem::new(
                format!("{} days had no data", report.eltoque_days_failed),
                "Days without published rates were skipped",
                ItemAction::Copy(report.eltoque_days_failed.to_string()),
            ));
        }
        items
    }
}

/// Shown first when a listing was served from stale cache
fn offline_banner(date: NaiveDate) -> DisplayItem {
    DisplayItem::new(
        format!("Offline mode, {}", date),
        "Using locally stored data (network unavailable)",
        ItemAction::Copy("offline".to_string()),
    )
}

/// Display precision per source. ElToque quotes whole CUP amounts,
/// international quotes are often sub-unit.
fn format_rate(value: Decimal, source: RateSource) -> String {
    match source {
        RateSource::Eltoque => format!("{:.2}", value),
        RateSource::International => format!("{:.4}", value),
    }
}

const CHART_WIDTH: f64 = 640.0;
const CHART_HEIGHT: f64 = 360.0;
const CHART_MARGIN: f64 = 40.0;

/// Built-in renderer: a plain SVG polyline written to a directory,
/// the system temp dir by default
pub struct SvgChartRenderer {
    out_dir: PathBuf,
}

impl SvgChartRenderer {
    pub fn new() -> Self {
        SvgChartRenderer {
            out_dir: env::temp_dir(),
        }
    }

    pub fn with_dir(out_dir: impl Into<PathBuf>) -> Self {
        SvgChartRenderer {
            out_dir: out_dir.into(),
        }
    }
}

impl Default for SvgChartRenderer {
    fn default() -> Self {
        SvgChartRenderer::new()
    }
}

impl ChartRenderer for SvgChartRenderer {
    fn render(&self, series: &TrendSeries) -> Result<PathBuf> {
        if series.len() < 2 {
            return Err(TasasError::Chart(
                "need at least two points to draw a line".to_string(),
            ));
        }
        // Chart coordinates are presentation only, f64 is fine here
        let values: Vec<f64> = series
            .points
            .iter()
            .map(|p| p.value.to_f64().unwrap_or(0.0))
            .collect();
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let span = if (max - min).abs() < f64::EPSILON {
            1.0
        } else {
            max - min
        };

        let plot_w = CHART_WIDTH - 2.0 * CHART_MARGIN;
        let plot_h = CHART_HEIGHT - 2.0 * CHART_MARGIN;
        let step = plot_w / (values.len() - 1) as f64;
        let points: Vec<String> = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let x = CHART_MARGIN + step * i as f64;
                let y = CHART_MARGIN + plot_h * (1.0 - (v - min) / span);
                format!("{:.1},{:.1}", x, y)
            })
            .collect();

        let first = &series.points[0];
        let last = &series.points[series.len() - 1];
        let title = format!(
            "{} {} ({} to {})",
            series.currency,
            series.window.label(),
            first.date,
            last.date
        );

        let mut svg = String::new();
        svg.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\" height=\"{}\">\n",
            CHART_WIDTH, CHART_HEIGHT
        ));
        svg.push_str("<rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");
        svg.push_str(&format!(
            "<text x=\"{}\" y=\"24\" font-family=\"monospace\" font-size=\"14\">{}</text>\n",
            CHART_MARGIN, title
        ));
        svg.push_str(&format!(
            "<text x=\"4\" y=\"{}\" font-family=\"monospace\" font-size=\"11\">{:.4}</text>\n",
            CHART_MARGIN + 4.0,
            max
        ));
        svg.push_str(&format!(
            "<text x=\"4\" y=\"{}\" font-family=\"monospace\" font-size=\"11\">{:.4}</text>\n",
            CHART_HEIGHT - CHART_MARGIN,
            min
        ));
        svg.push_str(&format!(
            "<polyline fill=\"none\" stroke=\"#2f6f4f\" stroke-width=\"2\" points=\"{}\"/>\n",
            points.join(" ")
        ));
        svg.push_str("</svg>\n");

        let file_name = format!(
            "tasas-{}-{}.svg",
            series.currency.code().to_lowercase(),
            series.window.label()
        );
        let path = self.out_dir.join(file_name);
        fs::write(&path, svg)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trend::{TrendPoint, TrendWindow};
    use chrono::Utc;
    use std::str::FromStr;
    use std::sync::{Arc, Mutex};

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn presenter() -> Presenter {
        Presenter::new(CurrencyBook::default(), "tasas")
    }

    fn record(code: &str, value: &str, source: RateSource) -> RateRecord {
        RateRecord::new(
            d(2024, 5, 10),
            Currency::new(code).unwrap(),
            source,
            dec(value),
            Utc::now(),
        )
        .unwrap()
    }

    fn series_of(points: &[(&str, &str)]) -> TrendSeries {
        TrendSeries {
            currency: Currency::usd(),
            source: RateSource::Eltoque,
            window: TrendWindow::Days7,
            points: points
                .iter()
                .map(|(date, value)| TrendPoint {
                    date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
                    value: dec(value),
                })
                .collect(),
        }
    }

    struct RecordingChart {
        rendered: Arc<Mutex<Vec<String>>>,
    }

    impl ChartRenderer for RecordingChart {
        fn render(&self, series: &TrendSeries) -> Result<PathBuf> {
            self.rendered
                .lock()
                .unwrap()
                .push(series.currency.code().to_string());
            Ok(PathBuf::from("/tmp/fake-chart.svg"))
        }
    }

    #[test]
    fn test_menu_navigates() {
        let items = presenter().present(&QueryOutcome::Menu);
        assert_eq!(items.len(), 3);
        for item in &items {
            match &item.action {
                ItemAction::SetQuery(text) => assert!(text.starts_with("tasas ")),
                other => panic!("unexpected action {:?}", other),
            }
        }
    }

    #[test]
    fn test_help_is_a_catalogue() {
        let items = presenter().present(&QueryOutcome::Help);
        assert!(items.len() >= 5);
        for item in &items {
            assert!(!item.title.is_empty());
            assert!(!item.subtitle.is_empty());
        }
    }

    #[test]
    fn test_eltoque_listing_items() {
        let outcome = QueryOutcome::Rates {
            source: RateSource::Eltoque,
            date: d(2024, 5, 10),
            rates: vec![
                record("USD", "400", RateSource::Eltoque),
                record("ECU", "420.5", RateSource::Eltoque),
            ],
            missing: vec![Currency::new("TRX").unwrap()],
            stale: false,
        };
        let items = presenter().present(&outcome);
        // Header, two rates, one failure marker
        assert_eq!(items.len(), 4);
        assert_eq!(items[1].title, "USD: 400.00 CUP");
        assert_eq!(items[2].title, "EUR: 420.50 CUP");
        assert_eq!(items[3].title, "TRANSFER: no rate");
    }

    #[test]
    fn test_stale_listing_leads_with_offline_banner() {
        let outcome = QueryOutcome::Rates {
            source: RateSource::Eltoque,
            date: d(2024, 5, 10),
            rates: vec![record("USD", "400", RateSource::Eltoque)],
            missing: vec![],
            stale: true,
        };
        let items = presenter().present(&outcome);
        assert!(items[0].title.starts_with("Offline mode"));
    }

    #[test]
    fn test_international_listing_four_decimals() {
        let outcome = QueryOutcome::Rates {
            source: RateSource::International,
            date: d(2024, 5, 10),
            rates: vec![
                record("EUR", "0.8", RateSource::International),
                record("JPY", "150", RateSource::International),
            ],
            missing: vec![],
            stale: false,
        };
        let items = presenter().present(&outcome);
        assert_eq!(items[1].title, "EUR: 0.8000");
        assert!(items[1].subtitle.contains("1 USD = 0.8000 EUR"));
    }

    #[test]
    fn test_single_rate_has_no_header() {
        let outcome = QueryOutcome::Rates {
            source: RateSource::Eltoque,
            date: d(2024, 5, 10),
            rates: vec![record("USD", "400", RateSource::Eltoque)],
            missing: vec![],
            stale: false,
        };
        let items = presenter().present(&outcome);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "USD: 400.00 CUP");
    }

    #[test]
    fn test_listing_uses_configured_icons() {
        let mut icons = std::collections::HashMap::new();
        icons.insert("USD".to_string(), "images/usd.png".to_string());
        let book = CurrencyBook::with_overrides(
            &std::collections::HashMap::new(),
            &std::collections::HashMap::new(),
            &icons,
        );
        let presenter = Presenter::new(book, "tasas");
        let outcome = QueryOutcome::Rates {
            source: RateSource::Eltoque,
            date: d(2024, 5, 10),
            rates: vec![record("USD", "400", RateSource::Eltoque)],
            missing: vec![],
            stale: false,
        };
        let items = presenter.present(&outcome);
        assert_eq!(items[0].icon.as_deref(), Some("images/usd.png"));
    }

    #[test]
    fn test_conversion_item() {
        let outcome = QueryOutcome::Conversion {
            source: RateSource::Eltoque,
            date: d(2024, 5, 10),
            amount: dec("100"),
            from: Currency::usd(),
            to: Currency::cup(),
            result: dec("40000"),
            unit_rate: dec("400"),
            stale: false,
        };
        let items = presenter().present(&outcome);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "100 USD = 40000.00 CUP");
        assert_eq!(items[0].subtitle, "1 USD = 400.00 CUP on 2024-05-10");
        assert_eq!(items[0].action, ItemAction::Copy("40000.00".to_string()));
    }

    #[test]
    fn test_trend_items_with_chart() {
        let rendered = Arc::new(Mutex::new(Vec::new()));
        let presenter = presenter().with_chart(Box::new(RecordingChart {
            rendered: rendered.clone(),
        }));
        let series = series_of(&[
            ("2024-05-08", "390"),
            ("2024-05-09", "395"),
            ("2024-05-10", "400"),
        ]);
        let stats = series.stats();
        let items = presenter.present(&QueryOutcome::Trend { series, stats });

        assert_eq!(items.len(), 4);
        assert!(items[0].title.contains('\u{2191}'));
        assert!(items[0].subtitle.contains("Change: 10.00"));
        assert!(items[1].subtitle.contains("Min: 390.00"));
        assert!(items[2].title.contains("Data points: 3"));
        assert!(matches!(items[3].action, ItemAction::Open(_)));
        assert_eq!(rendered.lock().unwrap().as_slice(), ["USD"]);
    }

    #[test]
    fn test_trend_without_data_guides() {
        let series = series_of(&[]);
        let items = presenter().present(&QueryOutcome::Trend {
            series,
            stats: None,
        });
        assert_eq!(items.len(), 1);
        assert!(items[0].subtitle.contains("db rebuild"));
    }

    #[test]
    fn test_comparison_rows() {
        let outcome = QueryOutcome::Comparison {
            date: d(2024, 5, 10),
            rows: vec![CompareRow {
                currency: Currency::new("ECU").unwrap(),
                eltoque_usd: Some(dec("1.05")),
                international_usd: Some(dec("1.25")),
                delta: Some(dec("0.2")),
                delta_pct: Some(dec("16")),
            }],
        };
        let items = presenter().present(&outcome);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].title, "EUR: ElToque vs international");
        assert!(items[1].subtitle.contains("$1.0500"));
        assert!(items[1].subtitle.contains("$1.2500"));
        assert!(items[1].subtitle.contains("16.00% lower"));
    }

    #[test]
    fn test_comparison_partial_row() {
        let outcome = QueryOutcome::Comparison {
            date: d(2024, 5, 10),
            rows: vec![CompareRow {
                currency: Currency::new("ECU").unwrap(),
                eltoque_usd: None,
                international_usd: Some(dec("1.25")),
                delta: None,
                delta_pct: None,
            }],
        };
        let items = presenter().present(&outcome);
        assert!(items[1].subtitle.contains("unavailable"));
        assert!(!items[1].subtitle.contains("Diff"));
    }

    #[test]
    fn test_status_cleared_rebuilt_items() {
        let status = StoreStatus {
            total_records: 42,
            distinct_currencies: 5,
            first_date: Some(d(2024, 4, 10)),
            last_date: Some(d(2024, 5, 10)),
            last_update: Some(Utc::now()),
        };
        let items = presenter().present(&QueryOutcome::Status(status));
        assert_eq!(items.len(), 2);
        assert!(items[0].subtitle.contains("42 records"));
        assert!(items[0].subtitle.contains("2024-04-10 to 2024-05-10"));

        let items = presenter().present(&QueryOutcome::Cleared { removed: 7 });
        assert!(items[0].subtitle.contains('7'));

        let report = RebuildReport {
            days_requested: 30,
            eltoque_days_ok: 28,
            eltoque_days_failed: 2,
            international_ok: true,
            records_stored: 150,
        };
        let items = presenter().present(&QueryOutcome::Rebuilt(report));
        assert_eq!(items.len(), 2);
        assert!(items[0].subtitle.contains("28/30"));
        assert!(items[1].title.contains("2 days"));
    }

    #[test]
    fn test_every_error_is_guidance() {
        let errors = vec![
            TasasError::Query("bad input".to_string()),
            TasasError::UnknownCurrency("ZZZZ".to_string()),
            TasasError::Network("timed out".to_string()),
            TasasError::Auth("key rejected".to_string()),
            TasasError::RateLimited("429".to_string()),
            TasasError::Upstream("bad payload".to_string()),
            TasasError::Storage("disk full".to_string()),
            TasasError::Config("bad keyword".to_string()),
            TasasError::MissingRate {
                currency: "EUR".to_string(),
                date: "2024-05-10".to_string(),
                provider: "eltoque".to_string(),
            },
            TasasError::Chart("no points".to_string()),
        ];
        let presenter = presenter();
        for error in &errors {
            let items = presenter.present_error(error);
            assert!(!items.is_empty(), "no guidance for {:?}", error);
            assert!(!items[0].title.is_empty());
            assert!(!items[0].subtitle.is_empty());
        }
    }

    #[test]
    fn test_rate_limit_guidance_says_wait() {
        let items = presenter().present_error(&TasasError::RateLimited("slow down".to_string()));
        assert!(items[0].subtitle.to_lowercase().contains("wait"));
    }

    #[test]
    fn test_svg_chart_renderer_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = SvgChartRenderer::with_dir(dir.path());
        let series = series_of(&[
            ("2024-05-08", "390"),
            ("2024-05-09", "395"),
            ("2024-05-10", "400"),
        ]);
        let path = renderer.render(&series).unwrap();
        assert!(path.exists());
        assert!(path.file_name().unwrap().to_string_lossy().contains("usd"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<svg"));
        assert!(content.contains("polyline"));
    }

    #[test]
    fn test_svg_chart_needs_two_points() {
        let renderer = SvgChartRenderer::new();
        let series = series_of(&[("2024-05-10", "400")]);
        assert!(matches!(
            renderer.render(&series),
            Err(TasasError::Chart(_))
        ));
    }
}
