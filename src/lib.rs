//! # Tasas
//!
//! Cuban and international exchange rates for launcher-style hosts.
//!
//! Tasas fetches the ElToque informal-market rates and international
//! USD-based rates, caches them in SQLite, and answers free-text queries
//! with selectable display items: listings, conversions, historical
//! lookups, trends and street-vs-official comparisons.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use tasas::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let settings = Settings::load_or_default(Path::new("tasas.toml"));
//!     let mut handler = QueryHandler::new(&settings)?;
//!     for item in handler.handle_query("100 usd to eur") {
//!         println!("{}: {}", item.title, item.subtitle);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod currency;
pub mod engine;
pub mod error;
pub mod handler;
pub mod present;
pub mod query;
pub mod sources;
pub mod store;
pub mod trend;

pub mod prelude {
    //! Commonly used types and traits
    pub use crate::config::Settings;
    pub use crate::currency::{Currency, CurrencyBook};
    pub use crate::engine::{QueryOutcome, RateEngine};
    pub use crate::error::{Result, TasasError};
    pub use crate::handler::QueryHandler;
    pub use crate::present::{DisplayItem, ItemAction, Presenter};
    pub use crate::query::{Query, QueryParser};
    pub use crate::sources::{RateRecord, RateSource};
    pub use crate::store::RateStore;
    pub use crate::trend::{TrendSeries, TrendWindow};
}
