//! tasas CLI - Cuban and international exchange rates in the terminal
//!
//! Runs the same query engine the launcher host uses, one query per
//! invocation.
//!
//! ## Example Usage
//!
//! ```bash
//! # Today's ElToque rates
//! tasas list
//!
//! # Convert 100 USD to EUR at street rates
//! tasas convert 100 usd eur
//!
//! # Any free-text query, exactly as typed in the launcher
//! tasas query 100 usd to eur
//!
//! # Street vs official comparison
//! tasas compare
//!
//! # Refill the cache with the last 30 days
//! tasas db rebuild
//! ```

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process;
use tasas::config::Settings;
use tasas::handler::QueryHandler;
use tasas::present::{DisplayItem, ItemAction};

/// tasas: Cuban and international exchange rates
#[derive(Parser)]
#[command(name = "tasas")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cuban and international exchange rates", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a free-text query, exactly as typed in the launcher
    Query {
        /// Query text, e.g. 100 usd to eur
        #[arg(value_name = "TEXT")]
        text: Vec<String>,
    },

    /// List rates for a day
    List {
        /// Use the international namespace instead of ElToque
        #[arg(short, long)]
        international: bool,

        /// Date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Convert an amount between currencies
    Convert {
        /// Amount to convert
        #[arg(value_name = "AMOUNT")]
        amount: String,

        /// Source currency
        #[arg(value_name = "FROM")]
        from: String,

        /// Target currency, defaults to the namespace base (CUP or USD)
        #[arg(value_name = "TO")]
        to: Option<String>,

        /// Use the international namespace instead of ElToque
        #[arg(short, long)]
        international: bool,

        /// Date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Show a rate trend over a trailing window
    Trend {
        /// Currency code
        #[arg(value_name = "CURRENCY")]
        currency: String,

        /// Window: 7d, 30d, 3m, 6m, 1y
        #[arg(value_name = "WINDOW", default_value = "7d")]
        window: String,

        /// Use the international namespace instead of ElToque
        #[arg(short, long)]
        international: bool,
    },

    /// Compare ElToque street rates with international markets
    Compare {
        /// Compare a single currency instead of the whole set
        #[arg(value_name = "CURRENCY")]
        currency: Option<String>,
    },

    /// Manage the rate cache
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

#[derive(Subcommand)]
enum DbAction {
    /// Show cache statistics
    Status,

    /// Drop all cached rates
    Clear,

    /// Re-fetch the trailing window into the cache
    Rebuild,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let settings = load_settings(cli.config.as_deref());
    if cli.verbose {
        println!("{} v{}", "tasas".cyan().bold(), env!("CARGO_PKG_VERSION"));
        println!(
            "Cache: {}",
            settings.resolved_db_path().display().to_string().dimmed()
        );
    }

    if let Err(e) = run(cli.command, &settings, cli.verbose) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run(
    command: Commands,
    settings: &Settings,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut handler = QueryHandler::new(settings)?;

    let query = match command {
        Commands::Query { text } => text.join(" "),
        // An empty query means the menu, so the listing namespace is spelled out
        Commands::List {
            international,
            date,
        } => compose(&[
            if international { "inter" } else { "eltoque" },
            date.as_deref().unwrap_or(""),
        ]),
        Commands::Convert {
            amount,
            from,
            to,
            international,
            date,
        } => {
            let mut parts: Vec<&str> = vec![namespace(international), &amount, &from];
            if let Some(ref to) = to {
                parts.push("to");
                parts.push(to);
            }
            if let Some(ref date) = date {
                parts.push(date);
            }
            compose(&parts)
        }
        Commands::Trend {
            currency,
            window,
            international,
        } => compose(&[namespace(international), "trend", &currency, &window]),
        Commands::Compare { currency } => {
            compose(&["compare", currency.as_deref().unwrap_or("")])
        }
        Commands::Db { action } => match action {
            DbAction::Status => "db status".to_string(),
            DbAction::Clear => "db clear".to_string(),
            DbAction::Rebuild => return rebuild(&mut handler, settings, verbose),
        },
    };

    print_items(&handler.handle_query(&query), verbose);
    Ok(())
}

fn rebuild(
    handler: &mut QueryHandler,
    settings: &Settings,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "{}",
        format!(
            "Rebuilding the rate cache ({} days)...",
            settings.cache.rebuild_days
        )
        .cyan()
        .bold()
    );

    let pb = ProgressBar::new(u64::from(settings.cache.rebuild_days));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} days")?
            .progress_chars("#>-"),
    );

    let items = handler.rebuild_with_progress(|done, _total| pb.set_position(done));
    pb.finish_and_clear();

    print_items(&items, verbose);
    Ok(())
}

fn load_settings(path: Option<&Path>) -> Settings {
    match path {
        Some(path) => match Settings::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("{} Failed to load config: {}", "Warning:".yellow(), e);
                Settings::default()
            }
        },
        None => match default_config_path() {
            Some(path) => Settings::load_or_default(&path),
            None => Settings::default(),
        },
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tasas").join("config.toml"))
}

/// Join non-empty parts with single spaces
fn compose(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

fn namespace(international: bool) -> &'static str {
    if international {
        "inter"
    } else {
        ""
    }
}

fn print_items(items: &[DisplayItem], verbose: bool) {
    for item in items {
        println!("{}", item.title.bold());
        match &item.action {
            ItemAction::Open(path) => {
                println!(
                    "  {}",
                    format!("{} ({})", item.subtitle, path.display()).dimmed()
                );
            }
            ItemAction::Copy(text) => {
                println!("  {}", item.subtitle.dimmed());
                if verbose && text != &item.subtitle {
                    println!("  {} {}", "copy:".dimmed(), text.dimmed());
                }
            }
            ItemAction::SetQuery(text) => {
                println!("  {}", item.subtitle.dimmed());
                if verbose {
                    println!("  {} {}", "query:".dimmed(), text.dimmed());
                }
            }
        }
    }
}
