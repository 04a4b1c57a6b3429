use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::runtime::Runtime;

use book_listing_core::binding::RowSlot;
use book_listing_core::config::{config_path, load_config, parse_config, save_config, set_config_key, AppConfig};
use book_listing_core::error::ConfigError;
use book_listing_core::dispatch::UiQueue;
use book_listing_core::presenter::NoopObserver;
use book_listing_core::session::BookListing;
use book_listing_core::volume::Volume;

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "book-listing")]
#[command(about = "Search a book catalog and list the results")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the catalog
    Search {
        /// Search terms
        #[arg(required = true)]
        query: Vec<String>,

        /// Fetch cover images for every row
        #[arg(long)]
        covers: bool,

        /// Give up waiting for covers after this many seconds
        #[arg(long, default_value = "30")]
        cover_timeout: u64,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Initialize default config file
    Init,
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Key (dot-separated path)
        key: String,
        /// Value
        value: String,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Search { query, covers, cover_timeout } => {
            run_search(&query.join(" "), *covers, Duration::from_secs(*cover_timeout), cli.json)
        }
        Commands::Config { action } => run_config(action, cli.json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Cover dimensions per row, filled in from the interactive queue.
type CoverLog = Arc<Mutex<Vec<Option<(u32, u32)>>>>;

/// One `search --json` row: the volume's fields plus the fetched cover size.
#[derive(Serialize)]
struct SearchRow<'a> {
    #[serde(flatten)]
    volume: &'a Volume,
    #[serde(skip_serializing_if = "Option::is_none")]
    cover: Option<CoverSize>,
}

#[derive(Serialize)]
struct CoverSize {
    width: u32,
    height: u32,
}

fn run_search(query: &str, covers: bool, cover_timeout: Duration, json: bool) -> CliResult {
    let runtime = Runtime::new()?;
    let mut queue = UiQueue::new();
    let session = BookListing::new(&load_config(), runtime.handle().clone(), queue.handle())?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("Searching for \"{}\"", query));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result: Arc<Mutex<Option<Vec<Arc<Volume>>>>> = Arc::new(Mutex::new(None));
    let sink = result.clone();
    session.search(query, move |volumes| {
        if let Ok(mut slot) = sink.lock() {
            *slot = Some(volumes);
        }
    });
    runtime.block_on(queue.next());
    spinner.finish_and_clear();

    let volumes = result.lock().map_err(|_| "search result lock poisoned")?.take().unwrap_or_default();
    let presenter = session.presenter(volumes, Box::new(NoopObserver));

    if presenter.is_empty() {
        if json {
            println!("[]");
        } else {
            println!("No books found");
        }
        return Ok(());
    }

    let cover_log: CoverLog = Arc::new(Mutex::new(vec![None; presenter.count()]));
    if covers {
        let slots: Vec<RowSlot> = (0..presenter.count()).map(RowSlot::new).collect();
        let bar = ProgressBar::new(slots.len() as u64);
        bar.set_style(ProgressStyle::with_template("{bar:30} {pos}/{len} covers")?);
        for (i, slot) in slots.iter().enumerate() {
            let Some(volume) = presenter.at(i) else { continue };
            let log = cover_log.clone();
            let bar = bar.clone();
            session.bind_row(slot, volume, move |img| {
                if let Ok(mut log) = log.lock() {
                    log[i] = Some((img.width(), img.height()));
                }
                bar.inc(1);
            });
        }

        let deadline = Instant::now() + cover_timeout;
        while slots.iter().any(RowSlot::is_fetching) && Instant::now() < deadline {
            let _ = runtime.block_on(async {
                tokio::time::timeout(Duration::from_millis(200), queue.next()).await
            });
            queue.run_pending();
        }
        for slot in &slots {
            session.recycle_row(slot);
        }
        bar.finish_and_clear();
    }

    let cover_log = cover_log.lock().map_err(|_| "cover log lock poisoned")?.clone();
    if json {
        let rows: Vec<SearchRow> = presenter
            .iter()
            .zip(&cover_log)
            .map(|(v, cover)| SearchRow {
                volume: v,
                cover: cover.map(|(width, height)| CoverSize { width, height }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for i in 0..presenter.count() {
            let Some(row) = presenter.row_view(i) else { continue };
            let mut line = format!("{:>2}. {}", i + 1, row.title);
            if !row.authors.is_empty() {
                line.push_str(&format!(" by {}", row.authors));
            }
            if covers {
                match cover_log[i] {
                    Some((w, h)) => line.push_str(&format!(" [cover {}x{}]", w, h)),
                    None => line.push_str(" [no cover]"),
                }
            }
            println!("{}", line);
        }
    }
    Ok(())
}

fn run_config(action: &ConfigAction, json: bool) -> CliResult {
    match action {
        ConfigAction::Init => {
            let path = config_path().ok_or(ConfigError::NoConfigDir)?;
            save_config(&AppConfig::default(), &path)?;
            println!("Wrote default config to {}", path.display());
        }
        ConfigAction::Show => {
            let cfg = load_config();
            if json {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            } else {
                println!("{}", toml::to_string_pretty(&cfg)?);
            }
        }
        ConfigAction::Set { key, value } => {
            let path = config_path().ok_or(ConfigError::NoConfigDir)?;
            let mut cfg = if path.exists() {
                parse_config(&std::fs::read_to_string(&path)?)?
            } else {
                AppConfig::default()
            };

            set_config_key(&mut cfg, key, value)?;
            save_config(&cfg, &path)?;
            if !json {
                println!("Updated {}", key);
            }
        }
    }
    Ok(())
}
