use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use smartlib_core::book::BookRecord;
use smartlib_core::classify::FileClassifier;
use smartlib_core::config::{apply_env_overrides, config_path, load_config, load_config_from, store_path, AppConfig};
use smartlib_core::lookup::LookupChain;
use smartlib_core::progress::{ProgressEvent, ProgressHandler};
use smartlib_core::resolve::{Resolver, Source, StageEvent, StageObserver, TracingObserver};
use smartlib_core::scan::{process_folder, validate_root, CancelToken, ScanOptions, ScanReport};
use smartlib_core::store::BookStore;

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Serialize)]
struct ScanOutput<'a> {
    report: &'a ScanReport,
    books: &'a [BookRecord],
}

#[derive(Serialize)]
struct ResolveOutput {
    path: String,
    title: String,
    author: String,
    stages: Vec<StageOutput>,
}

#[derive(Serialize)]
struct StageOutput {
    source: Source,
    outcome: String,
    elapsed_ms: u64,
}

impl From<&StageEvent> for StageOutput {
    fn from(event: &StageEvent) -> Self {
        Self {
            source: event.source,
            outcome: event.outcome.to_string(),
            elapsed_ms: event.duration.as_millis() as u64,
        }
    }
}

#[derive(Serialize)]
struct ClassifyOutput<'a> {
    path: &'a str,
    book: bool,
    content_type: String,
}

#[derive(Serialize)]
struct ResetOutput {
    removed: u64,
}

#[derive(Parser)]
#[command(name = "smartlib")]
#[command(about = "Resolve ebook titles and authors into a deduplicated catalog")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a folder, resolve every book and store the results
    Scan {
        /// Folder to scan recursively
        #[arg(required = true)]
        folder: String,

        /// Store database file
        #[arg(long)]
        db: Option<PathBuf>,

        /// Reset the store before scanning
        #[arg(long)]
        fresh: bool,

        /// Files resolved in parallel (1-16)
        #[arg(long)]
        workers: Option<usize>,

        /// Skip remote lookup
        #[arg(long)]
        offline: bool,
    },

    /// List stored books
    List {
        /// Store database file
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Resolve one file without storing it
    Resolve {
        /// Input file
        #[arg(required = true)]
        file: String,

        /// Skip remote lookup
        #[arg(long)]
        offline: bool,
    },

    /// Check whether paths are supported book files
    Classify {
        /// Paths to check
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Remove every stored book
    Reset {
        /// Store database file
        #[arg(long)]
        db: Option<PathBuf>,
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
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("smartlib=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    let result = match &cli.command {
        Commands::Scan { folder, db, fresh, workers, offline } => {
            run_scan(config, folder, db.as_deref(), *fresh, *workers, *offline, cli.json)
        }
        Commands::List { db } => run_list(config, db.as_deref(), cli.json),
        Commands::Resolve { file, offline } => run_resolve(config, file, *offline, cli.json),
        Commands::Classify { paths } => run_classify(config, paths, cli.json),
        Commands::Reset { db } => run_reset(config, db.as_deref(), cli.json),
        Commands::Config { action } => run_config(config, action, cli.json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Config from `--config` or the default location, with environment overrides.
fn load(config: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error + Send + Sync>> {
    let mut cfg = match config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

fn open_store(cfg: &AppConfig, db: Option<&Path>) -> Result<BookStore, Box<dyn std::error::Error + Send + Sync>> {
    let path = match db {
        Some(p) => p.to_path_buf(),
        None => store_path(&cfg.store)?,
    };
    tracing::debug!(path = %path.display(), "Opening book store");
    Ok(BookStore::open(&path)?)
}

struct BarProgress(ProgressBar);

impl BarProgress {
    fn new(hidden: bool) -> Self {
        let pb = ProgressBar::new(0);
        if hidden {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        } else if let Ok(style) =
            ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("=> "));
        }
        Self(pb)
    }
}

impl ProgressHandler for BarProgress {
    fn on_progress(&self, event: ProgressEvent) {
        self.0.set_length(event.total);
        self.0.set_position(event.current);
        if let Some(name) = event.path.file_name() {
            self.0.set_message(name.to_string_lossy().into_owned());
        }
    }
}

fn run_scan(
    config: Option<&Path>,
    folder: &str,
    db: Option<&Path>,
    fresh: bool,
    workers: Option<usize>,
    offline: bool,
    json: bool,
) -> CliResult {
    let mut cfg = load(config)?;
    if offline {
        cfg.lookup.enabled = false;
    }
    if let Some(w) = workers {
        cfg.scan.workers = w;
    }

    let root = Path::new(folder);
    validate_root(root)?;

    let classifier = FileClassifier::from_config(&cfg.classifier);
    let resolver = Resolver::from_config(&cfg)?;
    let mut store = open_store(&cfg, db)?;
    if fresh {
        store.reset()?;
    }

    let bar = BarProgress::new(json);
    let report = process_folder(
        root,
        &classifier,
        &resolver,
        &store,
        &ScanOptions::from_config(&cfg.scan),
        &CancelToken::new(),
        Some(&bar),
    )?;
    bar.0.finish_and_clear();

    let records = store.get_all()?;
    store.close()?;

    if json {
        let out = ScanOutput {
            report: &report,
            books: &records,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "Attempted: {}  Inserted: {}  Duplicates: {}  Failed: {}{}",
            report.attempted,
            report.inserted,
            report.duplicates,
            report.failed,
            if report.cancelled { "  (cancelled)" } else { "" }
        );
        print_records(&records);
    }
    Ok(())
}

fn run_list(config: Option<&Path>, db: Option<&Path>, json: bool) -> CliResult {
    let cfg = load(config)?;
    let store = open_store(&cfg, db)?;
    let records = store.get_all()?;
    store.close()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        print_records(&records);
    }
    Ok(())
}

fn print_records(records: &[BookRecord]) {
    if records.is_empty() {
        println!("No books stored.");
        return;
    }
    let width = records.iter().map(|r| r.title.chars().count()).max().unwrap_or(0).min(60);
    for r in records {
        println!("{:>4}  {:<width$}  {}", r.id, r.title, r.author, width = width);
    }
}

/// Keeps stage events so `resolve` can show how each field was found.
struct CollectStages(Mutex<Vec<StageEvent>>);

impl StageObserver for CollectStages {
    fn on_stage(&self, event: &StageEvent) {
        TracingObserver.on_stage(event);
        if let Ok(mut events) = self.0.lock() {
            events.push(event.clone());
        }
    }
}

fn run_resolve(config: Option<&Path>, file: &str, offline: bool, json: bool) -> CliResult {
    let mut cfg = load(config)?;
    if offline {
        cfg.lookup.enabled = false;
    }
    let path = Path::new(file);
    if !path.is_file() {
        return Err(format!("Input file not found: {}", path.display()).into());
    }

    let stages = Arc::new(CollectStages(Mutex::new(Vec::new())));
    let resolver = Resolver::from_config(&cfg)?.with_observer(stages.clone());
    let info = resolver.resolve(path);
    let events = stages.0.lock().map(|e| e.clone()).unwrap_or_default();

    let title = info.title.unwrap_or_default();
    let author = info.author.unwrap_or_default();
    if json {
        let out = ResolveOutput {
            path: path.display().to_string(),
            title,
            author,
            stages: events.iter().map(StageOutput::from).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("Title: {}", title);
        println!("Author: {}", author);
        for e in &events {
            println!("  {:<9} {} ({} ms)", e.source.to_string(), e.outcome, e.duration.as_millis());
        }
    }
    Ok(())
}

fn run_classify(config: Option<&Path>, paths: &[String], json: bool) -> CliResult {
    let cfg = load(config)?;
    let classifier = FileClassifier::from_config(&cfg.classifier);

    let results: Vec<_> = paths
        .iter()
        .map(|p| {
            let path = Path::new(p);
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            ClassifyOutput {
                path: p,
                book: classifier.is_book_file(path),
                content_type: classifier.content_type(ext),
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for r in &results {
            let verdict = if r.book { "book" } else { "skip" };
            println!("{:<5} {} ({})", verdict, r.path, r.content_type);
        }
    }
    Ok(())
}

fn run_reset(config: Option<&Path>, db: Option<&Path>, json: bool) -> CliResult {
    let cfg = load(config)?;
    let mut store = open_store(&cfg, db)?;
    let removed = store.count()?;
    store.reset()?;
    store.close()?;

    if json {
        println!("{}", serde_json::to_string(&ResetOutput { removed })?);
    } else {
        println!("Removed {} book(s)", removed);
    }
    Ok(())
}

fn run_config(config: Option<&Path>, action: &ConfigAction, json: bool) -> CliResult {
    let path = match config {
        Some(p) => p.to_path_buf(),
        None => config_path().ok_or("Could not determine config directory")?,
    };

    match action {
        ConfigAction::Init => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let toml = toml::to_string_pretty(&AppConfig::default())?;
            std::fs::write(&path, toml)?;
            println!("Wrote default config to {}", path.display());
        }
        ConfigAction::Show => {
            let cfg = if path.exists() { load_config_from(&path)? } else { AppConfig::default() };
            if json {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            } else {
                println!("{}", toml::to_string_pretty(&cfg)?);
            }
        }
        ConfigAction::Set { key, value } => {
            let mut cfg = if path.exists() { load_config_from(&path)? } else { AppConfig::default() };
            set_config_key(&mut cfg, key, value)?;

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, toml::to_string_pretty(&cfg)?)?;
            if !json {
                println!("Updated {}", key);
            }
        }
    }
    Ok(())
}

fn set_config_key(cfg: &mut AppConfig, key: &str, value: &str) -> CliResult {
    fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
        value.parse().map_err(|_| format!("Invalid value for {}: {}", key, value))
    }

    let parts: Vec<&str> = key.splitn(2, '.').collect();
    match parts.as_slice() {
        ["store", "path"] => cfg.store.path = Some(value.to_string()),
        ["lookup", sub] => match *sub {
            "enabled" => cfg.lookup.enabled = parse(key, value)?,
            "providers" => {
                cfg.lookup.providers = value
                    .split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect();
                LookupChain::from_config(&cfg.lookup)?;
            }
            "timeout_secs" => cfg.lookup.timeout_secs = parse(key, value)?,
            "user_agent" => cfg.lookup.user_agent = value.to_string(),
            "google_books_url" => cfg.lookup.google_books_url = Some(value.to_string()),
            "openlibrary_url" => cfg.lookup.openlibrary_url = Some(value.to_string()),
            _ => return Err(format!("Unknown key: {}", key).into()),
        },
        ["classifier", "sniff_content"] => cfg.classifier.sniff_content = parse(key, value)?,
        ["classifier", sub] if sub.starts_with("content_types.") => {
            let ext = sub.trim_start_matches("content_types.");
            if ext.is_empty() {
                return Err(format!("Unknown key: {}", key).into());
            }
            cfg.classifier
                .content_types
                .insert(ext.to_ascii_lowercase(), value.to_string());
        }
        ["resolver", "unknown_author"] => {
            if value.trim().is_empty() {
                return Err("resolver.unknown_author must not be empty".into());
            }
            cfg.resolver.unknown_author = value.to_string();
        }
        ["scan", sub] => match *sub {
            "workers" => cfg.scan.workers = parse(key, value)?,
            "follow_links" => cfg.scan.follow_links = parse(key, value)?,
            _ => return Err(format!("Unknown key: {}", key).into()),
        },
        _ => return Err(format!("Unknown key: {}", key).into()),
    }
    Ok(())
}
