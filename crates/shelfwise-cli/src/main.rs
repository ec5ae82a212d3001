use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use shelfwise_catalog::MultiCatalog;
use shelfwise_core::error::ExitCode;
use shelfwise_core::{AppConfig, BookRecord, BookStore, UnifiedBook};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "shelfwise",
    about = "Search Google Books and Open Library as one catalog",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format (for scripts).
    /// Also enabled by setting SHELFWISE_JSON=1.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search both catalogs and print the merged, deduplicated results.
    Search {
        query: String,
        /// Upsert every result into the local book store.
        #[arg(long)]
        save: bool,
    },

    /// Resolve a composite id such as `google:zyTCAlFPjgYC` or `openlibrary:/works/OL893415W`.
    Lookup {
        id: String,
        #[arg(long)]
        save: bool,
    },

    /// Resolve an ISBN (Google Books first, then Open Library).
    Isbn {
        isbn: String,
        #[arg(long)]
        save: bool,
    },

    /// Check that both catalogs answer.
    Health,

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file path.
    Path,
    /// Print the effective configuration.
    Show,
    /// Write the default configuration to the config path.
    Init {
        #[arg(long)]
        force: bool,
    },
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let start = Instant::now();
    let cli = Cli::parse();
    let json_output = cli.json || std::env::var("SHELFWISE_JSON").as_deref() == Ok("1");

    match cli.command {
        Commands::Search { query, save } => {
            let (config, catalog) = open_catalog()?;
            let books = catalog.multi_search(&query).await;
            if save {
                save_books(&config, &books)?;
            }
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "items": books, "total": books.len(), "query": query },
                    "meta": { "duration_ms": dur }
                }))?;
            } else if books.is_empty() {
                println!("No results for: {query}");
            } else {
                println!("Found {} results:", books.len());
                for book in &books {
                    print_book_line(book);
                }
            }
        }

        Commands::Lookup { id, save } => {
            let (config, catalog) = open_catalog()?;
            let found = catalog.lookup_by_id(&id).await;
            print_single(&config, found, &id, save, json_output, start)?;
        }

        Commands::Isbn { isbn, save } => {
            let (config, catalog) = open_catalog()?;
            let found = catalog.lookup_by_isbn(&isbn).await;
            print_single(&config, found, &isbn, save, json_output, start)?;
        }

        Commands::Health => {
            let (_, catalog) = open_catalog()?;
            let statuses = catalog.health().await;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": statuses,
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                for status in &statuses {
                    let state = if status.available { "up" } else { "down" };
                    let latency = status
                        .latency_ms
                        .map(|ms| format!("{ms}ms"))
                        .unwrap_or_default();
                    println!("{:<12} {state:<5} {latency}", status.source.to_string());
                }
            }
        }

        // Path and init must work while the config file is broken.
        Commands::Config { action } => {
            let path = AppConfig::config_path();
            match action {
                ConfigAction::Path => {
                    println!("{}", path.display());
                }
                ConfigAction::Show => {
                    let config = AppConfig::load_from(&path)?;
                    if json_output {
                        print_json(&serde_json::to_value(&config)?)?;
                    } else {
                        print!("{}", toml::to_string_pretty(&config)?);
                    }
                }
                ConfigAction::Init { force } => {
                    if !init_config(&path, force)? {
                        eprintln!("Config already exists at {}. Use --force to overwrite.", path.display());
                        std::process::exit(ExitCode::GeneralError as i32);
                    }
                    println!("Wrote {}", path.display());
                }
            }
        }
    }

    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn open_catalog() -> Result<(AppConfig, MultiCatalog)> {
    let config = AppConfig::load()?;
    let catalog = MultiCatalog::new(&config.catalog)?;
    Ok((config, catalog))
}

/// Write the default config to `path` without reading what is there.
/// Returns `false` when a file exists and `force` is not set.
fn init_config(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    AppConfig::default().save_to(path)?;
    Ok(true)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SHELFWISE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_single(
    config: &AppConfig,
    found: Option<UnifiedBook>,
    requested: &str,
    save: bool,
    json_output: bool,
    start: Instant,
) -> Result<()> {
    let dur = start.elapsed().as_millis();
    let Some(book) = found else {
        if json_output {
            print_json(&serde_json::json!({
                "status": "error",
                "error": "not_found",
                "message": format!("No book found for {requested}"),
                "meta": { "duration_ms": dur }
            }))?;
        } else {
            eprintln!("No book found for: {requested}");
        }
        std::process::exit(ExitCode::NotFound as i32);
    };

    if save {
        save_books(config, std::slice::from_ref(&book))?;
    }

    if json_output {
        print_json(&serde_json::json!({"status": "ok", "data": book, "meta": {"duration_ms": dur}}))?;
    } else {
        println!("{}", serde_json::to_string_pretty(&book)?);
    }
    Ok(())
}

fn print_book_line(book: &UnifiedBook) {
    let authors = book.authors.join(", ");
    let date = book.published_date.as_deref().unwrap_or_default();
    println!(
        "  {id:<36}  {title:<40}  {authors:<25}  {date}",
        id = book.id(),
        title = book.title,
    );
}

fn save_books(config: &AppConfig, books: &[UnifiedBook]) -> Result<()> {
    let mut store = BookStore::open(&config.database_path())?;
    let records: Vec<BookRecord> = books.iter().map(UnifiedBook::to_record).collect();
    let written = store.upsert_all(&records)?;
    tracing::info!(written, path = %config.database_path().display(), "saved book records");
    Ok(())
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn init_force_replaces_invalid_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[catalog]\nopenlibrary_url = \"\"\n").unwrap();
        assert!(AppConfig::load_from(&path).is_err());

        assert!(init_config(&path, true).unwrap());
        let repaired = AppConfig::load_from(&path).unwrap();
        assert_eq!(repaired.catalog.openlibrary_url, "https://openlibrary.org");
    }

    #[test]
    fn init_force_replaces_unparseable_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not toml [[[").unwrap();

        assert!(init_config(&path, true).unwrap());
        assert!(AppConfig::load_from(&path).is_ok());
    }

    #[test]
    fn init_without_force_keeps_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not toml [[[").unwrap();

        assert!(!init_config(&path, false).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "not toml [[[");
    }

    #[test]
    fn init_creates_missing_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(init_config(&path, false).unwrap());
        assert!(path.exists());
    }
}
