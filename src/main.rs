use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use hymn_selector::catalog::Catalog;
use hymn_selector::config::{self, Config};
use hymn_selector::db::Database;
use hymn_selector::engine::FestiveSlot;
use hymn_selector::models::*;
use hymn_selector::render;
use hymn_selector::service::HymnService;

#[derive(Parser)]
#[command(name = "hymns")]
#[command(about = "Weekly hymn selection with per-ward repetition avoidance")]
struct Cli {
    /// Hymn catalog JSON file
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// History database file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Seed for reproducible draws
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Number of previous services to avoid repeating
    #[arg(long, global = true)]
    lookback: Option<usize>,

    /// Slot carrying the occasion on festive services (opening or closing)
    #[arg(long, global = true)]
    festive_slot: Option<FestiveSlot>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a hymn list for a service
    Build {
        /// Ward whose history is avoided and updated
        #[arg(short, long)]
        group: Option<String>,

        /// Service date (YYYY-MM-DD), defaults to the next Sunday
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// First Sunday of the month (3 hymns instead of 4)
        #[arg(long)]
        first_sunday: bool,

        /// Festive occasion (natale/christmas or pasqua/easter)
        #[arg(long)]
        occasion: Option<Occasion>,

        /// Allow "Occasioni speciali" hymns on a non-festive service
        #[arg(long)]
        include_special: bool,

        /// Do not store the selection
        #[arg(long)]
        no_save: bool,
    },
    /// Replace one hymn of a stored selection
    Swap {
        selection_id: Uuid,

        /// 1-based position to replace
        #[arg(short, long)]
        position: usize,

        /// Hymn number currently at that position
        #[arg(short, long)]
        current: u32,

        /// Replacement hymn number, drawn at random when omitted
        #[arg(short, long)]
        replacement: Option<u32>,
    },
    /// List the hymns that may replace one position of a stored selection
    Candidates {
        selection_id: Uuid,

        #[arg(short, long)]
        position: usize,
    },
    /// Show recent selections of a ward
    History {
        group: String,

        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Delete the selection of a ward for a date
    Delete { group: String, date: NaiveDate },
    /// List wards with stored selections
    Groups,
    /// Pick one hymn matching all given criteria
    Hymn {
        #[arg(short, long)]
        number: Option<u32>,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long)]
        tag: Option<String>,
    },
    /// List catalog categories
    Categories,
    /// List catalog tags
    Tags,
    /// Show catalog statistics
    Stats,
    /// Show the resolved configuration
    Config {
        /// Write it to the user's config file
        #[arg(long)]
        save: bool,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "hymn_selector=info,hymns=info".into()),
    );

    // stdout carries command output
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn resolve_config(cli: &Cli) -> Config {
    let mut config = Config::load();
    if let Some(path) = &cli.catalog {
        config.catalog_path = path.clone();
    }
    if let Some(path) = &cli.database {
        config.database_path = Some(path.clone());
    }
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    if let Some(lookback) = cli.lookback {
        config.lookback = lookback;
    }
    if let Some(slot) = cli.festive_slot {
        config.festive_slot = slot;
    }
    config
}

fn open_service(config: &Config) -> anyhow::Result<HymnService> {
    let catalog = Catalog::load(&config.catalog_path)?;

    let db = match &config.database_path {
        Some(path) => Database::open(path.clone())?,
        None => Database::open_default()?,
    };
    db.migrate()?;

    Ok(HymnService::new(
        Arc::new(catalog),
        db,
        config.policy(),
        config.seed,
    ))
}

fn emit<T: Serialize>(
    json: bool,
    value: &T,
    text: impl FnOnce() -> String,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", text());
    }
    Ok(())
}

fn lines(items: &[String]) -> String {
    items.iter().map(|item| format!("{}\n", item)).collect()
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = resolve_config(&cli);

    match cli.command {
        Commands::Config { save } => {
            if save {
                config.save()?;
                eprintln!("Saved to {}", config::get_config_path()?.display());
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        command => run(command, &open_service(&config)?, cli.json),
    }
}

fn run(command: Commands, service: &HymnService, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Build {
            group,
            date,
            first_sunday,
            occasion,
            include_special,
            no_save,
        } => {
            let selection = service.build_selection(BuildSelectionInput {
                persist: Some(group.is_some() && !no_save),
                group_id: group,
                service_date: date,
                is_first_sunday: first_sunday,
                is_festive: occasion.is_some(),
                occasion,
                include_special_occasions: include_special,
            })?;
            emit(json, &selection, || render::render_selection(&selection))
        }
        Commands::Swap {
            selection_id,
            position,
            current,
            replacement,
        } => {
            service.swap_entry(
                selection_id,
                SwapEntryInput {
                    position,
                    current_hymn_number: current,
                    replacement_hymn_number: replacement,
                },
            )?;
            let selection = service.get_selection(selection_id)?;
            emit(json, &selection, || render::render_selection(&selection))
        }
        Commands::Candidates {
            selection_id,
            position,
        } => {
            let candidates = service.list_candidates(selection_id, position)?;
            emit(json, &candidates, || render::render_candidates(&candidates))
        }
        Commands::History { group, limit } => {
            let history = service.group_history(&group, limit)?;
            emit(json, &history, || render::render_history(&history))
        }
        Commands::Delete { group, date } => {
            if !service.delete_group_selection(&group, date)? {
                anyhow::bail!("No selection stored for '{}' on {}", group, date);
            }
            emit(json, &serde_json::json!({ "deleted": true }), || {
                format!("Deleted selection of '{}' for {}\n", group, date)
            })
        }
        Commands::Groups => {
            let groups = service.groups()?;
            emit(json, &groups, || lines(&groups))
        }
        Commands::Hymn {
            number,
            category,
            tag,
        } => {
            let filter = HymnFilter {
                number,
                category,
                tag,
            };
            let hymn = service
                .find_hymn(&filter)
                .context("No hymn matches the given criteria")?;
            emit(json, &hymn, || {
                format!("#{}  {}  [{}]\n", hymn.number, hymn.title, hymn.category)
            })
        }
        Commands::Categories => {
            let categories = service.catalog().categories();
            emit(json, &categories, || lines(&categories))
        }
        Commands::Tags => {
            let tags = service.catalog().tags();
            emit(json, &tags, || lines(&tags))
        }
        Commands::Stats => {
            let stats = service.catalog().stats();
            emit(json, &stats, || {
                format!(
                    "Hymns: {}\nCategories: {}\nTags: {}\nSacrament hymns: {}\n",
                    stats.total_hymns, stats.categories, stats.tags, stats.sacrament_hymns
                )
            })
        }
        Commands::Config { .. } => Ok(()),
    }
}
