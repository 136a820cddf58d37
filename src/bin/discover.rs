//! `discover`: run discovery, seed priority sources, clear windows, list runs,
//! track entities and add Instagram posts by hand.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};

use fitness_discovery::bootstrap::{init_tracing, Runtime, StoreKind};
use fitness_discovery::curation::{self, ManualPost};
use fitness_discovery::entity;
use fitness_discovery::ingest::config::load_priority_sources_from;
use fitness_discovery::ingest::scheduler::run_platforms;
use fitness_discovery::model::{Category, EntityKind, NewEntity, RunStatus, RunSummary};
use fitness_discovery::window::parse_day;
use fitness_discovery::{DiscoveryWindow, Platform};

#[derive(Parser)]
#[command(name = "discover")]
#[command(about = "Fitness content discovery: fetch, filter and store candidates for the weekly newsletter")]
struct Cli {
    /// Use a throwaway in-memory store instead of Postgres (DATABASE_URL)
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run discovery for one or more platforms (all when none given)
    Run {
        #[arg(short, long = "platform", value_parser = parse_platform)]
        platforms: Vec<Platform>,
        /// First day of the window (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date, requires = "end")]
        start: Option<NaiveDate>,
        /// Last day of the window, inclusive
        #[arg(long, value_parser = parse_date, requires = "start")]
        end: Option<NaiveDate>,
        /// Wall-clock budget per platform run
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Upsert priority sources from a TOML/JSON seed file
    SeedPriority {
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Delete stored items of the given platforms inside a day window
    Clear {
        #[arg(short, long = "platform", value_parser = parse_platform, required = true)]
        platforms: Vec<Platform>,
        #[arg(long, value_parser = parse_date)]
        start: NaiveDate,
        #[arg(long, value_parser = parse_date)]
        end: NaiveDate,
    },
    /// Show recent discovery runs
    Runs {
        #[arg(short, long, value_parser = parse_platform)]
        platform: Option<Platform>,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Track athletes and performance topics
    Entity {
        #[command(subcommand)]
        command: EntityCommands,
    },
    /// Store one Instagram post link as discovered content
    AddInstagram {
        url: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_parser = parse_category)]
        category: Option<Category>,
    },
}

#[derive(Subcommand)]
enum EntityCommands {
    /// Create or update an entity (keyed by kind and name)
    Add {
        #[arg(value_parser = parse_kind)]
        kind: EntityKind,
        name: String,
        #[arg(long)]
        handle: Option<String>,
        #[arg(long)]
        youtube_channel_id: Option<String>,
        /// Replaces the terms derived from name and handle (repeatable)
        #[arg(long = "term")]
        terms: Vec<String>,
    },
    List,
    /// Search every platform for one entity and link what is found
    Run {
        id: i64,
        #[arg(long, value_parser = parse_date, requires = "end")]
        start: Option<NaiveDate>,
        #[arg(long, value_parser = parse_date, requires = "start")]
        end: Option<NaiveDate>,
    },
}

fn parse_platform(s: &str) -> Result<Platform, String> {
    s.parse::<Platform>().map_err(|e| e.to_string())
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    parse_day(s).map_err(|e| e.to_string())
}

fn parse_kind(s: &str) -> Result<EntityKind, String> {
    s.parse::<EntityKind>().map_err(|e| e.to_string())
}

fn parse_category(s: &str) -> Result<Category, String> {
    s.parse::<Category>().map_err(|e| e.to_string())
}

fn exit_code(summaries: &[RunSummary]) -> ExitCode {
    if summaries.iter().any(|s| s.status == RunStatus::Failed) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();
    let cli = Cli::parse();
    match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<ExitCode> {
    let kind = if cli.memory {
        StoreKind::Memory
    } else {
        StoreKind::from_env()
    };
    let rt = Runtime::with_store(kind).await?;
    match cli.command {
        Commands::Run {
            platforms,
            start,
            end,
            timeout_secs,
        } => {
            let platforms = if platforms.is_empty() {
                Platform::ALL.to_vec()
            } else {
                platforms
            };
            let window = match (start, end) {
                (None, None) => DiscoveryWindow::from_env(Utc::now())?,
                (s, e) => DiscoveryWindow::resolve(s, e, Utc::now())?,
            };
            let timeout = timeout_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| rt.cfg.run.timeout());
            let summaries = run_platforms(&rt.runner, rt.catalog.as_ref(), &platforms, &window, timeout).await;
            for s in &summaries {
                println!("{}\n", s.render());
            }
            Ok(exit_code(&summaries))
        }
        Commands::SeedPriority { path } => {
            let n = match path {
                Some(p) => {
                    let sources = load_priority_sources_from(&p)?;
                    for s in &sources {
                        rt.store.upsert_priority_source(s).await?;
                    }
                    sources.len()
                }
                None => rt.seed_priority_sources().await?,
            };
            println!("Seeded: {n}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Clear { platforms, start, end } => {
            let window = DiscoveryWindow::from_days(start, end)?;
            let deleted = curation::clear_content(rt.store.as_ref(), &platforms, &window).await?;
            for (platform, n) in deleted {
                println!("{platform}: deleted {n}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Runs { platform, limit } => {
            for r in rt.store.list_runs(platform, limit).await? {
                println!(
                    "{:>5}  {:<9}  {}  found={} saved={} skipped={}  {}{}",
                    r.id,
                    r.platform.as_str(),
                    r.run_date.format("%Y-%m-%d %H:%M"),
                    r.items_found,
                    r.items_saved,
                    r.items_skipped,
                    r.status.as_str(),
                    r.error_message.map(|e| format!(" ({e})")).unwrap_or_default(),
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Entity { command } => entity_command(&rt, command).await,
        Commands::AddInstagram {
            url,
            title,
            description,
            category,
        } => {
            let post = ManualPost {
                url,
                title,
                description,
                category,
            };
            let item = curation::add_instagram_post(
                &rt.runner.gate(),
                &rt.http,
                &rt.cfg.instagram.web_base,
                &post,
                Utc::now(),
            )
            .await?;
            println!("Added #{}: {} ({})", item.id, item.title, item.url);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn entity_command(rt: &Runtime, command: EntityCommands) -> Result<ExitCode> {
    match command {
        EntityCommands::Add {
            kind,
            name,
            handle,
            youtube_channel_id,
            terms,
        } => {
            let e = rt
                .store
                .upsert_entity(&NewEntity {
                    kind,
                    name: name.trim().to_string(),
                    handle,
                    youtube_channel_id,
                    search_terms: terms,
                })
                .await?;
            println!("{} #{}: {}", e.kind, e.id, e.name);
            Ok(ExitCode::SUCCESS)
        }
        EntityCommands::List => {
            for e in rt.store.list_entities().await? {
                println!(
                    "{:>5}  {:<7}  {}{}",
                    e.id,
                    e.kind.as_str(),
                    e.name,
                    e.handle.map(|h| format!(" ({h})")).unwrap_or_default(),
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        EntityCommands::Run { id, start, end } => {
            let Some(tracked) = rt.store.get_entity(id).await? else {
                anyhow::bail!("entity {id} not found");
            };
            let now = Utc::now();
            let window = match (start, end) {
                (None, None) => DiscoveryWindow::trailing(now, rt.cfg.entity.lookback_days),
                (s, e) => DiscoveryWindow::resolve(s, e, now)?,
            };
            let summaries = entity::discover(
                &rt.runner,
                rt.catalog.as_ref(),
                &tracked,
                &window,
                now,
                Some(rt.cfg.run.timeout()),
            )
            .await;
            for s in &summaries {
                println!("{}\n", s.render());
            }
            Ok(exit_code(&summaries))
        }
    }
}
