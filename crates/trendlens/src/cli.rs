//! Command-line interface.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use tl_domain::ports::{
    CollectorRuntimeInterface, ItemRepository, OrchestratorInterface, SearchServiceInterface,
};
use tl_domain::value_objects::SearchRequest;
use tl_infrastructure::{AppContext, ConfigLoader, logging};

// Linking the provider crate populates the registries even though the CLI
// only calls it through ports.
use tl_providers as _;

/// Trend detection service: ingest, cluster, rank, search.
#[derive(Debug, Parser)]
#[command(name = "trendlens", version, about)]
pub struct Cli {
    /// Explicit configuration file (default: config/{TRENDLENS_ENV}.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON logs instead of human-readable ones
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the API and run pipeline cycles on the configured interval
    Serve,
    /// Run exactly one collect-process-persist-index cycle
    RunOnce {
        /// Run every enabled collector, bypassing schedules and rate limits
        #[arg(long)]
        force: bool,
    },
    /// Semantic search over indexed trends
    Search {
        /// Query text
        query: String,
        /// Maximum results
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Minimum cosine similarity
        #[arg(long, default_value_t = 0.7)]
        min_similarity: f32,
    },
    /// Collector administration
    #[command(subcommand)]
    Collectors(CollectorsCommand),
    /// Delete vector entries whose owning entity is gone
    Sweep,
    /// Delete items past the coldest retention tier
    Prune,
}

#[derive(Debug, Subcommand)]
enum CollectorsCommand {
    /// Show every registered collector with health
    List,
    /// Enable a collector by name
    Enable { name: String },
    /// Disable a collector by name
    Disable { name: String },
    /// Run one collector now
    Run {
        name: String,
        /// Bypass the rate limiter
        #[arg(long)]
        force: bool,
    },
    /// Probe a collector's endpoint and report latency
    Test { name: String },
    /// Reset a collector's health record
    ResetHealth { name: String },
}

impl Cli {
    /// Execute the parsed command.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init_logging("info,trendlens=debug", self.json_logs);

        let mut loader = ConfigLoader::new();
        if let Some(path) = &self.config {
            loader = loader.with_config_path(path);
        }
        let config = loader.load()?;
        let context = AppContext::initialize(config).await?;

        match self.command {
            Command::Serve => serve(context).await,
            Command::RunOnce { force } => run_once(&context, force).await,
            Command::Search {
                query,
                limit,
                min_similarity,
            } => search(&context, query, limit, min_similarity).await,
            Command::Collectors(command) => collectors(&context, command).await,
            Command::Sweep => {
                let swept = context.orchestrator.sweep_tombstones().await?;
                println!("swept {swept} orphaned vectors");
                Ok(())
            }
            Command::Prune => {
                let cutoff = chrono::Utc::now()
                    - chrono::Duration::days(i64::from(context.config.retention.cold_days));
                let removed = context.item_repo.delete_older_than(cutoff).await?;
                println!("pruned {removed} items older than {} days", context.config.retention.cold_days);
                Ok(())
            }
        }
    }
}

async fn serve(context: Arc<AppContext>) -> anyhow::Result<()> {
    let interval = Duration::from_secs(context.config.runtime.cycle_interval_secs);
    let cycle_context = Arc::clone(&context);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match cycle_context.orchestrator.run_cycle(false).await {
                Ok(run) => {
                    tracing::info!(run_id = %run.id, status = %run.status, trends = run.trends, "cycle finished");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "cycle failed");
                }
            }
        }
    });

    tokio::select! {
        result = tl_server::serve(Arc::clone(&context)) => Ok(result?),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            context.orchestrator.cancel();
            Ok(())
        }
    }
}

async fn run_once(context: &AppContext, force: bool) -> anyhow::Result<()> {
    let run = context.orchestrator.run_cycle(force).await?;
    println!("{}", serde_json::to_string_pretty(&run)?);
    Ok(())
}

async fn search(
    context: &AppContext,
    query: String,
    limit: usize,
    min_similarity: f32,
) -> anyhow::Result<()> {
    let request = SearchRequest {
        query: Some(query),
        limit,
        min_similarity,
        ..Default::default()
    };
    let trends = context.search.search(request).await?;
    for trend in trends {
        println!(
            "{:>5.1}  [{}] {} ({}, {})",
            trend.score, trend.state, trend.title, trend.category, trend.language
        );
    }
    Ok(())
}

async fn collectors(context: &AppContext, command: CollectorsCommand) -> anyhow::Result<()> {
    match command {
        CollectorsCommand::List => {
            for status in context.runtime.status_all().await? {
                let health = if status.healthy { "healthy" } else { "UNHEALTHY" };
                let enabled = if status.enabled { "enabled" } else { "disabled" };
                println!(
                    "{:<24} {:<8} {:<10} schedule={} last_error={}",
                    status.name,
                    enabled,
                    health,
                    status.schedule,
                    status.last_error.as_deref().unwrap_or("-")
                );
            }
        }
        CollectorsCommand::Enable { name } => {
            context.runtime.enable_by_name(&name).await?;
            println!("enabled {name}");
        }
        CollectorsCommand::Disable { name } => {
            context.runtime.disable_by_name(&name).await?;
            println!("disabled {name}");
        }
        CollectorsCommand::Run { name, force } => {
            let items = context.runtime.run(&name, force).await?;
            println!("{name} returned {} items", items.len());
        }
        CollectorsCommand::Test { name } => {
            let latency = context.runtime.test_connection(&name).await?;
            println!("{name} responded in {latency} ms");
        }
        CollectorsCommand::ResetHealth { name } => {
            context.runtime.reset_health(&name).await?;
            println!("reset health for {name}");
        }
    }
    Ok(())
}
