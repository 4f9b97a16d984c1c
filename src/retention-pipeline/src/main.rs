//! Telecom retention pipeline: batch entry point.
//!
//! Loads raw customer records, derives usage scores and segments, commits the
//! derived tables and exports them, or prints the retention dashboard.

use anyhow::Context;
use clap::{Parser, Subcommand};
use retention_analytics::export::export_snapshot;
use retention_analytics::ingest::load_jsonl;
use retention_analytics::{ClickHouseSink, DerivedSnapshot, InMemoryStore, Pipeline, RunSummary};
use retention_core::config::AppConfig;
use retention_reporting::{RetentionDashboard, DEFAULT_TOP_AT_RISK};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "retention-pipeline")]
#[command(about = "Derive customer retention and revenue-risk segments from telecom records")]
#[command(version)]
struct Cli {
    /// TOML configuration file (environment variables still apply on top)
    #[arg(long, global = true, env = "RETENTION_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Derive, commit and export the segmentation and analytics tables
    Run {
        /// JSON Lines file with one raw customer record per line
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory (overrides config)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Records per derivation shard (overrides config)
        #[arg(long)]
        shard_size: Option<usize>,

        /// Also publish the derived tables to ClickHouse
        #[arg(long, default_value_t = false)]
        clickhouse: bool,
    },
    /// Derive in memory and print the retention dashboard as JSON
    Report {
        /// JSON Lines file with one raw customer record per line
        #[arg(short, long)]
        input: PathBuf,

        /// Number of at-risk high-value customers to list
        #[arg(long, default_value_t = DEFAULT_TOP_AT_RISK)]
        top: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reports go to stdout, logs to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "retention_pipeline=info,retention_analytics=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let mut config =
        AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Run {
            input,
            out_dir,
            shard_size,
            clickhouse,
        } => {
            if let Some(dir) = out_dir {
                config.output.dir = dir;
            }
            if let Some(size) = shard_size {
                config.pipeline.shard_size = size;
            }
            if clickhouse {
                config.clickhouse.enabled = true;
            }
            config.validate()?;

            let (summary, snapshot) = derive(&config, &input).await?;

            let paths = export_snapshot(&config.output.dir, &snapshot)?;
            info!(
                segmentation = %paths.segmentation.display(),
                analytics = %paths.analytics.display(),
                "Export complete"
            );

            if config.clickhouse.enabled {
                let sink = ClickHouseSink::new(&config.clickhouse).await?;
                sink.publish(&snapshot).await?;
            }

            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Report { input, top } => {
            let (_, snapshot) = derive(&config, &input).await?;
            let overview = RetentionDashboard::new(&snapshot.analytics)
                .with_top_at_risk(top)
                .get_overview();
            println!("{}", serde_json::to_string_pretty(&overview)?);
        }
    }

    Ok(())
}

async fn derive(
    config: &AppConfig,
    input: &Path,
) -> anyhow::Result<(RunSummary, Arc<DerivedSnapshot>)> {
    info!(input = %input.display(), "Telecom retention pipeline starting");

    let store = InMemoryStore::new();
    store.load(load_jsonl(input)?)?;

    let pipeline = Arc::new(Pipeline::new(config));
    let summary = pipeline.run(&store).await?;
    let snapshot = store
        .snapshot()
        .context("pipeline run finished without a committed snapshot")?;

    Ok((summary, snapshot))
}
