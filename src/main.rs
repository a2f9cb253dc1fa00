use anyhow::{Context, Result, bail};
use batchwrite::{
    BatchWriteOptions, CancellationToken, Connection, ConnectionConfig, MemoryStore, Mutation,
    ResponseOrder,
};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "batchwrite")]
#[command(about = "Run mutation-group batches against an in-memory store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a batch file and print one JSON line per outcome
    Run {
        file: PathBuf,
        #[arg(long, default_value = "batchwrite://local/memory/default")]
        database: String,
        /// Report outcomes last group first
        #[arg(long)]
        reverse: bool,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Parse a batch file and summarize it without executing
    Check { file: PathBuf },
}

#[derive(Debug, Deserialize)]
struct BatchFile {
    #[serde(default)]
    tables: Vec<TableSpec>,
    #[serde(default)]
    options: BatchWriteOptions,
    groups: Vec<Vec<Mutation>>,
}

#[derive(Debug, Deserialize)]
struct TableSpec {
    name: String,
    key: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            file,
            database,
            reverse,
            timeout_ms,
        } => run(&file, &database, reverse, timeout_ms).await,
        Command::Check { file } => check(&file),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("batchwrite=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load(path: &Path) -> Result<BatchFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid batch file {}", path.display()))
}

fn check(path: &Path) -> Result<()> {
    let batch = load(path)?;
    let mutations: usize = batch.groups.iter().map(Vec::len).sum();
    println!(
        "{} table(s), {} group(s), {} mutation(s)",
        batch.tables.len(),
        batch.groups.len(),
        mutations
    );
    Ok(())
}

async fn run(path: &Path, database: &str, reverse: bool, timeout_ms: Option<u64>) -> Result<()> {
    let batch = load(path)?;

    let order = if reverse {
        ResponseOrder::Reversed
    } else {
        ResponseOrder::Request
    };
    let store = MemoryStore::with_response_order(order);
    for table in &batch.tables {
        let key: Vec<&str> = table.key.iter().map(String::as_str).collect();
        store
            .create_table(&table.name, &key)
            .await
            .with_context(|| format!("failed to create table {}", table.name))?;
    }

    let mut config = ConnectionConfig::from_url(database)?;
    if let Some(ms) = timeout_ms {
        config = config.call_timeout(Duration::from_millis(ms));
    }
    let connection = Connection::open(config, Arc::new(store)).await?;

    let mut command = connection.create_batch_mutation_command();
    command.set_options(batch.options);
    for group in batch.groups {
        command.add(group);
    }
    info!(
        database = connection.database(),
        groups = command.len(),
        "executing batch"
    );

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let mut outcomes = command.execute(cancel)?;
    let mut failed = 0usize;
    while let Some(outcome) = outcomes.try_next().await? {
        if !outcome.is_success() {
            failed += outcome.indexes.len();
        }
        println!("{}", serde_json::to_string(&outcome)?);
    }

    if failed > 0 {
        warn!(failed, "some mutation groups were not applied");
        bail!("{} mutation group(s) failed", failed);
    }
    info!(received = outcomes.yielded(), "batch complete");
    Ok(())
}
