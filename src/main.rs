//! tagindex - inspect and migrate tag snapshot files

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tagindex::persist::{self, Snapshot};
use tagindex::{DenseDomain, ItemId, StoreConfig, TagStore};

#[derive(Debug, Parser)]
#[command(name = "tagindex", version, about = "Inspect and migrate tag snapshot files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the tags stored in a snapshot file
    Inspect {
        file: PathBuf,
        /// Highest item id of the case
        #[arg(long)]
        last_id: ItemId,
    },
    /// Rewrite a snapshot (legacy or current) in the current format
    Migrate {
        input: PathBuf,
        output: PathBuf,
        /// Highest item id of the case
        #[arg(long)]
        last_id: ItemId,
    },
    /// Open the configured module directory and list its tags
    Tags {
        /// Config file; defaults to the platform config dir
        #[arg(long)]
        config: Option<PathBuf>,
        /// Highest item id of the case
        #[arg(long)]
        last_id: ItemId,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Inspect { file, last_id } => inspect(&file, last_id),
        Command::Migrate {
            input,
            output,
            last_id,
        } => migrate(&input, &output, last_id),
        Command::Tags { config, last_id } => tags(config, last_id),
    }
}

fn read_current(path: &Path, last_id: ItemId) -> Result<(u16, Snapshot)> {
    let stored = persist::read_snapshot(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let format = stored.format();
    Ok((format, stored.into_current(last_id)))
}

fn inspect(path: &Path, last_id: ItemId) -> Result<()> {
    let (format, snapshot) = read_current(path, last_id)?;

    println!("format:  v{}", format);
    println!("checked: {}", snapshot.checked_count);
    println!("words:   {}", snapshot.typed_words.len());
    for (id, name) in &snapshot.names {
        let count = snapshot.bitmaps.get(id).map_or(0, |b| b.len());
        let report = if snapshot.in_report.contains(id) { " [report]" } else { "" };
        println!("{:>4}  {:<32} {:>8}{}", id, name, count, report);
    }
    Ok(())
}

fn migrate(input: &Path, output: &Path, last_id: ItemId) -> Result<()> {
    let (format, snapshot) = read_current(input, last_id)?;
    let bytes = snapshot.encode().context("Failed to encode snapshot")?;
    persist::write_atomic(output, &bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    log::info!(
        "Migrated {} (v{}) to {}, {} tags",
        input.display(),
        format,
        output.display(),
        snapshot.names.len()
    );
    Ok(())
}

fn tags(config: Option<PathBuf>, last_id: ItemId) -> Result<()> {
    let config = match config.or_else(StoreConfig::default_path) {
        Some(path) => StoreConfig::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => StoreConfig::default(),
    };

    let store = TagStore::new(Arc::new(DenseDomain { last_id }), &config)
        .context("Failed to open tag store")?;
    store.load();

    for (id, name) in store.tags() {
        let count = store.cardinality(id).unwrap_or(0);
        println!("{:>4}  {:<32} {:>8}", id, name, count);
    }
    println!("checked: {}", store.checked_count());
    Ok(())
}
