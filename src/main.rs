//! refpredict CLI - batch tooling around the dataset assembly engine
//!
//! Four entry points, all driven by one TOML configuration file:
//!
//! 1. `warm-cache`: run every descriptor's queries once so later runs
//!    (possibly on machines without store access) hit only the cache
//! 2. `types`: list the distinct refactoring types present in the store
//! 3. `counts`: per-level instance counts per refactoring type
//! 4. `retrieve`: assemble one labelled training set and print a summary
//!
//! Failures of a single refactoring/dataset unit are logged and skipped;
//! an interruption terminates the whole run after cache cleanup.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use log::{error, info};

use refpredict::db::query;
use refpredict::{
    build_refactorings, reduce_features, retrieve_labelled_instances, CancelToken, Column, Config,
    Connector, DataTable, Interrupted, Level, MySqlStore, QueryCache, Refactoring,
};

/// Labelled training data assembly for refactoring prediction models.
#[derive(Parser, Debug)]
#[command(name = "refpredict")]
#[command(version)]
#[command(about, long_about = None)]
struct Cli {
    /// Configuration file (missing file means built-in defaults)
    #[arg(short, long, default_value = "refpredict.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute every descriptor's queries once to populate the cache
    WarmCache,
    /// List the distinct refactoring types present in the store
    Types,
    /// Show per-refactoring instance counts for every level
    Counts,
    /// Assemble one labelled training set and print a summary
    Retrieve {
        /// Refactoring type, e.g. "Extract Method"
        #[arg(long)]
        refactoring: String,

        /// Level of the refactoring: class, method, variable, field, other
        #[arg(long)]
        level: String,

        /// Stable-commit threshold; defaults to the level's own
        #[arg(long)]
        threshold: Option<i64>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    let cache = QueryCache::open(&config.cache_dir)?;
    let store = if config.db_available {
        Some(MySqlStore::connect(&config.db)?)
    } else {
        info!("store marked unavailable, running from cache only");
        None
    };
    let mut connector =
        Connector::new(store, cache, config.use_cache, CancelToken::new()).show_sql(config.show_sql);

    let result = match cli.command {
        Command::WarmCache => warm_cache(&mut connector, &config),
        Command::Types => list_types(&mut connector, &config),
        Command::Counts => list_counts(&mut connector, &config),
        Command::Retrieve {
            refactoring,
            level,
            threshold,
        } => retrieve(&mut connector, &config, &refactoring, &level, threshold),
    };

    // The connection is released on every exit path, including errors.
    connector.close();
    result
}

/// Run every known query once. Per-descriptor failures are logged and the
/// warm-up continues; an interruption stops it.
fn warm_cache(connector: &mut Connector<MySqlStore>, config: &Config) -> Result<()> {
    let descriptors = build_refactorings(&Level::all());
    let datasets = all_datasets(config);
    info!(
        "warming cache for {} descriptors over {} datasets",
        descriptors.len(),
        datasets.len()
    );

    for dataset in &datasets {
        for descriptor in &descriptors {
            let fetched = descriptor
                .refactored_instances(connector, dataset, config.file_type)
                .and_then(|_| {
                    descriptor.non_refactored_instances(connector, dataset, config.file_type)
                });
            match fetched {
                Ok(_) => info!(
                    "warmed {} at {} level (dataset {:?})",
                    descriptor.name(),
                    descriptor.level(),
                    dataset
                ),
                Err(e) if e.downcast_ref::<Interrupted>().is_some() => return Err(e),
                Err(e) => error!(
                    "skipping {} at {} level (dataset {:?}): {:#}",
                    descriptor.name(),
                    descriptor.level(),
                    dataset,
                    e
                ),
            }
        }
    }
    info!("cache warm-up complete, {} store queries", connector.store_calls());
    Ok(())
}

fn list_types(connector: &mut Connector<MySqlStore>, config: &Config) -> Result<()> {
    for dataset in &all_datasets(config) {
        println!("dataset {:?}:", dataset);
        let table = connector.execute(&query::refactoring_types_query(dataset))?;
        print_table(&table);
    }
    Ok(())
}

fn list_counts(connector: &mut Connector<MySqlStore>, config: &Config) -> Result<()> {
    for dataset in &all_datasets(config) {
        for level in Level::all() {
            println!("dataset {:?}, {} level:", dataset, level);
            let table =
                connector.execute(&query::level_refactorings_count_query(level, dataset))?;
            print_table(&table);
        }
    }
    Ok(())
}

fn retrieve(
    connector: &mut Connector<MySqlStore>,
    config: &Config,
    refactoring: &str,
    level: &str,
    threshold: Option<i64>,
) -> Result<()> {
    let level = parse_level(level)?;
    let threshold = match threshold.or_else(|| level.stable_thresholds().first().copied()) {
        Some(threshold) => threshold,
        None => bail!("{} level has no stable-commit threshold", level),
    };
    let descriptor = Refactoring::new(refactoring, level, threshold);

    for dataset in &all_datasets(config) {
        match retrieve_labelled_instances(connector, &descriptor, dataset, true, None, config)? {
            Some(mut instances) => {
                let retained = reduce_features(&mut instances, config)?;
                let positives = instances.y.iter().filter(|&&l| l == 1).count();
                println!(
                    "dataset {:?}: {} instances ({} positive, {} negative), {} features",
                    dataset,
                    instances.y.len(),
                    positives,
                    instances.y.len() - positives,
                    instances.x.n_cols()
                );
                if let Some(retained) = retained {
                    println!("  retained features: {}", retained.join(", "));
                }
            }
            None => println!("dataset {:?}: no instances", dataset),
        }
    }
    Ok(())
}

/// Training plus validation datasets, in configuration order. An empty
/// list means one unrestricted pass.
fn all_datasets(config: &Config) -> Vec<String> {
    let mut datasets = config.datasets.clone();
    datasets.extend(config.validation_datasets.iter().cloned());
    if datasets.is_empty() {
        datasets.push(String::new());
    }
    datasets
}

fn parse_level(name: &str) -> Result<Level> {
    match name.to_lowercase().as_str() {
        "class" => Ok(Level::Class),
        "method" => Ok(Level::Method),
        "variable" => Ok(Level::Variable),
        "field" => Ok(Level::Field),
        "other" => Ok(Level::Other),
        other => bail!("unknown level: {}", other),
    }
}

fn print_table(table: &DataTable) {
    println!("  {}", table.names().join(" | "));
    for row in 0..table.n_rows() {
        let cells: Vec<String> = table
            .names()
            .iter()
            .map(|name| match table.column(name) {
                Some(Column::Num(v)) => v[row].map_or("NA".into(), |n| n.to_string()),
                Some(Column::Str(v)) => v[row].clone().unwrap_or_else(|| "NA".into()),
                None => "NA".into(),
            })
            .collect();
        println!("  {}", cells.join(" | "));
    }
}
