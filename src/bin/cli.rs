// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! tabexpr CLI

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabexpr::cache::Request;
use tabexpr::{
    evaluate, load_table, parse_expression, EngineConfig, IndexSet, ParallelEvaluator,
    SamplesCache, Table, Universe,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tabexpr")]
#[command(about = "Evaluate typed expressions over tabular data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration file (defaults to ./tabexpr.toml when present)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression on the rows of a table
    Eval {
        /// JSON table file
        #[arg(short, long)]
        table: PathBuf,

        /// Expression text
        #[arg(short, long)]
        expr: String,

        /// Comma separated rows to print (all rows by default)
        #[arg(short, long, value_delimiter = ',')]
        rows: Vec<usize>,
    },

    /// Drive random sub-expression substitutions through the samples cache
    Explore {
        /// JSON table file
        #[arg(short, long)]
        table: PathBuf,

        /// Starting expression
        #[arg(short, long)]
        expr: String,

        /// Number of substitutions to try
        #[arg(short = 'n', long, default_value = "1000")]
        iterations: usize,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },

    /// Compare cached results of every sub-expression with row-wise evaluation
    Check {
        /// JSON table file
        #[arg(short, long)]
        table: PathBuf,

        /// Expression text
        #[arg(short, long)]
        expr: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => {
            let mut config = EngineConfig::from_file(path)?;
            config.apply_env(|key| std::env::var(key).ok())?;
            config
        }
        None => EngineConfig::load()?,
    };
    debug!(?config, "configuration loaded");

    match &cli.command {
        Commands::Eval { table, expr, rows } => eval_command(table, expr, rows),
        Commands::Explore {
            table,
            expr,
            iterations,
            seed,
        } => explore_command(table, expr, *iterations, *seed, &config),
        Commands::Check { table, expr } => check_command(table, expr, &config),
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn eval_command(table_path: &Path, source: &str, rows: &[usize]) -> Result<()> {
    let table = load_table(table_path)?;
    let universe = Universe::new();
    let expr = parse_expression(source, &table, &universe)
        .with_context(|| format!("Failed to parse expression: {}", source))?;

    println!("{} {}", "Expression:".bold(), expr);
    println!("{} {}", "Type:".bold(), expr.value_type());

    let samples = evaluate(&expr, &table)?;
    let selected: Vec<usize> = if rows.is_empty() {
        (0..table.num_rows()).collect()
    } else {
        rows.to_vec()
    };
    for row in selected {
        if row >= table.num_rows() {
            bail!("row {} out of range ({} rows)", row, table.num_rows());
        }
        println!("{:>6}  {}", row, samples.get(row));
    }
    Ok(())
}

fn explore_command(
    table_path: &Path,
    source: &str,
    iterations: usize,
    seed: u64,
    config: &EngineConfig,
) -> Result<()> {
    let table = Arc::new(load_table(table_path)?);
    let universe = Universe::new();
    let root = parse_expression(source, &table, &universe)
        .with_context(|| format!("Failed to parse expression: {}", source))?;

    let cache = SamplesCache::new(table.clone(), &config.cache);
    let evaluator = match config.threads {
        Some(threads) => ParallelEvaluator::with_threads(threads)?,
        None => ParallelEvaluator::new(),
    };
    let mut rng = StdRng::seed_from_u64(seed);

    println!("{} {}", "Exploring:".bold(), root);
    println!(
        "  {} rows, {} worker thread(s), eviction by {}",
        table.num_rows(),
        evaluator.num_threads(),
        cache.policy_name()
    );

    let pb = ProgressBar::new(iterations as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .map_err(|e| anyhow!("invalid progress template: {}", e))?
            .progress_chars("#>-"),
    );

    let mut substitutions = 0usize;
    let mut failures = 0usize;
    for _ in 0..iterations {
        pb.inc(1);

        let node = root.sample_node_biased(&mut rng, 0.5);
        let Some(replacement) = node.sample_sub_node(&mut rng).cloned() else {
            continue;
        };
        let candidate = match universe.clone_and_substitute(&root, &node, &replacement) {
            Ok(candidate) => candidate,
            Err(e) => {
                debug!("substitution of {} rejected: {}", node, e);
                continue;
            }
        };
        substitutions += 1;

        let indices = Arc::new(random_rows(&table, &mut rng));
        let mut requests: Vec<Request> = candidate
            .internal_nodes()
            .into_iter()
            .map(|expr| (expr, indices.clone()))
            .collect();
        requests.push((root.clone(), indices.clone()));

        for result in evaluator.compute_batch(&cache, &requests) {
            if let Err(e) = result {
                debug!("evaluation failed: {}", e);
                failures += 1;
            }
        }
        universe.add_importance(&candidate, 1.0 / (1.0 + candidate.tree_size() as f64));
    }
    pb.finish_with_message("Done");

    let stats = cache.stats();
    println!("\n{}", "Samples cache".bold());
    println!("  Substitutions: {}", substitutions);
    if failures > 0 {
        println!("  {}: {}", "Failed evaluations".red(), failures);
    }
    println!(
        "  Hits: {}  Misses: {}  Hit rate: {}",
        stats.hits.to_string().green(),
        stats.misses.to_string().yellow(),
        format!("{:.1}%", stats.hit_rate()).bold()
    );
    println!(
        "  Resident: {}/{} nodes, {} of {} bytes",
        stats.cached_nodes, stats.tracked_nodes, stats.size_in_bytes, stats.max_size_in_bytes
    );
    println!("  Sorted hits: {}  Evictions: {}", stats.sorted_hits, stats.evictions);
    println!(
        "  Root importance: {:.3}",
        universe.importance(root.id())
    );
    cache.log_cache_information();
    Ok(())
}

fn check_command(table_path: &Path, source: &str, config: &EngineConfig) -> Result<()> {
    let table = Arc::new(load_table(table_path)?);
    let universe = Universe::new();
    let expr = parse_expression(source, &table, &universe)
        .with_context(|| format!("Failed to parse expression: {}", source))?;

    let cache = SamplesCache::new(table.clone(), &config.cache);
    for node in expr.internal_nodes() {
        cache.cache_node(&node, None, true)?;
    }

    if cache.check_cache_is_correct(&expr)? {
        println!("{} cache agrees with row-wise evaluation", "✓".green());
        Ok(())
    } else {
        println!("{} cache disagrees with row-wise evaluation", "✗".red());
        std::process::exit(1);
    }
}

/// Each row kept with probability one half, in increasing order
fn random_rows(table: &Table, rng: &mut StdRng) -> IndexSet {
    let mut indices = IndexSet::with_capacity(table.num_rows() / 2);
    for row in 0..table.num_rows() {
        if rng.gen_bool(0.5) {
            indices.append(row);
        }
    }
    indices
}
