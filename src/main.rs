//! # Butterfly-walk CLI
//!
//! Command-line interface for the butterfly-walk library.
//! Fills the `d_walk` column of a GTFS stop-distance table, reusing a
//! distance cache across runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use butterfly_walk::{
    setup_engine, BatchResolver, CoordinatePair, DistanceStore, HttpEngineConfig,
    HttpRoutingEngine, ResolveOptions, RoutingEngine, SqliteDistanceStore, StopDistanceTable,
    StraightLineEngine,
};
use clap::Parser;
use log::{error, warn, LevelFilter};

mod cli;

/// Command-line interface for butterfly-walk
#[derive(Parser, Debug)]
#[command(name = "butterfly-walk")]
#[command(about = "Cached walking distances for GTFS stop pairs")]
#[command(long_about = "Computes walking distances for the stop pairs of a GTFS database:
  butterfly-walk --update-db gtfs.sqlite --router-url http://localhost:3000
  butterfly-walk --update-db gtfs.sqlite --cache walk.sqlite --straight-line
  butterfly-walk --update-db gtfs.sqlite --cache walk.sqlite    # cache only

Distances already in the cache are never routed again. New distances are
written back to the cache unless --no-write-back is given.")]
#[command(version = env!("BUTTERFLY_VERSION"))]
struct Cli {
    /// GTFS SQLite database whose stop_distances.d_walk is updated
    #[arg(long, value_name = "PATH")]
    update_db: PathBuf,

    /// Distance cache database, created if missing
    #[arg(long, value_name = "PATH")]
    cache: Option<PathBuf>,

    /// butterfly-route server used for routing
    #[arg(long, value_name = "URL", conflicts_with = "straight_line")]
    router_url: Option<String>,

    /// Use great-circle distances instead of a routing server
    #[arg(long)]
    straight_line: bool,

    /// Maximum number of stop pairs to compute
    #[arg(short = 'n', value_name = "COUNT")]
    limit: Option<usize>,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(long)]
    threads: Option<usize>,

    /// Do not store new distances in the cache
    #[arg(long)]
    no_write_back: bool,

    /// Do not store failed routes (-1) in the cache
    #[arg(long)]
    no_cache_failures: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Show what would be computed without routing or writing anything
    #[arg(long)]
    dry_run: bool,
}

/// Which routing engine the flags ask for
#[derive(Debug, PartialEq)]
enum EngineChoice {
    Http(String),
    StraightLine,
    None,
}

fn engine_choice(cli: &Cli) -> EngineChoice {
    match (&cli.router_url, cli.straight_line) {
        (Some(url), _) => EngineChoice::Http(url.clone()),
        (None, true) => EngineChoice::StraightLine,
        (None, false) => EngineChoice::None,
    }
}

/// Wall-clock time spent per phase
#[derive(Debug, Default)]
struct RunTimings {
    setup: Duration,
    routing: Duration,
    write_out: Duration,
}

fn main() {
    if let Err(e) = run() {
        error!("❌ Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging to stderr
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stderr);
    if cli.verbose {
        builder.filter_level(LevelFilter::Info);
    }
    builder.init();

    if cli.verbose {
        eprintln!("🦋 Butterfly-walk v{} starting...", env!("BUTTERFLY_VERSION"));
    }

    let started = Instant::now();
    let table = StopDistanceTable::open(&cli.update_db)?;
    let stop_pairs = table.read_pairs(cli.limit)?;
    let choice = engine_choice(&cli);

    if cli.dry_run {
        eprintln!(
            "🔍 [DRY RUN] Would compute {} walking distances into {} (engine: {:?}, cache: {:?})",
            stop_pairs.len(),
            table.path().display(),
            choice,
            cli.cache
        );
        return Ok(());
    }

    let mut timings = RunTimings::default();

    let setup_started = Instant::now();
    let engine: Option<Arc<dyn RoutingEngine>> = match &choice {
        EngineChoice::Http(url) => {
            eprintln!("🌐 Routing through {url}");
            let config = HttpEngineConfig {
                base_url: url.clone(),
                ..Default::default()
            };
            let engine = setup_engine(HttpRoutingEngine::new(config))
                .with_context(|| format!("routing server at {url} is not usable"))?;
            Some(engine)
        }
        EngineChoice::StraightLine => {
            eprintln!("📏 Using straight-line distances");
            Some(setup_engine(StraightLineEngine::new())?)
        }
        EngineChoice::None => None,
    };
    timings.setup = setup_started.elapsed();

    let store = cli.cache.as_ref().and_then(|path| open_cache(path));

    if store.is_none() && engine.is_none() {
        bail!("no usable distance cache and no routing engine, nothing to compute distances with");
    }

    let progress = cli::ProgressManager::new(
        stop_pairs.len() as u64,
        &format!("🚶 Computing {} walking distances", stop_pairs.len()),
    );

    let mut options = ResolveOptions {
        progress: Some(progress.callback()),
        write_back: !cli.no_write_back,
        cache_no_route: !cli.no_cache_failures,
        ..Default::default()
    };
    if let Some(threads) = cli.threads {
        options.threads = threads;
    }

    let store_for_report = store.clone();
    let store: Option<Arc<dyn DistanceStore>> = store.map(|s| s as Arc<dyn DistanceStore>);
    let resolver = BatchResolver::with_options(store, engine, options)?;

    let coords: Vec<CoordinatePair> = stop_pairs.iter().map(|p| p.coords).collect();
    let routing_started = Instant::now();
    let outcome = resolver.resolve_batch(&coords)?;
    timings.routing = routing_started.elapsed();
    progress.finish();

    let write_started = Instant::now();
    let updated = table.write_walk_distances(&stop_pairs, &outcome.distances)?;
    timings.write_out = write_started.elapsed();

    if let Some(store) = store_for_report {
        match store.len() {
            Ok(entries) => eprintln!("💾 Cache now holds {entries} distances"),
            Err(e) => warn!("Could not count cache entries: {e}"),
        }
        store.close();
    }

    eprintln!("✅ Updated {updated} stop pairs");
    eprintln!("⏱️  Total time:    {:.3}s", started.elapsed().as_secs_f64());
    eprintln!("   Setup time:    {:.3}s", timings.setup.as_secs_f64());
    eprintln!("   Routing time:  {:.3}s", timings.routing.as_secs_f64());
    eprintln!("   Write-out time: {:.3}s", timings.write_out.as_secs_f64());
    eprintln!(
        "   Cache hits:    {} ({:.1}%)",
        outcome.hits,
        outcome.hit_ratio() * 100.0
    );

    Ok(())
}

/// Open the distance cache, or report why it cannot be used
fn open_cache(path: &Path) -> Option<Arc<SqliteDistanceStore>> {
    match SqliteDistanceStore::open(path) {
        Ok(store) => {
            eprintln!("💾 Using distance cache {}", path.display());
            Some(Arc::new(store))
        }
        Err(e) => {
            eprintln!(
                "⚠️  Could not open distance cache {}, continuing without it: {e}",
                path.display()
            );
            None
        }
    }
}
