use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::Parser;
use index_reaper::{
    config::ReaperConfig,
    db::DbPool,
    index::{
        IndexDeleteReport, IndexDeleteTask, ProcStats, RrdPathResolver, TableCounts,
        start_index_delete_worker,
    },
    models::IndexTable,
    observability,
};

/// CLI arguments for the index reaper
#[derive(Parser, Debug)]
#[command(version, about = "Graph index expiry and RRD reaper", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "index-reaper.toml")]
    config: PathBuf,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run the weekly expiry worker (default)
    Serve,
    /// Run one expiry pass now and exit
    RunOnce {
        /// Select and resolve only; delete no rows or files
        #[arg(long)]
        dry_run: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the RRD path a counter maps to
    Resolve {
        /// Endpoint (host) name
        #[arg(long)]
        endpoint: String,

        /// Counter key, e.g. `cpu.idle/env=prod,region=us`
        #[arg(long)]
        counter: String,

        /// Series type, e.g. GAUGE
        #[arg(long = "type", default_value = "GAUGE")]
        counter_type: String,

        /// Sampling step in seconds
        #[arg(long, default_value = "60")]
        step: i64,

        /// RRD base directory (defaults to `storage.path` from the config)
        #[arg(long)]
        base: Option<PathBuf>,
    },
    /// Run database migrations and exit
    Migrate,
    /// Validate the config file and exit
    CheckConfig,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::RunOnce { dry_run, json }) => {
            run_once(&args.config, dry_run, json).await;
        }
        Some(Command::Resolve {
            endpoint,
            counter,
            counter_type,
            step,
            base,
        }) => {
            run_resolve(&args.config, &endpoint, &counter, &counter_type, step, base);
        }
        Some(Command::Migrate) => {
            run_migrate(&args.config).await;
        }
        Some(Command::CheckConfig) => {
            load_config(&args.config);
            println!("Configuration OK: {}", args.config.display());
        }
        Some(Command::Serve) | None => {
            run_server(&args.config).await;
        }
    }
}

fn load_config(path: &Path) -> ReaperConfig {
    match ReaperConfig::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn init_tracing(config: &ReaperConfig) {
    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn connect(config: &ReaperConfig) -> DbPool {
    let pool = match DbPool::from_config(&config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if config.database.run_migrations()
        && let Err(e) = pool.run_migrations().await
    {
        tracing::error!(error = %e, "Failed to run database migrations");
        eprintln!("Failed to run database migrations: {}", e);
        std::process::exit(1);
    }

    tracing::info!(backend = pool.backend_name(), "Connected to database");
    pool
}

/// Run the scheduled worker until a shutdown signal arrives
async fn run_server(config_path: &Path) {
    let config = load_config(config_path);
    init_tracing(&config);

    if let Err(e) = observability::metrics::init_metrics(&config.observability.metrics) {
        tracing::warn!(error = %e, "Failed to initialize metrics: {e}");
    }

    tracing::info!(config_file = %config_path.display(), "Starting index reaper");

    let pool = connect(&config).await;
    if let Err(e) = pool.health_check().await {
        tracing::warn!(error = %e, "Database health check failed");
    }

    let stats = Arc::new(ProcStats::new());
    let task = Arc::new(IndexDeleteTask::from_config(
        pool.index(),
        stats,
        &config.index_delete,
        &config.storage,
    ));

    let mut worker = tokio::spawn(start_index_delete_worker(task, config.index_delete.clone()));

    tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received, stopping index reaper");
            worker.abort();
        }
        result = &mut worker => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Index delete worker terminated abnormally");
                std::process::exit(1);
            }
            // A disabled worker returns right away; nothing left to do.
        }
    }
}

/// Run a single expiry pass and print the report
async fn run_once(config_path: &Path, dry_run: bool, json: bool) {
    let config = load_config(config_path);
    init_tracing(&config);

    let pool = connect(&config).await;
    let stats = Arc::new(ProcStats::new());
    let task =
        IndexDeleteTask::from_config(pool.index(), stats, &config.index_delete, &config.storage)
            .with_dry_run(config.index_delete.dry_run || dry_run);

    match task.run().await {
        Ok(report) => {
            if json {
                match serde_json::to_string_pretty(&report) {
                    Ok(out) => println!("{out}"),
                    Err(e) => {
                        eprintln!("Failed to serialize report: {}", e);
                        std::process::exit(1);
                    }
                }
            } else {
                print_report(&report);
            }
        }
        Err(e) => {
            match e.table() {
                Some(table) => eprintln!(
                    "Index delete run failed during {} on {}: {}",
                    e.phase(),
                    table.table_name(),
                    e
                ),
                None => eprintln!("Index delete run failed during {}: {}", e.phase(), e),
            }
            std::process::exit(1);
        }
    }
}

fn print_report(report: &IndexDeleteReport) {
    let suffix = if report.dry_run { " (DRY RUN)" } else { "" };
    println!("Index delete run {}{}", report.run_id, suffix);
    println!("  cutoff:            {}", report.cutoff);
    println!("  selected:          {}", format_counts(&report.selected));
    println!("  deleted:           {}", format_counts(&report.deleted));
    println!(
        "  rrd files:         removed={} not_found={} failed={}",
        report.rrd.removed, report.rrd.not_found, report.rrd.failed
    );
    println!("  malformed tags:    {}", report.tag_parse_warnings);
    println!("  metricless keys:   {}", report.metricless_counters);
    println!("  duration:          {}ms", report.duration_ms);
    for e in report.rrd_errors.iter() {
        eprintln!("  {e}");
    }
}

fn format_counts(counts: &TableCounts) -> String {
    IndexTable::ALL
        .iter()
        .map(|&table| format!("{}={}", table.table_name(), counts.get(table)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Print the RRD path for a counter. Touches neither database nor filesystem.
fn run_resolve(
    config_path: &Path,
    endpoint: &str,
    counter: &str,
    counter_type: &str,
    step: i64,
    base: Option<PathBuf>,
) {
    let base = base.unwrap_or_else(|| load_config(config_path).storage.path);
    let resolved = RrdPathResolver::new(base).resolve(endpoint, counter, counter_type, step);

    if let Some(e) = &resolved.tag_error {
        eprintln!("Warning: {} (using partial tag set)", e);
    }
    println!("{}", resolved.path.display());
}

/// Run database migrations
async fn run_migrate(config_path: &Path) {
    let config = load_config(config_path);
    init_tracing(&config);

    tracing::info!(config_file = %config_path.display(), "Running database migrations");

    let pool = match DbPool::from_config(&config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    match pool.run_migrations().await {
        Ok(()) => {
            tracing::info!("Database migrations completed successfully");
            println!("Migrations completed successfully");
        }
        Err(e) => {
            eprintln!("Migration failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
