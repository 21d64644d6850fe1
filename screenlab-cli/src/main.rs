//! ScreenLab CLI — screen and cache management commands.
//!
//! Commands:
//! - `screen` — screen the A-share universe with one strategy and write the
//!   ranked result table
//! - `cache status` — report cached series, bar counts and date coverage

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use screenlab_core::data::{
    Adjustment, EastmoneyClient, SeriesCache, UniverseFile, UniverseProvider, ValuationProvider,
    ValuationsFile,
};
use screenlab_core::strategy::{StrategyConfig, StrategyId};
use screenlab_runner::{
    parse_cli_date, run_screen, LogProgress, ScreenConfig, ScreenSources, ScreenStatus,
    ScreenSummary,
};

/// HTTP stack modules kept at `warn` unless `RUST_LOG` says otherwise.
const NOISY_MODULES: &[&str] = &["hyper", "hyper_util", "reqwest", "h2", "rustls"];

#[derive(Parser)]
#[command(name = "screenlab", about = "ScreenLab CLI — A-share universe screener")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Screen every listed instrument and write the ranked result table.
    Screen(ScreenArgs),
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(clap::Args)]
struct ScreenArgs {
    /// Path to a TOML config file. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Strategy: ma120 or weekly_chip_breakout.
    #[arg(long)]
    strategy: Option<String>,

    /// First day of history (YYYYMMDD or YYYY-MM-DD).
    #[arg(long)]
    start: Option<String>,

    /// Last day of history. Defaults to today.
    #[arg(long)]
    end: Option<String>,

    /// Price adjustment: none, qfq or hfq.
    #[arg(long)]
    adjust: Option<String>,

    /// Worker threads.
    #[arg(long)]
    workers: Option<usize>,

    /// Retries per symbol after the first failed fetch.
    #[arg(long)]
    retry: Option<u32>,

    /// Seconds to wait between fetch attempts.
    #[arg(long)]
    sleep: Option<f64>,

    /// Cache directory for daily series.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Result table path.
    #[arg(long)]
    result_file: Option<PathBuf>,

    /// Valuation (P/E) ceiling for ma120.
    #[arg(long)]
    max_pe: Option<f64>,

    /// Ignore cached series and fetch everything.
    #[arg(long, default_value_t = false)]
    no_cache: bool,

    /// Screen the instruments in this TOML file instead of the live listing.
    #[arg(long)]
    universe: Option<PathBuf>,

    /// Read valuations from this TOML file instead of the live quote list.
    #[arg(long)]
    valuations: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached symbols, bar counts, and date coverage.
    Status {
        /// Cache directory. Defaults to ./data/daily.
        #[arg(long, default_value = "data/daily")]
        data_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Screen(args) => {
            init_logging(args.verbose);
            run_screen_cmd(args)
        }
        Commands::Cache { action } => {
            init_logging(false);
            match action {
                CacheAction::Status { data_dir } => run_cache_status(&data_dir),
            }
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut directives = String::from(if verbose { "debug" } else { "info" });
        for module in NOISY_MODULES {
            directives.push_str(&format!(",{module}=warn"));
        }
        EnvFilter::new(directives)
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_config(args: &ScreenArgs) -> Result<ScreenConfig> {
    let mut config = match &args.config {
        Some(path) => ScreenConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ScreenConfig::default(),
    };

    if let Some(raw) = &args.strategy {
        let id: StrategyId = raw.parse()?;
        // keep file-level parameter overrides when the id is unchanged
        if config.strategy.id() != id {
            config.strategy = StrategyConfig::from(id);
        }
    }
    if let Some(raw) = &args.start {
        config.start = parse_cli_date(raw)?;
    }
    if let Some(raw) = &args.end {
        config.end = parse_cli_date(raw)?;
    }
    if let Some(raw) = &args.adjust {
        let Some(adjust) = Adjustment::parse(raw) else {
            bail!("unknown adjustment '{raw}'. Valid: none, qfq, hfq");
        };
        config.adjust = adjust;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(retries) = args.retry {
        config.retries = retries;
    }
    if let Some(secs) = args.sleep {
        config.retry_backoff_secs = secs;
    }
    if let Some(dir) = &args.data_dir {
        config.cache_dir = dir.clone();
    }
    if let Some(path) = &args.result_file {
        config.result_file = path.clone();
    }
    if let Some(max_pe) = args.max_pe {
        config.set_max_valuation_ratio(max_pe);
    }
    if args.no_cache {
        config.use_cache = false;
    }

    config.validate()?;
    Ok(config)
}

fn run_screen_cmd(args: ScreenArgs) -> Result<()> {
    let config = build_config(&args)?;
    debug!(?config, "effective configuration");

    let client = EastmoneyClient::new(config.request_timeout())?;

    let universe_file = args
        .universe
        .as_deref()
        .map(UniverseFile::from_file)
        .transpose()
        .context("loading universe file")?;
    let valuations_file = args
        .valuations
        .as_deref()
        .map(ValuationsFile::from_file)
        .transpose()
        .context("loading valuations file")?;

    let universe: &dyn UniverseProvider = match &universe_file {
        Some(file) => file,
        None => &client,
    };
    // an explicit valuations file wins over inline universe valuations
    let valuations: &dyn ValuationProvider = match (&valuations_file, &universe_file) {
        (Some(file), _) => file,
        (None, Some(file)) => file,
        (None, None) => &client,
    };

    let sources = ScreenSources {
        universe,
        history: &client,
        valuations: Some(valuations),
    };

    let summary = run_screen(&config, &sources, &LogProgress).context("screen failed")?;
    print_summary(&summary);
    Ok(())
}

fn run_cache_status(data_dir: &Path) -> Result<()> {
    if !data_dir.exists() {
        println!("Cache directory does not exist: {}", data_dir.display());
        return Ok(());
    }

    let report = SeriesCache::new(data_dir)
        .status()
        .with_context(|| format!("scanning {}", data_dir.display()))?;

    if report.files == 0 {
        println!("Cache is empty: {}", data_dir.display());
        return Ok(());
    }

    println!("Cache:        {}", data_dir.display());
    println!("Files:        {}", report.files);
    println!("Readable:     {}", report.readable);
    println!("Legacy:       {}", report.legacy);
    println!("Total bars:   {}", report.total_bars);
    if let (Some(earliest), Some(latest)) = (report.earliest, report.latest) {
        println!("Coverage:     {earliest} to {latest}");
    }
    if !report.unreadable.is_empty() {
        println!();
        println!("Unreadable ({}):", report.unreadable.len());
        for name in &report.unreadable {
            println!("  {name}");
        }
    }
    Ok(())
}

fn print_summary(summary: &ScreenSummary) {
    println!();
    println!("=== Screen Result ===");
    println!("Strategy:       {}", summary.strategy);
    println!("Universe:       {}", summary.universe);

    if summary.status == ScreenStatus::EmptyUniverse {
        println!("Universe is empty; nothing screened, no result file written.");
        println!();
        return;
    }

    println!(
        "Sources:        {} cache, {} network",
        summary.cache_hits, summary.network_fetches
    );
    println!("Accepted:       {}", summary.accepted);
    println!("Rejected:       {}", summary.rejected);
    println!("Unusable:       {}", summary.unusable);
    println!("Unavailable:    {}", summary.unavailable);
    println!("Elapsed:        {:.1}s", summary.elapsed.as_secs_f64());
    if let Some(path) = &summary.result_file {
        println!("Result file:    {}", path.display());
    }
    if summary.status == ScreenStatus::NoMatches {
        println!();
        println!("No symbol passed the screen; the result table holds only its header.");
    }

    if !summary.verdicts.is_empty() {
        println!();
        for (rank, verdict) in summary.verdicts.iter().take(10).enumerate() {
            println!(
                "{:>3}. {} {}",
                rank + 1,
                verdict.instrument.symbol,
                verdict.instrument.name
            );
        }
        if summary.verdicts.len() > 10 {
            println!("     ... {} more", summary.verdicts.len() - 10);
        }
    }
    println!();
}
