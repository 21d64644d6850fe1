//! Screen orchestration.
//!
//! One task per instrument runs acquisition then strategy evaluation on a
//! dedicated rayon pool. Tasks report over a completion channel; the calling
//! thread owns all counting, ranking and progress reporting, so nothing in
//! the hot path is shared mutably.

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use screenlab_core::data::{
    DataError, DataSource, HistoryProvider, SeriesCache, UniverseProvider, ValuationProvider,
    Valuations,
};
use screenlab_core::domain::Instrument;
use screenlab_core::strategy::{EvalContext, Rejection, ScreeningStrategy, StrategyId, Verdict};

use crate::acquire::{AcquireOptions, Acquired, Acquisition};
use crate::config::{ConfigError, ScreenConfig};
use crate::export::{write_results, ExportError};
use crate::ranking::{InsertResult, ResultTable};

// ─── Outcomes ────────────────────────────────────────────────────────

/// Terminal state of one symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    Accepted(Verdict),
    /// The strategy evaluated the series and declined it.
    Rejected(Rejection),
    /// Data could not be normalized or is too short to evaluate.
    Unusable(String),
    /// The retry budget ran out.
    Unavailable { attempts: u32, last_error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolResult {
    pub instrument: Instrument,
    /// `None` when no series was obtained.
    pub source: Option<DataSource>,
    pub outcome: SymbolOutcome,
}

/// Collaborators of one screen.
pub struct ScreenSources<'a> {
    pub universe: &'a dyn UniverseProvider,
    pub history: &'a dyn HistoryProvider,
    /// Required only by strategies that consult valuations.
    pub valuations: Option<&'a dyn ValuationProvider>,
}

// ─── Progress ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
    pub accepted: usize,
    pub dropped: usize,
    pub elapsed: Duration,
}

/// Receives progress while a screen runs. Called from the orchestrating
/// thread only.
pub trait ScreenProgress {
    fn on_progress(&self, snapshot: &ProgressSnapshot);
}

/// Reports progress through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ScreenProgress for LogProgress {
    fn on_progress(&self, s: &ProgressSnapshot) {
        info!(
            completed = s.completed,
            total = s.total,
            accepted = s.accepted,
            dropped = s.dropped,
            elapsed_secs = s.elapsed.as_secs_f64(),
            "screen progress"
        );
    }
}

// ─── Summary & errors ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenStatus {
    /// The universe listing came back empty; nothing was screened or written.
    EmptyUniverse,
    /// Every symbol was dropped; a header-only table was written.
    NoMatches,
    Matches,
}

#[derive(Debug, Clone)]
pub struct ScreenSummary {
    pub strategy: StrategyId,
    pub universe: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub unusable: usize,
    pub unavailable: usize,
    pub cache_hits: usize,
    pub network_fetches: usize,
    /// Accepted verdicts in rank order.
    pub verdicts: Vec<Verdict>,
    pub result_file: Option<PathBuf>,
    pub elapsed: Duration,
    pub status: ScreenStatus,
}

impl ScreenSummary {
    fn empty(strategy: StrategyId, elapsed: Duration) -> Self {
        Self {
            strategy,
            universe: 0,
            accepted: 0,
            rejected: 0,
            unusable: 0,
            unavailable: 0,
            cache_hits: 0,
            network_fetches: 0,
            verdicts: Vec::new(),
            result_file: None,
            elapsed,
            status: ScreenStatus::EmptyUniverse,
        }
    }

    pub fn dropped(&self) -> usize {
        self.rejected + self.unusable + self.unavailable
    }
}

/// Run-fatal errors. Per-symbol failures never surface here.
#[derive(Debug, Error)]
pub enum ScreenError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("universe listing failed: {0}")]
    Universe(DataError),

    #[error("valuation lookup failed: {0}")]
    Valuations(DataError),

    #[error("strategy {0} needs valuations but no valuation source was given")]
    MissingValuationSource(StrategyId),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    #[error("failed to write result table: {0}")]
    Export(#[from] ExportError),
}

// ─── Run ─────────────────────────────────────────────────────────────

/// Screen the whole universe and write the ranked result table.
pub fn run_screen(
    config: &ScreenConfig,
    sources: &ScreenSources<'_>,
    progress: &dyn ScreenProgress,
) -> Result<ScreenSummary, ScreenError> {
    config.validate()?;
    let started = Instant::now();
    let strategy_id = config.strategy.id();

    let instruments = sources.universe.instruments().map_err(ScreenError::Universe)?;
    if instruments.is_empty() {
        warn!(strategy = %strategy_id, "universe is empty, nothing to screen");
        return Ok(ScreenSummary::empty(strategy_id, started.elapsed()));
    }

    let valuations = if strategy_id.needs_valuations() {
        let provider = sources
            .valuations
            .ok_or(ScreenError::MissingValuationSource(strategy_id))?;
        let snapshot = provider.valuations().map_err(ScreenError::Valuations)?;
        debug!(entries = snapshot.len(), "valuation snapshot loaded");
        Some(snapshot)
    } else {
        None
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .build()
        .map_err(|e| ScreenError::ThreadPool(e.to_string()))?;

    let strategy = config.strategy.build();
    let cache = SeriesCache::new(&config.cache_dir);
    let acquisition = Acquisition::new(sources.history, &cache, AcquireOptions::from(config));

    info!(
        strategy = %strategy_id,
        symbols = instruments.len(),
        workers = config.workers,
        start = %config.start,
        end = %config.end,
        adjust = %config.adjust,
        "screen started"
    );

    let total = instruments.len();
    let mut tally = Tally::default();
    let mut table = ResultTable::new(strategy_id);

    let (tx, rx) = mpsc::channel::<SymbolResult>();
    {
        let pool = &pool;
        let instruments = &instruments;
        let acquisition = &acquisition;
        let strategy: &dyn ScreeningStrategy = &*strategy;
        let valuations = valuations.as_ref();

        thread::scope(|scope| {
            scope.spawn(move || {
                pool.scope(|s| {
                    for instrument in instruments {
                        let tx = tx.clone();
                        s.spawn(move |_| {
                            let result = screen_symbol(instrument, acquisition, strategy, valuations);
                            let _ = tx.send(result);
                        });
                    }
                });
            });

            for result in rx.iter() {
                tally.record(&result);
                if let SymbolOutcome::Accepted(verdict) = result.outcome {
                    if table.insert(verdict) == InsertResult::Skipped {
                        warn!(symbol = %result.instrument.symbol, "verdict not ranked");
                    }
                }

                if tally.completed % config.progress_every == 0 || tally.completed == total {
                    progress.on_progress(&ProgressSnapshot {
                        completed: tally.completed,
                        total,
                        accepted: table.len(),
                        dropped: tally.dropped(),
                        elapsed: started.elapsed(),
                    });
                }
            }
        });
    }

    write_results(&config.result_file, strategy_id, table.verdicts())?;

    let accepted = table.len();
    let status = if table.is_empty() {
        ScreenStatus::NoMatches
    } else {
        ScreenStatus::Matches
    };
    let summary = ScreenSummary {
        strategy: strategy_id,
        universe: total,
        accepted,
        rejected: tally.rejected,
        unusable: tally.unusable,
        unavailable: tally.unavailable,
        cache_hits: tally.cache_hits,
        network_fetches: tally.network_fetches,
        verdicts: table.into_verdicts(),
        result_file: Some(config.result_file.clone()),
        elapsed: started.elapsed(),
        status,
    };

    info!(
        accepted = summary.accepted,
        rejected = summary.rejected,
        unusable = summary.unusable,
        unavailable = summary.unavailable,
        elapsed_secs = summary.elapsed.as_secs_f64(),
        result_file = %config.result_file.display(),
        "screen finished"
    );
    Ok(summary)
}

/// Acquire and evaluate a single instrument.
pub fn screen_symbol(
    instrument: &Instrument,
    acquisition: &Acquisition<'_>,
    strategy: &dyn ScreeningStrategy,
    valuations: Option<&Valuations>,
) -> SymbolResult {
    let symbol = instrument.symbol.as_str();

    let (source, outcome) = match acquisition.acquire(symbol) {
        Acquired::Ready { series, source } => {
            let ctx = EvalContext {
                valuation: valuations.and_then(|v| v.get(symbol)),
                as_of: Some(acquisition.options().end),
            };
            let outcome = match strategy.evaluate(&series, &ctx) {
                Ok(metrics) => SymbolOutcome::Accepted(Verdict::new(instrument.clone(), metrics)),
                Err(r) if r.is_insufficient_history() => SymbolOutcome::Unusable(r.to_string()),
                Err(r) => SymbolOutcome::Rejected(r),
            };
            (Some(source), outcome)
        }
        Acquired::Unusable { reason } => (None, SymbolOutcome::Unusable(reason)),
        Acquired::Unavailable {
            attempts,
            last_error,
        } => (
            None,
            SymbolOutcome::Unavailable {
                attempts,
                last_error,
            },
        ),
    };

    match &outcome {
        SymbolOutcome::Accepted(_) => debug!(symbol, "accepted"),
        SymbolOutcome::Rejected(r) => debug!(symbol, reason = %r, "rejected"),
        SymbolOutcome::Unusable(reason) => debug!(symbol, %reason, "unusable"),
        SymbolOutcome::Unavailable {
            attempts,
            last_error,
        } => warn!(symbol, attempts, error = %last_error, "unavailable"),
    }

    SymbolResult {
        instrument: instrument.clone(),
        source,
        outcome,
    }
}

#[derive(Debug, Default)]
struct Tally {
    completed: usize,
    rejected: usize,
    unusable: usize,
    unavailable: usize,
    cache_hits: usize,
    network_fetches: usize,
}

impl Tally {
    fn record(&mut self, result: &SymbolResult) {
        self.completed += 1;
        match result.source {
            Some(DataSource::Cache) => self.cache_hits += 1,
            Some(DataSource::Network) => self.network_fetches += 1,
            None => {}
        }
        match result.outcome {
            SymbolOutcome::Accepted(_) => {}
            SymbolOutcome::Rejected(_) => self.rejected += 1,
            SymbolOutcome::Unusable(_) => self.unusable += 1,
            SymbolOutcome::Unavailable { .. } => self.unavailable += 1,
        }
    }

    fn dropped(&self) -> usize {
        self.rejected + self.unusable + self.unavailable
    }
}
