//! Per-symbol acquisition: cache check, fetch with retry, normalize, persist.
//!
//! Resolution order:
//! 1. If caching is enabled and the cache holds a readable series → use it
//!    (legacy-layout files are rewritten canonically on the way)
//! 2. Otherwise fetch from the provider, retrying errors and empty responses
//!    with a fixed back-off
//! 3. Normalize; a non-empty response that does not normalize is unusable
//!    and is not retried
//! 4. Persist the fresh series to the cache before handing it on; a failed
//!    write is logged and the series is still used

use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, warn};

use screenlab_core::data::{
    Adjustment, Canonicalizer, DataError, DataSource, FetchRequest, HistoryProvider, SeriesCache,
};
use screenlab_core::domain::DailySeries;

use crate::config::ScreenConfig;

/// Knobs of the acquisition pipeline, lifted out of [`ScreenConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct AcquireOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub adjust: Adjustment,
    pub retries: u32,
    pub retry_backoff: Duration,
    pub request_timeout: Duration,
    pub use_cache: bool,
}

impl From<&ScreenConfig> for AcquireOptions {
    fn from(config: &ScreenConfig) -> Self {
        Self {
            start: config.start,
            end: config.end,
            adjust: config.adjust,
            retries: config.retries,
            retry_backoff: config.retry_backoff(),
            request_timeout: config.request_timeout(),
            use_cache: config.use_cache,
        }
    }
}

/// Terminal state of one acquisition.
#[derive(Debug, Clone, PartialEq)]
pub enum Acquired {
    /// A normalized series ready for evaluation.
    Ready {
        series: DailySeries,
        source: DataSource,
    },
    /// Data arrived but is unusable.
    Unusable { reason: String },
    /// Every fetch attempt failed.
    Unavailable { attempts: u32, last_error: String },
}

/// The acquisition pipeline, shared by every worker of a screen.
pub struct Acquisition<'a> {
    provider: &'a dyn HistoryProvider,
    cache: &'a SeriesCache,
    options: AcquireOptions,
}

impl<'a> Acquisition<'a> {
    pub fn new(provider: &'a dyn HistoryProvider, cache: &'a SeriesCache, options: AcquireOptions) -> Self {
        Self {
            provider,
            cache,
            options,
        }
    }

    pub fn options(&self) -> &AcquireOptions {
        &self.options
    }

    /// Run the pipeline for one symbol.
    pub fn acquire(&self, symbol: &str) -> Acquired {
        if self.options.use_cache {
            if let Some(entry) = self.cache.load_entry(symbol) {
                if entry.legacy {
                    debug!(symbol, "rewriting legacy cache file");
                    self.persist(symbol, &entry.series);
                }
                return Acquired::Ready {
                    series: entry.series,
                    source: DataSource::Cache,
                };
            }
        }

        let request = FetchRequest {
            symbol: symbol.to_string(),
            start: self.options.start,
            end: self.options.end,
            adjust: self.options.adjust,
            timeout: self.options.request_timeout,
        };

        let tries = self.options.retries.saturating_add(1);
        let mut last_error = String::new();

        for attempt in 1..=tries {
            match self.provider.fetch_daily(&request) {
                Ok(frame) if frame.height() > 0 => {
                    return match Canonicalizer::normalize(frame) {
                        Ok(series) => {
                            self.persist(symbol, &series);
                            Acquired::Ready {
                                series,
                                source: DataSource::Network,
                            }
                        }
                        Err(e) => Acquired::Unusable {
                            reason: e.to_string(),
                        },
                    };
                }
                Ok(_) => {
                    last_error = DataError::EmptyResponse {
                        symbol: symbol.to_string(),
                    }
                    .to_string();
                }
                Err(e) => last_error = e.to_string(),
            }

            debug!(
                symbol,
                attempt,
                tries,
                provider = self.provider.name(),
                error = %last_error,
                "fetch attempt failed"
            );
            if attempt < tries && !self.options.retry_backoff.is_zero() {
                thread::sleep(self.options.retry_backoff);
            }
        }

        Acquired::Unavailable {
            attempts: tries,
            last_error,
        }
    }

    fn persist(&self, symbol: &str, series: &DailySeries) {
        if let Err(e) = self.cache.save(symbol, series) {
            warn!(symbol, error = %e, "failed to write cache file");
        }
    }
}
