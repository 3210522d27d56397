//! TTL-cached snapshot manager.
//!
//! Wraps [`ReportPipeline::load`] with a time-to-live cache and retry logic.
//! Callers use [`DataManager::get_data`] (blocking) or
//! [`DataManager::load_cancellable`] (async) to obtain a fresh-or-cached
//! snapshot. Failed loads are retried with back-off and fall back to the
//! previous snapshot when one exists.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use report_core::error::{ReportError, Result};
use report_data::cancel::CancelFlag;
use report_data::pipeline::{PipelineConfig, ReportPipeline};

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Default cache TTL in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Maximum number of load attempts before giving up.
const MAX_RETRY_ATTEMPTS: u32 = 3;

// ── LoadRequest ───────────────────────────────────────────────────────────────

/// Everything needed to build one snapshot.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub inputs: Vec<PathBuf>,
    pub delimiter: u8,
    pub config: PipelineConfig,
}

impl LoadRequest {
    /// Load with up to [`MAX_RETRY_ATTEMPTS`] attempts.
    ///
    /// Back-off schedule: attempt 1 → 0 ms, attempt 2 → 100 ms, attempt 3 → 200 ms.
    /// Errors that cannot change between attempts are returned immediately,
    /// and so is `Cancelled` once `cancel` is set.
    pub fn load_with_retry(&self, cancel: &CancelFlag) -> Result<ReportPipeline> {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let sleep_ms = u64::from(attempt) * 100;
                tracing::debug!(attempt, sleep_ms, "retrying load after back-off");
                thread::sleep(Duration::from_millis(sleep_ms));
            }
            cancel.check()?;

            let config = self.config.clone();
            match ReportPipeline::load_cancellable(&self.inputs, self.delimiter, config, cancel) {
                Ok(pipeline) => return Ok(pipeline),
                Err(e) if attempt + 1 < MAX_RETRY_ATTEMPTS && is_transient(&e) => {
                    tracing::warn!(attempt, error = %e, "load attempt failed");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// I/O and discovery failures may clear up on retry; content errors will not.
fn is_transient(error: &ReportError) -> bool {
    matches!(
        error,
        ReportError::FileRead { .. }
            | ReportError::Io(_)
            | ReportError::DataPathNotFound(_)
            | ReportError::NoDataFiles(_)
    )
}

// ── DataManager ───────────────────────────────────────────────────────────────

/// TTL-cached holder of the current [`ReportPipeline`] snapshot.
///
/// # Example
/// ```no_run
/// use report_data::pipeline::PipelineConfig;
/// use report_runtime::data_manager::{DataManager, LoadRequest};
///
/// let request = LoadRequest {
///     inputs: vec!["reports/".into()],
///     delimiter: b',',
///     config: PipelineConfig::default(),
/// };
/// let mut mgr = DataManager::new(300, request);
/// if let Some(pipeline) = mgr.get_data(false) {
///     println!("records: {}", pipeline.records().len());
/// }
/// ```
pub struct DataManager {
    cache_ttl: Duration,
    request: LoadRequest,
    cache: Option<Arc<ReportPipeline>>,
    cache_timestamp: Option<Instant>,
    last_error: Option<String>,
}

impl DataManager {
    pub fn new(cache_ttl_secs: u64, request: LoadRequest) -> Self {
        Self {
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            request,
            cache: None,
            cache_timestamp: None,
            last_error: None,
        }
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Return a snapshot, using the cache when it is still valid.
    ///
    /// When `force_refresh` is `true` the cache is bypassed. On load failure
    /// the previous snapshot (if any) is returned.
    pub fn get_data(&mut self, force_refresh: bool) -> Option<Arc<ReportPipeline>> {
        if !force_refresh && self.is_cache_valid() {
            tracing::debug!("returning cached snapshot");
            return self.cache.clone();
        }

        let outcome = self.request.load_with_retry(&CancelFlag::new());
        self.settle(outcome).ok()
    }

    /// Async load that gives up with [`ReportError::Cancelled`] as soon as
    /// `cancel` resolves.
    ///
    /// The blocking load runs on the blocking pool. On cancellation it is told
    /// to stop through a [`CancelFlag`] and awaited, so no load work outlives
    /// this call. A valid cache is returned without loading. Cancellation
    /// leaves the cache untouched.
    pub async fn load_cancellable<C>(&mut self, cancel: C) -> Result<Arc<ReportPipeline>>
    where
        C: Future<Output = ()>,
    {
        if let (true, Some(cached)) = (self.is_cache_valid(), self.cache.clone()) {
            tracing::debug!("returning cached snapshot");
            return Ok(cached);
        }

        let flag = CancelFlag::new();
        let request = self.request.clone();
        let worker_flag = flag.clone();
        let mut task = tokio::task::spawn_blocking(move || request.load_with_retry(&worker_flag));

        let joined = tokio::select! {
            biased;
            _ = cancel => None,
            joined = &mut task => Some(joined),
        };

        let Some(joined) = joined else {
            flag.cancel();
            tracing::warn!("snapshot load cancelled; waiting for loader to stop");
            let _ = task.await;
            return Err(ReportError::Cancelled);
        };

        let outcome = joined.unwrap_or_else(|e| Err(ReportError::Other(anyhow::Error::new(e))));
        self.settle(outcome)
    }

    /// Discard the current snapshot, forcing the next call to load.
    pub fn invalidate_cache(&mut self) {
        self.cache = None;
        self.cache_timestamp = None;
        tracing::debug!("cache invalidated");
    }

    /// Age of the current snapshot, or `None` if nothing has been loaded.
    pub fn cache_age(&self) -> Option<Duration> {
        self.cache_timestamp.map(|ts| ts.elapsed())
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // ── Private helpers ───────────────────────────────────────────────────

    fn is_cache_valid(&self) -> bool {
        match (self.cache.as_ref(), self.cache_timestamp) {
            (Some(_), Some(ts)) => ts.elapsed() < self.cache_ttl,
            _ => false,
        }
    }

    /// Store a successful load, or fall back to the previous snapshot.
    fn settle(&mut self, outcome: Result<ReportPipeline>) -> Result<Arc<ReportPipeline>> {
        match outcome {
            Ok(pipeline) => {
                tracing::debug!(
                    records = pipeline.metadata().records,
                    sheets = pipeline.metadata().sheets,
                    "snapshot cache updated"
                );
                let pipeline = Arc::new(pipeline);
                self.cache = Some(Arc::clone(&pipeline));
                self.cache_timestamp = Some(Instant::now());
                self.last_error = None;
                Ok(pipeline)
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                match self.cache.clone() {
                    Some(previous) => {
                        tracing::warn!(error = %e, "load failed; falling back to cached snapshot");
                        Ok(previous)
                    }
                    None => Err(e),
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
