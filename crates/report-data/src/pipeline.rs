//! The explicit report pipeline: load, normalize once, then answer
//! aggregation and metric queries over the immutable snapshot.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Datelike, Local, Utc};
use report_core::calculations::MetricsSummarizer;
use report_core::error::Result;
use report_core::models::{
    ActiveLpSourcesWeekly, LpStatusWeekly, NormalizationPolicy, RecordFilter, SlaTrendWeekly,
    SummaryMetrics, TollTransactionsWeekly, TransactionRecord, WeekQuery, WeekSelection,
    WeeklySavingsSummary,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregator::WeeklyAggregator;
use crate::cancel::CancelFlag;
use crate::normalizer::{LifecycleNormalizer, NormalizedRecords};
use crate::reader;

/// Choices fixed when a pipeline is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub policy: NormalizationPolicy,
    /// Applied by the toll transaction view, on top of its active-only rule.
    pub toll_filter: RecordFilter,
    /// Applied by the active source view. The default keeps trailers, as the
    /// batch weekly aggregation does; the dashboard variant of this view drops
    /// them, which `exclude_trailers` reproduces.
    pub sources_filter: RecordFilter,
    /// Applied by the SLA trend view.
    pub sla_filter: RecordFilter,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            policy: NormalizationPolicy::default(),
            toll_filter: RecordFilter::excluding_trailers(),
            sources_filter: RecordFilter::default(),
            sla_filter: RecordFilter::default(),
        }
    }
}

/// Facts about how a pipeline snapshot was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetadata {
    pub generated_at: DateTime<Utc>,
    pub sheets: usize,
    pub records: usize,
    pub has_year: bool,
    pub policy: NormalizationPolicy,
    pub load_ms: u64,
    pub normalize_ms: u64,
}

/// A normalized record snapshot plus the configuration its views use.
///
/// All query methods take `&self` and are safe to call concurrently.
#[derive(Debug, Clone)]
pub struct ReportPipeline {
    records: NormalizedRecords,
    config: PipelineConfig,
    metadata: PipelineMetadata,
}

impl ReportPipeline {
    /// Build from already-loaded records. Normalization runs here, once.
    pub fn from_records(records: Vec<TransactionRecord>, config: PipelineConfig) -> Result<Self> {
        let has_year = records.iter().any(|r| r.year.is_some());
        Self::build(records, config, 0, has_year, 0)
    }

    /// Load sheets from `inputs`, then normalize.
    pub fn load(inputs: &[PathBuf], delimiter: u8, config: PipelineConfig) -> Result<Self> {
        Self::load_cancellable(inputs, delimiter, config, &CancelFlag::new())
    }

    /// Like [`load`](Self::load), but stops with `Cancelled` once `cancel`
    /// is set.
    pub fn load_cancellable(
        inputs: &[PathBuf],
        delimiter: u8,
        config: PipelineConfig,
        cancel: &CancelFlag,
    ) -> Result<Self> {
        let started = Instant::now();
        let loaded = reader::load_records(inputs, delimiter, cancel)?;
        let load_ms = started.elapsed().as_millis() as u64;
        info!(
            sheets = loaded.sheets,
            records = loaded.records.len(),
            load_ms,
            "records loaded"
        );
        cancel.check()?;
        Self::build(loaded.records, config, loaded.sheets, loaded.has_year, load_ms)
    }

    fn build(
        records: Vec<TransactionRecord>,
        config: PipelineConfig,
        sheets: usize,
        has_year: bool,
        load_ms: u64,
    ) -> Result<Self> {
        let started = Instant::now();
        let records = LifecycleNormalizer::new(config.policy).normalize(records)?;
        let normalize_ms = started.elapsed().as_millis() as u64;

        let metadata = PipelineMetadata {
            generated_at: Utc::now(),
            sheets,
            records: records.len(),
            has_year,
            policy: config.policy,
            load_ms,
            normalize_ms,
        };
        debug!(?metadata, "pipeline ready");

        Ok(Self {
            records,
            config,
            metadata,
        })
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn metadata(&self) -> &PipelineMetadata {
        &self.metadata
    }

    // ── Aggregations ──────────────────────────────────────────────────────────

    pub fn savings_summary(&self) -> WeeklySavingsSummary {
        WeeklyAggregator::savings_summary(&self.records)
    }

    pub fn lp_status_weekly(&self) -> LpStatusWeekly {
        WeeklyAggregator::lp_status_weekly(&self.records)
    }

    pub fn toll_transactions_weekly(&self) -> TollTransactionsWeekly {
        WeeklyAggregator::toll_transactions_weekly(&self.records, &self.config.toll_filter)
    }

    pub fn active_lp_sources_weekly(&self) -> ActiveLpSourcesWeekly {
        WeeklyAggregator::active_lp_sources_weekly(&self.records, &self.config.sources_filter)
    }

    pub fn sla_trend_weekly(&self) -> SlaTrendWeekly {
        WeeklyAggregator::sla_trend_weekly(&self.records, &self.config.sla_filter)
    }

    // ── Metrics ───────────────────────────────────────────────────────────────

    pub fn summarize(&self, selection: &WeekSelection) -> SummaryMetrics {
        MetricsSummarizer::summarize(&self.records, selection)
    }

    pub fn percentage_within_sla(&self, selection: &WeekSelection) -> f64 {
        MetricsSummarizer::percentage_within_sla(&self.records, selection)
    }

    // ── Discovery ─────────────────────────────────────────────────────────────

    /// Distinct years present, ascending. Empty when the input has no `YEAR`.
    pub fn available_years(&self) -> Vec<i32> {
        self.records
            .iter()
            .filter_map(|r| r.year)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct weeks present in any year, ascending.
    pub fn available_weeks(&self) -> Vec<u32> {
        self.records
            .iter()
            .map(|r| r.week)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct weeks for `year`, ascending. Defaults to the current
    /// calendar year.
    pub fn weeks_for_year(&self, year: Option<i32>) -> Vec<u32> {
        let year = year.unwrap_or_else(|| Local::now().year());
        self.records
            .iter()
            .filter(|r| r.year == Some(year))
            .map(|r| r.week)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Turn a caller query into a concrete week set.
    ///
    /// Explicit weeks win. With only a year, every week of that year is
    /// selected. With neither, every week is selected.
    pub fn resolve(&self, query: &WeekQuery) -> WeekSelection {
        let selection = if !query.weeks.is_empty() {
            WeekSelection::new(query.year, query.weeks.iter().copied())
        } else if let Some(year) = query.year {
            WeekSelection::new(Some(year), self.weeks_for_year(Some(year)))
        } else {
            WeekSelection::new(None, self.available_weeks())
        };

        debug!(?query, weeks = selection.weeks.len(), "week query resolved");
        selection
    }
}
