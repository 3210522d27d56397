//! Query interface over one pipeline snapshot.
//!
//! Every endpoint takes a [`WeekQuery`], resolves it against the snapshot
//! and returns its derived table restricted to the resolved weeks. A query
//! that matches nothing yields empty tables and zero metrics.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use report_core::error::ReportError;
use report_core::models::{
    ActiveLpSourcesWeekly, LpStatusWeekly, SlaTrendWeekly, SummaryMetrics,
    TollTransactionsWeekly, WeekQuery, WeekSelection, WeeklySavingsSummary,
};
use report_data::pipeline::{PipelineMetadata, ReportPipeline};
use serde::Serialize;

// ── Views ─────────────────────────────────────────────────────────────────────

/// Named report endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Summary,
    Savings,
    LpStatus,
    LpCount,
    TollTransactions,
    ActiveSources,
    SlaTrend,
    SavingsTrend,
    TollTransactionsTrend,
    ActiveSourcesTrend,
    SlaCountTrend,
    Years,
    Weeks,
    All,
}

impl View {
    pub const ALL: [View; 14] = [
        View::Summary,
        View::Savings,
        View::LpStatus,
        View::LpCount,
        View::TollTransactions,
        View::ActiveSources,
        View::SlaTrend,
        View::SavingsTrend,
        View::TollTransactionsTrend,
        View::ActiveSourcesTrend,
        View::SlaCountTrend,
        View::Years,
        View::Weeks,
        View::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            View::Summary => "summary",
            View::Savings => "savings",
            View::LpStatus => "lp-status",
            View::LpCount => "lp-count",
            View::TollTransactions => "toll-transactions",
            View::ActiveSources => "active-sources",
            View::SlaTrend => "sla-trend",
            View::SavingsTrend => "savings-trend",
            View::TollTransactionsTrend => "toll-transactions-trend",
            View::ActiveSourcesTrend => "active-sources-trend",
            View::SlaCountTrend => "sla-count-trend",
            View::Years => "years",
            View::Weeks => "weeks",
            View::All => "all",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for View {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summary" => Ok(View::Summary),
            "savings" => Ok(View::Savings),
            "lp-status" => Ok(View::LpStatus),
            "lp-count" => Ok(View::LpCount),
            "toll-transactions" => Ok(View::TollTransactions),
            "active-sources" => Ok(View::ActiveSources),
            "sla-trend" => Ok(View::SlaTrend),
            "savings-trend" => Ok(View::SavingsTrend),
            "toll-transactions-trend" => Ok(View::TollTransactionsTrend),
            "active-sources-trend" => Ok(View::ActiveSourcesTrend),
            "sla-count-trend" => Ok(View::SlaCountTrend),
            "years" => Ok(View::Years),
            "weeks" => Ok(View::Weeks),
            "all" => Ok(View::All),
            other => Err(ReportError::Config(format!("unknown view: {other}"))),
        }
    }
}

// ── Responses ─────────────────────────────────────────────────────────────────

/// Headline metrics together with the weeks they cover.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub selection: WeekSelection,
    #[serde(flatten)]
    pub metrics: SummaryMetrics,
}

/// Every table and the summary for one query.
#[derive(Debug, Clone, Serialize)]
pub struct FullReport {
    pub metadata: PipelineMetadata,
    pub summary: SummaryReport,
    pub savings: WeeklySavingsSummary,
    pub lp_status: LpStatusWeekly,
    pub toll_transactions: TollTransactionsWeekly,
    pub active_sources: ActiveLpSourcesWeekly,
    pub sla_trend: SlaTrendWeekly,
}

/// Result of one [`View`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ViewOutput {
    Summary(SummaryReport),
    Savings(WeeklySavingsSummary),
    LpStatus(LpStatusWeekly),
    TollTransactions(TollTransactionsWeekly),
    ActiveSources(ActiveLpSourcesWeekly),
    SlaTrend(SlaTrendWeekly),
    Years(Vec<i32>),
    Weeks(Vec<u32>),
    All(Box<FullReport>),
}

// ── ReportService ─────────────────────────────────────────────────────────────

/// Read-only query facade over a shared snapshot.
#[derive(Debug, Clone)]
pub struct ReportService {
    pipeline: Arc<ReportPipeline>,
}

impl ReportService {
    pub fn new(pipeline: Arc<ReportPipeline>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &ReportPipeline {
        &self.pipeline
    }

    pub fn resolve(&self, query: &WeekQuery) -> WeekSelection {
        self.pipeline.resolve(query)
    }

    pub fn summary(&self, query: &WeekQuery) -> SummaryReport {
        let selection = self.resolve(query);
        let metrics = self.pipeline.summarize(&selection);
        SummaryReport { selection, metrics }
    }

    pub fn percentage_within_sla(&self, query: &WeekQuery) -> f64 {
        self.pipeline.percentage_within_sla(&self.resolve(query))
    }

    pub fn savings(&self, query: &WeekQuery) -> WeeklySavingsSummary {
        self.pipeline.savings_summary().select(&self.resolve(query))
    }

    pub fn lp_status(&self, query: &WeekQuery) -> LpStatusWeekly {
        self.pipeline.lp_status_weekly().select(&self.resolve(query))
    }

    pub fn toll_transactions(&self, query: &WeekQuery) -> TollTransactionsWeekly {
        self.pipeline
            .toll_transactions_weekly()
            .select(&self.resolve(query))
    }

    pub fn active_sources(&self, query: &WeekQuery) -> ActiveLpSourcesWeekly {
        self.pipeline
            .active_lp_sources_weekly()
            .select(&self.resolve(query))
    }

    pub fn sla_trend(&self, query: &WeekQuery) -> SlaTrendWeekly {
        self.pipeline.sla_trend_weekly().select(&self.resolve(query))
    }

    // ── Trends ────────────────────────────────────────────────────────────

    /// Lifecycle counts for every week of `year`, for plotting one line per
    /// state. Without a year, every week in the data.
    pub fn lp_count_trend(&self, year: Option<i32>) -> LpStatusWeekly {
        self.lp_status(&Self::trend_query(year))
    }

    pub fn savings_trend(&self, year: Option<i32>) -> WeeklySavingsSummary {
        self.savings(&Self::trend_query(year))
    }

    pub fn toll_transactions_trend(&self, year: Option<i32>) -> TollTransactionsWeekly {
        self.toll_transactions(&Self::trend_query(year))
    }

    pub fn active_sources_trend(&self, year: Option<i32>) -> ActiveLpSourcesWeekly {
        self.active_sources(&Self::trend_query(year))
    }

    pub fn sla_count_trend(&self, year: Option<i32>) -> SlaTrendWeekly {
        self.sla_trend(&Self::trend_query(year))
    }

    fn trend_query(year: Option<i32>) -> WeekQuery {
        WeekQuery {
            year,
            weeks: Vec::new(),
        }
    }

    // ── Discovery ─────────────────────────────────────────────────────────

    pub fn years(&self) -> Vec<i32> {
        self.pipeline.available_years()
    }

    /// Weeks of `year`; the current calendar year when `None`.
    pub fn weeks_for_year(&self, year: Option<i32>) -> Vec<u32> {
        self.pipeline.weeks_for_year(year)
    }

    pub fn weeks(&self) -> Vec<u32> {
        self.pipeline.available_weeks()
    }

    // ── Dispatch ──────────────────────────────────────────────────────────

    pub fn full_report(&self, query: &WeekQuery) -> FullReport {
        FullReport {
            metadata: self.pipeline.metadata().clone(),
            summary: self.summary(query),
            savings: self.savings(query),
            lp_status: self.lp_status(query),
            toll_transactions: self.toll_transactions(query),
            active_sources: self.active_sources(query),
            sla_trend: self.sla_trend(query),
        }
    }

    /// Answer one named view.
    ///
    /// `lp-count` and the `*-trend` views other than `sla-trend` ignore
    /// explicit weeks and return the whole year. `weeks`
    /// lists the weeks of the queried year, or every week when the data has
    /// no years.
    pub fn query(&self, view: View, query: &WeekQuery) -> ViewOutput {
        tracing::debug!(%view, ?query, "answering view");
        match view {
            View::Summary => ViewOutput::Summary(self.summary(query)),
            View::Savings => ViewOutput::Savings(self.savings(query)),
            View::LpStatus => ViewOutput::LpStatus(self.lp_status(query)),
            View::LpCount => ViewOutput::LpStatus(self.lp_count_trend(query.year)),
            View::TollTransactions => ViewOutput::TollTransactions(self.toll_transactions(query)),
            View::ActiveSources => ViewOutput::ActiveSources(self.active_sources(query)),
            View::SlaTrend => ViewOutput::SlaTrend(self.sla_trend(query)),
            View::SavingsTrend => ViewOutput::Savings(self.savings_trend(query.year)),
            View::TollTransactionsTrend => {
                ViewOutput::TollTransactions(self.toll_transactions_trend(query.year))
            }
            View::ActiveSourcesTrend => {
                ViewOutput::ActiveSources(self.active_sources_trend(query.year))
            }
            View::SlaCountTrend => ViewOutput::SlaTrend(self.sla_count_trend(query.year)),
            View::Years => ViewOutput::Years(self.years()),
            View::Weeks => {
                if self.pipeline.metadata().has_year {
                    ViewOutput::Weeks(self.weeks_for_year(query.year))
                } else {
                    ViewOutput::Weeks(self.weeks())
                }
            }
            View::All => ViewOutput::All(Box::new(self.full_report(query))),
        }
    }
}
