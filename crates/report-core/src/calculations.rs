use std::collections::HashSet;

use tracing::{debug, warn};

use crate::models::{SlaStatus, SummaryMetrics, TransactionRecord, WeekSelection};

// ── Ratio helpers ─────────────────────────────────────────────────────────────

/// `numerator / denominator * 100`, or `0.0` when `denominator` is zero.
pub fn ratio_percent(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64 * 100.0
}

/// Sum and mean of the present values. The mean is `0.0` for an empty
/// input.
pub fn sum_and_mean(values: impl IntoIterator<Item = f64>) -> (f64, f64) {
    let (sum, n) = values
        .into_iter()
        .fold((0.0_f64, 0usize), |(sum, n), v| (sum + v, n + 1));
    let mean = if n == 0 { 0.0 } else { sum / n as f64 };
    (sum, mean)
}

// ── MetricsSummarizer ─────────────────────────────────────────────────────────

/// Stateless headline-statistics calculator over a normalized record slice.
pub struct MetricsSummarizer;

impl MetricsSummarizer {
    /// Compute every headline metric for the records inside `selection`.
    ///
    /// Both savings statistics are returned: `total_savings` is the sum and
    /// `average_savings` the mean of per-record savings. An empty selection
    /// yields all-zero metrics.
    pub fn summarize(records: &[TransactionRecord], selection: &WeekSelection) -> SummaryMetrics {
        let selected: Vec<&TransactionRecord> = Self::select(records, selection).collect();

        if selected.is_empty() {
            warn!(
                weeks = ?selection.weeks,
                year = ?selection.year,
                "week selection matched no records"
            );
            return SummaryMetrics::default();
        }

        let (total_savings, average_savings) =
            sum_and_mean(selected.iter().filter_map(|r| r.savings()));

        let active_lp_count = selected
            .iter()
            .filter(|r| r.is_active())
            .filter_map(|r| r.plate())
            .collect::<HashSet<_>>()
            .len();

        let within = selected
            .iter()
            .filter(|r| r.sla_met == SlaStatus::WithinSla)
            .count();

        let metrics = SummaryMetrics {
            total_transactions: selected.len(),
            total_savings,
            average_savings,
            active_lp_count,
            percentage_within_sla: ratio_percent(within, selected.len()),
        };

        debug!(?metrics, "summary metrics computed");
        metrics
    }

    /// Share of selected records marked `Within SLA`, in percent.
    ///
    /// The denominator counts every selected record whatever its SLA value.
    /// Returns `0.0` for an empty selection.
    pub fn percentage_within_sla(records: &[TransactionRecord], selection: &WeekSelection) -> f64 {
        let mut total = 0usize;
        let mut within = 0usize;
        for record in Self::select(records, selection) {
            total += 1;
            if record.sla_met == SlaStatus::WithinSla {
                within += 1;
            }
        }
        ratio_percent(within, total)
    }

    fn select<'a>(
        records: &'a [TransactionRecord],
        selection: &'a WeekSelection,
    ) -> impl Iterator<Item = &'a TransactionRecord> {
        records
            .iter()
            .filter(move |r| selection.contains(&r.week_key()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
