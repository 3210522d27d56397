use std::collections::{BTreeMap, BTreeSet, HashSet};

use report_core::calculations::sum_and_mean;
use report_core::models::{
    ActiveLpSourcesWeekly, LifecycleState, LpStatusRow, LpStatusWeekly, RecordFilter, SavingsRow,
    SlaCountRow, SlaTrendWeekly, SourceCountRow, TollTransactionsRow, TollTransactionsWeekly,
    TransactionRecord, WeekKey, WeeklySavingsSummary, WeeklyTable,
};
use tracing::debug;

/// Stateless weekly aggregations over a normalized record slice.
///
/// Every method reads the records without mutating them and returns a fresh
/// table sorted by week key and secondary dimension. Record filters run
/// before grouping.
pub struct WeeklyAggregator;

impl WeeklyAggregator {
    /// Sum and mean of per-record savings per week. Records without savings
    /// still create their week's row.
    pub fn savings_summary(records: &[TransactionRecord]) -> WeeklySavingsSummary {
        let mut groups: BTreeMap<WeekKey, Vec<f64>> = BTreeMap::new();
        for record in records {
            let values = groups.entry(record.week_key()).or_default();
            if let Some(savings) = record.savings() {
                values.push(savings);
            }
        }

        let rows = groups
            .into_iter()
            .map(|(key, values)| {
                let (total_savings, average_savings) = sum_and_mean(values);
                SavingsRow {
                    key,
                    total_savings,
                    average_savings,
                }
            })
            .collect::<Vec<_>>();

        debug!(rows = rows.len(), "savings summary built");
        WeeklyTable::new(rows)
    }

    /// Distinct plates per lifecycle state per week, pivoted so every row
    /// carries every observed state.
    pub fn lp_status_weekly(records: &[TransactionRecord]) -> LpStatusWeekly {
        let mut plates: BTreeMap<WeekKey, BTreeMap<&LifecycleState, HashSet<&str>>> =
            BTreeMap::new();
        let mut states: BTreeSet<&LifecycleState> = BTreeSet::new();

        for record in records {
            states.insert(&record.lifecycle_state);
            let by_state = plates
                .entry(record.week_key())
                .or_default()
                .entry(&record.lifecycle_state)
                .or_default();
            if let Some(plate) = record.plate() {
                by_state.insert(plate);
            }
        }

        let rows = plates
            .into_iter()
            .map(|(key, by_state)| LpStatusRow {
                key,
                counts: states
                    .iter()
                    .map(|&state| {
                        let count = by_state.get(state).map_or(0, |p| p.len() as u64);
                        (state.clone(), count)
                    })
                    .collect(),
            })
            .collect::<Vec<_>>();

        let table = LpStatusWeekly {
            states: states.into_iter().cloned().collect(),
            rows,
        };
        debug!(
            rows = table.len(),
            states = table.states.len(),
            "lp status pivot built"
        );
        table
    }

    /// Distinct plates per toll transaction type per week, over active records
    /// admitted by `filter`.
    pub fn toll_transactions_weekly(
        records: &[TransactionRecord],
        filter: &RecordFilter,
    ) -> TollTransactionsWeekly {
        let mut plates: BTreeMap<(WeekKey, _), HashSet<&str>> = BTreeMap::new();

        for record in records
            .iter()
            .filter(|r| r.is_active() && filter.admits(r))
            .filter(|r| r.transaction_type.is_toll())
        {
            let group = plates
                .entry((record.week_key(), &record.transaction_type))
                .or_default();
            if let Some(plate) = record.plate() {
                group.insert(plate);
            }
        }

        let rows = plates
            .into_iter()
            .map(|((key, transaction_type), group)| TollTransactionsRow {
                key,
                transaction_type: transaction_type.clone(),
                count: group.len() as u64,
            })
            .collect::<Vec<_>>();

        debug!(rows = rows.len(), ?filter, "toll transactions built");
        WeeklyTable::new(rows)
    }

    /// Raw record count per source per week, over active records admitted by
    /// `filter`.
    pub fn active_lp_sources_weekly(
        records: &[TransactionRecord],
        filter: &RecordFilter,
    ) -> ActiveLpSourcesWeekly {
        let counts = count_by(
            records.iter().filter(|r| r.is_active() && filter.admits(r)),
            |r| &r.source,
        );
        let rows = counts
            .into_iter()
            .map(|((key, source), count)| SourceCountRow {
                key,
                source: source.clone(),
                count,
            })
            .collect::<Vec<_>>();

        debug!(rows = rows.len(), ?filter, "active sources built");
        WeeklyTable::new(rows)
    }

    /// Raw record count per SLA outcome per week, over records admitted by
    /// `filter`.
    pub fn sla_trend_weekly(
        records: &[TransactionRecord],
        filter: &RecordFilter,
    ) -> SlaTrendWeekly {
        let counts = count_by(records.iter().filter(|r| filter.admits(r)), |r| &r.sla_met);
        let rows = counts
            .into_iter()
            .map(|((key, sla_met), count)| SlaCountRow {
                key,
                sla_met: sla_met.clone(),
                count,
            })
            .collect::<Vec<_>>();

        debug!(rows = rows.len(), ?filter, "sla trend built");
        WeeklyTable::new(rows)
    }
}

/// Group size per (week key, dimension).
fn count_by<'a, D, F>(
    records: impl Iterator<Item = &'a TransactionRecord>,
    dimension: F,
) -> BTreeMap<(WeekKey, &'a D), u64>
where
    D: Ord + 'a,
    F: Fn(&'a TransactionRecord) -> &'a D,
{
    let mut counts = BTreeMap::new();
    for record in records {
        *counts
            .entry((record.week_key(), dimension(record)))
            .or_insert(0) += 1;
    }
    counts
}
