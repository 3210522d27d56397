//! Plain-text table rendering for the `table` output format.
//!
//! One bordered table per derived view, optionally followed by a totals row.
//! Empty views render a "no data" placeholder instead of an empty grid.

use report_core::formatting::{format_count, format_currency, format_percentage};
use report_core::models::{LpStatusWeekly, SavingsRow, WeeklyRow, WeeklyTable};
use report_runtime::service::{FullReport, SummaryReport, ViewOutput};

/// Column alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

/// A titled grid of pre-formatted cells.
#[derive(Debug, Clone)]
struct TextTable {
    title: String,
    headers: Vec<String>,
    align: Vec<Align>,
    rows: Vec<Vec<String>>,
    total: Option<Vec<String>>,
}

impl TextTable {
    fn new(title: &str, headers: &[(&str, Align)]) -> Self {
        Self {
            title: title.to_string(),
            headers: headers.iter().map(|(h, _)| h.to_string()).collect(),
            align: headers.iter().map(|(_, a)| *a).collect(),
            rows: Vec::new(),
            total: None,
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn render(&self) -> String {
        if self.rows.is_empty() {
            return render_no_data(&self.title);
        }

        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in self.rows.iter().chain(self.total.iter()) {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }

        let rule: String = widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+");
        let rule = format!("+{rule}+");

        let mut out = String::new();
        out.push_str(&format!(" {} \n", self.title));
        out.push_str(&rule);
        out.push('\n');
        out.push_str(&self.line(&self.headers, &widths, true));
        out.push_str(&rule);
        out.push('\n');
        for row in &self.rows {
            out.push_str(&self.line(row, &widths, false));
        }
        if let Some(total) = &self.total {
            out.push_str(&rule);
            out.push('\n');
            out.push_str(&self.line(total, &widths, false));
        }
        out.push_str(&rule);
        out.push('\n');
        out
    }

    fn line(&self, cells: &[String], widths: &[usize], header: bool) -> String {
        let body = widths
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                let pad = w.saturating_sub(cell.chars().count());
                let right = !header && self.align.get(i) == Some(&Align::Right);
                if right {
                    format!(" {}{} ", " ".repeat(pad), cell)
                } else {
                    format!(" {}{} ", cell, " ".repeat(pad))
                }
            })
            .collect::<Vec<_>>()
            .join("|");
        format!("|{body}|\n")
    }
}

/// Placeholder printed instead of an empty table.
pub fn render_no_data(title: &str) -> String {
    format!(" {title} \n  No data for the selected weeks.\n")
}

// ── Views ─────────────────────────────────────────────────────────────────────

pub fn render_view(output: &ViewOutput) -> String {
    match output {
        ViewOutput::Summary(summary) => render_summary(summary),
        ViewOutput::Savings(table) => render_savings(table),
        ViewOutput::LpStatus(table) => render_lp_status(table),
        ViewOutput::TollTransactions(table) => render_counts(
            "Toll transactions (distinct plates)",
            "Transaction type",
            table,
            |r| (r.transaction_type.to_string(), r.count),
        ),
        ViewOutput::ActiveSources(table) => render_counts(
            "Active plate sources (records)",
            "Source",
            table,
            |r| (r.source.to_string(), r.count),
        ),
        ViewOutput::SlaTrend(table) => {
            render_counts("SLA trend (records)", "SLA met", table, |r| {
                (r.sla_met.to_string(), r.count)
            })
        }
        ViewOutput::Years(years) => render_list("Years", years.iter().map(|y| y.to_string())),
        ViewOutput::Weeks(weeks) => render_list("Weeks", weeks.iter().map(|w| w.to_string())),
        ViewOutput::All(report) => render_full(report),
    }
}

fn render_summary(summary: &SummaryReport) -> String {
    let m = &summary.metrics;
    let mut table = TextTable::new("Summary", &[("Metric", Align::Left), ("Value", Align::Right)]);
    table.push(vec!["Total transactions".into(), format_count(m.total_transactions as u64)]);
    table.push(vec!["Total savings".into(), format_currency(m.total_savings)]);
    table.push(vec!["Average savings".into(), format_currency(m.average_savings)]);
    table.push(vec!["Active license plates".into(), format_count(m.active_lp_count as u64)]);
    table.push(vec![
        "Within SLA".into(),
        format_percentage(m.percentage_within_sla, 1),
    ]);

    let weeks = if summary.selection.weeks.is_empty() {
        "none".to_string()
    } else {
        summary
            .selection
            .weeks
            .iter()
            .map(|w| w.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let scope = match summary.selection.year {
        Some(year) => format!("  Year {year}, weeks: {weeks}\n"),
        None => format!("  Weeks: {weeks}\n"),
    };
    format!("{}{}", table.render(), scope)
}

fn render_savings(savings: &WeeklyTable<SavingsRow>) -> String {
    let mut table = TextTable::new(
        "Weekly savings",
        &[
            ("Week", Align::Left),
            ("Total", Align::Right),
            ("Average", Align::Right),
        ],
    );
    for row in &savings.rows {
        table.push(vec![
            row.key.to_string(),
            format_currency(row.total_savings),
            format_currency(row.average_savings),
        ]);
    }
    let total: f64 = savings.rows.iter().map(|r| r.total_savings).sum();
    table.total = Some(vec!["TOTAL".into(), format_currency(total), String::new()]);
    table.render()
}

fn render_lp_status(status: &LpStatusWeekly) -> String {
    let mut headers = vec![("Week".to_string(), Align::Left)];
    headers.extend(status.states.iter().map(|s| (s.to_string(), Align::Right)));
    let header_refs: Vec<(&str, Align)> = headers.iter().map(|(h, a)| (h.as_str(), *a)).collect();

    let mut table = TextTable::new("License plates by lifecycle state", &header_refs);
    for row in &status.rows {
        let mut cells = vec![row.key.to_string()];
        cells.extend(status.states.iter().map(|s| format_count(row.count(s))));
        table.push(cells);
    }
    table.render()
}

fn render_counts<R, F>(title: &str, dimension: &str, data: &WeeklyTable<R>, cells: F) -> String
where
    R: WeeklyRow + Clone,
    F: Fn(&R) -> (String, u64),
{
    let mut table = TextTable::new(
        title,
        &[
            ("Week", Align::Left),
            (dimension, Align::Left),
            ("Count", Align::Right),
        ],
    );
    let mut total = 0u64;
    for row in &data.rows {
        let (label, count) = cells(row);
        total += count;
        table.push(vec![row.key().to_string(), label, format_count(count)]);
    }
    table.total = Some(vec!["TOTAL".into(), String::new(), format_count(total)]);
    table.render()
}

fn render_list(title: &str, items: impl Iterator<Item = String>) -> String {
    let mut table = TextTable::new(title, &[(title, Align::Right)]);
    for item in items {
        table.push(vec![item]);
    }
    table.render()
}

fn render_full(report: &FullReport) -> String {
    [
        render_summary(&report.summary),
        render_savings(&report.savings),
        render_lp_status(&report.lp_status),
        render_view(&ViewOutput::TollTransactions(report.toll_transactions.clone())),
        render_view(&ViewOutput::ActiveSources(report.active_sources.clone())),
        render_view(&ViewOutput::SlaTrend(report.sla_trend.clone())),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use report_core::models::{
        LifecycleState, LpStatusRow, SlaCountRow, SlaStatus, SummaryMetrics, WeekKey,
        WeekSelection,
    };
    use std::collections::BTreeMap;

    #[test]
    fn test_summary_table_formats_values() {
        let summary = SummaryReport {
            selection: WeekSelection::new(Some(2024), [1, 2]),
            metrics: SummaryMetrics {
                total_transactions: 1_234,
                total_savings: 1_234.5,
                average_savings: 3.0,
                active_lp_count: 12,
                percentage_within_sla: 87.5,
            },
        };
        let out = render_view(&ViewOutput::Summary(summary));
        assert!(out.contains("1,234"));
        assert!(out.contains("$1,234.50"));
        assert!(out.contains("87.5%"));
        assert!(out.contains("Year 2024, weeks: 1, 2"));
    }

    #[test]
    fn test_savings_table_has_total_row() {
        let table = WeeklyTable::new(vec![
            SavingsRow {
                key: WeekKey::new(None, 1),
                total_savings: 6.0,
                average_savings: 3.0,
            },
            SavingsRow {
                key: WeekKey::new(None, 2),
                total_savings: -1.0,
                average_savings: -1.0,
            },
        ]);
        let out = render_view(&ViewOutput::Savings(table));
        assert!(out.contains("W01"));
        assert!(out.contains("-$1.00"));
        assert!(out.contains("TOTAL"));
        assert!(out.contains("$5.00"));
    }

    #[test]
    fn test_lp_status_columns_follow_states() {
        let status = LpStatusWeekly {
            states: vec![LifecycleState::Active, LifecycleState::EndOfLife],
            rows: vec![LpStatusRow {
                key: WeekKey::new(Some(2024), 3),
                counts: BTreeMap::from([(LifecycleState::Active, 4)]),
            }],
        };
        let out = render_view(&ViewOutput::LpStatus(status));
        let header = out.lines().nth(2).expect("header line");
        assert!(header.contains("Active"));
        assert!(header.contains("End of Life"));
        assert!(out.contains("2024-W03"));
    }

    #[test]
    fn test_empty_view_renders_placeholder() {
        let out = render_view(&ViewOutput::SlaTrend(WeeklyTable::<SlaCountRow>::default()));
        assert!(out.contains("No data for the selected weeks."));
        assert!(!out.contains('+'));
    }

    #[test]
    fn test_count_rows_are_aligned() {
        let table = WeeklyTable::new(vec![
            SlaCountRow {
                key: WeekKey::new(None, 1),
                sla_met: SlaStatus::WithinSla,
                count: 1_000,
            },
            SlaCountRow {
                key: WeekKey::new(None, 1),
                sla_met: SlaStatus::OutsideSla,
                count: 7,
            },
        ]);
        let out = render_view(&ViewOutput::SlaTrend(table));
        let widths: Vec<usize> = out
            .lines()
            .filter(|l| l.starts_with('|') || l.starts_with('+'))
            .map(|l| l.chars().count())
            .collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]));
        assert!(out.contains("1,007"));
    }
}
