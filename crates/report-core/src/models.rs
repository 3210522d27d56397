use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::ReportError;

// ── Column names ──────────────────────────────────────────────────────────────

/// Column identifiers as they appear in the source sheets (after trimming).
pub mod columns {
    pub const WEEK: &str = "WEEK";
    pub const YEAR: &str = "YEAR";
    pub const LICENSE_PLATE: &str = "LICENSE PLATE";
    pub const LIFECYCLE_STATE: &str = "Lifecycle state";
    pub const SOURCE: &str = "SOURCE";
    pub const REPORT_TYPE: &str = "REPORT TYPE";
    pub const TRANSACTION_TYPE: &str = "TRANSACTION TYPE";
    pub const SLA_MET: &str = "SLA MET";
    pub const HIGH_RATES: &str = "HIGH RATES";
    pub const AMOUNT: &str = "AMOUNT";

    /// Columns every record set must carry. `YEAR` is optional.
    pub const REQUIRED: &[&str] = &[
        WEEK,
        LICENSE_PLATE,
        LIFECYCLE_STATE,
        SOURCE,
        REPORT_TYPE,
        TRANSACTION_TYPE,
        SLA_MET,
        HIGH_RATES,
        AMOUNT,
    ];
}

// ── Categorical fields ────────────────────────────────────────────────────────

/// Declares a closed categorical enum with a catch-all `Other` variant.
///
/// Every variant maps to exactly one label string; anything else parses to
/// `Other` with the trimmed raw text preserved. Serialises as the label.
macro_rules! categorical {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
            /// A value outside the known set, kept verbatim.
            Other(String),
        }

        impl $name {
            /// Map a raw cell to its variant. Surrounding whitespace is ignored.
            pub fn parse(raw: &str) -> Self {
                match raw.trim() {
                    $( $label => Self::$variant, )+
                    other => Self::Other(other.to_string()),
                }
            }

            /// The label used in the source sheets.
            pub fn as_str(&self) -> &str {
                match self {
                    $( Self::$variant => $label, )+
                    Self::Other(raw) => raw.as_str(),
                }
            }

            /// `false` for values outside the declared set.
            pub fn is_known(&self) -> bool {
                !matches!(self, Self::Other(_))
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self::parse(&raw)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self::parse(raw)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

categorical! {
    /// Operational status of a license plate.
    ///
    /// `Ordered` and `Unavailable` are raw values only; normalization folds
    /// them into `Active`.
    LifecycleState {
        Active => "Active",
        EndOfLife => "End of Life",
        UnknownState => "Unknown State",
        Ordered => "Ordered",
        Unavailable => "Unavailable",
    }
}

categorical! {
    /// Billing channel of a toll transaction.
    TransactionType {
        TransponderToll => "Transponder Toll",
        PlateToll => "Plate Toll",
    }
}

categorical! {
    /// Whether a transaction was processed inside the agreed time bound.
    SlaStatus {
        WithinSla => "Within SLA",
        OutsideSla => "Outside SLA",
    }
}

categorical! {
    /// Origin system of a transaction. Electronic-toll sources are kept
    /// under `Other` with their identifier.
    Source {
        Citation => "CITATION",
    }
}

categorical! {
    /// Asset class the transaction was reported against.
    ReportType {
        Trailer => "TRAILER",
    }
}

impl LifecycleState {
    /// States that survive normalization under the allow-list policy.
    pub const CANONICAL: [LifecycleState; 3] = [
        LifecycleState::Active,
        LifecycleState::EndOfLife,
        LifecycleState::UnknownState,
    ];
}

impl TransactionType {
    /// Transponder and plate tolls; every other type is excluded from the
    /// toll transaction view.
    pub fn is_toll(&self) -> bool {
        matches!(self, TransactionType::TransponderToll | TransactionType::PlateToll)
    }
}

// ── Week keys ─────────────────────────────────────────────────────────────────

/// Temporal grouping key of every derived table.
///
/// `year` is `None` when the input carries no `YEAR` column, in which case
/// week numbers are treated as globally unique. Orders by year, then week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WeekKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub week: u32,
}

impl WeekKey {
    pub fn new(year: Option<i32>, week: u32) -> Self {
        Self { year, week }
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.year {
            Some(year) => write!(f, "{}-W{:02}", year, self.week),
            None => write!(f, "W{:02}", self.week),
        }
    }
}

// ── TransactionRecord ─────────────────────────────────────────────────────────

/// One toll / license-plate event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub week: u32,
    #[serde(default)]
    pub year: Option<i32>,
    pub license_plate: String,
    pub lifecycle_state: LifecycleState,
    pub source: Source,
    pub report_type: ReportType,
    pub transaction_type: TransactionType,
    pub sla_met: SlaStatus,
    /// Undiscounted rate; `None` when the cell was blank.
    #[serde(default)]
    pub high_rate: Option<f64>,
    /// Amount actually billed; `None` when the cell was blank.
    #[serde(default)]
    pub amount: Option<f64>,
}

impl TransactionRecord {
    pub fn week_key(&self) -> WeekKey {
        WeekKey::new(self.year, self.week)
    }

    /// `high_rate - amount`, absent when either operand is absent.
    pub fn savings(&self) -> Option<f64> {
        Some(self.high_rate? - self.amount?)
    }

    /// The plate identifier, or `None` for a blank cell. Blank plates never
    /// contribute to distinct-plate counts.
    pub fn plate(&self) -> Option<&str> {
        let plate = self.license_plate.as_str();
        (!plate.is_empty()).then_some(plate)
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle_state == LifecycleState::Active
    }

    pub fn is_trailer(&self) -> bool {
        self.report_type == ReportType::Trailer
    }
}

// ── Normalization policy ──────────────────────────────────────────────────────

/// How lifecycle states outside the remap table and the canonical set are
/// treated. Chosen once per pipeline and applied to every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NormalizationPolicy {
    /// Unmapped values are kept verbatim.
    PassThrough,
    /// Unmapped values become `Unknown State`.
    #[default]
    FallbackUnknown,
    /// Unmapped values abort normalization with
    /// [`ReportError::UnmappedCategory`].
    Strict,
}

impl NormalizationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizationPolicy::PassThrough => "pass-through",
            NormalizationPolicy::FallbackUnknown => "fallback-unknown",
            NormalizationPolicy::Strict => "strict",
        }
    }
}

impl fmt::Display for NormalizationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormalizationPolicy {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pass-through" | "passthrough" => Ok(NormalizationPolicy::PassThrough),
            "fallback-unknown" | "fallback" => Ok(NormalizationPolicy::FallbackUnknown),
            "strict" => Ok(NormalizationPolicy::Strict),
            other => Err(ReportError::Config(format!(
                "unknown normalization policy: {other}"
            ))),
        }
    }
}

// ── Record filters ────────────────────────────────────────────────────────────

/// Record-level predicate applied before grouping in one aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    /// Drop records whose report type is `TRAILER`.
    pub exclude_trailers: bool,
    /// Drop records from these sources.
    #[serde(default)]
    pub excluded_sources: Vec<Source>,
}

impl RecordFilter {
    pub fn excluding_trailers() -> Self {
        Self {
            exclude_trailers: true,
            excluded_sources: Vec::new(),
        }
    }

    pub fn admits(&self, record: &TransactionRecord) -> bool {
        if self.exclude_trailers && record.is_trailer() {
            return false;
        }
        !self.excluded_sources.contains(&record.source)
    }
}

// ── Week queries ──────────────────────────────────────────────────────────────

/// Caller-supplied week filter, as received from a presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekQuery {
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub weeks: Vec<u32>,
}

impl WeekQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_year(year: i32) -> Self {
        Self {
            year: Some(year),
            weeks: Vec::new(),
        }
    }

    pub fn weeks(weeks: impl IntoIterator<Item = u32>) -> Self {
        Self {
            year: None,
            weeks: weeks.into_iter().collect(),
        }
    }
}

/// A resolved set of weeks, optionally pinned to a year.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub weeks: BTreeSet<u32>,
}

impl WeekSelection {
    pub fn new(year: Option<i32>, weeks: impl IntoIterator<Item = u32>) -> Self {
        Self {
            year,
            weeks: weeks.into_iter().collect(),
        }
    }

    /// `true` when `key` falls inside the selection. A pinned year only
    /// matches keys carrying that same year.
    pub fn contains(&self, key: &WeekKey) -> bool {
        if let Some(year) = self.year {
            if key.year != Some(year) {
                return false;
            }
        }
        self.weeks.contains(&key.week)
    }

    pub fn is_empty(&self) -> bool {
        self.weeks.is_empty()
    }
}

// ── Derived tables ────────────────────────────────────────────────────────────

/// A derived-table row keyed by week.
pub trait WeeklyRow {
    fn key(&self) -> WeekKey;
}

/// Row-oriented derived table, sorted by key and then by its secondary
/// dimension (if any).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyTable<R> {
    pub rows: Vec<R>,
}

impl<R> Default for WeeklyTable<R> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<R: WeeklyRow + Clone> WeeklyTable<R> {
    pub fn new(rows: Vec<R>) -> Self {
        Self { rows }
    }

    /// A fresh table holding only the rows inside `selection`.
    pub fn select(&self, selection: &WeekSelection) -> Self {
        Self {
            rows: self
                .rows
                .iter()
                .filter(|row| selection.contains(&row.key()))
                .cloned()
                .collect(),
        }
    }

    /// Rows for exactly one week key.
    pub fn rows_for(&self, key: WeekKey) -> impl Iterator<Item = &R> {
        self.rows.iter().filter(move |row| row.key() == key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Total and mean savings for one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsRow {
    #[serde(flatten)]
    pub key: WeekKey,
    pub total_savings: f64,
    pub average_savings: f64,
}

/// Distinct license plates per transaction type for one week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TollTransactionsRow {
    #[serde(flatten)]
    pub key: WeekKey,
    pub transaction_type: TransactionType,
    pub count: u64,
}

/// Raw record count per source for one week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCountRow {
    #[serde(flatten)]
    pub key: WeekKey,
    pub source: Source,
    pub count: u64,
}

/// Raw record count per SLA outcome for one week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaCountRow {
    #[serde(flatten)]
    pub key: WeekKey,
    pub sla_met: SlaStatus,
    pub count: u64,
}

/// Distinct license plates per lifecycle state for one week. Every state
/// observed anywhere in the table has an entry (zero-filled).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LpStatusRow {
    #[serde(flatten)]
    pub key: WeekKey,
    pub counts: BTreeMap<LifecycleState, u64>,
}

impl LpStatusRow {
    /// Distinct plates in `state`; `0` when the state never occurs.
    pub fn count(&self, state: &LifecycleState) -> u64 {
        self.counts.get(state).copied().unwrap_or(0)
    }
}

macro_rules! impl_weekly_row {
    ($($row:ty),+ $(,)?) => {
        $(
            impl WeeklyRow for $row {
                fn key(&self) -> WeekKey {
                    self.key
                }
            }
        )+
    };
}

impl_weekly_row!(SavingsRow, TollTransactionsRow, SourceCountRow, SlaCountRow, LpStatusRow);

pub type WeeklySavingsSummary = WeeklyTable<SavingsRow>;
pub type TollTransactionsWeekly = WeeklyTable<TollTransactionsRow>;
pub type ActiveLpSourcesWeekly = WeeklyTable<SourceCountRow>;
pub type SlaTrendWeekly = WeeklyTable<SlaCountRow>;

/// Lifecycle-state pivot: one row per week, one column per observed state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LpStatusWeekly {
    /// Observed states in column order.
    pub states: Vec<LifecycleState>,
    pub rows: Vec<LpStatusRow>,
}

impl LpStatusWeekly {
    pub fn select(&self, selection: &WeekSelection) -> Self {
        Self {
            states: self.states.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| selection.contains(&row.key))
                .cloned()
                .collect(),
        }
    }

    pub fn row(&self, key: WeekKey) -> Option<&LpStatusRow> {
        self.rows.iter().find(|row| row.key == key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ── Summary metrics ───────────────────────────────────────────────────────────

/// Headline statistics for a week selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    /// Records inside the selection.
    pub total_transactions: usize,
    /// Sum of per-record savings.
    pub total_savings: f64,
    /// Mean of per-record savings; `0.0` when no record carries savings.
    pub average_savings: f64,
    /// Distinct plates among active records.
    pub active_lp_count: usize,
    /// Share of records within SLA, in `[0, 100]`.
    pub percentage_within_sla: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(week: u32, year: Option<i32>, plate: &str) -> TransactionRecord {
        TransactionRecord {
            week,
            year,
            license_plate: plate.to_string(),
            lifecycle_state: LifecycleState::Active,
            source: Source::parse("EZPASS"),
            report_type: ReportType::parse("TRACTOR"),
            transaction_type: TransactionType::TransponderToll,
            sla_met: SlaStatus::WithinSla,
            high_rate: Some(10.0),
            amount: Some(4.0),
        }
    }

    // ── categorical parsing ───────────────────────────────────────────────────

    #[test]
    fn test_lifecycle_state_parse_known() {
        assert_eq!(LifecycleState::parse("Active"), LifecycleState::Active);
        assert_eq!(LifecycleState::parse("End of Life"), LifecycleState::EndOfLife);
        assert_eq!(LifecycleState::parse(" Ordered "), LifecycleState::Ordered);
    }

    #[test]
    fn test_lifecycle_state_parse_unknown_is_other() {
        let state = LifecycleState::parse("Retired");
        assert_eq!(state, LifecycleState::Other("Retired".to_string()));
        assert!(!state.is_known());
        assert_eq!(state.as_str(), "Retired");
    }

    #[test]
    fn test_categorical_serde_uses_labels() {
        let json = serde_json::to_string(&SlaStatus::WithinSla).unwrap();
        assert_eq!(json, "\"Within SLA\"");
        let back: SlaStatus = serde_json::from_str("\"Outside SLA\"").unwrap();
        assert_eq!(back, SlaStatus::OutsideSla);
    }

    #[test]
    fn test_transaction_type_is_toll() {
        assert!(TransactionType::TransponderToll.is_toll());
        assert!(TransactionType::PlateToll.is_toll());
        assert!(!TransactionType::parse("Violation").is_toll());
    }

    // ── records ───────────────────────────────────────────────────────────────

    #[test]
    fn test_savings_is_high_rate_minus_amount() {
        let r = record(1, None, "P1");
        assert_eq!(r.savings(), Some(6.0));
    }

    #[test]
    fn test_savings_absent_when_operand_missing() {
        let mut r = record(1, None, "P1");
        r.amount = None;
        assert_eq!(r.savings(), None);
    }

    #[test]
    fn test_blank_plate_is_none() {
        assert_eq!(record(1, None, "").plate(), None);
        assert_eq!(record(1, None, "P9").plate(), Some("P9"));
    }

    // ── week keys / selections ────────────────────────────────────────────────

    #[test]
    fn test_week_key_orders_by_year_then_week() {
        let mut keys = vec![
            WeekKey::new(Some(2024), 2),
            WeekKey::new(Some(2023), 52),
            WeekKey::new(Some(2024), 1),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                WeekKey::new(Some(2023), 52),
                WeekKey::new(Some(2024), 1),
                WeekKey::new(Some(2024), 2),
            ]
        );
    }

    #[test]
    fn test_week_key_display() {
        assert_eq!(WeekKey::new(Some(2024), 5).to_string(), "2024-W05");
        assert_eq!(WeekKey::new(None, 12).to_string(), "W12");
    }

    #[test]
    fn test_selection_pins_year() {
        let sel = WeekSelection::new(Some(2024), [1, 2]);
        assert!(sel.contains(&WeekKey::new(Some(2024), 1)));
        assert!(!sel.contains(&WeekKey::new(Some(2023), 1)));
        assert!(!sel.contains(&WeekKey::new(None, 1)));
        assert!(!sel.contains(&WeekKey::new(Some(2024), 3)));
    }

    #[test]
    fn test_selection_without_year_matches_any_year() {
        let sel = WeekSelection::new(None, [7]);
        assert!(sel.contains(&WeekKey::new(None, 7)));
        assert!(sel.contains(&WeekKey::new(Some(2022), 7)));
    }

    // ── filters ───────────────────────────────────────────────────────────────

    #[test]
    fn test_record_filter_excludes_trailers() {
        let mut trailer = record(1, None, "T1");
        trailer.report_type = ReportType::Trailer;
        let filter = RecordFilter::excluding_trailers();
        assert!(!filter.admits(&trailer));
        assert!(filter.admits(&record(1, None, "P1")));
        assert!(RecordFilter::default().admits(&trailer));
    }

    #[test]
    fn test_record_filter_excludes_sources() {
        let mut citation = record(1, None, "C1");
        citation.source = Source::Citation;
        let filter = RecordFilter {
            exclude_trailers: false,
            excluded_sources: vec![Source::Citation],
        };
        assert!(!filter.admits(&citation));
        assert!(filter.admits(&record(1, None, "P1")));
    }

    // ── policy ────────────────────────────────────────────────────────────────

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "pass-through".parse::<NormalizationPolicy>().unwrap(),
            NormalizationPolicy::PassThrough
        );
        assert_eq!(
            "Strict".parse::<NormalizationPolicy>().unwrap(),
            NormalizationPolicy::Strict
        );
        assert!("lenient".parse::<NormalizationPolicy>().is_err());
        assert_eq!(NormalizationPolicy::default(), NormalizationPolicy::FallbackUnknown);
    }

    // ── tables ────────────────────────────────────────────────────────────────

    #[test]
    fn test_table_select_keeps_only_selected_weeks() {
        let table = WeeklyTable::new(vec![
            SlaCountRow {
                key: WeekKey::new(None, 1),
                sla_met: SlaStatus::WithinSla,
                count: 3,
            },
            SlaCountRow {
                key: WeekKey::new(None, 2),
                sla_met: SlaStatus::WithinSla,
                count: 4,
            },
        ]);
        let selected = table.select(&WeekSelection::new(None, [2]));
        assert_eq!(selected.len(), 1);
        assert_eq!(selected.rows[0].count, 4);
        // Source table untouched.
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_lp_status_row_count_defaults_to_zero() {
        let row = LpStatusRow {
            key: WeekKey::new(None, 1),
            counts: BTreeMap::from([(LifecycleState::Active, 2)]),
        };
        assert_eq!(row.count(&LifecycleState::Active), 2);
        assert_eq!(row.count(&LifecycleState::EndOfLife), 0);
    }

    #[test]
    fn test_lp_status_row_serializes_state_labels() {
        let row = LpStatusRow {
            key: WeekKey::new(Some(2024), 3),
            counts: BTreeMap::from([(LifecycleState::EndOfLife, 1)]),
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["year"], 2024);
        assert_eq!(value["week"], 3);
        assert_eq!(value["counts"]["End of Life"], 1);
    }
}
