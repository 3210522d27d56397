//! CSV sheet discovery and loading.
//!
//! A sheet is one CSV file. Several sheets sharing the same column set are
//! concatenated row-wise into one flat record set, in the order given.

use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use csv::StringRecord;
use regex::Regex;
use report_core::error::{ReportError, Result};
use report_core::models::{
    columns, LifecycleState, ReportType, SlaStatus, Source, TransactionRecord, TransactionType,
};
use tracing::{debug, warn};

use crate::cancel::CancelFlag;

// ── Public types ──────────────────────────────────────────────────────────────

/// One parsed sheet: trimmed headers plus raw rows.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<StringRecord>,
}

impl Sheet {
    fn column_index(&self) -> HashMap<&str, usize> {
        let mut index = HashMap::new();
        for (i, header) in self.headers.iter().enumerate() {
            index.entry(header.as_str()).or_insert(i);
        }
        index
    }
}

/// Output of [`load_records`].
#[derive(Debug, Clone)]
pub struct LoadedRecords {
    pub records: Vec<TransactionRecord>,
    pub sheets: usize,
    /// Whether the sheets carry a `YEAR` column.
    pub has_year: bool,
}

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Find all `.csv` files recursively under `dir`, sorted by path.
pub fn find_csv_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Expand inputs into sheet paths. Files are kept as given; directories
/// expand to the CSV files beneath them.
pub fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        if !input.exists() {
            return Err(ReportError::DataPathNotFound(input.clone()));
        }
        if input.is_dir() {
            let found = find_csv_files(input);
            if found.is_empty() {
                return Err(ReportError::NoDataFiles(input.clone()));
            }
            paths.extend(found);
        } else {
            paths.push(input.clone());
        }
    }
    Ok(paths)
}

// ── Sheet reading ─────────────────────────────────────────────────────────────

/// Read one sheet from `reader`. Headers and cells are trimmed of
/// surrounding whitespace; short rows are allowed.
pub fn read_sheet<R: Read>(
    name: &str,
    reader: R,
    delimiter: u8,
    cancel: &CancelFlag,
) -> Result<Sheet> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (i, record) in csv_reader.records().enumerate() {
        cancel.check_row(i)?;
        rows.push(record?);
    }

    debug!(sheet = name, columns = headers.len(), rows = rows.len(), "sheet read");

    Ok(Sheet {
        name: name.to_string(),
        headers,
        rows,
    })
}

/// Read one sheet from disk.
pub fn read_sheet_file(path: &Path, delimiter: u8, cancel: &CancelFlag) -> Result<Sheet> {
    let file = std::fs::File::open(path).map_err(|source| ReportError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    read_sheet(&name, file, delimiter, cancel)
}

// ── Concatenation ─────────────────────────────────────────────────────────────

/// Concatenate sheets into one record set.
///
/// Every sheet must carry the same column set as the first (column order may
/// differ; columns are aligned by name). Rows whose cells are all blank are
/// skipped. Returns `Cancelled` as soon as `cancel` is observed.
pub fn concat_sheets(sheets: &[Sheet], cancel: &CancelFlag) -> Result<LoadedRecords> {
    let Some(first) = sheets.first() else {
        return Ok(LoadedRecords {
            records: Vec::new(),
            sheets: 0,
            has_year: false,
        });
    };

    for required in columns::REQUIRED {
        if !first.headers.iter().any(|h| h == required) {
            return Err(ReportError::MissingColumn(required.to_string()));
        }
    }

    let expected: BTreeSet<&str> = first.headers.iter().map(String::as_str).collect();
    for sheet in &sheets[1..] {
        let found: BTreeSet<&str> = sheet.headers.iter().map(String::as_str).collect();
        if found != expected {
            return Err(ReportError::SchemaMismatch {
                sheet: sheet.name.clone(),
                missing: expected.difference(&found).map(|s| s.to_string()).collect(),
                unexpected: found.difference(&expected).map(|s| s.to_string()).collect(),
            });
        }
    }

    let has_year = expected.contains(columns::YEAR);
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for sheet in sheets {
        cancel.check()?;
        let index = sheet.column_index();
        for (i, row) in sheet.rows.iter().enumerate() {
            cancel.check_row(i)?;
            // Line 1 is the header.
            let line = i + 2;
            match parse_row(sheet, &index, row, line)? {
                Some(record) => records.push(record),
                None => skipped += 1,
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, "blank rows skipped while loading");
    }
    debug!(
        sheets = sheets.len(),
        records = records.len(),
        has_year,
        "sheets concatenated"
    );

    Ok(LoadedRecords {
        records,
        sheets: sheets.len(),
        has_year,
    })
}

/// Discover, read and concatenate every sheet under `inputs`.
pub fn load_records(
    inputs: &[PathBuf],
    delimiter: u8,
    cancel: &CancelFlag,
) -> Result<LoadedRecords> {
    let paths = expand_inputs(inputs)?;
    let mut sheets = Vec::with_capacity(paths.len());
    for path in &paths {
        cancel.check()?;
        sheets.push(read_sheet_file(path, delimiter, cancel)?);
    }
    concat_sheets(&sheets, cancel)
}

// ── Row parsing ───────────────────────────────────────────────────────────────

struct RowContext<'a> {
    sheet: &'a Sheet,
    index: &'a HashMap<&'a str, usize>,
    row: &'a StringRecord,
    line: usize,
}

impl RowContext<'_> {
    /// Cell text for `column`; missing trailing cells read as blank.
    fn cell(&self, column: &str) -> &str {
        self.index
            .get(column)
            .and_then(|&i| self.row.get(i))
            .unwrap_or("")
    }

    fn invalid(&self, column: &str) -> ReportError {
        ReportError::InvalidValue {
            sheet: self.sheet.name.clone(),
            row: self.line,
            column: column.to_string(),
            value: self.cell(column).to_string(),
        }
    }

    fn required_int<T: TryFrom<i64>>(&self, column: &str) -> Result<T> {
        parse_integral(self.cell(column))
            .and_then(|v| T::try_from(v).ok())
            .ok_or_else(|| self.invalid(column))
    }

    fn optional_int<T: TryFrom<i64>>(&self, column: &str) -> Result<Option<T>> {
        if self.cell(column).is_empty() {
            return Ok(None);
        }
        self.required_int(column).map(Some)
    }

    fn amount(&self, column: &str) -> Result<Option<f64>> {
        parse_amount(self.cell(column)).map_err(|_| self.invalid(column))
    }
}

fn parse_row(
    sheet: &Sheet,
    index: &HashMap<&str, usize>,
    row: &StringRecord,
    line: usize,
) -> Result<Option<TransactionRecord>> {
    if row.iter().all(|cell| cell.is_empty()) {
        return Ok(None);
    }

    let ctx = RowContext {
        sheet,
        index,
        row,
        line,
    };

    Ok(Some(TransactionRecord {
        week: ctx.required_int(columns::WEEK)?,
        year: ctx.optional_int(columns::YEAR)?,
        license_plate: ctx.cell(columns::LICENSE_PLATE).to_string(),
        lifecycle_state: LifecycleState::parse(ctx.cell(columns::LIFECYCLE_STATE)),
        source: Source::parse(ctx.cell(columns::SOURCE)),
        report_type: ReportType::parse(ctx.cell(columns::REPORT_TYPE)),
        transaction_type: TransactionType::parse(ctx.cell(columns::TRANSACTION_TYPE)),
        sla_met: SlaStatus::parse(ctx.cell(columns::SLA_MET)),
        high_rate: ctx.amount(columns::HIGH_RATES)?,
        amount: ctx.amount(columns::AMOUNT)?,
    }))
}

// ── Cell parsing ──────────────────────────────────────────────────────────────

/// Parse an integer cell. Integral floats such as `"5.0"` are accepted.
pub fn parse_integral(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<i64>() {
        return Some(v);
    }
    let f = raw.parse::<f64>().ok()?;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

fn currency_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\()?\s*(-)?\s*\$?\s*([0-9][0-9,]*(?:\.[0-9]*)?|\.[0-9]+)\s*(\))?$")
            .expect("regex is valid")
    })
}

/// Parse a currency cell. Blank cells are `Ok(None)`.
///
/// Accepts plain numbers, `$1,234.50`, `-$3`, and accounting negatives
/// such as `(12.00)`.
pub(crate) fn parse_amount(raw: &str) -> std::result::Result<Option<f64>, ()> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(v) = raw.parse::<f64>() {
        // Rejects `NaN`, `inf` and overflowing literals.
        return if v.is_finite() { Ok(Some(v)) } else { Err(()) };
    }

    let caps = currency_pattern().captures(raw).ok_or(())?;
    let open = caps.get(1).is_some();
    let close = caps.get(4).is_some();
    if open != close {
        return Err(());
    }
    let digits = caps.get(3).ok_or(())?.as_str().replace(',', "");
    let value: f64 = digits.parse().map_err(|_| ())?;
    if !value.is_finite() {
        return Err(());
    }
    let negative = open ^ caps.get(2).is_some();
    Ok(Some(if negative { -value } else { value }))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "WEEK,YEAR,LICENSE PLATE,Lifecycle state,SOURCE,REPORT TYPE,TRANSACTION TYPE,SLA MET,HIGH RATES,AMOUNT";

    fn sheet(name: &str, body: &str) -> Sheet {
        read_sheet(name, body.as_bytes(), b',', &CancelFlag::new()).expect("sheet parses")
    }

    // ── read_sheet ────────────────────────────────────────────────────────────

    #[test]
    fn test_read_sheet_trims_headers() {
        let s = sheet("s", " WEEK ,  LICENSE PLATE\n1,P1\n");
        assert_eq!(s.headers, vec!["WEEK", "LICENSE PLATE"]);
        assert_eq!(s.rows.len(), 1);
    }

    // ── concat_sheets ─────────────────────────────────────────────────────────

    #[test]
    fn test_concat_preserves_sheet_then_row_order() {
        let a = sheet(
            "a",
            &format!("{HEADER}\n1,2024,P1,Active,EZPASS,TRACTOR,Transponder Toll,Within SLA,10,4\n2,2024,P2,Ordered,EZPASS,TRACTOR,Plate Toll,Outside SLA,8,8\n"),
        );
        let b = sheet(
            "b",
            &format!("{HEADER}\n3,2024,P3,End of Life,CITATION,TRAILER,Violation,Within SLA,5,5\n"),
        );

        let loaded = concat_sheets(&[a, b], &CancelFlag::new()).expect("concat");
        let plates: Vec<&str> = loaded.records.iter().map(|r| r.license_plate.as_str()).collect();
        assert_eq!(plates, vec!["P1", "P2", "P3"]);
        assert_eq!(loaded.sheets, 2);
        assert!(loaded.has_year);
        assert_eq!(loaded.records[1].lifecycle_state, LifecycleState::Ordered);
        assert_eq!(loaded.records[2].source, Source::Citation);
        assert_eq!(loaded.records[0].high_rate, Some(10.0));
    }

    #[test]
    fn test_concat_aligns_columns_by_name() {
        let a = sheet(
            "a",
            "WEEK,LICENSE PLATE,Lifecycle state,SOURCE,REPORT TYPE,TRANSACTION TYPE,SLA MET,HIGH RATES,AMOUNT\n1,P1,Active,S,R,Plate Toll,Within SLA,3,1\n",
        );
        let b = sheet(
            "b",
            "AMOUNT,HIGH RATES,SLA MET,TRANSACTION TYPE,REPORT TYPE,SOURCE,Lifecycle state,LICENSE PLATE,WEEK\n2,9,Outside SLA,Plate Toll,R,S,Active,P2,4\n",
        );
        let loaded = concat_sheets(&[a, b], &CancelFlag::new()).expect("concat");
        let second = &loaded.records[1];
        assert_eq!(second.week, 4);
        assert_eq!(second.license_plate, "P2");
        assert_eq!(second.savings(), Some(7.0));
        assert!(!loaded.has_year);
        assert_eq!(second.year, None);
    }

    #[test]
    fn test_concat_rejects_mismatched_columns() {
        let a = sheet("a", &format!("{HEADER}\n"));
        let b = sheet("b", "WEEK,LICENSE PLATE,NOTES\n");
        let err = concat_sheets(&[a, b], &CancelFlag::new()).unwrap_err();
        match err {
            ReportError::SchemaMismatch {
                sheet,
                missing,
                unexpected,
            } => {
                assert_eq!(sheet, "b");
                assert!(missing.contains(&"SOURCE".to_string()));
                assert_eq!(unexpected, vec!["NOTES".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_concat_requires_columns() {
        let a = sheet("a", "WEEK,LICENSE PLATE\n1,P1\n");
        let err = concat_sheets(&[a], &CancelFlag::new()).unwrap_err();
        assert!(matches!(err, ReportError::MissingColumn(ref c) if c == "Lifecycle state"));
    }

    #[test]
    fn test_concat_reports_invalid_week() {
        let a = sheet(
            "a",
            &format!("{HEADER}\nfirst,2024,P1,Active,S,R,Plate Toll,Within SLA,1,1\n"),
        );
        let err = concat_sheets(&[a], &CancelFlag::new()).unwrap_err();
        match err {
            ReportError::InvalidValue {
                column,
                row,
                value,
                ..
            } => {
                assert_eq!(column, "WEEK");
                assert_eq!(row, 2);
                assert_eq!(value, "first");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_concat_skips_blank_rows_and_keeps_blank_amounts() {
        let a = sheet(
            "a",
            &format!("{HEADER}\n,,,,,,,,,\n5.0,,P1,Active,S,R,Plate Toll,Within SLA,,$4.00\n"),
        );
        let loaded = concat_sheets(&[a], &CancelFlag::new()).expect("concat");
        assert_eq!(loaded.records.len(), 1);
        let r = &loaded.records[0];
        assert_eq!(r.week, 5);
        assert_eq!(r.year, None);
        assert_eq!(r.high_rate, None);
        assert_eq!(r.amount, Some(4.0));
        assert_eq!(r.savings(), None);
    }

    #[test]
    fn test_concat_rejects_non_finite_amounts() {
        let a = sheet(
            "a",
            &format!("{HEADER}\n1,2024,P1,Active,S,R,Plate Toll,Within SLA,NaN,4\n"),
        );
        let err = concat_sheets(&[a], &CancelFlag::new()).unwrap_err();
        match err {
            ReportError::InvalidValue { column, value, .. } => {
                assert_eq!(column, "HIGH RATES");
                assert_eq!(value, "NaN");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_concat_stops_when_cancelled() {
        let body: String = (0..3 * CancelFlag::CHECK_EVERY)
            .map(|i| format!("1,2024,P{i},Active,S,R,Plate Toll,Within SLA,2,1\n"))
            .collect();
        let a = sheet("a", &format!("{HEADER}\n{body}"));
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = concat_sheets(&[a], &cancel).unwrap_err();
        assert!(matches!(err, ReportError::Cancelled));
    }

    #[test]
    fn test_read_sheet_stops_when_cancelled() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let body = format!("{HEADER}\n1,2024,P1,Active,S,R,Plate Toll,Within SLA,2,1\n");
        let err = read_sheet("a", body.as_bytes(), b',', &cancel).unwrap_err();
        assert!(matches!(err, ReportError::Cancelled));
    }

    #[test]
    fn test_concat_empty_input() {
        let loaded = concat_sheets(&[], &CancelFlag::new()).expect("concat");
        assert!(loaded.records.is_empty());
        assert_eq!(loaded.sheets, 0);
    }

    // ── cell parsing ──────────────────────────────────────────────────────────

    #[test]
    fn test_parse_amount_formats() {
        assert_eq!(parse_amount("12.5"), Ok(Some(12.5)));
        assert_eq!(parse_amount("$1,234.50"), Ok(Some(1234.5)));
        assert_eq!(parse_amount("-$3"), Ok(Some(-3.0)));
        assert_eq!(parse_amount("(12.00)"), Ok(Some(-12.0)));
        assert_eq!(parse_amount("  "), Ok(None));
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("(12.00").is_err());
    }

    #[test]
    fn test_parse_amount_rejects_non_finite() {
        for raw in ["NaN", "nan", "inf", "-inf", "infinity", "-Infinity", "1e400"] {
            assert!(parse_amount(raw).is_err(), "{raw} should be rejected");
        }
        let huge = format!("${}", "9".repeat(400));
        assert!(parse_amount(&huge).is_err());
    }

    #[test]
    fn test_parse_integral() {
        assert_eq!(parse_integral("7"), Some(7));
        assert_eq!(parse_integral("7.0"), Some(7));
        assert_eq!(parse_integral("7.5"), None);
        assert_eq!(parse_integral(""), None);
    }

    // ── files on disk ─────────────────────────────────────────────────────────

    #[test]
    fn test_load_records_from_directory() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        for (name, week) in [("b.csv", 2), ("a.csv", 1)] {
            let mut f = std::fs::File::create(tmp.path().join(name)).expect("create");
            writeln!(f, "{HEADER}").unwrap();
            writeln!(f, "{week},2024,P{week},Active,S,R,Plate Toll,Within SLA,2,1").unwrap();
        }
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let inputs = [tmp.path().to_path_buf()];
        let loaded = load_records(&inputs, b',', &CancelFlag::new()).expect("load");
        assert_eq!(loaded.sheets, 2);
        let weeks: Vec<u32> = loaded.records.iter().map(|r| r.week).collect();
        // Sheets are read in path order.
        assert_eq!(weeks, vec![1, 2]);
    }

    #[test]
    fn test_expand_inputs_missing_path() {
        let err = expand_inputs(&[PathBuf::from("/definitely/not/here")]).unwrap_err();
        assert!(matches!(err, ReportError::DataPathNotFound(_)));
    }

    #[test]
    fn test_expand_inputs_empty_directory() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let err = expand_inputs(&[tmp.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, ReportError::NoDataFiles(_)));
    }

    #[test]
    fn test_read_sheet_file_missing() {
        let missing = Path::new("/definitely/not/here.csv");
        let err = read_sheet_file(missing, b',', &CancelFlag::new()).unwrap_err();
        assert!(matches!(err, ReportError::FileRead { .. }));
    }
}
