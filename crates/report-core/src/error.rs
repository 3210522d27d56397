use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the toll report pipeline.
///
/// Empty week selections and zero denominators are not represented here:
/// they are recovered locally as empty tables and `0.0` ratios.
#[derive(Error, Debug)]
pub enum ReportError {
    /// A sheet could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV reader rejected the content of a sheet.
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    /// A JSON document could not be parsed or written.
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A sheet's column set differs from the first sheet's.
    #[error("Sheet {sheet} does not match the first sheet's columns (missing: {missing:?}, unexpected: {unexpected:?})")]
    SchemaMismatch {
        sheet: String,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    /// A required column is absent after loading.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// A cell could not be converted to its semantic type.
    #[error("Invalid value {value:?} in column {column} (sheet {sheet}, row {row})")]
    InvalidValue {
        sheet: String,
        row: usize,
        column: String,
        value: String,
    },

    /// A categorical value is outside the known set and the active policy
    /// rejects it.
    #[error("Unmapped {field} value: {value}")]
    UnmappedCategory { field: String, value: String },

    /// The expected input path does not exist.
    #[error("Data path not found: {0}")]
    DataPathNotFound(PathBuf),

    /// No CSV sheets were found under the given directory.
    #[error("No CSV files found in {0}")]
    NoDataFiles(PathBuf),

    /// The load step was cancelled before it completed.
    #[error("Load cancelled")]
    Cancelled,

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the report crates.
pub type Result<T> = std::result::Result<T, ReportError>;
