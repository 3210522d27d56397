//! Domain layer for the toll report pipeline.
//!
//! Holds the transaction record model, the closed categorical enums used to
//! tag records, the derived weekly table shapes, the error taxonomy, the
//! headline metrics summarizer and the CLI settings.

pub mod calculations;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;

pub use error::{ReportError, Result};
