//! Runtime layer for toll reporting.
//!
//! Holds the cached, cancellable snapshot manager and the query interface
//! a presentation layer consumes.

pub mod data_manager;
pub mod service;

pub use report_core as core;
pub use report_data as data;
