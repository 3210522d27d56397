use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;
use crate::models::{NormalizationPolicy, WeekQuery};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Weekly toll and license-plate reporting
#[derive(Parser, Debug, Clone)]
#[command(
    name = "toll-report",
    about = "Weekly toll and license-plate reporting",
    version
)]
pub struct Settings {
    /// CSV sheets or directories of sheets to load
    #[arg(long, short, env = "TOLL_REPORT_INPUT", value_delimiter = ',')]
    pub input: Vec<PathBuf>,

    /// Field delimiter of the CSV sheets
    #[arg(long, default_value = ",")]
    pub delimiter: char,

    /// Report view
    #[arg(long, default_value = "summary", value_parser = [
        "summary", "savings", "lp-status", "lp-count", "toll-transactions",
        "active-sources", "sla-trend", "savings-trend", "toll-transactions-trend",
        "active-sources-trend", "sla-count-trend", "years", "weeks", "all",
    ])]
    pub view: String,

    /// Restrict the report to one year
    #[arg(long)]
    pub year: Option<i32>,

    /// Restrict the report to these weeks (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub weeks: Vec<u32>,

    /// Treatment of lifecycle states outside the known set
    #[arg(long, default_value = "fallback-unknown", value_parser = ["pass-through", "fallback-unknown", "strict"])]
    pub policy: String,

    /// Keep trailer records in the toll transaction view
    #[arg(long)]
    pub toll_include_trailers: bool,

    /// Drop trailer records from the active source view
    #[arg(long)]
    pub sources_exclude_trailers: bool,

    /// Drop trailer records from the SLA trend view
    #[arg(long)]
    pub sla_exclude_trailers: bool,

    /// Hide a source from the active source view (repeatable)
    #[arg(long)]
    pub exclude_source: Vec<String>,

    /// Output format
    #[arg(long, default_value = "json", value_parser = ["json", "table"])]
    pub format: String,

    /// Seconds a loaded snapshot stays fresh
    #[arg(long, default_value = "300")]
    pub cache_ttl: u64,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.toll-report/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Vec<PathBuf>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl LastUsedParams {
    /// Default location, `~/.toll-report/last_used.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".toll-report").join("last_used.json")
    }

    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to `path`, creating parent directories.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    pub fn clear_at(path: &std::path::Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit
    /// value was provided, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] with explicit arguments and
    /// config path.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            if let Err(e) = LastUsedParams::clear_at(config_path) {
                tracing::warn!(error = %e, "could not clear saved configuration");
            }
            return Self::apply_debug(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        if !is_arg_explicitly_set(&matches, "input") && settings.input.is_empty() {
            if let Some(v) = last.input {
                settings.input = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "delimiter") {
            if let Some(v) = last.delimiter {
                settings.delimiter = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "policy") {
            if let Some(v) = last.policy {
                settings.policy = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "view") {
            if let Some(v) = last.view {
                settings.view = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "format") {
            if let Some(v) = last.format {
                settings.format = v;
            }
        }

        settings = Self::apply_debug(settings);

        let params = LastUsedParams::from(&settings);
        if let Err(e) = params.save_to(config_path) {
            tracing::debug!(error = %e, "could not persist last-used parameters");
        }

        settings
    }

    /// The configured lifecycle normalization policy.
    pub fn normalization_policy(&self) -> Result<NormalizationPolicy> {
        self.policy.parse()
    }

    /// The week filter given on the command line.
    pub fn week_query(&self) -> WeekQuery {
        WeekQuery {
            year: self.year,
            weeks: self.weeks.clone(),
        }
    }

    fn apply_debug(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            input: (!s.input.is_empty()).then(|| s.input.clone()),
            delimiter: Some(s.delimiter),
            policy: Some(s.policy.clone()),
            view: Some(s.view.clone()),
            format: Some(s.format.clone()),
        }
    }
}

/// `true` when `name` came from the command line or its environment
/// variable rather than a default.
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches!(
        matches.value_source(name),
        Some(clap::parser::ValueSource::CommandLine | clap::parser::ValueSource::EnvVariable)
    )
}

// ── Tests ──────────────────────────────────────────────────────────────────────
