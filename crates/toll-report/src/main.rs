mod bootstrap;
mod render;

use anyhow::{bail, Context, Result};
use report_core::models::{RecordFilter, Source};
use report_core::settings::Settings;
use report_data::pipeline::PipelineConfig;
use report_runtime::data_manager::{DataManager, LoadRequest};
use report_runtime::service::{ReportService, View};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("Toll Report v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "View: {}, Policy: {}, Format: {}",
        settings.view,
        settings.policy,
        settings.format
    );

    let view: View = settings.view.parse()?;
    let request = load_request(&settings)?;
    let mut data_manager = DataManager::new(settings.cache_ttl, request);

    let cancel = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received; cancelling load");
        } else {
            std::future::pending::<()>().await;
        }
    };
    let pipeline = data_manager
        .load_cancellable(cancel)
        .await
        .context("could not load report data")?;

    let service = ReportService::new(pipeline);
    let output = service.query(view, &settings.week_query());

    match settings.format.as_str() {
        "table" => print!("{}", render::render_view(&output)),
        _ => println!("{}", serde_json::to_string_pretty(&output)?),
    }

    Ok(())
}

/// Resolve inputs and build the pipeline configuration from settings.
fn load_request(settings: &Settings) -> Result<LoadRequest> {
    let inputs = if settings.input.is_empty() {
        match bootstrap::discover_data_path() {
            Some(path) => {
                tracing::info!(path = %path.display(), "using default data directory");
                vec![path]
            }
            None => bail!("no input given; pass --input or set TOLL_REPORT_INPUT"),
        }
    } else {
        settings.input.clone()
    };

    if !settings.delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character");
    }

    Ok(LoadRequest {
        inputs,
        delimiter: settings.delimiter as u8,
        config: pipeline_config(settings)?,
    })
}

fn pipeline_config(settings: &Settings) -> Result<PipelineConfig> {
    Ok(PipelineConfig {
        policy: settings.normalization_policy()?,
        toll_filter: RecordFilter {
            exclude_trailers: !settings.toll_include_trailers,
            excluded_sources: Vec::new(),
        },
        sources_filter: RecordFilter {
            exclude_trailers: settings.sources_exclude_trailers,
            excluded_sources: settings
                .exclude_source
                .iter()
                .map(|s| Source::parse(s))
                .collect(),
        },
        sla_filter: RecordFilter {
            exclude_trailers: settings.sla_exclude_trailers,
            excluded_sources: Vec::new(),
        },
    })
}
