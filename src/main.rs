//! CLI entry point for the stop amenity dashboard.
//!
//! Resolves the session dataset (survey feed or bundled fallback), then
//! reports on it, lists filtered stops or writes the filtered CSV export.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use stop_amenities::{
    config::DashboardConfig,
    dashboard::Dashboard,
    export::write_export,
    fetch::BasicClient,
    filter::FilterChange,
    metrics::pct,
    model::{AmenityKey, SurveyStatus},
    source::SurveyLoader,
};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "stop_amenities")]
#[command(about = "Transit stop amenity dashboard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the dataset: source, counts, distributions, last survey
    Summary {
        /// Survey feed URL or local path (overrides SURVEY_SOURCE)
        #[arg(short, long)]
        source: Option<String>,

        /// Write the resolved dataset as survey JSON to this path
        #[arg(long, value_name = "PATH")]
        dump: Option<PathBuf>,
    },
    /// List the stops matching the given filters
    Stops {
        #[command(flatten)]
        filters: FilterArgs,

        /// Survey feed URL or local path (overrides SURVEY_SOURCE)
        #[arg(long)]
        source: Option<String>,
    },
    /// Write the filtered stops to a CSV file
    Export {
        /// CSV output path (overrides EXPORT_PATH)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        filters: FilterArgs,

        /// Survey feed URL or local path (overrides SURVEY_SOURCE)
        #[arg(long)]
        source: Option<String>,
    },
    /// Classify a survey timestamp by its age
    Classify {
        #[arg(value_name = "TIMESTAMP")]
        timestamp: String,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Case-insensitive match on stop name or id
    #[arg(short = 'q', long, default_value = "")]
    search: String,

    /// Only stops where this amenity was detected (e.g. "bench", "bikeRack")
    #[arg(short, long)]
    amenity: Option<AmenityKey>,

    /// Only stops with this status (recent, needs-update, no-data)
    #[arg(long)]
    status: Option<SurveyStatus>,
}

impl FilterArgs {
    fn changes(self) -> [FilterChange; 3] {
        [
            FilterChange::Search(self.search),
            FilterChange::Amenity(self.amenity),
            FilterChange::Status(self.status),
        ]
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = DashboardConfig::from_env();

    // Logging setup: colored stderr + JSON rolling log file
    let log_dir = config
        .log_file_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = config
        .log_file_path
        .file_name()
        .unwrap_or(OsStr::new("stop_amenities.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Summary { source, dump } => {
            let dashboard = load_dashboard(&config, source.as_deref()).await;
            summary(&dashboard);

            if let Some(path) = dump {
                let json = serde_json::to_string_pretty(dashboard.dataset().as_ref())?;
                std::fs::write(&path, json)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!(path = %path.display(), "Dataset written");
            }
        }
        Commands::Stops { filters, source } => {
            let mut dashboard = load_dashboard(&config, source.as_deref()).await;
            for change in filters.changes() {
                dashboard.on_filter_change(change);
            }

            let view = dashboard.view();
            info!(criteria = ?dashboard.criteria(), "{}", view.stop_count_label());

            for stop in &view.filtered {
                info!(
                    stop_id = %stop.id,
                    name = %stop.name,
                    direction = %stop.direction,
                    status = %stop.status,
                    last_surveyed = %stop.last_surveyed,
                    detected = stop.amenities.detected_count(),
                    "Stop"
                );
            }
        }
        Commands::Export {
            output,
            filters,
            source,
        } => {
            let mut dashboard = load_dashboard(&config, source.as_deref()).await;
            for change in filters.changes() {
                dashboard.on_filter_change(change);
            }

            let output = output.unwrap_or_else(|| config.export_path.clone());
            let stops = dashboard.filtered_stops();
            if stops.is_empty() {
                warn!("No stops match the filters, writing header only");
            }
            write_export(&output, &stops)?;
        }
        Commands::Classify { timestamp } => {
            let now = Utc::now();
            let status = SurveyStatus::classify(&timestamp, now);
            let overdue = SurveyStatus::is_overdue(&timestamp, now);
            info!(timestamp = %timestamp, status = %status, label = status.label(), overdue, "Classified");
            println!("{status}");
        }
    }

    Ok(())
}

/// Starts the survey attempt and waits for it to settle. The dashboard shows
/// the fallback snapshot until the attempt finishes.
#[tracing::instrument(skip(config))]
async fn load_dashboard(config: &DashboardConfig, source: Option<&str>) -> Dashboard {
    let location = config.survey_location(source);
    let mut loader = SurveyLoader::start(BasicClient::new(), location);

    let mut dashboard = Dashboard::new(loader.snapshot());
    dashboard.replace_snapshot(loader.settled().await);
    dashboard
}

fn summary(dashboard: &Dashboard) {
    let view = dashboard.view();
    let stats = &view.stats;

    info!(
        source = %view.source,
        stops = view.total_stops,
        last_survey = %view.last_survey_label(),
        "{}",
        view.stop_count_label()
    );

    info!(
        surveyed = stats.surveyed_count,
        surveyed_pct = %format!("{:.1}", pct(stats.surveyed_count, stats.total)),
        recent = stats.recent_count,
        needs_update = stats.needs_update_count,
        no_data = stats.no_data_count(),
        amenities_detected = stats.amenity_detected_total,
        "Survey coverage"
    );

    for count in &view.amenity_distribution {
        info!(
            amenity = count.label,
            detected = count.detected_count,
            pct = %format!("{:.1}", pct(count.detected_count, stats.total)),
            "Amenity"
        );
    }

    for (label, count) in view.status_distribution.labelled() {
        info!(status = label, count, "Status");
    }

    let anomalies = dashboard.dataset().anomalies();
    if !anomalies.is_empty() {
        warn!(count = anomalies.len(), "Dataset has record anomalies");
    }
}
