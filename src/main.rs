use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

use survey_flow::{
    config::{Config, LogFormat},
    flow::{Orchestrator, PacedPlayer},
    graph::{builtin, BUILTIN_SURVEYS},
    resume::PrefillRecord,
    server::{AppState, SurveyServer},
    session::{HttpSnapshotSink, Session, SessionRecorder, SnapshotSink},
    AppError,
};

/// Drive a branching survey over line-delimited JSON-RPC on stdio.
#[derive(Debug, Parser)]
#[command(name = "survey-flow", version, about)]
struct Args {
    /// Built-in survey to run
    #[arg(long, env = "SURVEY_NAME")]
    survey: Option<String>,

    /// Resume link; its query string seeds identity and answers
    #[arg(long)]
    link: Option<Url>,

    /// Snapshot sink endpoint
    #[arg(long, env = "SURVEY_SINK_URL")]
    sink_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(survey) = args.survey {
        config.survey.name = survey;
    }
    if let Some(sink_url) = args.sink_url.filter(|s| !s.trim().is_empty()) {
        config.survey.sink_url = Some(sink_url);
    }

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        survey = %config.survey.name,
        "Survey flow starting..."
    );

    let graph = match builtin(&config.survey.name) {
        Some(Ok(graph)) => graph,
        Some(Err(e)) => {
            error!(error = %e, "Built-in survey failed validation");
            return Err(e.into());
        }
        None => {
            let e = AppError::Config {
                message: format!(
                    "Unknown survey '{}', expected one of: {}",
                    config.survey.name,
                    BUILTIN_SURVEYS.join(", ")
                ),
            };
            error!(error = %e, "Failed to load survey");
            return Err(e.into());
        }
    };

    let link = args.link.unwrap_or_else(|| config.survey.base_url.clone());
    let prefill = PrefillRecord::from_url(&graph, &link);

    let sink: Option<Arc<dyn SnapshotSink>> = match config.sink() {
        Some(sink_config) => match HttpSnapshotSink::new(&sink_config) {
            Ok(sink) => {
                info!(url = %sink_config.url, "Snapshot sink initialized");
                Some(Arc::new(sink))
            }
            Err(e) => {
                error!(error = %e, "Failed to initialize snapshot sink");
                return Err(e.into());
            }
        },
        None => {
            warn!("No snapshot sink configured, snapshots are logged only");
            None
        }
    };

    let mut base = link.clone();
    base.set_query(None);
    let session = Session::new(prefill.identity.clone());
    info!(correlation_id = %session.correlation_id, "Session created");
    let recorder = SessionRecorder::new(session, base, sink, config.survey.record_anonymous);

    let orchestrator = Orchestrator::new(
        graph,
        config.transitions.flow_config(),
        Arc::new(PacedPlayer::new(config.transitions.pace)),
        recorder,
        prefill,
    );
    orchestrator.start().await;

    let state = Arc::new(AppState::new(config, orchestrator));
    let server = SurveyServer::new(state);

    info!("Driver ready, waiting for requests on stdin...");

    if let Err(e) = server.run().await {
        error!(error = %e, "Driver error");
        return Err(e.into());
    }

    info!("Shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
