//! `retro` -- command-line client for the retro filter service.
//!
//! Submits PNG images for filtering and follows each job until the service
//! reports it `completed` or `failed`, while a liveness monitor watches the
//! service health endpoint.
//!
//! # Environment variables
//!
//! | Variable             | Default                 | Description                         |
//! |----------------------|-------------------------|-------------------------------------|
//! | `RETRO_API_URL`      | `http://localhost:8081` | Service base URL (`--api-url` wins) |
//! | `POLL_INTERVAL_MS`   | `2000`                  | Delay between job status probes     |
//! | `HEALTH_INTERVAL_MS` | `15000`                 | Delay between health probes         |
//! | `HEALTH_TIMEOUT_MS`  | `5000`                  | Health probe timeout                |
//! | `STATUS_TIMEOUT_MS`  | `30000`                 | Job status probe timeout            |

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use retro_cli::sink::{absolute_result_url, run_until_done, JobOutcome, LoggingSink};
use retro_client::api::RetroApi;
use retro_client::config::ClientConfig;
use retro_client::events::{EventBus, TrackerEvent};
use retro_client::liveness::LivenessMonitor;
use retro_client::submit::submit_job;
use retro_client::tracker::JobTracker;
use retro_core::filter::Filter;
use retro_core::job::{JobDescriptor, JobId};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filename sent when the path has none (e.g. reading from a pipe).
const FALLBACK_FILENAME: &str = "image.png";

#[derive(Debug, Parser)]
#[command(name = "retro", version, about = "Apply retro filters to PNG images")]
struct Cli {
    /// Service base URL.
    #[arg(long, global = true, env = "RETRO_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit an image and wait for the filtered result.
    Submit {
        /// PNG file to upload.
        path: PathBuf,
        /// Filter to apply (grayscale or sepia).
        #[arg(long, short, default_value = "grayscale")]
        filter: Filter,
    },
    /// Follow jobs that were already submitted.
    Watch {
        /// Job ids returned by the service.
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Probe the service health endpoint once.
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "retro_cli=info,retro_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(api_url) = cli.api_url.filter(|url| !url.trim().is_empty()) {
        config.api_url = api_url.trim().to_string();
    }

    tracing::debug!(?config, "Loaded configuration");

    let api = Arc::new(
        RetroApi::new(config.api_url.clone())
            .with_health_timeout(config.health_timeout)
            .with_status_timeout(config.status_timeout),
    );
    let events = Arc::new(EventBus::default());

    match cli.command {
        Command::Health => {
            let monitor = LivenessMonitor::new(api.clone(), events);
            let liveness = monitor.check_once().await;
            println!("{}: {liveness}", api.api_url());
            Ok(if liveness.is_healthy() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Submit { path, filter } => {
            let image = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;

            let session = Session::start(&api, events, &config);
            let mut rx = session.tracker.subscribe();

            let filename = upload_filename(&path);
            let submitted = submit_job(&*api, &session.tracker, image, &filename, filter).await;
            let job = match submitted {
                Ok(job) => job,
                Err(e) => {
                    session.stop().await;
                    return Err(e).context("failed to submit job");
                }
            };
            println!("submitted {}", job.id);

            let mut sink = LoggingSink::new([job.id]);
            let finished = follow(&mut rx, &mut sink, &session.tracker).await;

            session.stop().await;
            Ok(report(api.api_url(), finished, sink))
        }
        Command::Watch { ids } => {
            let ids: Vec<JobId> = ids.into_iter().map(JobId::from).collect();

            let session = Session::start(&api, events, &config);
            let mut rx = session.tracker.subscribe();

            for id in &ids {
                session.tracker.register(JobDescriptor::new(id.clone())).await;
            }

            let mut sink = LoggingSink::new(ids);
            let finished = follow(&mut rx, &mut sink, &session.tracker).await;

            session.stop().await;
            Ok(report(api.api_url(), finished, sink))
        }
    }
}

/// A tracker plus the liveness monitor running next to it.
struct Session {
    tracker: Arc<JobTracker>,
    liveness: JoinHandle<()>,
}

impl Session {
    fn start(api: &Arc<RetroApi>, events: Arc<EventBus>, config: &ClientConfig) -> Self {
        let tracker = JobTracker::with_interval(api.clone(), events.clone(), config.poll_interval);
        let monitor = LivenessMonitor::new(api.clone(), events);
        let liveness = monitor.start(config.health_interval);
        Self { tracker, liveness }
    }

    async fn stop(self) {
        self.tracker.shutdown().await;
        self.liveness.abort();
    }
}

/// Run the sink until every job finished or the user hits Ctrl-C.
///
/// Returns `false` if interrupted.
async fn follow(
    rx: &mut broadcast::Receiver<TrackerEvent>,
    sink: &mut LoggingSink,
    tracker: &JobTracker,
) -> bool {
    tokio::select! {
        _ = run_until_done(rx, sink, tracker) => true,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, stopping job tracking");
            false
        }
    }
}

/// Print one line per finished job and pick the exit code.
fn report(api_url: &str, finished: bool, sink: LoggingSink) -> ExitCode {
    let mut success = finished;

    for (id, outcome) in sink.into_outcomes() {
        match outcome {
            JobOutcome::Completed {
                result_url: Some(url),
            } => println!("{id}\tcompleted\t{}", absolute_result_url(api_url, &url)),
            JobOutcome::Completed { result_url: None } => println!("{id}\tcompleted"),
            JobOutcome::Failed => {
                println!("{id}\tfailed");
                success = false;
            }
        }
    }

    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn upload_filename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}
