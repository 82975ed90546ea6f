//! Slated server
//!
//! Wires the pieces together: configuration, the agent client, the job
//! store and queue, boot-time provisioning, the single job worker, the
//! renderer, and the HTTP surface.

mod routes;

use clap::Parser;
use routes::AppState;
use slated_agent::{AgentApi, FoundryClient};
use slated_browser::{ChromeRenderer, SlideRenderer};
use slated_core::Config;
use slated_pipeline::{run_worker, PipelineRunner};
use slated_provision::{provision, provision_channel, LocalStateStore, ProvisionSettings, StateStore};
use slated_store::{job_queue, JobStore};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Slated - single-slide generation service")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8787")]
    bind: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = Arc::new(Config::from_env()?);

    let api: Arc<dyn AgentApi> = Arc::new(FoundryClient::new(
        &config.project_endpoint,
        &config.api_version,
        config.http_timeout,
    ));
    let state_store: Arc<dyn StateStore> =
        Arc::new(LocalStateStore::new(&config.state_local_path));
    let store = Arc::new(JobStore::new(&config.job_data_dir));
    let renderer: Arc<dyn SlideRenderer> = Arc::new(ChromeRenderer::new());

    // Provisioning runs once in the background; the pipeline waits on its
    // readiness latch before the first job.
    let (publisher, provision_handle) = provision_channel();
    tokio::spawn(provision(
        api.clone(),
        state_store,
        ProvisionSettings {
            model_deployment_name: config.model_deployment_name.clone(),
            seed_data_dir: config.seed_data_dir.clone(),
        },
        publisher,
    ));

    let (queue, queue_rx) = job_queue();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let runner = Arc::new(PipelineRunner::new(
        api,
        renderer,
        store.clone(),
        provision_handle,
        config.model_deployment_name.clone(),
    ));
    let worker = tokio::spawn(run_worker(queue_rx, store.clone(), runner, shutdown_rx));

    let app = routes::router(Arc::new(AppState {
        store,
        queue,
        config,
    }));

    let listener = TcpListener::bind(&args.bind).await?;
    info!("Listening on {}", args.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    // Stop the worker; a pipeline in flight is cancelled and its job stays
    // non-terminal.
    let _ = shutdown_tx.send(true);
    let _ = worker.await;

    Ok(())
}
