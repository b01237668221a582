use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cloud_bucket::{
    api,
    app::{App, Manifest},
    client::SimRegistry,
    config::Config,
    state::DeploymentState,
    target::{GcpTarget, SimTarget, Target, TargetKind},
    AppState,
};

#[derive(Parser)]
#[command(name = "cloud-bucket", version, about = "Synthesize and simulate cloud buckets")]
struct Cli {
    /// Directory holding the deployment state
    #[arg(long, global = true, env = "STATE_DIR")]
    state_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Synthesize an app manifest and print the resources and grants as JSON
    Synth {
        manifest: PathBuf,
        /// Overrides TARGET
        #[arg(long)]
        target: Option<TargetKind>,
    },
    /// Synthesize for the simulator, provision its buckets and serve them over HTTP
    Simulate { manifest: PathBuf },
    /// Print the persisted deployment state
    State,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = Cli::parse();
    let target_override = match &cli.command {
        Command::Synth { target, .. } => *target,
        Command::Simulate { .. } => Some(TargetKind::Sim),
        Command::State => None,
    };
    let config = Config::from_env()?.with_overrides(cli.state_dir, target_override)?;

    match cli.command {
        Command::Synth { manifest, .. } => {
            let app = App::from_manifest(&Manifest::load(&manifest)?)?;
            let state = DeploymentState::open(&config.state_dir)?;
            let target = build_target(&config, SimRegistry::new())?;

            let output = app.synth(target.as_ref(), &state)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Simulate { manifest } => {
            simulate(config, manifest).await?;
        }
        Command::State => {
            let state = DeploymentState::open(&config.state_dir)?;
            println!("lineage: {}", state.lineage());
            for record in state.suffixes()? {
                println!(
                    "{}\t{}\t{}",
                    record.resource,
                    record.hex,
                    record.created_at.to_rfc3339()
                );
            }
        }
    }

    Ok(())
}

fn build_target(config: &Config, registry: SimRegistry) -> anyhow::Result<Box<dyn Target>> {
    Ok(match config.target {
        TargetKind::Sim => Box::new(SimTarget::new(registry)),
        TargetKind::Gcp => {
            let project = config
                .gcp
                .project_id
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("GCP_PROJECT is required when TARGET=gcp"))?;
            let mut target = GcpTarget::new(project, &config.gcp.storage_location)
                .with_auth(config.gcp.auth());
            if let Some(endpoint) = &config.gcp.endpoint {
                target = target.with_endpoint(endpoint);
            }
            Box::new(target)
        }
    })
}

async fn simulate(config: Config, manifest: PathBuf) -> anyhow::Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "cloud-bucket simulator starting");

    let app = App::from_manifest(&Manifest::load(&manifest)?)?;
    let state = DeploymentState::open(&config.state_dir)?;
    let registry = SimRegistry::new();
    let target = build_target(&config, registry.clone())?;

    let output = app.synth(target.as_ref(), &state)?;
    let provisioned = registry.provision(&output.resources).await;
    info!(buckets = provisioned, "Simulator provisioned");
    for (resource, locator) in &output.locators {
        info!(%resource, bucket = %locator.bucket_name, "Bucket available");
    }

    let state = Arc::new(AppState {
        config: config.clone(),
        registry,
    });

    let router = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    info!("Listening on: {}", config.server.bind_address);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
