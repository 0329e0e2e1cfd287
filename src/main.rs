use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sbserver::{ClusterData, ServerOptions};

/// Grace period for in-flight requests to drain during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

/// Serve a Kubernetes support bundle as a read-only API server
#[derive(Debug, Parser)]
#[command(name = "sbserver", version, about)]
struct Args {
    /// Path to an extracted support bundle directory
    bundle: PathBuf,

    /// Enable debug logging, including HTTP response bodies
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_directive = if args.debug { "sbserver=debug" } else { "sbserver=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cluster = Arc::new(ClusterData::find(&args.bundle)?);

    let shutdown = CancellationToken::new();
    let handle = sbserver::start(
        cluster,
        ServerOptions { debug: args.debug },
        shutdown.clone(),
    )
    .await?;

    let kubeconfig = handle.kubeconfig_path().to_path_buf();
    println!("export KUBECONFIG={}", kubeconfig.display());
    info!(addr = %handle.addr(), "serving bundle; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    shutdown.cancel();

    match tokio::time::timeout(
        Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS),
        handle.wait(),
    )
    .await
    {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error!(%err, "server exited with error"),
        Err(_) => error!("server did not drain within the grace period"),
    }

    // The kubeconfig is ours to clean up once the session ends.
    let _ = std::fs::remove_file(kubeconfig);
    Ok(())
}
