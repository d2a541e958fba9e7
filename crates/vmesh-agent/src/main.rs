//! vmesh-agent — host-side command agent.
//!
//! Loads configuration, connects to the coordination store, registers
//! this host, and watches its command queue until ctrl-c.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use vmesh_agent::error::AgentError;
use vmesh_agent::interpreter::LogOnly;
use vmesh_agent::watcher::CommandWatcher;
use vmesh_config::StoreBackend;
use vmesh_core::{HostManager, PathBuilder, TopologyManager};
use vmesh_store::MemoryStore;

/// vmesh-agent -- watch this host's command queue and execute queued work
#[derive(Debug, Parser)]
#[command(
    name = "vmesh-agent",
    version,
    about = "Host-side agent for the vmesh network-virtualization control plane"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, short = 'c', env = "VMESH_CONFIG")]
    config: Option<PathBuf>,

    /// Host identity (overrides configuration)
    #[arg(long, env = "VMESH_HOST_ID")]
    host_id: Option<Uuid>,

    /// Tracing filter (overrides configuration), e.g. `vmesh_agent=debug`
    #[arg(long)]
    log: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("vmesh-agent: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AgentError> {
    let config = vmesh_config::load(cli.config.as_deref())?;

    let filter = cli.log.unwrap_or_else(|| config.log.filter.clone());
    init_tracing(&filter);

    let host_id = cli.host_id.or(config.agent.host_id).unwrap_or_else(|| {
        let generated = Uuid::new_v4();
        warn!(host = %generated, "no host id configured; generated an ephemeral one");
        generated
    });

    let paths = PathBuilder::new(config.store.root.clone());
    let store = match config.store.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };
    info!(
        backend = ?config.store.backend,
        root = %paths.root(),
        host = %host_id,
        "starting vmesh agent"
    );

    let topology = TopologyManager::new(Arc::clone(&store), paths.clone());
    topology.ensure_base_layout().await?;

    let hosts = HostManager::new(store, paths);
    hosts.register_host(host_id).await?;

    let watcher = CommandWatcher::new(hosts, LogOnly, host_id)
        .with_rescan_delay(Duration::from_secs(config.agent.rescan_delay_secs));

    let cancel = CancellationToken::new();
    let worker = tokio::spawn(watcher.run(cancel.clone()));

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("ctrl-c received; shutting down"),
        Err(e) => error!(error = %e, "could not listen for shutdown signal"),
    }
    cancel.cancel();

    match worker.await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "watcher task aborted");
            Ok(())
        }
    }
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
