//! orchestrad — the Orchestra daemon.
//!
//! Single binary that runs either tier of the control plane:
//!
//! - **worker** — runs tasks against the local Docker engine and serves
//!   the worker task API
//! - **manager** — accepts task events, places them on workers, and
//!   reconciles observed state
//!
//! # Usage
//!
//! ```text
//! orchestrad worker --host 0.0.0.0 --port 5556 --dbtype memory
//! orchestrad manager --port 5555 --workers 10.0.0.2:5556,10.0.0.3:5556
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use orchestra_runtime::DockerRuntime;
use orchestra_scheduler::Policy;
use orchestra_store::Storage;

#[derive(Parser)]
#[command(name = "orchestrad", about = "Orchestra container-task orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Which datastore backs the node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum DbType {
    Memory,
    Persistent,
}

#[derive(Subcommand)]
enum Command {
    /// Run a worker node. The worker runs tasks and answers the
    /// manager's requests about task state.
    Worker {
        /// Hostname or IP address to listen on.
        #[arg(long, short = 'H', default_value = "0.0.0.0")]
        host: String,

        /// Port on which to listen.
        #[arg(long, short = 'p', default_value_t = 5556)]
        port: u16,

        /// Name of the worker.
        #[arg(long, short = 'n')]
        name: Option<String>,

        /// Type of datastore to use for tasks.
        #[arg(long, short = 'd', value_enum, default_value_t = DbType::Memory)]
        dbtype: DbType,

        /// Data directory for the persistent datastore.
        #[arg(long, default_value = "/var/lib/orchestra")]
        data_dir: PathBuf,

        /// Runner loop interval in seconds.
        #[arg(long, default_value_t = 10)]
        run_interval: u64,

        /// Container inspection interval in seconds.
        #[arg(long, default_value_t = 15)]
        update_interval: u64,
    },

    /// Run the manager node. The manager accepts task events, schedules
    /// them onto workers, and reconciles task state.
    Manager {
        /// Hostname or IP address to listen on.
        #[arg(long, short = 'H', default_value = "0.0.0.0")]
        host: String,

        /// Port on which to listen.
        #[arg(long, short = 'p', default_value_t = 5555)]
        port: u16,

        /// Comma-separated worker addresses (host:port).
        #[arg(long, short = 'w', value_delimiter = ',', required = true)]
        workers: Vec<String>,

        /// Type of datastore to use for tasks and events.
        #[arg(long, short = 'd', value_enum, default_value_t = DbType::Memory)]
        dbtype: DbType,

        /// Data directory for the persistent datastore.
        #[arg(long, default_value = "/var/lib/orchestra")]
        data_dir: PathBuf,

        /// Dispatcher loop interval in seconds.
        #[arg(long, default_value_t = 10)]
        dispatch_interval: u64,

        /// Reconciliation loop interval in seconds.
        #[arg(long, default_value_t = 15)]
        reconcile_interval: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,orchestra=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Worker {
            host,
            port,
            name,
            dbtype,
            data_dir,
            run_interval,
            update_interval,
        } => {
            let name = name.unwrap_or_else(|| format!("worker-{}", Uuid::new_v4()));
            run_worker(
                host,
                port,
                name,
                dbtype,
                data_dir,
                Duration::from_secs(run_interval),
                Duration::from_secs(update_interval),
            )
            .await
        }
        Command::Manager {
            host,
            port,
            workers,
            dbtype,
            data_dir,
            dispatch_interval,
            reconcile_interval,
        } => {
            run_manager(
                host,
                port,
                workers,
                dbtype,
                data_dir,
                Duration::from_secs(dispatch_interval),
                Duration::from_secs(reconcile_interval),
            )
            .await
        }
    }
}

fn open_storage(dbtype: DbType, data_dir: &std::path::Path, file: &str) -> anyhow::Result<Storage> {
    match dbtype {
        DbType::Memory => Ok(Storage::open_in_memory()?),
        DbType::Persistent => {
            std::fs::create_dir_all(data_dir)?;
            let path = data_dir.join(file);
            info!(?path, "opening persistent store");
            Ok(Storage::open(&path)?)
        }
    }
}

async fn run_worker(
    host: String,
    port: u16,
    name: String,
    dbtype: DbType,
    data_dir: PathBuf,
    run_interval: Duration,
    update_interval: Duration,
) -> anyhow::Result<()> {
    info!(%name, %host, port, "worker starting");

    let storage = open_storage(dbtype, &data_dir, "worker.redb")?;
    let store = storage.store("tasks")?;
    let runtime = Arc::new(DockerRuntime::connect()?);
    let worker = Arc::new(orchestra_worker::Worker::new(name, store, runtime));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let runner = tokio::spawn(orchestra_worker::run_loop(
        worker.clone(),
        run_interval,
        shutdown_rx.clone(),
    ));
    let updater = tokio::spawn(orchestra_worker::update_loop(
        worker.clone(),
        update_interval,
        shutdown_rx,
    ));

    serve(orchestra_worker::router(worker), &host, port, shutdown_tx).await?;

    let _ = runner.await;
    let _ = updater.await;
    info!("worker stopped");
    Ok(())
}

async fn run_manager(
    host: String,
    port: u16,
    workers: Vec<String>,
    dbtype: DbType,
    data_dir: PathBuf,
    dispatch_interval: Duration,
    reconcile_interval: Duration,
) -> anyhow::Result<()> {
    info!(%host, port, workers = workers.len(), "manager starting");

    let storage = open_storage(dbtype, &data_dir, "manager.redb")?;
    let manager = Arc::new(orchestra_manager::Manager::new(
        workers,
        Policy::RoundRobin,
        &storage,
    )?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dispatcher = tokio::spawn(orchestra_manager::dispatch_loop(
        manager.clone(),
        dispatch_interval,
        shutdown_rx.clone(),
    ));
    let reconciler = tokio::spawn(orchestra_manager::reconcile_loop(
        manager.clone(),
        reconcile_interval,
        shutdown_rx,
    ));

    serve(orchestra_manager::router(manager), &host, port, shutdown_tx).await?;

    let _ = dispatcher.await;
    let _ = reconciler.await;
    info!("manager stopped");
    Ok(())
}

/// Serve a router until ctrl-c, then flip the shutdown signal so the
/// loops drain.
async fn serve(
    app: axum::Router,
    host: &str,
    port: u16,
    shutdown_tx: watch::Sender<bool>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    info!(addr = %listener.local_addr()?, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}
