use clap::Parser;
use snapwatch::index::SqliteSearchIndex;
use snapwatch::k8s::USER_AGENT;
use snapwatch::k8s::informer::{ApiSource, Informer, Subscribers, WatchExit, WatcherConfig};
use snapwatch::k8s::snapshot::Snapshot;
use snapwatch::recycle_bin::FileRecycleBin;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Seconds between full re-lists of all Snapshots; 0 disables resync
    #[arg(long, default_value_t = snapwatch::k8s::informer::config::DEFAULT_RESYNC_PERIOD_SECS)]
    resync_period_secs: u64,

    /// Do not maintain the search index
    #[arg(long)]
    disable_search_index: bool,

    /// Location of the search index database
    #[arg(long, default_value = "snapwatch-index.db")]
    index_db: String,

    /// Directory of the recycle bin; no recycle bin when omitted
    #[arg(long)]
    recycle_bin_dir: Option<PathBuf>,

    /// Also record significant Snapshot updates in the recycle bin
    #[arg(long)]
    recycle_bin_handle_updates: bool,

    /// Only send updates with label, annotation or spec changes to the index
    #[arg(long)]
    index_changes_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let args = Args::parse();
    let config = WatcherConfig::default()
        .with_resync_period(Duration::from_secs(args.resync_period_secs))
        .with_search_index(!args.disable_search_index)
        .with_recycle_bin_updates(args.recycle_bin_handle_updates)
        .with_index_changes_only(args.index_changes_only);

    let mut subscribers = Subscribers::<Snapshot>::new();
    if config.enable_search_index {
        let index = SqliteSearchIndex::open(&args.index_db).await?;
        subscribers = subscribers.with_search_index(Arc::new(index));
    }
    if let Some(dir) = args.recycle_bin_dir {
        info!("recycle bin at {}", dir.display());
        subscribers = subscribers.with_recycle_bin(Arc::new(FileRecycleBin::new(dir)));
    }

    let client = snapwatch::k8s::client::new(Some(USER_AGENT)).await?;
    let source = Arc::new(ApiSource::<Snapshot>::new(client));
    let informer = Informer::new(source, subscribers, config);
    let (shutdown_tx, mut handle) = informer.start();

    let exit = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            None
        }
        exit = handle.join() => Some(exit),
    };
    let exit = match exit {
        Some(exit) => exit,
        None => {
            info!("received interrupt, shutting down");
            let _ = shutdown_tx.send(()).await;
            handle.join().await
        }
    };

    match exit {
        Some(WatchExit::Unsupported) => warn!("Snapshot kind not served by this cluster, nothing to watch"),
        Some(WatchExit::Shutdown) => {
            info!("stopped after dispatching {} events", handle.stats().events_dispatched);
        }
        None => warn!("informer task ended abnormally"),
    }
    Ok(())
}
