//! Tubely -- video hosting API server.
//!
//! SIGTERM/SIGINT handlers stop accepting connections and let in-flight
//! requests finish, bounded by `server.shutdown_timeout`.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tubely::config::{Config, LoggingConfig};
use tubely::media::{FfprobeProber, MediaProber};
use tubely::metadata::MetadataStore;
use tubely::storage::ObjectStore;

/// Command-line arguments for the Tubely server.
#[derive(Parser, Debug)]
#[command(name = "tubely", version, about = "Video hosting API server")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "tubely.example.yaml")]
    config: String,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

/// Initialize tracing. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = tubely::config::load_config(&cli.config)?;
    init_tracing(&config.logging);
    info!("Loaded configuration from {}", cli.config);

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    if config.observability.metrics {
        tubely::metrics::init_metrics()?;
        tubely::metrics::describe_metrics();
        info!("Prometheus metrics initialized");
    }

    let metadata = build_metadata(&config)?;
    let objects = build_objects(&config).await?;
    let thumbnails = tubely::storage::thumbnail::from_config(
        &config.thumbnails,
        config.uploads.max_thumbnail_bytes,
        objects.clone(),
    )?;
    let prober: Arc<dyn MediaProber> = Arc::new(FfprobeProber::new(
        &config.media.ffprobe_path,
        Duration::from_secs(config.media.probe_timeout_secs),
    ));

    let staging_dir = config.uploads.staging_dir();
    std::fs::create_dir_all(&staging_dir)?;
    info!("Staging uploads in {}", staging_dir.display());

    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout);
    let state = Arc::new(tubely::AppState {
        config,
        metadata,
        objects,
        thumbnails,
        prober,
    });

    let app = tubely::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Tubely listening on {}", bind_addr);

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();
    tokio::pin!(server);

    // Drain in-flight requests after a signal, but not forever.
    tokio::select! {
        result = &mut server => result?,
        _ = async {
            shutdown_signal().await;
            tokio::time::sleep(shutdown_timeout).await;
        } => warn!("Shutdown timeout elapsed with requests still in flight"),
    }

    info!("Tubely shut down");

    Ok(())
}

fn build_metadata(config: &Config) -> anyhow::Result<Arc<dyn MetadataStore>> {
    let store: Arc<dyn MetadataStore> = match config.metadata.engine.as_str() {
        "memory" => {
            info!("Memory metadata store initialized (nothing is persisted)");
            Arc::new(tubely::metadata::memory::MemoryMetadataStore::new())
        }
        _ => {
            let path = &config.metadata.sqlite.path;
            let store = tubely::metadata::sqlite::SqliteMetadataStore::new(path)?;
            info!("SQLite metadata store initialized at {}", path);
            Arc::new(store)
        }
    };
    Ok(store)
}

async fn build_objects(config: &Config) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config.storage.backend.as_str() {
        "memory" => {
            info!("Memory object store initialized (nothing is persisted)");
            Arc::new(tubely::storage::memory::MemoryObjectStore::new())
        }
        _ => {
            let store = tubely::storage::aws::S3ObjectStore::new(&config.storage.aws).await?;
            info!("Videos go to bucket {}", config.storage.bucket);
            Arc::new(store)
        }
    };
    Ok(store)
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
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
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
