//! cachicamo CLI: runs the demo HTTP service.

use cachicamo::blob::{BlobStore, Delayed, FsBlobStore};
use cachicamo::config::Config;
use cachicamo::counter::VisitorCounter;
use cachicamo::runner::BoundedRunner;
use cachicamo::server::{AppState, serve};
use cachicamo::telemetry::{TelemetryConfig, init_telemetry};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "cachicamo", about = "Deadline-bounded uploads and a visitor counter")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Address to listen on (overrides BIND_ADDR)
        #[arg(long)]
        bind: Option<SocketAddr>,
        /// Directory uploads are written to (overrides UPLOAD_DIR)
        #[arg(long)]
        upload_dir: Option<PathBuf>,
        /// Milliseconds an upload waits for its save (overrides UPLOAD_DEADLINE_MS)
        #[arg(long)]
        deadline_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            bind,
            upload_dir,
            deadline_ms,
        } => {
            let mut config = Config::from_env()?;
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if let Some(dir) = upload_dir {
                config.upload_dir = dir;
            }
            if let Some(ms) = deadline_ms {
                config.upload_deadline = Duration::from_millis(ms);
            }
            cmd_serve(config).await
        }
    }
}

async fn cmd_serve(config: Config) -> anyhow::Result<()> {
    let _guard = init_telemetry(TelemetryConfig::from_config(&config))?;

    let fs_store = FsBlobStore::new(config.upload_dir.clone());
    info!(
        upload_dir = %fs_store.dir().display(),
        deadline_ms = config.upload_deadline.as_millis() as u64,
        save_delay_ms = config.upload_save_delay.as_millis() as u64,
        "starting cachicamo"
    );

    let store: Arc<dyn BlobStore> = if config.upload_save_delay.is_zero() {
        Arc::new(fs_store)
    } else {
        Arc::new(Delayed::new(fs_store, config.upload_save_delay))
    };

    let runner = BoundedRunner::new(store, config.upload_deadline);
    let state = AppState::new(runner, VisitorCounter::global())
        .upload_body_limit(config.upload_body_limit);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    serve(listener, state, async {
        tokio::signal::ctrl_c().await.ok();
        info!("ctrl-c received, shutting down");
    })
    .await?;
    Ok(())
}
