//! Shoreline - a local S3-compatible server for backup software.
//!
//! # Usage
//!
//! ```text
//! shoreline serve --path /tmp/s3store --listen :10001
//! shoreline serve --backend drime --workspace-id 7
//! shoreline cache stats
//! shoreline cache migrate --workspace-id 7 --bucket backups --dry-run
//! ```
//!
//! The `serve` command starts the gateway against the chosen backend; the
//! `cache` subcommands administer the MD5 cache the Drime backend depends
//! on. Credentials for the Drime API come from `--api-key` or the
//! `DRIME_API_KEY` environment variable.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use shoreline_auth::StaticCredentials;
use shoreline_http::{Gateway, S3HttpConfig, S3HttpService};
use shoreline_store::{
    DrimeClient, DrimeProvider, LocalProvider, Md5Cache, StorageProvider,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Default listen port.
const DEFAULT_PORT: u16 = 10001;

/// Default credential pair for local development setups.
const DEFAULT_ACCESS_KEY: &str = "shoreline";
const DEFAULT_SECRET_KEY: &str = "shoreline-secret";

#[derive(Debug, Parser)]
#[command(name = "shoreline", version, about = "Local S3 server for backup software")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the S3-compatible server.
    Serve(ServeArgs),
    /// Administer the MD5 cache used by the Drime backend.
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

#[derive(Debug, Args)]
struct ServeArgs {
    /// Data directory for the local backend.
    #[arg(long, default_value_os_t = default_data_dir())]
    path: PathBuf,

    /// Listen address (`:10001`, `127.0.0.1:9000`, ...).
    #[arg(long, default_value = ":10001")]
    listen: String,

    /// Access key id clients must present.
    #[arg(long, default_value = DEFAULT_ACCESS_KEY)]
    access_key_id: String,

    /// Secret access key clients must sign with.
    #[arg(long, default_value = DEFAULT_SECRET_KEY)]
    secret_access_key: String,

    /// Region reported in credential scopes.
    #[arg(long, default_value = "us-east-1")]
    region: String,

    /// Disable authentication entirely.
    #[arg(long)]
    no_auth: bool,

    /// Refuse all write operations.
    #[arg(long)]
    readonly: bool,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,

    /// Storage backend.
    #[arg(long, value_parser = ["local", "drime"], default_value = "local")]
    backend: String,

    /// Base domain for virtual-host-style bucket addressing.
    #[arg(long, default_value = "s3.localhost")]
    domain: String,

    #[command(flatten)]
    drime: DrimeArgs,
}

#[derive(Debug, Args)]
struct DrimeArgs {
    /// Drime API key (falls back to `DRIME_API_KEY`).
    #[arg(long, env = "DRIME_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Drime workspace id (0 = personal workspace).
    #[arg(long, env = "DRIME_WORKSPACE_ID", default_value_t = 0)]
    workspace_id: i64,

    /// Override the Drime API base URL.
    #[arg(long)]
    api_url: Option<String>,

    /// MD5 cache file path.
    #[arg(long, default_value_os_t = default_cache_path())]
    cache_path: PathBuf,
}

#[derive(Debug, Subcommand)]
enum CacheCommand {
    /// Show aggregate cache statistics.
    Stats {
        /// Restrict to one workspace.
        #[arg(long)]
        workspace_id: Option<i64>,
        /// MD5 cache file path.
        #[arg(long, default_value_os_t = default_cache_path())]
        cache_path: PathBuf,
    },
    /// Delete cache entries for a bucket, or a whole workspace.
    Cleanup {
        /// Workspace to clean.
        #[arg(long)]
        workspace_id: i64,
        /// Restrict to one bucket; omit with `--all` to clean everything.
        #[arg(long, conflicts_with = "all")]
        bucket: Option<String>,
        /// Clean every bucket of the workspace.
        #[arg(long)]
        all: bool,
        /// MD5 cache file path.
        #[arg(long, default_value_os_t = default_cache_path())]
        cache_path: PathBuf,
    },
    /// Reclaim free pages in the cache file.
    Vacuum {
        /// MD5 cache file path.
        #[arg(long, default_value_os_t = default_cache_path())]
        cache_path: PathBuf,
    },
    /// Walk the remote backend and fill in missing cache entries.
    Migrate {
        /// Restrict to one bucket.
        #[arg(long)]
        bucket: Option<String>,
        /// Enumerate without writing.
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        drime: DrimeArgs,
    },
}

fn default_data_dir() -> PathBuf {
    std::env::temp_dir().join("s3store")
}

fn default_cache_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("shoreline")
        .join("md5-cache.db")
}

/// Initialize tracing. `RUST_LOG` wins when set.
fn init_tracing(debug: bool) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(if debug { "debug" } else { "info" })
            .context("invalid log filter")?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
    Ok(())
}

/// Parse `:port`, `host:port`, or bare `host` into a socket address.
fn parse_listen(listen: &str) -> Result<SocketAddr> {
    let full = if let Some(port) = listen.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else if listen.contains(':') {
        listen.to_owned()
    } else {
        format!("{listen}:{DEFAULT_PORT}")
    };
    full.parse()
        .with_context(|| format!("invalid listen address: {listen}"))
}

/// Build a Drime client + cache pair from the shared arguments.
async fn drime_backend(args: &DrimeArgs) -> Result<(DrimeClient, Md5Cache)> {
    let api_key = args
        .api_key
        .clone()
        .context("Drime backend requires --api-key or DRIME_API_KEY")?;
    let client = DrimeClient::new(api_key, args.workspace_id, args.api_url.clone())
        .context("failed to build Drime client")?;
    let cache = Md5Cache::open(&args.cache_path)
        .await
        .with_context(|| format!("cannot open MD5 cache at {}", args.cache_path.display()))?;
    Ok((client, cache))
}

async fn build_provider(args: &ServeArgs) -> Result<Arc<dyn StorageProvider>> {
    match args.backend.as_str() {
        "local" => {
            info!(path = %args.path.display(), "using local backend");
            let provider = LocalProvider::new(&args.path, args.readonly)
                .await
                .with_context(|| format!("cannot initialize data dir {}", args.path.display()))?;
            Ok(Arc::new(provider))
        }
        "drime" => {
            let (client, cache) = drime_backend(&args.drime).await?;
            info!(
                workspace_id = args.drime.workspace_id,
                cache = %args.drime.cache_path.display(),
                "using Drime Cloud backend"
            );
            Ok(Arc::new(DrimeProvider::new(client, cache, args.readonly)))
        }
        other => bail!("unknown backend: {other}"),
    }
}

/// Accept connections until ctrl-c, then drain in-flight requests.
async fn serve(listener: TcpListener, service: S3HttpService<Gateway>) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => break,
        }
    }

    graceful.shutdown().await;
    info!("all connections drained, exiting");
    Ok(())
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let provider = build_provider(&args).await?;
    let gateway = Gateway::new(provider);

    let config = S3HttpConfig {
        domain: args.domain.clone(),
        virtual_hosting: true,
        no_auth: args.no_auth,
        credentials: StaticCredentials::new(&args.access_key_id, &args.secret_access_key),
    };

    if args.no_auth {
        warn!("authentication disabled; all requests are accepted");
    } else {
        info!(access_key_id = %args.access_key_id, region = %args.region, "authentication enabled");
    }

    let addr = parse_listen(&args.listen)?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening for S3 requests");

    serve(listener, S3HttpService::new(gateway, &config)).await
}

fn format_timestamp(millis: Option<i64>) -> String {
    millis
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map_or_else(|| "-".to_owned(), |dt| dt.to_rfc3339())
}

async fn run_cache(command: CacheCommand) -> Result<()> {
    match command {
        CacheCommand::Stats { workspace_id, cache_path } => {
            let cache = Md5Cache::open(&cache_path).await?;
            let stats = cache.stats(workspace_id).await?;
            println!("entries:     {}", stats.entry_count);
            println!("total size:  {} bytes", stats.total_size);
            println!("oldest:      {}", format_timestamp(stats.oldest));
            println!("newest:      {}", format_timestamp(stats.newest));
        }
        CacheCommand::Cleanup { workspace_id, bucket, all, cache_path } => {
            if bucket.is_none() && !all {
                bail!("specify --bucket <name> or --all");
            }
            let cache = Md5Cache::open(&cache_path).await?;
            let removed = cache.purge(workspace_id, bucket.as_deref()).await?;
            println!("removed {removed} entries");
        }
        CacheCommand::Vacuum { cache_path } => {
            let cache = Md5Cache::open(&cache_path).await?;
            let (before, after) = cache.vacuum().await?;
            println!("vacuum complete: {before} -> {after} bytes");
        }
        CacheCommand::Migrate { bucket, dry_run, drime } => {
            let (client, cache) = drime_backend(&drime).await?;
            let provider = DrimeProvider::new(client, cache, true);
            let report = provider.migrate_cache(bucket.as_deref(), dry_run).await?;
            println!("scanned:  {}", report.scanned);
            println!("missing:  {}", report.missing);
            if dry_run {
                println!("dry run: no entries written");
            } else {
                println!("written:  {}", report.written);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => {
            init_tracing(args.debug)?;
            run_serve(args).await
        }
        Command::Cache { command } => {
            init_tracing(false)?;
            run_cache(command).await
        }
    }
}
