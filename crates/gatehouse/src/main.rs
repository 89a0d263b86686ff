use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{ArgGroup, Parser};
use gatehouse::prelude::*;
use tracing_subscriber::EnvFilter;

/// Login gateway for 1.29-era game clients.
#[derive(Debug, Parser)]
#[command(name = "gatehouse", version, about)]
#[command(group(ArgGroup::new("backend").required(true).args(["postgres", "fixtures"])))]
struct Cli {
    /// IPv4 address to listen on.
    #[arg(short, long, default_value = "0.0.0.0:5555")]
    address: String,

    /// PostgreSQL connection URL.
    #[arg(short, long, value_name = "URL")]
    postgres: Option<String>,

    /// JSON fixture file for the in-memory backend.
    #[arg(short, long, value_name = "PATH")]
    fixtures: Option<PathBuf>,

    /// Host list reload period in seconds. 0 disables reloading.
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    hosts_refresh: u64,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let shutdown = CloseHandle::new();
    tokio::spawn(close_on_signal(shutdown.clone()));

    if let Some(path) = &cli.fixtures {
        let repo = MemoryRepository::load(path)
            .with_context(|| format!("loading fixtures from {}", path.display()))?;
        return run(&cli, repo, shutdown).await;
    }

    let Some(url) = &cli.postgres else {
        bail!("one of --postgres or --fixtures is required");
    };
    connect_postgres(&cli, url, shutdown).await
}

#[cfg(feature = "postgres")]
async fn connect_postgres(cli: &Cli, url: &str, shutdown: CloseHandle) -> anyhow::Result<()> {
    let repo = PgRepository::connect(url)
        .await
        .context("connecting to postgres")?;
    run(cli, repo, shutdown).await
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(_: &Cli, _: &str, _: CloseHandle) -> anyhow::Result<()> {
    bail!("this build has no PostgreSQL support; use --fixtures")
}

async fn run<R: Repository>(cli: &Cli, repo: R, shutdown: CloseHandle) -> anyhow::Result<()> {
    let auth = RepositoryAuthenticator::new(repo.clone(), Argon2Verifier::new());
    let server = GatehouseServerBuilder::new()
        .bind(&cli.address)
        .hosts_refresh(Duration::from_secs(cli.hosts_refresh))
        .build(repo, auth)
        .await
        .with_context(|| format!("binding {}", cli.address))?;

    server.serve(shutdown).await?;
    Ok(())
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Closes `shutdown` on Ctrl-C, and on SIGTERM or SIGHUP where those
/// exist.
async fn close_on_signal(shutdown: CloseHandle) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (Ok(mut term), Ok(mut hup)) =
            (signal(SignalKind::terminate()), signal(SignalKind::hangup()))
        else {
            tracing::warn!("could not install unix signal handlers");
            let _ = tokio::signal::ctrl_c().await;
            shutdown.close();
            return;
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
            _ = hup.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("shutdown requested");
    shutdown.close();
}
