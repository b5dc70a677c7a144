//! # Trackline Server
//!
//! Entry point: loads layered configuration, connects to PostgreSQL, wires
//! the tracking engine to its collaborators and serves HTTP + WebSocket.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trackline_core::{
    ConnectionAuthenticator, DistanceEstimator, DistanceMatrixClient,
    IdentityStore, PackageStore, TokenVerifier,
};
use trackline_server::{
    AppState, create_app,
    infra::{
        config::{Config, ConfigLoad, ConfigLoader, ConfigLoaderOptions},
        postgres::{self, PostgresIdentityStore, PostgresPackageStore},
        startup::{ProdStartupHooks, StartupHooks},
    },
};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "trackline-server")]
#[command(about = "Live package tracking over authenticated WebSockets")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ServeArgs {
    /// Path to trackline.toml
    #[arg(short, long, env = "TRACKLINE_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a .env file (defaults to ./.env when present)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Server port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign an access token for a user id with the configured secret and exit
    IssueToken {
        /// Value of `users.user_id`
        user_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_runtime_config(&cli.serve)?;

    match cli.command {
        Some(Command::IssueToken { user_id }) => {
            let token = build_verifier(&config)
                .issue(&user_id)
                .context("failed to sign access token")?;
            println!("{token}");
            Ok(())
        }
        None => run_server(config, &ProdStartupHooks).await,
    }
}

fn load_runtime_config(args: &ServeArgs) -> anyhow::Result<Arc<Config>> {
    let ConfigLoad {
        mut config,
        warnings,
    } = ConfigLoader::with_options(ConfigLoaderOptions {
        config_path: args.config.clone(),
        env_file: args.env_file.clone(),
    })
    .load()
    .context("failed to load configuration")?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host.clone() {
        config.server.host = host;
    }

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }

    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => warn!(
                message = %warning.message,
                hint = %hint,
                "configuration warning"
            ),
            None => {
                warn!(message = %warning.message, "configuration warning")
            }
        }
    }

    let tracking = &config.tracking;
    info!(
        tracking.distance_threshold_m = tracking.distance_threshold_meters,
        tracking.cache_ttl = ?tracking.cache_ttl,
        tracking.sweep_interval = ?tracking.sweep_interval,
        tracking.estimator_timeout = ?tracking.estimator_timeout,
        tracking.persistence_timeout = ?tracking.persistence_timeout,
        tracking.outbound_buffer = tracking.outbound_buffer,
        "tracking configuration in effect"
    );

    Ok(Arc::new(config))
}

fn build_verifier(config: &Config) -> TokenVerifier {
    TokenVerifier::new(&config.auth.jwt_secret, config.auth.token_ttl)
        .with_previous_secrets(&config.auth.previous_secrets)
}

async fn wire_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let database_url = config
        .database
        .url
        .clone()
        .context("DATABASE_URL (or database.url) must be provided")?;

    if !(database_url.starts_with("postgres://")
        || database_url.starts_with("postgresql://"))
    {
        anyhow::bail!(
            "Invalid database URL: must start with postgres:// or postgresql://"
        );
    }

    let pool = postgres::connect(&database_url)
        .await
        .context("failed to connect to PostgreSQL")?;
    info!("Successfully connected to PostgreSQL");

    let identities: Arc<dyn IdentityStore> =
        Arc::new(PostgresIdentityStore::new(pool.clone()));
    let packages: Arc<dyn PackageStore> =
        Arc::new(PostgresPackageStore::new(pool));

    let estimator: Arc<dyn DistanceEstimator> = Arc::new(
        DistanceMatrixClient::new(
            config.geolocation.api_url.clone(),
            config.geolocation.api_key.clone(),
            config.tracking.estimator_timeout,
        )
        .context("failed to build distance matrix client")?,
    );

    let authenticator =
        ConnectionAuthenticator::new(build_verifier(&config), identities);

    Ok(AppState::new(config, authenticator, estimator, packages))
}

async fn run_server<H>(config: Arc<Config>, hooks: &H) -> anyhow::Result<()>
where
    H: StartupHooks,
{
    let state = wire_app_state(Arc::clone(&config)).await?;
    hooks.run(&state).await?;

    let listen = format!("{}:{}", config.server.host, config.server.port);
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("invalid listen address {listen}"))?;

    let router = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Starting Trackline server on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
