//! Echolia Gateway Server
//!
//! Binary entry point for the Echolia E2EE inference gateway. Wires the
//! key store, quota ledger, principal resolver, and LLM provider gateway
//! into an `InferenceOrchestrator`, then serves the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # Start with default settings
//! echolia-gateway-server
//!
//! # Start with custom config
//! echolia-gateway-server --config /path/to/config.toml
//!
//! # Start with environment overrides
//! ECHOLIA__SERVER__PORT=8080 echolia-gateway-server
//! ```

mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use echolia_api::{create_router, AppState};
use echolia_auth::{AuthConfig, EntitlementResolver, JwtPrincipalResolver, PrincipalResolver};
use echolia_crypto::KeyStore;
use echolia_db::Database;
use echolia_llm::ProviderGateway;
use echolia_orchestrator::InferenceOrchestrator;
use echolia_quota::{QuotaConfig, QuotaLedger};

use crate::config::ServerConfig;

/// Echolia Gateway - the privacy-first journal backend's E2EE inference gateway
#[derive(Parser, Debug)]
#[command(name = "echolia-gateway-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, env = "ECHOLIA_CONFIG")]
    config: Option<String>,

    /// Host to bind to
    #[arg(long, env = "ECHOLIA_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "ECHOLIA_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "ECHOLIA_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (json, pretty)
    #[arg(long, env = "ECHOLIA_LOG_FORMAT", default_value = "pretty")]
    log_format: String,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// JWT secret key used to verify bearer tokens
    #[arg(long, env = "ECHOLIA_JWT_SECRET")]
    jwt_secret: Option<String>,

    /// Run database migrations on startup
    #[arg(long, env = "ECHOLIA_MIGRATE_ON_STARTUP")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut server_config = ServerConfig::load(args.config.as_deref())?;

    if let Some(host) = args.host {
        server_config.server.host = host;
    }
    if let Some(port) = args.port {
        server_config.server.port = port;
    }
    if let Some(db_url) = args.database_url {
        server_config.database.postgres_url = db_url;
    }
    server_config.logging.level = args.log_level;
    server_config.logging.format = args.log_format;

    init_logging(&server_config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting echolia gateway server"
    );

    let db = init_database(&server_config.database, args.migrate).await?;

    let keystore = Arc::new(KeyStore::initialize(
        &server_config.crypto.identity_path,
        server_config.crypto.key_rotation_period(),
    )?);

    let quota = Arc::new(QuotaLedger::new(
        db.pg.clone(),
        QuotaConfig {
            free_daily_limit: server_config.quota.free_daily_limit,
            elevated_daily_limit: server_config.quota.elevated_daily_limit,
        },
    ));

    let auth_config = resolve_auth_config(args.jwt_secret)?;
    let jwt_resolver = Arc::new(JwtPrincipalResolver::new(&auth_config));
    let principal_resolver: Arc<dyn PrincipalResolver> = jwt_resolver.clone();
    let entitlement_resolver: Arc<dyn EntitlementResolver> = jwt_resolver;

    let provider_gateway = Arc::new(ProviderGateway::from_env()?);
    tracing::info!(provider = %provider_gateway.kind(), "LLM provider selected");

    let orchestrator = Arc::new(InferenceOrchestrator::new(
        keystore.clone(),
        quota.clone(),
        provider_gateway,
    ));

    let state = Arc::new(AppState::new(
        keystore,
        quota,
        principal_resolver,
        entitlement_resolver,
        orchestrator,
    ));

    let app = create_router(state);

    if server_config.metrics.enabled {
        start_metrics_server(&server_config.metrics).await?;
    }

    let addr = server_config.server.socket_addr();

    tracing::info!(
        host = %server_config.server.host,
        port = %server_config.server.port,
        "server listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(server_config.server.shutdown_timeout()))
        .await?;

    tracing::info!("server shutdown complete");

    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &config::LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            subscriber.with(fmt::layer().json().with_target(true)).init();
        }
        _ => {
            subscriber.with(fmt::layer().pretty().with_target(true)).init();
        }
    }

    Ok(())
}

/// Connect to Postgres, optionally run migrations, and confirm the pool is live.
async fn init_database(
    config: &echolia_db::DatabaseConfig,
    migrate: bool,
) -> anyhow::Result<Arc<Database>> {
    let db = Database::connect(config).await?;

    if migrate {
        db.migrate().await?;
    }

    let health = db.health_check().await?;
    if !health.postgres {
        anyhow::bail!("database health check failed");
    }

    tracing::info!("database connected and healthy");

    Ok(Arc::new(db))
}

/// Builds the JWT verification config, rejecting the development default
/// outside of explicit local use.
fn resolve_auth_config(cli_secret: Option<String>) -> anyhow::Result<AuthConfig> {
    if let Some(jwt_secret) = cli_secret {
        return Ok(AuthConfig {
            jwt_secret,
            issuer: "echolia".to_string(),
            audience: "echolia-gateway".to_string(),
        });
    }

    AuthConfig::from_env()
        .map_err(|_| anyhow::anyhow!("ECHOLIA_JWT_SECRET must be set"))
}

/// Start the Prometheus metrics endpoint
async fn start_metrics_server(config: &config::MetricsConfig) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    tracing::info!(port = config.port, "starting metrics server");

    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let handle = builder.with_http_listener(addr).install_recorder()?;

    tokio::spawn(async move {
        let _handle = handle;
        std::future::pending::<()>().await;
    });

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal(timeout: Duration) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating graceful shutdown");
        }
    }

    tracing::info!(timeout_secs = timeout.as_secs(), "waiting for in-flight requests to complete");

    tokio::time::sleep(timeout).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_an_explicit_port_override() {
        let args = Args::parse_from(["echolia-gateway-server", "--port", "8080"]);
        assert_eq!(args.port, Some(8080));
    }

    #[test]
    fn development_config_matches_the_documented_default_port() {
        let config = ServerConfig::development();
        assert_eq!(config.server.port, 8443);
        assert_eq!(config.logging.level, "debug");
    }
}
