use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use portico::crypto::PortalKeyring;
use portico::http::{router, AppState};
use portico::store::SqliteRecordStore;
use tracing::info;

use super::config::{default_config_path, read_master_secret, PorticoConfig};

/// Run the portal service
///
/// Starts the HTTP server with the specified configuration. The service
/// opens (creating if missing) the SQLite database, derives the token
/// signing key from the master secret, and serves the portal endpoints
/// until interrupted.
///
/// ## Configuration Loading
///
/// Configuration is loaded from one of these sources (in order of precedence):
/// 1. `--config` flag if provided
/// 2. Default config at `~/.local/share/portico/config.toml`
///
/// If the config file doesn't exist, a default one is generated.
///
/// ## Master Secret Loading
///
/// The master secret is loaded from one of these sources (in order):
/// 1. `--secret-file` flag if provided
/// 2. `PORTICO_MASTER_SECRET` environment variable
/// 3. Secret file adjacent to the config (`master-secret.txt`)
///
/// There is no interactive fallback; a service with no secret refuses to
/// start rather than mint unverifiable tokens.
pub async fn execute(
    config_path: Option<String>,
    bind: Option<String>,
    secret_file: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    // Load or create configuration
    let config = if config_path.exists() {
        PorticoConfig::load(&config_path)?
    } else {
        let database_path = super::config::default_database_path();
        PorticoConfig::create_default(&config_path, &database_path)?;
        eprintln!("Created default configuration: {}", config_path.display());
        PorticoConfig::load(&config_path)?
    };

    init_logging(&config.logging.level);

    // Derive the token signing key before touching the network
    let secret = read_master_secret(secret_file.as_deref())?;
    let keyring = PortalKeyring::from_master_secret(&secret)?;
    drop(secret);

    // Open the record store (explicit handle, injected below)
    if let Some(parent) = config.storage.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = SqliteRecordStore::open(&config.storage.database_path).await?;

    let state = AppState::new(
        Arc::new(store.clone()),
        Arc::new(store),
        &keyring,
        &config.server.public_base_url,
        Duration::from_secs(config.approval.io_timeout_secs),
    );

    let bind_addr = bind.unwrap_or(config.server.bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!(
        addr = %bind_addr,
        base_url = %config.server.public_base_url,
        database = %config.storage.database_path.display(),
        "portico listening"
    );

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Initialize tracing. `RUST_LOG` wins over the configured level.
fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    // try_init: keep re-invocation (tests) from panicking
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
