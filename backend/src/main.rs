//! Backend entry-point: loads settings, wires modules and serves HTTP.

use std::io;

use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use modulith::outbound::persistence::DbPool;
use modulith::server::{ServerConfig, create_server};
use modulith::settings::AppSettings;

/// Application bootstrap.
#[actix_web::main]
async fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = AppSettings::load_from_iter(std::env::args_os())
        .map_err(|e| io::Error::other(e.to_string()))?;
    let bind_addr = settings
        .bind_addr()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let mut config =
        ServerConfig::new(bind_addr).with_diagnostics(settings.diagnostics_enabled());
    if let Some(pool_config) = settings.pool_config() {
        let pool = DbPool::new(pool_config).await.map_err(io::Error::other)?;
        info!("database pool ready");
        config = config.with_db_pool(pool);
    }

    create_server(config)?.await
}
