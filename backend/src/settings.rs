//! Application settings loaded via OrthoConfig.
//!
//! Values come from `MODULITH_*` environment variables, CLI flags or a config
//! file, in OrthoConfig's usual precedence.

use std::net::{AddrParseError, SocketAddr};

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::outbound::persistence::PoolConfig;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
const DEVELOPMENT: &str = "development";

/// Process-wide configuration.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "MODULITH")]
pub struct AppSettings {
    /// Render diagnostic fields in problem payloads and mount the error
    /// showcase.
    #[ortho_config(default = false)]
    pub diagnostics: bool,
    /// Deployment environment name; `development` implies diagnostics.
    pub environment: Option<String>,
    /// Socket address the HTTP server binds to.
    pub bind_address: Option<String>,
    /// PostgreSQL URL; the in-memory users store is used when absent.
    pub database_url: Option<String>,
    /// Upper bound on pooled database connections.
    pub db_max_connections: Option<u32>,
}

impl AppSettings {
    /// Whether diagnostic mode is on, explicitly or via the environment name.
    pub fn diagnostics_enabled(&self) -> bool {
        self.diagnostics
            || self
                .environment
                .as_deref()
                .is_some_and(|env| env.trim().eq_ignore_ascii_case(DEVELOPMENT))
    }

    /// Parsed bind address, defaulting to `0.0.0.0:8080`.
    ///
    /// # Errors
    ///
    /// Returns the parse error for a malformed address.
    pub fn bind_addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.bind_address
            .as_deref()
            .unwrap_or(DEFAULT_BIND_ADDRESS)
            .parse()
    }

    /// Pool configuration when a database URL is set.
    pub fn pool_config(&self) -> Option<PoolConfig> {
        let url = self
            .database_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())?;
        let config = PoolConfig::new(url);
        Some(match self.db_max_connections {
            Some(max) => config.with_max_size(max),
            None => config,
        })
    }
}
