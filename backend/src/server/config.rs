//! HTTP server configuration object and helpers.

use std::net::SocketAddr;
use std::sync::Arc;

use mockable::{Clock, DefaultClock};
use tokio_util::sync::CancellationToken;

use crate::outbound::persistence::DbPool;

/// Builder-style configuration for creating the HTTP server.
#[derive(Clone)]
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) diagnostics: bool,
    pub(crate) db_pool: Option<DbPool>,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) shutdown: CancellationToken,
}

impl ServerConfig {
    /// Construct a configuration with the in-memory users store and
    /// diagnostics disabled.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            diagnostics: false,
            db_pool: None,
            clock: Arc::new(DefaultClock),
            shutdown: CancellationToken::new(),
        }
    }

    /// Attach a database connection pool.
    ///
    /// When provided, users are persisted in PostgreSQL instead of memory.
    #[must_use]
    pub fn with_db_pool(mut self, pool: DbPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Toggle diagnostic problem fields and the error showcase.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: bool) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Replace the wall clock used for timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    /// Share `token` as the shutdown trigger.
    ///
    /// Cancelling it stops the server and cancels every in-flight request;
    /// a termination signal cancels it too.
    #[must_use]
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    #[must_use]
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Return the socket address the server will bind to.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    #[must_use]
    pub fn diagnostics(&self) -> bool {
        self.diagnostics
    }
}
