//! Builders wiring modules, stores and the problem factory into HTTP state.

use std::sync::Arc;

use mockable::Clock;
use tracing::info;

use crate::domain::{
    Dispatcher, ModuleRegistry, ProblemFactory, UnitOfWorkError, UnitOfWorkResolver,
};
use crate::inbound::http::HttpState;
use crate::modules::{diagnostics, users};
use crate::outbound::persistence::{DieselUsersStore, InMemoryUsersStore};

use super::ServerConfig;

/// Build HTTP state for `config`.
///
/// Uses the diesel users store when a pool is configured, otherwise keeps
/// users in memory. Request cancellation hangs off the configured shutdown
/// token.
///
/// # Errors
///
/// Returns [`UnitOfWorkError::DuplicatePrefix`] when module registrations
/// collide.
pub fn build_http_state(config: &ServerConfig) -> Result<HttpState, UnitOfWorkError> {
    let store: Arc<dyn users::UsersStore> = match &config.db_pool {
        Some(pool) => Arc::new(DieselUsersStore::new(pool.clone())),
        None => {
            info!("no database configured; users are kept in memory");
            Arc::new(InMemoryUsersStore::new())
        }
    };
    let state =
        build_http_state_with_store(store, config.diagnostics, Arc::clone(&config.clock))?;
    Ok(state.with_shutdown(config.shutdown.clone()))
}

/// Build HTTP state over an explicit users store.
///
/// # Errors
///
/// Returns [`UnitOfWorkError::DuplicatePrefix`] when module registrations
/// collide.
pub fn build_http_state_with_store(
    store: Arc<dyn users::UsersStore>,
    diagnostics: bool,
    clock: Arc<dyn Clock + Send + Sync>,
) -> Result<HttpState, UnitOfWorkError> {
    let registry = ModuleRegistry::builder()
        .register_owner(users::UsersUnitOfWorkFactory::new(store))
        .build()?;
    for (module, prefix) in registry.modules() {
        info!(prefix, module, "unit of work registered");
    }
    let dispatcher = diagnostics::register(users::register(
        Dispatcher::builder(),
        Arc::clone(&clock),
    ))
    .build();
    Ok(HttpState::new(
        Arc::new(dispatcher),
        Arc::new(UnitOfWorkResolver::new(registry)),
        ProblemFactory::new(diagnostics, clock),
    ))
}
