//! Driven port for module-owned transactional sessions.
//!
//! Each module owns exactly one persistence context. A [`UnitOfWork`] wraps
//! that context for the lifetime of a single request and exposes the
//! begin/save/commit/rollback protocol used by the transaction stage.
//! Implementations hold at most one open transaction: `begin` is a no-op while
//! one is open, and `commit`/`rollback` are no-ops when none is.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::Error;

/// Transactional session scoped to one request and one module.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Open a transaction unless one is already open.
    async fn begin(&self) -> Result<(), Error>;

    /// Flush tracked changes; returns the number of affected records.
    async fn save_changes(&self) -> Result<u64, Error>;

    /// Commit the open transaction, if any.
    async fn commit(&self) -> Result<(), Error>;

    /// Discard the open transaction, if any.
    async fn rollback(&self) -> Result<(), Error>;

    /// Whether a transaction is currently open.
    fn in_transaction(&self) -> bool;

    /// Upcast for typed access by handlers.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Creates a fresh [`UnitOfWork`] for each request.
pub trait UnitOfWorkFactory: Send + Sync {
    fn create(&self) -> Arc<dyn UnitOfWork>;
}

/// Marker for factories that declare which module paths they own.
///
/// Registries use this to build prefix entries without a hand-maintained
/// table.
pub trait ModuleOwnership {
    /// Human-readable module name used in diagnostics.
    const MODULE_NAME: &'static str;
    /// Module path prefixes (`::` separated) owned by the factory.
    const PREFIXES: &'static [&'static str];
}

define_port_error! {
    /// Configuration failures raised while locating a unit of work.
    pub enum UnitOfWorkError {
        /// No registered prefix matches the module path.
        UnregisteredModule { module: String, available: String } =>
            "no unit of work registered for module '{module}'; registered modules: {available}",
        /// The prefix is empty or has a leading or trailing `::`.
        InvalidPrefix { prefix: String } =>
            "module prefix '{prefix}' must be non-empty without a leading or trailing '::'",
        /// The same prefix was registered twice.
        DuplicatePrefix { prefix: String } =>
            "module prefix '{prefix}' is registered more than once",
        /// The resolved unit of work is not of the requested concrete type.
        ContextMismatch { module: String, expected: String } =>
            "unit of work for module '{module}' is not a {expected}",
    }
}
