//! Unit-of-work resolution for module-owned persistence contexts.
//!
//! The [`UnitOfWorkResolver`] maps a request's owning module path to the unit
//! of work registered for it. A [`UnitOfWorkScope`] lives for one request and
//! caches the resolved instance per owning factory, so nested dispatches in
//! the same request share a transaction (even across prefixes declared by one
//! owner) while separate requests never share instances.

mod registry;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

pub use crate::domain::ports::{ModuleOwnership, UnitOfWork, UnitOfWorkError, UnitOfWorkFactory};
pub use registry::{ModuleRegistry, ModuleRegistryBuilder, SEGMENT_SEPARATOR};

/// Per-request cache of resolved units of work, keyed by owning factory.
#[derive(Default)]
pub struct UnitOfWorkScope {
    units: Mutex<HashMap<usize, Arc<dyn UnitOfWork>>>,
}

impl UnitOfWorkScope {
    /// Empty scope for a new request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct units of work created in this scope.
    pub async fn len(&self) -> usize {
        self.units.lock().await.len()
    }

    /// Whether no unit of work has been created yet.
    pub async fn is_empty(&self) -> bool {
        self.units.lock().await.is_empty()
    }
}

/// Resolves the unit of work owning a module path.
///
/// # Examples
/// ```ignore
/// let resolver = UnitOfWorkResolver::new(registry);
/// let scope = UnitOfWorkScope::new();
/// let uow = resolver.resolve("modulith::modules::users::commands", &scope).await?;
/// uow.begin().await?;
/// ```
#[derive(Debug, Clone)]
pub struct UnitOfWorkResolver {
    registry: ModuleRegistry,
}

impl UnitOfWorkResolver {
    pub fn new(registry: ModuleRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Return the scope's unit of work for `module`, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`UnitOfWorkError::UnregisteredModule`] when no prefix owns
    /// `module`.
    pub async fn resolve(
        &self,
        module: &str,
        scope: &UnitOfWorkScope,
    ) -> Result<Arc<dyn UnitOfWork>, UnitOfWorkError> {
        let entry = self.registry.lookup(module)?;
        let mut units = scope.units.lock().await;
        if let Some(existing) = units.get(&entry.owner) {
            return Ok(Arc::clone(existing));
        }
        debug!(
            module,
            prefix = %entry.prefix,
            owner = %entry.module_name,
            "creating unit of work"
        );
        let created = entry.factory.create();
        units.insert(entry.owner, Arc::clone(&created));
        Ok(created)
    }

    /// Resolve and downcast to a concrete unit-of-work type.
    ///
    /// # Errors
    ///
    /// Returns [`UnitOfWorkError::ContextMismatch`] when the registered unit of
    /// work is not a `T`.
    pub async fn resolve_as<T>(
        &self,
        module: &str,
        scope: &UnitOfWorkScope,
    ) -> Result<Arc<T>, UnitOfWorkError>
    where
        T: Send + Sync + 'static,
    {
        let unit = self.resolve(module, scope).await?;
        unit.into_any().downcast::<T>().map_err(|_| {
            UnitOfWorkError::context_mismatch(module, std::any::type_name::<T>())
        })
    }
}
