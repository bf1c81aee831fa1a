//! Static table mapping module path prefixes to unit-of-work factories.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::domain::ports::{ModuleOwnership, UnitOfWorkError, UnitOfWorkFactory};

/// Separator between module path segments.
pub const SEGMENT_SEPARATOR: &str = "::";

#[derive(Clone)]
pub(super) struct Registration {
    pub(super) prefix: String,
    /// Identifies the factory; prefixes declared by one owner share it.
    pub(super) owner: usize,
    pub(super) module_name: String,
    pub(super) factory: Arc<dyn UnitOfWorkFactory>,
}

impl Registration {
    fn owns(&self, module: &str) -> bool {
        match module.strip_prefix(self.prefix.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with(SEGMENT_SEPARATOR),
            None => false,
        }
    }
}

/// A prefix must name at least one segment and never begin or end with `::`,
/// otherwise no module path could match it on a segment boundary.
fn is_well_formed(prefix: &str) -> bool {
    !prefix.is_empty()
        && !prefix.starts_with(SEGMENT_SEPARATOR)
        && !prefix.ends_with(SEGMENT_SEPARATOR)
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("prefix", &self.prefix)
            .field("owner", &self.owner)
            .field("module_name", &self.module_name)
            .finish_non_exhaustive()
    }
}

/// Immutable prefix table built once at startup.
///
/// Lookups pick the longest registered prefix that matches the module path
/// on a `::` segment boundary, so `app::users` owns `app::users::commands`
/// but not `app::users_admin`. Matching is case-sensitive.
///
/// # Examples
/// ```
/// use std::any::Any;
/// use std::sync::Arc;
///
/// use async_trait::async_trait;
/// use modulith::domain::{Error, ModuleRegistry, UnitOfWork, UnitOfWorkFactory};
///
/// struct Noop;
///
/// #[async_trait]
/// impl UnitOfWork for Noop {
///     async fn begin(&self) -> Result<(), Error> { Ok(()) }
///     async fn save_changes(&self) -> Result<u64, Error> { Ok(0) }
///     async fn commit(&self) -> Result<(), Error> { Ok(()) }
///     async fn rollback(&self) -> Result<(), Error> { Ok(()) }
///     fn in_transaction(&self) -> bool { false }
///     fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> { self }
/// }
///
/// struct NoopFactory;
///
/// impl UnitOfWorkFactory for NoopFactory {
///     fn create(&self) -> Arc<dyn UnitOfWork> { Arc::new(Noop) }
/// }
///
/// let registry = ModuleRegistry::builder()
///     .register("app::billing", "billing", NoopFactory)
///     .build()
///     .expect("registry builds");
/// assert_eq!(registry.matching_prefix("app::billing::invoices"), Some("app::billing"));
/// assert_eq!(registry.matching_prefix("app::billing_v2"), None);
/// ```
#[derive(Debug, Clone)]
pub struct ModuleRegistry {
    entries: Vec<Registration>,
}

impl ModuleRegistry {
    /// Start building a registry.
    pub fn builder() -> ModuleRegistryBuilder {
        ModuleRegistryBuilder::default()
    }

    pub(super) fn lookup(&self, module: &str) -> Result<&Registration, UnitOfWorkError> {
        // Entries are sorted longest prefix first.
        self.entries
            .iter()
            .find(|entry| entry.owns(module))
            .ok_or_else(|| UnitOfWorkError::unregistered_module(module, self.available()))
    }

    /// Prefix that would serve `module`, if any.
    pub fn matching_prefix(&self, module: &str) -> Option<&str> {
        self.lookup(module).ok().map(|entry| entry.prefix.as_str())
    }

    /// Registered module names with their prefixes.
    pub fn modules(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|entry| (entry.module_name.as_str(), entry.prefix.as_str()))
    }

    fn available(&self) -> String {
        if self.entries.is_empty() {
            return "<none>".to_owned();
        }
        let mut names: Vec<String> = self
            .entries
            .iter()
            .map(|entry| format!("{} ({})", entry.module_name, entry.prefix))
            .collect();
        names.sort();
        names.join(", ")
    }
}

/// Collects registrations before the registry is frozen.
#[derive(Default)]
#[must_use]
pub struct ModuleRegistryBuilder {
    entries: Vec<Registration>,
    fallback: Vec<Registration>,
    next_owner: usize,
}

impl ModuleRegistryBuilder {
    /// Register `factory` for every module under `prefix`.
    pub fn register<F>(mut self, prefix: &str, module_name: &str, factory: F) -> Self
    where
        F: UnitOfWorkFactory + 'static,
    {
        let owner = self.claim_owner();
        self.entries.push(Registration {
            prefix: prefix.to_owned(),
            owner,
            module_name: module_name.to_owned(),
            factory: Arc::new(factory),
        });
        self
    }

    /// Register a factory that declares its own prefixes.
    pub fn register_owner<F>(mut self, factory: F) -> Self
    where
        F: UnitOfWorkFactory + ModuleOwnership + 'static,
    {
        let factory: Arc<dyn UnitOfWorkFactory> = Arc::new(factory);
        let owner = self.claim_owner();
        for prefix in F::PREFIXES {
            self.entries.push(Registration {
                prefix: (*prefix).to_owned(),
                owner,
                module_name: F::MODULE_NAME.to_owned(),
                factory: Arc::clone(&factory),
            });
        }
        self
    }

    /// Manually maintained entry used only when nothing else is registered.
    pub fn fallback<F>(mut self, prefix: &str, module_name: &str, factory: F) -> Self
    where
        F: UnitOfWorkFactory + 'static,
    {
        let owner = self.claim_owner();
        self.fallback.push(Registration {
            prefix: prefix.to_owned(),
            owner,
            module_name: module_name.to_owned(),
            factory: Arc::new(factory),
        });
        self
    }

    fn claim_owner(&mut self) -> usize {
        let owner = self.next_owner;
        self.next_owner += 1;
        owner
    }

    /// Freeze the table.
    ///
    /// # Errors
    ///
    /// Returns [`UnitOfWorkError::InvalidPrefix`] for an empty prefix or one
    /// with a leading or trailing `::`, and
    /// [`UnitOfWorkError::DuplicatePrefix`] when a prefix appears more than
    /// once in the active table.
    pub fn build(self) -> Result<ModuleRegistry, UnitOfWorkError> {
        let mut entries = if self.entries.is_empty() {
            if !self.fallback.is_empty() {
                warn!(
                    count = self.fallback.len(),
                    "no module owners registered; using fallback unit of work table"
                );
            }
            self.fallback
        } else {
            self.entries
        };

        let mut seen = HashSet::new();
        for entry in &entries {
            if !is_well_formed(&entry.prefix) {
                return Err(UnitOfWorkError::invalid_prefix(entry.prefix.as_str()));
            }
            if !seen.insert(entry.prefix.as_str()) {
                return Err(UnitOfWorkError::duplicate_prefix(entry.prefix.as_str()));
            }
        }

        entries.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Ok(ModuleRegistry { entries })
    }
}
