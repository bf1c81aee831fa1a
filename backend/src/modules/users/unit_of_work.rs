//! Unit of work owning every request declared under the users module.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Error, ModuleOwnership, UnitOfWork, UnitOfWorkFactory};

use super::USERS_MODULE;
use super::ports::{UsersSession, UsersStore};

/// Users persistence session exposed through the [`UnitOfWork`] protocol.
pub struct UsersUnitOfWork {
    session: Box<dyn UsersSession>,
}

impl UsersUnitOfWork {
    pub fn new(session: Box<dyn UsersSession>) -> Self {
        Self { session }
    }

    /// Repository operations sharing this unit's transaction.
    pub fn session(&self) -> &dyn UsersSession {
        self.session.as_ref()
    }
}

#[async_trait]
impl UnitOfWork for UsersUnitOfWork {
    async fn begin(&self) -> Result<(), Error> {
        self.session.begin().await
    }

    async fn save_changes(&self) -> Result<u64, Error> {
        self.session.save_changes().await
    }

    async fn commit(&self) -> Result<(), Error> {
        self.session.commit().await
    }

    async fn rollback(&self) -> Result<(), Error> {
        self.session.rollback().await
    }

    fn in_transaction(&self) -> bool {
        self.session.in_transaction()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Creates a [`UsersUnitOfWork`] per request scope.
#[derive(Clone)]
pub struct UsersUnitOfWorkFactory {
    store: Arc<dyn UsersStore>,
}

impl UsersUnitOfWorkFactory {
    pub fn new(store: Arc<dyn UsersStore>) -> Self {
        Self { store }
    }
}

impl UnitOfWorkFactory for UsersUnitOfWorkFactory {
    fn create(&self) -> Arc<dyn UnitOfWork> {
        Arc::new(UsersUnitOfWork::new(self.store.open()))
    }
}

impl ModuleOwnership for UsersUnitOfWorkFactory {
    const MODULE_NAME: &'static str = "users";
    const PREFIXES: &'static [&'static str] = &[USERS_MODULE];
}
