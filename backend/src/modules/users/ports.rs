//! Persistence ports for the users module.
//!
//! A [`UsersStore`] opens one [`UsersSession`] per request. The session is
//! both the transaction boundary and the repository: writes are staged with
//! [`UsersSession::add`], flushed by `save_changes` and published by `commit`.

use async_trait::async_trait;

use crate::domain::Error;

use super::filter::UserFilter;
use super::user::{Email, User, UserId};

/// Users matching a filter plus the unpaged match count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSlice {
    pub users: Vec<User>,
    pub total: u64,
}

/// Request-scoped persistence session for users.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsersSession: Send + Sync {
    /// Open a transaction; no-op when one is already open.
    async fn begin(&self) -> Result<(), Error>;

    /// Flush staged writes, returning how many rows were written.
    async fn save_changes(&self) -> Result<u64, Error>;

    /// Commit the open transaction; no-op when none is open.
    async fn commit(&self) -> Result<(), Error>;

    /// Discard the open transaction and any staged writes.
    async fn rollback(&self) -> Result<(), Error>;

    fn in_transaction(&self) -> bool;

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, Error>;

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, Error>;

    /// Users matching `filter`, ordered by first name, last name then id.
    async fn list(&self, filter: &UserFilter) -> Result<UserSlice, Error>;

    /// Stage `user` for insertion at the next `save_changes`.
    async fn add(&self, user: User) -> Result<(), Error>;
}

/// Opens users sessions.
pub trait UsersStore: Send + Sync {
    fn open(&self) -> Box<dyn UsersSession>;
}
