//! Users module: registration, lookup and listing of users.
//!
//! Every request declared below this module is served by the
//! [`UsersUnitOfWork`] registered for [`USERS_MODULE`]. Storage is pluggable
//! through [`UsersStore`].

mod commands;
mod filter;
mod ports;
mod queries;
mod unit_of_work;
mod user;

use std::sync::Arc;

use mockable::Clock;

use crate::domain::DispatcherBuilder;

pub use commands::{CreateUser, CreateUserHandler, CreateUserValidator};
pub use filter::{DEFAULT_PAGE_SIZE, FIRST_PAGE, MAX_PAGE_SIZE, Page, UserFilter};
#[cfg(test)]
pub use ports::MockUsersSession;
pub use ports::{UserSlice, UsersSession, UsersStore};
pub use queries::{GetUser, GetUserHandler, ListUsers, ListUsersHandler, ListUsersValidator};
pub use unit_of_work::{UsersUnitOfWork, UsersUnitOfWorkFactory};
pub use user::{
    EMAIL_MAX, Email, EmailError, NAME_MAX, PHONE_MAX, User, UserId, UserProfile, UserView,
};

/// Module path prefix owning every users request.
pub const USERS_MODULE: &str = module_path!();

/// Register the users handlers and validators.
pub fn register(
    builder: DispatcherBuilder,
    clock: Arc<dyn Clock + Send + Sync>,
) -> DispatcherBuilder {
    builder
        .handler::<CreateUser, _>(CreateUserHandler::new(clock))
        .validator::<CreateUser, _>(CreateUserValidator)
        .handler::<GetUser, _>(GetUserHandler)
        .handler::<ListUsers, _>(ListUsersHandler)
        .validator::<ListUsers, _>(ListUsersValidator)
}

#[cfg(test)]
mod tests;
