//! Users persistence adapters.
//!
//! Two interchangeable [`UsersStore`](crate::modules::users::UsersStore)
//! implementations:
//!
//! - [`InMemoryUsersStore`]: process-local map, used by tests and by local
//!   runs without a database URL.
//! - [`DieselUsersStore`]: PostgreSQL through `diesel-async` and a `bb8` pool.
//!
//! Row structs (`models.rs`) and table definitions (`schema.rs`) stay private
//! to this module. Storage failures are translated into the error taxonomy in
//! `error_mapping.rs`.
//!
//! # Example
//!
//! ```ignore
//! use modulith::outbound::persistence::{DbPool, DieselUsersStore, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/modulith")).await?;
//! let store = DieselUsersStore::new(pool);
//! ```

mod diesel_users_store;
mod error_mapping;
mod in_memory_users_store;
mod models;
mod pool;
mod schema;

pub use diesel_users_store::{DieselUsersSession, DieselUsersStore};
pub use error_mapping::{POSTGRES_SERVICE, map_diesel_error, map_pool_error, unique_violation};
pub use in_memory_users_store::{InMemoryUsersSession, InMemoryUsersStore};
pub use pool::{DbPool, PoolConfig, PoolError};
