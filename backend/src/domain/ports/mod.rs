//! Domain ports shared by every module.

mod macros;
pub(crate) use macros::define_port_error;

mod unit_of_work;

pub use unit_of_work::{ModuleOwnership, UnitOfWork, UnitOfWorkError, UnitOfWorkFactory};
