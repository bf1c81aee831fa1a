//! Business modules served by the shared request pipeline.

pub mod diagnostics;
pub mod users;
