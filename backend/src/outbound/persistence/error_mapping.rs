//! Translation of storage failures into the error taxonomy.
//!
//! | Failure | Kind |
//! |---------|------|
//! | unique violation | BusinessRule (`unique_constraint`) |
//! | foreign key violation | BusinessRule (`foreign_key_constraint`) |
//! | check / not-null violation | Domain |
//! | closed connection, pool checkout | Infrastructure |
//! | anything else | Database |

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::{Error, ErrorBuilder, ErrorKind};

use super::pool::PoolError;

/// Service name reported for PostgreSQL outages.
pub const POSTGRES_SERVICE: &str = "postgres";

/// Unique constraint breach on `table`.
pub fn unique_violation(table: &str, constraint: Option<&str>) -> Error {
    let builder = unique_violation_builder(table);
    match constraint {
        Some(constraint) => builder.extension("constraint", constraint).build(),
        None => builder.build(),
    }
}

fn unique_violation_builder(table: &str) -> ErrorBuilder {
    Error::builder(
        ErrorKind::BusinessRule,
        "A record with the same unique value already exists.",
    )
    .extension("ruleName", "unique_constraint")
    .extension("tableName", table)
}

/// Map a pool failure to an unavailable-service error.
pub fn map_pool_error(error: PoolError) -> Error {
    debug!(%error, "connection pool failure");
    Error::builder(ErrorKind::Infrastructure, "The database is unavailable.")
        .extension("serviceName", POSTGRES_SERVICE)
        .source(error)
        .build()
}

/// Map a Diesel failure raised while running `operation` on `table`.
pub fn map_diesel_error(operation: &str, table: &str, error: DieselError) -> Error {
    let (kind, constraint) = match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), operation, "diesel operation failed");
            (Some(*kind), info.constraint_name().map(str::to_owned))
        }
        _ => {
            debug!(
                error_type = %std::any::type_name_of_val(&error),
                operation,
                "diesel operation failed"
            );
            (None, None)
        }
    };
    let table = error_table(&error).unwrap_or(table).to_owned();

    let builder = match kind {
        Some(DatabaseErrorKind::UniqueViolation) => unique_violation_builder(&table),
        Some(DatabaseErrorKind::ForeignKeyViolation) => Error::builder(
            ErrorKind::BusinessRule,
            "The operation references a record that does not exist.",
        )
        .extension("ruleName", "foreign_key_constraint")
        .extension("tableName", table.as_str()),
        Some(DatabaseErrorKind::CheckViolation | DatabaseErrorKind::NotNullViolation) => {
            Error::builder(ErrorKind::Domain, "The record violates a data constraint.")
                .extension("entityName", table.as_str())
        }
        Some(DatabaseErrorKind::ClosedConnection) => {
            Error::builder(ErrorKind::Infrastructure, "The database connection was lost.")
                .extension("serviceName", POSTGRES_SERVICE)
        }
        _ => Error::builder(ErrorKind::Database, "The database operation failed.")
            .extension("operation", operation)
            .extension("tableName", table.as_str()),
    };
    let builder = match constraint {
        Some(constraint) => builder.extension("constraint", constraint),
        None => builder,
    };
    builder.source(error).build()
}

fn error_table(error: &DieselError) -> Option<&str> {
    match error {
        DieselError::DatabaseError(_, info) => info.table_name(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use diesel::result::DatabaseErrorInformation;
    use rstest::rstest;
    use serde_json::json;

    struct Info {
        constraint: Option<&'static str>,
    }

    impl DatabaseErrorInformation for Info {
        fn message(&self) -> &str {
            "simulated"
        }
        fn details(&self) -> Option<&str> {
            None
        }
        fn hint(&self) -> Option<&str> {
            None
        }
        fn table_name(&self) -> Option<&str> {
            None
        }
        fn column_name(&self) -> Option<&str> {
            None
        }
        fn constraint_name(&self) -> Option<&str> {
            self.constraint
        }
        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    fn database_error(kind: DatabaseErrorKind, constraint: Option<&'static str>) -> DieselError {
        DieselError::DatabaseError(kind, Box::new(Info { constraint }))
    }

    #[rstest]
    #[case(DatabaseErrorKind::UniqueViolation, ErrorKind::BusinessRule)]
    #[case(DatabaseErrorKind::ForeignKeyViolation, ErrorKind::BusinessRule)]
    #[case(DatabaseErrorKind::CheckViolation, ErrorKind::Domain)]
    #[case(DatabaseErrorKind::NotNullViolation, ErrorKind::Domain)]
    #[case(DatabaseErrorKind::ClosedConnection, ErrorKind::Infrastructure)]
    #[case(DatabaseErrorKind::SerializationFailure, ErrorKind::Database)]
    fn database_errors_map_to_taxonomy(#[case] kind: DatabaseErrorKind, #[case] expected: ErrorKind) {
        let mapped = map_diesel_error("insert", "users", database_error(kind, None));
        assert_eq!(mapped.kind(), expected);
    }

    #[rstest]
    fn unique_violation_names_the_constraint() {
        let mapped = map_diesel_error(
            "insert",
            "users",
            database_error(DatabaseErrorKind::UniqueViolation, Some("users_email_key")),
        );

        assert_eq!(mapped.extension("ruleName"), Some(&json!("unique_constraint")));
        assert_eq!(mapped.extension("constraint"), Some(&json!("users_email_key")));
        assert_eq!(mapped.extension("errorCode"), Some(&json!("BUSINESS_RULE_VIOLATION")));
        assert!(mapped.source_type().is_some());
    }

    #[rstest]
    fn other_failures_report_operation() {
        let mapped = map_diesel_error("list", "users", DieselError::NotFound);
        assert_eq!(mapped.kind(), ErrorKind::Database);
        assert_eq!(mapped.extension("operation"), Some(&json!("list")));
        assert_eq!(mapped.extension("tableName"), Some(&json!("users")));
    }

    #[rstest]
    fn pool_failures_are_unavailable() {
        let mapped = map_pool_error(PoolError::checkout("timed out"));
        assert_eq!(mapped.kind(), ErrorKind::Infrastructure);
        assert_eq!(mapped.extension("serviceName"), Some(&json!("postgres")));
    }
}
