//! Translation of pool and Diesel failures into contact repository errors.

use tracing::debug;

use crate::domain::ports::ContactRepositoryError;

use super::pool::PoolError;

pub(crate) fn map_pool_error(error: PoolError) -> ContactRepositoryError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            ContactRepositoryError::connection(message)
        }
    }
}

/// Map Diesel errors, treating uniqueness and serialisation failures as
/// write conflicts the caller may retry.
pub(crate) fn map_diesel_error(error: diesel::result::Error) -> ContactRepositoryError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => ContactRepositoryError::query("record not found"),
        DieselError::QueryBuilderError(_) => ContactRepositoryError::query("database query error"),
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            ContactRepositoryError::conflict(info.message().to_owned())
        }
        DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, info) => {
            ContactRepositoryError::conflict(info.message().to_owned())
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            ContactRepositoryError::connection("database connection error")
        }
        _ => ContactRepositoryError::query("database error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};
    use rstest::rstest;

    #[derive(Debug)]
    struct StubInfo(&'static str);

    impl DatabaseErrorInformation for StubInfo {
        fn message(&self) -> &str {
            self.0
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
            None
        }
        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    fn database_error(kind: DatabaseErrorKind, message: &'static str) -> DieselError {
        DieselError::DatabaseError(kind, Box::new(StubInfo(message)))
    }

    #[rstest]
    fn pool_failures_map_to_connection() {
        let mapped = map_pool_error(PoolError::checkout("timed out"));
        assert_eq!(mapped, ContactRepositoryError::connection("timed out"));
    }

    #[rstest]
    #[case(
        database_error(DatabaseErrorKind::UniqueViolation, "duplicate pair"),
        ContactRepositoryError::conflict("duplicate pair")
    )]
    #[case(
        database_error(DatabaseErrorKind::SerializationFailure, "could not serialize"),
        ContactRepositoryError::conflict("could not serialize")
    )]
    #[case(
        database_error(DatabaseErrorKind::ClosedConnection, "gone"),
        ContactRepositoryError::connection("database connection error")
    )]
    #[case(
        database_error(DatabaseErrorKind::CheckViolation, "bad precedence"),
        ContactRepositoryError::query("database error")
    )]
    #[case(DieselError::NotFound, ContactRepositoryError::query("record not found"))]
    fn diesel_failures_are_classified(
        #[case] error: DieselError,
        #[case] expected: ContactRepositoryError,
    ) {
        assert_eq!(map_diesel_error(error), expected);
    }
}
