//! Shared helpers for Diesel adapter error mapping.
//!
//! Each persistence adapter maps driver errors into its own port error enum;
//! these helpers keep the message extraction and error classification in one
//! place so the adapters stay thin.

use tracing::debug;

use super::pool::PoolError;

/// Extract a readable message from a pool error.
pub(crate) fn map_pool_error_message(error: PoolError) -> String {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => message,
    }
}

/// Extract a readable message from a Diesel error and emit debug context.
pub(crate) fn map_diesel_error_message(error: diesel::result::Error, operation: &str) -> String {
    use diesel::result::Error as DieselError;

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), %operation, "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            %operation,
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => "record not found".to_owned(),
        DieselError::QueryBuilderError(_) => "database query error".to_owned(),
        DieselError::DatabaseError(..) => "database error".to_owned(),
        _ => "database error".to_owned(),
    }
}

/// Whether the error is a unique-constraint violation.
///
/// The two insert paths that care (idempotency records and bookings) map
/// this to their port's dedicated duplicate variant before falling back to
/// the generic classification.
pub(crate) fn is_unique_violation(error: &diesel::result::Error) -> bool {
    matches!(
        error,
        diesel::result::Error::DatabaseError(diesel::result::DatabaseErrorKind::UniqueViolation, _)
    )
}

/// Whether the error indicates the connection itself failed.
pub(crate) fn is_closed_connection(error: &diesel::result::Error) -> bool {
    matches!(
        error,
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::ClosedConnection,
            _
        )
    ) || matches!(error, diesel::result::Error::BrokenTransactionManager)
}
