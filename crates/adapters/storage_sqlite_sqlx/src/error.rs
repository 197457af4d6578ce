//! Storage-specific error type wrapping sqlx errors, and its translation
//! into the domain taxonomy.

use sqlx::error::{DatabaseError, ErrorKind};

use hearth_domain::error::HubError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to (de)serialize a stored JSON value.
    #[error("JSON serialization error")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<StorageError> for HubError {
    fn from(err: StorageError) -> Self {
        let translated = match &err {
            StorageError::Database(sqlx::Error::RowNotFound) => {
                Some(HubError::NotFound("record not found".into()))
            }
            StorageError::Database(sqlx::Error::Database(db)) => translate(db.as_ref()),
            _ => None,
        };
        translated.unwrap_or_else(|| HubError::internal_from("storage failure", err))
    }
}

fn translate(err: &dyn DatabaseError) -> Option<HubError> {
    match err.kind() {
        ErrorKind::UniqueViolation => Some(HubError::Conflict(format!(
            "a record with the same {} already exist",
            failed_column(err.message())
        ))),
        ErrorKind::ForeignKeyViolation => {
            Some(HubError::NotFound("referenced record does not exist".into()))
        }
        ErrorKind::NotNullViolation | ErrorKind::CheckViolation => Some(HubError::Invalid(format!(
            "invalid value for {}",
            failed_column(err.message())
        ))),
        _ => None,
    }
}

// SQLite reports e.g. "UNIQUE constraint failed: devices.identifier".
fn failed_column(message: &str) -> &str {
    message
        .rsplit_once(": ")
        .map_or(message, |(_, columns)| columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_extract_column_from_constraint_message() {
        assert_eq!(
            failed_column("UNIQUE constraint failed: devices.identifier"),
            "devices.identifier"
        );
        assert_eq!(failed_column("constraint failed"), "constraint failed");
    }

    #[test]
    fn should_map_row_not_found_to_not_found() {
        let err: HubError = StorageError::from(sqlx::Error::RowNotFound).into();
        assert!(matches!(err, HubError::NotFound(_)));
    }

    #[test]
    fn should_hide_unexpected_faults_behind_internal() {
        let err: HubError = StorageError::from(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(err, HubError::Internal { .. }));
        assert_eq!(err.public_message(), "internal server error");
    }
}
