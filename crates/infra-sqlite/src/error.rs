// sqlx::Error -> AppError mapping

use sweeper_core::error::AppError;

/// Convert sqlx::Error to AppError, keeping the SQLite result code class.
///
/// Busy/locked databases and connection-level failures map to
/// `StorageUnavailable` (retried later), everything else to `Storage`.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            // SQLite result codes: https://www.sqlite.org/rescode.html
            Some(code) => {
                let code_str = code.as_ref();
                match code_str {
                    "2067" | "1555" => AppError::Storage(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "787" | "3850" => AppError::Storage(format!(
                        "Foreign key constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "5" | "6" | "261" | "262" | "517" => AppError::StorageUnavailable(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => AppError::Storage(format!("Database full: {}", db_err.message())),
                    _ => AppError::Storage(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            }
            None => AppError::Storage(format!("Database error: {}", db_err.message())),
        },
        sqlx::Error::RowNotFound => AppError::Storage("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => AppError::Storage(format!("Column not found: {}", col)),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            AppError::StorageUnavailable(err.to_string())
        }
        // Protocol, decode and configuration errors
        _ => AppError::Storage(err.to_string()),
    }
}
