/// dbshell Error Module
///
/// Error types shared by the connection factories, the cursor and the
/// interactive session.
use thiserror::Error;

/// Error type for everything dbshell does.
///
/// Driver failures are carried with the driver's own message; nothing here
/// retries or reinterprets them.
#[derive(Error, Debug)]
pub enum DbShellError {
    /// The driver could not open, reach or authenticate against the database
    #[error("Connection error: {0}")]
    Connection(String),

    /// A statement failed while the session was running
    #[error("Query error: {0}")]
    Query(String),

    /// An environment value could not be turned into a connection parameter
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session-language errors: unknown names, bad calls, unsupported attributes
    #[error("Session error: {0}")]
    Session(String),

    /// Terminal and stdin failures
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbShellError {
    pub(crate) fn connection(err: impl std::fmt::Display) -> Self {
        DbShellError::Connection(err.to_string())
    }

    pub(crate) fn query(err: impl std::fmt::Display) -> Self {
        DbShellError::Query(err.to_string())
    }
}

/// Type alias for Result to use DbShellError as the error type.
pub type Result<T> = std::result::Result<T, DbShellError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let conn_err = DbShellError::connection("Connection refused (os error 111)");
        assert_eq!(
            conn_err.to_string(),
            "Connection error: Connection refused (os error 111)"
        );

        let query_err = DbShellError::Query("no such table: users".to_string());
        assert!(query_err.to_string().contains("Query error"));

        let config_err = DbShellError::Config("bad port".to_string());
        assert!(config_err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "stdin closed");
        let err: DbShellError = io_err.into();
        match err {
            DbShellError::Io(_) => {}
            _ => panic!("Expected IO error"),
        }
    }

    #[test]
    fn test_driver_message_is_kept_verbatim() {
        let conn = duckdb::Connection::open_in_memory().unwrap();
        let driver_err = conn.execute_batch("SELECT * FROM nowhere").unwrap_err();
        let err = DbShellError::query(&driver_err);
        assert_eq!(err.to_string(), format!("Query error: {}", driver_err));
    }
}
