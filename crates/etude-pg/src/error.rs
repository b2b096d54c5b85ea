use etude_sql::SqlError;
use thiserror::Error;

/// SQLSTATE raised when the requested database does not exist.
pub const INVALID_CATALOG_NAME: &str = "3D000";

/// Errors returned by etude-pg operations.
#[derive(Debug, Error)]
pub enum PgError {
    /// I/O error from the underlying socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol violation or unexpected message from server.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Authentication failure.
    #[error("Auth error: {0}")]
    Auth(String),

    /// Server-sent error response.
    #[error("PG {severity}: {message} ({code})")]
    Server {
        severity: String,
        code: String,
        message: String,
    },

    /// Connection is closed or in an invalid state.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A cell could not be decoded.
    #[error("Type conversion: {0}")]
    TypeConversion(String),

    /// Bad connection settings.
    #[error("Config error: {0}")]
    Config(String),
}

impl PgError {
    /// Build a server error from ErrorResponse fields.
    pub fn from_fields(fields: &[(u8, String)]) -> Self {
        let mut severity = String::new();
        let mut code = String::new();
        let mut message = String::new();
        for (field_type, value) in fields {
            match field_type {
                b'S' => severity = value.clone(),
                b'C' => code = value.clone(),
                b'M' => message = value.clone(),
                _ => {}
            }
        }
        PgError::Server {
            severity,
            code,
            message,
        }
    }

    /// SQLSTATE of a server error.
    pub fn code(&self) -> Option<&str> {
        match self {
            PgError::Server { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn is_missing_database(&self) -> bool {
        self.code() == Some(INVALID_CATALOG_NAME)
    }
}

impl From<PgError> for SqlError {
    fn from(e: PgError) -> Self {
        SqlError::driver(e)
    }
}

pub type PgResult<T> = Result<T, PgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_from_fields() {
        let fields = vec![
            (b'S', "FATAL".to_string()),
            (b'V', "FATAL".to_string()),
            (b'C', "3D000".to_string()),
            (b'M', "database \"nope\" does not exist".to_string()),
        ];
        let err = PgError::from_fields(&fields);
        assert!(err.is_missing_database());
        assert_eq!(
            err.to_string(),
            "PG FATAL: database \"nope\" does not exist (3D000)"
        );
    }

    #[test]
    fn test_into_sql_error_keeps_source() {
        let err: SqlError = PgError::ConnectionClosed.into();
        assert!(matches!(err, SqlError::Driver(_)));
        assert_eq!(err.to_string(), "database error: Connection closed");
        assert!(std::error::Error::source(&err).is_some());
    }
}
