use thiserror::Error;

/// Errors from repository operations (used by trait definitions in corvid-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from messaging-platform API calls.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("http error: {0}")]
    Http(String),

    #[error("platform rejected request ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("user not found: '{0}'")]
    UserNotFound(String),

    #[error("request timed out")]
    Timeout,
}

/// Errors from the duplex event connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("websocket error: {0}")]
    Transport(String),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("gave up after {attempts} reconnect attempts")]
    GaveUp { attempts: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_platform_error_display() {
        let err = PlatformError::Api {
            status: 403,
            body: "forbidden".to_string(),
        };
        assert!(err.to_string().contains("403"));
        assert!(err.to_string().contains("forbidden"));

        let err = PlatformError::UserNotFound("@ghost".to_string());
        assert_eq!(err.to_string(), "user not found: '@ghost'");
    }

    #[test]
    fn test_connection_error_display() {
        let err = ConnectionError::GaveUp { attempts: 12 };
        assert_eq!(err.to_string(), "gave up after 12 reconnect attempts");
    }
}
