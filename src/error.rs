// Error handling module
// Defines the error taxonomy shared by both integration clients

use thiserror::Error;

/// Errors that can occur during integration sync operations
#[derive(Error, Debug)]
pub enum SyncError {
    /// Authorization-code exchange was rejected by the provider.
    /// The user must restart the auth flow.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The refresh token was rejected by the provider. The stored
    /// credential can no longer be renewed without a fresh auth flow.
    #[error("Re-authentication required: {0}")]
    ReauthenticationRequired(String),

    /// Operation attempted with no credential configured at all
    #[error("Integration is not connected")]
    NotConfigured,

    /// Non-2xx response from the provider API
    #[error("Remote request failed: {status} {status_text}")]
    RemoteRequestFailed {
        status: u16,
        status_text: String,
        body: String,
    },

    /// DNS / connection / timeout failure before an HTTP status was received
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Credential store I/O failure
    #[error("Credential storage error: {0}")]
    Storage(String),

    /// Invalid client-side configuration (malformed endpoint URL, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider returned a 2xx response whose body could not be interpreted
    #[error("Malformed provider payload: {0}")]
    Payload(String),
}

impl SyncError {
    /// True for a `RemoteRequestFailed` carrying HTTP 404.
    /// Read paths use this to normalize "not found" into an absent result.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::RemoteRequestFailed { status: 404, .. })
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        SyncError::Storage(err.to_string())
    }
}

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SyncError::AuthenticationFailed("code expired".to_string());
        assert_eq!(err.to_string(), "Authentication failed: code expired");

        let err = SyncError::RemoteRequestFailed {
            status: 403,
            status_text: "Forbidden".to_string(),
            body: String::new(),
        };
        assert_eq!(err.to_string(), "Remote request failed: 403 Forbidden");

        let err = SyncError::NotConfigured;
        assert_eq!(err.to_string(), "Integration is not connected");
    }

    #[test]
    fn test_is_not_found() {
        let err = SyncError::RemoteRequestFailed {
            status: 404,
            status_text: "Not Found".to_string(),
            body: String::new(),
        };
        assert!(err.is_not_found());

        let err = SyncError::RemoteRequestFailed {
            status: 403,
            status_text: "Forbidden".to_string(),
            body: String::new(),
        };
        assert!(!err.is_not_found());

        assert!(!SyncError::NotConfigured.is_not_found());
    }

    #[test]
    fn test_storage_error_from_rusqlite() {
        let err: SyncError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, SyncError::Storage(_)));
    }

    #[test]
    fn test_config_error_message() {
        let err = SyncError::Config("invalid authorize URL".to_string());
        assert_eq!(err.to_string(), "Configuration error: invalid authorize URL");
    }

    #[test]
    fn test_reauthentication_required_message() {
        let err = SyncError::ReauthenticationRequired("refresh token rejected".to_string());
        assert_eq!(
            err.to_string(),
            "Re-authentication required: refresh token rejected"
        );
    }
}
