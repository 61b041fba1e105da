use std::path::PathBuf;

use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Service error: {0}")]
    Api(#[from] ApiError),

    #[error("{0}")]
    Panel(#[from] PanelError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Analysis service call errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Request cancelled")]
    Cancelled,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors raised by the view panels and the page controller
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("Validation failed: {field} - {reason}")]
    Validation { field: String, reason: String },

    #[error("{operation} already in progress")]
    Busy { operation: String },

    #[error("No document selected")]
    NoDocument,

    #[error("Unsupported file type: {file_name} (PDF or DOCX files only)")]
    UnsupportedFile { file_name: String },

    #[error("Only one file can be uploaded at a time ({count} selected)")]
    TooManyFiles { count: usize },

    #[error("Interaction not found: {interaction_id}")]
    InteractionNotFound { interaction_id: String },

    #[error("Response superseded by a newer request")]
    Superseded,

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A service call failed; `message` is what the panel shows the user.
    #[error("{message}")]
    Request {
        message: String,
        #[source]
        source: ApiError,
    },
}

impl PanelError {
    /// Message suitable for inline display in the originating panel.
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Whether this error only reports a discarded response.
    pub fn is_superseded(&self) -> bool {
        matches!(
            self,
            PanelError::Superseded
                | PanelError::Request {
                    source: ApiError::Cancelled,
                    ..
                }
        )
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for service calls
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for panel operations
pub type PanelResult<T> = Result<T, PanelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "bad url".to_string(),
        };
        assert_eq!(err.to_string(), "Configuration error: bad url");

        let err = AppError::Internal {
            message: "unexpected".to_string(),
        };
        assert_eq!(err.to_string(), "Internal error: unexpected");
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 500 - boom");

        let err = ApiError::InvalidResponse {
            message: "not json".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid response: not json");

        let err = ApiError::Timeout { timeout_ms: 5000 };
        assert_eq!(err.to_string(), "Request timeout after 5000ms");

        assert_eq!(ApiError::Cancelled.to_string(), "Request cancelled");
    }

    #[test]
    fn test_panel_error_display() {
        let err = PanelError::Validation {
            field: "question".to_string(),
            reason: "cannot be empty".to_string(),
        };
        assert_eq!(err.to_string(), "Validation failed: question - cannot be empty");

        let err = PanelError::UnsupportedFile {
            file_name: "report.txt".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unsupported file type: report.txt (PDF or DOCX files only)"
        );

        let err = PanelError::TooManyFiles { count: 2 };
        assert!(err.to_string().contains("2 selected"));

        let err = PanelError::Busy {
            operation: "Upload".to_string(),
        };
        assert_eq!(err.to_string(), "Upload already in progress");
    }

    #[test]
    fn test_request_error_shows_user_message() {
        let err = PanelError::Request {
            message: "Upload failed".to_string(),
            source: ApiError::Api {
                status: 500,
                message: "internal".to_string(),
            },
        };
        assert_eq!(err.user_message(), "Upload failed");
        assert!(!err.is_superseded());
    }

    #[test]
    fn test_cancelled_request_is_superseded() {
        let err = PanelError::Request {
            message: "Request cancelled".to_string(),
            source: ApiError::Cancelled,
        };
        assert!(err.is_superseded());
        assert!(PanelError::Superseded.is_superseded());
    }

    #[test]
    fn test_conversions_to_app_error() {
        let app_err: AppError = ApiError::Timeout { timeout_ms: 10 }.into();
        assert!(matches!(app_err, AppError::Api(_)));

        let app_err: AppError = PanelError::NoDocument.into();
        assert!(matches!(app_err, AppError::Panel(_)));
        assert_eq!(app_err.to_string(), "No document selected");
    }
}
