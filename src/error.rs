//! Error handling for the NSS platform client

use std::collections::BTreeMap;
use std::fmt;

use nss_auth::AuthError;
use nss_postgrest::PostgrestError;
use reqwest::StatusCode;
use thiserror::Error;

/// Unified error type for the NSS platform client
///
/// Every variant except [`Error::Config`] is recoverable: the caller shows
/// the message and the user may try again. Nothing is retried automatically.
#[derive(Error, Debug)]
pub enum Error {
    /// A form failed client-side validation; nothing was sent
    #[error("Validation error on `{field}`: {message}")]
    Validation { field: String, message: String },

    /// No session, or the session expired
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    /// The resolved role may not perform the action
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The lifecycle has no edge for this action from the current status
    #[error("Invalid transition: cannot {action} a record that is {from}")]
    InvalidTransition { from: String, action: String },

    /// The record changed between read and write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Transport or backend failure
    #[error("Network error: {0}")]
    Network(String),

    /// The requested record does not exist (or is hidden by row level security)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid connection parameters
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation<F: fmt::Display, M: fmt::Display>(field: F, message: M) -> Self {
        Error::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn unauthorized<T: fmt::Display>(msg: T) -> Self {
        Error::Unauthorized(msg.to_string())
    }

    pub fn not_authenticated<T: fmt::Display>(msg: T) -> Self {
        Error::NotAuthenticated(msg.to_string())
    }

    pub fn invalid_transition<F: fmt::Display, A: fmt::Display>(from: F, action: A) -> Self {
        Error::InvalidTransition {
            from: from.to_string(),
            action: action.to_string(),
        }
    }

    pub fn conflict<T: fmt::Display>(msg: T) -> Self {
        Error::Conflict(msg.to_string())
    }

    pub fn network<T: fmt::Display>(msg: T) -> Self {
        Error::Network(msg.to_string())
    }

    pub fn not_found<T: fmt::Display>(msg: T) -> Self {
        Error::NotFound(msg.to_string())
    }

    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Whether the user can dismiss the message and try the action again.
    pub fn is_retryable_by_user(&self) -> bool {
        !matches!(self, Error::Config(_))
    }

    fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => Error::NotAuthenticated(message),
            StatusCode::FORBIDDEN => Error::Unauthorized(message),
            StatusCode::CONFLICT => Error::Conflict(message),
            StatusCode::NOT_FOUND => Error::NotFound(message),
            _ => Error::Network(message),
        }
    }
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingSession | AuthError::SessionExpired => {
                Error::NotAuthenticated(err.to_string())
            }
            AuthError::ApiError { status, message } if status == StatusCode::UNAUTHORIZED => {
                Error::NotAuthenticated(message)
            }
            other => Error::Network(other.to_string()),
        }
    }
}

impl From<PostgrestError> for Error {
    fn from(err: PostgrestError) -> Self {
        match err.status() {
            Some(status) => Error::from_status(status, err.to_string()),
            None => Error::Network(err.to_string()),
        }
    }
}

/// Keeps the first message of the alphabetically first failing field, so the
/// same form always reports the same field.
impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut by_field = BTreeMap::new();
        for (field, errs) in errors.field_errors() {
            if let Some(first) = errs.first() {
                let msg = first
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                by_field.insert(field.to_string(), msg);
            }
        }

        match by_field.into_iter().next() {
            Some((field, message)) => Error::Validation { field, message },
            None => Error::validation("form", "Validation failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nss_postgrest::PostgrestApiErrorDetails;

    #[test]
    fn postgrest_statuses_map_to_taxonomy() {
        let err = PostgrestError::UnparsedApiError {
            message: "jwt expired".to_string(),
            status: StatusCode::UNAUTHORIZED,
        };
        assert!(matches!(Error::from(err), Error::NotAuthenticated(_)));

        let err = PostgrestError::ApiError {
            details: PostgrestApiErrorDetails {
                code: Some("42501".to_string()),
                message: Some("permission denied".to_string()),
                details: None,
                hint: None,
            },
            status: StatusCode::FORBIDDEN,
        };
        assert!(matches!(Error::from(err), Error::Unauthorized(_)));

        let err = PostgrestError::UnparsedApiError {
            message: "relation \"public.units\" does not exist".to_string(),
            status: StatusCode::NOT_FOUND,
        };
        assert!(matches!(Error::from(err), Error::NotFound(_)));

        let err = PostgrestError::UnparsedApiError {
            message: "bad gateway".to_string(),
            status: StatusCode::BAD_GATEWAY,
        };
        assert!(matches!(Error::from(err), Error::Network(_)));
    }

    #[test]
    fn missing_auth_session_is_not_authenticated() {
        assert!(matches!(
            Error::from(AuthError::MissingSession),
            Error::NotAuthenticated(_)
        ));
    }

    #[test]
    fn only_config_errors_are_fatal() {
        assert!(!Error::config("SUPABASE_URL").is_retryable_by_user());
        assert!(Error::conflict("moved").is_retryable_by_user());
        assert!(Error::invalid_transition("certified", "reject").is_retryable_by_user());
    }
}
