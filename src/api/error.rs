//! API error types for the REST collaborators

use std::collections::BTreeMap;

use thiserror::Error;

/// Errors that can occur when talking to the REST API
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    /// 401 Unauthorized - token missing, invalid or expired
    #[error("{endpoint}: Unauthorized (401) - session expired or not logged in")]
    Unauthorized { endpoint: String },
    /// 403 Forbidden - token lacks required permissions
    #[error("{endpoint}: Forbidden (403) - insufficient permissions")]
    Forbidden { endpoint: String },
    /// Network or timeout error
    #[error("{endpoint}: Network error - {message}")]
    NetworkError { endpoint: String, message: String },
    /// Other HTTP errors
    #[error("{endpoint}: HTTP {status} - {message}")]
    HttpError {
        endpoint: String,
        status: u16,
        message: String,
    },
    /// Response body could not be understood
    #[error("{endpoint}: Unexpected response - {message}")]
    Parse { endpoint: String, message: String },
}

impl ApiError {
    /// Check if this is an authentication error (401 or 403)
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized { .. } | ApiError::Forbidden { .. }
        )
    }

    /// Errors worth retrying: network failures and gateway/5xx responses
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::NetworkError { .. } => true,
            ApiError::HttpError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            ApiError::Unauthorized { endpoint }
            | ApiError::Forbidden { endpoint }
            | ApiError::NetworkError { endpoint, .. }
            | ApiError::HttpError { endpoint, .. }
            | ApiError::Parse { endpoint, .. } => endpoint,
        }
    }

    pub fn unauthorized(endpoint: impl Into<String>) -> Self {
        ApiError::Unauthorized {
            endpoint: endpoint.into(),
        }
    }

    pub fn forbidden(endpoint: impl Into<String>) -> Self {
        ApiError::Forbidden {
            endpoint: endpoint.into(),
        }
    }

    pub fn network(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::NetworkError {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    pub fn http(endpoint: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        ApiError::HttpError {
            endpoint: endpoint.into(),
            status,
            message: message.into(),
        }
    }

    pub fn parse(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Parse {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }
}

/// Why a submission did not save
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SubmitError {
    /// Server-side validation, keyed by field name
    #[error("the server rejected {} field(s)", .0.len())]
    Fields(BTreeMap<String, Vec<String>>),
    /// Anything else; shown to the user as an opaque message
    #[error("{0}")]
    Unexpected(String),
}

impl From<ApiError> for SubmitError {
    fn from(err: ApiError) -> Self {
        SubmitError::Unexpected(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_auth_error() {
        assert!(ApiError::unauthorized("/v1/empleados/").is_auth_error());
        assert!(ApiError::forbidden("/v1/empleados/").is_auth_error());
        assert!(!ApiError::network("/v1/empleados/", "timeout").is_auth_error());
    }

    #[test]
    fn test_is_transient() {
        assert!(ApiError::network("/v1/turnos/", "reset").is_transient());
        assert!(ApiError::http("/v1/turnos/", 503, "unavailable").is_transient());
        assert!(!ApiError::http("/v1/turnos/", 404, "missing").is_transient());
        assert!(!ApiError::unauthorized("/v1/turnos/").is_transient());
    }

    #[test]
    fn test_display() {
        let err = ApiError::http("/v1/puestos/", 500, "boom");
        assert_eq!(err.to_string(), "/v1/puestos/: HTTP 500 - boom");
        assert_eq!(err.endpoint(), "/v1/puestos/");
    }

    #[test]
    fn test_api_error_becomes_unexpected_submit_error() {
        let err: SubmitError = ApiError::network("/v1/empleados/", "timeout").into();
        assert_eq!(
            err,
            SubmitError::Unexpected("/v1/empleados/: Network error - timeout".into())
        );
    }
}
