//! Unified gateway error model and mapping helpers.
//! Authorization denial is not an error: it is a `Decision`. Only failures that
//! the routing layer must surface (bad identity headers, an unreachable backend,
//! internal faults) are represented here.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Transport failure or non-2xx answer from the openHAB backend.
    #[error("backend_unavailable: {message}")]
    BackendUnavailable { status: Option<u16>, message: String },
    /// Required identity header missing or empty.
    #[error("{code}: {message}")]
    InvalidIdentity { code: String, message: String },
    /// Malformed request body or parameters.
    #[error("{code}: {message}")]
    InvalidRequest { code: String, message: String },
    #[error("{code}: {message}")]
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::BackendUnavailable { .. } => "backend_unavailable",
            AppError::InvalidIdentity { code, .. }
            | AppError::InvalidRequest { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::BackendUnavailable { message, .. }
            | AppError::InvalidIdentity { message, .. }
            | AppError::InvalidRequest { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn backend<S: Into<String>>(status: Option<u16>, msg: S) -> Self { AppError::BackendUnavailable { status, message: msg.into() } }
    pub fn identity<S: Into<String>>(code: S, msg: S) -> Self { AppError::InvalidIdentity { code: code.into(), message: msg.into() } }
    pub fn invalid<S: Into<String>>(code: S, msg: S) -> Self { AppError::InvalidRequest { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Upstream status carried by a backend failure, if the backend answered at all.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            AppError::BackendUnavailable { status, .. } => *status,
            _ => None,
        }
    }

    /// Map to HTTP status code.
    /// Upstream client errors (e.g. 404 for an unknown item) are passed through unchanged;
    /// every other backend failure is a server error.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::BackendUnavailable { status: Some(s), .. } if (400..500).contains(s) => *s,
            AppError::BackendUnavailable { .. } => 500,
            AppError::InvalidIdentity { .. } | AppError::InvalidRequest { .. } => 400,
            AppError::Internal { .. } => 500,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::BackendUnavailable { status: err.status().map(|s| s.as_u16()), message: err.to_string() }
    }
}
