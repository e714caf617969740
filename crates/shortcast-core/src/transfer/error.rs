//! Upload failure taxonomy.

use thiserror::Error;

use crate::auth::AuthError;
use crate::retry::{ErrorKind, Retryable};

#[derive(Debug, Error)]
pub enum TransferError {
    /// Missing, expired or rejected credentials.
    #[error("not authorized: {0}")]
    Auth(String),
    /// Network trouble or a server-side hiccup; worth another attempt.
    #[error("transient failure: {detail}")]
    Transient { kind: ErrorKind, detail: String },
    #[error("upload quota exhausted: {0}")]
    QuotaExceeded(String),
    /// The endpoint refused the request itself (metadata, size, format).
    #[error("rejected by endpoint: {0}")]
    Validation(String),
    #[error("upload failed: {0}")]
    Fatal(String),
}

impl TransferError {
    pub fn transient(kind: ErrorKind, detail: impl Into<String>) -> Self {
        TransferError::Transient {
            kind,
            detail: detail.into(),
        }
    }

    /// Short operator-facing label.
    pub fn status(&self) -> &'static str {
        match self {
            TransferError::Auth(_) => "auth-failure",
            TransferError::Transient { .. } => "transient-failure",
            TransferError::QuotaExceeded(_) => "quota-exceeded",
            TransferError::Validation(_) => "validation-failure",
            TransferError::Fatal(_) => "upload-failure",
        }
    }
}

impl Retryable for TransferError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            TransferError::Transient { kind, .. } => *kind,
            _ => ErrorKind::Other,
        }
    }
}

impl From<AuthError> for TransferError {
    fn from(e: AuthError) -> Self {
        TransferError::Auth(e.to_string())
    }
}
