//! Map curl errors and HTTP replies onto [`TransferError`].

use super::error::TransferError;
use super::response::parse_error;
use crate::retry::ErrorKind;

/// Reasons under 403 that mean "come back later", not "fix the request".
const QUOTA_REASONS: &[&str] = &[
    "quotaExceeded",
    "uploadLimitExceeded",
    "rateLimitExceeded",
    "dailyLimitExceeded",
];

/// Which request produced the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Opening the resumable session.
    Open,
    /// Any request against an existing session URI.
    Session,
}

pub(crate) fn classify_curl_error(e: &curl::Error) -> TransferError {
    let kind = if e.is_operation_timedout() {
        ErrorKind::Timeout
    } else if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
        || e.is_ssl_connect_error()
    {
        ErrorKind::Connection
    } else {
        return TransferError::Fatal(e.to_string());
    };
    TransferError::transient(kind, e.to_string())
}

/// Classify a non-success HTTP reply.
pub(crate) fn classify_status(code: u32, body: &[u8], phase: Phase) -> TransferError {
    let (reasons, message) = parse_error(body);
    let detail = if message.is_empty() {
        format!("HTTP {}", code)
    } else {
        format!("HTTP {}: {}", code, message)
    };
    match code {
        429 | 503 => TransferError::transient(ErrorKind::Throttled, detail),
        500..=599 => TransferError::transient(ErrorKind::Http5xx(code as u16), detail),
        401 => TransferError::Auth(detail),
        403 if reasons.iter().any(|r| QUOTA_REASONS.contains(&r.as_str())) => {
            TransferError::QuotaExceeded(detail)
        }
        404 | 410 if phase == Phase::Session => {
            TransferError::Fatal(format!("upload session expired ({})", detail))
        }
        400..=499 => TransferError::Validation(detail),
        _ => TransferError::Fatal(format!("unexpected reply, {}", detail)),
    }
}
