//! Parse the bits of endpoint responses the upload loop cares about.

use serde::Deserialize;

/// Value of the last header named `name` (case-insensitive) among raw header lines.
pub(crate) fn header_value<'a>(lines: &'a [String], name: &str) -> Option<&'a str> {
    lines
        .iter()
        .filter_map(|line| line.split_once(':'))
        .filter(|(n, _)| n.trim().eq_ignore_ascii_case(name))
        .map(|(_, v)| v.trim())
        .last()
}

/// Last received byte from a `Range: bytes=0-<n>` header.
pub(crate) fn parse_range_end(value: &str) -> Option<u64> {
    let bytes = value.trim().strip_prefix("bytes=")?;
    let (start, end) = bytes.split_once('-')?;
    if start.trim() != "0" {
        return None;
    }
    end.trim().parse().ok()
}

/// Offset to resume from given the `Range` header of a 308 reply.
pub(crate) fn next_offset(headers: &[String]) -> u64 {
    header_value(headers, "range")
        .and_then(parse_range_end)
        .map(|end| end + 1)
        .unwrap_or(0)
}

#[derive(Deserialize)]
struct Created {
    id: Option<String>,
}

/// Remote id from the final `200/201` body.
pub(crate) fn parse_video_id(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<Created>(body)
        .ok()
        .and_then(|c| c.id)
        .filter(|id| !id.is_empty())
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Deserialize)]
struct ErrorItem {
    #[serde(default)]
    reason: Option<String>,
}

/// Machine-readable reasons and the human message from an error body.
/// Non-JSON bodies yield no reasons and a truncated text message.
pub(crate) fn parse_error(body: &[u8]) -> (Vec<String>, String) {
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(env) => {
            let reasons = env
                .error
                .errors
                .into_iter()
                .filter_map(|e| e.reason)
                .collect();
            (reasons, env.error.message.unwrap_or_default())
        }
        Err(_) => (
            Vec::new(),
            String::from_utf8_lossy(body).trim().chars().take(200).collect(),
        ),
    }
}
