//! Single HTTP exchanges of the resumable upload protocol.
//!
//! Each function performs exactly one request on a fresh curl handle and
//! returns the raw reply; interpreting status codes is the caller's job.

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::str;
use std::time::Duration;

use curl::easy::{Easy, List, ReadError};

use super::classify::classify_curl_error;
use super::error::TransferError;

/// Status, header lines (of the final response only) and body.
#[derive(Debug, Default)]
pub(crate) struct Reply {
    pub code: u32,
    pub headers: Vec<String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Timeouts {
    pub connect: Duration,
    pub request: Duration,
}

fn handle(url: &str, timeouts: Timeouts, headers: &[String]) -> Result<Easy, curl::Error> {
    let mut easy = Easy::new();
    easy.url(url)?;
    easy.follow_location(false)?;
    easy.connect_timeout(timeouts.connect)?;
    easy.timeout(timeouts.request)?;
    let mut list = List::new();
    for h in headers {
        list.append(h)?;
    }
    // No "Expect: 100-continue" round trip before bodies.
    list.append("Expect:")?;
    easy.http_headers(list)?;
    Ok(easy)
}

/// Runs the transfer, collecting headers and body. `read` feeds the request body.
fn perform<R>(easy: &mut Easy, mut read: R) -> Result<Reply, curl::Error>
where
    R: FnMut(&mut [u8]) -> Result<usize, ReadError>,
{
    let mut reply = Reply::default();
    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                let line = s.trim_end();
                if line.starts_with("HTTP/") {
                    reply.headers.clear();
                }
                if !line.is_empty() {
                    reply.headers.push(line.to_string());
                }
            }
            true
        })?;
        transfer.write_function(|data| {
            reply.body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.read_function(|buf| read(buf))?;
        transfer.perform()?;
    }
    reply.code = easy.response_code()?;
    Ok(reply)
}

/// `POST` that opens the session; the JSON metadata is the body.
pub(crate) fn open(
    url: &str,
    timeouts: Timeouts,
    authorization: &str,
    total: u64,
    metadata_json: &[u8],
) -> Result<Reply, TransferError> {
    let headers = [
        authorization.to_string(),
        "Content-Type: application/json; charset=UTF-8".to_string(),
        format!("X-Upload-Content-Length: {}", total),
        "X-Upload-Content-Type: video/*".to_string(),
    ];
    let run = || -> Result<Reply, curl::Error> {
        let mut easy = handle(url, timeouts, &headers)?;
        easy.post(true)?;
        easy.post_fields_copy(metadata_json)?;
        perform(&mut easy, |_| Ok(0))
    };
    run().map_err(|e| classify_curl_error(&e))
}

/// `PUT` of `len` payload bytes starting at `offset`.
pub(crate) fn put_chunk(
    session: &str,
    timeouts: Timeouts,
    authorization: &str,
    payload: &mut File,
    offset: u64,
    len: u64,
    total: u64,
) -> Result<Reply, TransferError> {
    payload
        .seek(SeekFrom::Start(offset))
        .map_err(|e| TransferError::Fatal(format!("seek payload: {}", e)))?;
    let headers = [
        authorization.to_string(),
        "Content-Type: video/*".to_string(),
        format!(
            "Content-Range: bytes {}-{}/{}",
            offset,
            offset + len - 1,
            total
        ),
    ];
    let read_failure: RefCell<Option<io::Error>> = RefCell::new(None);
    let mut chunk = payload.take(len);

    let result = (|| -> Result<Reply, curl::Error> {
        let mut easy = handle(session, timeouts, &headers)?;
        easy.upload(true)?;
        easy.in_filesize(len)?;
        perform(&mut easy, |buf| {
            chunk.read(buf).map_err(|e| {
                *read_failure.borrow_mut() = Some(e);
                ReadError::Abort
            })
        })
    })();

    if let Some(e) = read_failure.into_inner() {
        return Err(TransferError::Fatal(format!("read payload: {}", e)));
    }
    result.map_err(|e| classify_curl_error(&e))
}

/// Empty `PUT` asking how many bytes the session holds.
pub(crate) fn query(
    session: &str,
    timeouts: Timeouts,
    authorization: &str,
    total: u64,
) -> Result<Reply, TransferError> {
    let headers = [
        authorization.to_string(),
        format!("Content-Range: bytes */{}", total),
    ];
    let run = || -> Result<Reply, curl::Error> {
        let mut easy = handle(session, timeouts, &headers)?;
        easy.upload(true)?;
        easy.in_filesize(0)?;
        perform(&mut easy, |_| Ok(0))
    };
    run().map_err(|e| classify_curl_error(&e))
}
