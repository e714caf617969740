//! Minimal HTTP/1.1 server implementing the resumable upload protocol for
//! integration tests.
//!
//! `POST /upload?uploadType=resumable...` opens a session and answers with a
//! `Location`. `PUT /session` with `Content-Range: bytes a-b/total` appends a
//! chunk (308 with `Range` until complete, then 201 with a JSON id), and
//! `Content-Range: bytes */total` reports progress. `POST /token` is an OAuth
//! refresh endpoint. Failures can be scripted per route.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const TOKEN: &str = "test-token";
pub const VIDEO_ID: &str = "vid-0001";

/// Canned reply: status and body.
pub type Scripted = (u16, String);

#[derive(Debug, Default)]
pub struct ServerState {
    /// Replies returned (and consumed) for session-opening requests before any real handling.
    pub open_failures: VecDeque<Scripted>,
    /// Replies returned (and consumed) for chunk PUTs; the chunk is dropped.
    pub chunk_failures: VecDeque<Scripted>,
    /// Reply for every request, forever.
    pub always: Option<Scripted>,
    pub total: Option<u64>,
    pub received: Vec<u8>,
    pub metadata: Option<serde_json::Value>,
    pub opens: u32,
    pub chunk_puts: u32,
    pub status_queries: u32,
    pub token_requests: u32,
    /// Content-Range of every chunk PUT, in order.
    pub ranges: Vec<String>,
}

pub struct UploadServer {
    pub base: String,
    pub state: Arc<Mutex<ServerState>>,
}

impl UploadServer {
    pub fn endpoint(&self) -> String {
        format!("{}upload", self.base)
    }

    pub fn token_uri(&self) -> String {
        format!("{}token", self.base)
    }

    pub fn with_state<T>(&self, f: impl FnOnce(&mut ServerState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }
}

/// Starts the server on an ephemeral port. Runs until the process exits.
pub fn start() -> UploadServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let base = format!("http://127.0.0.1:{}/", port);
    let state = Arc::new(Mutex::new(ServerState::default()));
    let shared = Arc::clone(&state);
    let session = format!("{}session/1", base);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let state = Arc::clone(&shared);
            let session = session.clone();
            thread::spawn(move || handle(stream, &state, &session));
        }
    });
    UploadServer { base, state }
}

struct Request {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 16 * 1024];
    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };
    let head = std::str::from_utf8(&buf[..header_end]).ok()?.to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();
    let length: usize = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(0);
    let mut body = buf[header_end..].to_vec();
    while body.len() < length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(length);
    Some(Request {
        method,
        path,
        headers,
        body,
    })
}

fn respond(stream: &mut TcpStream, status: u16, extra: &[String], body: &str) {
    let reason = match status {
        200 => "OK",
        201 => "Created",
        308 => "Permanent Redirect",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    };
    let mut response = format!("HTTP/1.1 {} {}\r\n", status, reason);
    for h in extra {
        response.push_str(h);
        response.push_str("\r\n");
    }
    response.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    ));
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

fn progress_headers(received: u64) -> Vec<String> {
    if received == 0 {
        Vec::new()
    } else {
        vec![format!("Range: bytes=0-{}", received - 1)]
    }
}

fn created() -> String {
    format!("{{\"kind\":\"youtube#video\",\"id\":\"{}\"}}", VIDEO_ID)
}

fn handle(mut stream: TcpStream, state: &Mutex<ServerState>, session: &str) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(req) = read_request(&mut stream) else {
        return;
    };
    let mut st = state.lock().unwrap();

    if req.method == "POST" && req.path.starts_with("/token") {
        st.token_requests += 1;
        let form = String::from_utf8_lossy(&req.body).to_string();
        if form.contains("grant_type=refresh_token") && form.contains("refresh_token=good") {
            respond(
                &mut stream,
                200,
                &["Content-Type: application/json".to_string()],
                &format!("{{\"access_token\":\"{}\",\"expires_in\":3599}}", TOKEN),
            );
        } else {
            respond(
                &mut stream,
                400,
                &[],
                r#"{"error":"invalid_grant","error_description":"Bad Request"}"#,
            );
        }
        return;
    }

    if let Some((code, body)) = st.always.clone() {
        if req.method == "POST" {
            st.opens += 1;
        }
        respond(&mut stream, code, &[], &body);
        return;
    }

    let expected = format!("Bearer {}", TOKEN);
    if req.header("authorization") != Some(expected.as_str()) {
        respond(
            &mut stream,
            401,
            &[],
            r#"{"error":{"code":401,"message":"Invalid Credentials","errors":[{"reason":"authError"}]}}"#,
        );
        return;
    }

    match req.method.as_str() {
        "POST" if req.path.starts_with("/upload") && req.path.contains("uploadType=resumable") => {
            st.opens += 1;
            if let Some((code, body)) = st.open_failures.pop_front() {
                respond(&mut stream, code, &[], &body);
                return;
            }
            st.total = req
                .header("x-upload-content-length")
                .and_then(|v| v.parse().ok());
            st.metadata = serde_json::from_slice(&req.body).ok();
            st.received.clear();
            respond(&mut stream, 200, &[format!("Location: {}", session)], "");
        }
        "PUT" if req.path.starts_with("/session") => {
            let range = req.header("content-range").unwrap_or("").to_string();
            let total = st.total.unwrap_or(0);
            if range.starts_with("bytes */") {
                st.status_queries += 1;
                let received = st.received.len() as u64;
                if received == total && total > 0 {
                    respond(&mut stream, 200, &[], &created());
                } else {
                    respond(&mut stream, 308, &progress_headers(received), "");
                }
                return;
            }
            st.chunk_puts += 1;
            st.ranges.push(range.clone());
            if let Some((code, body)) = st.chunk_failures.pop_front() {
                respond(&mut stream, code, &[], &body);
                return;
            }
            let start: u64 = range
                .strip_prefix("bytes ")
                .and_then(|r| r.split_once('-'))
                .and_then(|(s, _)| s.parse().ok())
                .unwrap_or(u64::MAX);
            if start == st.received.len() as u64 {
                st.received.extend_from_slice(&req.body);
            }
            let received = st.received.len() as u64;
            if received >= total {
                respond(&mut stream, 201, &[], &created());
            } else {
                respond(&mut stream, 308, &progress_headers(received), "");
            }
        }
        _ => respond(&mut stream, 404, &[], ""),
    }
}
