//! Transfer engine: resumable, chunked upload of one payload file.
//!
//! A session is opened once per upload and then driven chunk by chunk. When
//! a chunk fails transiently the engine asks the session how much it already
//! holds and continues from there, so a retry never resends acknowledged
//! bytes. All retries of one upload share a single attempt budget.

mod classify;
mod error;
mod response;
mod session;

pub use error::TransferError;

use serde_json::json;
use std::fmt;
use std::fs::{self, File};
use std::path::Path;
use std::time::Duration;

use crate::auth::CredentialProvider;
use crate::config::UploadConfig;
use crate::metadata::VideoMetadata;
use crate::retry::{run_with_retry_and_sleep, ErrorKind, RetryPolicy};

use classify::{classify_status, Phase};
use session::{Reply, Timeouts};

/// Proof of a finished upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteReceipt {
    /// Id the platform assigned to the video.
    pub id: String,
}

impl fmt::Display for RemoteReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Something that can publish one payload file.
pub trait Publisher {
    fn upload(&self, payload: &Path, metadata: &VideoMetadata)
        -> Result<RemoteReceipt, TransferError>;
}

impl<P: Publisher + ?Sized> Publisher for &P {
    fn upload(
        &self,
        payload: &Path,
        metadata: &VideoMetadata,
    ) -> Result<RemoteReceipt, TransferError> {
        (**self).upload(payload, metadata)
    }
}

impl<P: Publisher + ?Sized> Publisher for Box<P> {
    fn upload(
        &self,
        payload: &Path,
        metadata: &VideoMetadata,
    ) -> Result<RemoteReceipt, TransferError> {
        (**self).upload(payload, metadata)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    pub endpoint: String,
    pub chunk_bytes: u64,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl UploadSettings {
    pub fn from_config(cfg: &UploadConfig) -> Self {
        Self {
            endpoint: cfg.endpoint.clone(),
            chunk_bytes: cfg.chunk_bytes.max(1),
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            request_timeout: Duration::from_secs(cfg.request_timeout_secs),
        }
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: self.connect_timeout,
            request: self.request_timeout,
        }
    }

    /// Endpoint with the resumable-session query parameters.
    fn session_request_url(&self) -> Result<url::Url, TransferError> {
        let mut url = url::Url::parse(&self.endpoint).map_err(|e| {
            TransferError::Fatal(format!("invalid upload endpoint {:?}: {}", self.endpoint, e))
        })?;
        url.query_pairs_mut()
            .append_pair("uploadType", "resumable")
            .append_pair("part", "snippet,status");
        Ok(url)
    }
}

/// JSON body describing the video, sent when the session is opened.
pub fn metadata_body(metadata: &VideoMetadata) -> serde_json::Value {
    json!({
        "snippet": {
            "title": metadata.title,
            "description": metadata.description,
            "tags": metadata.tags,
            "categoryId": metadata.category_id,
        },
        "status": {
            "privacyStatus": metadata.privacy.as_str(),
            "selfDeclaredMadeForKids": metadata.made_for_kids,
        },
    })
}

/// Progress of one upload across attempts.
#[derive(Debug, Default)]
struct SessionState {
    uri: Option<String>,
    offset: u64,
    /// Offset is unknown after a failed chunk; ask the session first.
    resync: bool,
}

/// Resumable uploader over libcurl.
pub struct Uploader<C> {
    settings: UploadSettings,
    policy: RetryPolicy,
    credentials: C,
    sleep: Box<dyn Fn(Duration)>,
}

impl<C: CredentialProvider> Uploader<C> {
    pub fn new(settings: UploadSettings, policy: RetryPolicy, credentials: C) -> Self {
        Self {
            settings,
            policy,
            credentials,
            sleep: Box::new(std::thread::sleep),
        }
    }

    /// Replace the backoff sleep (tests record delays instead of waiting).
    pub fn with_sleep(mut self, sleep: impl Fn(Duration) + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    fn attempt(
        &self,
        state: &mut SessionState,
        payload: &mut File,
        total: u64,
        metadata_json: &[u8],
        attempt: u32,
    ) -> Result<RemoteReceipt, TransferError> {
        let credential = self.credentials.credential()?;
        let authorization = credential.authorization_header();
        let timeouts = self.settings.timeouts();

        let uri = match &state.uri {
            Some(uri) => uri.clone(),
            None => {
                let uri = self.open_session(&authorization, total, metadata_json)?;
                tracing::debug!(attempt, "upload session opened");
                state.uri = Some(uri.clone());
                state.offset = 0;
                state.resync = false;
                uri
            }
        };

        if state.resync {
            let reply = session::query(&uri, timeouts, &authorization, total)?;
            match reply.code {
                200 | 201 => return finish(&reply),
                308 => {
                    state.offset = response::next_offset(&reply.headers);
                    state.resync = false;
                    tracing::debug!(attempt, offset = state.offset, total, "session resynced");
                }
                code => return Err(classify_status(code, &reply.body, Phase::Session)),
            }
        }

        loop {
            if state.offset >= total {
                state.resync = true;
                return Err(TransferError::transient(
                    ErrorKind::Connection,
                    "session holds every byte but has not finished",
                ));
            }
            let len = self.settings.chunk_bytes.min(total - state.offset);
            let sent = session::put_chunk(
                &uri,
                timeouts,
                &authorization,
                payload,
                state.offset,
                len,
                total,
            );
            let reply = match sent {
                Ok(r) => r,
                Err(e) => {
                    if matches!(e, TransferError::Transient { .. }) {
                        state.resync = true;
                    }
                    return Err(e);
                }
            };
            match reply.code {
                200 | 201 => return finish(&reply),
                308 => {
                    let next = response::next_offset(&reply.headers);
                    if next <= state.offset {
                        state.resync = true;
                        return Err(TransferError::transient(
                            ErrorKind::Connection,
                            format!("no progress past byte {}", state.offset),
                        ));
                    }
                    tracing::debug!(offset = next, total, "chunk accepted");
                    state.offset = next;
                }
                code => {
                    let e = classify_status(code, &reply.body, Phase::Session);
                    if matches!(e, TransferError::Transient { .. }) {
                        state.resync = true;
                    }
                    return Err(e);
                }
            }
        }
    }

    fn open_session(
        &self,
        authorization: &str,
        total: u64,
        metadata_json: &[u8],
    ) -> Result<String, TransferError> {
        let url = self.settings.session_request_url()?;
        let reply = session::open(
            url.as_str(),
            self.settings.timeouts(),
            authorization,
            total,
            metadata_json,
        )?;
        if !(200..300).contains(&reply.code) {
            return Err(classify_status(reply.code, &reply.body, Phase::Open));
        }
        let location = response::header_value(&reply.headers, "location").ok_or_else(|| {
            TransferError::Fatal("session reply carries no Location header".to_string())
        })?;
        url.join(location)
            .map(|u| u.to_string())
            .map_err(|e| TransferError::Fatal(format!("bad session location {:?}: {}", location, e)))
    }
}

fn finish(reply: &Reply) -> Result<RemoteReceipt, TransferError> {
    response::parse_video_id(&reply.body)
        .map(|id| RemoteReceipt { id })
        .ok_or_else(|| {
            TransferError::Fatal(format!(
                "HTTP {} without a video id in the response",
                reply.code
            ))
        })
}

impl<C: CredentialProvider> Publisher for Uploader<C> {
    fn upload(
        &self,
        payload: &Path,
        metadata: &VideoMetadata,
    ) -> Result<RemoteReceipt, TransferError> {
        let total = fs::metadata(payload)
            .map_err(|e| TransferError::Fatal(format!("stat {}: {}", payload.display(), e)))?
            .len();
        if total == 0 {
            return Err(TransferError::Validation(format!(
                "{} is empty",
                payload.display()
            )));
        }
        let mut file = File::open(payload)
            .map_err(|e| TransferError::Fatal(format!("open {}: {}", payload.display(), e)))?;
        let body = serde_json::to_vec(&metadata_body(metadata))
            .map_err(|e| TransferError::Fatal(format!("encode metadata: {}", e)))?;

        tracing::info!(payload = %payload.display(), bytes = total, title = %metadata.title, "uploading");
        let mut state = SessionState::default();
        let receipt = run_with_retry_and_sleep(
            &self.policy,
            |d| (self.sleep)(d),
            |attempt| self.attempt(&mut state, &mut file, total, &body, attempt),
        )?;
        tracing::info!(id = %receipt.id, "upload complete");
        Ok(receipt)
    }
}
