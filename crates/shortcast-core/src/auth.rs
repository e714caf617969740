//! Credential providers for the upload endpoint.
//!
//! Two sources are supported: a ready-made access token taken from the
//! environment, and an OAuth refresh token exchanged once per process for a
//! short-lived access token.

use serde::Deserialize;
use std::cell::RefCell;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::config::AuthConfig;

/// A bearer access token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// `Authorization` header line for curl.
    pub fn authorization_header(&self) -> String {
        format!("Authorization: Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("environment variable {0} is not set or empty")]
    MissingToken(String),
    #[error("read token file {path}: {source}")]
    TokenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("token file {path} is malformed: {source}")]
    TokenFileFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("token request failed: {0}")]
    Http(#[from] curl::Error),
    #[error("token endpoint refused the refresh token (HTTP {status}): {reason}")]
    Rejected { status: u32, reason: String },
    #[error("token endpoint returned an unexpected response: {0}")]
    MalformedResponse(String),
}

/// Source of the access token used for every upload request.
pub trait CredentialProvider {
    fn credential(&self) -> Result<Credential, AuthError>;
}

impl<T: CredentialProvider + ?Sized> CredentialProvider for &T {
    fn credential(&self) -> Result<Credential, AuthError> {
        (**self).credential()
    }
}

impl<T: CredentialProvider + ?Sized> CredentialProvider for Box<T> {
    fn credential(&self) -> Result<Credential, AuthError> {
        (**self).credential()
    }
}

/// Fixed access token, given directly or read from an environment variable
/// when it is first needed.
#[derive(Debug, Clone)]
pub enum StaticToken {
    Value(Credential),
    Env(String),
}

impl StaticToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        StaticToken::Value(Credential::new(access_token))
    }

    pub fn from_env(var: impl Into<String>) -> Self {
        StaticToken::Env(var.into())
    }
}

impl CredentialProvider for StaticToken {
    fn credential(&self) -> Result<Credential, AuthError> {
        match self {
            StaticToken::Value(c) => Ok(c.clone()),
            StaticToken::Env(var) => match std::env::var(var) {
                Ok(v) if !v.trim().is_empty() => Ok(Credential::new(v.trim())),
                _ => Err(AuthError::MissingToken(var.clone())),
            },
        }
    }
}

/// Contents of the OAuth token file.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenFile {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl TokenFile {
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let bytes = fs::read(path).map_err(|source| AuthError::TokenFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| AuthError::TokenFileFormat {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `application/x-www-form-urlencoded` body of the refresh grant.
    pub fn refresh_form(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.client_id)
            .append_pair("client_secret", &self.client_secret)
            .append_pair("refresh_token", &self.refresh_token)
            .append_pair("grant_type", "refresh_token")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Interpret the token endpoint's reply.
pub fn parse_token_response(status: u32, body: &[u8]) -> Result<Credential, AuthError> {
    let parsed: Option<TokenResponse> = serde_json::from_slice(body).ok();
    match parsed {
        Some(TokenResponse {
            access_token: Some(token),
            ..
        }) if (200..300).contains(&status) && !token.is_empty() => Ok(Credential::new(token)),
        Some(TokenResponse {
            error: Some(error),
            error_description,
            ..
        }) => Err(AuthError::Rejected {
            status,
            reason: match error_description {
                Some(d) => format!("{}: {}", error, d),
                None => error,
            },
        }),
        _ if !(200..300).contains(&status) => Err(AuthError::Rejected {
            status,
            reason: String::from_utf8_lossy(body).chars().take(200).collect(),
        }),
        _ => Err(AuthError::MalformedResponse(
            "no access_token in token response".to_string(),
        )),
    }
}

/// Exchanges a refresh token for an access token on first use and reuses it
/// for the rest of the process.
pub struct RefreshingToken {
    token_file: PathBuf,
    default_token_uri: String,
    timeout: Duration,
    cached: RefCell<Option<Credential>>,
}

impl RefreshingToken {
    pub fn new(token_file: PathBuf, default_token_uri: String, timeout: Duration) -> Self {
        Self {
            token_file,
            default_token_uri,
            timeout,
            cached: RefCell::new(None),
        }
    }

    fn refresh(&self) -> Result<Credential, AuthError> {
        let file = TokenFile::load(&self.token_file)?;
        let uri = file
            .token_uri
            .clone()
            .unwrap_or_else(|| self.default_token_uri.clone());
        tracing::debug!(token_uri = %uri, "refreshing access token");
        let (status, body) = post_form(&uri, &file.refresh_form(), self.timeout)?;
        parse_token_response(status, &body)
    }
}

impl CredentialProvider for RefreshingToken {
    fn credential(&self) -> Result<Credential, AuthError> {
        if let Some(c) = self.cached.borrow().as_ref() {
            return Ok(c.clone());
        }
        let fresh = self.refresh()?;
        *self.cached.borrow_mut() = Some(fresh.clone());
        Ok(fresh)
    }
}

fn post_form(uri: &str, form: &str, timeout: Duration) -> Result<(u32, Vec<u8>), curl::Error> {
    let mut body = Vec::new();
    let mut easy = curl::easy::Easy::new();
    easy.url(uri)?;
    easy.post(true)?;
    easy.post_fields_copy(form.as_bytes())?;
    easy.connect_timeout(timeout)?;
    easy.timeout(timeout)?;
    let mut list = curl::easy::List::new();
    list.append("Content-Type: application/x-www-form-urlencoded")?;
    list.append("Accept: application/json")?;
    list.append("Expect:")?;
    easy.http_headers(list)?;
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }
    let status = easy.response_code()?;
    Ok((status, body))
}

/// Pick the provider named by `[auth]`: the token file when configured,
/// otherwise the access-token environment variable.
pub fn provider_from_config(cfg: &AuthConfig, timeout: Duration) -> Box<dyn CredentialProvider> {
    match &cfg.token_file {
        Some(path) => Box::new(RefreshingToken::new(
            path.clone(),
            cfg.token_uri.clone(),
            timeout,
        )),
        None => Box::new(StaticToken::from_env(cfg.access_token_env.clone())),
    }
}
